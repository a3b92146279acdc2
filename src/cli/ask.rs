use colored::Colorize;

use crate::api::AnalysisService;
use crate::error::{CapitalIqError, Result};
use crate::tui::wrap_text;

const WRAP_WIDTH: usize = 80;

pub fn run(words: &[String]) -> Result<()> {
    let client = super::client()?;
    println!("{}", ask_with(&client, &words.join(" "))?);
    Ok(())
}

pub fn ask_with(service: &dyn AnalysisService, query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CapitalIqError::Validation("Enter a question to ask.".into()));
    }
    let answer = service.query(query)?;
    let (wrapped, _) = wrap_text(&answer, WRAP_WIDTH);
    Ok(format!("{}\n{wrapped}", "AI:".bold()))
}
