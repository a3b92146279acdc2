use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::api::AnalysisService;
use crate::error::{CapitalIqError, Result};
use crate::fmt::money;
use crate::models::SimulationResult;

pub fn run(words: &[String]) -> Result<()> {
    let client = super::client()?;
    println!("{}", simulate_with(&client, &words.join(" "))?);
    Ok(())
}

pub fn simulate_with(service: &dyn AnalysisService, scenario: &str) -> Result<String> {
    let scenario = scenario.trim();
    if scenario.is_empty() {
        return Err(CapitalIqError::Validation("Enter a scenario to simulate.".into()));
    }
    Ok(render(&service.simulate(scenario)?))
}

pub fn render(sim: &SimulationResult) -> String {
    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    table.add_row(vec![
        Cell::new("Original 6-month savings"),
        Cell::new(money(sim.original_six_month_savings)),
    ]);
    table.add_row(vec![
        Cell::new("New 6-month savings"),
        Cell::new(money(sim.new_six_month_savings)),
    ]);
    let change = if sim.monthly_change < 0.0 {
        money(sim.monthly_change).red()
    } else {
        money(sim.monthly_change).green()
    };
    table.add_row(vec![Cell::new("Monthly change"), Cell::new(change)]);

    let mut out = format!(
        "{}\n{}\n\n{table}",
        "Simulation Results".bold(),
        sim.impact_description
    );
    if !sim.recommendations.is_empty() {
        out.push_str("\n\nRecommendations:");
        for r in &sim.recommendations {
            out.push_str(&format!("\n- {r}"));
        }
    }
    out
}
