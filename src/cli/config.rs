use crate::error::Result;
use crate::settings::{
    load_saved_settings, load_settings, save_settings, shellexpand_path, validate_api_url,
    API_URL_ENV,
};

pub fn show() -> Result<()> {
    let settings = load_settings();
    let source = if std::env::var(API_URL_ENV).map(|v| !v.trim().is_empty()).unwrap_or(false) {
        format!(" (from {API_URL_ENV})")
    } else {
        String::new()
    };
    println!("API URL:     {}{source}", settings.api_url);
    println!("Output dir:  {}", settings.output_dir);
    println!("Timeout:     {}s", settings.timeout_secs);
    println!("Config dir:  {}", crate::settings::config_dir().display());
    Ok(())
}

pub fn set_url(url: &str) -> Result<()> {
    let url = validate_api_url(url)?;
    let mut settings = load_saved_settings();
    settings.api_url = url.clone();
    save_settings(&settings)?;
    println!("API URL set to {url}");
    Ok(())
}

pub fn set_output_dir(dir: &str) -> Result<()> {
    let expanded = shellexpand_path(dir);
    std::fs::create_dir_all(&expanded)?;
    let mut settings = load_saved_settings();
    settings.output_dir = expanded.clone();
    save_settings(&settings)?;
    println!("Output directory set to {expanded}");
    Ok(())
}
