mod anomalies;
mod api;
mod charts;
mod cli;
mod error;
mod fmt;
mod logging;
mod metrics;
mod models;
mod panels;
#[cfg(feature = "pdf")]
mod planner_pdf;
mod settings;
mod shell;
mod tui;

use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            let _guard = logging::init_file(&settings::config_dir());
            cli::dashboard::run(None)
        }
        Some(Commands::Dashboard { file }) => {
            let _guard = logging::init_file(&settings::config_dir());
            cli::dashboard::run(file)
        }
        Some(command) => {
            logging::init_stderr();
            run_command(command)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_command(command: Commands) -> error::Result<()> {
    match command {
        Commands::Dashboard { file } => cli::dashboard::run(file),
        Commands::Analyze {
            file,
            csv,
            pdf,
            output_dir,
        } => cli::analyze::run(
            &file,
            cli::analyze::ExportOptions {
                csv,
                pdf,
                output_dir,
            },
        ),
        Commands::ConfusionMatrix { file, output } => cli::confusion_matrix::run(&file, output),
        Commands::Ask { query } => cli::ask::run(&query),
        Commands::Simulate { scenario } => cli::simulate::run(&scenario),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::SetUrl { url } => cli::config::set_url(&url),
            ConfigCommands::SetOutputDir { dir } => cli::config::set_output_dir(&dir),
        },
    }
}
