pub mod analyze;
pub mod ask;
pub mod config;
pub mod confusion_matrix;
pub mod dashboard;
pub mod simulate;

use clap::{Parser, Subcommand};

use crate::api::AnalysisClient;
use crate::error::Result;
use crate::settings::load_settings;

/// Client built from the saved settings and the environment.
pub(crate) fn client() -> Result<AnalysisClient> {
    AnalysisClient::from_settings(&load_settings())
}

#[derive(Parser)]
#[command(
    name = "capital-iq",
    version,
    about = "Fraud detection and spending insights for your transaction exports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive dashboard.
    Dashboard {
        /// CSV file to preselect
        file: Option<String>,
    },
    /// Analyze a transactions CSV and print the results.
    Analyze {
        /// Path to the transactions CSV
        file: String,
        /// Export anomalous transactions to CSV
        #[arg(long)]
        csv: bool,
        /// Export the savings planner to PDF
        #[arg(long)]
        pdf: bool,
        /// Directory for exported files (default: output_dir setting)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
    /// Save the classifier's confusion matrix as a PNG.
    ConfusionMatrix {
        /// Path to the transactions CSV
        file: String,
        /// Output path (default: <output_dir>/confusion_matrix.png)
        #[arg(long)]
        output: Option<String>,
    },
    /// Ask the assistant a question about your spending.
    Ask {
        /// The question, e.g. "What's my total spending?"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Run a what-if scenario against your savings plan.
    Simulate {
        /// The scenario, e.g. "What if I start saving $200 more per month?"
        #[arg(required = true, num_args = 1..)]
        scenario: Vec<String>,
    },
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings.
    Show,
    /// Set the analysis service base URL.
    SetUrl {
        /// e.g. http://127.0.0.1:5000
        url: String,
    },
    /// Set the directory exports are written to.
    SetOutputDir {
        dir: String,
    },
}
