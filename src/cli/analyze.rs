use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};
use tracing::info;

use crate::anomalies;
use crate::api::AnalysisService;
use crate::error::Result;
use crate::fmt::money;
use crate::metrics::{count_lines, metric_lines, METRICS_TITLE};
use crate::models::{AnalysisResult, TransactionFile};
use crate::settings::{get_output_dir, shellexpand_path};

pub struct ExportOptions {
    pub csv: bool,
    pub pdf: bool,
    pub output_dir: Option<String>,
}

pub fn run(file: &str, opts: ExportOptions) -> Result<()> {
    let client = super::client()?;
    let path = PathBuf::from(shellexpand_path(file));
    let report = analyze_with(&client, &path, &opts)?;
    println!("{report}");
    Ok(())
}

/// Analyze `path` and return the printable report, running the requested
/// exports along the way.
pub fn analyze_with(
    service: &dyn AnalysisService,
    path: &Path,
    opts: &ExportOptions,
) -> Result<String> {
    let file = TransactionFile::read(path)?;
    info!(file = %file.name, "analyzing");
    let result = service.analyze(&file)?;

    let mut out = render(&result);

    if opts.csv || opts.pdf {
        let dir = opts
            .output_dir
            .as_deref()
            .map(|d| PathBuf::from(shellexpand_path(d)))
            .unwrap_or_else(get_output_dir);
        out.push('\n');
        out.push_str(&exports(&result, &dir, opts)?);
    }
    Ok(out)
}

fn exports(result: &AnalysisResult, dir: &Path, opts: &ExportOptions) -> Result<String> {
    let mut lines = Vec::new();
    if opts.csv {
        match anomalies::export_csv(&result.user_anomalies, dir)? {
            Some(p) => lines.push(format!("Exported anomalies to {}", p.display())),
            None => lines.push("No anomalies to export.".to_string()),
        }
    }
    if opts.pdf {
        lines.push(export_pdf(result, dir)?);
    }
    Ok(lines.join("\n"))
}

#[cfg(feature = "pdf")]
fn export_pdf(result: &AnalysisResult, dir: &Path) -> Result<String> {
    use crate::charts::{comparison_chart, spend_chart};

    let Some(analysis) = result.usable_expenditure() else {
        return Ok("No expenditure analysis to export.".to_string());
    };
    let spend = spend_chart(analysis);
    let compare = comparison_chart(analysis);
    let path = crate::planner_pdf::export_planner(analysis, &[&spend, &compare], dir)?;
    Ok(format!("Exported savings planner to {}", path.display()))
}

#[cfg(not(feature = "pdf"))]
fn export_pdf(_result: &AnalysisResult, _dir: &Path) -> Result<String> {
    Ok("PDF export is not available in this build.".to_string())
}

/// All sections of an analysis as text tables.
pub fn render(result: &AnalysisResult) -> String {
    let mut sections = vec![metrics_table(result)];

    match &result.expenditure_analysis {
        Some(e) if e.error.is_some() => {
            sections.push(format!(
                "Expenditure Analysis\n{}",
                e.error.as_deref().unwrap_or_default().red()
            ));
        }
        Some(e) => {
            let mut table = Table::new();
            table.set_header(vec!["Category", "Spend", "Planned"]);
            for (category, amount) in &e.spend_by_category {
                table.add_row(vec![
                    Cell::new(category),
                    Cell::new(money(*amount)),
                    Cell::new(money(crate::charts::planned_amount(e, category))),
                ]);
            }
            table.add_row(vec![
                Cell::new("Total".bold()),
                Cell::new(money(e.total_spend)),
                Cell::new(""),
            ]);
            sections.push(format!("Expenditure Analysis\n{table}"));

            sections.push(format!("Savings Plan\n{}", e.suggestion_lines().join("\n")));
        }
        None => {}
    }

    let summary = anomalies::summary(&result.user_anomalies);
    if result.user_anomalies.is_empty() {
        sections.push(format!("Anomalies\n{}", summary.green()));
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Time", "Amount", "Category"]);
        for row in anomalies::rows(&result.user_anomalies) {
            table.add_row(vec![
                Cell::new(row.time),
                Cell::new(row.amount),
                Cell::new(row.category),
            ]);
        }
        sections.push(format!("Anomalies\n{}\n{table}", summary.yellow()));
    }

    sections.join("\n\n")
}

fn metrics_table(result: &AnalysisResult) -> String {
    let perf = &result.model_performance;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    for line in count_lines(perf).into_iter().chain(metric_lines(perf)) {
        table.add_row(vec![Cell::new(line.label), Cell::new(line.value)]);
    }
    format!("{METRICS_TITLE}\n{table}")
}
