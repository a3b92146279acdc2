use image::RgbImage;
use plotters::prelude::*;
use tracing::warn;

use crate::models::ExpenditureAnalysis;

/// Planned spend for a category that has a savings suggestion.
pub const PLANNED_FACTOR: f64 = 0.85;

pub const SNAPSHOT_WIDTH: u32 = 950;
pub const SNAPSHOT_HEIGHT: u32 = 400;

const SPEND_COLOR: [u8; 3] = [52, 152, 219];
const PLANNED_COLOR: [u8; 3] = [46, 204, 113];
const AXIS: [u8; 3] = [120, 120, 120];
const GRID: [u8; 3] = [225, 225, 225];
const BACKGROUND: [u8; 3] = [255, 255, 255];

/// Share of each category slot taken by its bars.
const GROUP_WIDTH: f64 = 0.8;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: &'static str,
    pub values: Vec<f64>,
    pub color: [u8; 3],
}

/// Bar chart over the categories of one expenditure analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryChart {
    pub title: &'static str,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

impl CategoryChart {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max)
    }
}

/// Spend per category, in the server's key order.
pub fn spend_chart(analysis: &ExpenditureAnalysis) -> CategoryChart {
    CategoryChart {
        title: "Expenditure by Category",
        labels: analysis.spend_by_category.keys().cloned().collect(),
        series: vec![Series {
            label: "Spend by Category ($)",
            values: analysis.spend_by_category.values().copied().collect(),
            color: SPEND_COLOR,
        }],
    }
}

/// Planned spend for one category: discounted only when the plan names it.
pub fn planned_amount(analysis: &ExpenditureAnalysis, category: &str) -> f64 {
    let current = analysis
        .spend_by_category
        .get(category)
        .copied()
        .unwrap_or(0.0);
    if analysis.savings_plan.contains_key(category) {
        current * PLANNED_FACTOR
    } else {
        current
    }
}

/// Current vs planned spend per category.
pub fn comparison_chart(analysis: &ExpenditureAnalysis) -> CategoryChart {
    let labels: Vec<String> = analysis.spend_by_category.keys().cloned().collect();
    let planned = labels
        .iter()
        .map(|c| planned_amount(analysis, c))
        .collect();
    CategoryChart {
        title: "Current vs Planned Expenditure by Category",
        series: vec![
            Series {
                label: "Current ($)",
                values: analysis.spend_by_category.values().copied().collect(),
                color: SPEND_COLOR,
            },
            Series {
                label: "Planned ($)",
                values: planned,
                color: PLANNED_COLOR,
            },
        ],
        labels,
    }
}

/// Something that can hand over a raster image of itself.
///
/// `None` means there is nothing rendered yet; callers skip it.
pub trait ChartSnapshot {
    fn snapshot(&self) -> Option<RgbImage>;
}

impl ChartSnapshot for CategoryChart {
    fn snapshot(&self) -> Option<RgbImage> {
        if self.is_empty() || self.series.is_empty() {
            return None;
        }
        let mut buf = vec![0u8; (SNAPSHOT_WIDTH * SNAPSHOT_HEIGHT * 3) as usize];
        if let Err(e) = draw(self, &mut buf, SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT) {
            warn!(chart = self.title, error = %e, "chart snapshot failed");
            return None;
        }
        RgbImage::from_raw(SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT, buf)
    }
}

fn rgb(color: [u8; 3]) -> RGBColor {
    RGBColor(color[0], color[1], color[2])
}

/// Grouped bar chart with title, category labels, legend and a dollar y axis.
fn draw(chart: &CategoryChart, buf: &mut [u8], width: u32, height: u32) -> DrawResult {
    let root = BitMapBackend::with_buffer(buf, (width, height)).into_drawing_area();
    root.fill(&rgb(BACKGROUND))?;

    let groups = chart.labels.len();
    let top = chart.max_value().max(1.0) * 1.15;
    let mut ctx = ChartBuilder::on(&root)
        .caption(chart.title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(32)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(groups as f64 - 0.5), 0f64..top)?;

    let category = |x: &f64| {
        let i = x.round();
        if (x - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        chart.labels.get(i as usize).cloned().unwrap_or_default()
    };
    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(groups)
        .x_label_formatter(&category)
        .y_label_formatter(&|y| format!("{y:.0}"))
        .y_desc("Amount ($)")
        .axis_style(&rgb(AXIS))
        .bold_line_style(&rgb(GRID))
        .light_line_style(&TRANSPARENT)
        .label_style(("sans-serif", 14))
        .draw()?;

    let bar_w = GROUP_WIDTH / chart.series.len() as f64;
    for (s, series) in chart.series.iter().enumerate() {
        let color = rgb(series.color);
        let bars = series.values.iter().enumerate().map(|(g, &value)| {
            let x0 = g as f64 - GROUP_WIDTH / 2.0 + s as f64 * bar_w;
            Rectangle::new([(x0, 0.0), (x0 + bar_w, value.max(0.0))], color.filled())
        });
        ctx.draw_series(bars)?
            .label(series.label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&rgb(BACKGROUND))
        .border_style(&rgb(AXIS))
        .label_font(("sans-serif", 14))
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_result;

    fn analysis() -> ExpenditureAnalysis {
        sample_result().expenditure_analysis.unwrap()
    }

    #[test]
    fn test_spend_chart_follows_key_order() {
        let chart = spend_chart(&analysis());
        assert_eq!(chart.labels, vec!["Shopping", "Groceries", "Dining"]);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].values, vec![200.0, 112.5, 100.0]);
    }

    #[test]
    fn test_planned_discounts_only_categories_with_suggestions() {
        let a = analysis();
        let chart = comparison_chart(&a);
        let current = &chart.series[0].values;
        let planned = &chart.series[1].values;
        for (i, cat) in chart.labels.iter().enumerate() {
            if a.savings_plan.contains_key(cat) {
                assert_eq!(planned[i], current[i] * 0.85);
            } else {
                assert_eq!(planned[i], current[i]);
            }
        }
        assert_eq!(planned[1], 112.5);
        assert_eq!(planned[0], 200.0 * 0.85);
    }

    #[test]
    fn test_planned_amount_for_unknown_category() {
        assert_eq!(planned_amount(&analysis(), "Travel"), 0.0);
    }

    #[test]
    fn test_snapshot_none_when_empty() {
        let empty = ExpenditureAnalysis::default();
        assert!(spend_chart(&empty).snapshot().is_none());
        assert!(comparison_chart(&empty).snapshot().is_none());
    }

    #[test]
    fn test_snapshot_draws_bars() {
        let img = comparison_chart(&analysis()).snapshot().unwrap();
        assert_eq!(img.dimensions(), (SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT));
        let current = img.pixels().filter(|p| p.0 == SPEND_COLOR).count();
        let planned = img.pixels().filter(|p| p.0 == PLANNED_COLOR).count();
        assert!(current > 0);
        assert!(planned > 0);
    }

    #[test]
    fn test_snapshot_has_title_and_labels() {
        let img = spend_chart(&analysis()).snapshot().unwrap();
        let inked = |y0: u32, y1: u32| {
            (y0..y1)
                .flat_map(|y| (0..img.width()).map(move |x| (x, y)))
                .filter(|&(x, y)| {
                    let p = img.get_pixel(x, y).0;
                    p.iter().all(|&c| c < 100)
                })
                .count()
        };
        // caption strip and category label strip both carry dark text
        assert!(inked(0, 36) > 0);
        assert!(inked(SNAPSHOT_HEIGHT - 44, SNAPSHOT_HEIGHT) > 0);
    }

    #[test]
    fn test_snapshot_legend_names_each_series() {
        let chart = comparison_chart(&analysis());
        let labels: Vec<&str> = chart.series.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["Current ($)", "Planned ($)"]);
        let img = chart.snapshot().unwrap();
        // legend swatches sit in the upper right, clear of the bars
        let planned_swatch = (0..120)
            .flat_map(|y| (SNAPSHOT_WIDTH / 2..SNAPSHOT_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y).0 == PLANNED_COLOR)
            .count();
        assert!(planned_swatch > 0);
    }
}
