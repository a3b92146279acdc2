use crate::fmt::metric;
use crate::models::ModelPerformance;

pub const METRICS_TITLE: &str = "Model Performance Metrics";
pub const METRICS_BLURB: &str =
    "These metrics show the model's effectiveness, calculated on a standard test dataset.";

/// One labelled value in the metrics card.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricLine {
    pub label: &'static str,
    pub value: String,
}

impl MetricLine {
    fn new(label: &'static str, value: String) -> Self {
        Self { label, value }
    }

    pub fn render(&self) -> String {
        format!("{}: {}", self.label, self.value)
    }
}

/// Confusion-matrix counts in TP, TN, FP, FN order.
pub fn count_lines(perf: &ModelPerformance) -> Vec<MetricLine> {
    vec![
        MetricLine::new("True Positives (TP)", perf.tp.to_string()),
        MetricLine::new("True Negatives (TN)", perf.tn.to_string()),
        MetricLine::new("False Positives (FP)", perf.fp.to_string()),
        MetricLine::new("False Negatives (FN)", perf.false_negatives.to_string()),
    ]
}

/// Ratio metrics, each with four decimals. Optional ones appear only when sent.
pub fn metric_lines(perf: &ModelPerformance) -> Vec<MetricLine> {
    let mut lines = vec![
        MetricLine::new("Accuracy", metric(perf.accuracy)),
        MetricLine::new("Precision", metric(perf.precision)),
        MetricLine::new("Recall (Sensitivity)", metric(perf.recall)),
    ];
    if let Some(f1) = perf.f1_score {
        lines.push(MetricLine::new("F1-Score", metric(f1)));
    }
    if let Some(spec) = perf.specificity {
        lines.push(MetricLine::new("Specificity", metric(spec)));
    }
    if let Some(mcc) = perf.mcc {
        lines.push(MetricLine::new("Matthews Corr. Coeff. (MCC)", metric(mcc)));
    }
    lines
}
