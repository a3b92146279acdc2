use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// A user-selected CSV, read once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl TransactionFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "transactions.csv".to_string());
        Ok(Self::new(name, content))
    }
}

/// Full server response for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub model_performance: ModelPerformance,
    #[serde(default)]
    pub expenditure_analysis: Option<ExpenditureAnalysis>,
    #[serde(default)]
    pub user_anomalies: Vec<Anomaly>,
}

impl AnalysisResult {
    /// Expenditure analysis that is present and not flagged with an error.
    pub fn usable_expenditure(&self) -> Option<&ExpenditureAnalysis> {
        self.expenditure_analysis
            .as_ref()
            .filter(|e| e.error.is_none())
    }
}

/// Classifier metrics computed server-side on the evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub tp: u64,
    pub tn: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub false_negatives: u64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    #[serde(default)]
    pub f1_score: Option<f64>,
    #[serde(default)]
    pub specificity: Option<f64>,
    #[serde(default)]
    pub mcc: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenditureAnalysis {
    #[serde(default)]
    pub spend_by_category: IndexMap<String, f64>,
    #[serde(default)]
    pub total_spend: f64,
    #[serde(default)]
    pub savings_plan: IndexMap<String, String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub const NO_SUGGESTIONS: &str = "No specific savings suggestions at this time.";

impl ExpenditureAnalysis {
    /// Savings plan as bullet lines, or the fallback sentence when empty.
    pub fn suggestion_lines(&self) -> Vec<String> {
        if self.savings_plan.is_empty() {
            return vec![NO_SUGGESTIONS.to_string()];
        }
        self.savings_plan.values().map(|s| format!("- {s}")).collect()
    }
}

/// A transaction the model flagged. Feature columns (V1..V28) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "Time")]
    pub time: serde_json::Value,
    #[serde(rename = "Amount", deserialize_with = "number_or_string")]
    pub amount: f64,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
}

impl Anomaly {
    /// Category, or None when missing or blank.
    pub fn category_label(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

/// Amount sent as a number or a numeric string.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        // One unreadable amount shows as NaN instead of sinking the whole result.
        Raw::Text(s) => Ok(s.trim().parse().unwrap_or(f64::NAN)),
    }
}

/// Single question/answer pair from the assistant.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatExchange {
    pub query: String,
    pub response_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(default)]
    pub impact_description: String,
    #[serde(rename = "original_6month_savings", default)]
    pub original_six_month_savings: f64,
    #[serde(rename = "new_6month_savings", default)]
    pub new_six_month_savings: f64,
    #[serde(default)]
    pub monthly_change: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decoded confusion-matrix PNG for the analyzed file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrixImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ConfusionMatrixImage {
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)?;
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            png,
        })
    }

    /// Write the PNG bytes as received to `dir/name`.
    pub fn save(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(name);
        std::fs::write(&path, &self.png)?;
        Ok(path)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parses_backend_payload() {
        let r = sample_result();
        assert_eq!(r.model_performance.tp, 50);
        assert_eq!(r.model_performance.false_negatives, 5);
        assert!(r.model_performance.f1_score.is_none());
        assert_eq!(r.user_anomalies.len(), 2);
        assert_eq!(r.user_anomalies[1].amount, 529.0);
        assert!(r.user_anomalies[1].category_label().is_none());
    }

    #[test]
    fn test_category_order_is_preserved() {
        let r = sample_result();
        let exp = r.usable_expenditure().unwrap();
        let keys: Vec<&str> = exp.spend_by_category.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Shopping", "Groceries", "Dining"]);
    }

    #[test]
    fn test_unreadable_amount_keeps_the_result() {
        let json = sample_json().replace(r#""Amount": "529""#, r#""Amount": "n/a""#);
        let r: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(r.user_anomalies.len(), 2);
        assert!(r.user_anomalies[1].amount.is_nan());
        assert_eq!(r.user_anomalies[0].amount, 12.5);
        assert_eq!(crate::fmt::fixed2(r.user_anomalies[1].amount), "NaN");
    }

    #[test]
    fn test_expenditure_error_is_not_usable() {
        let json = r#"{
            "model_performance": {"tp": 1, "tn": 1, "fp": 0, "fn": 0,
                "accuracy": 1.0, "precision": 1.0, "recall": 1.0},
            "expenditure_analysis": {"error": "CSV must contain 'Category' and 'Amount' columns for analysis.",
                "total_spend": 0, "spend_by_category": {}, "savings_plan": {}},
            "user_anomalies": []
        }"#;
        let r: AnalysisResult = serde_json::from_str(json).unwrap();
        assert!(r.expenditure_analysis.is_some());
        assert!(r.usable_expenditure().is_none());
    }

    #[test]
    fn test_simulation_field_names() {
        let json = r#"{"impact_description": "Buying a laptop delays your goal.",
            "original_6month_savings": 1200.0, "new_6month_savings": 200.0,
            "monthly_change": -166.67, "recommendations": ["Cut dining", "Sell old laptop"]}"#;
        let s: SimulationResult = serde_json::from_str(json).unwrap();
        assert_eq!(s.original_six_month_savings, 1200.0);
        assert_eq!(s.recommendations.len(), 2);
        assert!(s.error.is_none());
    }

    #[test]
    fn test_transaction_file_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.csv");
        std::fs::write(&path, "Time,Amount\n1,2\n").unwrap();
        let f = TransactionFile::read(&path).unwrap();
        assert_eq!(f.name, "cards.csv");
        assert_eq!(f.content, b"Time,Amount\n1,2\n");
    }
}
