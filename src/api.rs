//! HTTP client for the remote analysis service.
//!
//! Four independent request/response calls, no retry. Every failure is
//! collapsed into the one display string the matching form shows inline.
use std::time::Duration;

use base64::Engine;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CapitalIqError, Result, GENERIC_FAILURE};
use crate::models::{AnalysisResult, SimulationResult, TransactionFile};
use crate::settings::Settings;

/// The calls the client makes against the analysis backend.
///
/// The dashboard and the one-shot commands only ever talk to this trait, so
/// tests can swap in a fake that never touches the network.
pub trait AnalysisService: Send + Sync {
    fn analyze(&self, file: &TransactionFile) -> Result<AnalysisResult>;
    fn fetch_confusion_matrix(&self, file: &TransactionFile) -> Result<Vec<u8>>;
    fn query(&self, text: &str) -> Result<String>;
    fn simulate(&self, scenario: &str) -> Result<SimulationResult>;
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ImageBody {
    image: String,
}

#[derive(Debug)]
pub struct AnalysisClient {
    base_url: String,
    http: Client,
}

impl AnalysisClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.api_url, Duration::from_secs(settings.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn file_form(file: &TransactionFile) -> Result<Form> {
        let part = Part::bytes(file.content.clone())
            .file_name(file.name.clone())
            .mime_str("text/csv")?;
        Ok(Form::new().part("file", part))
    }

    fn post_file(&self, path: &str, file: &TransactionFile) -> Result<Response> {
        let form = Self::file_form(file)?;
        debug!(path, file = %file.name, bytes = file.content.len(), "uploading file");
        Ok(self.http.post(self.url(path)).multipart(form).send()?)
    }

    fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<Response> {
        debug!(path, "posting json");
        Ok(self.http.post(self.url(path)).json(body).send()?)
    }
}

/// Error text from a failed response body, or the generic message.
fn error_message(body: &str) -> String {
    ErrorBody::parse(body)
        .error
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

fn generic_remote() -> CapitalIqError {
    CapitalIqError::RemoteAnalysis {
        message: GENERIC_FAILURE.to_string(),
        details: None,
    }
}

impl AnalysisService for AnalysisClient {
    fn analyze(&self, file: &TransactionFile) -> Result<AnalysisResult> {
        let resp = match self.post_file("/analyze", file) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "analyze request failed");
                return Err(generic_remote());
            }
        };
        let status = resp.status();
        let body = resp.text().map_err(|e| {
            warn!(error = %e, "could not read analyze response");
            generic_remote()
        })?;
        if !status.is_success() {
            let parsed = ErrorBody::parse(&body);
            warn!(%status, "analyze rejected");
            return Err(match parsed.error.filter(|e| !e.is_empty()) {
                Some(message) => CapitalIqError::RemoteAnalysis {
                    message,
                    details: parsed.details,
                },
                None => generic_remote(),
            });
        }
        let result: AnalysisResult = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "analyze response did not match the result model");
            generic_remote()
        })?;
        info!(
            file = %file.name,
            anomalies = result.user_anomalies.len(),
            "analysis complete"
        );
        Ok(result)
    }

    fn fetch_confusion_matrix(&self, file: &TransactionFile) -> Result<Vec<u8>> {
        let fetch = || -> Result<Vec<u8>> {
            let resp = self.post_file("/confusion-matrix", file)?.error_for_status()?;
            let body: ImageBody = resp.json()?;
            base64::engine::general_purpose::STANDARD
                .decode(body.image.trim())
                .map_err(|e| CapitalIqError::Other(e.to_string()))
        };
        fetch().map_err(|e| {
            warn!(error = %e, "confusion matrix fetch failed");
            CapitalIqError::ImageFetch
        })
    }

    fn query(&self, text: &str) -> Result<String> {
        let failed = |message: String| CapitalIqError::Query { message };
        let resp = self
            .post_json("/query", &serde_json::json!({ "query": text }))
            .map_err(|e| {
                warn!(error = %e, "query request failed");
                failed(GENERIC_FAILURE.to_string())
            })?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|_| failed(GENERIC_FAILURE.to_string()))?;
        if !status.is_success() {
            return Err(failed(error_message(&body)));
        }
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|_| failed(GENERIC_FAILURE.to_string()))?;
        match value.get("response").and_then(|r| r.as_str()) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Ok(serde_json::to_string_pretty(&value)?),
        }
    }

    fn simulate(&self, scenario: &str) -> Result<SimulationResult> {
        let failed = |message: String| CapitalIqError::Simulation { message };
        let resp = self
            .post_json("/simulate", &serde_json::json!({ "scenario": scenario }))
            .map_err(|e| {
                warn!(error = %e, "simulate request failed");
                failed(GENERIC_FAILURE.to_string())
            })?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|_| failed(GENERIC_FAILURE.to_string()))?;
        if !status.is_success() {
            return Err(failed(error_message(&body)));
        }
        let result: SimulationResult =
            serde_json::from_str(&body).map_err(|_| failed(GENERIC_FAILURE.to_string()))?;
        if let Some(message) = result.error.clone() {
            return Err(failed(message));
        }
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Read;
    use std::thread::JoinHandle;

    use tiny_http::{Header, Response, Server, StatusCode};

    /// What the fake backend saw.
    pub struct Captured {
        pub url: String,
        pub body: String,
        pub content_type: String,
    }

    /// Serve exactly one canned response on a free local port.
    pub fn serve_once(status: u16, body: &str) -> (String, JoinHandle<Captured>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let body = body.to_string();
        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            let _ = request.as_reader().read_to_string(&mut received);
            let content_type = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Content-Type"))
                .map(|h| h.value.to_string())
                .unwrap_or_default();
            let captured = Captured {
                url: request.url().to_string(),
                body: received,
                content_type,
            };
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let resp = Response::from_string(body)
                .with_status_code(StatusCode(status))
                .with_header(header);
            let _ = request.respond(resp);
            captured
        });
        (format!("http://127.0.0.1:{port}"), handle)
    }

    /// A base URL nothing is listening on.
    pub fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::fixtures::sample_json;

    fn client(url: &str) -> AnalysisClient {
        AnalysisClient::new(url, Duration::from_secs(5)).unwrap()
    }

    fn csv_file() -> TransactionFile {
        TransactionFile::new("cards.csv", b"Time,Amount,Category\n1,9.99,Dining\n".to_vec())
    }

    #[test]
    fn test_analyze_uploads_multipart_and_parses() {
        let (url, handle) = serve_once(200, sample_json());
        let result = client(&url).analyze(&csv_file()).unwrap();
        let seen = handle.join().unwrap();
        assert_eq!(seen.url, "/analyze");
        assert!(seen.content_type.starts_with("multipart/form-data"));
        assert!(seen.body.contains("name=\"file\""));
        assert!(seen.body.contains("filename=\"cards.csv\""));
        assert!(seen.body.contains("1,9.99,Dining"));
        assert_eq!(result.model_performance.tp, 50);
    }

    #[test]
    fn test_analyze_error_with_details() {
        let body = r#"{"error": "An error occurred during processing", "details": "bad row 3"}"#;
        let (url, handle) = serve_once(500, body);
        let err = client(&url).analyze(&csv_file()).unwrap_err();
        handle.join().unwrap();
        assert_eq!(err.to_string(), "An error occurred during processing: bad row 3");
    }

    #[test]
    fn test_analyze_error_without_usable_body() {
        let (url, handle) = serve_once(502, "<html>Bad Gateway</html>");
        let err = client(&url).analyze(&csv_file()).unwrap_err();
        handle.join().unwrap();
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[test]
    fn test_analyze_transport_failure() {
        let err = client(&dead_url()).analyze(&csv_file()).unwrap_err();
        assert!(matches!(err, CapitalIqError::RemoteAnalysis { .. }));
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[test]
    fn test_confusion_matrix_decodes_base64() {
        let (url, handle) = serve_once(200, r#"{"image": "iVBORw0KGgo="}"#);
        let bytes = client(&url).fetch_confusion_matrix(&csv_file()).unwrap();
        let seen = handle.join().unwrap();
        assert_eq!(seen.url, "/confusion-matrix");
        assert_eq!(bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_confusion_matrix_failures_collapse() {
        let (url, handle) = serve_once(500, r#"{"error": "model missing"}"#);
        let err = client(&url).fetch_confusion_matrix(&csv_file()).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, CapitalIqError::ImageFetch));

        let (url, handle) = serve_once(200, r#"{"image": "***not base64***"}"#);
        let err = client(&url).fetch_confusion_matrix(&csv_file()).unwrap_err();
        handle.join().unwrap();
        assert_eq!(err.to_string(), "Failed to load confusion matrix image.");
    }

    #[test]
    fn test_query_sends_json_and_reads_response() {
        let (url, handle) = serve_once(200, r#"{"response": "You spent $42.10 on coffee."}"#);
        let text = client(&url).query("How much on coffee?").unwrap();
        let seen = handle.join().unwrap();
        assert_eq!(seen.url, "/query");
        assert!(seen.content_type.starts_with("application/json"));
        let sent: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(sent["query"], "How much on coffee?");
        assert_eq!(text, "You spent $42.10 on coffee.");
    }

    #[test]
    fn test_query_without_response_field_shows_body() {
        let (url, handle) = serve_once(200, r#"{"total": 12}"#);
        let text = client(&url).query("total?").unwrap();
        handle.join().unwrap();
        assert!(text.contains("\"total\": 12"));
    }

    #[test]
    fn test_query_error_message() {
        let (url, handle) = serve_once(400, r#"{"error": "Please upload a file first."}"#);
        let err = client(&url).query("anything").unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, CapitalIqError::Query { .. }));
        assert_eq!(err.to_string(), "Please upload a file first.");
    }

    #[test]
    fn test_simulate_roundtrip() {
        let body = r#"{"impact_description": "Savings drop.", "original_6month_savings": 900,
            "new_6month_savings": -100, "monthly_change": -166.67, "recommendations": ["Wait a month"]}"#;
        let (url, handle) = serve_once(200, body);
        let sim = client(&url).simulate("buy a $1,000 laptop").unwrap();
        let seen = handle.join().unwrap();
        assert_eq!(seen.url, "/simulate");
        let sent: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(sent["scenario"], "buy a $1,000 laptop");
        assert_eq!(sim.new_six_month_savings, -100.0);
        assert_eq!(sim.recommendations, vec!["Wait a month".to_string()]);
    }

    #[test]
    fn test_simulate_error_in_success_body() {
        let (url, handle) = serve_once(200, r#"{"error": "Could not parse scenario."}"#);
        let err = client(&url).simulate("???").unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, CapitalIqError::Simulation { .. }));
        assert_eq!(err.to_string(), "Could not parse scenario.");
    }

    #[test]
    fn test_simulate_transport_failure() {
        let err = client(&dead_url()).simulate("anything").unwrap_err();
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }
}
