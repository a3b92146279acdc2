//! Page-level state shared by every panel of the dashboard.
//!
//! The shell is a plain state machine: `begin_*` methods turn user intent
//! into a [`Request`], a worker runs it against an [`AnalysisService`], and
//! [`Shell::apply`] folds the [`Completion`] back in. Nothing here blocks.
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::api::AnalysisService;
use crate::error::{Result, IMAGE_FETCH_FAILURE};
use crate::models::{AnalysisResult, ConfusionMatrixImage, SimulationResult, TransactionFile};
use crate::panels::{QueryPanel, SimulatorPanel, Ticket};

pub const NO_FILE: &str = "Please select a CSV file first.";
pub const CONFUSION_FILE_NAME: &str = "confusion_matrix.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Analysis,
    Chatbot,
    Simulator,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Analysis, Tab::Chatbot, Tab::Simulator];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Analysis => "Analysis",
            Tab::Chatbot => "AI Assistant",
            Tab::Simulator => "What-If Simulator",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Tab::Analysis => Tab::Chatbot,
            Tab::Chatbot => Tab::Simulator,
            Tab::Simulator => Tab::Analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfusionState {
    #[default]
    Idle,
    Loading,
    Ready {
        image: ConfusionMatrixImage,
        saved_to: Option<PathBuf>,
    },
    Failed(String),
}

/// Work for a background worker.
#[derive(Debug, Clone)]
pub enum Request {
    Analyze(Ticket, TransactionFile),
    ConfusionMatrix(Ticket, TransactionFile),
    Query(Ticket, String),
    Simulate(Ticket, String),
}

impl Request {
    pub fn run(self, service: &dyn AnalysisService) -> Completion {
        match self {
            Request::Analyze(t, file) => Completion::Analysis(t, service.analyze(&file)),
            Request::ConfusionMatrix(t, file) => {
                Completion::ConfusionMatrix(t, service.fetch_confusion_matrix(&file))
            }
            Request::Query(t, text) => {
                let result = service.query(&text);
                Completion::Query(t, text, result)
            }
            Request::Simulate(t, scenario) => Completion::Simulation(t, service.simulate(&scenario)),
        }
    }
}

/// A finished request, tagged with the ticket it was issued for.
#[derive(Debug)]
pub enum Completion {
    Analysis(Ticket, Result<AnalysisResult>),
    ConfusionMatrix(Ticket, Result<Vec<u8>>),
    Query(Ticket, String, Result<String>),
    Simulation(Ticket, Result<SimulationResult>),
}

#[derive(Debug, Default)]
pub struct Shell {
    pub file: Option<TransactionFile>,
    pub result: Option<AnalysisResult>,
    pub error: String,
    pub loading: bool,
    pub active_tab: Tab,
    pub confusion: ConfusionState,
    pub chat: QueryPanel,
    pub simulator: SimulatorPanel,
    /// Where the confusion-matrix PNG is written once it arrives.
    pub output_dir: Option<PathBuf>,
    generation: Ticket,
}

impl Shell {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir,
            ..Default::default()
        }
    }

    /// Replace the selected file. Result, error and confusion matrix go;
    /// an analysis still in flight keeps its loading flag.
    pub fn select_file(&mut self, file: TransactionFile) {
        info!(file = %file.name, bytes = file.content.len(), "file selected");
        self.file = Some(file);
        self.result = None;
        self.error.clear();
        self.confusion = ConfusionState::Idle;
        self.generation += 1;
    }

    pub fn select_path(&mut self, path: &Path) -> Result<()> {
        let file = TransactionFile::read(path)?;
        self.select_file(file);
        Ok(())
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn analyze_label(&self) -> &'static str {
        if self.loading {
            "Analyzing..."
        } else {
            "Analyze Transactions"
        }
    }

    pub fn begin_analysis(&mut self) -> Option<Request> {
        if self.loading {
            return None;
        }
        let Some(file) = self.file.clone() else {
            self.error = NO_FILE.to_string();
            return None;
        };
        self.loading = true;
        self.error.clear();
        self.result = None;
        self.confusion = ConfusionState::Idle;
        Some(Request::Analyze(self.generation, file))
    }

    pub fn begin_query(&mut self) -> Option<Request> {
        self.chat.begin().map(|(t, q)| Request::Query(t, q))
    }

    pub fn begin_simulation(&mut self) -> Option<Request> {
        self.simulator.begin().map(|(t, s)| Request::Simulate(t, s))
    }

    /// Fold a completion into state. Returns a follow-up request, if any.
    pub fn apply(&mut self, completion: Completion) -> Option<Request> {
        match completion {
            Completion::Analysis(ticket, result) => self.finish_analysis(ticket, result),
            Completion::ConfusionMatrix(ticket, result) => {
                self.finish_confusion(ticket, result);
                None
            }
            Completion::Query(ticket, query, result) => {
                self.chat.finish(ticket, query, result);
                None
            }
            Completion::Simulation(ticket, result) => {
                self.simulator.finish(ticket, result);
                None
            }
        }
    }

    fn finish_analysis(&mut self, ticket: Ticket, result: Result<AnalysisResult>) -> Option<Request> {
        self.loading = false;
        if ticket != self.generation {
            debug!(ticket, current = self.generation, "dropping analysis for a replaced file");
            return None;
        }
        match result {
            Ok(r) => {
                self.result = Some(r);
                self.confusion = ConfusionState::Loading;
                let file = self.file.clone()?;
                Some(Request::ConfusionMatrix(self.generation, file))
            }
            Err(e) => {
                warn!(error = %e, "analysis failed");
                self.error = e.to_string();
                None
            }
        }
    }

    fn finish_confusion(&mut self, ticket: Ticket, result: Result<Vec<u8>>) {
        if ticket != self.generation || self.result.is_none() {
            debug!(ticket, current = self.generation, "dropping stale confusion matrix");
            return;
        }
        self.confusion = match result.and_then(ConfusionMatrixImage::from_png) {
            Ok(image) => {
                let saved_to = self.output_dir.as_deref().and_then(|dir| {
                    image
                        .save(dir, CONFUSION_FILE_NAME)
                        .map_err(|e| warn!(error = %e, "could not save confusion matrix"))
                        .ok()
                });
                ConfusionState::Ready { image, saved_to }
            }
            Err(e) => {
                debug!(error = %e, "confusion matrix unavailable");
                ConfusionState::Failed(IMAGE_FETCH_FAILURE.to_string())
            }
        };
    }

    /// Write the anomaly CSV. `None` when there is no result or no anomaly.
    pub fn export_anomalies(&self, dir: &Path) -> Result<Option<PathBuf>> {
        match &self.result {
            Some(r) => crate::anomalies::export_csv(&r.user_anomalies, dir),
            None => Ok(None),
        }
    }

    /// Write the savings planner. `None` when there is no expenditure analysis.
    #[cfg(feature = "pdf")]
    pub fn export_planner(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(analysis) = self.result.as_ref().and_then(|r| r.usable_expenditure()) else {
            return Ok(None);
        };
        let spend = crate::charts::spend_chart(analysis);
        let compare = crate::charts::comparison_chart(analysis);
        crate::planner_pdf::export_planner(analysis, &[&spend, &compare], dir).map(Some)
    }

    #[cfg(not(feature = "pdf"))]
    pub fn export_planner(&self, _dir: &Path) -> Result<Option<PathBuf>> {
        Err(crate::error::CapitalIqError::Other(
            "PDF export requires the 'pdf' feature".into(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::CapitalIqError;
    use crate::models::fixtures::sample_result;

    /// 1x1 PNG.
    pub const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0xDA, 0x63, 0xFC,
        0xCF, 0xC0, 0x50, 0x0F, 0x00, 0x04, 0x85, 0x01, 0x80, 0x84, 0xA9, 0x8C, 0x21, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    /// Blocking drivers: run a request and every follow-up inline.
    impl Shell {
        pub fn drive(&mut self, request: Request, service: &dyn AnalysisService) {
            let mut next = Some(request);
            while let Some(req) = next.take() {
                next = self.apply(req.run(service));
            }
        }

        pub fn submit_analysis(&mut self, service: &dyn AnalysisService) {
            if let Some(req) = self.begin_analysis() {
                self.drive(req, service);
            }
        }

        pub fn submit_query(&mut self, service: &dyn AnalysisService) {
            if let Some(req) = self.begin_query() {
                self.drive(req, service);
            }
        }

        pub fn submit_simulation(&mut self, service: &dyn AnalysisService) {
            if let Some(req) = self.begin_simulation() {
                self.drive(req, service);
            }
        }
    }

    /// In-memory backend that counts calls.
    #[derive(Default)]
    pub struct FakeService {
        pub calls: AtomicUsize,
        pub fail_analysis: Mutex<Option<String>>,
    }

    impl FakeService {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl AnalysisService for FakeService {
        fn analyze(&self, _file: &TransactionFile) -> Result<AnalysisResult> {
            self.hit();
            match self.fail_analysis.lock().unwrap().clone() {
                Some(message) => Err(CapitalIqError::RemoteAnalysis {
                    message,
                    details: None,
                }),
                None => Ok(sample_result()),
            }
        }

        fn fetch_confusion_matrix(&self, _file: &TransactionFile) -> Result<Vec<u8>> {
            self.hit();
            Ok(TINY_PNG.to_vec())
        }

        fn query(&self, text: &str) -> Result<String> {
            self.hit();
            Ok(format!("echo: {text}"))
        }

        fn simulate(&self, _scenario: &str) -> Result<SimulationResult> {
            self.hit();
            Ok(SimulationResult {
                impact_description: "No change.".into(),
                original_six_month_savings: 100.0,
                new_six_month_savings: 100.0,
                monthly_change: 0.0,
                recommendations: vec!["Keep going".into()],
                error: None,
            })
        }
    }
}
