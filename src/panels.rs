//! Single-field forms that round-trip free text to the backend.
use tracing::debug;

use crate::error::Result;
use crate::models::{ChatExchange, SimulationResult};

/// Generation number a request was issued for. Completions carrying an
/// older ticket are dropped.
pub type Ticket = u64;

pub const EXAMPLE_QUERIES: &[&str] = &[
    "How much did I spend on coffee last month vs this month?",
    "What's my total spending?",
    "How much did I spend on dining?",
    "How many anomalous transactions do I have?",
];

pub const EXAMPLE_SCENARIOS: &[&str] = &[
    "What happens to my 6-month savings plan if I buy a $1,000 laptop today?",
    "How would cutting dining expenses by 50% affect my savings?",
    "What if I start saving $200 more per month?",
    "Impact of a $500 emergency expense on my budget",
];

#[derive(Debug, Default)]
pub struct QueryPanel {
    pub input: String,
    pub exchange: Option<ChatExchange>,
    pub error: String,
    pub loading: bool,
    ticket: Ticket,
}

impl QueryPanel {
    pub fn button_label(&self) -> &'static str {
        if self.loading {
            "Thinking..."
        } else {
            "Ask"
        }
    }

    /// Start a submission. Blank input or a pending request leaves every
    /// field as it was and returns `None`.
    pub fn begin(&mut self) -> Option<(Ticket, String)> {
        if self.loading || self.input.trim().is_empty() {
            return None;
        }
        self.loading = true;
        self.error.clear();
        self.exchange = None;
        self.ticket += 1;
        Some((self.ticket, self.input.clone()))
    }

    pub fn finish(&mut self, ticket: Ticket, query: String, result: Result<String>) {
        if ticket != self.ticket {
            debug!(ticket, current = self.ticket, "dropping stale query response");
            return;
        }
        match result {
            Ok(response_text) => {
                self.exchange = Some(ChatExchange {
                    query,
                    response_text,
                })
            }
            Err(e) => self.error = e.to_string(),
        }
        self.loading = false;
    }
}

#[derive(Debug, Default)]
pub struct SimulatorPanel {
    pub input: String,
    pub simulation: Option<SimulationResult>,
    pub error: String,
    pub loading: bool,
    ticket: Ticket,
}

impl SimulatorPanel {
    pub fn button_label(&self) -> &'static str {
        if self.loading {
            "Simulating..."
        } else {
            "Simulate"
        }
    }

    pub fn begin(&mut self) -> Option<(Ticket, String)> {
        if self.loading || self.input.trim().is_empty() {
            return None;
        }
        self.loading = true;
        self.error.clear();
        self.simulation = None;
        self.ticket += 1;
        Some((self.ticket, self.input.clone()))
    }

    pub fn finish(&mut self, ticket: Ticket, result: Result<SimulationResult>) {
        if ticket != self.ticket {
            debug!(ticket, current = self.ticket, "dropping stale simulation");
            return;
        }
        match result {
            Ok(sim) => self.simulation = Some(sim),
            Err(e) => self.error = e.to_string(),
        }
        self.loading = false;
    }
}
