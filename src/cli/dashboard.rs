use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};
use tracing::{debug, info};

use crate::anomalies;
use crate::api::{AnalysisClient, AnalysisService};
use crate::charts::{comparison_chart, spend_chart, CategoryChart};
use crate::error::Result;
use crate::metrics::{count_lines, metric_lines, METRICS_BLURB, METRICS_TITLE};
use crate::models::AnalysisResult;
use crate::panels::{EXAMPLE_QUERIES, EXAMPLE_SCENARIOS};
use crate::settings::{load_settings, shellexpand_path};
use crate::shell::{Completion, ConfusionState, Request, Shell, Tab};
use crate::tui::{
    install_panic_hook, money_span, signed_money_span, InputAction, LineInput, BOLD, ERROR_STYLE,
    FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE,
};

pub const NO_CHART_DATA: &str = "No category spending data to visualize.";
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Browse,
    FilePath,
    Query,
    Scenario,
}

struct Dashboard {
    shell: Shell,
    service: Arc<dyn AnalysisService>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    focus: Focus,
    file_input: String,
    input: LineInput,
    output_dir: PathBuf,
    anomaly_offset: usize,
    status_message: Option<String>,
}

impl Dashboard {
    fn new(service: Arc<dyn AnalysisService>, output_dir: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            shell: Shell::new(Some(output_dir.clone())),
            service,
            tx,
            rx,
            focus: Focus::Browse,
            file_input: String::new(),
            input: LineInput::default(),
            output_dir,
            anomaly_offset: 0,
            status_message: None,
        }
    }

    /// Run a request on its own thread; the completion comes back on `rx`.
    fn dispatch(&self, request: Request) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(request.run(service.as_ref()));
        });
    }

    /// Fold in whatever workers have finished since the last frame.
    fn drain_completions(&mut self) {
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(follow_up) = self.shell.apply(completion) {
                self.dispatch(follow_up);
            }
        }
    }

    fn select_file(&mut self, raw: &str) {
        let path = PathBuf::from(shellexpand_path(raw.trim()));
        match self.shell.select_path(&path) {
            Ok(()) => {
                self.anomaly_offset = 0;
                self.status_message = None;
            }
            Err(e) => self.status_message = Some(format!("Could not read {}: {e}", path.display())),
        }
    }

    fn analyze(&mut self) {
        if let Some(req) = self.shell.begin_analysis() {
            self.anomaly_offset = 0;
            self.dispatch(req);
        }
    }

    fn export_csv(&mut self) {
        self.status_message = Some(match self.shell.export_anomalies(&self.output_dir) {
            Ok(Some(path)) => format!("Exported anomalies to {}", path.display()),
            Ok(None) => "No anomalies to export.".to_string(),
            Err(e) => format!("Export failed: {e}"),
        });
    }

    fn export_pdf(&mut self) {
        self.status_message = Some(match self.shell.export_planner(&self.output_dir) {
            Ok(Some(path)) => format!("Exported savings planner to {}", path.display()),
            Ok(None) => "No savings plan to export.".to_string(),
            Err(e) => format!("Export failed: {e}"),
        });
    }

    fn focus_on(&mut self, focus: Focus) {
        let blocked = match focus {
            Focus::Query => self.shell.chat.loading,
            Focus::Scenario => self.shell.simulator.loading,
            _ => false,
        };
        if blocked {
            return;
        }
        let current = match focus {
            Focus::FilePath => self.file_input.as_str(),
            Focus::Query => self.shell.chat.input.as_str(),
            Focus::Scenario => self.shell.simulator.input.as_str(),
            Focus::Browse => "",
        };
        self.input.reset(current);
        self.focus = focus;
    }

    /// Handle one key press. Returns true when the dashboard should close.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match self.focus {
            Focus::Browse => return self.handle_browse_key(code),
            Focus::FilePath => match self.input.handle_key(&mut self.file_input, code) {
                InputAction::Submit => {
                    let raw = self.file_input.clone();
                    if !raw.trim().is_empty() {
                        self.select_file(&raw);
                    }
                    self.focus = Focus::Browse;
                }
                InputAction::Cancel => self.focus = Focus::Browse,
                InputAction::Continue => {}
            },
            Focus::Query => {
                match self.input.handle_key(&mut self.shell.chat.input, code) {
                    InputAction::Submit => {
                        if let Some(req) = self.shell.begin_query() {
                            self.dispatch(req);
                            self.focus = Focus::Browse;
                        }
                    }
                    InputAction::Cancel => self.focus = Focus::Browse,
                    InputAction::Continue => {}
                }
            }
            Focus::Scenario => {
                match self.input.handle_key(&mut self.shell.simulator.input, code) {
                    InputAction::Submit => {
                        if let Some(req) = self.shell.begin_simulation() {
                            self.dispatch(req);
                            self.focus = Focus::Browse;
                        }
                    }
                    InputAction::Cancel => self.focus = Focus::Browse,
                    InputAction::Continue => {}
                }
            }
        }
        false
    }

    fn handle_browse_key(&mut self, code: KeyCode) -> bool {
        self.status_message = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::Right => {
                let next = self.shell.active_tab.next();
                self.shell.select_tab(next);
            }
            KeyCode::BackTab | KeyCode::Left => {
                let prev = self.shell.active_tab.next().next();
                self.shell.select_tab(prev);
            }
            KeyCode::Char('f') => self.focus_on(Focus::FilePath),
            KeyCode::Char('a') => self.analyze(),
            KeyCode::Char('e') => self.export_csv(),
            KeyCode::Char('p') => self.export_pdf(),
            KeyCode::Up => self.anomaly_offset = self.anomaly_offset.saturating_sub(1),
            KeyCode::Down => {
                let max = self
                    .shell
                    .result
                    .as_ref()
                    .map(|r| r.user_anomalies.len().saturating_sub(1))
                    .unwrap_or(0);
                self.anomaly_offset = (self.anomaly_offset + 1).min(max);
            }
            KeyCode::Enter | KeyCode::Char('i') => match self.shell.active_tab {
                Tab::Analysis => self.analyze(),
                Tab::Chatbot => self.focus_on(Focus::Query),
                Tab::Simulator => self.focus_on(Focus::Scenario),
            },
            KeyCode::Char(c @ '1'..='4') => {
                let idx = (c as u8 - b'1') as usize;
                match self.shell.active_tab {
                    Tab::Chatbot if !self.shell.chat.loading => {
                        self.shell.chat.input = EXAMPLE_QUERIES[idx].to_string();
                        self.focus_on(Focus::Query);
                    }
                    Tab::Simulator if !self.shell.simulator.loading => {
                        self.shell.simulator.input = EXAMPLE_SCENARIOS[idx].to_string();
                        self.focus_on(Focus::Scenario);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        false
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep1, body_area, sep2, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(" Capital IQ: Fraud Detection & Spending Insights").style(HEADER_STYLE),
            header_area,
        );

        let sep_line = "━".repeat(area.width as usize);
        let sep_widget = Paragraph::new(sep_line.as_str()).style(border_style);
        frame.render_widget(sep_widget.clone(), sep1);
        frame.render_widget(sep_widget, sep2);

        let [left_area, right_area] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
                .areas(body_area);

        self.draw_left(frame, left_area);
        self.draw_right(frame, right_area);

        let hints = match &self.status_message {
            Some(msg) => Paragraph::new(format!(" {msg}")).style(Style::default().fg(Color::Yellow)),
            None => Paragraph::new(self.hints()).style(FOOTER_STYLE),
        };
        frame.render_widget(hints, hints_area);
    }

    /// Footer key hints. Export keys only appear when there is something to export.
    fn hints(&self) -> String {
        let hint = match self.focus {
            Focus::Browse => match self.shell.active_tab {
                Tab::Analysis => {
                    let result = self.shell.result.as_ref();
                    let mut keys = vec!["f=file", "a=analyze"];
                    if result.is_some_and(|r| !r.user_anomalies.is_empty()) {
                        keys.push("e=export CSV");
                    }
                    if result.and_then(AnalysisResult::usable_expenditure).is_some() {
                        keys.push("p=export PDF");
                    }
                    keys.extend(["Up/Down=scroll", "Tab=switch", "q=quit"]);
                    return format!(" {}", keys.join("  "));
                }
                Tab::Chatbot | Tab::Simulator => {
                    " i=type  1-4=example  f=file  a=analyze  Tab=switch  q=quit"
                }
            },
            Focus::FilePath => " Enter=select file  Esc=cancel",
            Focus::Query => " Enter=ask  Esc=cancel",
            Focus::Scenario => " Enter=simulate  Esc=cancel",
        };
        hint.to_string()
    }

    fn draw_left(&self, frame: &mut Frame, area: Rect) {
        let shell = &self.shell;
        let mut lines = vec![Line::from(Span::styled(" Upload Transactions", BOLD))];

        if self.focus == Focus::FilePath {
            lines.push(Line::from(format!(
                " Path: {}",
                with_cursor(&self.file_input, self.input.cursor)
            )));
        } else {
            let name = shell
                .file
                .as_ref()
                .map(|f| f.name.as_str())
                .unwrap_or("(no file selected)");
            lines.push(Line::from(format!(" File: {name}")));
        }
        lines.push(Line::from(Span::styled(
            format!(" [a] {}", shell.analyze_label()),
            if shell.loading { FOOTER_STYLE } else { SELECTED_STYLE },
        )));

        if !shell.error.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!(" {}", shell.error), ERROR_STYLE)));
        }

        match &shell.confusion {
            ConfusionState::Idle => {}
            ConfusionState::Loading => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(" Loading confusion matrix...", FOOTER_STYLE)));
            }
            ConfusionState::Ready { image, saved_to } => {
                lines.push(Line::from(""));
                lines.push(Line::from(format!(
                    " Confusion matrix: {}x{} px",
                    image.width, image.height
                )));
                if let Some(path) = saved_to {
                    lines.push(Line::from(Span::styled(
                        format!(" saved to {}", path.display()),
                        FOOTER_STYLE,
                    )));
                }
            }
            ConfusionState::Failed(msg) => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(format!(" {msg}"), ERROR_STYLE)));
            }
        }

        if let Some(result) = &shell.result {
            let perf = &result.model_performance;
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!(" {METRICS_TITLE}"), BOLD)));
            lines.push(Line::from(Span::styled(format!(" {METRICS_BLURB}"), FOOTER_STYLE)));
            for line in count_lines(perf).iter().chain(metric_lines(perf).iter()) {
                lines.push(Line::from(format!(" {}", line.render())));
            }
        }

        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::RIGHT).border_style(FOOTER_STYLE)),
            area,
        );
    }

    fn draw_right(&self, frame: &mut Frame, area: Rect) {
        let [tabs_area, content_area] =
            Layout::vertical([Constraint::Length(2), Constraint::Fill(1)]).areas(area);

        let selected = Tab::ALL
            .iter()
            .position(|t| *t == self.shell.active_tab)
            .unwrap_or(0);
        let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
        frame.render_widget(
            Tabs::new(titles)
                .select(selected)
                .highlight_style(SELECTED_STYLE)
                .divider("|")
                .block(Block::default().borders(Borders::BOTTOM).border_style(FOOTER_STYLE)),
            tabs_area,
        );

        match self.shell.active_tab {
            Tab::Analysis => self.draw_analysis(frame, content_area),
            Tab::Chatbot => self.draw_chat(frame, content_area),
            Tab::Simulator => self.draw_simulator(frame, content_area),
        }
    }

    fn draw_analysis(&self, frame: &mut Frame, area: Rect) {
        let Some(result) = &self.shell.result else {
            let msg = if self.shell.loading {
                " Analyzing your transactions..."
            } else {
                " Select a CSV file (f) and analyze it (a) to see spending insights."
            };
            frame.render_widget(Paragraph::new(msg).style(FOOTER_STYLE), area);
            return;
        };

        let anomaly_rows = result.user_anomalies.len().min(8) as u16;
        let [spend_area, plan_area, anomaly_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(6),
            Constraint::Length(anomaly_rows + 3),
        ])
        .areas(area);

        match &result.expenditure_analysis {
            Some(e) if e.error.is_some() => {
                frame.render_widget(
                    Paragraph::new(format!(" {}", e.error.as_deref().unwrap_or_default()))
                        .style(ERROR_STYLE)
                        .wrap(Wrap { trim: false }),
                    spend_area,
                );
            }
            Some(e) => {
                let [total_area, charts_area] =
                    Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(spend_area);
                frame.render_widget(
                    Paragraph::new(Line::from(vec![
                        Span::styled(" Total Spend  ", BOLD),
                        money_span(e.total_spend),
                    ])),
                    total_area,
                );
                let [left, right] =
                    Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                        .areas(charts_area);
                draw_chart(frame, left, &spend_chart(e));
                draw_chart(frame, right, &comparison_chart(e));

                let mut plan = vec![Line::from(Span::styled(" Savings Plan", BOLD))];
                plan.extend(e.suggestion_lines().into_iter().map(|s| Line::from(format!(" {s}"))));
                frame.render_widget(Paragraph::new(plan).wrap(Wrap { trim: false }), plan_area);
            }
            None => {}
        }

        self.draw_anomalies(frame, anomaly_area, result);
    }

    fn draw_anomalies(&self, frame: &mut Frame, area: Rect, result: &AnalysisResult) {
        let [summary_area, table_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);

        let summary = anomalies::summary(&result.user_anomalies);
        let style = if result.user_anomalies.is_empty() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Yellow)
        };
        frame.render_widget(Paragraph::new(format!(" {summary}")).style(style), summary_area);

        if result.user_anomalies.is_empty() {
            return;
        }
        let rows: Vec<Row> = anomalies::rows(&result.user_anomalies)
            .into_iter()
            .skip(self.anomaly_offset)
            .map(|r| Row::new(vec![r.time, r.amount, r.category]))
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Length(12),
                Constraint::Length(12),
                Constraint::Fill(1),
            ],
        )
        .header(Row::new(vec!["Time", "Amount", "Category"]).style(BOLD));
        frame.render_widget(table, table_area);
    }

    fn draw_chat(&self, frame: &mut Frame, area: Rect) {
        let chat = &self.shell.chat;
        let mut lines = vec![Line::from(Span::styled(" Examples", BOLD))];
        for (i, q) in EXAMPLE_QUERIES.iter().enumerate() {
            lines.push(Line::from(Span::styled(format!(" {}. {q}", i + 1), FOOTER_STYLE)));
        }
        lines.push(Line::from(""));
        lines.push(input_line(
            &chat.input,
            self.focus == Focus::Query,
            self.input.cursor,
            chat.button_label(),
            chat.loading,
        ));

        if !chat.error.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!(" {}", chat.error), ERROR_STYLE)));
        }
        if let Some(exchange) = &chat.exchange {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled(" You: ", BOLD),
                Span::raw(exchange.query.clone()),
            ]));
            lines.push(Line::from(Span::styled(" AI:", BOLD)));
            for l in exchange.response_text.lines() {
                lines.push(Line::from(format!(" {l}")));
            }
        }
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
    }

    fn draw_simulator(&self, frame: &mut Frame, area: Rect) {
        let sim = &self.shell.simulator;
        let mut lines = vec![Line::from(Span::styled(" Examples", BOLD))];
        for (i, s) in EXAMPLE_SCENARIOS.iter().enumerate() {
            lines.push(Line::from(Span::styled(format!(" {}. {s}", i + 1), FOOTER_STYLE)));
        }
        lines.push(Line::from(""));
        lines.push(input_line(
            &sim.input,
            self.focus == Focus::Scenario,
            self.input.cursor,
            sim.button_label(),
            sim.loading,
        ));

        if !sim.error.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!(" {}", sim.error), ERROR_STYLE)));
        }
        if let Some(result) = &sim.simulation {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(" Simulation Results", BOLD)));
            lines.push(Line::from(format!(" {}", result.impact_description)));
            lines.push(Line::from(vec![
                Span::raw(" Original 6-month savings  "),
                signed_money_span(result.original_six_month_savings),
            ]));
            lines.push(Line::from(vec![
                Span::raw(" New 6-month savings       "),
                signed_money_span(result.new_six_month_savings),
            ]));
            lines.push(Line::from(vec![
                Span::raw(" Monthly change            "),
                signed_money_span(result.monthly_change),
            ]));
            if !result.recommendations.is_empty() {
                lines.push(Line::from(Span::styled(" Recommendations", BOLD)));
                for r in &result.recommendations {
                    lines.push(Line::from(format!(" - {r}")));
                }
            }
        }
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
    }
}

fn with_cursor(buf: &str, cursor: usize) -> String {
    let mut out: String = buf.chars().take(cursor).collect();
    out.push('▏');
    out.extend(buf.chars().skip(cursor));
    out
}

fn input_line(
    buf: &str,
    focused: bool,
    cursor: usize,
    label: &'static str,
    loading: bool,
) -> Line<'static> {
    let text = if focused {
        with_cursor(buf, cursor)
    } else {
        buf.to_string()
    };
    let field_style = if loading { FOOTER_STYLE } else { Style::default() };
    Line::from(vec![
        Span::styled(format!(" > {text} "), field_style),
        Span::styled(
            format!("[{label}]"),
            if loading { FOOTER_STYLE } else { SELECTED_STYLE },
        ),
    ])
}

fn draw_chart(frame: &mut Frame, area: Rect, chart: &CategoryChart) {
    let block = Block::default()
        .title(chart.title)
        .title_style(BOLD)
        .borders(Borders::NONE);

    if chart.is_empty() {
        frame.render_widget(
            Paragraph::new(NO_CHART_DATA).style(FOOTER_STYLE).block(block),
            area,
        );
        return;
    }

    let [legend_area, bars_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);
    let legend: Vec<Span> = chart
        .series
        .iter()
        .flat_map(|s| {
            let [r, g, b] = s.color;
            [
                Span::styled("■ ", Style::default().fg(Color::Rgb(r, g, b))),
                Span::styled(format!("{}  ", s.label), FOOTER_STYLE),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(legend)), legend_area);

    let groups: Vec<BarGroup> = chart
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let bars: Vec<Bar> = chart
                .series
                .iter()
                .map(|s| {
                    let [r, g, b] = s.color;
                    let value = s.values.get(i).copied().unwrap_or(0.0).max(0.0);
                    Bar::default()
                        .value(value.round() as u64)
                        .style(Style::default().fg(Color::Rgb(r, g, b)))
                })
                .collect();
            BarGroup::default()
                .label(Line::from(label.clone()))
                .bars(&bars)
        })
        .collect();

    let mut widget = BarChart::default()
        .block(block)
        .bar_width(3)
        .bar_gap(0)
        .group_gap(2);
    for group in &groups {
        widget = widget.data(group.clone());
    }
    frame.render_widget(widget, bars_area);
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

pub fn run(file: Option<String>) -> Result<()> {
    let settings = load_settings();
    let client = AnalysisClient::from_settings(&settings)?;
    info!(api = client.base_url(), "dashboard starting");

    let output_dir = PathBuf::from(shellexpand_path(&settings.output_dir));
    let mut dashboard = Dashboard::new(Arc::new(client), output_dir);
    if let Some(f) = file {
        dashboard.file_input = f.clone();
        dashboard.select_file(&f);
    }

    install_panic_hook();
    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        dashboard.drain_completions();

        if let Err(e) = terminal.draw(|frame| dashboard.draw(frame)) {
            break Err(e.into());
        }

        match event::poll(TICK) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => break Err(e.into()),
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    break Ok(());
                }
                if dashboard.handle_key(key.code) {
                    break Ok(());
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    debug!("dashboard closed");
    result
}
