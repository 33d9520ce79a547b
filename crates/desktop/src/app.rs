//! Duet Desktop — egui app state and UI.

use eframe::egui;
use lib::bridge::{BridgeClient, StreamEvent, StreamKind};
use lib::config::{self, Config};
use lib::handshake::{self, DualTopicPrompt, TopicCheck};
use lib::launcher::{self, BackendProcess};
use lib::model::{self, ModelId};
use lib::shell::{ChatShell, SurfaceId};
use lib::surface::{Message as ChatMessage, Role};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};

const CHAT_INPUT_HEIGHT: f32 = 110.0;
const CHAT_MESSAGES_MIN_HEIGHT: f32 = 80.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;

/// Ring buffer of log lines for the Logs screen. Written by ShellLogger,
/// which also receives the backend process output forwarded by the
/// launcher threads.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

fn clock_label() -> String {
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = t.as_secs();
    let millis = t.subsec_millis();
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, millis)
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct ShellLogger;

impl log::Log for ShellLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = if record.target() == "backend" {
            format!("{} [backend] {}", clock_label(), record.args())
        } else {
            format!("{} [{}] {}", clock_label(), record.level(), record.args())
        };
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: ShellLogger = ShellLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Logs,
}

/// Health of the backend subprocess and its bridge, as seen by the UI.
#[derive(Clone, PartialEq, Eq)]
enum BackendState {
    Starting,
    Ready,
    Failed(String),
}

/// Commands from the UI thread to the bridge worker.
enum WorkerCmd {
    /// Stream a message into an already-subscribed session.
    Dispatch { session_id: String, text: String },
    /// Ask the backend whether the message spans two topics.
    CheckTopics { text: String },
    /// Activate the second assistant, subscribe its session, and stream
    /// the pending message into it (activation is best-effort).
    OpenSecond { session_id: String, text: String },
    /// Deactivate (best-effort) and stop routing the session's events.
    CloseSecond { session_id: String },
    SetModel {
        surface: SurfaceId,
        session_id: String,
        model: ModelId,
    },
    Clear { session_id: String },
}

/// Results and push events from the bridge worker to the UI thread.
enum UiEvent {
    Ready,
    BackendFailed(String),
    Stream(StreamEvent),
    TopicVerdict { text: String, dual: bool },
    DispatchFailed { session_id: String, message: String },
    ModelSet { surface: SurfaceId, line: String },
    ModelError { surface: SurfaceId, message: String },
}

/// Forward a session's stream events into the UI channel.
fn forward_stream(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<StreamEvent>,
    ui_tx: mpsc::Sender<UiEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if ui_tx.send(UiEvent::Stream(event)).is_err() {
                break;
            }
        }
    });
}

/// Bridge worker: waits for the backend to become ready, connects, then
/// serves UI commands until the command channel closes. Runs on its own
/// thread with its own runtime so the UI never blocks on the bridge.
fn spawn_bridge_worker(
    config: Config,
    primary_session: String,
    ui_tx: mpsc::Sender<UiEvent>,
) -> tokio::sync::mpsc::UnboundedSender<WorkerCmd> {
    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<WorkerCmd>();
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = ui_tx.send(UiEvent::BackendFailed(format!("runtime: {}", e)));
                return;
            }
        };
        rt.block_on(async move {
            if let Err(e) = launcher::wait_ready(&config.backend).await {
                let _ = ui_tx.send(UiEvent::BackendFailed(e.to_string()));
                return;
            }
            let bridge = match BridgeClient::connect(&config::ws_url(&config)).await {
                Ok(bridge) => bridge,
                Err(e) => {
                    let _ = ui_tx.send(UiEvent::BackendFailed(e.to_string()));
                    return;
                }
            };
            forward_stream(bridge.subscribe(&primary_session).await, ui_tx.clone());
            let _ = ui_tx.send(UiEvent::Ready);

            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    WorkerCmd::Dispatch { session_id, text } => {
                        if let Err(e) = bridge.send_message_stream(&session_id, &text).await {
                            let _ = ui_tx.send(UiEvent::DispatchFailed {
                                session_id,
                                message: e.to_string(),
                            });
                        }
                    }
                    WorkerCmd::CheckTopics { text } => {
                        let dual = matches!(
                            handshake::check_dual_topics(&bridge, &text, false).await,
                            TopicCheck::Dual(_)
                        );
                        let _ = ui_tx.send(UiEvent::TopicVerdict { text, dual });
                    }
                    WorkerCmd::OpenSecond { session_id, text } => {
                        handshake::activate_second(&bridge, &session_id).await;
                        forward_stream(bridge.subscribe(&session_id).await, ui_tx.clone());
                        if let Err(e) = bridge.send_message_stream(&session_id, &text).await {
                            let _ = ui_tx.send(UiEvent::DispatchFailed {
                                session_id,
                                message: e.to_string(),
                            });
                        }
                    }
                    WorkerCmd::CloseSecond { session_id } => {
                        handshake::deactivate_second(&bridge, &session_id).await;
                        bridge.unsubscribe(&session_id).await;
                    }
                    WorkerCmd::SetModel {
                        surface,
                        session_id,
                        model,
                    } => {
                        let event = match model::select_model(&bridge, &session_id, model).await {
                            Ok(line) => UiEvent::ModelSet { surface, line },
                            Err(e) => UiEvent::ModelError {
                                surface,
                                message: e.to_string(),
                            },
                        };
                        let _ = ui_tx.send(event);
                    }
                    WorkerCmd::Clear { session_id } => {
                        if let Err(e) = bridge.clear_conversation(&session_id).await {
                            log::warn!("clear_conversation failed: {}", e);
                        }
                    }
                }
            }
        });
    });
    cmd_tx
}

pub struct DuetApp {
    config: Config,
    /// The backend subprocess when this shell spawned it. None when a
    /// backend was already responding on the configured port.
    backend: Option<BackendProcess>,
    backend_state: BackendState,
    shell: ChatShell,
    cmd_tx: Option<tokio::sync::mpsc::UnboundedSender<WorkerCmd>>,
    ui_rx: mpsc::Receiver<UiEvent>,
    primary_input: String,
    second_input: String,
    primary_model: ModelId,
    second_model: ModelId,
    /// Set while a primary send waits on the topic-check round trip.
    awaiting_verdict: bool,
    /// The unresolved dual-topic question behind the modal.
    pending_prompt: Option<DualTopicPrompt>,
    current_screen: Screen,
}

impl DuetApp {
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    const SCREEN_FOOTER_SPACING: f32 = 32.0;

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let (mut config, _) = config::load_config(None).unwrap_or_else(|e| {
            log::warn!("failed to load config, using defaults: {}", e);
            (Config::default(), std::path::PathBuf::new())
        });
        config.backend.port = config::resolve_backend_port(&config);

        let shell = ChatShell::new();
        let (ui_tx, ui_rx) = mpsc::channel();

        // Attach to a backend someone else left running, otherwise own one.
        let mut backend = None;
        let mut backend_state = BackendState::Starting;
        if launcher::probe(&config.backend.host, config.backend.port) {
            log::info!("backend already responding on port {}", config.backend.port);
        } else {
            match BackendProcess::spawn(&config.backend) {
                Ok(process) => backend = Some(process),
                Err(e) => backend_state = BackendState::Failed(e.to_string()),
            }
        }

        let cmd_tx = if matches!(backend_state, BackendState::Starting) {
            Some(spawn_bridge_worker(
                config.clone(),
                shell.primary().session_id.clone(),
                ui_tx,
            ))
        } else {
            None
        };

        let default_model = config.models.default;
        Self {
            config,
            backend,
            backend_state,
            shell,
            cmd_tx,
            ui_rx,
            primary_input: String::new(),
            second_input: String::new(),
            primary_model: default_model,
            second_model: default_model,
            awaiting_verdict: false,
            pending_prompt: None,
            current_screen: Screen::default(),
        }
    }

    fn send_cmd(&self, cmd: WorkerCmd) {
        if let Some(ref tx) = self.cmd_tx {
            let _ = tx.send(cmd);
        }
    }

    fn bridge_ready(&self) -> bool {
        self.backend_state == BackendState::Ready
    }

    /// Stream a message into the primary session.
    fn dispatch_primary(&mut self, text: String) {
        let session_id = self.shell.primary().session_id.clone();
        let primary = &mut self.shell.primary_mut().surface;
        primary.push_user(text.clone());
        primary.begin_stream();
        self.send_cmd(WorkerCmd::Dispatch { session_id, text });
    }

    /// A send from the primary input: run the topic check first unless a
    /// second assistant already exists.
    fn start_primary_send(&mut self) {
        let text = self.primary_input.trim().to_string();
        if text.is_empty() || !self.bridge_ready() {
            return;
        }
        if self.shell.primary().surface.is_streaming() || self.awaiting_verdict {
            return;
        }
        self.primary_input.clear();
        if self.shell.second_active() {
            self.dispatch_primary(text);
            return;
        }
        self.awaiting_verdict = true;
        self.shell.primary_mut().surface.hold_input();
        self.send_cmd(WorkerCmd::CheckTopics { text });
    }

    /// A send from the second pane goes straight to its session.
    fn start_second_send(&mut self) {
        let text = self.second_input.trim().to_string();
        if text.is_empty() || !self.bridge_ready() {
            return;
        }
        let Some(bound) = self.shell.second_mut() else {
            return;
        };
        if bound.surface.is_streaming() {
            return;
        }
        self.second_input.clear();
        let session_id = bound.session_id.clone();
        bound.surface.push_user(text.clone());
        bound.surface.begin_stream();
        self.send_cmd(WorkerCmd::Dispatch { session_id, text });
    }

    /// Accept the dual-topic prompt: open the second surface and stream
    /// the pending message there.
    fn accept_prompt(&mut self, prompt: DualTopicPrompt) {
        let text = prompt.accept();
        let session_id = self.shell.open_second();
        if let Some(bound) = self.shell.second_mut() {
            bound.surface.push_user(text.clone());
            bound.surface.begin_stream();
        }
        self.shell.primary_mut().surface.release_input();
        self.send_cmd(WorkerCmd::OpenSecond { session_id, text });
    }

    /// Decline: the pending message goes into the primary session only.
    fn decline_prompt(&mut self, prompt: DualTopicPrompt) {
        let text = prompt.decline();
        self.shell.primary_mut().surface.release_input();
        self.dispatch_primary(text);
    }

    fn close_second(&mut self) {
        if let Some(session_id) = self.shell.close_second() {
            self.send_cmd(WorkerCmd::CloseSecond { session_id });
            self.second_input.clear();
        }
    }

    fn clear_surface(&mut self, id: SurfaceId) {
        let Some(bound) = self.shell.surface_mut(id) else {
            return;
        };
        bound.surface.clear();
        let session_id = bound.session_id.clone();
        self.send_cmd(WorkerCmd::Clear { session_id });
    }

    fn change_model(&mut self, id: SurfaceId, model: ModelId) {
        let Some(bound) = self.shell.surface(id) else {
            return;
        };
        let session_id = bound.session_id.clone();
        match id {
            SurfaceId::Primary => self.primary_model = model,
            SurfaceId::Second => self.second_model = model,
        }
        self.send_cmd(WorkerCmd::SetModel {
            surface: id,
            session_id,
            model,
        });
    }

    /// Drain worker events and apply them to the shell state. Call once
    /// per frame before rendering.
    fn poll_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Ready => {
                    self.backend_state = BackendState::Ready;
                }
                UiEvent::BackendFailed(message) => {
                    log::warn!("backend unavailable: {}", message);
                    self.backend_state = BackendState::Failed(message);
                }
                UiEvent::Stream(stream_event) => {
                    let Some(id) = self.shell.route(&stream_event.session_id) else {
                        log::debug!(
                            "dropping stream event for closed surface {}",
                            stream_event.session_id
                        );
                        continue;
                    };
                    let Some(bound) = self.shell.surface_mut(id) else {
                        continue;
                    };
                    match stream_event.kind {
                        StreamKind::Token(token) => bound.surface.on_token(&token),
                        StreamKind::Complete => bound.surface.on_complete(),
                        StreamKind::Error(message) => bound.surface.on_error(message),
                    }
                }
                UiEvent::TopicVerdict { text, dual } => {
                    self.awaiting_verdict = false;
                    if dual {
                        self.pending_prompt = Some(DualTopicPrompt::new(text));
                    } else {
                        self.shell.primary_mut().surface.release_input();
                        self.dispatch_primary(text);
                    }
                }
                UiEvent::DispatchFailed { session_id, message } => {
                    if let Some(id) = self.shell.route(&session_id) {
                        if let Some(bound) = self.shell.surface_mut(id) {
                            bound.surface.on_error(format!("Error: {}", message));
                        }
                    }
                }
                UiEvent::ModelSet { surface, line } => {
                    if let Some(bound) = self.shell.surface_mut(surface) {
                        bound.surface.push_assistant(line);
                    }
                }
                UiEvent::ModelError { surface, message } => {
                    if let Some(bound) = self.shell.surface_mut(surface) {
                        bound
                            .surface
                            .push_assistant(format!("Error switching model: {}", message));
                    }
                }
            }
        }
    }

    /// Renders one chat message: role label, role-based fill, text with
    /// the streaming cursor when pending.
    fn render_chat_message(ui: &mut egui::Ui, message: &ChatMessage, assistant_label: &str) {
        let is_user = message.role == Role::User;
        let frame = egui::Frame::none()
            .fill(if is_user {
                ui.style().visuals.extreme_bg_color
            } else {
                ui.style().visuals.panel_fill
            })
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            let label = if is_user { Role::User.label() } else { assistant_label };
            ui.label(egui::RichText::new(label).small().weak());
            if is_user {
                ui.label(egui::RichText::new(message.display_text()).strong());
            } else {
                ui.label(message.display_text());
            }
        });
    }

    /// One chat pane: messages (stick-to-bottom), input, and the control
    /// row (Send, Clear, model selector, Close on the second pane).
    fn ui_surface_pane(&mut self, ui: &mut egui::Ui, id: SurfaceId) {
        let ready = self.bridge_ready();
        let (messages, input_enabled, wants_focus) = {
            let Some(bound) = self.shell.surface_mut(id) else {
                return;
            };
            let wants_focus = bound.surface.take_focus_request();
            (
                bound.surface.messages().to_vec(),
                bound.surface.input_enabled(),
                wants_focus,
            )
        };
        let can_send = ready
            && input_enabled
            && !(id == SurfaceId::Primary && (self.awaiting_verdict || self.pending_prompt.is_some()));
        let model = match id {
            SurfaceId::Primary => self.primary_model,
            SurfaceId::Second => self.second_model,
        };
        let assistant_label = model.display_name();

        let row_height = ui.spacing().interact_size.y + 8.0;
        let bottom_section_height = CHAT_INPUT_HEIGHT + 8.0 + row_height + Self::SCREEN_FOOTER_SPACING;
        let available = ui.available_height();
        let messages_height = (available - bottom_section_height).max(CHAT_MESSAGES_MIN_HEIGHT);

        let messages_rect = ui
            .allocate_exact_size(
                egui::vec2(ui.available_width(), messages_height),
                egui::Sense::hover(),
            )
            .0;
        let mut messages_ui = ui.child_ui(messages_rect, egui::Layout::top_down(egui::Align::Min));
        egui::ScrollArea::vertical()
            .id_source((id == SurfaceId::Second, "messages_scroll"))
            .stick_to_bottom(true)
            .show(&mut messages_ui, |ui| {
                let content_width = ui.available_width();
                ui.allocate_exact_size(egui::vec2(content_width, 0.0), egui::Sense::hover());
                for message in &messages {
                    Self::render_chat_message(ui, message, assistant_label);
                    ui.add_space(8.0);
                }
            });

        ui.add_space(8.0);

        let input = match id {
            SurfaceId::Primary => &mut self.primary_input,
            SurfaceId::Second => &mut self.second_input,
        };
        let text_response = ui.add_enabled_ui(can_send, |ui| {
            ui.add_sized(
                [ui.available_width(), CHAT_INPUT_HEIGHT],
                egui::TextEdit::multiline(input),
            )
        });
        let response = text_response.inner;
        if wants_focus && can_send {
            response.request_focus();
        }
        ui.add_space(8.0);

        let mut send_now = false;
        let mut clear_now = false;
        let mut close_now = false;
        let mut model_change: Option<ModelId> = None;

        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), row_height),
            egui::Sense::hover(),
        );
        let mut row_ui = ui.child_ui(rect, egui::Layout::right_to_left(egui::Align::Center));
        egui::Frame::none()
            .inner_margin(egui::Margin {
                left: 0.0,
                right: 8.0,
                top: 4.0,
                bottom: 4.0,
            })
            .show(&mut row_ui, |ui| {
                if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                    send_now = true;
                }

                ui.add_space(8.0);
                ui.add_enabled_ui(can_send, |ui| {
                    egui::ComboBox::from_id_source((id == SurfaceId::Second, "model_select"))
                        .selected_text(model.display_name())
                        .show_ui(ui, |ui| {
                            for candidate in ModelId::ALL {
                                if ui
                                    .selectable_label(candidate == model, candidate.display_name())
                                    .clicked()
                                    && candidate != model
                                {
                                    model_change = Some(candidate);
                                }
                            }
                        });
                });

                ui.add_space(8.0);
                if ui.add_enabled(can_send, egui::Button::new("Clear")).clicked() {
                    clear_now = true;
                }

                if id == SurfaceId::Second {
                    ui.add_space(8.0);
                    if ui.button("Close").clicked() {
                        close_now = true;
                    }
                }
            });

        if can_send && response.has_focus() {
            let modifiers = ui.input(|i| i.modifiers);
            if (modifiers.command || modifiers.ctrl) && ui.input(|i| i.key_pressed(egui::Key::Enter))
            {
                send_now = true;
            }
        }

        if send_now {
            match id {
                SurfaceId::Primary => self.start_primary_send(),
                SurfaceId::Second => self.start_second_send(),
            }
        }
        if clear_now {
            self.clear_surface(id);
        }
        if let Some(model) = model_change {
            self.change_model(id, model);
        }
        if close_now {
            self.close_second();
        }
    }

    /// The dual-topic modal. Exactly one of accept/decline resolves the
    /// prompt; either way it is gone afterwards.
    fn ui_dual_topic_modal(&mut self, ctx: &egui::Context) {
        let Some(ref prompt) = self.pending_prompt else {
            return;
        };
        let preview = prompt.pending_message().to_string();
        let mut accepted = false;
        let mut declined = false;

        egui::Window::new("Two topics?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("This message looks like it covers two separate topics:");
                ui.add_space(8.0);
                ui.label(egui::RichText::new(preview.as_str()).italics());
                ui.add_space(8.0);
                ui.label("Open a second assistant for it?");
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.button("Open second assistant").clicked() {
                        accepted = true;
                    }
                    if ui.button("Keep one chat").clicked() {
                        declined = true;
                    }
                });
            });

        if accepted || declined {
            let Some(prompt) = self.pending_prompt.take() else {
                return;
            };
            if accepted {
                self.accept_prompt(prompt);
            } else {
                self.decline_prompt(prompt);
            }
        }
    }

    fn ui_chat_screen(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Chat");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        match self.backend_state {
            BackendState::Starting => {
                ui.label("Starting the backend…");
                ui.add_space(8.0);
            }
            BackendState::Failed(ref message) => {
                ui.colored_label(egui::Color32::RED, message);
                ui.add_space(8.0);
            }
            BackendState::Ready => {}
        }

        if self.shell.second_active() {
            ui.columns(2, |columns| {
                self.ui_surface_pane(&mut columns[0], SurfaceId::Primary);
                self.ui_surface_pane(&mut columns[1], SurfaceId::Second);
            });
        } else {
            self.ui_surface_pane(ui, SurfaceId::Primary);
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace));
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for DuetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_ui_events();

        // If we own the backend and it died, surface that instead of
        // leaving inputs enabled against a dead bridge.
        if let Some(ref mut backend) = self.backend {
            if !backend.is_running() && self.backend_state == BackendState::Ready {
                self.backend_state = BackendState::Failed("backend process exited".to_string());
            }
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("Duet");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            match self.backend_state {
                                BackendState::Starting => {
                                    ui.label("Backend: starting…");
                                }
                                BackendState::Ready => {
                                    ui.label(format!(
                                        "Backend: running on port {}",
                                        self.config.backend.port
                                    ));
                                }
                                BackendState::Failed(_) => {
                                    ui.colored_label(egui::Color32::RED, "Backend: unavailable");
                                }
                            }
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let current_screen = &mut self.current_screen;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(120.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        if ui
                            .selectable_label(*current_screen == Screen::Chat, "Chat")
                            .clicked()
                        {
                            *current_screen = Screen::Chat;
                        }
                        ui.add_space(12.0);
                        if ui
                            .selectable_label(*current_screen == Screen::Logs, "Logs")
                            .clicked()
                        {
                            *current_screen = Screen::Logs;
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => self.ui_chat_screen(ui),
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });

        self.ui_dual_topic_modal(ctx);

        // Streams arrive from a worker thread; keep painting while one is
        // active or a verdict is pending so tokens show up promptly.
        let streaming = self.shell.primary().surface.is_streaming()
            || self
                .shell
                .second()
                .map(|b| b.surface.is_streaming())
                .unwrap_or(false);
        if streaming || self.awaiting_verdict || self.backend_state == BackendState::Starting {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
        }
    }
}
