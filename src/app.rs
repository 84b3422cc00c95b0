use std::sync::Arc;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use study_planner::ai::collect_fragments;
use study_planner::{
    ApiToken, Config, InferenceClient, ModelChoice, ModelConfig, Rejection, ReplicateClient,
    Session, Submission, TokenSource,
};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
    Input,
}

/// Rows of the sidebar, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarItem {
    Model,
    Temperature,
    TopP,
    MaxLength,
    ClearHistory,
}

impl SidebarItem {
    pub fn all() -> [SidebarItem; 5] {
        [
            SidebarItem::Model,
            SidebarItem::Temperature,
            SidebarItem::TopP,
            SidebarItem::MaxLength,
            SidebarItem::ClearHistory,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SidebarItem::Model => "Model",
            SidebarItem::Temperature => "Temperature",
            SidebarItem::TopP => "Top_p",
            SidebarItem::MaxLength => "Max Length",
            SidebarItem::ClearHistory => "Clear Chat History",
        }
    }
}

/// Inline message shown under the conversation until the next submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Rejected(Rejection),
    Failed(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Rejected(rejection) => rejection.message().to_string(),
            Notice::Failed(error) => format!("Generation failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationUpdate {
    Fragment(String),
    Finished(String),
    Failed(String),
}

/// Message from a generation task, tagged with the generation it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationEvent {
    pub id: u64,
    pub update: GenerationUpdate,
}

/// The generation currently streaming in.
pub struct Generation {
    pub id: u64,
    /// Text received so far.
    pub buffer: String,
    task: JoinHandle<()>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Conversation and sampling parameters
    pub session: Session,
    pub client: Option<Arc<dyn InferenceClient>>,
    pub token_source: Option<TokenSource>,
    pub api_base_url: Option<String>,

    // Chat state
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input, in chars
    pub query_scroll: u16,
    pub query_chat_height: u16,
    pub query_chat_width: u16,
    pub generation: Option<Generation>,
    next_generation_id: u64,
    pub notice: Option<Notice>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Sidebar state
    pub sidebar_state: ListState,

    // Model picker state
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub sidebar_area: Option<Rect>,

    events: UnboundedSender<AppEvent>,
}

impl App {
    /// Build the app from config, resolving the Replicate token once.
    pub fn new(config: &Config, model: ModelChoice, events: UnboundedSender<AppEvent>) -> Self {
        let (client, token_source) = match config.resolve_token() {
            Ok((token, source)) => {
                info!(source = source.as_str(), "Replicate token found");
                let client = build_client(token, config.api_base_url.as_deref());
                (Some(client), Some(source))
            }
            Err(e) => {
                warn!(error = %e, "starting locked");
                (None, None)
            }
        };

        let mut app = Self::with_client(client, ModelConfig::new(model), events);
        app.token_source = token_source;
        app.api_base_url = config.api_base_url.clone();
        app
    }

    pub fn with_client(
        client: Option<Arc<dyn InferenceClient>>,
        model_config: ModelConfig,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let mut sidebar_state = ListState::default();
        sidebar_state.select(Some(0));

        let locked = client.is_none();

        Self {
            should_quit: false,
            input_mode: if locked { InputMode::Normal } else { InputMode::Editing },
            focus: FocusPane::Input,

            session: Session::new(model_config),
            client,
            token_source: None,
            api_base_url: None,

            query_input: String::new(),
            query_cursor: 0,
            query_scroll: 0,
            query_chat_height: 0,
            query_chat_width: 0,
            generation: None,
            next_generation_id: 0,
            notice: None,

            animation_frame: 0,

            sidebar_state,

            show_model_picker: false,
            model_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,

            chat_area: None,
            sidebar_area: None,

            events,
        }
    }

    /// No credential: nothing but the warning screen is usable.
    pub fn is_locked(&self) -> bool {
        self.client.is_none()
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    pub fn can_submit(&self) -> bool {
        !self.is_locked() && !self.is_generating()
    }

    /// Send the input box contents through the session.
    pub fn submit_query(&mut self) {
        if !self.can_submit() {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };

        let text = std::mem::take(&mut self.query_input);
        self.query_cursor = 0;

        match self.session.submit(&text) {
            Submission::Ignored => return,
            Submission::Rejected(rejection) => {
                self.notice = Some(Notice::Rejected(rejection));
            }
            Submission::AlreadyAnswered => {
                self.notice = None;
            }
            Submission::Generate(request) => {
                self.notice = None;

                let id = self.next_generation_id;
                self.next_generation_id += 1;

                let tx = self.events.clone();
                let task = tokio::spawn(async move {
                    let send = |update| {
                        let _ = tx.send(AppEvent::Generation(GenerationEvent { id, update }));
                    };
                    let result = match client.stream(&request).await {
                        Ok(fragments) => {
                            collect_fragments(fragments, |f| send(GenerationUpdate::Fragment(f.to_string()))).await
                        }
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(text) => send(GenerationUpdate::Finished(text)),
                        Err(e) => send(GenerationUpdate::Failed(e.to_string())),
                    }
                });

                self.generation = Some(Generation {
                    id,
                    buffer: String::new(),
                    task,
                });
            }
        }

        self.scroll_query_to_bottom();
    }

    /// Fold a message from the generation task into the UI state.
    pub fn handle_generation(&mut self, event: GenerationEvent) {
        let Some(generation) = self.generation.as_mut() else {
            return;
        };
        if generation.id != event.id {
            // Left over from a generation that was cleared away
            return;
        }

        match event.update {
            GenerationUpdate::Fragment(fragment) => {
                generation.buffer.push_str(&fragment);
            }
            GenerationUpdate::Finished(text) => {
                self.generation = None;
                self.session.complete(text);
            }
            GenerationUpdate::Failed(error) => {
                warn!(error = error.as_str(), "generation failed");
                self.generation = None;
                self.session.abandon();
                self.notice = Some(Notice::Failed(error));
            }
        }

        self.scroll_query_to_bottom();
    }

    /// Reset the conversation to the greeting, dropping any running generation.
    pub fn clear_history(&mut self) {
        if let Some(generation) = self.generation.take() {
            generation.task.abort();
        }
        self.session.clear();
        self.notice = None;
        self.query_scroll = 0;
    }

    /// Unlock the app with a token typed into the popup. The token stays in
    /// memory unless `remember` asks for it to be written to the config file.
    pub fn set_api_token(&mut self, token: ApiToken, remember: bool) {
        let mut source = TokenSource::Session;
        if remember {
            match Config::save_api_token(&token) {
                Ok(()) => source = TokenSource::Config,
                Err(e) => warn!(error = %e, "could not save token to config"),
            }
        }
        info!(source = source.as_str(), "token entered");
        self.client = Some(build_client(token, self.api_base_url.as_deref()));
        self.token_source = Some(source);
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat so the newest line is visible
    pub fn scroll_query_to_bottom(&mut self) {
        let wrap_width = if self.query_chat_width > 0 {
            self.query_chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for turn in self.session.conversation().turns() {
            // Role line, content, blank line
            total_lines = total_lines
                .saturating_add(2)
                .saturating_add(wrapped_height(&turn.content, wrap_width));
        }
        if let Some(generation) = &self.generation {
            total_lines = total_lines
                .saturating_add(2)
                .saturating_add(wrapped_height(&generation.buffer, wrap_width));
        }
        if let Some(notice) = &self.notice {
            total_lines = total_lines.saturating_add(wrapped_height(&notice.message(), wrap_width));
        }

        let visible_height = if self.query_chat_height > 0 {
            self.query_chat_height
        } else {
            20
        };

        self.query_scroll = total_lines.saturating_sub(visible_height);
    }

    // Sidebar methods
    pub fn selected_sidebar_item(&self) -> SidebarItem {
        let items = SidebarItem::all();
        let i = self.sidebar_state.selected().unwrap_or(0).min(items.len() - 1);
        items[i]
    }

    pub fn sidebar_nav_down(&mut self) {
        let len = SidebarItem::all().len();
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn sidebar_nav_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    /// Move the selected slider by `steps`. The model row cycles choices.
    pub fn adjust_selected(&mut self, steps: i32) {
        let item = self.selected_sidebar_item();
        let config = &mut self.session.config;
        match item {
            SidebarItem::Model => {
                let models = ModelChoice::all();
                let len = models.len() as i32;
                let current = models.iter().position(|m| *m == config.model).unwrap_or(0) as i32;
                let next = (current + steps.signum()).rem_euclid(len);
                config.model = models[next as usize];
            }
            SidebarItem::Temperature => config.nudge_temperature(steps),
            SidebarItem::TopP => config.nudge_top_p(steps),
            SidebarItem::MaxLength => config.nudge_max_length(steps),
            SidebarItem::ClearHistory => {}
        }
    }

    /// Enter on a sidebar row.
    pub fn activate_selected(&mut self) {
        match self.selected_sidebar_item() {
            SidebarItem::Model => self.open_model_picker(),
            SidebarItem::ClearHistory => self.clear_history(),
            _ => {}
        }
    }

    // Model picker methods
    pub fn open_model_picker(&mut self) {
        let current_idx = ModelChoice::all()
            .iter()
            .position(|m| *m == self.session.config.model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = ModelChoice::all().len();
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = ModelChoice::all().get(i) {
                self.session.config.model = *model;
                self.show_model_picker = false;
            }
        }
    }
}

/// Rows `text` takes when wrapped at `width` columns. At least one.
fn wrapped_height(text: &str, width: usize) -> u16 {
    let width = width.max(1);
    text.lines()
        .map(|line| u16::try_from(line.chars().count() / width + 1).unwrap_or(u16::MAX))
        .fold(0u16, |total, rows| total.saturating_add(rows))
        .max(1)
}

fn build_client(token: ApiToken, base_url: Option<&str>) -> Arc<dyn InferenceClient> {
    match base_url {
        Some(url) => Arc::new(ReplicateClient::with_base_url(token, url)),
        None => Arc::new(ReplicateClient::new(token)),
    }
}
