use std::path::PathBuf;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use unichatbot_core::ingest::INGESTING_MESSAGE;
use unichatbot_core::upload::{NO_FILES_MESSAGE, UPLOADING_MESSAGE};
use unichatbot_core::{
    BackendKind, ChatSession, Config, FileSelection, HttpTransport, Ingestor, SessionEvents,
    UploadReport, Uploader,
};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Documents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub backend: BackendKind,
    pub backend_http: String,

    // Chat state
    pub session: ChatSession<HttpTransport>,
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Documents state
    pub selection: FileSelection,
    pub files_state: ListState,
    pub path_input: String,
    pub path_cursor: usize,
    pub upload_status: String,
    pub uploading: bool,
    uploading_paths: Vec<PathBuf>,
    pub force_reset: bool,
    pub ingest_status: String,
    pub ingesting: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    uploader: Uploader,
    ingestor: Ingestor,
    events: Option<mpsc::UnboundedSender<AppEvent>>,
    config_path: Option<PathBuf>,
}

impl App {
    /// Build the app and hand back the session's event stream for the
    /// caller's event loop. The backend choice is saved to `config_path`
    /// when there is one.
    pub fn new(
        config: &Config,
        backend_http: String,
        config_path: Option<PathBuf>,
    ) -> anyhow::Result<(Self, SessionEvents)> {
        let transport = HttpTransport::new(&backend_http)?;
        let backend = config.backend();
        let (session, session_events) = ChatSession::new(transport.clone(), backend);

        let app = Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,
            backend,
            backend_http,

            session,
            query_input: String::new(),
            query_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            selection: FileSelection::new(),
            files_state: ListState::default(),
            path_input: String::new(),
            path_cursor: 0,
            upload_status: String::new(),
            uploading: false,
            uploading_paths: Vec::new(),
            force_reset: config.force_reset(),
            ingest_status: String::new(),
            ingesting: false,

            animation_frame: 0,

            uploader: Uploader::new(transport.clone()),
            ingestor: Ingestor::new(transport),
            events: None,
            config_path,
        };
        Ok((app, session_events))
    }

    /// Where upload and ingest tasks report their results
    pub fn connect_events(&mut self, events: mpsc::UnboundedSender<AppEvent>) {
        self.events = Some(events);
    }

    pub fn is_thinking(&self) -> bool {
        self.session.is_busy()
    }

    pub fn can_send(&self) -> bool {
        self.session.can_send(&self.query_input)
    }

    /// Send the typed question. Blank input or a busy session is a no-op.
    pub fn submit_question(&mut self) {
        if !self.can_send() {
            return;
        }
        let question = self.query_input.trim().to_string();
        self.query_input.clear();
        self.query_cursor = 0;
        self.session.ask(question);
        self.scroll_chat_to_bottom();
    }

    pub fn cycle_backend(&mut self) {
        self.backend = self.backend.next();
        self.session.set_backend(self.backend);
        self.session
            .notice(format!("Using the {} backend.", self.backend.display_name()));
        if let Some(path) = &self.config_path {
            if let Err(e) = Config::save_default_backend(path, self.backend) {
                tracing::warn!("could not persist backend choice: {}", e);
            }
        }
    }

    pub fn add_selected_path(&mut self) {
        let path = self.path_input.trim().to_string();
        if path.is_empty() {
            return;
        }
        match self.selection.add(path) {
            Ok(()) => {
                self.path_input.clear();
                self.path_cursor = 0;
                self.files_state.select(Some(self.selection.len() - 1));
            }
            Err(_) => {
                self.upload_status = "Only .pdf files can be uploaded.".to_string();
            }
        }
    }

    pub fn remove_selected_file(&mut self) {
        if let Some(idx) = self.files_state.selected() {
            self.selection.remove_at(idx);
            if self.selection.is_empty() {
                self.files_state.select(None);
            } else {
                self.files_state.select(Some(idx.min(self.selection.len() - 1)));
            }
        }
    }

    pub fn files_nav_down(&mut self) {
        let len = self.selection.len();
        if len == 0 {
            return;
        }
        let i = self.files_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.files_state.select(Some(i));
    }

    pub fn files_nav_up(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let i = self.files_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.files_state.select(Some(i));
    }

    pub fn start_upload(&mut self) {
        if self.uploading {
            return;
        }
        let Some(events) = self.events.clone() else {
            return;
        };
        if self.selection.is_empty() {
            self.upload_status = NO_FILES_MESSAGE.to_string();
            return;
        }

        self.uploading = true;
        self.upload_status = UPLOADING_MESSAGE.to_string();
        let uploader = self.uploader.clone();
        let paths = self.selection.paths().to_vec();
        self.uploading_paths = paths.clone();
        tokio::spawn(async move {
            let report = UploadReport::from_result(uploader.send(&paths).await);
            let _ = events.send(AppEvent::UploadFinished(report));
        });
    }

    pub fn finish_upload(&mut self, report: UploadReport) {
        self.uploading = false;
        let sent = std::mem::take(&mut self.uploading_paths);
        if report.succeeded() {
            // Files picked while the upload ran stay selected
            self.selection.remove_sent(&sent);
            if self.selection.is_empty() {
                self.files_state.select(None);
            } else {
                self.files_state.select(Some(0));
            }
        }
        self.upload_status = report.status;
    }

    pub fn start_ingest(&mut self) {
        if self.ingesting {
            return;
        }
        let Some(events) = self.events.clone() else {
            return;
        };

        self.ingesting = true;
        self.ingest_status = INGESTING_MESSAGE.to_string();
        let ingestor = self.ingestor.clone();
        let (backend, force_reset) = (self.backend, self.force_reset);
        tokio::spawn(async move {
            let status = ingestor.ingest(backend, force_reset).await;
            let _ = events.send(AppEvent::IngestFinished(status));
        });
    }

    pub fn finish_ingest(&mut self, status: String) {
        self.ingesting = false;
        self.ingest_status = status;
    }

    pub fn toggle_force_reset(&mut self) {
        self.force_reset = !self.force_reset;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_thinking() || self.uploading || self.ingesting {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll chat to bottom so the newest text is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;

        for msg in self.session.messages().visible() {
            total_lines += 1; // Role line ("You:" or "Assistant:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total_lines += (char_count / wrap_width) + 1;
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_thinking() {
            total_lines += 2; // "Assistant:" + "Thinking..."
        }
        if self.session.sources().is_some_and(|s| !s.is_empty()) {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height as usize
        } else {
            20
        };

        self.chat_scroll =
            u16::try_from(total_lines.saturating_sub(visible_height)).unwrap_or(u16::MAX);
    }

    /// Drop in-flight chat work before exit
    pub fn shutdown(&mut self) {
        self.session.teardown();
    }
}
