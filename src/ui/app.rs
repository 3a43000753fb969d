use std::mem;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use crate::capture::{
    list_images, load_image, CameraCapture, Capability, CaptureState, ImageSource,
    PermissionProbe, PermissionState, SelectedImage,
};
use crate::classifier::Classifier;
use crate::db::{StoreEvent, StoreOp, StoreWorker};
use crate::error::ClassifierError;
use crate::models::NewPrediction;

use super::forms::{ConfirmPredictionDelete, GalleryPicker, ImagePathForm};
use super::helpers::{centered_rect, image_preview_lines, label_style, surface_error};
use super::screens::{
    CaptureScreen, ClassifyRequest, HistoryDisplay, HistoryPhase, HistoryScreen, LoadOutcome,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height of the tab strip at the top.
const HEADER_HEIGHT: u16 = 3;

/// Host resources the capture screen works against.
pub struct CaptureEnvironment {
    pub gallery_dir: PathBuf,
    pub camera: CameraCapture,
    pub probe: Box<dyn PermissionProbe>,
    /// Used to expand `~/` in typed paths.
    pub home_dir: Option<PathBuf>,
}

/// Top-level navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Capture,
    History,
}

/// Fine-grained modes layered over the current screen.
enum Mode {
    Normal,
    PickingImage(GalleryPicker),
    EnteringPath(ImagePathForm),
    ConfirmDelete(ConfirmPredictionDelete),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    store: StoreWorker,
    history: HistoryScreen,
    capture: CaptureScreen,
    env: CaptureEnvironment,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    /// Build the app on the capture screen, checking permissions up front.
    pub fn new(
        store: StoreWorker,
        classifier: Result<Classifier, ClassifierError>,
        env: CaptureEnvironment,
    ) -> Self {
        let permissions = PermissionState::request(env.probe.as_ref());
        let model_failed = classifier.as_ref().err().map(|err| err.to_string());

        let mut app = Self {
            store,
            history: HistoryScreen::new(),
            capture: CaptureScreen::new(classifier, permissions),
            env,
            screen: Screen::Capture,
            mode: Mode::Normal,
            status: None,
        };

        match (model_failed, app.missing_permissions_message()) {
            (Some(reason), Some(permissions)) => app.set_status(
                format!("Model load failed: {reason}. {permissions}"),
                StatusKind::Error,
            ),
            (Some(reason), None) => {
                app.set_status(format!("Model load failed: {reason}"), StatusKind::Error)
            }
            (None, _) => app.report_permissions(),
        }
        app
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::PickingImage(picker) => self.handle_picker(code, picker),
            Mode::EnteringPath(form) => self.handle_path_form(code, form),
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
        };

        Ok(exit)
    }

    /// Apply every store result that has arrived since the last tick.
    pub fn process_store_events(&mut self) -> Result<()> {
        for event in self.store.drain() {
            match event {
                StoreEvent::Loaded { ticket, records } => {
                    if self.history.apply_loaded(ticket, records) == LoadOutcome::Stale {
                        tracing::debug!(ticket, "discarding history snapshot older than a delete");
                        self.start_history_load();
                    }
                }
                StoreEvent::Inserted { record, .. } => {
                    self.set_status(
                        format!("Injury Type: {}. Saved to history.", record.label),
                        StatusKind::Info,
                    );
                    if self.screen == Screen::History {
                        self.start_history_load();
                    }
                }
                StoreEvent::Deleted { .. } => {
                    self.set_status("Prediction deleted.", StatusKind::Info);
                }
                StoreEvent::Failed {
                    ticket,
                    op,
                    message,
                } => {
                    let action = match op {
                        StoreOp::Load => "load history",
                        StoreOp::Insert => "save prediction",
                        StoreOp::Delete => "delete prediction",
                    };
                    self.set_status(format!("Could not {action}: {message}"), StatusKind::Error);
                    match op {
                        StoreOp::Load => self.history.load_failed(ticket),
                        StoreOp::Delete => self.start_history_load(),
                        StoreOp::Insert => {}
                    }
                }
            }
        }
        Ok(())
    }

    pub fn has_pending_classification(&self) -> bool {
        self.capture.session.state() == CaptureState::Classifying
    }

    /// Run a classification requested by the last key press. Called by the
    /// event loop after it has drawn the "Analyzing" frame.
    pub fn run_pending_classification(&mut self) -> Result<()> {
        match self.capture.classify_pending() {
            Some(Ok(classified)) => {
                self.set_status(format!("Injury Type: {}", classified.label), StatusKind::Info);
                let new = NewPrediction::new(classified.label, Some(classified.path));
                if let Err(err) = self.store.insert(new) {
                    self.set_status(surface_error(&err), StatusKind::Error);
                }
            }
            Some(Err(err)) => {
                let prefix = if err.is_load_failure() {
                    "Model load failed"
                } else {
                    "Classification failed"
                };
                self.set_status(format!("{prefix}: {err}"), StatusKind::Error);
            }
            None => {}
        }
        Ok(())
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => {
                *exit = true;
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab => {
                let next = match self.screen {
                    Screen::Capture => Screen::History,
                    Screen::History => Screen::Capture,
                };
                self.switch_to(next);
                return Ok(Mode::Normal);
            }
            _ => {}
        }

        match self.screen {
            Screen::Capture => self.handle_capture_key(code, exit),
            Screen::History => self.handle_history_key(code),
        }
    }

    fn handle_capture_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Esc => *exit = true,
            KeyCode::Char('g') | KeyCode::Char('G') => return Ok(self.open_gallery()),
            KeyCode::Char('p') | KeyCode::Char('P') => {
                if let Err(err) = self.capture.permissions.require(Capability::StorageRead) {
                    self.set_status(err.to_string(), StatusKind::Error);
                } else {
                    self.clear_status();
                    return Ok(Mode::EnteringPath(ImagePathForm::default()));
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => self.capture_from_camera(),
            KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Enter => self.request_analysis(),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.capture.permissions = PermissionState::request(self.env.probe.as_ref());
                self.report_permissions();
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_history_key(&mut self, code: KeyCode) -> Result<Mode> {
        match code {
            KeyCode::Esc => self.switch_to(Screen::Capture),
            KeyCode::Up => self.history.move_selection(-1),
            KeyCode::Down => self.history.move_selection(1),
            KeyCode::PageUp => self.history.move_selection(-5),
            KeyCode::PageDown => self.history.move_selection(5),
            KeyCode::Home => self.history.select_first(),
            KeyCode::End => self.history.select_last(),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.clear_status();
                self.start_history_load();
            }
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Delete => {
                match self.history.current().cloned() {
                    Some(record) if record.is_deletable() => {
                        self.clear_status();
                        return Ok(Mode::ConfirmDelete(ConfirmPredictionDelete { record }));
                    }
                    Some(_) => self.set_status(
                        "Only predictions with a result can be deleted.",
                        StatusKind::Error,
                    ),
                    None => self.set_status("No prediction selected.", StatusKind::Error),
                }
            }
            KeyCode::Char('o') | KeyCode::Char('O') => self.open_selected_image(),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_picker(&mut self, code: KeyCode, mut picker: GalleryPicker) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Selection cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Up => {
                picker.move_selection(-1);
                Mode::PickingImage(picker)
            }
            KeyCode::Down => {
                picker.move_selection(1);
                Mode::PickingImage(picker)
            }
            KeyCode::PageUp => {
                picker.move_selection(-10);
                Mode::PickingImage(picker)
            }
            KeyCode::PageDown => {
                picker.move_selection(10);
                Mode::PickingImage(picker)
            }
            KeyCode::Enter => match picker.current().cloned() {
                Some(path) if self.select_from_path(&path, ImageSource::Gallery) => Mode::Normal,
                _ => Mode::PickingImage(picker),
            },
            _ => Mode::PickingImage(picker),
        }
    }

    fn handle_path_form(&mut self, code: KeyCode, mut form: ImagePathForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Selection cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Backspace => {
                form.backspace();
                Mode::EnteringPath(form)
            }
            KeyCode::Char(ch) => {
                form.push_char(ch);
                Mode::EnteringPath(form)
            }
            KeyCode::Enter => match form.parse_inputs(self.env.home_dir.as_deref()) {
                Ok(path) if self.select_from_path(&path, ImageSource::Gallery) => Mode::Normal,
                Ok(_) => Mode::EnteringPath(form),
                Err(err) => {
                    form.error = Some(err.to_string());
                    Mode::EnteringPath(form)
                }
            },
            _ => Mode::EnteringPath(form),
        }
    }

    fn handle_confirm_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmPredictionDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.history.delete(&confirm.record, &mut self.store) {
                    Ok(true) => {
                        self.set_status("Deleting prediction...", StatusKind::Info);
                        Ok(Mode::Normal)
                    }
                    Ok(false) => {
                        self.set_status(
                            "Only predictions with a result can be deleted.",
                            StatusKind::Error,
                        );
                        Ok(Mode::Normal)
                    }
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn switch_to(&mut self, screen: Screen) {
        if self.screen == screen {
            return;
        }
        self.screen = screen;
        self.clear_status();
        if screen == Screen::History {
            self.start_history_load();
        }
    }

    fn start_history_load(&mut self) {
        match self.store.load_all() {
            Ok(ticket) => self.history.begin_load(ticket),
            Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
        }
    }

    fn open_gallery(&mut self) -> Mode {
        if let Err(err) = self.capture.permissions.require(Capability::StorageRead) {
            self.set_status(err.to_string(), StatusKind::Error);
            return Mode::Normal;
        }
        match list_images(&self.env.gallery_dir) {
            Ok(images) if images.is_empty() => {
                self.set_status(
                    format!("No images found in {}.", self.env.gallery_dir.display()),
                    StatusKind::Info,
                );
                Mode::Normal
            }
            Ok(images) => {
                self.clear_status();
                Mode::PickingImage(GalleryPicker::new(images))
            }
            Err(err) => {
                tracing::warn!(error = %err, "gallery listing failed");
                self.set_status(err.to_string(), StatusKind::Error);
                Mode::Normal
            }
        }
    }

    fn capture_from_camera(&mut self) {
        if let Err(err) = self.capture.permissions.require(Capability::Camera) {
            self.set_status(err.to_string(), StatusKind::Error);
            return;
        }
        match self.env.camera.capture() {
            Ok(path) => {
                self.select_from_path(&path, ImageSource::Camera);
            }
            Err(err) => {
                tracing::warn!(error = %err, "camera capture failed");
                self.set_status(err.to_string(), StatusKind::Error);
            }
        }
    }

    /// Load the image at `path` into the capture session. Returns whether the
    /// session now holds it.
    fn select_from_path(&mut self, path: &Path, source: ImageSource) -> bool {
        let image = match load_image(path) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(error = %err, "image load failed");
                self.set_status(err.to_string(), StatusKind::Error);
                return false;
            }
        };

        if !self
            .capture
            .session
            .select_image(SelectedImage::new(source, path, image))
        {
            self.set_status("Analysis in progress.", StatusKind::Error);
            return false;
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.set_status(
            format!("Selected {name}. Press [a] to analyze."),
            StatusKind::Info,
        );
        true
    }

    fn request_analysis(&mut self) {
        match self.capture.request_classification() {
            ClassifyRequest::Started => {
                self.set_status("Analyzing image...", StatusKind::Info);
            }
            ClassifyRequest::NoImage => {
                if matches!(self.capture.session.state(), CaptureState::Classified(_)) {
                    self.set_status("Select a new image to analyze again.", StatusKind::Info);
                }
            }
            ClassifyRequest::Busy => {}
            ClassifyRequest::ModelUnavailable(reason) => {
                self.set_status(format!("Classifier unavailable: {reason}"), StatusKind::Error);
            }
        }
    }

    fn open_selected_image(&mut self) {
        let Some(record) = self.history.current() else {
            self.set_status("No prediction selected.", StatusKind::Error);
            return;
        };
        let Some(path) = record.image_path.clone() else {
            self.set_status("No image stored for this prediction.", StatusKind::Error);
            return;
        };
        if let Err(err) = open_path(&path) {
            self.set_status(
                format!("Could not open {}: {err}", path.display()),
                StatusKind::Error,
            );
        }
    }

    fn report_permissions(&mut self) {
        match self.missing_permissions_message() {
            None => self.set_status("Ready. Pick or capture an image.", StatusKind::Info),
            Some(message) => self.set_status(message, StatusKind::Error),
        }
    }

    fn missing_permissions_message(&self) -> Option<String> {
        if self.capture.permissions.all_granted() {
            return None;
        }
        let names: Vec<String> = self
            .capture
            .permissions
            .missing()
            .iter()
            .map(|cap| cap.to_string())
            .collect();
        Some(format!(
            "Permissions are required for this feature (missing: {}). Press [r] to retry.",
            names.join(", ")
        ))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT.min(area.height)),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);
        match self.screen {
            Screen::Capture => self.draw_capture(frame, chunks[1]),
            Screen::History => self.draw_history(frame, chunks[1]),
        }
        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::PickingImage(picker) => self.draw_picker(frame, area, picker),
            Mode::EnteringPath(form) => self.draw_path_form(frame, area, form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let tab = |title: &'static str, screen: Screen| {
            if self.screen == screen {
                Span::styled(
                    format!(" {title} "),
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw(format!(" {title} "))
            }
        };
        let line = Line::from(vec![
            tab("Capture", Screen::Capture),
            Span::raw(" "),
            tab("History", Screen::History),
        ]);
        let header = Paragraph::new(line)
            .block(Block::default().borders(Borders::ALL).title("Injury Lens"));
        frame.render_widget(header, area);
    }

    fn draw_capture(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let granted = |capability: Capability| {
            if self.capture.permissions.granted(capability) {
                Span::styled("granted", Style::default().fg(Color::Green))
            } else {
                Span::styled("denied", Style::default().fg(Color::Red))
            }
        };
        let caption = Style::default().fg(Color::Gray);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Gallery: ", caption),
                granted(Capability::StorageRead),
            ]),
            Line::from(vec![
                Span::styled("Camera:  ", caption),
                granted(Capability::Camera),
            ]),
            match self.capture.model_error() {
                None => Line::from(vec![
                    Span::styled("Model:   ", caption),
                    Span::styled("ready", Style::default().fg(Color::Green)),
                ]),
                Some(reason) => Line::from(vec![
                    Span::styled("Model:   ", caption),
                    Span::styled(format!("unavailable ({reason})"), Style::default().fg(Color::Red)),
                ]),
            },
            Line::from(""),
        ];

        if let Some(selected) = self.capture.session.selected() {
            let source = match selected.source {
                ImageSource::Gallery => "gallery",
                ImageSource::Camera => "camera",
            };
            lines.push(Line::from(vec![
                Span::styled("Image:   ", caption),
                Span::raw(selected.path.display().to_string()),
            ]));
            lines.push(Line::from(Span::styled(
                format!(
                    "         {}x{} from {source}",
                    selected.image.width(),
                    selected.image.height()
                ),
                caption,
            )));
            lines.push(Line::from(""));
        }

        let result_line = match self.capture.session.state() {
            CaptureState::Idle => Line::from("Press [g] for the gallery or [c] for the camera."),
            CaptureState::ImageSelected => Line::from("Press [a] to analyze the image."),
            CaptureState::Classifying => Line::from(Span::styled(
                "Analyzing...",
                Style::default().fg(Color::Yellow),
            )),
            CaptureState::Classified(label) => Line::from(vec![
                Span::raw("Injury Type: "),
                Span::styled(
                    label.to_string(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
        };
        lines.push(result_line);

        let info = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Capture"))
            .wrap(Wrap { trim: true });
        frame.render_widget(info, columns[0]);

        let block = Block::default().borders(Borders::ALL).title("Preview");
        let inner = block.inner(columns[1]);
        frame.render_widget(block, columns[1]);
        match self.capture.session.selected() {
            Some(selected) => {
                let preview = image_preview_lines(&selected.image, inner.width, inner.height);
                frame.render_widget(Paragraph::new(preview).alignment(Alignment::Center), inner);
            }
            None => {
                let message = Paragraph::new("No image selected.")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray));
                frame.render_widget(message, inner);
            }
        }
    }

    fn draw_history(&self, frame: &mut Frame, area: Rect) {
        let count = self.history.records().len();
        let title = match self.history.phase() {
            HistoryPhase::Loading if count > 0 => format!("History ({count}, refreshing)"),
            _ => format!("History ({count})"),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        match self.history.display() {
            HistoryDisplay::Loading => {
                let message = Paragraph::new("Loading history...")
                    .alignment(Alignment::Center)
                    .block(block);
                frame.render_widget(message, area);
            }
            HistoryDisplay::NotFound => {
                let message = Paragraph::new("No predictions found.")
                    .alignment(Alignment::Center)
                    .block(block);
                frame.render_widget(message, area);
            }
            HistoryDisplay::List => {
                let items: Vec<ListItem> = self
                    .history
                    .records()
                    .iter()
                    .map(|record| {
                        let mut spans = vec![Span::styled(
                            record.display_line(),
                            label_style(record.injury()),
                        )];
                        if let Some(path) = &record.image_path {
                            spans.push(Span::styled(
                                format!("  {}", path.display()),
                                Style::default().fg(Color::DarkGray),
                            ));
                        }
                        ListItem::new(Line::from(spans))
                    })
                    .collect();

                let list = List::new(items)
                    .block(block)
                    .highlight_style(Style::default().fg(Color::Yellow))
                    .highlight_symbol("> ");
                let mut list_state = ListState::default();
                list_state.select(Some(self.history.selected));
                frame.render_stateful_widget(list, area, &mut list_state);
            }
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints: &[(&str, &str)] = match (&self.mode, self.screen) {
            (Mode::PickingImage(_), _) => &[
                ("[Up/Down]", " Navigate   "),
                ("[Enter]", " Select   "),
                ("[Esc]", " Cancel"),
            ],
            (Mode::EnteringPath(_), _) => &[("[Enter]", " Open   "), ("[Esc]", " Cancel")],
            (Mode::ConfirmDelete(_), _) => &[("[Y]", " Delete   "), ("[N/Esc]", " Cancel")],
            (Mode::Normal, Screen::Capture) => &[
                ("[g]", " Gallery   "),
                ("[p]", " Path   "),
                ("[c]", " Camera   "),
                ("[a]", " Analyze   "),
                ("[r]", " Permissions   "),
                ("[Tab]", " History   "),
                ("[q]", " Quit"),
            ],
            (Mode::Normal, Screen::History) => &[
                ("[Up/Down]", " Navigate   "),
                ("[d]", " Delete   "),
                ("[o]", " Open Image   "),
                ("[r]", " Reload   "),
                ("[Tab]", " Capture   "),
                ("[q]", " Quit"),
            ],
        };

        let spans: Vec<Span<'static>> = hints
            .iter()
            .flat_map(|(key, text)| {
                [
                    Span::styled(key.to_string(), key_style),
                    Span::raw(text.to_string()),
                ]
            })
            .collect();
        Line::from(spans)
    }

    fn draw_picker(&self, frame: &mut Frame, area: Rect, picker: &GalleryPicker) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Gallery: {}", self.env.gallery_dir.display()))
            .borders(Borders::ALL);
        let items: Vec<ListItem> = picker.labels().into_iter().map(ListItem::new).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("> ");

        let mut list_state = ListState::default();
        list_state.select(Some(picker.selected));
        frame.render_stateful_widget(list, popup_area, &mut list_state);
    }

    fn draw_path_form(&self, frame: &mut Frame, area: Rect, form: &ImagePathForm) {
        let popup_area = centered_rect(70, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Open Image").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![form.build_line()];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        }
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

        let cursor_x = inner.x.saturating_add(form.cursor_offset());
        frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmPredictionDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Delete Prediction")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Delete '{}' permanently?",
                confirm.record.display_line()
            )),
            Line::from("The image file itself is kept."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use image::{Rgb, RgbImage};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::classifier::ScoringModel;
    use crate::db::open_in_memory;
    use crate::models::InjuryLabel;

    struct Fixed {
        storage: bool,
        camera: bool,
    }

    impl PermissionProbe for Fixed {
        fn check(&self, capability: Capability) -> bool {
            match capability {
                Capability::StorageRead => self.storage,
                Capability::Camera => self.camera,
            }
        }
    }

    struct Constant(Vec<f32>);

    impl ScoringModel for Constant {
        fn score(&mut self, _input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    fn app_with(gallery: &Path, storage: bool, scores: Vec<f32>) -> App {
        let store = StoreWorker::spawn(open_in_memory().unwrap()).unwrap();
        let env = CaptureEnvironment {
            gallery_dir: gallery.to_path_buf(),
            camera: CameraCapture::new(Vec::new(), gallery.join("captures")),
            probe: Box::new(Fixed {
                storage,
                camera: false,
            }),
            home_dir: None,
        };
        App::new(store, Ok(Classifier::new(Box::new(Constant(scores)))), env)
    }

    fn pump_until(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..200 {
            app.process_store_events().unwrap();
            if done(app) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("store events did not settle");
    }

    fn status_text(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    fn gallery_with_image() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(16, 16, Rgb([200, 40, 40]))
            .save(dir.path().join("knee.png"))
            .unwrap();
        dir
    }

    #[test]
    fn missing_permissions_are_reported_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(dir.path(), false, vec![1.0, 0.0, 0.0]);
        assert!(status_text(&app).starts_with("Permissions are required for this feature"));

        app.handle_key(KeyCode::Char('g')).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert!(status_text(&app).contains("storage-read permission is required"));
    }

    #[test]
    fn model_failure_still_reports_missing_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreWorker::spawn(open_in_memory().unwrap()).unwrap();
        let env = CaptureEnvironment {
            gallery_dir: dir.path().to_path_buf(),
            camera: CameraCapture::new(Vec::new(), dir.path().join("captures")),
            probe: Box::new(Fixed {
                storage: true,
                camera: false,
            }),
            home_dir: None,
        };
        let missing_model = ClassifierError::ModelMissing(dir.path().join("injury_model.onnx"));
        let app = App::new(store, Err(missing_model), env);

        let status = status_text(&app);
        assert!(status.starts_with("Model load failed"));
        assert!(status.contains("Permissions are required for this feature (missing: camera)"));
    }

    #[test]
    fn pick_classify_and_persist_round_trip() {
        let dir = gallery_with_image();
        let mut app = app_with(dir.path(), true, vec![0.1, 0.8, 0.1]);

        app.handle_key(KeyCode::Char('g')).unwrap();
        assert!(matches!(app.mode, Mode::PickingImage(_)));
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.capture.session.state(), CaptureState::ImageSelected);

        app.handle_key(KeyCode::Char('a')).unwrap();
        assert!(app.has_pending_classification());
        app.run_pending_classification().unwrap();
        assert_eq!(
            app.capture.session.state(),
            CaptureState::Classified(InjuryLabel::Bruise)
        );
        assert_eq!(status_text(&app), "Injury Type: Bruise");

        pump_until(&mut app, |app| status_text(app).contains("Saved to history"));

        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.history.display(), HistoryDisplay::Loading);
        pump_until(&mut app, |app| app.history.display() != HistoryDisplay::Loading);
        assert_eq!(app.history.records().len(), 1);
        assert_eq!(app.history.records()[0].label, "Bruise");
        assert_eq!(
            app.history.records()[0].image_path.as_deref(),
            Some(dir.path().join("knee.png").as_path())
        );
    }

    #[test]
    fn confirmed_delete_empties_the_history() {
        let dir = gallery_with_image();
        let mut app = app_with(dir.path(), true, vec![0.9, 0.05, 0.05]);
        app.store
            .insert(NewPrediction::new(InjuryLabel::Abrasion, None))
            .unwrap();

        app.handle_key(KeyCode::Tab).unwrap();
        pump_until(&mut app, |app| app.history.records().len() == 1);

        app.handle_key(KeyCode::Char('d')).unwrap();
        assert!(matches!(app.mode, Mode::ConfirmDelete(_)));
        app.handle_key(KeyCode::Char('n')).unwrap();
        assert_eq!(app.history.records().len(), 1);

        app.handle_key(KeyCode::Char('d')).unwrap();
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert!(app.history.records().is_empty());
        assert_eq!(app.history.display(), HistoryDisplay::NotFound);
        pump_until(&mut app, |app| status_text(app) == "Prediction deleted.");

        app.handle_key(KeyCode::Char('r')).unwrap();
        pump_until(&mut app, |app| app.history.display() != HistoryDisplay::Loading);
        assert!(app.history.records().is_empty());
    }

    #[test]
    fn analyze_without_an_image_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(dir.path(), true, vec![1.0, 0.0, 0.0]);
        app.handle_key(KeyCode::Char('a')).unwrap();
        assert!(!app.has_pending_classification());
        assert_eq!(app.capture.session.state(), CaptureState::Idle);
    }

    #[test]
    fn typed_path_errors_stay_in_the_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(dir.path(), true, vec![1.0, 0.0, 0.0]);

        app.handle_key(KeyCode::Char('p')).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        match &app.mode {
            Mode::EnteringPath(form) => {
                assert_eq!(form.error.as_deref(), Some("Image path is required."))
            }
            _ => panic!("path form should stay open"),
        }
        app.handle_key(KeyCode::Esc).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn capture_screen_renders_with_a_preview() {
        let dir = gallery_with_image();
        let mut app = app_with(dir.path(), true, vec![0.0, 0.0, 1.0]);
        app.handle_key(KeyCode::Char('g')).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(rendered.contains("Capture"));
        assert!(rendered.contains("knee.png"));
        assert!(rendered.contains("\u{2580}"));
    }

    #[test]
    fn q_exits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(dir.path(), true, vec![1.0, 0.0, 0.0]);
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }
}
