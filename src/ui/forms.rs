use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::PredictionRecord;

const PATH_PROMPT: &str = "Path: ";

/// Popup listing gallery images to choose from.
#[derive(Clone)]
pub(crate) struct GalleryPicker {
    pub(crate) images: Vec<PathBuf>,
    pub(crate) selected: usize,
}

impl GalleryPicker {
    pub(crate) fn new(images: Vec<PathBuf>) -> Self {
        Self {
            images,
            selected: 0,
        }
    }

    pub(crate) fn current(&self) -> Option<&PathBuf> {
        self.images.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.images.is_empty() {
            return;
        }
        let last = self.images.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    /// File names only; the directory is shown in the popup title.
    pub(crate) fn labels(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            })
            .collect()
    }
}

/// Free-text entry of an image path.
#[derive(Default, Clone)]
pub(crate) struct ImagePathForm {
    pub(crate) path: String,
    pub(crate) error: Option<String>,
}

impl ImagePathForm {
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.path.push(ch);
        self.error = None;
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.path.pop();
        self.error = None;
    }

    /// Validate the typed path. A leading `~/` expands to `home` when given.
    pub(crate) fn parse_inputs(&self, home: Option<&Path>) -> Result<PathBuf> {
        let raw = self.path.trim();
        if raw.is_empty() {
            return Err(anyhow!("Image path is required."));
        }
        let path = match (raw.strip_prefix("~/"), home) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(raw),
        };
        if !path.is_file() {
            return Err(anyhow!("No file at {}.", path.display()));
        }
        Ok(path)
    }

    pub(crate) fn build_line(&self) -> Line<'static> {
        let (display, style) = if self.path.is_empty() {
            ("<required>".to_string(), Style::default().fg(Color::DarkGray))
        } else {
            (self.path.clone(), Style::default().fg(Color::Yellow))
        };
        Line::from(vec![Span::raw(PATH_PROMPT), Span::styled(display, style)])
    }

    pub(crate) fn value_len(&self) -> usize {
        self.path.chars().count()
    }

    /// Cursor column relative to the start of the input line.
    pub(crate) fn cursor_offset(&self) -> u16 {
        u16::try_from(PATH_PROMPT.len().saturating_add(self.value_len())).unwrap_or(u16::MAX)
    }
}

/// State for confirming permanent deletion of a history entry.
pub(crate) struct ConfirmPredictionDelete {
    pub(crate) record: PredictionRecord,
}
