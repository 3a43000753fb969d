use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::capture::{CaptureSession, CaptureState, PermissionState};
use crate::classifier::Classifier;
use crate::db::{StoreWorker, Ticket};
use crate::error::ClassifierError;
use crate::models::{InjuryLabel, PredictionRecord};

/// Callback the history screen uses to remove a record from the store.
pub(crate) trait RecordDeleter {
    fn delete_record(&mut self, record: PredictionRecord) -> Result<Ticket>;
}

impl RecordDeleter for StoreWorker {
    fn delete_record(&mut self, record: PredictionRecord) -> Result<Ticket> {
        self.delete(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryPhase {
    Loading,
    Loaded,
}

/// What the history area should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryDisplay {
    Loading,
    NotFound,
    List,
}

/// How an arriving load result was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadOutcome {
    Applied,
    /// Submitted before the latest delete; the caller must reload.
    Stale,
    /// A newer load is already in flight; the result was dropped.
    Superseded,
}

/// Backing state for the history list. The mirror is an immutable snapshot
/// that is replaced wholesale on every load or delete.
pub(crate) struct HistoryScreen {
    records: Arc<[PredictionRecord]>,
    pub(crate) selected: usize,
    phase: HistoryPhase,
    pending_load: Option<Ticket>,
    last_mutation: Option<Ticket>,
}

impl HistoryScreen {
    pub(crate) fn new() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            selected: 0,
            phase: HistoryPhase::Loading,
            pending_load: None,
            last_mutation: None,
        }
    }

    pub(crate) fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub(crate) fn phase(&self) -> HistoryPhase {
        self.phase
    }

    pub(crate) fn display(&self) -> HistoryDisplay {
        if !self.records.is_empty() {
            HistoryDisplay::List
        } else if self.phase == HistoryPhase::Loading {
            HistoryDisplay::Loading
        } else {
            HistoryDisplay::NotFound
        }
    }

    /// Note that a load was submitted under `ticket`.
    pub(crate) fn begin_load(&mut self, ticket: Ticket) {
        self.phase = HistoryPhase::Loading;
        self.pending_load = Some(ticket);
    }

    pub(crate) fn apply_loaded(
        &mut self,
        ticket: Ticket,
        records: Vec<PredictionRecord>,
    ) -> LoadOutcome {
        if self.pending_load.is_some_and(|pending| ticket < pending) {
            return LoadOutcome::Superseded;
        }
        if self.last_mutation.is_some_and(|mutation| ticket < mutation) {
            return LoadOutcome::Stale;
        }

        self.pending_load = None;
        self.phase = HistoryPhase::Loaded;
        self.replace_records(records);
        LoadOutcome::Applied
    }

    /// A load failed; stop showing the loading indicator.
    pub(crate) fn load_failed(&mut self, ticket: Ticket) {
        if self.pending_load == Some(ticket) {
            self.pending_load = None;
            self.phase = HistoryPhase::Loaded;
        }
    }

    pub(crate) fn current(&self) -> Option<&PredictionRecord> {
        self.records.get(self.selected)
    }

    /// Delete `record` through `deleter` and drop it from the mirror.
    ///
    /// Returns `Ok(false)` without touching anything when the record has an
    /// empty label or is no longer in the mirror.
    pub(crate) fn delete(
        &mut self,
        record: &PredictionRecord,
        deleter: &mut dyn RecordDeleter,
    ) -> Result<bool> {
        if !record.is_deletable() || !self.records.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }

        let ticket = deleter.delete_record(record.clone())?;
        self.last_mutation = Some(ticket);
        let remaining: Vec<PredictionRecord> = self
            .records
            .iter()
            .filter(|r| r.id != record.id)
            .cloned()
            .collect();
        self.replace_records(remaining);
        Ok(true)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.records.is_empty() {
            return;
        }
        let last = self.records.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.records.len().saturating_sub(1);
    }

    fn replace_records(&mut self, records: Vec<PredictionRecord>) {
        self.records = Arc::from(records);
        if self.selected >= self.records.len() {
            self.selected = self.records.len().saturating_sub(1);
        }
    }
}

/// Result of asking the capture screen to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClassifyRequest {
    Started,
    /// Nothing to classify; silently ignored.
    NoImage,
    Busy,
    ModelUnavailable(String),
}

/// A finished classification ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassifiedImage {
    pub(crate) label: InjuryLabel,
    pub(crate) path: PathBuf,
}

/// Backing state for the capture screen.
pub(crate) struct CaptureScreen {
    pub(crate) session: CaptureSession,
    pub(crate) permissions: PermissionState,
    classifier: Option<Classifier>,
    model_error: Option<String>,
}

impl CaptureScreen {
    pub(crate) fn new(
        classifier: Result<Classifier, ClassifierError>,
        permissions: PermissionState,
    ) -> Self {
        let (classifier, model_error) = match classifier {
            Ok(classifier) => (Some(classifier), None),
            Err(err) => {
                tracing::error!(error = %err, "injury model unavailable");
                (None, Some(err.to_string()))
            }
        };
        Self {
            session: CaptureSession::new(),
            permissions,
            classifier,
            model_error,
        }
    }

    pub(crate) fn model_error(&self) -> Option<&str> {
        self.model_error.as_deref()
    }

    pub(crate) fn request_classification(&mut self) -> ClassifyRequest {
        match self.session.state() {
            CaptureState::Classifying => return ClassifyRequest::Busy,
            CaptureState::ImageSelected => {}
            CaptureState::Idle | CaptureState::Classified(_) => return ClassifyRequest::NoImage,
        }
        if self.classifier.is_none() {
            let reason = self
                .model_error
                .clone()
                .unwrap_or_else(|| "model not loaded".to_string());
            return ClassifyRequest::ModelUnavailable(reason);
        }
        if self.session.begin_classification() {
            ClassifyRequest::Started
        } else {
            ClassifyRequest::NoImage
        }
    }

    /// Run the classification started by [`Self::request_classification`].
    /// Returns `None` when nothing is pending.
    pub(crate) fn classify_pending(&mut self) -> Option<Result<ClassifiedImage, ClassifierError>> {
        if self.session.state() != CaptureState::Classifying {
            return None;
        }
        let attempt = match (self.classifier.as_mut(), self.session.selected()) {
            (Some(classifier), Some(selected)) => {
                let path = selected.path.clone();
                Some(
                    classifier
                        .classify(&selected.image)
                        .map(|label| ClassifiedImage { label, path }),
                )
            }
            _ => None,
        };
        let Some(outcome) = attempt else {
            self.session.abort_classification();
            return None;
        };

        match outcome {
            Ok(classified) => {
                tracing::info!(
                    label = %classified.label,
                    path = %classified.path.display(),
                    "image classified"
                );
                self.session.finish_classification(classified.label);
                Some(Ok(classified))
            }
            Err(err) => {
                tracing::warn!(error = %err, "classification failed");
                self.session.abort_classification();
                if err.is_load_failure() {
                    self.model_error = Some(err.to_string());
                    self.classifier = None;
                }
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use chrono::Utc;
    use image::DynamicImage;

    use super::*;
    use crate::capture::{ImageSource, SelectedImage};
    use crate::classifier::ScoringModel;

    /// Records what would have been deleted.
    #[derive(Default)]
    struct Recorder {
        deleted: Vec<i64>,
        next: Ticket,
        fail: bool,
    }

    impl RecordDeleter for Recorder {
        fn delete_record(&mut self, record: PredictionRecord) -> Result<Ticket> {
            if self.fail {
                return Err(anyhow!("store worker has shut down"));
            }
            self.deleted.push(record.id);
            self.next += 1;
            Ok(self.next)
        }
    }

    fn record(id: i64, label: &str) -> PredictionRecord {
        PredictionRecord {
            id,
            label: label.to_string(),
            image_path: None,
            created_at: Utc::now(),
        }
    }

    fn loaded(records: Vec<PredictionRecord>) -> HistoryScreen {
        let mut screen = HistoryScreen::new();
        screen.begin_load(1);
        assert_eq!(screen.apply_loaded(1, records), LoadOutcome::Applied);
        screen
    }

    #[test]
    fn starts_loading_then_reports_not_found_when_empty() {
        let mut screen = HistoryScreen::new();
        assert_eq!(screen.display(), HistoryDisplay::Loading);
        screen.begin_load(1);
        screen.apply_loaded(1, Vec::new());
        assert_eq!(screen.phase(), HistoryPhase::Loaded);
        assert_eq!(screen.display(), HistoryDisplay::NotFound);
    }

    #[test]
    fn non_empty_mirror_shows_the_list() {
        let screen = loaded(vec![record(1, "Burn")]);
        assert_eq!(screen.display(), HistoryDisplay::List);
    }

    #[test]
    fn delete_shrinks_mirror_by_one_and_calls_the_store() {
        let mut screen = loaded(vec![record(1, "Burn"), record(2, "Bruise"), record(3, "Burn")]);
        let mut store = Recorder::default();

        let target = record(2, "Bruise");
        assert!(screen.delete(&target, &mut store).unwrap());

        assert_eq!(screen.records().len(), 2);
        assert!(screen.records().iter().all(|r| r.id != 2));
        assert_eq!(store.deleted, vec![2]);
    }

    #[test]
    fn empty_label_delete_is_a_no_op() {
        let mut screen = loaded(vec![record(1, ""), record(2, "Burn")]);
        let mut store = Recorder::default();

        assert!(!screen.delete(&record(1, ""), &mut store).unwrap());
        assert_eq!(screen.records().len(), 2);
        assert!(store.deleted.is_empty());
    }

    #[test]
    fn deleting_the_last_record_flips_to_not_found() {
        let mut screen = loaded(vec![record(7, "Abrasion")]);
        let mut store = Recorder::default();
        screen.delete(&record(7, "Abrasion"), &mut store).unwrap();
        assert_eq!(screen.display(), HistoryDisplay::NotFound);
        assert_eq!(screen.selected, 0);
    }

    #[test]
    fn failed_submission_leaves_the_mirror_alone() {
        let mut screen = loaded(vec![record(1, "Burn")]);
        let mut store = Recorder {
            fail: true,
            ..Recorder::default()
        };
        assert!(screen.delete(&record(1, "Burn"), &mut store).is_err());
        assert_eq!(screen.records().len(), 1);
    }

    #[test]
    fn load_submitted_before_a_delete_is_stale() {
        let mut screen = loaded(vec![record(1, "Burn"), record(2, "Burn")]);
        let mut store = Recorder {
            next: 10,
            ..Recorder::default()
        };
        screen.begin_load(5);
        screen.delete(&record(1, "Burn"), &mut store).unwrap();

        // Ticket 5 ran before delete ticket 11 and still contains record 1.
        let outcome = screen.apply_loaded(5, vec![record(1, "Burn"), record(2, "Burn")]);
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(screen.records().len(), 1);

        screen.begin_load(12);
        assert_eq!(
            screen.apply_loaded(12, vec![record(2, "Burn")]),
            LoadOutcome::Applied
        );
    }

    #[test]
    fn older_load_results_are_superseded() {
        let mut screen = HistoryScreen::new();
        screen.begin_load(3);
        screen.begin_load(4);
        assert_eq!(
            screen.apply_loaded(3, vec![record(1, "Burn")]),
            LoadOutcome::Superseded
        );
        assert_eq!(screen.display(), HistoryDisplay::Loading);
    }

    #[test]
    fn load_failure_ends_the_loading_phase() {
        let mut screen = HistoryScreen::new();
        screen.begin_load(2);
        screen.load_failed(2);
        assert_eq!(screen.display(), HistoryDisplay::NotFound);
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut screen = loaded(vec![record(1, "Burn"), record(2, "Burn")]);
        screen.move_selection(5);
        assert_eq!(screen.selected, 1);
        screen.move_selection(-9);
        assert_eq!(screen.selected, 0);
        screen.select_last();
        assert_eq!(screen.current().map(|r| r.id), Some(2));
    }

    struct Constant(Vec<f32>);

    impl ScoringModel for Constant {
        fn score(&mut self, _input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    fn capture_with(classifier: Result<Classifier, ClassifierError>) -> CaptureScreen {
        CaptureScreen::new(classifier, PermissionState::default())
    }

    fn select(screen: &mut CaptureScreen) {
        screen.session.select_image(SelectedImage::new(
            ImageSource::Camera,
            "/tmp/capture.jpg",
            DynamicImage::new_rgb8(32, 32),
        ));
    }

    #[test]
    fn classify_without_image_is_ignored() {
        let mut screen = capture_with(Ok(Classifier::new(Box::new(Constant(vec![1.0, 0.0, 0.0])))));
        assert_eq!(screen.request_classification(), ClassifyRequest::NoImage);
        assert!(screen.classify_pending().is_none());
    }

    #[test]
    fn classify_runs_once_and_reports_the_label() {
        let mut screen = capture_with(Ok(Classifier::new(Box::new(Constant(vec![0.0, 0.0, 2.0])))));
        select(&mut screen);

        assert_eq!(screen.request_classification(), ClassifyRequest::Started);
        assert_eq!(screen.request_classification(), ClassifyRequest::Busy);

        let result = screen.classify_pending().unwrap().unwrap();
        assert_eq!(result.label, InjuryLabel::Burn);
        assert_eq!(result.path, PathBuf::from("/tmp/capture.jpg"));
        assert_eq!(
            screen.session.state(),
            CaptureState::Classified(InjuryLabel::Burn)
        );
        assert!(screen.classify_pending().is_none());
    }

    #[test]
    fn missing_model_disables_classification() {
        let mut screen = capture_with(Err(ClassifierError::ModelMissing(PathBuf::from(
            "/nowhere/injury_model.onnx",
        ))));
        select(&mut screen);

        match screen.request_classification() {
            ClassifyRequest::ModelUnavailable(reason) => assert!(reason.contains("not found")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(screen.session.state(), CaptureState::ImageSelected);
        assert!(screen.model_error().is_some());
    }
}
