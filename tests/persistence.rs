use std::path::PathBuf;
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use injury_lens::{
    ensure_schema, Classifier, ClassifierError, InjuryLabel, NewPrediction, ScoringModel,
    StoreEvent, StoreWorker,
};

const WAIT: Duration = Duration::from_secs(5);

/// Scores the image by its dominant channel: red, green, blue.
struct DominantChannel;

impl ScoringModel for DominantChannel {
    fn score(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        let mut sums = vec![0.0f32; 3];
        for (index, value) in input.iter().enumerate() {
            sums[index % 3] += value;
        }
        Ok(sums)
    }
}

fn next_event(store: &StoreWorker) -> StoreEvent {
    store.recv_timeout(WAIT).expect("store worker did not answer")
}

#[test]
fn predictions_survive_a_restart_and_deletes_stick() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("predictions.sqlite");
    let image_path = dir.path().join("forearm.png");

    let mut classifier = Classifier::new(Box::new(DominantChannel));
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 30, Rgb([20, 20, 230])));
    let label = classifier.classify(&image).unwrap();
    assert_eq!(label, InjuryLabel::Burn);

    {
        let mut store = StoreWorker::spawn(ensure_schema(&db_path).unwrap()).unwrap();
        store
            .insert(NewPrediction::new(label, Some(image_path.clone())))
            .unwrap();
        store
            .insert(NewPrediction::new(InjuryLabel::Abrasion, None))
            .unwrap();
        assert!(matches!(next_event(&store), StoreEvent::Inserted { .. }));
        assert!(matches!(next_event(&store), StoreEvent::Inserted { .. }));
    }

    let mut store = StoreWorker::spawn(ensure_schema(&db_path).unwrap()).unwrap();
    store.load_all().unwrap();
    let records = match next_event(&store) {
        StoreEvent::Loaded { records, .. } => records,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].injury(), Some(InjuryLabel::Burn));
    assert_eq!(records[0].image_path.as_ref(), Some(&image_path));
    assert_eq!(records[1].label, "Abrasion");
    assert_eq!(records[1].image_path, None::<PathBuf>);

    let first = records[0].clone();
    store.delete(first.clone()).unwrap();
    store.load_all().unwrap();
    match next_event(&store) {
        StoreEvent::Deleted { id, .. } => assert_eq!(id, first.id),
        other => panic!("unexpected event {other:?}"),
    }
    match next_event(&store) {
        StoreEvent::Loaded { records, .. } => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].label, "Abrasion");
        }
        other => panic!("unexpected event {other:?}"),
    }

    store.delete(first).unwrap();
    match next_event(&store) {
        StoreEvent::Failed { message, .. } => assert!(message.contains("not found")),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn wrong_sized_tensors_are_rejected_before_scoring() {
    let mut classifier = Classifier::new(Box::new(DominantChannel));
    let err = classifier.classify_tensor(&[0.5; 12]).unwrap_err();
    assert!(matches!(err, ClassifierError::InputShape { actual: 12, .. }));
}
