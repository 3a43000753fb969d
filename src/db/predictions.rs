use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::models::{NewPrediction, PredictionRecord};

/// Every stored prediction, oldest first.
pub fn fetch_all_predictions(conn: &Connection) -> Result<Vec<PredictionRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, label, image_path, created_at FROM predictions ORDER BY id")
        .context("failed to prepare prediction query")?;

    let predictions = stmt
        .query_map([], record_from_row)
        .context("failed to load predictions")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect predictions")?;

    Ok(predictions)
}

/// Insert a prediction stamped with the current time and echo the hydrated
/// record back so callers do not have to re-query.
pub fn insert_prediction(conn: &Connection, new: &NewPrediction) -> Result<PredictionRecord> {
    insert_prediction_at(conn, new, Utc::now())
}

pub(crate) fn insert_prediction_at(
    conn: &Connection,
    new: &NewPrediction,
    created_at: DateTime<Utc>,
) -> Result<PredictionRecord> {
    let image_path = new
        .image_path
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());

    conn.execute(
        "INSERT INTO predictions (label, image_path, created_at) VALUES (?1, ?2, ?3)",
        params![new.label, image_path, created_at],
    )
    .context("failed to insert prediction")?;

    Ok(PredictionRecord {
        id: conn.last_insert_rowid(),
        label: new.label.clone(),
        image_path: new.image_path.clone(),
        created_at,
    })
}

/// Remove exactly the given record. A missing row is reported so the UI can
/// resynchronise instead of assuming success.
pub fn delete_prediction(conn: &Connection, record: &PredictionRecord) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM predictions WHERE id = ?1", params![record.id])
        .context("failed to delete prediction")?;

    if deleted == 0 {
        Err(anyhow!("Prediction not found"))
    } else {
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PredictionRecord> {
    let image_path: Option<String> = row.get(2)?;
    Ok(PredictionRecord {
        id: row.get(0)?,
        label: row.get(1)?,
        image_path: image_path.map(PathBuf::from),
        created_at: row.get(3)?,
    })
}
