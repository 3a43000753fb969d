//! Background owner of the SQLite connection.
//!
//! The UI thread never touches the database directly. It submits requests,
//! receives a [`Ticket`] for each, and drains [`StoreEvent`]s on every tick of
//! the event loop. Requests are executed strictly in submission order on a
//! single thread, so a load submitted after a delete always observes it.
//!
//! The worker lives exactly as long as its [`StoreWorker`] handle: dropping
//! the handle closes the request channel and joins the thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;

use super::predictions::{delete_prediction, fetch_all_predictions, insert_prediction};
use crate::models::{NewPrediction, PredictionRecord};

/// Monotonic sequence number attached to every request.
pub type Ticket = u64;

/// Which store operation an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Load,
    Insert,
    Delete,
}

enum StoreRequest {
    LoadAll(Ticket),
    Insert(Ticket, NewPrediction),
    Delete(Ticket, PredictionRecord),
}

/// Results delivered back to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Loaded {
        ticket: Ticket,
        records: Vec<PredictionRecord>,
    },
    Inserted {
        ticket: Ticket,
        record: PredictionRecord,
    },
    Deleted {
        ticket: Ticket,
        id: i64,
    },
    Failed {
        ticket: Ticket,
        op: StoreOp,
        message: String,
    },
}

pub struct StoreWorker {
    requests: Option<Sender<StoreRequest>>,
    events: Receiver<StoreEvent>,
    handle: Option<JoinHandle<()>>,
    next_ticket: Ticket,
}

impl StoreWorker {
    /// Move `conn` onto a dedicated thread and start serving requests.
    pub fn spawn(conn: Connection) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("prediction-store".to_string())
            .spawn(move || serve(conn, request_rx, event_tx))
            .context("failed to start store worker")?;

        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            handle: Some(handle),
            next_ticket: 1,
        })
    }

    pub fn load_all(&mut self) -> Result<Ticket> {
        self.submit(StoreRequest::LoadAll)
    }

    pub fn insert(&mut self, new: NewPrediction) -> Result<Ticket> {
        self.submit(|ticket| StoreRequest::Insert(ticket, new))
    }

    pub fn delete(&mut self, record: PredictionRecord) -> Result<Ticket> {
        self.submit(|ticket| StoreRequest::Delete(ticket, record))
    }

    /// Every event that has arrived so far, without blocking.
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.events.try_iter().collect()
    }

    /// Block for the next event, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StoreEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn submit<F>(&mut self, build: F) -> Result<Ticket>
    where
        F: FnOnce(Ticket) -> StoreRequest,
    {
        let ticket = self.next_ticket;
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("store worker has shut down"))?;
        sender
            .send(build(ticket))
            .map_err(|_| anyhow!("store worker has shut down"))?;
        self.next_ticket += 1;
        Ok(ticket)
    }
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("store worker panicked");
            }
        }
    }
}

fn serve(conn: Connection, requests: Receiver<StoreRequest>, events: Sender<StoreEvent>) {
    tracing::debug!("store worker started");
    for request in requests {
        let event = match request {
            StoreRequest::LoadAll(ticket) => match fetch_all_predictions(&conn) {
                Ok(records) => StoreEvent::Loaded { ticket, records },
                Err(err) => failed(ticket, StoreOp::Load, &err),
            },
            StoreRequest::Insert(ticket, new) => match insert_prediction(&conn, &new) {
                Ok(record) => {
                    tracing::info!(id = record.id, label = %record.label, "prediction stored");
                    StoreEvent::Inserted { ticket, record }
                }
                Err(err) => failed(ticket, StoreOp::Insert, &err),
            },
            StoreRequest::Delete(ticket, record) => match delete_prediction(&conn, &record) {
                Ok(()) => {
                    tracing::info!(id = record.id, "prediction deleted");
                    StoreEvent::Deleted {
                        ticket,
                        id: record.id,
                    }
                }
                Err(err) => failed(ticket, StoreOp::Delete, &err),
            },
        };

        if events.send(event).is_err() {
            break;
        }
    }
    tracing::debug!("store worker stopped");
}

fn failed(ticket: Ticket, op: StoreOp, err: &anyhow::Error) -> StoreEvent {
    tracing::warn!(?op, error = %format!("{err:#}"), "store operation failed");
    StoreEvent::Failed {
        ticket,
        op,
        message: format!("{err:#}"),
    }
}
