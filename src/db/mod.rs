//! Persistence module split across logical submodules.

mod connection;
mod predictions;
mod worker;

pub use connection::{ensure_schema, open_in_memory};
pub use predictions::{delete_prediction, fetch_all_predictions, insert_prediction};
pub use worker::{StoreEvent, StoreOp, StoreWorker, Ticket};
