//! Document model and store seam
//!
//! The OCR pipeline never talks to the database directly; it goes through
//! the [`DocumentStore`] trait so the store can be swapped in tests.

mod store;
mod types;

pub use store::{DocumentStore, StoreError, StoreResult};
pub use types::{Document, Extraction, StoredFile};
