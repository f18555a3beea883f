//! quill-core - Core library for Quill
//!
//! This crate contains the quote store, the remote sync engine, and the
//! conflict ledger shared by every Quill surface.

pub mod error;
pub mod export;
pub mod models;
pub mod notify;
pub mod remote;
pub mod storage;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Quote, QuoteId};
