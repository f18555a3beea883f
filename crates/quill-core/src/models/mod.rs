//! Data models

mod quote;

pub use quote::{ParseQuoteIdError, Quote, QuoteId};
