//! Core types and operations for watchlog progress tracking.
//!
//! Free of HTTP and database dependencies. Storage backends implement
//! [`store::ProgressStore`], metadata providers implement
//! [`catalog::ContentCatalog`], and [`tracker::Tracker`] ties them together.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// trait declarations instead.
#![allow(async_fn_in_trait)]

pub mod activity;
pub mod catalog;
pub mod error;
pub mod import;
pub mod job;
pub mod progress;
pub mod propagate;
pub mod store;
pub mod tracker;

pub use error::{Error, ErrorKind, Result};
