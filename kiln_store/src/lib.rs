#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! SQLite persistence for firing sessions and their samples.
//!
//! `KilnStore` implements `kiln_core::SessionRecorder` for the control loop
//! and offers the read side (listing, notes, sample ranges) to the CLI.

pub mod error;
pub mod migrations;
pub mod models;
pub mod store;

pub use error::StoreError;
pub use models::{SampleRecord, SessionRecord};
pub use store::{KilnStore, MAX_SAMPLE_PAGE};
