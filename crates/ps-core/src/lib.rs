//! Core data model, configuration and persistence seams shared by every
//! prsynth crate.

pub mod config;
pub mod diff;
pub mod issue_store;
pub mod summary;
pub mod types;
