//! Delegated-payments extraction and reconciliation pipeline.
//!
//! Ingests periodic CSV extracts from the external claims system (FINEOS),
//! validates and maps each row into local entities, and tracks every entity
//! through a state-machine workflow (state_log / latest_state_log).
//!
//! RULES:
//!   - Only store/ talks to the database.
//!   - One transaction spans one date-group's reconciliation; a failed
//!     group rolls back whole and its files move to the error area.
//!   - Record-level validation failures are data (ValidationContainer),
//!     never exceptions; a bad row cannot abort a healthy batch.

pub mod blobstore;
pub mod claimant_extract;
pub mod config;
pub mod error;
pub mod extract;
pub mod flows;
pub mod intake;
pub mod lookups;
pub mod paths;
pub mod report;
pub mod statelog;
pub mod step;
pub mod store;
pub mod types;
pub mod validation;
