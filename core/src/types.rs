//! Shared primitive types used across the pipeline.

/// A stable, unique identifier for any durable entity (UUID string).
pub type EntityId = String;

/// The timestamp prefix shared by all files of one extract run
/// (`%Y-%m-%d-%H-%M-%S`); the unit of all-or-nothing file processing.
pub type DateGroup = String;

/// Rowid of an import_log row; every state log written during a run
/// carries the run's id.
pub type ImportLogId = i64;

/// Rowid of a state_log row.
pub type StateLogId = i64;
