use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date-group {date_group} is missing expected files: {missing}")]
    MissingFiles { date_group: String, missing: String },

    #[error("Multiple source files map to {destination}: {sources}")]
    DuplicateFile {
        destination: String,
        sources: String,
    },

    #[error("Associated {entity} has no persisted id ({id_field} is empty)")]
    MissingEntityId {
        entity: &'static str,
        id_field: &'static str,
    },

    #[error("Multiple latest-state-log rows for {entity_id} in flow '{flow}'")]
    AmbiguousLatestState { entity_id: String, flow: String },

    #[error("Unknown state id {0} in state_log")]
    UnknownStateId(i64),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EtlResult<T> = Result<T, EtlError>;
