use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid accession: {0:?}")]
    InvalidAccession(String),

    #[error("chunk size must be positive, got {0}")]
    InvalidChunkSize(usize),

    #[error("worker count must be positive, got {0}")]
    InvalidWorkerCount(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read input table {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("column {column:?} not found in input table {path}")]
    #[diagnostic(help("pass the accession column name with --column"))]
    MissingColumn { column: String, path: PathBuf },

    #[error("ENA request failed: {0}")]
    EnaHttp(String),

    #[error("ENA returned status {status}: {message}")]
    EnaStatus { status: u16, message: String },

    #[error("SRA request failed: {0}")]
    SraHttp(String),

    #[error("SRA returned status {status}: {message}")]
    SraStatus { status: u16, message: String },

    #[error("failed to decode response for {id}: {message}")]
    Decode { id: String, message: String },

    #[error("field {field:?} holds a non-string value")]
    NonStringField { field: String },

    #[error("records cannot be flattened to CSV: {0}")]
    #[diagnostic(help("write JSON only; nested records have no single tabular schema"))]
    CsvSchema(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    pub fn status(&self) -> Option<u16> {
        match self {
            KiraError::EnaStatus { status, .. } | KiraError::SraStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
