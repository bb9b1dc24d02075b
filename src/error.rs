use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SpeciesError {
    #[error("failed to read input file {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("input file {path} is not valid FASTA/FASTQ: {message}")]
    InputFormat { path: PathBuf, message: String },

    #[error("BLAST request failed: {0}")]
    BlastHttp(String),

    #[error("BLAST returned status {status}: {message}")]
    BlastStatus { status: u16, message: String },

    #[error("unexpected BLAST response: {0}")]
    BlastResponse(String),

    #[error("BLAST search {rid} ended with status {status}")]
    BlastSearch { rid: String, status: String },

    #[error("invalid BLAST database name: {0}")]
    InvalidDatabase(String),

    #[error("failed to write output table: {0}")]
    OutputWrite(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl SpeciesError {
    /// Errors raised while resolving a single read against the remote service.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            SpeciesError::BlastHttp(_)
                | SpeciesError::BlastStatus { .. }
                | SpeciesError::BlastResponse(_)
                | SpeciesError::BlastSearch { .. }
        )
    }

    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SpeciesError::InputRead { .. } | SpeciesError::InputFormat { .. }
        )
    }
}
