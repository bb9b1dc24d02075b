use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SpeciesError;

pub const NO_MATCH_LABEL: &str = "No significant matches found";
pub const MALFORMED_LABEL: &str = "Unable to extract genus and species from top hit";
pub const FAILED_LABEL: &str = "Resolution failed";

/// One record of the input file. Identifiers are not required to be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub identifier: String,
    pub sequence: String,
}

impl Read {
    pub fn new(identifier: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            sequence: sequence.into(),
        }
    }
}

/// What the species resolver concluded for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched { label: String, sequence: String },
    NoMatch { sequence: String },
    Malformed { raw_title: String },
}

impl Resolution {
    pub fn label(&self) -> &str {
        match self {
            Resolution::Matched { label, .. } => label,
            Resolution::NoMatch { .. } => NO_MATCH_LABEL,
            Resolution::Malformed { .. } => MALFORMED_LABEL,
        }
    }
}

/// Per-read result as seen by the pipeline, including isolated failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(Resolution),
    Failed { message: String },
}

impl Outcome {
    pub fn label(&self) -> &str {
        match self {
            Outcome::Resolved(resolution) => resolution.label(),
            Outcome::Failed { .. } => FAILED_LABEL,
        }
    }

    /// Label plus the error message for failed reads.
    pub fn describe(&self) -> String {
        match self {
            Outcome::Failed { message } => format!("{FAILED_LABEL}: {message}"),
            other => other.label().to_string(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Resolved(Resolution::Matched { .. }) => OutcomeKind::Matched,
            Outcome::Resolved(Resolution::NoMatch { .. }) => OutcomeKind::NoMatch,
            Outcome::Resolved(Resolution::Malformed { .. }) => OutcomeKind::Malformed,
            Outcome::Failed { .. } => OutcomeKind::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Matched,
    NoMatch,
    Malformed,
    Failed,
}

/// A flattened outcome, tagged with the position of its read in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRow {
    pub index: usize,
    pub read_id: String,
    pub label: String,
    pub sequence: String,
    pub kind: OutcomeKind,
}

impl AnnotationRow {
    pub fn from_outcome(index: usize, read: Read, outcome: &Outcome) -> Self {
        Self {
            index,
            label: outcome.label().to_string(),
            kind: outcome.kind(),
            read_id: read.identifier,
            sequence: read.sequence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BlastProgram {
    #[default]
    Blastn,
    Megablast,
}

impl fmt::Display for BlastProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlastProgram::Blastn => write!(f, "blastn"),
            BlastProgram::Megablast => write!(f, "megablast"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlastDatabase(String);

impl BlastDatabase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlastDatabase {
    fn default() -> Self {
        Self("nt".to_string())
    }
}

impl fmt::Display for BlastDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlastDatabase {
    type Err = SpeciesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/'));
        if !is_valid {
            return Err(SpeciesError::InvalidDatabase(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for BlastDatabase {
    type Error = SpeciesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlastDatabase> for String {
    fn from(value: BlastDatabase) -> Self {
        value.0
    }
}

/// Order of rows in the exported table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RowOrder {
    /// As resolutions finish; differs between runs.
    #[default]
    Completion,
    /// Same order as the reads in the input file.
    Input,
}

/// What the pipeline does when resolving one read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record a failure row and keep the rest of the batch.
    #[default]
    Isolate,
    /// Fail the whole run and write nothing.
    Abort,
}
