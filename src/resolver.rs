use tracing::debug;

use crate::blast::{AlignmentRecord, BlastClient};
use crate::domain::Resolution;
use crate::error::SpeciesError;

pub trait SpeciesResolver: Send + Sync {
    fn resolve(&self, sequence: &str) -> Result<Resolution, SpeciesError>;
}

/// Result of reading a genus/species pair out of an alignment title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleParse {
    Species(String),
    Malformed,
}

/// Reads `"<genus> <species>"` from tokens 1 and 2 of a hit title.
///
/// Token 0 is the subject identifier. Titles with fewer than three tokens are malformed.
pub fn parse_title(title: &str) -> TitleParse {
    let tokens: Vec<&str> = title.split_whitespace().collect();
    match tokens.as_slice() {
        [_, genus, species, ..] => TitleParse::Species(format!("{genus} {species}")),
        _ => TitleParse::Malformed,
    }
}

/// Turns the top-ranked alignment of a record into a resolution for `sequence`.
pub fn resolution_from_record(record: &AlignmentRecord, sequence: &str) -> Resolution {
    let Some(top) = record.top() else {
        return Resolution::NoMatch {
            sequence: sequence.to_string(),
        };
    };
    match parse_title(&top.title) {
        TitleParse::Species(label) => Resolution::Matched {
            label,
            sequence: sequence.to_string(),
        },
        TitleParse::Malformed => Resolution::Malformed {
            raw_title: top.title.clone(),
        },
    }
}

#[derive(Clone)]
pub struct BlastSpeciesResolver<C: BlastClient> {
    client: C,
}

impl<C: BlastClient> BlastSpeciesResolver<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: BlastClient> SpeciesResolver for BlastSpeciesResolver<C> {
    fn resolve(&self, sequence: &str) -> Result<Resolution, SpeciesError> {
        let record = self.client.search(sequence)?;
        if let Some(top) = record.top() {
            debug!(
                hits = record.alignments.len(),
                accession = top.accession.as_deref().unwrap_or("-"),
                length = top.length,
                evalue = top.evalue,
                bit_score = top.bit_score,
                "blast.top_hit"
            );
        }
        Ok(resolution_from_record(&record, sequence))
    }
}
