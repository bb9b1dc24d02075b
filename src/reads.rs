use std::fs::File;
use std::path::Path;

use needletail::parse_fastx_reader;
use tracing::debug;

use crate::domain::Read;
use crate::error::SpeciesError;

/// Loads every record of a FASTA or FASTQ file (optionally compressed), in file order.
///
/// The identifier is the first whitespace-separated token of the header line.
/// Sequences are not validated.
pub fn load_reads(path: &Path) -> Result<Vec<Read>, SpeciesError> {
    let file = File::open(path).map_err(|err| SpeciesError::InputRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let is_empty = file
        .metadata()
        .map(|meta| meta.len() == 0)
        .map_err(|err| SpeciesError::InputRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    if is_empty {
        return Ok(Vec::new());
    }

    let format_error = |message: String| SpeciesError::InputFormat {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = parse_fastx_reader(file).map_err(|err| format_error(err.to_string()))?;
    let mut reads = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|err| format_error(err.to_string()))?;
        let header = String::from_utf8_lossy(record.id());
        let identifier = header.split_whitespace().next().unwrap_or_default();
        let sequence = String::from_utf8_lossy(&record.seq()).into_owned();
        reads.push(Read::new(identifier, sequence));
    }

    debug!(count = reads.len(), path = %path.display(), "loaded reads");
    Ok(reads)
}
