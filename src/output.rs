use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::app::{AnnotationSummary, AnnotationTable};
use crate::error::SpeciesError;

pub const LABEL_COLUMN: &str = "label_or_sentinel";
pub const SEQUENCE_COLUMN: &str = "sequence";
pub const READ_ID_COLUMN: &str = "read_id";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Writes the table as comma-separated UTF-8 with a header row and no index column.
///
/// Rows go to a temporary file next to `destination` which replaces it only
/// once everything has been flushed.
pub fn write_table(
    table: &AnnotationTable,
    destination: &Path,
    with_read_id: bool,
) -> Result<(), SpeciesError> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
    let mut builder = tempfile::Builder::new();
    builder.prefix("kira-species-table");
    // Same mode a plain `File::create` would get, umask included.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let temp = builder
        .tempfile_in(parent)
        .map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
    if let Ok(existing) = fs::metadata(destination) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
    }

    {
        let mut writer = csv::Writer::from_writer(temp.as_file());
        let header: &[&str] = if with_read_id {
            &[READ_ID_COLUMN, LABEL_COLUMN, SEQUENCE_COLUMN]
        } else {
            &[LABEL_COLUMN, SEQUENCE_COLUMN]
        };
        writer
            .write_record(header)
            .map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
        for row in &table.rows {
            let result = if with_read_id {
                writer.write_record([&row.read_id, &row.label, &row.sequence])
            } else {
                writer.write_record([&row.label, &row.sequence])
            };
            result.map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
    }

    temp.persist(destination)
        .map_err(|err| SpeciesError::OutputWrite(err.to_string()))?;
    Ok(())
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &AnnotationSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
