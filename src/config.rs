use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{BlastDatabase, BlastProgram, FailurePolicy, RowOrder};
use crate::error::SpeciesError;

pub const DEFAULT_BLAST_URL: &str = "https://blast.ncbi.nlm.nih.gov/Blast.cgi";
pub const DEFAULT_THREADS: usize = 4;
pub const MAX_THREADS: usize = 64;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// Floor for status polling. NCBI asks for at most one poll per minute per request.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_HITLIST_SIZE: u32 = 10;
pub const TOOL_NAME: &str = "kira-species";

/// On-disk JSON configuration. Every key is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub blast: BlastSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BlastSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub program: Option<BlastProgram>,
    #[serde(default)]
    pub database: Option<BlastDatabase>,
    #[serde(default)]
    pub hitlist_size: Option<u32>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PipelineSection {
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub order: Option<RowOrder>,
    #[serde(default)]
    pub on_error: Option<FailurePolicy>,
    #[serde(default)]
    pub with_read_id: Option<bool>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub program: Option<BlastProgram>,
    pub database: Option<BlastDatabase>,
    pub poll_interval_secs: Option<u64>,
    pub threads: Option<usize>,
    pub order: Option<RowOrder>,
    pub on_error: Option<FailurePolicy>,
    pub with_read_id: bool,
}

/// Process environment the configuration depends on.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub email: Option<String>,
    pub blast_url: Option<String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            email: non_empty_var("NCBI_EMAIL"),
            blast_url: non_empty_var("KIRA_SPECIES_BLAST_URL"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub program: BlastProgram,
    pub database: BlastDatabase,
    pub hitlist_size: u32,
    pub poll_interval: Duration,
    pub email: Option<String>,
    pub tool: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BLAST_URL.to_string(),
            program: BlastProgram::default(),
            database: BlastDatabase::default(),
            hitlist_size: DEFAULT_HITLIST_SIZE,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            email: None,
            tool: TOOL_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub threads: usize,
    pub order: RowOrder,
    pub on_error: FailurePolicy,
    pub with_read_id: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            order: RowOrder::default(),
            on_error: FailurePolicy::default(),
            with_read_id: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub service: ServiceConfig,
    pub pipeline: PipelineConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the optional config file and layers environment and CLI values on top.
    pub fn resolve(
        path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SpeciesError> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .map_err(|_| SpeciesError::ConfigRead(path.to_path_buf()))?;
                serde_json::from_str(&content)
                    .map_err(|err| SpeciesError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Ok(Self::resolve_config(
            config,
            overrides,
            Environment::from_process(),
        ))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
        env: Environment,
    ) -> ResolvedConfig {
        let defaults = ServiceConfig::default();
        let blast = config.blast;
        let service = ServiceConfig {
            base_url: env
                .blast_url
                .or(blast.base_url)
                .unwrap_or(defaults.base_url),
            program: overrides
                .program
                .or(blast.program)
                .unwrap_or(defaults.program),
            database: overrides
                .database
                .or(blast.database)
                .unwrap_or(defaults.database),
            hitlist_size: blast.hitlist_size.unwrap_or(defaults.hitlist_size).max(1),
            poll_interval: overrides
                .poll_interval_secs
                .or(blast.poll_interval_secs)
                .map(|secs| Duration::from_secs(secs.max(MIN_POLL_INTERVAL_SECS)))
                .unwrap_or(defaults.poll_interval),
            email: env.email.or(blast.email),
            tool: defaults.tool,
        };

        let pipeline = config.pipeline;
        let pipeline = PipelineConfig {
            threads: overrides
                .threads
                .or(pipeline.threads)
                .unwrap_or(DEFAULT_THREADS)
                .clamp(1, MAX_THREADS),
            order: overrides.order.or(pipeline.order).unwrap_or_default(),
            on_error: overrides.on_error.or(pipeline.on_error).unwrap_or_default(),
            with_read_id: overrides.with_read_id || pipeline.with_read_id.unwrap_or(false),
        };

        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            service,
            pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let resolved = ConfigLoader::resolve_config(
            Config::default(),
            ConfigOverrides::default(),
            Environment::default(),
        );
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.service.base_url, DEFAULT_BLAST_URL);
        assert_eq!(resolved.service.database.as_str(), "nt");
        assert_eq!(resolved.pipeline.threads, DEFAULT_THREADS);
        assert_eq!(resolved.pipeline.on_error, FailurePolicy::Isolate);
    }
}
