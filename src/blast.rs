use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::domain::BlastProgram;
use crate::error::SpeciesError;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Ranked alignments returned by one BLAST search, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentRecord {
    pub query_id: Option<String>,
    pub alignments: Vec<Alignment>,
}

impl AlignmentRecord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn top(&self) -> Option<&Alignment> {
        self.alignments.first()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Alignment {
    /// Subject identifier followed by its definition line.
    pub title: String,
    pub accession: Option<String>,
    pub length: Option<u64>,
    pub evalue: Option<f64>,
    pub bit_score: Option<f64>,
}

impl Alignment {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

pub trait BlastClient: Send + Sync {
    /// Runs one nucleotide search and blocks until the service has a full result.
    fn search(&self, query: &str) -> Result<AlignmentRecord, SpeciesError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub rid: String,
    pub estimated_wait: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Waiting,
    Ready { has_hits: bool },
    Failed,
    Unknown,
}

#[derive(Clone)]
pub struct BlastHttpClient {
    client: Client,
    config: ServiceConfig,
}

impl BlastHttpClient {
    pub fn new(config: ServiceConfig) -> Result<Self, SpeciesError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("{}/{}", config.tool, env!("CARGO_PKG_VERSION")))
                .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("TOOL", self.config.tool.clone())];
        if let Some(email) = &self.config.email {
            params.push(("EMAIL", email.clone()));
        }
        params
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SpeciesError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "BLAST request failed".to_string());
        Err(SpeciesError::BlastStatus { status, message })
    }
}

/// The three requests of one URL-API search: `CMD=Put`, `CMD=Get` for
/// `SearchInfo`, and `CMD=Get` for the report.
pub trait BlastTransport {
    fn submit(&self, query: &str) -> Result<Submission, SpeciesError>;
    fn poll(&self, rid: &str) -> Result<SearchStatus, SpeciesError>;
    fn fetch_report(&self, rid: &str) -> Result<AlignmentRecord, SpeciesError>;
}

impl BlastTransport for BlastHttpClient {
    fn submit(&self, query: &str) -> Result<Submission, SpeciesError> {
        let mut params = self.common_params();
        params.push(("CMD", "Put".to_string()));
        params.push(("PROGRAM", "blastn".to_string()));
        params.push(("DATABASE", self.config.database.to_string()));
        params.push(("QUERY", query.to_string()));
        params.push(("HITLIST_SIZE", self.config.hitlist_size.to_string()));
        if self.config.program == BlastProgram::Megablast {
            params.push(("MEGABLAST", "on".to_string()));
        }

        let response = self
            .client
            .post(&self.config.base_url)
            .form(&params)
            .send()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        let page = Self::handle_status(response)?
            .text()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        parse_submission(&page)
    }

    fn poll(&self, rid: &str) -> Result<SearchStatus, SpeciesError> {
        let mut params = self.common_params();
        params.push(("CMD", "Get".to_string()));
        params.push(("FORMAT_OBJECT", "SearchInfo".to_string()));
        params.push(("RID", rid.to_string()));

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        let page = Self::handle_status(response)?
            .text()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        parse_search_status(&page)
    }

    fn fetch_report(&self, rid: &str) -> Result<AlignmentRecord, SpeciesError> {
        let mut params = self.common_params();
        params.push(("CMD", "Get".to_string()));
        params.push(("FORMAT_TYPE", "JSON2_S".to_string()));
        params.push(("RID", rid.to_string()));

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        let body = Self::handle_status(response)?
            .text()
            .map_err(|err| SpeciesError::BlastHttp(err.to_string()))?;
        parse_json2_report(&body)
    }
}

/// Submits `query` and waits for the search to settle.
///
/// Sleeps the service's estimate once, then re-polls every `poll_interval`
/// while the search is `WAITING`. A ready search without hits returns an
/// empty record without fetching the report.
pub fn await_search<T: BlastTransport + ?Sized>(
    transport: &T,
    query: &str,
    poll_interval: Duration,
) -> Result<AlignmentRecord, SpeciesError> {
    let submission = transport.submit(query)?;
    debug!(
        rid = %submission.rid,
        wait_secs = submission.estimated_wait.as_secs(),
        "blast.submitted"
    );
    thread::sleep(submission.estimated_wait);

    loop {
        let status = transport.poll(&submission.rid)?;
        debug!(rid = %submission.rid, ?status, "blast.poll");
        match status {
            SearchStatus::Waiting => thread::sleep(poll_interval),
            SearchStatus::Ready { has_hits: false } => return Ok(AlignmentRecord::empty()),
            SearchStatus::Ready { has_hits: true } => {
                return transport.fetch_report(&submission.rid);
            }
            SearchStatus::Failed => {
                return Err(SpeciesError::BlastSearch {
                    rid: submission.rid,
                    status: "FAILED".to_string(),
                });
            }
            SearchStatus::Unknown => {
                return Err(SpeciesError::BlastSearch {
                    rid: submission.rid,
                    status: "UNKNOWN".to_string(),
                });
            }
        }
    }
}

impl BlastClient for BlastHttpClient {
    fn search(&self, query: &str) -> Result<AlignmentRecord, SpeciesError> {
        await_search(self, query, self.config.poll_interval)
    }
}

fn capture(page: &str, pattern: &str) -> Result<Option<String>, SpeciesError> {
    let re = Regex::new(pattern).map_err(|err| SpeciesError::BlastResponse(err.to_string()))?;
    Ok(re
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Extracts the request id and estimated time of execution from a `CMD=Put` reply.
pub fn parse_submission(page: &str) -> Result<Submission, SpeciesError> {
    let rid = capture(page, r"(?m)^\s*RID\s*=\s*(\S+)")?.ok_or_else(|| {
        SpeciesError::BlastResponse("submission reply carries no RID".to_string())
    })?;
    let estimated_wait = capture(page, r"(?m)^\s*RTOE\s*=\s*(\d+)")?
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_default();
    Ok(Submission {
        rid,
        estimated_wait,
    })
}

/// Reads the `Status=` and `ThereAreHits=` markers of a `FORMAT_OBJECT=SearchInfo` reply.
pub fn parse_search_status(page: &str) -> Result<SearchStatus, SpeciesError> {
    let status = capture(page, r"(?m)^\s*Status\s*=\s*([A-Za-z]+)")?.ok_or_else(|| {
        SpeciesError::BlastResponse("search info reply carries no status".to_string())
    })?;
    match status.to_ascii_uppercase().as_str() {
        "WAITING" => Ok(SearchStatus::Waiting),
        "READY" => {
            let has_hits = capture(page, r"(?m)^\s*ThereAreHits\s*=\s*([A-Za-z]+)")?
                .map(|value| value.eq_ignore_ascii_case("yes"))
                .unwrap_or(false);
            Ok(SearchStatus::Ready { has_hits })
        }
        "FAILED" => Ok(SearchStatus::Failed),
        "UNKNOWN" => Ok(SearchStatus::Unknown),
        other => Err(SpeciesError::BlastResponse(format!(
            "unrecognized search status {other}"
        ))),
    }
}

#[derive(Deserialize)]
struct Json2Document {
    #[serde(rename = "BlastOutput2")]
    outputs: OneOrMany<Json2Output>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Deserialize)]
struct Json2Output {
    report: Json2Report,
}

#[derive(Deserialize)]
struct Json2Report {
    results: Json2Results,
}

#[derive(Deserialize)]
struct Json2Results {
    search: Json2Search,
}

#[derive(Deserialize)]
struct Json2Search {
    #[serde(default)]
    query_id: Option<String>,
    #[serde(default)]
    hits: Vec<Json2Hit>,
}

#[derive(Deserialize)]
struct Json2Hit {
    #[serde(default)]
    description: Vec<Json2Description>,
    #[serde(default)]
    len: Option<u64>,
    #[serde(default)]
    hsps: Vec<Json2Hsp>,
}

#[derive(Deserialize)]
struct Json2Description {
    #[serde(default)]
    id: String,
    #[serde(default)]
    accession: Option<String>,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct Json2Hsp {
    #[serde(default)]
    bit_score: Option<f64>,
    #[serde(default)]
    evalue: Option<f64>,
}

impl From<Json2Hit> for Alignment {
    fn from(hit: Json2Hit) -> Self {
        let description = hit.description.into_iter().next();
        let (title, accession) = match description {
            Some(desc) => (
                format!("{} {}", desc.id, desc.title).trim().to_string(),
                desc.accession,
            ),
            None => (String::new(), None),
        };
        let best = hit.hsps.into_iter().next();
        Alignment {
            title,
            accession,
            length: hit.len,
            evalue: best.as_ref().and_then(|hsp| hsp.evalue),
            bit_score: best.as_ref().and_then(|hsp| hsp.bit_score),
        }
    }
}

/// Parses a single-file BLAST JSON2 report (`FORMAT_TYPE=JSON2_S`), keeping service rank order.
pub fn parse_json2_report(body: &str) -> Result<AlignmentRecord, SpeciesError> {
    let document: Json2Document =
        serde_json::from_str(body).map_err(|err| SpeciesError::BlastResponse(err.to_string()))?;
    let output = match document.outputs {
        OneOrMany::One(output) => output,
        OneOrMany::Many(outputs) => outputs.into_iter().next().ok_or_else(|| {
            SpeciesError::BlastResponse("report contains no search results".to_string())
        })?,
    };
    let search = output.report.results.search;
    Ok(AlignmentRecord {
        query_id: search.query_id,
        alignments: search.hits.into_iter().map(Alignment::from).collect(),
    })
}
