use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;

use kira_species::blast::{Alignment, AlignmentRecord, BlastClient, parse_json2_report};
use kira_species::domain::Resolution;
use kira_species::error::SpeciesError;
use kira_species::resolver::{BlastSpeciesResolver, SpeciesResolver, resolution_from_record};

struct StaticClient {
    record: Option<AlignmentRecord>,
    queries: Mutex<Vec<String>>,
}

impl StaticClient {
    fn new(record: Option<AlignmentRecord>) -> Self {
        Self {
            record,
            queries: Mutex::new(Vec::new()),
        }
    }
}

impl BlastClient for StaticClient {
    fn search(&self, query: &str) -> Result<AlignmentRecord, SpeciesError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.record
            .clone()
            .ok_or_else(|| SpeciesError::BlastHttp("connection reset".to_string()))
    }
}

fn record_with_titles(titles: &[&str]) -> AlignmentRecord {
    AlignmentRecord {
        query_id: Some("Query_1".to_string()),
        alignments: titles.iter().map(|title| Alignment::with_title(*title)).collect(),
    }
}

#[test]
fn top_title_yields_genus_and_species() {
    let record = record_with_titles(&[
        "ACC123 Homo sapiens chromosome 1",
        "ACC456 Pan troglodytes chromosome 1",
    ]);
    let resolution = resolution_from_record(&record, "ACGT");
    assert_eq!(
        resolution,
        Resolution::Matched {
            label: "Homo sapiens".to_string(),
            sequence: "ACGT".to_string(),
        }
    );
}

#[test]
fn zero_alignments_is_no_match() {
    let resolution = resolution_from_record(&AlignmentRecord::empty(), "ACGT");
    assert_eq!(
        resolution,
        Resolution::NoMatch {
            sequence: "ACGT".to_string()
        }
    );
}

#[test]
fn single_token_title_is_malformed() {
    let record = record_with_titles(&["ACC123"]);
    let resolution = resolution_from_record(&record, "ACGT");
    assert_eq!(
        resolution,
        Resolution::Malformed {
            raw_title: "ACC123".to_string()
        }
    );
}

#[test]
fn two_token_title_is_malformed() {
    let record = record_with_titles(&["ACC123 Homo"]);
    assert_matches!(
        resolution_from_record(&record, "ACGT"),
        Resolution::Malformed { .. }
    );
}

#[test]
fn resolver_reads_json2_fixture() {
    let body = fs::read_to_string("tests/fixtures/blast_json2_hits.json").unwrap();
    let record = parse_json2_report(&body).unwrap();
    assert_eq!(record.alignments.len(), 2);
    assert_eq!(record.query_id.as_deref(), Some("Query_81234"));

    let client = StaticClient::new(Some(record));
    let resolver = BlastSpeciesResolver::new(client);
    let resolution = resolver.resolve("ACGTTGCAAGG").unwrap();
    assert_eq!(
        resolution,
        Resolution::Matched {
            label: "Homo sapiens".to_string(),
            sequence: "ACGTTGCAAGG".to_string(),
        }
    );
}

#[test]
fn resolver_reports_no_hits_fixture() {
    let body = fs::read_to_string("tests/fixtures/blast_json2_no_hits.json").unwrap();
    let record = parse_json2_report(&body).unwrap();
    assert!(record.alignments.is_empty());

    let resolver = BlastSpeciesResolver::new(StaticClient::new(Some(record)));
    assert_matches!(resolver.resolve("TTTT").unwrap(), Resolution::NoMatch { .. });
}

#[test]
fn resolver_passes_sequence_through_untouched() {
    let client = StaticClient::new(Some(AlignmentRecord::empty()));
    let resolver = BlastSpeciesResolver::new(client);
    resolver.resolve("acgtNNxx").unwrap();
    resolver.resolve("").unwrap();

    let queries = resolver.client().queries.lock().unwrap();
    assert_eq!(*queries, vec!["acgtNNxx".to_string(), String::new()]);
}

#[test]
fn client_failure_is_a_resolution_error() {
    let resolver = BlastSpeciesResolver::new(StaticClient::new(None));
    let err = resolver.resolve("ACGT").unwrap_err();
    assert!(err.is_resolution_error());
    assert_matches!(err, SpeciesError::BlastHttp(_));
}
