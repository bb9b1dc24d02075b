use std::path::Path;

use assert_matches::assert_matches;

use kira_species::domain::Read;
use kira_species::error::SpeciesError;
use kira_species::reads::load_reads;

#[test]
fn load_fastq_in_file_order() {
    let reads = load_reads(Path::new("tests/fixtures/reads.fastq")).unwrap();
    assert_eq!(
        reads,
        vec![
            Read::new("read_1", "ACGTTGCAAGGCTTACGGATCCAGT"),
            Read::new("read_2", "TTGACCGGTAACGTTAGCCATGGAA"),
            Read::new("read_3", "GGCATTACCGTAAGCTTGCAATCCG"),
        ]
    );
}

#[test]
fn load_multiline_fasta() {
    let reads = load_reads(Path::new("tests/fixtures/contigs.fasta")).unwrap();
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[0].identifier, "contig_a");
    assert_eq!(reads[0].sequence, "ACGTACGTACGTTTGACCAGGTTAACCGGTT");
    assert_eq!(reads[1].sequence, "TTTTGGGGCCCCAAAA");
}

#[test]
fn loading_twice_is_identical() {
    let path = Path::new("tests/fixtures/reads.fastq");
    let first = load_reads(path).unwrap();
    let second = load_reads(path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn duplicate_identifiers_are_kept() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("dups.fasta");
    std::fs::write(&path, ">same\nACGT\n>same\nTTTT\n").unwrap();

    let reads = load_reads(&path).unwrap();
    assert_eq!(reads.len(), 2);
    assert!(reads.iter().all(|read| read.identifier == "same"));
}

#[test]
fn empty_file_has_no_reads() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("empty.fastq");
    std::fs::write(&path, "").unwrap();

    assert!(load_reads(&path).unwrap().is_empty());
}

#[test]
fn missing_file_is_input_read_error() {
    let err = load_reads(Path::new("tests/fixtures/does-not-exist.fastq")).unwrap_err();
    assert_matches!(err, SpeciesError::InputRead { .. });
    assert!(err.is_input_error());
}

#[test]
fn non_fastx_content_is_format_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("table.csv");
    std::fs::write(&path, "id,sequence\nr1,ACGT\n").unwrap();

    let err = load_reads(&path).unwrap_err();
    assert_matches!(err, SpeciesError::InputFormat { .. });
}

#[test]
fn truncated_fastq_is_format_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("truncated.fastq");
    std::fs::write(&path, "@r1\nACGT\n+\nIIII\n@r2\nACGT\n").unwrap();

    let err = load_reads(&path).unwrap_err();
    assert_matches!(err, SpeciesError::InputFormat { .. });
}
