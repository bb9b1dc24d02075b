use std::sync::mpsc;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::domain::{AnnotationRow, FailurePolicy, Outcome, OutcomeKind, Read, RowOrder};
use crate::error::SpeciesError;
use crate::output::write_table;
use crate::reads::load_reads;
use crate::resolver::SpeciesResolver;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub completed: usize,
    pub total: usize,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sink that drops every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    pub rows: Vec<AnnotationRow>,
}

impl AnnotationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.rows.iter().filter(|row| row.kind == kind).count()
    }

    pub fn sort_by_input(&mut self) {
        self.rows.sort_by_key(|row| row.index);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationSummary {
    pub input_path: String,
    pub output_path: String,
    pub total: usize,
    pub matched: usize,
    pub no_match: usize,
    pub malformed: usize,
    pub failed: usize,
    pub started_at: String,
    pub finished_at: String,
}

impl AnnotationSummary {
    fn new(
        table: &AnnotationTable,
        input: &Utf8Path,
        output: &Utf8Path,
        started_at: String,
    ) -> Self {
        Self {
            input_path: input.to_string(),
            output_path: output.to_string(),
            total: table.len(),
            matched: table.count(OutcomeKind::Matched),
            no_match: table.count(OutcomeKind::NoMatch),
            malformed: table.count(OutcomeKind::Malformed),
            failed: table.count(OutcomeKind::Failed),
            started_at,
            finished_at: iso_timestamp(),
        }
    }
}

pub struct App<R: SpeciesResolver> {
    resolver: R,
    options: PipelineConfig,
}

impl<R: SpeciesResolver> App<R> {
    pub fn new(resolver: R, options: PipelineConfig) -> Self {
        Self { resolver, options }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Loads `input`, annotates every read and writes the table to `output`.
    ///
    /// Input errors surface before any read is submitted. Nothing is written
    /// unless annotation succeeds.
    pub fn run(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<AnnotationSummary, SpeciesError> {
        let started_at = iso_timestamp();
        let reads = load_reads(input.as_std_path())?;
        info!(reads = reads.len(), input = %input, "input loaded");

        let table = self.annotate(reads, sink)?;
        write_table(&table, output.as_std_path(), self.options.with_read_id)?;
        info!(rows = table.len(), output = %output, "table written");

        Ok(AnnotationSummary::new(&table, input, output, started_at))
    }

    /// Resolves every read on a bounded worker pool, one task per read.
    ///
    /// Rows are collected in completion order and only reordered when
    /// [`RowOrder::Input`] is configured.
    pub fn annotate(
        &self,
        reads: Vec<Read>,
        sink: &dyn ProgressSink,
    ) -> Result<AnnotationTable, SpeciesError> {
        let total = reads.len();
        let mut table = AnnotationTable {
            rows: Vec::with_capacity(total),
        };
        if total == 0 {
            return Ok(table);
        }

        let threads = self.options.threads.max(1).min(total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("kira-species-{index}"))
            .build()
            .map_err(|err| SpeciesError::WorkerPool(err.to_string()))?;
        info!(reads = total, threads, "annotating reads");

        let (tx, rx) = mpsc::channel();
        let resolver = &self.resolver;
        let policy = self.options.on_error;
        let mut first_error: Option<SpeciesError> = None;

        pool.in_place_scope(|scope| {
            for (index, read) in reads.into_iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = resolver.resolve(&read.sequence);
                    // The receiver lives until every task has reported.
                    let _ = tx.send((index, read, result));
                });
            }
            drop(tx);

            for (done, (index, read, result)) in rx.iter().enumerate() {
                let outcome = match result {
                    Ok(resolution) => Outcome::Resolved(resolution),
                    Err(err) => {
                        warn!(read = %read.identifier, error = %err, "resolution failed");
                        let message = err.to_string();
                        if policy == FailurePolicy::Abort && first_error.is_none() {
                            first_error = Some(err);
                        }
                        Outcome::Failed { message }
                    }
                };
                sink.event(ProgressEvent {
                    message: format!("{} -> {}", read.identifier, outcome.describe()),
                    completed: done + 1,
                    total,
                });
                table
                    .rows
                    .push(AnnotationRow::from_outcome(index, read, &outcome));
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }
        if self.options.order == RowOrder::Input {
            table.sort_by_input();
        }
        Ok(table)
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Resolution;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoResolver {
        calls: AtomicUsize,
    }

    impl SpeciesResolver for EchoResolver {
        fn resolve(&self, sequence: &str) -> Result<Resolution, SpeciesError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Resolution::Matched {
                label: format!("Genus {sequence}"),
                sequence: sequence.to_string(),
            })
        }
    }

    #[test]
    fn one_task_per_read() {
        let app = App::new(
            EchoResolver {
                calls: AtomicUsize::new(0),
            },
            PipelineConfig {
                threads: 3,
                order: RowOrder::Input,
                ..PipelineConfig::default()
            },
        );
        let reads = vec![
            Read::new("r1", "AAA"),
            Read::new("r2", "CCC"),
            Read::new("r3", "GGG"),
            Read::new("r4", "TTT"),
        ];
        let table = app.annotate(reads, &NoProgress).unwrap();

        assert_eq!(app.resolver().calls.load(Ordering::SeqCst), 4);
        let labels: Vec<_> = table.rows.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, vec!["Genus AAA", "Genus CCC", "Genus GGG", "Genus TTT"]);
    }

    #[test]
    fn empty_input_needs_no_pool() {
        let app = App::new(
            EchoResolver {
                calls: AtomicUsize::new(0),
            },
            PipelineConfig::default(),
        );
        let table = app.annotate(Vec::new(), &NoProgress).unwrap();
        assert!(table.is_empty());
        assert_eq!(app.resolver().calls.load(Ordering::SeqCst), 0);
    }
}
