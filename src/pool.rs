use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crossbeam_channel::unbounded;
use serde::Serialize;
use tracing::{error, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::chunk::Chunk;
use crate::domain::{FetchFailure, MetadataRecord};
use crate::error::KiraError;
use crate::fetch::{Backoff, Fetcher, MetadataSource};

#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub index: usize,
    pub records: Vec<MetadataRecord>,
    pub failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultCollection {
    pub records: Vec<MetadataRecord>,
    pub failures: Vec<FetchFailure>,
    pub failed_chunks: Vec<usize>,
}

impl ResultCollection {
    fn absorb(&mut self, outcome: ChunkOutcome) {
        self.records.extend(outcome.records);
        self.failures.extend(outcome.failures);
    }
}

pub struct ChunkWorker<'a, S: MetadataSource, B: Backoff> {
    fetcher: &'a Fetcher<S, B>,
}

impl<'a, S: MetadataSource, B: Backoff> ChunkWorker<'a, S, B> {
    pub fn new(fetcher: &'a Fetcher<S, B>) -> Self {
        Self { fetcher }
    }

    pub fn process(&self, chunk: &Chunk) -> ChunkOutcome {
        let mut outcome = ChunkOutcome {
            index: chunk.index,
            ..ChunkOutcome::default()
        };
        for id in &chunk.ids {
            match self.fetcher.fetch(id) {
                Ok(record) => outcome.records.push(record),
                Err(err) => {
                    error!(
                        source = self.fetcher.source().name(),
                        accession = %id,
                        chunk = chunk.index,
                        "error fetching metadata: {err}"
                    );
                    outcome.failures.push(FetchFailure::new(id, &err));
                }
            }
        }
        outcome
    }
}

struct ChunkReport {
    index: usize,
    size: usize,
    result: Result<ChunkOutcome, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolScheduler {
    max_workers: usize,
}

impl PoolScheduler {
    pub fn new(max_workers: usize) -> Result<Self, KiraError> {
        if max_workers == 0 {
            return Err(KiraError::InvalidWorkerCount(max_workers));
        }
        Ok(Self { max_workers })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn run<S: MetadataSource, B: Backoff>(
        &self,
        fetcher: &Fetcher<S, B>,
        chunks: Vec<Chunk>,
        sink: &dyn ProgressSink,
    ) -> ResultCollection {
        let total = chunks.len();
        let mut collection = ResultCollection::default();
        if total == 0 {
            return collection;
        }

        let workers = self.max_workers.min(total);
        info!(chunks = total, workers, "starting fetch");

        let (job_tx, job_rx) = unbounded::<Chunk>();
        let (report_tx, report_rx) = unbounded::<ChunkReport>();
        for chunk in chunks {
            // receiver is alive until the scope below ends
            let _ = job_tx.send(chunk);
        }
        drop(job_tx);

        let started = Instant::now();
        thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let reports = report_tx.clone();
                scope.spawn(move || {
                    let worker = ChunkWorker::new(fetcher);
                    for chunk in jobs.iter() {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| worker.process(&chunk)))
                            .map_err(panic_message);
                        let report = ChunkReport {
                            index: chunk.index,
                            size: chunk.len(),
                            result,
                        };
                        if reports.send(report).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(report_tx);

            let mut completed = 0;
            for report in report_rx.iter() {
                completed += 1;
                let message = match report.result {
                    Ok(outcome) => {
                        let message = format!(
                            "chunk {} done: {} records, {} failed",
                            report.index,
                            outcome.records.len(),
                            outcome.failures.len()
                        );
                        collection.absorb(outcome);
                        message
                    }
                    Err(reason) => {
                        error!(
                            chunk = report.index,
                            size = report.size,
                            "error processing chunk: {reason}"
                        );
                        collection.failed_chunks.push(report.index);
                        format!("chunk {} failed: {reason}", report.index)
                    }
                };
                sink.event(ProgressEvent {
                    completed,
                    total,
                    message,
                    elapsed: started.elapsed(),
                });
            }
        });

        collection.failed_chunks.sort_unstable();
        info!(
            records = collection.records.len(),
            failures = collection.failures.len(),
            failed_chunks = collection.failed_chunks.len(),
            "fetch finished"
        );
        collection
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
