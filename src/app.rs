use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::chunk_ids;
use crate::domain::{FetchFailure, Pipeline};
use crate::error::KiraError;
use crate::fetch::{Backoff, Fetcher, MetadataSource, ThreadSleep};
use crate::loader::load_accessions;
use crate::output::{write_csv, write_json};
use crate::pool::PoolScheduler;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub input: Utf8PathBuf,
    pub column: String,
    pub output_json: Utf8PathBuf,
    pub output_csv: Option<Utf8PathBuf>,
    pub chunk_size: usize,
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub pipeline: Pipeline,
    pub input: String,
    pub column: String,
    pub accessions: usize,
    pub chunks: usize,
    pub records: usize,
    pub failures: Vec<FetchFailure>,
    pub failed_chunks: Vec<usize>,
    pub output_json: String,
    pub output_csv: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub message: String,
    pub elapsed: Duration,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<S: MetadataSource, B: Backoff = ThreadSleep> {
    pipeline: Pipeline,
    fetcher: Fetcher<S, B>,
}

impl<S: MetadataSource, B: Backoff> App<S, B> {
    pub fn new(pipeline: Pipeline, fetcher: Fetcher<S, B>) -> Self {
        Self { pipeline, fetcher }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn fetch(
        &self,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchSummary, KiraError> {
        let started_at = iso_timestamp();
        if options.output_csv.is_some() && !self.pipeline.supports_csv() {
            return Err(KiraError::InvalidConfig(format!(
                "CSV output is not available for the {} pipeline",
                self.pipeline
            )));
        }
        let scheduler = PoolScheduler::new(options.max_workers)?;

        let ids = load_accessions(options.input.as_std_path(), &options.column)?;
        let chunks = chunk_ids(&ids, options.chunk_size)?;
        let chunk_count = chunks.len();
        info!(
            pipeline = %self.pipeline,
            accessions = ids.len(),
            chunks = chunk_count,
            chunk_size = options.chunk_size,
            "partitioned accessions"
        );

        let collection = scheduler.run(&self.fetcher, chunks, sink);
        if !collection.failures.is_empty() {
            warn!(
                failures = collection.failures.len(),
                "some accessions returned no metadata"
            );
        }

        write_json(options.output_json.as_std_path(), &collection.records)?;
        info!(path = %options.output_json, records = collection.records.len(), "wrote JSON");

        if let Some(csv_path) = &options.output_csv {
            write_csv(csv_path.as_std_path(), &collection.records)?;
            info!(path = %csv_path, "wrote CSV");
        }

        Ok(FetchSummary {
            pipeline: self.pipeline,
            input: options.input.to_string(),
            column: options.column.clone(),
            accessions: ids.len(),
            chunks: chunk_count,
            records: collection.records.len(),
            failures: collection.failures,
            failed_chunks: collection.failed_chunks,
            output_json: options.output_json.to_string(),
            output_csv: options.output_csv.as_ref().map(|path| path.to_string()),
            started_at,
            finished_at: iso_timestamp(),
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
