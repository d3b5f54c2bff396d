mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use kira_metadata_fetcher::app::{ProgressEvent, ProgressSink};
use kira_metadata_fetcher::chunk::{Chunk, chunk_ids};
use kira_metadata_fetcher::config::RetryPolicy;
use kira_metadata_fetcher::domain::{AccessionId, MetadataRecord};
use kira_metadata_fetcher::error::KiraError;
use kira_metadata_fetcher::fetch::{Backoff, Fetcher, MetadataSource, RawResponse};
use kira_metadata_fetcher::loader::unique_sorted;
use kira_metadata_fetcher::pool::{ChunkWorker, PoolScheduler};

use common::{MockSource, RecordingBackoff, ids, numbered_ids};

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for CollectingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct ThrottledSource {
    delay: Duration,
    failing: String,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    backing_off: Arc<AtomicBool>,
    during_backoff: AtomicUsize,
}

impl MetadataSource for ThrottledSource {
    fn name(&self) -> &'static str {
        "throttled"
    }

    fn request(&self, id: &AccessionId) -> Result<RawResponse, KiraError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let failing = id.as_str() == self.failing;
        if !failing && self.backing_off.load(Ordering::SeqCst) {
            self.during_backoff.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawResponse {
            status: if failing { 500 } else { 200 },
            body: String::new(),
        })
    }

    fn decode(&self, id: &AccessionId, _body: &str) -> Result<MetadataRecord, KiraError> {
        let mut record = MetadataRecord::new();
        record.insert("accession".to_string(), Value::from(id.as_str()));
        Ok(record)
    }

    fn status_error(&self, status: u16, message: String) -> KiraError {
        KiraError::EnaStatus { status, message }
    }
}

struct FlaggedSleep {
    backing_off: Arc<AtomicBool>,
}

impl Backoff for FlaggedSleep {
    fn wait(&self, delay: Duration) {
        self.backing_off.store(true, Ordering::SeqCst);
        thread::sleep(delay);
        self.backing_off.store(false, Ordering::SeqCst);
    }
}

fn fetcher(source: MockSource) -> Fetcher<MockSource, RecordingBackoff> {
    let policy = RetryPolicy {
        n_tries: 3,
        backoff: Duration::from_secs(20),
    };
    Fetcher::with_backoff(source, policy, RecordingBackoff::default())
}

#[test]
fn chunk_worker_isolates_failing_id() {
    let fetcher = fetcher(MockSource::with_500(&["SAMN3"]));
    let chunk = Chunk {
        index: 0,
        ids: ids(&["SAMN1", "SAMN2", "SAMN3", "SAMN4", "SAMN5"]),
    };

    let outcome = ChunkWorker::new(&fetcher).process(&chunk);

    let fetched: Vec<_> = outcome
        .records
        .iter()
        .map(|record| record["accession"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fetched, vec!["SAMN1", "SAMN2", "SAMN4", "SAMN5"]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].accession, "SAMN3");
    assert_eq!(outcome.failures[0].status, Some(500));
}

#[test]
fn chunk_worker_skips_malformed_payload() {
    let mut source = MockSource::default();
    source.malformed.insert("SAMN2".to_string());
    let fetcher = fetcher(source);
    let chunk = Chunk {
        index: 4,
        ids: ids(&["SAMN1", "SAMN2", "SAMN3"]),
    };

    let outcome = ChunkWorker::new(&fetcher).process(&chunk);

    assert_eq!(outcome.index, 4);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.failures[0].status, None);
}

#[test]
fn scheduler_fetches_every_chunk() {
    let raw = numbered_ids("SAMN", 250);
    let accessions = unique_sorted(&raw);
    let chunks = chunk_ids(&accessions, 100).unwrap();
    let sizes: Vec<_> = chunks.iter().map(Chunk::len).collect();
    assert_eq!(sizes, vec![100, 100, 50]);

    let fetcher = fetcher(MockSource::default());
    let sink = CollectingSink::default();
    let collection = PoolScheduler::new(5).unwrap().run(&fetcher, chunks, &sink);

    assert_eq!(collection.records.len(), 250);
    assert!(collection.failures.is_empty());
    let seen: HashSet<_> = collection
        .records
        .iter()
        .map(|record| record["accession"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(seen, raw.into_iter().collect::<HashSet<_>>());

    let events = sink.events.lock().unwrap();
    let completed: Vec<_> = events.iter().map(|event| event.completed).collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert!(events.iter().all(|event| event.total == 3));
    assert!(
        events
            .windows(2)
            .all(|pair| pair[0].elapsed <= pair[1].elapsed)
    );
}

#[test]
fn scheduler_bounds_workers_and_keeps_fetching_during_backoff() {
    let backing_off = Arc::new(AtomicBool::new(false));
    let source = ThrottledSource {
        delay: Duration::from_millis(30),
        failing: "SAMN1".to_string(),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        backing_off: Arc::clone(&backing_off),
        during_backoff: AtomicUsize::new(0),
    };
    let policy = RetryPolicy {
        n_tries: 3,
        backoff: Duration::from_millis(400),
    };
    let fetcher = Fetcher::with_backoff(source, policy, FlaggedSleep { backing_off });
    let accessions = unique_sorted(numbered_ids("SAMN", 40));
    let chunks = chunk_ids(&accessions, 2).unwrap();

    let collection = PoolScheduler::new(3)
        .unwrap()
        .run(&fetcher, chunks, &CollectingSink::default());

    assert_eq!(collection.records.len(), 39);
    assert_eq!(collection.failures.len(), 1);
    assert_eq!(collection.failures[0].accession, "SAMN1");
    assert_eq!(collection.failures[0].status, Some(500));

    let source = fetcher.source();
    let peak = source.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight requests was {peak}");
    assert!(peak > 1, "requests never overlapped");
    assert!(source.during_backoff.load(Ordering::SeqCst) > 0);
}

#[test]
fn scheduler_absorbs_worker_fault() {
    let mut source = MockSource::default();
    source.panics.insert("SRR5".to_string());
    let fetcher = fetcher(source);
    let accessions = ids(&["SRR1", "SRR2", "SRR3", "SRR4", "SRR5", "SRR6"]);
    let chunks = chunk_ids(&accessions, 2).unwrap();

    let collection = PoolScheduler::new(2)
        .unwrap()
        .run(&fetcher, chunks, &CollectingSink::default());

    assert_eq!(collection.failed_chunks, vec![2]);
    assert_eq!(collection.records.len(), 4);
    assert!(
        collection
            .records
            .iter()
            .all(|record| record["accession"] != "SRR5" && record["accession"] != "SRR6")
    );
}

#[test]
fn scheduler_with_one_worker_keeps_chunk_order() {
    let fetcher = fetcher(MockSource::default());
    let accessions = ids(&["SRR1", "SRR2", "SRR3", "SRR4", "SRR5"]);
    let chunks = chunk_ids(&accessions, 2).unwrap();

    let collection = PoolScheduler::new(1)
        .unwrap()
        .run(&fetcher, chunks, &CollectingSink::default());

    let order: Vec<_> = collection
        .records
        .iter()
        .map(|record| record["accession"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["SRR1", "SRR2", "SRR3", "SRR4", "SRR5"]);
}

#[test]
fn scheduler_handles_no_chunks() {
    let fetcher = fetcher(MockSource::default());
    let collection = PoolScheduler::new(3)
        .unwrap()
        .run(&fetcher, Vec::new(), &CollectingSink::default());
    assert!(collection.records.is_empty());
}

#[test]
fn zero_workers_is_rejected() {
    assert!(PoolScheduler::new(0).is_err());
}
