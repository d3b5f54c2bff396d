#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use kira_metadata_fetcher::domain::{AccessionId, MetadataRecord};
use kira_metadata_fetcher::error::KiraError;
use kira_metadata_fetcher::fetch::{Backoff, MetadataSource, RawResponse};

/// Answers 200 with a one-record ENA-style body, except for scripted IDs.
#[derive(Default)]
pub struct MockSource {
    pub always_500: HashSet<String>,
    pub malformed: HashSet<String>,
    pub panics: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn with_500(ids: &[&str]) -> Self {
        Self {
            always_500: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn attempts(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == id)
            .count()
    }
}

impl MetadataSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn request(&self, id: &AccessionId) -> Result<RawResponse, KiraError> {
        self.calls.lock().unwrap().push(id.to_string());
        if self.panics.contains(id.as_str()) {
            panic!("worker fault on {id}");
        }
        if self.always_500.contains(id.as_str()) {
            return Ok(RawResponse {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        let body = if self.malformed.contains(id.as_str()) {
            "not json".to_string()
        } else {
            json!([{"accession": id.as_str(), "host": "human"}]).to_string()
        };
        Ok(RawResponse { status: 200, body })
    }

    fn decode(&self, id: &AccessionId, body: &str) -> Result<MetadataRecord, KiraError> {
        let value: Value = serde_json::from_str(body).map_err(|err| KiraError::Decode {
            id: id.to_string(),
            message: err.to_string(),
        })?;
        match value {
            Value::Array(mut items) if !items.is_empty() => match items.remove(0) {
                Value::Object(record) => Ok(record),
                _ => Err(KiraError::Decode {
                    id: id.to_string(),
                    message: "not an object".to_string(),
                }),
            },
            _ => Err(KiraError::Decode {
                id: id.to_string(),
                message: "not an array".to_string(),
            }),
        }
    }

    fn status_error(&self, status: u16, message: String) -> KiraError {
        KiraError::EnaStatus { status, message }
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingBackoff {
    pub waits: Mutex<Vec<Duration>>,
}

impl Backoff for RecordingBackoff {
    fn wait(&self, delay: Duration) {
        self.waits.lock().unwrap().push(delay);
    }
}

pub fn ids(values: &[&str]) -> Vec<AccessionId> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

pub fn numbered_ids(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("{prefix}{n}")).collect()
}
