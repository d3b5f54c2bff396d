use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::KiraError;

pub type MetadataRecord = Map<String, Value>;

pub const DEFAULT_MISSING_VALUES: &[&str] = &[
    "",
    "missing",
    "not available",
    "not determined",
    "not applicable",
    "not collected",
    "na",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessionId(String);

impl AccessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessionId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    Sample,
    Run,
}

impl Pipeline {
    pub fn default_column(self) -> &'static str {
        match self {
            Pipeline::Sample => "BioSample",
            Pipeline::Run => "subjectID",
        }
    }

    pub fn supports_csv(self) -> bool {
        matches!(self, Pipeline::Sample)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Sample => write!(f, "sample"),
            Pipeline::Run => write!(f, "run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValues {
    values: HashSet<String>,
}

impl Default for MissingValues {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_VALUES.iter().copied())
    }
}

impl MissingValues {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            values: values
                .into_iter()
                .map(|value| value.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_missing(&self, value: &str) -> bool {
        self.values.contains(&value.to_lowercase())
    }

    pub fn strip_flat(&self, record: MetadataRecord) -> Result<MetadataRecord, KiraError> {
        let mut kept = Map::with_capacity(record.len());
        for (field, value) in record {
            match value {
                Value::String(text) => {
                    if !self.is_missing(&text) {
                        kept.insert(field, Value::String(text));
                    }
                }
                _ => return Err(KiraError::NonStringField { field }),
            }
        }
        Ok(kept)
    }

    pub fn strip_nested(&self, record: MetadataRecord) -> MetadataRecord {
        record
            .into_iter()
            .filter_map(|(field, value)| self.strip_value(value).map(|value| (field, value)))
            .collect()
    }

    fn strip_value(&self, value: Value) -> Option<Value> {
        match value {
            Value::String(text) if self.is_missing(&text) => None,
            Value::Object(map) => Some(Value::Object(self.strip_nested(map))),
            Value::Array(items) => Some(Value::Array(
                items
                    .into_iter()
                    .filter_map(|item| self.strip_value(item))
                    .collect(),
            )),
            other => Some(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub accession: String,
    pub status: Option<u16>,
    pub reason: String,
}

impl FetchFailure {
    pub fn new(id: &AccessionId, err: &KiraError) -> Self {
        Self {
            accession: id.as_str().to_string(),
            status: err.status(),
            reason: err.to_string(),
        }
    }
}
