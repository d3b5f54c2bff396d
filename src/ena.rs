use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{AccessionId, MetadataRecord, MissingValues};
use crate::error::KiraError;
use crate::fetch::{MetadataSource, RawResponse};

#[derive(Clone)]
pub struct EnaSampleClient {
    client: Client,
    base_url: String,
    missing_values: MissingValues,
}

impl EnaSampleClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        missing_values: MissingValues,
    ) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-mf/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::EnaHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::EnaHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            missing_values,
        })
    }

    pub fn query(id: &AccessionId) -> [(&'static str, &str); 4] {
        [
            ("accession", id.as_str()),
            ("result", "sample"),
            ("format", "json"),
            ("fields", "all"),
        ]
    }
}

impl MetadataSource for EnaSampleClient {
    fn name(&self) -> &'static str {
        "ena"
    }

    fn request(&self, id: &AccessionId) -> Result<RawResponse, KiraError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query(id))
            .send()
            .map_err(|err| KiraError::EnaHttp(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| KiraError::EnaHttp(err.to_string()))?;
        Ok(RawResponse { status, body })
    }

    fn decode(&self, id: &AccessionId, body: &str) -> Result<MetadataRecord, KiraError> {
        let record = parse_sample_report(id, body)?;
        self.missing_values
            .strip_flat(record)
            .map_err(|err| KiraError::Decode {
                id: id.to_string(),
                message: err.to_string(),
            })
    }

    fn status_error(&self, status: u16, message: String) -> KiraError {
        KiraError::EnaStatus { status, message }
    }
}

pub fn parse_sample_report(id: &AccessionId, body: &str) -> Result<MetadataRecord, KiraError> {
    let decode_err = |message: String| KiraError::Decode {
        id: id.to_string(),
        message,
    };
    let value: Value = serde_json::from_str(body).map_err(|err| decode_err(err.to_string()))?;
    let Value::Array(items) = value else {
        return Err(decode_err("expected a JSON array".to_string()));
    };
    match items.into_iter().next() {
        Some(Value::Object(record)) => Ok(record),
        Some(_) => Err(decode_err("first element is not an object".to_string())),
        None => Err(decode_err("empty result array".to_string())),
    }
}
