use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{AccessionId, MetadataRecord, MissingValues};
use crate::error::KiraError;
use crate::fetch::{MetadataSource, RawResponse};
use crate::xml::xml_to_document;

// Answers with a RunBundle XML document even though the request asks for JSON.
#[derive(Clone)]
pub struct SraRunClient {
    client: Client,
    base_url: String,
    missing_values: MissingValues,
}

impl SraRunClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        missing_values: MissingValues,
    ) -> Result<Self, KiraError> {
        let client = Client::builder()
            .default_headers(Self::default_headers()?)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::SraHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            missing_values,
        })
    }

    pub fn default_headers() -> Result<HeaderMap, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-mf/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::SraHttp(err.to_string()))?,
        );
        Ok(headers)
    }

    pub fn query(id: &AccessionId) -> [(&'static str, &str); 2] {
        [("acc", id.as_str()), ("format", "json")]
    }
}

impl MetadataSource for SraRunClient {
    fn name(&self) -> &'static str {
        "sra"
    }

    fn request(&self, id: &AccessionId) -> Result<RawResponse, KiraError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query(id))
            .send()
            .map_err(|err| KiraError::SraHttp(err.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .map_err(|err| KiraError::SraHttp(err.to_string()))?;
        Ok(RawResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn decode(&self, id: &AccessionId, body: &str) -> Result<MetadataRecord, KiraError> {
        let record = parse_run_bundle(id, body)?;
        Ok(self.missing_values.strip_nested(record))
    }

    fn status_error(&self, status: u16, message: String) -> KiraError {
        KiraError::SraStatus { status, message }
    }
}

pub const RUN_LIST_KEY: &str = "RUN";

pub fn parse_run_bundle(id: &AccessionId, body: &str) -> Result<MetadataRecord, KiraError> {
    let decode_err = |message: String| KiraError::Decode {
        id: id.to_string(),
        message,
    };
    let mut document = xml_to_document(body).map_err(decode_err)?;
    let run = match document.remove("RunBundle") {
        Some(Value::Object(mut bundle)) => bundle.remove("RUN"),
        Some(_) => return Err(decode_err("RunBundle has no children".to_string())),
        None => return Err(decode_err("missing RunBundle root".to_string())),
    };
    match run {
        Some(Value::Object(record)) => Ok(record),
        Some(Value::Array(runs)) => {
            if runs.iter().any(|run| !run.is_object()) {
                return Err(decode_err("RUN element is empty".to_string()));
            }
            let mut record = MetadataRecord::new();
            record.insert(RUN_LIST_KEY.to_string(), Value::Array(runs));
            Ok(record)
        }
        Some(_) => Err(decode_err("RUN element is empty".to_string())),
        None => Err(decode_err("RunBundle has no RUN element".to_string())),
    }
}
