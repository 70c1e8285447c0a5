//! Article API client.
//!
//! Every response is turned into a [`RowOutcome`]; nothing a single row
//! can run into is an `Err`.

use chrono::Utc;
use reqwest::{
    Url,
    blocking::{Client, ClientBuilder},
    header::CONTENT_TYPE,
};
use serde_json::{Map, Value};
use std::{fmt, thread, time::Duration};

use crate::{
    config::{Config, USER_AGENT},
    error::Result,
};

/// Fields extracted from the first element of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 200 response whose content type is not JSON.
    NonJson { content_type: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonJson { content_type } if content_type.is_empty() => {
                f.write_str("response has no content type")
            }
            SkipReason::NonJson { content_type } => {
                write!(f, "response content type is '{content_type}'")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// No response at all (connect error, timeout, broken body).
    Transport(String),
    /// Any status other than 200.
    Status(u16),
    /// Body is not valid JSON.
    InvalidJson(String),
    /// Valid JSON, but not a non-empty array of objects.
    UnexpectedPayload(String),
}

impl FailureKind {
    /// Worth another attempt: the server or the network may recover.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::Transport(_) => true,
            FailureKind::Status(code) => *code >= 500 || *code == 429,
            FailureKind::InvalidJson(_) | FailureKind::UnexpectedPayload(_) => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport(msg) => write!(f, "request failed: {msg}"),
            FailureKind::Status(code) => write!(f, "HTTP status {code}"),
            FailureKind::InvalidJson(msg) => write!(f, "invalid JSON: {msg}"),
            FailureKind::UnexpectedPayload(msg) => write!(f, "unexpected payload: {msg}"),
        }
    }
}

/// What happened to one ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Updated(Article),
    Skipped(SkipReason),
    Failed {
        kind: FailureKind,
        /// The request URL that was attempted last.
        request_url: String,
    },
}

/// A received response, detached from the HTTP client.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Anything that can resolve an ID to a [`RowOutcome`].
pub trait ArticleSource {
    fn fetch(&self, id: i64) -> RowOutcome;
}

impl<F> ArticleSource for F
where
    F: Fn(i64) -> RowOutcome,
{
    fn fetch(&self, id: i64) -> RowOutcome {
        self(id)
    }
}

/// Blocking client for the article endpoint.
#[derive(Debug, Clone)]
pub struct ArticleClient {
    client: Client,
    endpoint: Url,
    type_id: i64,
    interface_id: i64,
    title_key: String,
    body_key: String,
    retries: u32,
    retry_backoff: Duration,
}

impl ArticleClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_builder(config, Client::builder())
    }

    /// Like [`ArticleClient::new`] but starting from a caller-supplied builder.
    /// The User-Agent and timeout from `config` are always applied on top.
    pub fn with_builder(config: &Config, builder: ClientBuilder) -> Result<Self> {
        let client = builder
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            type_id: config.type_id,
            interface_id: config.interface_id,
            title_key: config.title_key.clone(),
            body_key: config.body_key.clone(),
            retries: config.retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// `<endpoint>?questionId=&typeId=&id=&interfaceId=&_=`, in that order.
    pub fn request_url(&self, id: i64, cache_buster: i64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("questionId", &id.to_string())
            .append_pair("typeId", &self.type_id.to_string())
            .append_pair("id", &id.to_string())
            .append_pair("interfaceId", &self.interface_id.to_string())
            .append_pair("_", &cache_buster.to_string());
        url
    }

    fn send(&self, url: &Url) -> std::result::Result<ApiResponse, reqwest::Error> {
        let resp = self.client.get(url.clone()).send()?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes()?.to_vec();

        Ok(ApiResponse {
            url: final_url,
            status,
            content_type,
            body,
        })
    }

    fn attempt(&self, id: i64) -> RowOutcome {
        let url = self.request_url(id, Utc::now().timestamp_millis());
        log::debug!("GET {url}");
        match self.send(&url) {
            Ok(resp) => interpret(&resp, &self.title_key, &self.body_key),
            Err(e) => RowOutcome::Failed {
                kind: FailureKind::Transport(error_chain(&e)),
                request_url: url.to_string(),
            },
        }
    }
}

impl ArticleSource for ArticleClient {
    fn fetch(&self, id: i64) -> RowOutcome {
        let mut attempt = 0u32;
        loop {
            let outcome = self.attempt(id);
            let RowOutcome::Failed { kind, .. } = &outcome else {
                return outcome;
            };
            if !kind.is_retryable() || attempt >= self.retries {
                return outcome;
            }
            let delay = self
                .retry_backoff
                .saturating_mul(1u32 << attempt.min(16));
            attempt += 1;
            log::warn!(
                "ID {id}: {kind}, retrying in {} ms ({attempt}/{})",
                delay.as_millis(),
                self.retries
            );
            thread::sleep(delay);
        }
    }
}

/// Maps one response to an outcome.
///
/// A 200 with a non-JSON content type is a skip, not a failure. Only the
/// first array element is used.
pub fn interpret(resp: &ApiResponse, title_key: &str, body_key: &str) -> RowOutcome {
    let failed = |kind| RowOutcome::Failed {
        kind,
        request_url: resp.url.clone(),
    };

    if resp.status != 200 {
        return failed(FailureKind::Status(resp.status));
    }

    let content_type = resp.content_type.as_deref().unwrap_or_default();
    if !content_type
        .to_ascii_lowercase()
        .contains("application/json")
    {
        return RowOutcome::Skipped(SkipReason::NonJson {
            content_type: content_type.to_owned(),
        });
    }

    let body = resp
        .body
        .strip_prefix(b"\xEF\xBB\xBF")
        .unwrap_or(&resp.body);
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return failed(FailureKind::InvalidJson(e.to_string())),
    };

    let items = match value {
        Value::Array(items) => items,
        other => {
            return failed(FailureKind::UnexpectedPayload(format!(
                "expected an array, got {}",
                json_kind(&other)
            )));
        }
    };
    let first = match items.first() {
        Some(Value::Object(obj)) => obj,
        Some(other) => {
            return failed(FailureKind::UnexpectedPayload(format!(
                "first element is {}, not an object",
                json_kind(other)
            )));
        }
        None => return failed(FailureKind::UnexpectedPayload("empty array".into())),
    };
    if items.len() > 1 {
        log::warn!(
            "{} returned {} elements, using the first",
            resp.url,
            items.len()
        );
    }

    RowOutcome::Updated(Article {
        title: field_text(first, title_key),
        body: field_text(first, body_key),
    })
}

/// Missing and `null` become empty, strings are taken as is, anything else
/// is kept as its JSON text.
fn field_text(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `reqwest` keeps the useful part (refused, timed out…) in the source chain.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}
