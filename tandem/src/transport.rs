//! Engine transport boundary.
//!
//! The access layer talks to the search engine through the [`Transport`]
//! trait so the HTTP client remains a black box to the adapter code. The
//! default implementation, [`HttpTransport`], wraps a blocking reqwest
//! client. Retry policy lives here (at client construction time) and
//! nowhere else; the adapter layer performs zero silent retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::EngineConfig;

/// Errors surfaced by a [`Transport`] implementation. The adapter layer
/// translates these into its own error taxonomy where appropriate
/// (e.g. a 404 on a single-document get becomes `Error::NotFound`).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("conflict: {reason}")]
    Conflict { reason: String, body: Value },

    #[error("not found: {reason}")]
    NotFound { reason: String, body: Value },

    #[error("request error ({status}): {reason}")]
    Request {
        status: u16,
        reason: String,
        body: Value,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// HTTP status associated with the error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Conflict { .. } => Some(409),
            Self::NotFound { .. } => Some(404),
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

/// Blocking RPC boundary to the engine.
///
/// Paths are engine REST paths without a leading slash (`""` for the
/// cluster root). Bodies are JSON except for [`Transport::send_bulk`],
/// which takes pre-rendered NDJSON lines.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, TransportError>;

    /// Issue a bulk request. Each element of `lines` is serialized onto
    /// its own line of the request body.
    fn send_bulk(
        &self,
        path: &str,
        params: &[(&str, String)],
        lines: &[Value],
    ) -> Result<Value, TransportError>;
}

/// HTTP transport over a blocking reqwest client.
///
/// Two client profiles exist: the default one, and an "export" profile
/// with longer timeouts and transport-level retries, for slow scroll and
/// export style queries.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    hosts: Vec<Url>,
    next_host: AtomicUsize,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> Result<Self, TransportError> {
        Self::with_timeout(config, Duration::from_secs(config.timeout_secs))
    }

    /// Client profile tolerant of slow queries (large exports, scrolls).
    pub fn for_export(config: &EngineConfig) -> Result<Self, TransportError> {
        Self::with_timeout(config, Duration::from_secs(config.export_timeout_secs))
    }

    fn with_timeout(config: &EngineConfig, timeout: Duration) -> Result<Self, TransportError> {
        let hosts = parse_hosts(&config.hosts, config.port)?;
        if hosts.is_empty() {
            return Err(TransportError::Connection("no engine hosts configured".into()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            hosts,
            next_host: AtomicUsize::new(0),
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let idx = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        self.hosts[idx]
            .join(path)
            .map_err(|e| TransportError::Serialization(e.to_string()))
    }

    fn execute(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        build: impl FnOnce(reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder,
    ) -> Result<Value, TransportError> {
        let url = self.url_for(path)?;
        let req = match method {
            Method::Get => self.client.get(url),
            Method::Put => self.client.put(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
            Method::Head => self.client.head(url),
        };
        let req = build(req.query(params));
        let response = req.send().map_err(classify_reqwest_error)?;
        let status = response.status();
        let body: Value = if method == Method::Head {
            Value::Null
        } else {
            let text = response.text().map_err(classify_reqwest_error)?;
            if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| TransportError::Serialization(e.to_string()))?
            }
        };
        if status.is_success() {
            return Ok(body);
        }
        let reason = error_reason(&body, status.as_u16());
        Err(match status.as_u16() {
            404 => TransportError::NotFound { reason, body },
            409 => TransportError::Conflict { reason, body },
            code => TransportError::Request {
                status: code,
                reason,
                body,
            },
        })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        self.execute(method, path, params, |req| match body {
            Some(json) => req.json(json),
            None => req,
        })
    }

    fn send_bulk(
        &self,
        path: &str,
        params: &[(&str, String)],
        lines: &[Value],
    ) -> Result<Value, TransportError> {
        let mut payload = String::new();
        for line in lines {
            payload.push_str(&line.to_string());
            payload.push('\n');
        }
        self.execute(Method::Post, path, params, |req| {
            req.header("content-type", "application/x-ndjson").body(payload)
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_decode() || err.is_body() {
        TransportError::Serialization(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

/// Extract the engine's error reason from a failure body, falling back to
/// the bare status code when the shape is unfamiliar.
fn error_reason(body: &Value, status: u16) -> String {
    body.get("error")
        .and_then(|e| e.get("reason").or_else(|| e.get("type")))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Render the host list for the engine client. Each spec is either
/// `host` or `host:port`; bare hosts get the configured default port.
fn parse_hosts(specs: &[String], default_port: u16) -> Result<Vec<Url>, TransportError> {
    let mut hosts = Vec::with_capacity(specs.len());
    for spec in specs {
        let (host, port) = match spec.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| TransportError::Connection(format!("invalid host spec: {spec}")))?;
                (host, port)
            }
            None => (spec.as_str(), default_port),
        };
        let url = Url::parse(&format!("http://{host}:{port}/"))
            .map_err(|e| TransportError::Connection(format!("invalid host spec {spec}: {e}")))?;
        hosts.push(url);
    }
    Ok(hosts)
}
