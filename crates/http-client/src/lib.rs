#![allow(dead_code)]

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// SOLPLUS firmware answers quickly or not at all; fail fast instead of
/// holding up the scheduler.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Raw outcome of a single GET against the inverter's status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("http transport error: {0}")]
    Http(String),
}

/// One GET per call against `http://<host>/`. Implementations enforce their
/// own request deadline; a timed-out request resolves to an error value,
/// never an unwound panic.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, host: &str) -> Result<HttpResponse, TransportError>;
}

fn status_page_url(host: &str) -> String {
    format!("http://{host}/")
}

/// The inverter firmware emits ISO-8859-1 bytes; forcing latin-1 keeps a
/// stray umlaut from turning into a decode failure.
fn decode_body(bytes: &[u8]) -> String {
    encoding_rs::mem::decode_latin1(bytes).into_owned()
}

/// Natively non-blocking transport backed by a shared `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, host: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(status_page_url(host))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        // Only a 200 carries a parseable page; other statuses are reported
        // with an empty body for the caller to treat as a failed poll.
        let body = if status == 200 {
            let bytes = response.bytes().await.map_err(map_reqwest_error)?;
            decode_body(&bytes)
        } else {
            String::new()
        };
        debug!(host, status, body_len = body.len(), "status page fetched");
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Http(err.to_string())
    }
}

/// Blocking `ureq` transport offloaded to the runtime's blocking pool, for
/// deployments where the async client is unavailable or undesired.
pub struct BlockingTransport {
    agent: ureq::Agent,
}

impl BlockingTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::builder().timeout(timeout).build();
        Self { agent }
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    async fn fetch(&self, host: &str) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let url = status_page_url(host);
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url))
            .await
            .map_err(|err| TransportError::Http(err.to_string()))?
    }
}

fn fetch_blocking(agent: &ureq::Agent, url: &str) -> Result<HttpResponse, TransportError> {
    match agent.get(url).call() {
        Ok(response) => {
            let status = response.status();
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(map_io_error)?;
            debug!(url, status, body_len = bytes.len(), "status page fetched");
            Ok(HttpResponse {
                status,
                body: decode_body(&bytes),
            })
        }
        // ureq reports non-2xx as an error; at this layer it is a known
        // status, not a transport fault.
        Err(ureq::Error::Status(status, _)) => Ok(HttpResponse {
            status,
            body: String::new(),
        }),
        Err(ureq::Error::Transport(transport)) => Err(map_ureq_transport(&transport)),
    }
}

fn map_io_error(err: std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => TransportError::Timeout,
        _ => TransportError::Http(err.to_string()),
    }
}

fn map_ureq_transport(transport: &ureq::Transport) -> TransportError {
    let message = transport.to_string();
    match transport.kind() {
        ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
            TransportError::Connect(message)
        }
        ureq::ErrorKind::Io if message.contains("timed out") => TransportError::Timeout,
        _ => TransportError::Http(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_page_url_targets_device_root() {
        assert_eq!(status_page_url("192.168.1.40"), "http://192.168.1.40/");
    }

    #[test]
    fn decode_body_handles_non_utf8_bytes() {
        // "Netzspannung" labels come with latin-1 punctuation and umlauts.
        let bytes = b"Leistung: 100 Watt, Gr\xf6\xdfe";
        assert_eq!(decode_body(bytes), "Leistung: 100 Watt, Größe");
    }

    #[test]
    fn io_timeout_maps_to_timeout_error() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        assert!(matches!(map_io_error(err), TransportError::Timeout));
    }

    #[test]
    fn non_200_response_is_not_ok() {
        let response = HttpResponse {
            status: 503,
            body: String::new(),
        };
        assert!(!response.is_ok());
    }
}
