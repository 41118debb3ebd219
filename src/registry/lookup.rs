use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::Command;

use crate::shared::{LookupError, RegistrationStatus};

pub const DEFAULT_WHOIS_SERVER: &str = "whois.radb.net";
pub const WHOIS_PORT: u16 = 43;
pub const RIPESTAT_WHOIS_URL: &str = "https://stat.ripe.net/data/whois/data.json";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Substrings that mark a registry answer as "no such object".
pub const NEGATIVE_MARKERS: [&str; 6] = [
    "denied",
    "not match",
    "not found",
    "error",
    "no entries found",
    "invalid",
];

/// A source of free-text registry records for an ASN.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    async fn query(&self, asn: &str) -> Result<String, LookupError>;
}

/// Classifies a registry answer: any negative marker, compared without
/// case, means the ASN is unregistered.
pub fn classify_response(response: &str) -> RegistrationStatus {
    let lowered = response.to_lowercase();
    let unregistered = NEGATIVE_MARKERS.iter().any(|marker| lowered.contains(marker));
    RegistrationStatus::from_registered(!unregistered)
}

/// `64500`, `as64500` and `AS64500` all become `AS64500`.
pub fn query_object(asn: &str) -> String {
    let trimmed = asn.trim();
    let number = trimmed
        .strip_prefix("AS")
        .or_else(|| trimmed.strip_prefix("as"))
        .unwrap_or(trimmed);
    format!("AS{}", number)
}

/// UTF-8 when valid, otherwise each byte read as Latin-1.
pub fn decode_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Runs the local `whois` client against a fixed server.
#[derive(Debug, Clone)]
pub struct WhoisCommand {
    pub program: String,
    pub server: String,
    pub timeout: Duration,
}

impl WhoisCommand {
    pub fn new(server: impl Into<String>) -> Self {
        WhoisCommand {
            program: "whois".to_string(),
            server: server.into(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RegistryLookup for WhoisCommand {
    async fn query(&self, asn: &str) -> Result<String, LookupError> {
        let mut command = Command::new(&self.program);
        command
            .arg("-h")
            .arg(&self.server)
            .arg(query_object(asn))
            .kill_on_drop(true);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| LookupError::Timeout)??;

        // whois exits non-zero for some "no match" answers; only an empty
        // answer from a failed run counts as a transport failure.
        if !output.status.success() && output.stdout.is_empty() {
            return Err(LookupError::CommandFailed(output.status));
        }
        Ok(decode_output(&output.stdout))
    }
}

/// Speaks the WHOIS protocol directly: one query line over TCP, answer
/// read until the server closes.
#[derive(Debug, Clone)]
pub struct WhoisTcp {
    pub server: String,
    pub port: u16,
    pub timeout: Duration,
}

impl WhoisTcp {
    pub fn new(server: impl Into<String>) -> Self {
        WhoisTcp {
            server: server.into(),
            port: WHOIS_PORT,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, asn: &str) -> Result<Vec<u8>, LookupError> {
        let mut stream = TcpStream::connect((self.server.as_str(), self.port)).await?;
        stream
            .write_all(format!("{}\r\n", query_object(asn)).as_bytes())
            .await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok(response)
    }
}

#[async_trait]
impl RegistryLookup for WhoisTcp {
    async fn query(&self, asn: &str) -> Result<String, LookupError> {
        let response = tokio::time::timeout(self.timeout, self.exchange(asn))
            .await
            .map_err(|_| LookupError::Timeout)??;
        Ok(decode_output(&response))
    }
}

/// Queries the RIPEstat whois data call over HTTPS and returns the raw body.
#[derive(Debug, Clone)]
pub struct RipeStatHttp {
    client: reqwest::Client,
    pub base_url: String,
}

impl RipeStatHttp {
    pub fn new(timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RipeStatHttp {
            client,
            base_url: RIPESTAT_WHOIS_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl RegistryLookup for RipeStatHttp {
    async fn query(&self, asn: &str) -> Result<String, LookupError> {
        let response = self
            .client
            .get(self.base_url.as_str())
            .query(&[("resource", query_object(asn))])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(LookupError::HttpStatus(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        Ok(decode_output(&body))
    }
}

/// Which registry transport a run uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryTransport {
    WhoisCommand { server: String },
    WhoisTcp { server: String, port: u16 },
    RipeStat,
}

impl RegistryTransport {
    pub fn build(&self, timeout: Duration) -> Result<Arc<dyn RegistryLookup>, LookupError> {
        let lookup: Arc<dyn RegistryLookup> = match self {
            RegistryTransport::WhoisCommand { server } => {
                Arc::new(WhoisCommand::new(server.clone()).with_timeout(timeout))
            }
            RegistryTransport::WhoisTcp { server, port } => Arc::new(
                WhoisTcp::new(server.clone())
                    .with_port(*port)
                    .with_timeout(timeout),
            ),
            RegistryTransport::RipeStat => Arc::new(RipeStatHttp::new(timeout)?),
        };
        Ok(lookup)
    }
}

impl Default for RegistryTransport {
    fn default() -> Self {
        RegistryTransport::WhoisCommand {
            server: DEFAULT_WHOIS_SERVER.to_string(),
        }
    }
}

impl fmt::Display for RegistryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryTransport::WhoisCommand { server } => write!(f, "whois -h {}", server),
            RegistryTransport::WhoisTcp { server, port } => {
                write!(f, "whois://{}:{}", server, port)
            }
            RegistryTransport::RipeStat => write!(f, "{}", RIPESTAT_WHOIS_URL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_negative_markers() {
        assert_eq!(
            classify_response("%  No entries found for the selected source(s)."),
            RegistrationStatus::Unregistered
        );
        assert_eq!(
            classify_response("%ERROR:101: no entries found"),
            RegistrationStatus::Unregistered
        );
        assert_eq!(classify_response("Query DENIED"), RegistrationStatus::Unregistered);
        assert_eq!(classify_response("Invalid query"), RegistrationStatus::Unregistered);
    }

    #[test]
    fn test_classify_registered() {
        let record =
            "aut-num:        AS64500\nas-name:        EXAMPLE-NET\nsource:         RADB\n";
        assert_eq!(classify_response(record), RegistrationStatus::Registered);
        assert_eq!(classify_response(""), RegistrationStatus::Registered);
    }

    #[test]
    fn test_query_object() {
        assert_eq!(query_object("64500"), "AS64500");
        assert_eq!(query_object("AS64500"), "AS64500");
        assert_eq!(query_object(" as64500 "), "AS64500");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        assert_eq!(decode_output(b"caf\xe9"), "café");
        assert_eq!(decode_output("café".as_bytes()), "café");
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(RegistryTransport::default().to_string(), "whois -h whois.radb.net");
    }

    /// Accepts one connection, records the request and answers with `reply`.
    async fn serve_once(reply: &'static [u8]) -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 1024];
            let read = socket.read(&mut request).await.unwrap();
            request.truncate(read);
            socket.write_all(reply).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (port, handle)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_whois_command_passes_server_and_object() {
        // `echo` prints its arguments, standing in for a whois client
        let lookup = WhoisCommand::new("whois.example.net").with_program("echo");
        let answer = lookup.query("64500").await.unwrap();

        assert_eq!(answer.trim(), "-h whois.example.net AS64500");
        assert_eq!(classify_response(&answer), RegistrationStatus::Registered);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_whois_command_failure_without_output() {
        let lookup = WhoisCommand::new(DEFAULT_WHOIS_SERVER).with_program("false");
        assert!(matches!(
            lookup.query("64500").await,
            Err(LookupError::CommandFailed(_))
        ));

        let missing = WhoisCommand::new(DEFAULT_WHOIS_SERVER).with_program("/nonexistent/whois");
        assert!(matches!(missing.query("64500").await, Err(LookupError::Io(_))));
    }

    #[tokio::test]
    async fn test_whois_tcp_exchange() {
        let (port, server) = serve_once(b"%  No entries found for the selected source(s).\n").await;
        let lookup = WhoisTcp::new("127.0.0.1").with_port(port);

        let answer = lookup.query("as64501").await.unwrap();

        assert_eq!(classify_response(&answer), RegistrationStatus::Unregistered);
        assert_eq!(server.await.unwrap(), b"AS64501\r\n");
    }

    #[tokio::test]
    async fn test_ripestat_body_and_status() {
        let (port, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 16\r\nConnection: close\r\n\r\naut-num: AS64500",
        )
        .await;
        let lookup = RipeStatHttp::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("http://127.0.0.1:{}/data/whois/data.json", port));

        assert_eq!(lookup.query("64500").await.unwrap(), "aut-num: AS64500");
        let request = String::from_utf8(server.await.unwrap()).unwrap();
        assert!(request.starts_with("GET /data/whois/data.json?resource=AS64500 "));

        let (port, _server) = serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let lookup = RipeStatHttp::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("http://127.0.0.1:{}/", port));
        assert!(matches!(
            lookup.query("64500").await,
            Err(LookupError::HttpStatus(503))
        ));
    }
}
