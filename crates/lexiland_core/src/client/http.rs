//! Blocking HTTP transport for the annotation service.

use super::{
    validate_phrase_response, validate_word_response, AnnotateRequest, AnnotateResponse,
    AnnotationService, PhraseAnnotateResponse, PhraseRequest, ServiceResponse,
    ANNOTATE_PHRASE_PATH, ANNOTATE_WORD_PATH,
};
use crate::config::ClientConfig;
use log::{debug, warn};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Transport-level failures, folded into failure envelopes before they
/// leave the client.
#[derive(Debug)]
pub enum ClientError {
    Build(reqwest::Error),
    Transport(reqwest::Error),
    Status(u16),
    Decode(String),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build(err) => write!(f, "failed to build http client: {err}"),
            Self::Transport(err) => write!(f, "annotation request failed: {err}"),
            Self::Status(status) => write!(f, "HTTP error! status: {status}"),
            Self::Decode(message) => write!(f, "malformed annotation response: {message}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Build(err) | Self::Transport(err) => Some(err),
            Self::Status(_) | Self::Decode(_) => None,
        }
    }
}

/// `reqwest`-backed annotation client.
#[derive(Clone)]
pub struct HttpAnnotationClient {
    http: HttpClient,
    config: ClientConfig,
}

impl HttpAnnotationClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http, config })
    }

    fn post_json<B, T>(&self, path: &str, body: &B) -> Result<ServiceResponse<T>, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .http
            .post(self.config.endpoint(path))
            .headers(headers)
            .json(body)
            .send()
            .map_err(ClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let text = response.text().map_err(ClientError::Transport)?;
        serde_json::from_str(&text).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

impl AnnotationService for HttpAnnotationClient {
    fn annotate_word(&self, request: &AnnotateRequest) -> AnnotateResponse {
        let started_at = Instant::now();
        let response = match self.post_json(ANNOTATE_WORD_PATH, request) {
            Ok(response) => validate_word_response(response),
            Err(err) => AnnotateResponse::failure(err.to_string()),
        };
        log_outcome("annotate_word", started_at, response.success, response.error.as_deref());
        response
    }

    fn annotate_phrase(&self, request: &PhraseRequest) -> PhraseAnnotateResponse {
        let started_at = Instant::now();
        let response = match self.post_json(ANNOTATE_PHRASE_PATH, request) {
            Ok(response) => validate_phrase_response(response),
            Err(err) => PhraseAnnotateResponse::failure(err.to_string()),
        };
        log_outcome("annotate_phrase", started_at, response.success, response.error.as_deref());
        response
    }
}

fn log_outcome(event: &str, started_at: Instant, success: bool, error: Option<&str>) {
    if success {
        debug!(
            "event={event} module=client status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
    } else {
        warn!(
            "event={event} module=client status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            error.unwrap_or("unknown")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::HttpAnnotationClient;
    use crate::client::{AnnotateRequest, AnnotationService};
    use crate::config::ClientConfig;
    use crate::model::word::Level;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    /// Serves one canned HTTP response on a local port.
    fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
        });
        (base_url, handle)
    }

    fn read_request(stream: &mut impl Read) {
        let mut received = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = stream.read(&mut chunk).unwrap();
            if read == 0 {
                return;
            }
            received.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&received);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let body_len = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if received.len() >= header_end + 4 + body_len {
                return;
            }
        }
    }

    fn client_for(base_url: &str) -> HttpAnnotationClient {
        let mut config = ClientConfig::default().with_base_url(base_url).unwrap();
        config.timeout = Duration::from_secs(5);
        HttpAnnotationClient::new(config).unwrap()
    }

    #[test]
    fn non_success_status_becomes_http_error_envelope() {
        let (base_url, server) = serve_once("500 Internal Server Error", "{}");
        let response =
            client_for(&base_url).annotate_word(&AnnotateRequest::new("dawn", Level::B2, None));
        server.join().unwrap();

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("HTTP error! status: 500"));
    }

    #[test]
    fn undecodable_body_becomes_failure_envelope() {
        let (base_url, server) = serve_once("200 OK", "<html>not json</html>");
        let response =
            client_for(&base_url).annotate_word(&AnnotateRequest::new("dawn", Level::B2, None));
        server.join().unwrap();

        assert!(!response.success);
        assert!(response
            .error
            .unwrap()
            .starts_with("malformed annotation response:"));
    }

    #[test]
    fn valid_body_is_decoded_and_validated() {
        let body = r#"{"success":true,"data":{"word":"dawn","ipa":"/dɔːn/","chinese":"黎明","definition":"first light","example":"We left at dawn.","level":"B1","partOfSpeech":"noun"}}"#;
        let (base_url, server) = serve_once("200 OK", body);
        let response =
            client_for(&base_url).annotate_word(&AnnotateRequest::new("dawn", Level::B2, None));
        server.join().unwrap();

        let (annotation, usage) = response.into_result().unwrap();
        assert_eq!(annotation.example, "We left at dawn.");
        assert!(usage.is_none());
    }

    #[test]
    fn unreachable_service_yields_failure_envelope() {
        let mut config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .unwrap();
        config.timeout = Duration::from_millis(500);
        let client = HttpAnnotationClient::new(config).unwrap();

        let response = client.annotate_word(&AnnotateRequest::new("dawn", Level::B2, None));
        assert!(!response.success);
        assert!(response.data.is_none());
        assert!(response.error.is_some());
    }
}
