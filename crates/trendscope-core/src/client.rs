use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{Result, TrendscopeError},
    types::{JobHandle, JobStatus, ScrapeRequest, VideoRecord},
};

pub const API_KEY_ENV: &str = "BRIGHT_DATA_API_KEY";

const BASE_URL: &str = "https://api.brightdata.com/datasets/v3";

/// Dataset id for the YouTube channel video discovery collector.
const YOUTUBE_CHANNEL_DATASET: &str = "gd_lk56epmy2i5g7lzu0k";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Ndjson,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Ndjson => "ndjson",
        }
    }
}

/// A remote scraping job service. Each call is a single round trip.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn trigger(&self, request: &ScrapeRequest) -> Result<JobHandle>;
    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus>;
    async fn fetch(&self, handle: &JobHandle, format: OutputFormat) -> Result<Vec<VideoRecord>>;
}

pub struct ScrapeClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    dataset_id: String,
}

impl ScrapeClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
            dataset_id: YOUTUBE_CHANNEL_DATASET.to_string(),
        }
    }

    /// Build a client from `BRIGHT_DATA_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(API_KEY_ENV).map_err(|_| TrendscopeError::MissingApiKey {
            env_var: API_KEY_ENV.to_string(),
        })?;
        Ok(Self::new(token))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = dataset_id.into();
        self
    }

    async fn read_body(resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrendscopeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl JobService for ScrapeClient {
    async fn trigger(&self, request: &ScrapeRequest) -> Result<JobHandle> {
        request.validate()?;

        let url = format!("{}/trigger", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[
                ("dataset_id", self.dataset_id.as_str()),
                ("include_errors", "true"),
                ("type", "discover_new"),
                ("discover_by", request.target.discover_by()),
            ])
            .bearer_auth(&self.token)
            .json(&request.to_payload())
            .send()
            .await?;

        let handle = parse_trigger_response(&Self::read_body(resp).await?)?;
        tracing::info!(
            snapshot_id = %handle,
            discover_by = request.target.discover_by(),
            inputs = request.input_count(),
            "Scraping job triggered"
        );
        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus> {
        let url = format!("{}/snapshots/{}", self.base_url, handle);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        parse_status_response(&Self::read_body(resp).await?)
    }

    async fn fetch(&self, handle: &JobHandle, format: OutputFormat) -> Result<Vec<VideoRecord>> {
        let url = format!("{}/snapshots/{}/output", self.base_url, handle);
        let resp = self
            .client
            .get(&url)
            .query(&[("format", format.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let records = parse_output(&Self::read_body(resp).await?)?;
        tracing::info!(snapshot_id = %handle, count = records.len(), "Fetched job output");
        Ok(records)
    }
}

pub fn parse_trigger_response(body: &str) -> Result<JobHandle> {
    let value: Value = serde_json::from_str(body.trim())?;
    value
        .get("snapshot_id")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(JobHandle::new)
        .ok_or_else(|| {
            TrendscopeError::Protocol(format!("trigger response has no 'snapshot_id': {}", value))
        })
}

pub fn parse_status_response(body: &str) -> Result<JobStatus> {
    let value: Value = serde_json::from_str(body.trim())?;
    JobStatus::from_payload(value)
}

/// Parse line-delimited job output. Either every line parses or nothing is returned.
pub fn parse_output(body: &str) -> Result<Vec<VideoRecord>> {
    let mut records = Vec::new();

    for (idx, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line).map_err(|e| {
            TrendscopeError::Protocol(format!("output line {}: {}", idx + 1, e))
        })?;

        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        for item in items {
            // include_errors=true mixes per-input error entries into the output
            if item.get("shortcode").is_none() && item.get("error").is_some() {
                tracing::warn!(entry = %item, "Skipping error entry in job output");
                continue;
            }

            let record: VideoRecord = serde_json::from_value(item).map_err(|e| {
                TrendscopeError::Protocol(format!("output line {}: {}", idx + 1, e))
            })?;
            records.push(record);
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobState;

    #[test]
    fn trigger_response_yields_handle() {
        let handle = parse_trigger_response("{\"snapshot_id\":\"s_m4x7\"}\n").unwrap();
        assert_eq!(handle.as_str(), "s_m4x7");
    }

    #[test]
    fn trigger_response_without_id_is_protocol_error() {
        assert!(matches!(
            parse_trigger_response("{\"error\":\"bad dataset\"}"),
            Err(TrendscopeError::Protocol(_))
        ));
        assert!(matches!(
            parse_trigger_response("<html>gateway timeout</html>"),
            Err(TrendscopeError::Protocol(_))
        ));
    }

    #[test]
    fn status_response_is_parsed() {
        let status = parse_status_response(r#"{"status":"running","snapshot_id":"s"}"#).unwrap();
        assert_eq!(status.state, JobState::Running);
        assert_eq!(status.payload["snapshot_id"], "s");
    }

    #[test]
    fn output_parses_each_line_in_order() {
        let body = concat!(
            r#"{"shortcode":"a1","url":"https://youtu.be/a1","formatted_transcript":[{"start_time":0.0,"end_time":1.5,"text":"hi"}]}"#,
            "\n\n",
            r#"{"shortcode":"b2","url":"https://youtu.be/b2","formatted_transcript":[]}"#,
            "\n"
        );
        let records = parse_output(body).unwrap();
        let codes: Vec<_> = records.iter().map(|r| r.shortcode.as_str()).collect();
        assert_eq!(codes, ["a1", "b2"]);
        assert_eq!(records[0].segments.len(), 1);
    }

    #[test]
    fn output_line_holding_array_is_flattened() {
        let body = r#"[{"shortcode":"a1","url":"u1"},{"shortcode":"b2","url":"u2"}]"#;
        assert_eq!(parse_output(body).unwrap().len(), 2);
    }

    #[test]
    fn output_with_bad_line_returns_nothing() {
        let body = concat!(
            r#"{"shortcode":"a1","url":"u1"}"#,
            "\n",
            "{not json",
            "\n"
        );
        let err = parse_output(body).unwrap_err();
        assert!(matches!(err, TrendscopeError::Protocol(ref m) if m.starts_with("output line 2")));
    }

    #[test]
    fn output_skips_error_entries() {
        let body = concat!(
            r#"{"error":"channel not found","input":{"url":"https://youtube.com/@gone"}}"#,
            "\n",
            r#"{"shortcode":"a1","url":"u1"}"#
        );
        let records = parse_output(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shortcode, "a1");
    }

    #[test]
    fn empty_output_is_empty() {
        assert!(parse_output("").unwrap().is_empty());
        assert!(parse_output("\n  \n").unwrap().is_empty());
    }

    mod http {
        use tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::TcpListener,
            task::JoinHandle,
        };

        use super::super::*;
        use crate::types::JobState;

        /// Serve one HTTP exchange with a canned response and hand back the raw request.
        async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());

            let server = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut raw = Vec::new();
                let mut buf = [0u8; 4096];

                let header_end = loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    assert!(n > 0, "client closed before sending headers");
                    raw.extend_from_slice(&buf[..n]);
                    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };

                let head = String::from_utf8_lossy(&raw[..header_end]).to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                while raw.len() < header_end + content_length {
                    let n = socket.read(&mut buf).await.unwrap();
                    assert!(n > 0, "client closed before sending body");
                    raw.extend_from_slice(&buf[..n]);
                }

                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();

                String::from_utf8(raw).unwrap()
            });

            (base_url, server)
        }

        fn client(base_url: &str) -> ScrapeClient {
            ScrapeClient::new("tok-123".to_string())
                .with_base_url(base_url)
                .with_dataset_id("gd_test")
        }

        fn has_bearer(request: &str) -> bool {
            request
                .lines()
                .any(|l| l.to_lowercase() == "authorization: bearer tok-123")
        }

        #[tokio::test]
        async fn trigger_posts_channels_with_bearer_token() {
            let (base_url, server) = serve_once(200, r#"{"snapshot_id":"s_abc"}"#).await;
            let request = ScrapeRequest::new(vec!["https://www.youtube.com/@a".to_string()]);

            let handle = client(&base_url).trigger(&request).await.unwrap();
            let raw = server.await.unwrap();

            assert_eq!(handle.as_str(), "s_abc");
            assert_eq!(
                raw.lines().next().unwrap(),
                "POST /trigger?dataset_id=gd_test&include_errors=true&type=discover_new&discover_by=url HTTP/1.1"
            );
            assert!(has_bearer(&raw), "{raw}");

            let body = raw.split("\r\n\r\n").nth(1).unwrap();
            let sent: Value = serde_json::from_str(body).unwrap();
            assert_eq!(sent[0]["url"], "https://www.youtube.com/@a");
            assert_eq!(sent[0]["num_of_posts"], 10);
        }

        #[tokio::test]
        async fn trigger_by_keyword_uses_keyword_discovery() {
            let (base_url, server) = serve_once(200, r#"{"snapshot_id":"s_kw"}"#).await;

            client(&base_url)
                .trigger(&ScrapeRequest::keyword("espresso"))
                .await
                .unwrap();
            let raw = server.await.unwrap();

            assert!(
                raw.lines()
                    .next()
                    .unwrap()
                    .contains("&discover_by=keyword HTTP/1.1")
            );
            let body = raw.split("\r\n\r\n").nth(1).unwrap();
            let sent: Value = serde_json::from_str(body).unwrap();
            assert_eq!(sent[0]["keyword"], "espresso");
        }

        #[tokio::test]
        async fn poll_gets_snapshot_with_bearer_token() {
            let (base_url, server) = serve_once(200, r#"{"status":"running"}"#).await;

            let status = client(&base_url)
                .poll(&JobHandle::new("s_abc"))
                .await
                .unwrap();
            let raw = server.await.unwrap();

            assert_eq!(status.state, JobState::Running);
            assert_eq!(raw.lines().next().unwrap(), "GET /snapshots/s_abc HTTP/1.1");
            assert!(has_bearer(&raw), "{raw}");
        }

        #[tokio::test]
        async fn fetch_requests_format_with_bearer_token() {
            let (base_url, server) = serve_once(
                200,
                "{\"shortcode\":\"a1\",\"url\":\"u1\"}\n{\"shortcode\":\"b2\",\"url\":\"u2\"}\n",
            )
            .await;

            let records = client(&base_url)
                .fetch(&JobHandle::new("s_abc"), OutputFormat::Ndjson)
                .await
                .unwrap();
            let raw = server.await.unwrap();

            assert_eq!(records.len(), 2);
            assert_eq!(
                raw.lines().next().unwrap(),
                "GET /snapshots/s_abc/output?format=ndjson HTTP/1.1"
            );
            assert!(has_bearer(&raw), "{raw}");
        }

        #[tokio::test]
        async fn server_error_becomes_api_error() {
            let (base_url, server) = serve_once(500, r#"{"error":"internal"}"#).await;

            let err = client(&base_url)
                .poll(&JobHandle::new("s_abc"))
                .await
                .unwrap_err();
            server.await.unwrap();

            match err {
                TrendscopeError::Api { status, body } => {
                    assert_eq!(status, 500);
                    assert_eq!(body, r#"{"error":"internal"}"#);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
