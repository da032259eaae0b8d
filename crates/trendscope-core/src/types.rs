use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TrendscopeError};

/// Date format the scraping API expects for `start_date` / `end_date`.
pub const API_DATE_FORMAT: &str = "%m-%d-%Y";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    #[default]
    Latest,
    Popular,
    Oldest,
}

/// What the scraper should discover videos from.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Channels(Vec<String>),
    Keyword(String),
}

impl Target {
    /// Value of the trigger endpoint's `discover_by` parameter.
    pub fn discover_by(&self) -> &'static str {
        match self {
            Target::Channels(_) => "url",
            Target::Keyword(_) => "keyword",
        }
    }
}

/// One user-initiated scrape, by channel list or by keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub target: Target,
    pub post_count: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub order_by: OrderBy,
    pub country: String,
}

/// Per-channel object sent in the trigger body.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInput<'a> {
    pub url: &'a str,
    pub num_of_posts: u32,
    pub start_date: String,
    pub end_date: String,
    pub order_by: OrderBy,
    pub country: &'a str,
}

/// Keyword search object sent in the trigger body. Keyword discovery has no ordering.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordInput<'a> {
    pub keyword: &'a str,
    pub num_of_posts: u32,
    pub start_date: String,
    pub end_date: String,
    pub country: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TriggerInput<'a> {
    Channel(ChannelInput<'a>),
    Keyword(KeywordInput<'a>),
}

impl ScrapeRequest {
    pub fn new(channel_urls: Vec<String>) -> Self {
        Self::with_target(Target::Channels(channel_urls))
    }

    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self::with_target(Target::Keyword(keyword.into()))
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            post_count: 10,
            start_date: None,
            end_date: None,
            order_by: OrderBy::Latest,
            country: String::new(),
        }
    }

    pub fn post_count(mut self, post_count: u32) -> Self {
        self.post_count = post_count;
        self
    }

    pub fn date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Number of entries in the trigger body.
    pub fn input_count(&self) -> usize {
        match &self.target {
            Target::Channels(urls) => urls.len(),
            Target::Keyword(_) => 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.target {
            Target::Channels(urls) => {
                if urls.is_empty() {
                    return Err(TrendscopeError::InvalidRequest(
                        "at least one channel URL is required".to_string(),
                    ));
                }
                if let Some(url) = urls.iter().find(|u| u.trim().is_empty()) {
                    return Err(TrendscopeError::InvalidRequest(format!(
                        "empty channel URL: {:?}",
                        url
                    )));
                }
            }
            Target::Keyword(keyword) => {
                if keyword.trim().is_empty() {
                    return Err(TrendscopeError::InvalidRequest(
                        "keyword must not be empty".to_string(),
                    ));
                }
            }
        }
        if self.post_count == 0 {
            return Err(TrendscopeError::InvalidRequest(
                "post count must be greater than zero".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(TrendscopeError::InvalidRequest(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    pub fn to_payload(&self) -> Vec<TriggerInput<'_>> {
        let fmt_date = |d: Option<NaiveDate>| {
            d.map(|d| d.format(API_DATE_FORMAT).to_string())
                .unwrap_or_default()
        };

        match &self.target {
            Target::Channels(urls) => urls
                .iter()
                .map(|url| {
                    TriggerInput::Channel(ChannelInput {
                        url: url.trim(),
                        num_of_posts: self.post_count,
                        start_date: fmt_date(self.start_date),
                        end_date: fmt_date(self.end_date),
                        order_by: self.order_by,
                        country: &self.country,
                    })
                })
                .collect(),
            Target::Keyword(keyword) => vec![TriggerInput::Keyword(KeywordInput {
                keyword: keyword.trim(),
                num_of_posts: self.post_count,
                start_date: fmt_date(self.start_date),
                end_date: fmt_date(self.end_date),
                country: &self.country,
            })],
        }
    }
}

/// Opaque snapshot id of a remote scraping job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(snapshot_id: impl Into<String>) -> Self {
        Self(snapshot_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Ready,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// Raw status string as reported, e.g. "running", "building".
    pub status: String,
    pub payload: serde_json::Value,
}

impl JobStatus {
    pub fn from_payload(payload: serde_json::Value) -> Result<Self> {
        let status = payload
            .get("status")
            .and_then(|s| s.as_str())
            .ok_or_else(|| {
                TrendscopeError::Protocol(format!("status response has no 'status': {}", payload))
            })?
            .to_string();

        let state = match status.as_str() {
            "ready" => JobState::Ready,
            "failed" => JobState::Failed,
            _ => JobState::Running,
        };

        Ok(Self {
            state,
            status,
            payload,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub shortcode: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub preview_image: Option<String>,
    #[serde(default)]
    pub date_posted: Option<String>,
    #[serde(
        rename = "formatted_transcript",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub segments: Vec<TranscriptSegment>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    Synthesis,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Final output of the two-stage pipeline. Lives in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub analysis: String,
    pub text: String,
}
