use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::thumbnail::{self, ThumbnailSet};

pub const API_BASE: &str = "https://youtube-v31.p.rapidapi.com";
pub const API_HOST: &str = "youtube-v31.p.rapidapi.com";
pub const WATCH_URL: &str = "https://www.youtube.com/watch";
pub const CHANNEL_URL: &str = "https://www.youtube.com/channel";
pub const DEFAULT_MAX_RESULTS: u32 = 50;

// Shown when a result card carries an unusable video or channel id.
pub const DEMO_VIDEO_ID: &str = "GDa8kZLNhJ4";
pub const DEMO_CHANNEL_ID: &str = "UCmXmlB4-HJytD7wek0Uo97A";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("youtube api key is not configured")]
    MissingCredentials,
    #[error("youtube request failed with status {status}")]
    Status { status: reqwest::StatusCode },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_host: String,
    pub user_agent: String,
    pub base_url: Option<String>,
    pub max_results: Option<u32>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoListing {
    #[serde(default)]
    pub items: Vec<VideoItem>,
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    #[serde(default)]
    pub id: VideoId,
    #[serde(default)]
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoId {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub video_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub thumbnails: Option<ThumbnailSet>,
}

impl VideoItem {
    pub fn video_id(&self) -> &str {
        &self.id.video_id
    }

    pub fn watch_url(&self) -> String {
        if thumbnail::is_valid_video_id(self.video_id()) {
            format!("{}?v={}", WATCH_URL, self.video_id())
        } else {
            format!("{}?v={}", WATCH_URL, DEMO_VIDEO_ID)
        }
    }

    pub fn channel_url(&self) -> String {
        let channel_id = self.snippet.channel_id.trim();
        if channel_id.is_empty() {
            format!("{}/{}", CHANNEL_URL, DEMO_CHANNEL_ID)
        } else {
            format!("{}/{}", CHANNEL_URL, channel_id)
        }
    }

    pub fn display_title(&self) -> &str {
        let title = self.snippet.title.trim();
        if title.is_empty() {
            "Untitled video"
        } else {
            title
        }
    }

    pub fn display_channel(&self) -> &str {
        let channel = self.snippet.channel_title.trim();
        if channel.is_empty() {
            "Unknown channel"
        } else {
            channel
        }
    }
}

pub struct Client {
    http: HttpClient,
    api_key: String,
    api_host: String,
    user_agent: String,
    base_url: Url,
    max_results: u32,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("youtube client user agent required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        let api_host = if config.api_host.trim().is_empty() {
            API_HOST.to_string()
        } else {
            config.api_host
        };

        let base = config.base_url.unwrap_or_else(|| API_BASE.to_string());
        let base_url = Url::parse(&base)?;

        Ok(Client {
            http,
            api_key: config.api_key,
            api_host,
            user_agent: config.user_agent,
            base_url,
            max_results: config.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        })
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn search(&self, query: &str) -> Result<VideoListing> {
        self.listing(&[("q", query), ("type", "video")])
    }

    /// Category browsing is a search by category term on this API.
    pub fn category(&self, category: &str) -> Result<VideoListing> {
        self.listing(&[("q", category), ("type", "video")])
    }

    fn listing(&self, extra: &[(&str, &str)]) -> Result<VideoListing> {
        if !self.has_credentials() {
            bail!(ApiError::MissingCredentials);
        }

        let url = self
            .base_url
            .join("search")
            .context("youtube: build search url")?;
        let max_results = self.max_results.to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("part", "snippet"), ("maxResults", &max_results)];
        params.extend_from_slice(extra);

        let response = self
            .http
            .get(url)
            .query(&params)
            .header(USER_AGENT, &self.user_agent)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .send()
            .context("youtube: send search request")?;

        let status = response.status();
        if !status.is_success() {
            bail!(ApiError::Status { status });
        }

        response.json().context("youtube: decode search response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_search_items_leniently() {
        let raw = r#"{
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" },
                    "snippet": {
                        "title": "Never Gonna Give You Up",
                        "channelTitle": "Rick Astley",
                        "channelId": "UCuAXFkgsw1L7xaCfnd5JJOw",
                        "thumbnails": {
                            "high": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" }
                        }
                    }
                },
                { "id": {}, "snippet": { "title": "No id at all" } }
            ]
        }"#;

        let listing: VideoListing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].video_id(), "dQw4w9WgXcQ");
        let thumbs = listing.items[0].snippet.thumbnails.as_ref().unwrap();
        assert_eq!(
            thumbs.high.as_ref().unwrap().url,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
        assert!(listing.items[1].video_id().is_empty());
        assert!(listing.items[1].snippet.thumbnails.is_none());
    }

    #[test]
    fn watch_url_falls_back_for_invalid_ids() {
        let mut item = VideoItem::default();
        item.id.video_id = "dQw4w9WgXcQ".into();
        assert_eq!(
            item.watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );

        item.id.video_id = "nope".into();
        assert_eq!(
            item.watch_url(),
            format!("{}?v={}", WATCH_URL, DEMO_VIDEO_ID)
        );
    }

    #[test]
    fn client_requires_user_agent() {
        let err = Client::new(ClientConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn listing_without_key_reports_missing_credentials() {
        let client = Client::new(ClientConfig {
            user_agent: "yt-tui-test/0".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        let err = client.search("rust").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::MissingCredentials)
        ));
    }
}
