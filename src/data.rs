use std::sync::Arc;

use anyhow::Result;

use crate::thumbnail::{self, debug_log, Quality, Thumbnail, ThumbnailSet};
use crate::youtube::{self, Snippet, VideoId, VideoItem, VideoListing};

pub trait FeedService: Send + Sync {
    fn search(&self, query: &str) -> Result<VideoListing>;
    fn category(&self, category: &str) -> Result<VideoListing>;
}

pub fn default_categories() -> Vec<String> {
    [
        "New", "Coding", "Music", "Gaming", "News", "Sports", "Movies", "Education",
        "Podcasts", "Live",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Feed backed by the YouTube catalog API. Degrades to the fixed sample
/// listing on missing credentials or any request failure; callers never
/// see a raw transport error.
pub struct YouTubeFeedService {
    client: Arc<youtube::Client>,
}

impl YouTubeFeedService {
    pub fn new(client: Arc<youtube::Client>) -> Self {
        Self { client }
    }

    fn degrade(&self, what: &str, err: anyhow::Error) -> VideoListing {
        debug_log(format!("youtube {} failed ({:#}); serving sample data", what, err));
        sample_video_listing()
    }
}

impl FeedService for YouTubeFeedService {
    fn search(&self, query: &str) -> Result<VideoListing> {
        Ok(self
            .client
            .search(query)
            .unwrap_or_else(|err| self.degrade("search", err)))
    }

    fn category(&self, category: &str) -> Result<VideoListing> {
        Ok(self
            .client
            .category(category)
            .unwrap_or_else(|err| self.degrade("category listing", err)))
    }
}

#[derive(Default)]
pub struct MockFeedService;

impl FeedService for MockFeedService {
    fn search(&self, _query: &str) -> Result<VideoListing> {
        Ok(sample_video_listing())
    }

    fn category(&self, _category: &str) -> Result<VideoListing> {
        Ok(sample_video_listing())
    }
}

/// The offline sample feed: five well-known videos with complete, valid
/// thumbnail sets. Order is fixed.
pub fn sample_video_listing() -> VideoListing {
    let videos = [
        (
            "dQw4w9WgXcQ",
            "Rick Astley - Never Gonna Give You Up (Official Video)",
            "Rick Astley",
            "UCuAXFkgsw1L7xaCfnd5JJOw",
        ),
        (
            "jNQXAC9IVRw",
            "Me at the zoo",
            "jawed",
            "UC4QobU6STFB0P71PMvOGN5A",
        ),
        (
            "kJQP7kiw5Fk",
            "Luis Fonsi - Despacito ft. Daddy Yankee",
            "Luis Fonsi",
            "UCxoq-PAQeAdk_zyx8UGDNlA",
        ),
        (
            "9bZkp7q19f0",
            "PSY - GANGNAM STYLE (\u{ac15}\u{b0a8}\u{c2a4}\u{d0c0}\u{c77c}) M/V",
            "officialpsy",
            "UCrA7l4T7l4T7l4T7l4T7l4T",
        ),
        (
            "YQHsXMglC9A",
            "Adele - Hello",
            "Adele",
            "UCsRM0YBdabIep8k_4Vnfp_w",
        ),
    ];

    VideoListing {
        items: videos
            .iter()
            .map(|(id, title, channel, channel_id)| sample_video(id, title, channel, channel_id))
            .collect(),
        next_page_token: None,
    }
}

fn sample_video(video_id: &str, title: &str, channel_title: &str, channel_id: &str) -> VideoItem {
    let tier = |quality: Quality| {
        Some(Thumbnail {
            url: thumbnail::thumbnail_url(video_id, quality),
            ..Thumbnail::default()
        })
    };

    VideoItem {
        id: VideoId {
            kind: "youtube#video".into(),
            video_id: video_id.into(),
        },
        snippet: Snippet {
            title: title.into(),
            channel_title: channel_title.into(),
            channel_id: channel_id.into(),
            thumbnails: Some(ThumbnailSet {
                default: tier(Quality::Default),
                medium: tier(Quality::Medium),
                high: tier(Quality::High),
                maxres: None,
            }),
            ..Snippet::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail::{is_valid_thumbnail_url, is_valid_video_id};
    use crate::youtube::{Client, ClientConfig};

    #[test]
    fn sample_listing_is_well_formed() {
        let listing = sample_video_listing();
        assert_eq!(listing.items.len(), 5);
        for item in &listing.items {
            assert!(is_valid_video_id(item.video_id()), "{}", item.video_id());
            let thumbs = item.snippet.thumbnails.as_ref().unwrap();
            for tier in [&thumbs.default, &thumbs.medium, &thumbs.high] {
                let url = &tier.as_ref().unwrap().url;
                assert!(is_valid_thumbnail_url(url), "{}", url);
            }
        }
    }

    #[test]
    fn feed_without_credentials_serves_sample_data() {
        let client = Client::new(ClientConfig {
            user_agent: "yt-tui-test/0".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        let service = YouTubeFeedService::new(Arc::new(client));
        let listing = service.search("rust tutorials").unwrap();
        assert_eq!(listing, sample_video_listing());
    }

    #[test]
    fn mock_feed_is_stable() {
        let service = MockFeedService;
        assert_eq!(
            service.search("anything").unwrap(),
            service.category("Music").unwrap()
        );
    }
}
