use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use once_cell::sync::{Lazy, OnceCell};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const THUMB_BASE: &str = "https://i.ytimg.com/vi";
pub const PLACEHOLDER_BASE: &str = "https://picsum.photos/480/360";

// The only two services placeholder URLs are ever generated from. The
// check below is a plain substring match, not a host parse; keep it
// confined to these two domains.
const PLACEHOLDER_DOMAINS: [&str; 2] = ["via.placeholder.com", "picsum.photos"];

fn thumb_debug_enabled() -> bool {
    static FLAG: OnceCell<bool> = OnceCell::new();
    *FLAG.get_or_init(|| {
        std::env::var("YTTUI_DEBUG_THUMBS")
            .map(|val| {
                let trimmed = val.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("0")
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed.eq_ignore_ascii_case("no")
                    || trimmed.eq_ignore_ascii_case("off"))
            })
            .unwrap_or(false)
    })
}

fn thumb_debug_writer() -> Option<&'static Mutex<std::fs::File>> {
    static WRITER: OnceCell<Option<Mutex<std::fs::File>>> = OnceCell::new();
    WRITER
        .get_or_init(|| {
            std::env::var("YTTUI_DEBUG_THUMBS_LOG")
                .ok()
                .and_then(|path| {
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map(Mutex::new)
                        .ok()
                })
        })
        .as_ref()
}

pub fn debug_log(message: impl AsRef<str>) {
    if !thumb_debug_enabled() {
        return;
    }
    if let Some(writer) = thumb_debug_writer() {
        if let Ok(mut file) = writer.lock() {
            let _ = writeln!(file, "{}", message.as_ref());
            return;
        }
    }
    eprintln!("{}", message.as_ref());
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThumbnailIssue {
    #[error("invalid video id {video_id:?}")]
    InvalidVideoId { video_id: String },
    #[error("problematic video id {video_id}")]
    ProblematicVideoId { video_id: String },
    #[error("invalid thumbnail url {url:?} for {tier:?} tier")]
    InvalidThumbnailUrl { url: String, tier: Quality },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSet {
    #[serde(default)]
    pub default: Option<Thumbnail>,
    #[serde(default)]
    pub medium: Option<Thumbnail>,
    #[serde(default)]
    pub high: Option<Thumbnail>,
    #[serde(default)]
    pub maxres: Option<Thumbnail>,
}

impl ThumbnailSet {
    pub fn tier(&self, quality: Quality) -> Option<&Thumbnail> {
        match quality {
            Quality::Default => self.default.as_ref(),
            Quality::Medium => self.medium.as_ref(),
            Quality::High => self.high.as_ref(),
            Quality::Maxres => self.maxres.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Quality::PREFERENCE
            .iter()
            .all(|quality| self.tier(*quality).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Default,
    Medium,
    High,
    Maxres,
}

impl Quality {
    // Strict preference order, best first.
    pub const PREFERENCE: [Quality; 4] =
        [Quality::Maxres, Quality::High, Quality::Medium, Quality::Default];

    pub fn file_stem(self) -> &'static str {
        match self {
            Quality::Default => "default",
            Quality::Medium => "mqdefault",
            Quality::High => "hqdefault",
            Quality::Maxres => "maxresdefault",
        }
    }
}

static VIDEO_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern"));

static THUMBNAIL_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https://i\.ytimg\.com/vi/[A-Za-z0-9_-]{11}/(hqdefault|mqdefault|default|maxresdefault)(_live)?\.jpg$",
    )
    .expect("thumbnail url pattern")
});

pub fn is_valid_video_id(video_id: &str) -> bool {
    VIDEO_ID_PATTERN.is_match(video_id)
}

pub fn is_valid_thumbnail_url(url: &str) -> bool {
    THUMBNAIL_URL_PATTERN.is_match(url)
}

pub fn is_placeholder_url(url: &str) -> bool {
    PLACEHOLDER_DOMAINS.iter().any(|domain| url.contains(domain))
}

pub fn thumbnail_url(video_id: &str, quality: Quality) -> String {
    format!("{}/{}/{}.jpg", THUMB_BASE, video_id, quality.file_stem())
}

pub trait PlaceholderSource: Send + Sync {
    fn placeholder_url(&self) -> String;
}

// Every call yields a distinct URL; callers must not assume idempotence,
// only that the result always loads.
#[derive(Debug, Default)]
pub struct RandomPlaceholder;

impl PlaceholderSource for RandomPlaceholder {
    fn placeholder_url(&self) -> String {
        let nonce: u32 = rand::thread_rng().gen();
        format!("{}?random={}", PLACEHOLDER_BASE, nonce)
    }
}

// Video ids curated as known to never resolve a thumbnail. Append-only.
pub const KNOWN_PROBLEMATIC_IDS: [&str; 2] = ["kWGhsIu_Kn8", "jF1rW3CMOTQ"];

/// Decides which thumbnail URL to show for a video and, after a load
/// failure, which URLs to try next. Never fails: the worst case is a
/// freshly generated placeholder.
pub struct Resolver {
    problematic: HashSet<String>,
    placeholder: Box<dyn PlaceholderSource>,
}

impl Resolver {
    pub fn new(problematic: HashSet<String>, placeholder: Box<dyn PlaceholderSource>) -> Self {
        Self {
            problematic,
            placeholder,
        }
    }

    pub fn with_known_ids() -> Self {
        let problematic = KNOWN_PROBLEMATIC_IDS
            .iter()
            .map(|id| id.to_string())
            .collect();
        Self::new(problematic, Box::new(RandomPlaceholder))
    }

    pub fn is_problematic(&self, video_id: &str) -> bool {
        self.problematic.contains(video_id)
    }

    pub fn placeholder_url(&self) -> String {
        self.placeholder.placeholder_url()
    }

    pub fn best_thumbnail_url(
        &self,
        thumbnails: Option<&ThumbnailSet>,
        video_id: &str,
    ) -> String {
        if self.is_problematic(video_id) {
            debug_log(
                ThumbnailIssue::ProblematicVideoId {
                    video_id: video_id.to_string(),
                }
                .to_string(),
            );
            return self.placeholder.placeholder_url();
        }

        let set = match thumbnails {
            Some(set) if !set.is_empty() => set,
            _ => return self.synthesized_or_placeholder(video_id),
        };

        for quality in Quality::PREFERENCE {
            let Some(thumb) = set.tier(quality) else {
                continue;
            };
            let url = thumb.url.trim();
            if url.is_empty() {
                continue;
            }
            if is_valid_thumbnail_url(url) {
                return url.to_string();
            }
            debug_log(
                ThumbnailIssue::InvalidThumbnailUrl {
                    url: url.to_string(),
                    tier: quality,
                }
                .to_string(),
            );
        }

        self.synthesized_or_placeholder(video_id)
    }

    fn synthesized_or_placeholder(&self, video_id: &str) -> String {
        if is_valid_video_id(video_id) {
            return thumbnail_url(video_id, Quality::High);
        }
        debug_log(
            ThumbnailIssue::InvalidVideoId {
                video_id: video_id.to_string(),
            }
            .to_string(),
        );
        self.placeholder.placeholder_url()
    }

    /// Ordered alternates for a URL that just failed to load. Bounded by
    /// five entries, never empty, never contains `failed_url`, and always
    /// ends in a placeholder.
    pub fn fallback_chain(
        &self,
        thumbnails: Option<&ThumbnailSet>,
        failed_url: &str,
        video_id: &str,
    ) -> Vec<String> {
        let mut chain = Vec::with_capacity(5);

        if let Some(set) = thumbnails {
            for quality in [Quality::Medium, Quality::Default] {
                if let Some(thumb) = set.tier(quality) {
                    let url = thumb.url.trim();
                    if !url.is_empty() && url != failed_url && is_valid_thumbnail_url(url) {
                        chain.push(url.to_string());
                    }
                }
            }
        }

        if is_valid_video_id(video_id) {
            for quality in [Quality::Medium, Quality::Default] {
                let url = thumbnail_url(video_id, quality);
                if url != failed_url {
                    chain.push(url);
                }
            }
        }

        chain.push(self.placeholder.placeholder_url());
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPlaceholder(&'static str);

    impl PlaceholderSource for FixedPlaceholder {
        fn placeholder_url(&self) -> String {
            self.0.to_string()
        }
    }

    fn fixed_resolver() -> Resolver {
        Resolver::new(
            KNOWN_PROBLEMATIC_IDS.iter().map(|id| id.to_string()).collect(),
            Box::new(FixedPlaceholder("https://picsum.photos/480/360?random=7")),
        )
    }

    fn set_with(medium: Option<&str>, high: Option<&str>, maxres: Option<&str>) -> ThumbnailSet {
        let thumb = |url: &str| Thumbnail {
            url: url.to_string(),
            ..Thumbnail::default()
        };
        ThumbnailSet {
            default: None,
            medium: medium.map(thumb),
            high: high.map(thumb),
            maxres: maxres.map(thumb),
        }
    }

    #[test]
    fn accepts_eleven_char_ids() {
        assert!(is_valid_video_id("dQw4w9WgXcQ"));
        assert!(is_valid_video_id("a_b-c_d-e_f"));
        assert!(!is_valid_video_id(""));
        assert!(!is_valid_video_id("short"));
        assert!(!is_valid_video_id("dQw4w9WgXcQQ"));
        assert!(!is_valid_video_id("dQw4w9WgXc!"));
    }

    #[test]
    fn validates_thumbnail_urls_full_string() {
        assert!(is_valid_thumbnail_url(
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        ));
        assert!(is_valid_thumbnail_url(
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault_live.jpg"
        ));
        assert!(!is_valid_thumbnail_url(
            "http://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        ));
        assert!(!is_valid_thumbnail_url(
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.png"
        ));
        assert!(!is_valid_thumbnail_url(
            "see https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        ));
        assert!(!is_valid_thumbnail_url(
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg?x=1"
        ));
        assert!(!is_valid_thumbnail_url(
            "https://i.ytimg.com/vi/tooshort/hqdefault.jpg"
        ));
    }

    #[test]
    fn placeholder_detection_is_substring_based() {
        assert!(is_placeholder_url("https://picsum.photos/480/360?random=0.5"));
        assert!(is_placeholder_url("https://via.placeholder.com/480x360"));
        assert!(!is_placeholder_url(
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        ));
    }

    #[test]
    fn problematic_ids_short_circuit_to_placeholder() {
        let resolver = fixed_resolver();
        let set = set_with(None, Some("https://i.ytimg.com/vi/kWGhsIu_Kn8/hqdefault.jpg"), None);
        let url = resolver.best_thumbnail_url(Some(&set), "kWGhsIu_Kn8");
        assert!(is_placeholder_url(&url));
    }

    #[test]
    fn prefers_maxres_over_high() {
        let resolver = fixed_resolver();
        let set = set_with(
            None,
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"),
        );
        assert_eq!(
            resolver.best_thumbnail_url(Some(&set), "dQw4w9WgXcQ"),
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
    }

    #[test]
    fn skips_invalid_tier_and_synthesizes() {
        let resolver = fixed_resolver();
        let set = set_with(None, Some("not-a-url"), None);
        assert_eq!(
            resolver.best_thumbnail_url(Some(&set), "abc12345678"),
            "https://i.ytimg.com/vi/abc12345678/hqdefault.jpg"
        );
    }

    #[test]
    fn missing_thumbnails_with_valid_id_synthesizes_hqdefault() {
        let resolver = fixed_resolver();
        assert_eq!(
            resolver.best_thumbnail_url(None, "dQw4w9WgXcQ"),
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
        let empty = ThumbnailSet::default();
        assert_eq!(
            resolver.best_thumbnail_url(Some(&empty), "dQw4w9WgXcQ"),
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
    }

    #[test]
    fn missing_thumbnails_with_invalid_id_yields_placeholder() {
        let resolver = Resolver::with_known_ids();
        let url = resolver.best_thumbnail_url(None, "nope");
        assert!(url.starts_with(PLACEHOLDER_BASE));
    }

    #[test]
    fn fallback_chain_orders_and_excludes_failed_url() {
        let resolver = fixed_resolver();
        let set = set_with(
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"),
            None,
        );
        let failed = "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg";
        let chain = resolver.fallback_chain(Some(&set), failed, "dQw4w9WgXcQ");
        assert!(chain.len() <= 5);
        assert!(!chain.is_empty());
        assert!(chain.iter().all(|url| url != failed));
        assert_eq!(chain[0], "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg");
        assert!(is_placeholder_url(chain.last().unwrap()));
    }

    #[test]
    fn fallback_chain_synthesizes_for_valid_id_without_thumbnails() {
        let resolver = fixed_resolver();
        let chain = resolver.fallback_chain(None, "", "dQw4w9WgXcQ");
        assert_eq!(
            &chain[..2],
            &[
                "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg".to_string(),
                "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg".to_string(),
            ]
        );
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn fallback_chain_never_empty_even_without_inputs() {
        let resolver = fixed_resolver();
        let chain = resolver.fallback_chain(None, "", "bad id");
        assert_eq!(chain.len(), 1);
        assert!(is_placeholder_url(&chain[0]));
    }

    #[test]
    fn fallback_chain_is_deterministic_apart_from_placeholder() {
        let resolver = Resolver::with_known_ids();
        let set = set_with(
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"),
            None,
            None,
        );
        let a = resolver.fallback_chain(Some(&set), "x", "dQw4w9WgXcQ");
        let b = resolver.fallback_chain(Some(&set), "x", "dQw4w9WgXcQ");
        assert_eq!(a[..a.len() - 1], b[..b.len() - 1]);
        assert!(is_placeholder_url(a.last().unwrap()));
        assert!(is_placeholder_url(b.last().unwrap()));
    }

    #[test]
    fn random_placeholder_has_expected_shape() {
        let source = RandomPlaceholder;
        let a = source.placeholder_url();
        assert!(a.starts_with(PLACEHOLDER_BASE));
        // Not asserting inequality across two draws; only the base shape.
        assert!(a.contains("random="));
    }
}
