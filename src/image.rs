use std::collections::HashSet;
use std::sync::Arc;

use crate::thumbnail::{self, debug_log, Resolver, ThumbnailSet};

/// Display primitive the controller drives. The UI implements this by
/// enqueueing a media download; tests implement it with a recorder.
pub trait ImageSurface {
    fn request_load(&mut self, url: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Fallback(usize),
    Exhausted,
}

/// Per-rendered-image controller. Owns the current source and walks the
/// fallback chain on load failures until a source sticks or everything
/// has been tried. Terminal states are sticky until the video identity
/// changes. URLs already attempted for the current identity are never
/// retried; the chain is recomputed against the latest failure only and
/// would otherwise revisit synthesized tiers forever.
pub struct RetryableImage {
    resolver: Arc<Resolver>,
    video_id: String,
    thumbnails: Option<ThumbnailSet>,
    current_url: String,
    attempted: HashSet<String>,
    state: LoadState,
}

impl RetryableImage {
    pub fn new(
        resolver: Arc<Resolver>,
        video_id: &str,
        thumbnails: Option<ThumbnailSet>,
        surface: &mut dyn ImageSurface,
    ) -> Self {
        let current_url = resolver.best_thumbnail_url(thumbnails.as_ref(), video_id);
        let mut image = Self {
            resolver,
            video_id: video_id.to_string(),
            thumbnails,
            current_url,
            attempted: HashSet::new(),
            state: LoadState::Loading,
        };
        image.attempted.insert(image.current_url.clone());
        surface.request_load(&image.current_url);
        image
    }

    /// Identity change: recompute the best URL, clear any terminal state
    /// and attempt history, and start over. Supersedes whatever attempt
    /// was in flight; events for the old URL no longer match
    /// `current_url` and are dropped.
    pub fn reset(
        &mut self,
        video_id: &str,
        thumbnails: Option<ThumbnailSet>,
        surface: &mut dyn ImageSurface,
    ) {
        self.video_id = video_id.to_string();
        self.thumbnails = thumbnails;
        self.current_url = self
            .resolver
            .best_thumbnail_url(self.thumbnails.as_ref(), video_id);
        self.attempted.clear();
        self.attempted.insert(self.current_url.clone());
        self.state = LoadState::Loading;
        surface.request_load(&self.current_url);
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn unavailable(&self) -> bool {
        self.state == LoadState::Exhausted
    }

    pub fn on_load_succeeded(&mut self, url: &str) {
        if url != self.current_url {
            return;
        }
        if self.state == LoadState::Exhausted {
            return;
        }
        self.state = LoadState::Loaded;
    }

    pub fn on_load_failed(&mut self, url: &str, surface: &mut dyn ImageSurface) {
        if url != self.current_url {
            // Stale signal from a superseded attempt.
            return;
        }
        if matches!(self.state, LoadState::Loaded | LoadState::Exhausted) {
            return;
        }

        debug_log(format!(
            "thumbnail failed to load: {} (video {})",
            url, self.video_id
        ));

        if thumbnail::is_placeholder_url(&self.current_url) {
            // A placeholder that refuses to load is not worth retrying.
            debug_log(format!(
                "placeholder failed for video {}; no options left",
                self.video_id
            ));
            self.state = LoadState::Exhausted;
            return;
        }

        let chain = self.resolver.fallback_chain(
            self.thumbnails.as_ref(),
            &self.current_url,
            &self.video_id,
        );
        let next = chain
            .into_iter()
            .find(|candidate| candidate != &self.current_url && !self.attempted.contains(candidate));

        match next {
            Some(next_url) => {
                let attempt = match self.state {
                    LoadState::Fallback(n) => n + 1,
                    _ => 1,
                };
                self.current_url = next_url;
                self.attempted.insert(self.current_url.clone());
                self.state = LoadState::Fallback(attempt);
                surface.request_load(&self.current_url);
            }
            None => {
                debug_log(format!(
                    "thumbnail fallbacks exhausted for video {}",
                    self.video_id
                ));
                self.state = LoadState::Exhausted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail::{PlaceholderSource, Thumbnail, KNOWN_PROBLEMATIC_IDS};

    struct FixedPlaceholder(&'static str);

    impl PlaceholderSource for FixedPlaceholder {
        fn placeholder_url(&self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        loads: Vec<String>,
    }

    impl ImageSurface for RecordingSurface {
        fn request_load(&mut self, url: &str) {
            self.loads.push(url.to_string());
        }
    }

    fn resolver() -> Arc<Resolver> {
        Arc::new(Resolver::new(
            KNOWN_PROBLEMATIC_IDS.iter().map(|id| id.to_string()).collect(),
            Box::new(FixedPlaceholder("https://picsum.photos/480/360?random=7")),
        ))
    }

    #[test]
    fn requests_best_url_on_creation() {
        let mut surface = RecordingSurface::default();
        let image = RetryableImage::new(resolver(), "dQw4w9WgXcQ", None, &mut surface);
        assert_eq!(image.state(), LoadState::Loading);
        assert_eq!(
            surface.loads,
            vec!["https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string()]
        );
    }

    #[test]
    fn success_is_sticky() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "dQw4w9WgXcQ", None, &mut surface);
        let url = image.current_url().to_string();
        image.on_load_succeeded(&url);
        assert_eq!(image.state(), LoadState::Loaded);

        // A late failure for the same attempt is a no-op.
        image.on_load_failed(&url, &mut surface);
        assert_eq!(image.state(), LoadState::Loaded);
        assert_eq!(surface.loads.len(), 1);
    }

    #[test]
    fn stale_events_are_ignored() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "dQw4w9WgXcQ", None, &mut surface);
        image.on_load_succeeded("https://i.ytimg.com/vi/other123456/hqdefault.jpg");
        assert_eq!(image.state(), LoadState::Loading);
        image.on_load_failed("https://i.ytimg.com/vi/other123456/hqdefault.jpg", &mut surface);
        assert_eq!(image.state(), LoadState::Loading);
        assert_eq!(surface.loads.len(), 1);
    }

    #[test]
    fn walks_fallback_chain_then_exhausts() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "dQw4w9WgXcQ", None, &mut surface);

        let mut failures = 0;
        while image.state() != LoadState::Exhausted {
            let url = image.current_url().to_string();
            image.on_load_failed(&url, &mut surface);
            failures += 1;
            assert!(failures <= 8, "controller did not terminate");
        }

        // hqdefault -> mqdefault -> default -> placeholder -> exhausted.
        assert_eq!(failures, 4);
        assert_eq!(surface.loads.len(), 4);
        assert!(image.unavailable());

        // Once exhausted, further failures never trigger another load.
        let url = image.current_url().to_string();
        image.on_load_failed(&url, &mut surface);
        assert_eq!(surface.loads.len(), 4);
        assert_eq!(image.state(), LoadState::Exhausted);
    }

    #[test]
    fn never_retries_an_already_attempted_url() {
        let mut surface = RecordingSurface::default();
        let thumbs = ThumbnailSet {
            high: Some(Thumbnail {
                url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".into(),
                ..Thumbnail::default()
            }),
            medium: Some(Thumbnail {
                url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg".into(),
                ..Thumbnail::default()
            }),
            ..ThumbnailSet::default()
        };
        let mut image =
            RetryableImage::new(resolver(), "dQw4w9WgXcQ", Some(thumbs), &mut surface);

        while image.state() != LoadState::Exhausted {
            let url = image.current_url().to_string();
            image.on_load_failed(&url, &mut surface);
            assert!(surface.loads.len() <= 10, "controller did not terminate");
        }

        let mut seen = HashSet::new();
        for url in &surface.loads {
            assert!(seen.insert(url.clone()), "retried {}", url);
        }
    }

    #[test]
    fn duplicate_failure_for_same_attempt_is_idempotent() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "dQw4w9WgXcQ", None, &mut surface);
        let first = image.current_url().to_string();
        image.on_load_failed(&first, &mut surface);
        assert_eq!(image.state(), LoadState::Fallback(1));
        let after_first = surface.loads.len();

        image.on_load_failed(&first, &mut surface);
        assert_eq!(image.state(), LoadState::Fallback(1));
        assert_eq!(surface.loads.len(), after_first);
    }

    #[test]
    fn problematic_video_goes_straight_to_placeholder_then_exhausts() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "kWGhsIu_Kn8", None, &mut surface);
        assert!(thumbnail::is_placeholder_url(image.current_url()));

        let url = image.current_url().to_string();
        image.on_load_failed(&url, &mut surface);
        assert_eq!(image.state(), LoadState::Exhausted);
        assert_eq!(surface.loads.len(), 1);
    }

    #[test]
    fn identity_change_resets_attempts() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "dQw4w9WgXcQ", None, &mut surface);
        let first = image.current_url().to_string();
        image.on_load_failed(&first, &mut surface);
        let second = image.current_url().to_string();
        image.on_load_failed(&second, &mut surface);
        assert!(matches!(image.state(), LoadState::Fallback(2)));

        image.reset("jNQXAC9IVRw", None, &mut surface);
        assert_eq!(image.state(), LoadState::Loading);
        assert_eq!(
            image.current_url(),
            "https://i.ytimg.com/vi/jNQXAC9IVRw/hqdefault.jpg"
        );

        // Events for the superseded video no longer match.
        image.on_load_failed(&first, &mut surface);
        assert_eq!(image.state(), LoadState::Loading);
    }

    #[test]
    fn exhausted_after_reset_recovers() {
        let mut surface = RecordingSurface::default();
        let mut image = RetryableImage::new(resolver(), "bad", None, &mut surface);
        let url = image.current_url().to_string();
        image.on_load_failed(&url, &mut surface);
        assert!(image.unavailable());

        image.reset("dQw4w9WgXcQ", None, &mut surface);
        assert!(!image.unavailable());
        assert_eq!(image.state(), LoadState::Loading);
    }
}
