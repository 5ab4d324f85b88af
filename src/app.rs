use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config;
use crate::data::{self, FeedService};
use crate::media;
use crate::storage;
use crate::thumbnail;
use crate::ui;
use crate::youtube;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let store =
        Arc::new(storage::Store::open(storage::Options::default()).context("open storage")?);

    let media_cfg = media::Config {
        cache_dir: cfg.media.cache_dir.clone(),
        max_size_bytes: cfg.media.max_size_bytes,
        default_ttl: cfg.media.default_ttl,
        workers: cfg.media.workers,
        http_client: None,
    };
    let media_manager = media::Manager::new(store.clone(), media_cfg).ok();
    let media_handle = media_manager.as_ref().map(|manager| manager.handle());

    let resolver = Arc::new(thumbnail::Resolver::with_known_ids());

    let user_agent = if cfg.youtube.user_agent.trim().is_empty() {
        format!("yt-tui/{}", crate::VERSION)
    } else {
        cfg.youtube.user_agent.clone()
    };

    let has_key = !cfg.youtube.api_key.trim().is_empty();
    let client = youtube::Client::new(youtube::ClientConfig {
        api_key: cfg.youtube.api_key.clone(),
        api_host: cfg.youtube.api_host.clone(),
        user_agent,
        base_url: None,
        max_results: Some(cfg.youtube.max_results),
        http_client: None,
    });

    let feed_service: Arc<dyn FeedService + Send + Sync> = match client {
        Ok(client) => Arc::new(data::YouTubeFeedService::new(Arc::new(client))),
        Err(_) => Arc::new(data::MockFeedService),
    };

    let status = if has_key {
        "Browsing YouTube. j/k to navigate, Enter to open, / to search, q to quit.".to_string()
    } else {
        format!(
            "No API key configured - showing sample videos. Add youtube.api_key to {} or set YTTUI_YOUTUBE__API_KEY.",
            display_path
        )
    };

    let options = ui::Options {
        status_message: status,
        categories: data::default_categories(),
        videos: Vec::new(),
        feed_service: Some(feed_service),
        media_handle,
        resolver,
        store: store.clone(),
        config_path: display_path,
        fetch_feed_on_start: true,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    drop(media_manager);

    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/yt-tui/config.yaml".to_string()
    }
}
