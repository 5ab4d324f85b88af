use std::io::{self, Cursor, Stdout, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{ExecutableCommand, QueueableCommand};
use image::ImageFormat;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use semver::Version;
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

use crate::data::FeedService;
use crate::image::{ImageSurface, LoadState, RetryableImage};
use crate::media;
use crate::storage;
use crate::thumbnail::{self, Resolver};
use crate::update;
use crate::youtube::{VideoItem, VideoListing};

const KITTY_CHUNK_SIZE: usize = 4096;
const MAX_PREVIEW_ROWS: u16 = 12;
const TITLE_CARD_LIMIT: usize = 60;
const SEARCH_HISTORY_LIMIT: usize = 20;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Categories,
    Videos,
    Preview,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Pane::Categories => Pane::Videos,
            Pane::Videos => Pane::Preview,
            Pane::Preview => Pane::Categories,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Categories => Pane::Preview,
            Pane::Videos => Pane::Categories,
            Pane::Preview => Pane::Videos,
        }
    }
}

enum AsyncResponse {
    Videos {
        request_id: u64,
        target: String,
        result: Result<VideoListing>,
    },
    Media {
        video_id: String,
        url: String,
        result: Result<storage::MediaEntry>,
    },
    Update {
        result: Result<Option<update::UpdateInfo>>,
    },
}

struct Spinner {
    frame: usize,
}

impl Spinner {
    fn new() -> Self {
        Self { frame: 0 }
    }

    fn advance(&mut self) {
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
    }

    fn reset(&mut self) {
        self.frame = 0;
    }

    fn glyph(&self) -> &'static str {
        SPINNER_FRAMES[self.frame]
    }
}

struct SearchPrompt {
    buffer: String,
    history_index: Option<usize>,
}

struct KittyImage {
    id: u32,
    cols: u16,
    rows: u16,
    transmit_chunks: Vec<String>,
    transmitted: bool,
}

struct LoadedThumb {
    url: String,
    kitty: Option<KittyImage>,
}

/// Preview-pane state for the selected card: the retry controller plus
/// whatever the last successful download gave us to draw.
struct PreviewState {
    image: RetryableImage,
    loaded: Option<LoadedThumb>,
}

/// Bridges the controller's load requests onto the media worker pool and
/// funnels outcomes back into the UI response channel.
struct MediaSurface {
    handle: Option<media::Handle>,
    response_tx: Sender<AsyncResponse>,
    video_id: String,
}

impl ImageSurface for MediaSurface {
    fn request_load(&mut self, url: &str) {
        let url = url.to_string();
        let video_id = self.video_id.clone();
        let tx = self.response_tx.clone();

        let Some(handle) = self.handle.clone() else {
            let _ = tx.send(AsyncResponse::Media {
                video_id,
                url: url.clone(),
                result: Err(anyhow!("media manager unavailable")),
            });
            return;
        };

        let rx = handle.fetch(media::Request {
            url: url.clone(),
            ..media::Request::default()
        });
        thread::spawn(move || {
            let result = match rx.recv() {
                Ok(outcome) => match (outcome.entry, outcome.error) {
                    (Some(entry), _) => Ok(entry),
                    (None, Some(err)) => Err(err),
                    (None, None) => Err(anyhow!("media worker returned nothing")),
                },
                Err(_) => Err(anyhow!("media worker disconnected")),
            };
            let _ = tx.send(AsyncResponse::Media {
                video_id,
                url,
                result,
            });
        });
    }
}

pub struct Options {
    pub status_message: String,
    pub categories: Vec<String>,
    pub videos: Vec<VideoItem>,
    pub feed_service: Option<Arc<dyn FeedService + Send + Sync>>,
    pub media_handle: Option<media::Handle>,
    pub resolver: Arc<Resolver>,
    pub store: Arc<storage::Store>,
    pub config_path: String,
    pub fetch_feed_on_start: bool,
}

pub struct Model {
    status_message: String,
    categories: Vec<String>,
    selected_category: usize,
    videos: Vec<VideoItem>,
    selected_video: usize,
    focused_pane: Pane,
    feed_service: Option<Arc<dyn FeedService + Send + Sync>>,
    media_handle: Option<media::Handle>,
    resolver: Arc<Resolver>,
    store: Arc<storage::Store>,
    config_path: String,
    fetch_feed_on_start: bool,
    preview: Option<PreviewState>,
    preview_area: Option<Rect>,
    kitty_deletes: Vec<u32>,
    search: Option<SearchPrompt>,
    search_history: Vec<String>,
    update_notice: Option<update::UpdateInfo>,
    update_checked: bool,
    current_version: Option<Version>,
    spinner: Spinner,
    loading_feed: bool,
    needs_redraw: bool,
    next_request_id: u64,
    pending_request: Option<u64>,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let search_history = options
            .store
            .recent_searches(SEARCH_HISTORY_LIMIT)
            .map(|entries| entries.into_iter().map(|entry| entry.query).collect())
            .unwrap_or_default();

        let mut model = Self {
            status_message: options.status_message,
            categories: options.categories,
            selected_category: 0,
            videos: options.videos,
            selected_video: 0,
            focused_pane: Pane::Videos,
            feed_service: options.feed_service,
            media_handle: options.media_handle,
            resolver: options.resolver,
            store: options.store,
            config_path: options.config_path,
            fetch_feed_on_start: options.fetch_feed_on_start,
            preview: None,
            preview_area: None,
            kitty_deletes: Vec::new(),
            search: None,
            search_history,
            update_notice: None,
            update_checked: false,
            current_version: Version::parse(crate::VERSION).ok(),
            spinner: Spinner::new(),
            loading_feed: false,
            needs_redraw: true,
            next_request_id: 0,
            pending_request: None,
            response_tx,
            response_rx,
        };
        model.update_preview();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        self.queue_update_check();
        if self.fetch_feed_on_start {
            self.reload_videos()?;
        }

        loop {
            if self.poll_async() {
                self.needs_redraw = true;
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.flush_inline_images()?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.needs_redraw = true;
                            }
                        }
                    }
                }
            }

            if self.poll_async() {
                self.needs_redraw = true;
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.loading_feed {
                    self.spinner.advance();
                    self.needs_redraw = true;
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn queue_update_check(&mut self) {
        if self.update_checked {
            return;
        }
        self.update_checked = true;
        if cfg!(test) || std::env::var(update::SKIP_UPDATE_ENV).is_ok() {
            return;
        }
        let Some(current) = self.current_version.clone() else {
            return;
        };
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = update::check_for_update(&current);
            let _ = tx.send(AsyncResponse::Update { result });
        });
    }

    fn selected_item(&self) -> Option<&VideoItem> {
        self.videos.get(self.selected_video)
    }

    fn surface_for(&self, video_id: &str) -> MediaSurface {
        MediaSurface {
            handle: self.media_handle.clone(),
            response_tx: self.response_tx.clone(),
            video_id: video_id.to_string(),
        }
    }

    /// Rebuild or reset the preview controller for the selected card.
    fn update_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            if let Some(loaded) = preview.loaded {
                if let Some(kitty) = loaded.kitty {
                    if kitty.transmitted {
                        self.kitty_deletes.push(kitty.id);
                    }
                }
            }
        }

        let Some(item) = self.selected_item() else {
            return;
        };
        let video_id = item.video_id().to_string();
        let thumbnails = item.snippet.thumbnails.clone();
        let mut surface = self.surface_for(&video_id);
        let image = RetryableImage::new(
            self.resolver.clone(),
            &video_id,
            thumbnails,
            &mut surface,
        );
        self.preview = Some(PreviewState {
            image,
            loaded: None,
        });
    }

    fn reload_videos(&mut self) -> Result<()> {
        let target = self
            .categories
            .get(self.selected_category)
            .cloned()
            .unwrap_or_else(|| "New".to_string());
        self.request_feed(target, None)
    }

    fn request_feed(&mut self, target: String, query: Option<String>) -> Result<()> {
        let Some(service) = self.feed_service.clone() else {
            self.status_message = "No feed service configured.".into();
            return Ok(());
        };

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.pending_request = Some(request_id);
        self.loading_feed = true;
        self.status_message = match &query {
            Some(q) => format!("Searching for \"{}\"…", q),
            None => format!("Loading {}…", target),
        };
        self.needs_redraw = true;

        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = match &query {
                Some(q) => service.search(q),
                None => service.category(&target),
            };
            let _ = tx.send(AsyncResponse::Videos {
                request_id,
                target,
                result,
            });
        });
        Ok(())
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            match response {
                AsyncResponse::Videos {
                    request_id,
                    target,
                    result,
                } => {
                    if self.pending_request != Some(request_id) {
                        continue;
                    }
                    self.pending_request = None;
                    self.loading_feed = false;
                    match result {
                        Ok(listing) => {
                            self.videos = listing.items;
                            self.selected_video = 0;
                            self.status_message = format!(
                                "{}: {} videos. Enter opens in browser, / searches.",
                                target,
                                self.videos.len()
                            );
                            self.update_preview();
                        }
                        Err(err) => {
                            self.status_message = format!("Failed to load {}: {}", target, err);
                        }
                    }
                    changed = true;
                }
                AsyncResponse::Media {
                    video_id,
                    url,
                    result,
                } => {
                    changed |= self.handle_media_response(&video_id, &url, result);
                }
                AsyncResponse::Update { result } => {
                    if let Ok(Some(info)) = result {
                        self.status_message = format!(
                            "Update available: {} -> {} ({})",
                            crate::VERSION,
                            info.version,
                            info.release_url
                        );
                        self.update_notice = Some(info);
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    fn handle_media_response(
        &mut self,
        video_id: &str,
        url: &str,
        result: Result<storage::MediaEntry>,
    ) -> bool {
        let handle = self.media_handle.clone();
        let response_tx = self.response_tx.clone();
        let Some(preview) = self.preview.as_mut() else {
            return false;
        };
        if preview.image.video_id() != video_id {
            // Stale result for a card the user has moved past.
            return false;
        }

        match result {
            Ok(entry) => {
                if url != preview.image.current_url() {
                    return false;
                }
                preview.image.on_load_succeeded(url);
                let kitty = prepare_kitty_thumb(&entry).ok();
                preview.loaded = Some(LoadedThumb {
                    url: url.to_string(),
                    kitty,
                });
                true
            }
            Err(err) => {
                thumbnail::debug_log(format!("media download failed for {}: {:#}", url, err));
                let mut surface = MediaSurface {
                    handle,
                    response_tx,
                    video_id: video_id.to_string(),
                };
                preview.image.on_load_failed(url, &mut surface);
                true
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.search.is_some() {
            return self.handle_search_key(code);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1)?,
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1)?,
            KeyCode::Char('r') => {
                self.reload_videos()?;
            }
            KeyCode::Char('/') => {
                self.search = Some(SearchPrompt {
                    buffer: String::new(),
                    history_index: None,
                });
            }
            KeyCode::Char('o') | KeyCode::Enter => match self.focused_pane {
                Pane::Categories => self.reload_videos()?,
                Pane::Videos | Pane::Preview => self.open_selected()?,
            },
            KeyCode::Char('y') => self.yank_selected()?,
            _ => return Ok(false),
        }
        self.needs_redraw = true;
        Ok(false)
    }

    fn handle_search_key(&mut self, code: KeyCode) -> Result<bool> {
        let Some(prompt) = self.search.as_mut() else {
            return Ok(false);
        };
        match code {
            KeyCode::Esc => {
                self.search = None;
            }
            KeyCode::Enter => {
                let query = prompt.buffer.trim().to_string();
                self.search = None;
                if !query.is_empty() {
                    if let Err(err) = self.store.record_search(&query) {
                        thumbnail::debug_log(format!("record search failed: {:#}", err));
                    }
                    self.search_history = self
                        .store
                        .recent_searches(SEARCH_HISTORY_LIMIT)
                        .map(|entries| entries.into_iter().map(|entry| entry.query).collect())
                        .unwrap_or_default();
                    self.request_feed(format!("\"{}\"", query), Some(query))?;
                }
            }
            KeyCode::Backspace => {
                prompt.buffer.pop();
            }
            KeyCode::Up => {
                let next = match prompt.history_index {
                    None if !self.search_history.is_empty() => Some(0),
                    Some(idx) if idx + 1 < self.search_history.len() => Some(idx + 1),
                    other => other,
                };
                if let Some(idx) = next {
                    prompt.history_index = Some(idx);
                    prompt.buffer = self.search_history[idx].clone();
                }
            }
            KeyCode::Down => match prompt.history_index {
                Some(0) | None => {
                    prompt.history_index = None;
                    prompt.buffer.clear();
                }
                Some(idx) => {
                    prompt.history_index = Some(idx - 1);
                    prompt.buffer = self.search_history[idx - 1].clone();
                }
            },
            KeyCode::Char(ch) => {
                prompt.buffer.push(ch);
                prompt.history_index = None;
            }
            _ => {}
        }
        self.needs_redraw = true;
        Ok(false)
    }

    fn move_selection(&mut self, delta: i64) -> Result<()> {
        match self.focused_pane {
            Pane::Categories => {
                let len = self.categories.len();
                if len == 0 {
                    return Ok(());
                }
                let current = self.selected_category as i64;
                let next = (current + delta).clamp(0, len as i64 - 1) as usize;
                self.selected_category = next;
            }
            Pane::Videos | Pane::Preview => {
                let len = self.videos.len();
                if len == 0 {
                    return Ok(());
                }
                let current = self.selected_video as i64;
                let next = (current + delta).clamp(0, len as i64 - 1) as usize;
                if next != self.selected_video {
                    self.selected_video = next;
                    self.update_preview();
                }
            }
        }
        Ok(())
    }

    fn open_selected(&mut self) -> Result<()> {
        let Some(item) = self.selected_item() else {
            bail!("no video selected");
        };
        let url = item.watch_url();
        webbrowser::open(&url).with_context(|| format!("open {}", url))?;
        self.status_message = format!("Opened {}", url);
        Ok(())
    }

    fn yank_selected(&mut self) -> Result<()> {
        let Some(item) = self.selected_item() else {
            bail!("no video selected");
        };
        let url = item.watch_url();
        let mut clipboard = arboard::Clipboard::new().context("open clipboard")?;
        clipboard
            .set_text(url.clone())
            .context("copy video link")?;
        self.status_message = format!("Copied {}", url);
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(frame.size());

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(18),
                Constraint::Percentage(44),
                Constraint::Percentage(38),
            ])
            .split(chunks[0]);

        self.draw_categories(frame, panes[0]);
        self.draw_videos(frame, panes[1]);
        self.draw_preview(frame, panes[2]);
        self.draw_status(frame, chunks[1]);
    }

    fn pane_block(&self, title: &str, pane: Pane) -> Block<'static> {
        let border = if self.focused_pane == pane {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        Block::default()
            .title(format!(" {} ", title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::new(1, 1, 0, 0))
    }

    fn draw_categories(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .categories
            .iter()
            .map(|name| {
                ListItem::new(Line::from(Span::styled(
                    name.clone(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )))
            })
            .collect();
        let list = List::new(items)
            .block(self.pane_block("Categories", Pane::Categories))
            .highlight_style(
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(self.selected_category));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_videos(&mut self, frame: &mut Frame, area: Rect) {
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .videos
            .iter()
            .map(|item| video_row(item, width))
            .collect();
        let title = if self.loading_feed {
            format!("Videos {}", self.spinner.glyph())
        } else {
            format!("Videos ({})", self.videos.len())
        };
        let list = List::new(items)
            .block(self.pane_block(&title, Pane::Videos))
            .highlight_style(Style::default().bg(COLOR_BORDER_IDLE))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        if !self.videos.is_empty() {
            state.select(Some(self.selected_video));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_preview(&mut self, frame: &mut Frame, area: Rect) {
        let block = self.pane_block("Preview", Pane::Preview);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.preview_area = Some(inner);

        let Some(item) = self.selected_item() else {
            let empty = Paragraph::new("No videos loaded.\n\nPress r to refresh or / to search.")
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .wrap(Wrap { trim: true });
            frame.render_widget(empty, inner);
            return;
        };

        let image_rows = self.image_rows(inner);
        let mut lines: Vec<Line> = Vec::new();

        match self.preview.as_ref().map(|preview| preview.image.state()) {
            Some(LoadState::Exhausted) => {
                lines.extend(unavailable_box(image_rows));
            }
            Some(LoadState::Loaded) => {
                // Rows below are covered by the inline image when the
                // terminal supports it; otherwise label the thumbnail.
                if kitty_enabled() {
                    for _ in 0..image_rows {
                        lines.push(Line::default());
                    }
                } else {
                    lines.push(Line::from(Span::styled(
                        format!(
                            "[thumbnail: {}]",
                            self.preview
                                .as_ref()
                                .and_then(|preview| preview.loaded.as_ref())
                                .map(|loaded| loaded.url.as_str())
                                .unwrap_or("loaded")
                        ),
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    )));
                }
            }
            Some(LoadState::Loading) | Some(LoadState::Fallback(_)) => {
                lines.push(Line::from(Span::styled(
                    "Loading thumbnail…",
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
                if let Some(preview) = &self.preview {
                    if let LoadState::Fallback(n) = preview.image.state() {
                        lines.push(Line::from(Span::styled(
                            format!("Retrying (attempt {})", n + 1),
                            Style::default().fg(COLOR_TEXT_SECONDARY),
                        )));
                    }
                }
            }
            None => {}
        }

        lines.push(Line::default());
        let text_width = inner.width.saturating_sub(1).max(10) as usize;
        for piece in wrap(item.display_title(), text_width) {
            lines.push(Line::from(Span::styled(
                piece.into_owned(),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        lines.push(Line::from(Span::styled(
            format!("{} ✓", item.display_channel()),
            Style::default().fg(COLOR_SUCCESS),
        )));
        if !item.snippet.published_at.is_empty() {
            lines.push(Line::from(Span::styled(
                item.snippet.published_at.clone(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        lines.push(Line::default());
        if !item.snippet.description.is_empty() {
            for piece in wrap(&item.snippet.description, text_width).into_iter().take(6) {
                lines.push(Line::from(Span::styled(
                    piece.into_owned(),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
            }
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            item.watch_url(),
            Style::default().fg(COLOR_ACCENT),
        )));

        let paragraph = Paragraph::new(Text::from(lines)).style(Style::default().bg(COLOR_PANEL_BG));
        frame.render_widget(paragraph, inner);
    }

    fn draw_status(&mut self, frame: &mut Frame, area: Rect) {
        let line = if let Some(prompt) = &self.search {
            Line::from(vec![
                Span::styled("Search: ", Style::default().fg(COLOR_ACCENT)),
                Span::styled(
                    format!("{}_", prompt.buffer),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
                Span::styled(
                    "  (Enter to search, Esc to cancel, Up/Down for history)",
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ),
            ])
        } else {
            let mut spans = vec![Span::styled(
                self.status_message.clone(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )];
            if self.update_notice.is_some() {
                spans.push(Span::styled(
                    "  [update available]",
                    Style::default().fg(COLOR_ERROR),
                ));
            }
            spans.push(Span::styled(
                format!("  ~ {}", self.config_path),
                Style::default().fg(COLOR_BORDER_IDLE),
            ));
            Line::from(spans)
        };
        let paragraph = Paragraph::new(line)
            .style(Style::default().bg(COLOR_BG))
            .alignment(Alignment::Left);
        frame.render_widget(paragraph, area);
    }

    fn image_rows(&self, inner: Rect) -> u16 {
        inner.height.min(MAX_PREVIEW_ROWS) / 2 * 2
    }

    /// Emit kitty graphics escapes after ratatui has flushed its cells.
    fn flush_inline_images(&mut self) -> Result<()> {
        if !kitty_enabled() {
            self.kitty_deletes.clear();
            return Ok(());
        }

        let mut stdout = io::stdout();
        for id in self.kitty_deletes.drain(..) {
            stdout.queue(Print(format!("\x1b_Ga=d,d=i,i={},q=2\x1b\\", id)))?;
        }

        let Some(area) = self.preview_area else {
            stdout.flush()?;
            return Ok(());
        };
        let Some(preview) = self.preview.as_mut() else {
            stdout.flush()?;
            return Ok(());
        };
        if preview.image.state() != LoadState::Loaded {
            stdout.flush()?;
            return Ok(());
        }
        let Some(loaded) = preview.loaded.as_mut() else {
            stdout.flush()?;
            return Ok(());
        };
        let Some(kitty) = loaded.kitty.as_mut() else {
            stdout.flush()?;
            return Ok(());
        };

        if !kitty.transmitted {
            for chunk in &kitty.transmit_chunks {
                stdout.queue(Print(chunk.clone()))?;
            }
            kitty.transmitted = true;
        }

        let rows = area.height.min(kitty.rows);
        let cols = kitty.cols.min(area.width);
        stdout.queue(MoveTo(area.x, area.y))?;
        stdout.queue(Print(format!(
            "\x1b_Ga=p,i={},p=1,c={},r={},q=2\x1b\\",
            kitty.id, cols, rows
        )))?;
        stdout.flush()?;
        Ok(())
    }
}

fn video_row(item: &VideoItem, width: usize) -> ListItem<'static> {
    let mut title = item.display_title().to_string();
    if title.chars().count() > TITLE_CARD_LIMIT {
        title = title.chars().take(TITLE_CARD_LIMIT).collect::<String>() + "…";
    }
    let title = truncate_to_width(&title, width);
    let channel = truncate_to_width(&format!("  {} ✓", item.display_channel()), width);

    ListItem::new(vec![
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            channel,
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )),
    ])
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if width == 0 || text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        if out.width() + 1 >= width {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

fn unavailable_box(rows: u16) -> Vec<Line<'static>> {
    let rows = rows.max(3);
    let mut lines = Vec::with_capacity(rows as usize);
    for row in 0..rows {
        if row == rows / 2 {
            let mut label = Line::from(Span::styled(
                "Image unavailable",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
            label.alignment = Some(Alignment::Center);
            lines.push(label);
        } else {
            lines.push(Line::default());
        }
    }
    lines
}

fn kitty_enabled() -> bool {
    if let Ok(force) = std::env::var("YTTUI_FORCE_KITTY") {
        return force == "1";
    }
    if std::env::var("KITTY_WINDOW_ID").is_ok() {
        return true;
    }
    std::env::var("TERM")
        .map(|term| term.contains("kitty") || term.contains("ghostty"))
        .unwrap_or(false)
}

fn tmux_passthrough_enabled() -> bool {
    std::env::var("TMUX").map(|v| !v.is_empty()).unwrap_or(false)
}

fn prepare_kitty_thumb(entry: &storage::MediaEntry) -> Result<KittyImage> {
    let bytes = std::fs::read(&entry.file_path)
        .with_context(|| format!("read cached thumbnail {}", entry.file_path))?;
    let cols = 36u16;
    let rows = 11u16;
    kitty_transmit_inline(&bytes, cols, rows, kitty_image_id(&entry.url))
}

fn kitty_image_id(url: &str) -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    (hasher.finish() & 0x00ff_ffff) as u32 | 0x0100_0000
}

fn encode_png_for_kitty(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        bail!("preview image had no bytes");
    }

    if matches!(image::guess_format(bytes), Ok(ImageFormat::Png)) {
        return Ok(bytes.to_vec());
    }

    let decoded = image::load_from_memory(bytes).context("decode preview image")?;
    let mut png_bytes = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .context("encode preview as png")?;
    Ok(png_bytes)
}

fn kitty_transmit_inline(bytes: &[u8], cols: u16, rows: u16, image_id: u32) -> Result<KittyImage> {
    if bytes.is_empty() {
        bail!("no image data provided");
    }

    let png_data = encode_png_for_kitty(bytes)?;
    let encoded = general_purpose::STANDARD.encode(&png_data);
    if encoded.is_empty() {
        bail!("failed to encode image preview");
    }

    let wrap_tmux = tmux_passthrough_enabled();
    let prefix = if wrap_tmux { "\x1bPtmux;\x1b" } else { "" };
    let suffix = if wrap_tmux { "\x1b\\" } else { "" };

    let mut chunks: Vec<String> = Vec::new();
    let mut offset = 0;
    while offset < encoded.len() {
        let end = usize::min(offset + KITTY_CHUNK_SIZE, encoded.len());
        let more = if end < encoded.len() { 1 } else { 0 };
        let mut out = String::new();
        out.push_str(prefix);
        if offset == 0 {
            out.push_str(&format!("\x1b_Ga=t,q=2,i={},f=100,m={more};", image_id));
        } else {
            out.push_str(&format!("\x1b_Ga=t,q=2,i={},m={more};", image_id));
        }
        out.push_str(&encoded[offset..end]);
        out.push_str("\x1b\\");
        out.push_str(suffix);
        chunks.push(out);
        offset = end;
    }

    Ok(KittyImage {
        id: image_id,
        cols,
        rows,
        transmit_chunks: chunks,
        transmitted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_width() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        let cut = truncate_to_width("a very long video title here", 10);
        assert!(cut.width() <= 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn kitty_chunks_stay_bounded() {
        let png_header: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let mut bytes = png_header.to_vec();
        bytes.extend(std::iter::repeat(0u8).take(20_000));
        let kitty = kitty_transmit_inline(&bytes, 36, 11, 42).unwrap();
        assert!(kitty.transmit_chunks.len() > 1);
        for chunk in &kitty.transmit_chunks {
            assert!(chunk.contains("i=42"));
        }
    }

    #[test]
    fn unavailable_box_centers_its_label() {
        let lines = unavailable_box(5);
        assert_eq!(lines.len(), 5);
        let rendered: Vec<String> = lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.clone().into_owned())
                    .collect::<String>()
            })
            .collect();
        assert!(rendered.iter().any(|text| text.contains("Image unavailable")));
    }
}
