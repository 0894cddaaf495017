//! Orchestration of one logical request
//!
//! A request starts from one top-level list (favorites or search results)
//! and fans out: artists into their album lists, albums into their track
//! lists, tracks into album covers. Every network call runs as a future in
//! a [`FuturesUnordered`]; replies are handled one at a time by
//! [`RequestOrchestrator::run_until`], so handlers mutate state without
//! locking. A handler that issues more calls bumps the matching `requested`
//! counter before the finish check that follows it, so the completion check
//! can simply be repeated after every reply.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::covers::{CoverError, CoverFetcher, PendingCovers};
use super::errors::ErrorLog;
use super::events::{Outcome, RequestEvent};
use super::pagination::{Page, PageRequest};
use super::tracker::{CompletionTracker, DedupTracker};
use crate::config::FetchSettings;
use crate::tidal::parser::{Listing, extract_items, normalize_album_batch};
use crate::tidal::{
    AlbumId, ArtistId, AuthGate, CatalogApi, Endpoint, FetchError, LoginError, QueryKind,
    ResponseParser, SongRecord,
};

/// Browse favorites, or search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMode {
    Browse,
    Search { search_id: u32, text: String },
}

/// One user-initiated operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalRequest {
    pub kind: QueryKind,
    pub mode: RequestMode,
}

impl LogicalRequest {
    pub fn favorites(kind: QueryKind) -> Self {
        Self {
            kind,
            mode: RequestMode::Browse,
        }
    }

    pub fn search(kind: QueryKind, search_id: u32, text: impl Into<String>) -> Self {
        Self {
            kind,
            mode: RequestMode::Search {
                search_id,
                text: text.into(),
            },
        }
    }

    pub fn search_id(&self) -> Option<u32> {
        match &self.mode {
            RequestMode::Search { search_id, .. } => Some(*search_id),
            RequestMode::Browse => None,
        }
    }

    fn search_text(&self) -> Option<String> {
        match &self.mode {
            RequestMode::Search { text, .. } => Some(text.clone()),
            RequestMode::Browse => None,
        }
    }

    /// The single top-level list this request starts from
    pub fn endpoint(&self) -> Endpoint {
        match (&self.mode, self.kind) {
            (RequestMode::Browse, QueryKind::Artists) => Endpoint::FavoriteArtists,
            (RequestMode::Browse, QueryKind::Albums) => Endpoint::FavoriteAlbums,
            (RequestMode::Browse, QueryKind::Songs) => Endpoint::FavoriteTracks,
            (RequestMode::Search { .. }, QueryKind::Artists) => Endpoint::SearchArtists,
            (RequestMode::Search { .. }, QueryKind::Albums) => Endpoint::SearchAlbums,
            (RequestMode::Search { .. }, QueryKind::Songs) => Endpoint::SearchTracks,
        }
    }
}

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    NeedLogin,
    Dispatching,
    AwaitingChildren,
    AwaitingCovers,
    Finished,
    Cancelled,
}

/// A finished network call, waiting to be applied to the request
enum Completion {
    Login(Result<(), LoginError>),
    TopLevel {
        page: PageRequest,
        result: Result<Value, FetchError>,
    },
    ArtistAlbums {
        artist_id: ArtistId,
        page: PageRequest,
        result: Result<Value, FetchError>,
    },
    AlbumSongs {
        album_id: AlbumId,
        result: Result<Value, FetchError>,
    },
    Cover {
        album_id: AlbumId,
        url: String,
        result: Result<PathBuf, CoverError>,
    },
}

/// Drives one logical request from login to its single terminal event
pub struct RequestOrchestrator {
    request: LogicalRequest,
    settings: FetchSettings,
    api: Arc<dyn CatalogApi>,
    auth: Arc<dyn AuthGate>,
    covers: Option<CoverFetcher>,
    parser: ResponseParser,
    events: Option<mpsc::UnboundedSender<RequestEvent>>,

    state: RequestState,
    need_login: bool,
    no_match: bool,
    covers_requested: bool,
    dedup: DedupTracker,
    tracker: CompletionTracker,
    pending_covers: PendingCovers,
    /// Albums counted as requested whose track fetch waits for the artist
    /// query to end
    album_queue: Vec<AlbumId>,
    errors: ErrorLog,
    songs: Vec<SongRecord>,
    outcome: Option<Outcome>,
    outbox: Vec<BoxFuture<'static, Completion>>,
}

impl RequestOrchestrator {
    pub fn new(
        request: LogicalRequest,
        settings: FetchSettings,
        api: Arc<dyn CatalogApi>,
        auth: Arc<dyn AuthGate>,
    ) -> Self {
        let parser = ResponseParser::new(&settings.resources_url, &settings.cover_size);
        Self {
            request,
            settings,
            api,
            auth,
            covers: None,
            parser,
            events: None,
            state: RequestState::Dispatching,
            need_login: false,
            no_match: false,
            covers_requested: false,
            dedup: DedupTracker::new(),
            tracker: CompletionTracker::new(),
            pending_covers: PendingCovers::new(),
            album_queue: Vec::new(),
            errors: ErrorLog::new(),
            songs: Vec::new(),
            outcome: None,
            outbox: Vec::new(),
        }
    }

    /// Cache album covers through `covers` (if enabled in the settings)
    pub fn with_covers(mut self, covers: CoverFetcher) -> Self {
        self.covers = Some(covers);
        self
    }

    /// Report progress and the outcome on `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RequestEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    /// Nothing is outstanding and no login is pending
    pub fn is_finished(&self) -> bool {
        !self.need_login && self.tracker.is_quiescent()
    }

    /// The terminal outcome, once the request has finished
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Run the request to completion. On a request that already ended this
    /// returns the earlier outcome without sending anything.
    pub async fn run(&mut self) -> Outcome {
        if let Some(outcome) = self.run_until(std::future::pending()).await {
            return outcome;
        }
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => Outcome::Error("Request cancelled".to_string()),
        }
    }

    /// Run the request until it finishes or `stop` resolves.
    ///
    /// On stop every in-flight call is dropped, collected state is discarded
    /// and `None` is returned; no terminal event is sent in that case.
    pub async fn run_until<F>(&mut self, stop: F) -> Option<Outcome>
    where
        F: Future<Output = ()>,
    {
        if matches!(self.state, RequestState::Finished | RequestState::Cancelled) {
            return None;
        }

        let mut inflight: FuturesUnordered<BoxFuture<'static, Completion>> =
            FuturesUnordered::new();
        tokio::pin!(stop);

        info!("Starting {} request for {}", self.request.endpoint(), self.request.kind);
        self.process();

        loop {
            inflight.extend(self.outbox.drain(..));

            if let Some(outcome) = self.try_finish() {
                return Some(outcome);
            }

            tokio::select! {
                biased;

                _ = &mut stop => {
                    info!("Request cancelled with {} calls in flight", inflight.len());
                    self.discard();
                    return None;
                }
                next = inflight.next() => match next {
                    Some(completion) => self.on_completion(completion),
                    None => {
                        self.errors.push("Request stalled with no calls in flight");
                        return Some(self.finish());
                    }
                },
            }
        }
    }

    /// Start the request, logging in first if needed
    fn process(&mut self) {
        if !self.auth.is_authenticated() {
            self.need_login = true;
            self.state = RequestState::NeedLogin;
            self.status("Logging in...");

            let auth = Arc::clone(&self.auth);
            self.issue(async move { Completion::Login(auth.login().await) });
            return;
        }

        self.dispatch();
    }

    fn dispatch(&mut self) {
        self.state = RequestState::Dispatching;
        self.status(match self.request.kind {
            QueryKind::Artists => "Retrieving artists...",
            QueryKind::Albums => "Retrieving albums...",
            QueryKind::Songs => "Retrieving songs...",
        });

        if self.request.kind == QueryKind::Artists {
            self.tracker.mid_artist_query = true;
        }

        let page = PageRequest::new(self.request.endpoint(), 0, self.settings.page_size)
            .with_query(self.request.search_text());
        self.request_top_level(page);
    }

    fn on_completion(&mut self, completion: Completion) {
        if matches!(self.state, RequestState::Finished | RequestState::Cancelled) {
            debug!("Ignoring reply for a request that has ended");
            return;
        }

        match completion {
            Completion::Login(result) => self.login_finished(result),
            Completion::TopLevel { page, result } => self.top_level_received(page, result),
            Completion::ArtistAlbums {
                artist_id,
                page,
                result,
            } => self.artist_albums_received(artist_id, page, result),
            Completion::AlbumSongs { album_id, result } => {
                self.album_songs_received(album_id, result)
            }
            Completion::Cover {
                album_id,
                url,
                result,
            } => self.album_cover_received(album_id, url, result),
        }

        self.request_covers_if_ready();
    }

    fn login_finished(&mut self, result: Result<(), LoginError>) {
        if !self.need_login {
            return;
        }
        self.need_login = false;

        match result {
            Ok(()) => self.dispatch(),
            Err(e) => self.errors.push(e.to_string()),
        }
    }

    fn request_top_level(&mut self, page: PageRequest) {
        self.tracker.top_level_pending = true;
        let fetch = self.fetch_page(page);
        self.issue(async move {
            let (page, result) = fetch.await;
            Completion::TopLevel { page, result }
        });
    }

    fn top_level_received(&mut self, request: PageRequest, result: Result<Value, FetchError>) {
        self.tracker.top_level_pending = false;

        match decode_page(result, request.offset, false) {
            Err(e) => self.errors.push(format!("{}: {}", request.endpoint, e)),
            Ok(page) if page.items.is_empty() => {
                debug!("{} returned no items", request.endpoint);
                self.no_match = true;
            }
            Ok(page) => {
                match self.request.kind {
                    QueryKind::Artists => self.expand_artists(&page.items),
                    QueryKind::Albums | QueryKind::Songs => self.expand_listing(&page.items),
                }

                if let Some(next) = page.next_offset() {
                    if self.top_level_quota_left() {
                        self.request_top_level(request.at(next));
                    } else {
                        debug!("Quota reached, not requesting {} past {}", request.endpoint, next);
                    }
                }
            }
        }

        self.end_artist_query_if_settled();
        self.flush_album_queue();
    }

    fn expand_artists(&mut self, items: &[Value]) {
        for value in items {
            if self.dedup.artist_count() >= self.settings.artists_limit {
                break;
            }

            let artist = match self.parser.parse_artist(value) {
                Ok(artist) => artist,
                Err(e) => {
                    warn!("Skipping invalid artist: {}", e);
                    debug!("{}", value);
                    continue;
                }
            };

            if !self.dedup.insert_artist(artist.id) {
                continue;
            }

            debug!("Requesting albums for {} ({})", artist.name, artist.id);
            let page = PageRequest::new(Endpoint::ArtistAlbums(artist.id), 0, self.settings.page_size);
            self.request_artist_albums(artist.id, page);
        }

        let artists = self.dedup.artist_count();
        if artists > 0 {
            self.status(&plural(artists, "Retrieving albums for {} artist...", "Retrieving albums for {} artists..."));
            self.progress_max(self.tracker.artist_albums.requested());
            self.progress(self.tracker.artist_albums.received());
        }
    }

    fn request_artist_albums(&mut self, artist_id: ArtistId, page: PageRequest) {
        self.tracker.artist_albums.request();
        self.state = RequestState::AwaitingChildren;

        let fetch = self.fetch_page(page);
        self.issue(async move {
            let (page, result) = fetch.await;
            Completion::ArtistAlbums {
                artist_id,
                page,
                result,
            }
        });
    }

    fn artist_albums_received(
        &mut self,
        artist_id: ArtistId,
        request: PageRequest,
        result: Result<Value, FetchError>,
    ) {
        if !self.dedup.has_artist(artist_id) {
            return;
        }
        self.tracker.artist_albums.receive();
        self.progress(self.tracker.artist_albums.received());

        match decode_page(result, request.offset, true) {
            Err(e) => self.errors.push(format!("Albums for artist {}: {}", artist_id, e)),
            Ok(page) => {
                if page.exceeds_limit() {
                    self.errors.push("Albums returned does not match limit returned!");
                }

                self.expand_listing(&page.items);

                if let Some(next) = page.next_offset() {
                    if self.album_quota_left() {
                        self.request_artist_albums(artist_id, request.at(next));
                    }
                }
            }
        }

        self.end_artist_query_if_settled();
        self.flush_album_queue();
    }

    /// Record albums (or take tracks directly) from an album or track list
    fn expand_listing(&mut self, items: &[Value]) {
        for value in items {
            let listing = match self.parser.parse_listing(value, self.settings.fetch_albums) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Skipping invalid item: {}", e);
                    debug!("{}", value);
                    continue;
                }
            };

            match listing {
                Listing::Song(song) => {
                    if self.songs.len() >= self.settings.songs_limit {
                        break;
                    }
                    self.songs.push(song);
                }
                Listing::Album(album) => {
                    if !self.album_quota_left() {
                        break;
                    }
                    if !self.dedup.insert_album(album.id, &album.artist) {
                        continue;
                    }
                    debug!(
                        "Found album {} - {} ({}, {})",
                        album.artist, album.title, album.id, album.audio_quality
                    );
                    self.tracker.album_songs.request();
                    self.album_queue.push(album.id);
                }
            }
        }
    }

    fn end_artist_query_if_settled(&mut self) {
        if self.tracker.mid_artist_query
            && !self.tracker.top_level_pending
            && self.tracker.artist_albums.is_settled()
        {
            debug!("Artist query done, {} albums queued", self.album_queue.len());
            self.tracker.mid_artist_query = false;
        }
    }

    /// Issue track fetches for queued albums, unless artists are still
    /// being expanded
    fn flush_album_queue(&mut self) {
        if self.tracker.mid_artist_query || self.album_queue.is_empty() {
            return;
        }

        for album_id in std::mem::take(&mut self.album_queue) {
            self.request_album_songs(album_id);
        }

        let albums = self.tracker.album_songs.requested();
        self.status(&plural(albums, "Retrieving songs for {} album...", "Retrieving songs for {} albums..."));
        self.progress_max(albums);
        self.progress(self.tracker.album_songs.received());
    }

    fn request_album_songs(&mut self, album_id: AlbumId) {
        self.state = RequestState::AwaitingChildren;

        let page = PageRequest::new(Endpoint::AlbumTracks(album_id), 0, self.settings.page_size);
        let fetch = self.fetch_page(page);
        self.issue(async move {
            let (_, result) = fetch.await;
            Completion::AlbumSongs { album_id, result }
        });
    }

    fn album_songs_received(&mut self, album_id: AlbumId, result: Result<Value, FetchError>) {
        let Some(album_artist) = self.dedup.album_artist(album_id).map(str::to_string) else {
            return;
        };
        self.tracker.album_songs.receive();
        if !self.tracker.mid_artist_query {
            self.progress(self.tracker.album_songs.received());
        }

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                self.errors.push(format!("Songs for album {}: {}", album_id, e));
                return;
            }
        };
        let items = match extract_items(&value) {
            Ok(items) => items,
            Err(e) => {
                self.errors.push(format!("Songs for album {}: {}", album_id, e));
                return;
            }
        };
        if items.is_empty() {
            self.no_match = true;
            return;
        }

        let mut batch: Vec<SongRecord> = items
            .iter()
            .filter_map(|item| {
                match self.parser.parse_song(item, Some(album_id), Some(&album_artist)) {
                    Ok(song) => Some(song),
                    Err(e) => {
                        warn!("Skipping invalid track in album {}: {}", album_id, e);
                        None
                    }
                }
            })
            .collect();

        normalize_album_batch(&mut batch);
        self.songs.extend(batch);
    }

    /// Once every song is known, fetch one cover per album
    fn request_covers_if_ready(&mut self) {
        if self.covers_requested
            || !self.settings.cache_album_covers
            || self.need_login
            || self.tracker.mid_artist_query
            || self.tracker.top_level_pending
            || !self.tracker.children_settled()
        {
            return;
        }
        let Some(fetcher) = self.covers.clone() else {
            return;
        };
        self.covers_requested = true;

        for index in 0..self.songs.len() {
            let song = &self.songs[index];
            if song.art.is_empty() {
                continue;
            }
            let album_id = song.album_id;
            let url = song.art.clone();

            if self.pending_covers.register(album_id, index) {
                self.tracker.album_covers.request();
                let fetch = fetcher.fetch(album_id, url.clone());
                self.issue(async move {
                    Completion::Cover {
                        album_id,
                        url,
                        result: fetch.await,
                    }
                });
            }
        }

        let covers = self.tracker.album_covers.requested();
        if covers > 0 {
            self.state = RequestState::AwaitingCovers;
            self.status(&plural(
                covers,
                "Retrieving album cover for {} album...",
                "Retrieving album covers for {} albums...",
            ));
            self.progress_max(covers);
            self.progress(0);
        }
    }

    fn album_cover_received(&mut self, album_id: AlbumId, url: String, result: Result<PathBuf, CoverError>) {
        if !self.pending_covers.contains(album_id) {
            return;
        }
        self.tracker.album_covers.receive();
        self.progress(self.tracker.album_covers.received());

        let waiting = self.pending_covers.take(album_id);
        match result {
            Ok(path) => {
                let art = path.to_string_lossy().into_owned();
                for index in waiting {
                    if let Some(song) = self.songs.get_mut(index) {
                        song.art = art.clone();
                    }
                }
            }
            Err(e) => self.errors.push(format!("Cover for album {} from {}: {}", album_id, url, e)),
        }
    }

    fn try_finish(&mut self) -> Option<Outcome> {
        if matches!(self.state, RequestState::Finished | RequestState::Cancelled) || !self.is_finished() {
            return None;
        }
        Some(self.finish())
    }

    fn finish(&mut self) -> Outcome {
        self.state = RequestState::Finished;

        let outcome = if !self.songs.is_empty() {
            Outcome::Success(std::mem::take(&mut self.songs))
        } else if self.no_match {
            Outcome::NoMatch
        } else if self.errors.is_empty() {
            Outcome::Error("Unknown error".to_string())
        } else {
            Outcome::Error(self.errors.to_string())
        };

        match &outcome {
            Outcome::Success(songs) => info!("Request finished with {} songs", songs.len()),
            Outcome::NoMatch => info!("Request finished without a match"),
            Outcome::Error(e) => warn!("Request failed: {}", e),
        }

        self.emit(RequestEvent::Finished {
            search_id: self.request.search_id(),
            outcome: outcome.clone(),
        });
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn discard(&mut self) {
        self.state = RequestState::Cancelled;
        self.outbox.clear();
        self.album_queue.clear();
        self.songs.clear();
        self.pending_covers = PendingCovers::new();
    }

    fn top_level_quota_left(&self) -> bool {
        match self.request.kind {
            QueryKind::Artists => self.dedup.artist_count() < self.settings.artists_limit,
            QueryKind::Songs if !self.settings.fetch_albums => {
                self.songs.len() < self.settings.songs_limit
            }
            QueryKind::Albums | QueryKind::Songs => self.album_quota_left(),
        }
    }

    fn album_quota_left(&self) -> bool {
        self.tracker.album_songs.requested() < self.settings.albums_limit
    }

    fn fetch_page(&self, page: PageRequest) -> BoxFuture<'static, (PageRequest, Result<Value, FetchError>)> {
        let api = Arc::clone(&self.api);
        async move {
            let result = api.fetch_json(&page.endpoint, &page.params()).await;
            (page, result)
        }
        .boxed()
    }

    fn issue(&mut self, call: impl Future<Output = Completion> + Send + 'static) {
        self.outbox.push(call.boxed());
    }

    fn emit(&self, event: RequestEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn status(&self, text: &str) {
        debug!("{}", text);
        self.emit(RequestEvent::Status(text.to_string()));
    }

    fn progress_max(&self, max: usize) {
        self.emit(RequestEvent::ProgressMax(max));
    }

    fn progress(&self, position: usize) {
        self.emit(RequestEvent::Progress(position));
    }
}

fn decode_page(result: Result<Value, FetchError>, offset: u32, strict: bool) -> Result<Page, String> {
    let value = result.map_err(|e| e.to_string())?;
    Page::parse(value, offset, strict).map_err(|e| e.to_string())
}

fn plural(count: usize, one: &str, many: &str) -> String {
    let template = if count == 1 { one } else { many };
    template.replace("{}", &count.to_string())
}
