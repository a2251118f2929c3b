//! Playback session: owns the queue, the transport state, the lyrics of the
//! current song and its translations, and reacts to one event at a time.
//!
//! Network work runs in spawned tasks that report back through the event
//! channel. Results for songs that are no longer current are recognised by
//! their request ticket and dropped.

pub mod actions;
pub mod console;
pub mod events;
pub mod requests;
pub mod state;

use crate::catalog::normalize::normalize_song;
use crate::catalog::{Catalog, Song};
use crate::lyrics::{LyricDocument, LyricsQuery, LyricsResolver};
use crate::player::{PlaybackDevice, PlayerEvent};
use crate::queue::{HISTORY_CAP, QueueState, Step};
use crate::storage::Storage;
use crate::storage::library::{FavoriteLine, VocabularyEntry};
use crate::translate::cache::{PLAIN_PREFETCH_WINDOW, prefetch_targets};
use crate::translate::{TranslationCache, Translator, WordMeaning, detect_language};
use actions::Action;
use console::Console;
use events::{Event, NetworkEvent};
use rand::SeedableRng;
use rand::rngs::StdRng;
use requests::{RequestKind, RequestTracker};
use state::{SessionState, TransportState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Collaborators the session talks to.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn Catalog>,
    pub resolver: Arc<LyricsResolver>,
    pub translator: Arc<dyn Translator>,
    pub translations: TranslationCache,
    pub device: Arc<dyn PlaybackDevice>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Wait between a playback error and the automatic skip.
    pub error_skip_delay: Duration,
    /// `previous` restarts the current song once progress passes this.
    pub restart_threshold_secs: f64,
    pub prefetch_window: usize,
    pub history_cap: usize,
    pub translation_enabled: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            error_skip_delay: Duration::from_millis(1500),
            restart_threshold_secs: 3.0,
            prefetch_window: PLAIN_PREFETCH_WINDOW,
            history_cap: HISTORY_CAP,
            translation_enabled: true,
        }
    }
}

pub struct Session {
    services: Services,
    settings: SessionSettings,
    storage: Storage,
    state: SessionState,
    requests: RequestTracker,
    rng: StdRng,
    tx: mpsc::Sender<Event>,
    console: Console,
}

impl Session {
    /// Restores history, the last played song and the language preference.
    /// Nothing starts playing.
    pub fn new(
        services: Services,
        settings: SessionSettings,
        storage: Storage,
        tx: mpsc::Sender<Event>,
        console: Console,
    ) -> Self {
        let mut state = SessionState {
            queue: QueueState::new(settings.history_cap),
            translation_enabled: settings.translation_enabled,
            ..Default::default()
        };
        state.queue.restore_history(storage.history());
        state.last_played = storage.last_played();
        if let Some(lang) = storage.language() {
            services.translations.set_target_language(&lang);
        }

        Self {
            services,
            settings,
            storage,
            state,
            requests: RequestTracker::default(),
            rng: StdRng::from_os_rng(),
            tx,
            console,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn run(&mut self, mut rx: mpsc::Receiver<Event>) -> anyhow::Result<()> {
        if let Some(song) = &self.state.last_played {
            self.console
                .notice(format!("last played: {}", song.display_line()));
        }

        while let Some(ev) = rx.recv().await {
            self.handle_event(ev).await;
            if self.state.should_quit {
                break;
            }
        }

        if self.state.current.is_some()
            && let Err(e) = self.services.device.stop().await
        {
            tracing::warn!("stopping playback on exit: {e:#}");
        }
        Ok(())
    }

    pub async fn handle_event(&mut self, ev: Event) {
        match ev {
            Event::Input(action) => self.handle_action(action).await,
            Event::Player(pe) => self.handle_player(pe).await,
            Event::Network(ne) => self.handle_network(ne).await,
            Event::AutoSkip { song_id } => self.auto_skip(&song_id).await,
        }
    }

    async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.state.should_quit = true,

            Action::Play(song) => self.play(song).await,
            Action::PlayRecord(record) => match normalize_song(&record) {
                Ok(song) => self.play(song).await,
                Err(e) => {
                    tracing::warn!("unplayable record: {e:#}");
                    self.console.notice(format!("cannot play record: {e:#}"));
                }
            },
            Action::PlayId(id) => self.spawn_fetch_song(id, None),
            Action::PlayAll { songs, start } => {
                self.state.queue.replace(songs, start);
                self.requests.clear(RequestKind::SongFetch);
                self.requests.clear(RequestKind::Recommendations);
                self.state.consecutive_failures = 0;
                match self.state.queue.current().cloned() {
                    Some(song) => self.start(song).await,
                    None => self.console.notice("nothing to play"),
                }
            }
            Action::PlayIndex(index) => {
                self.requests.clear(RequestKind::SongFetch);
                self.state.consecutive_failures = 0;
                match self.state.queue.set_cursor(index).cloned() {
                    Some(song) => self.start(song).await,
                    None => self.console.notice(format!("no queue entry {}", index + 1)),
                }
            }
            Action::PlayFavorite(index) => match self.storage.favorite_lines().get(index) {
                Some(fav) => self.spawn_fetch_song(fav.song.id.clone(), Some(fav.time)),
                None => self.console.notice(format!("no favorite line {}", index + 1)),
            },

            Action::Pause => self.pause().await,
            Action::Resume => self.resume().await,
            Action::TogglePause => match self.state.transport {
                TransportState::Playing => self.pause().await,
                TransportState::Paused => self.resume().await,
                _ => {}
            },
            Action::Seek(seconds) => self.seek(seconds).await,
            Action::SeekRelative(delta) => self.seek(self.state.progress + delta).await,
            Action::SeekToLine(index) => {
                let time = self
                    .state
                    .lyrics_for_current()
                    .filter(|doc| doc.synced)
                    .and_then(|doc| doc.lines.get(index))
                    .map(|line| line.time);
                match time {
                    Some(t) => self.seek(t).await,
                    None => self.console.notice("no synced line to seek to"),
                }
            }
            Action::Next => {
                self.state.consecutive_failures = 0;
                self.advance(false).await;
            }
            Action::Previous => self.previous().await,
            Action::ToggleShuffle => {
                let on = self.state.queue.toggle_shuffle();
                self.console
                    .notice(format!("shuffle {}", if on { "on" } else { "off" }));
            }
            Action::ToggleRepeat => {
                let mode = self.state.queue.cycle_repeat();
                self.console.notice(mode.label());
            }

            Action::SetTargetLanguage(code) => self.set_target_language(&code),
            Action::ToggleTranslation => {
                self.state.translation_enabled = !self.state.translation_enabled;
                let on = self.state.translation_enabled;
                self.console
                    .notice(format!("translation {}", if on { "on" } else { "off" }));
                self.prefetch_translations();
            }
            Action::LookupWord(word) => self.spawn_word_lookup(word, false),
            Action::SaveWord(word) => self.save_word(word),

            Action::ToggleLike => self.toggle_like(),
            Action::FavoriteActiveLine => self.favorite_active_line(),

            Action::ShowQueue => self.console.queue(&self.state),
            Action::ShowStatus => {
                let liked = self
                    .state
                    .current_id()
                    .is_some_and(|id| self.storage.is_liked(id));
                self.console.status(&self.state, liked);
            }
            Action::ShowLyrics => self.show_lyrics(),
        }
    }

    async fn handle_player(&mut self, pe: PlayerEvent) {
        match pe {
            PlayerEvent::Progress { seconds } => {
                // Until the new file reports ready, ticks still belong to the
                // previous one.
                if self.state.current.is_none()
                    || self.state.transport == TransportState::Loading
                {
                    return;
                }
                self.state.progress = seconds;
                self.update_active_line();
            }
            PlayerEvent::Duration { seconds } => {
                if seconds > 0.0 {
                    self.state.duration = seconds;
                }
            }
            PlayerEvent::Buffering(on) => self.state.buffering = on,
            PlayerEvent::Ready => {
                if self.state.transport != TransportState::Loading {
                    return;
                }
                self.state.consecutive_failures = 0;
                self.set_transport(TransportState::Playing);
                if let Some(at) = self.state.pending_seek.take() {
                    self.seek(at).await;
                }
            }
            PlayerEvent::Paused => {
                if self.state.transport == TransportState::Playing {
                    self.set_transport(TransportState::Paused);
                }
            }
            PlayerEvent::Resumed => {
                if self.state.transport == TransportState::Paused {
                    self.set_transport(TransportState::Playing);
                }
            }
            PlayerEvent::Ended => {
                if self.state.current.is_none() || !self.state.transport.is_active() {
                    return;
                }
                self.set_transport(TransportState::Ended);
                self.advance(false).await;
            }
            PlayerEvent::Error(msg) => self.on_media_error(msg).await,
        }
    }

    async fn handle_network(&mut self, ne: NetworkEvent) {
        match ne {
            NetworkEvent::Error(msg) => {
                tracing::warn!("{msg}");
                self.console.notice(msg);
            }
            NetworkEvent::SongFetched {
                ticket,
                song,
                seek_to,
            } => {
                if !self.requests.accept(RequestKind::SongFetch, &ticket) {
                    tracing::debug!(song_id = %ticket.song_id, "dropping superseded song fetch");
                    return;
                }
                self.play(song).await;
                self.state.pending_seek = seek_to;
            }
            NetworkEvent::Recommendations { ticket, songs } => {
                if !self.requests.accept(RequestKind::Recommendations, &ticket)
                    || self.state.queue.position(&ticket.song_id).is_none()
                {
                    tracing::debug!(song_id = %ticket.song_id, "dropping stale recommendations");
                    return;
                }
                let added = self.state.queue.extend_unique(songs);
                tracing::info!(song_id = %ticket.song_id, added, "recommendations queued");
                if added > 0 {
                    self.console.notice(format!("queued {added} more songs"));
                }
            }
            NetworkEvent::LyricsResolved { ticket, doc } => {
                if !self.requests.accept(RequestKind::Lyrics, &ticket) {
                    tracing::debug!(song_id = %ticket.song_id, "dropping stale lyrics");
                    return;
                }
                self.apply_lyrics(doc);
            }
            NetworkEvent::TranslationSettled {
                song_id,
                line,
                language,
            } => {
                if !self.state.translation_enabled
                    || self.state.current_id() != Some(song_id.as_str())
                    || language != self.services.translations.target_language()
                {
                    return;
                }
                let Some(text) = self.services.translations.cached(line, &language) else {
                    return;
                };
                let visible = match self.state.lyrics_for_current() {
                    Some(doc) if doc.synced => self.state.active_index() == Some(line),
                    Some(_) => true,
                    None => false,
                };
                if visible {
                    self.console.translation(line, &text);
                }
            }
            NetworkEvent::WordMeaning {
                word,
                meaning,
                save,
            } => {
                self.console.word(&word, &meaning);
                if save {
                    self.toggle_saved_word(&word, &meaning);
                }
                self.state.last_word = Some((word, meaning));
            }
        }
    }

    // Transport

    /// Play `song` as a fresh start. A song that is not already the only
    /// queue entry replaces the queue and triggers recommendations.
    async fn play(&mut self, song: Song) {
        self.requests.clear(RequestKind::SongFetch);
        self.state.consecutive_failures = 0;
        if !self.state.queue.is_sole(&song.id) {
            self.state.queue.reset_to(song.clone());
            self.spawn_recommendations(&song);
        }
        self.start(song).await;
    }

    /// Make `song` current and hand it to the device. The queue cursor must
    /// already point at it.
    async fn start(&mut self, song: Song) {
        tracing::info!(id = %song.id, title = %song.title, "starting song");

        self.state.pending_seek = None;
        self.state.queue.push_history(song.clone());
        self.persist_played(&song);

        self.state.current = Some(song.clone());
        self.state.last_played = Some(song.clone());
        self.state.progress = 0.0;
        self.state.duration = song.duration.map(f64::from).unwrap_or(0.0);
        self.state.buffering = false;
        self.console.song_started(&song);
        self.set_transport(TransportState::Loading);
        self.load_lyrics(&song);

        if song.url.is_empty() {
            self.on_media_error("song has no playable url".to_string())
                .await;
            return;
        }
        if let Err(e) = self.services.device.load(&song.url).await {
            self.on_media_error(format!("{e:#}")).await;
        }
    }

    async fn advance(&mut self, after_failure: bool) {
        match self.state.queue.next_step(&mut self.rng, after_failure) {
            Step::Replay => self.replay().await,
            Step::Play(index) => match self.state.queue.set_cursor(index).cloned() {
                Some(song) => self.start(song).await,
                None => self.stop().await,
            },
            Step::Stop => self.stop().await,
        }
    }

    async fn replay(&mut self) {
        let Some(song) = self.state.current.clone() else {
            return;
        };
        if !self.state.transport.is_active() {
            self.start(song).await;
            return;
        }
        if let Err(e) = self.services.device.seek(0.0).await {
            tracing::warn!("restart failed: {e:#}");
            return;
        }
        self.state.progress = 0.0;
        self.update_active_line();
    }

    async fn previous(&mut self) {
        if self.state.current.is_none() {
            return;
        }
        self.state.consecutive_failures = 0;
        if self.state.progress > self.settings.restart_threshold_secs {
            self.replay().await;
            return;
        }
        if let Some(index) = self.state.queue.prev_index()
            && let Some(song) = self.state.queue.set_cursor(index).cloned()
        {
            self.start(song).await;
        }
    }

    async fn stop(&mut self) {
        if let Err(e) = self.services.device.stop().await {
            tracing::warn!("stop failed: {e:#}");
        }
        if let Some(song) = self.state.current.take() {
            self.state.last_played = Some(song);
        }
        self.state.progress = 0.0;
        self.state.pending_seek = None;
        self.set_transport(TransportState::Idle);
    }

    async fn pause(&mut self) {
        if self.state.transport != TransportState::Playing {
            return;
        }
        match self.services.device.pause().await {
            Ok(()) => self.set_transport(TransportState::Paused),
            Err(e) => tracing::warn!("pause failed: {e:#}"),
        }
    }

    async fn resume(&mut self) {
        if self.state.transport != TransportState::Paused {
            return;
        }
        match self.services.device.resume().await {
            Ok(()) => self.set_transport(TransportState::Playing),
            Err(e) => tracing::warn!("resume failed: {e:#}"),
        }
    }

    async fn seek(&mut self, seconds: f64) {
        if !self.state.transport.is_active() {
            return;
        }
        let target = if self.state.duration > 0.0 {
            seconds.clamp(0.0, self.state.duration)
        } else {
            seconds.max(0.0)
        };
        if let Err(e) = self.services.device.seek(target).await {
            tracing::warn!("seek failed: {e:#}");
            return;
        }
        self.state.progress = target;
        self.update_active_line();
    }

    async fn on_media_error(&mut self, msg: String) {
        let Some(song_id) = self.state.current_id().map(str::to_string) else {
            tracing::debug!("media error with nothing playing: {msg}");
            return;
        };
        if self.state.transport == TransportState::Error {
            tracing::debug!("ignoring repeated media error: {msg}");
            return;
        }

        tracing::warn!(song_id = %song_id, "playback failed: {msg}");
        self.console.notice(format!("playback failed: {msg}"));
        self.set_transport(TransportState::Error);
        self.state.consecutive_failures += 1;

        let delay = self.settings.error_skip_delay;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Event::AutoSkip { song_id }).await;
        });
    }

    async fn auto_skip(&mut self, song_id: &str) {
        if self.state.transport != TransportState::Error
            || self.state.current_id() != Some(song_id)
        {
            tracing::debug!(song_id, "auto-skip no longer applies");
            return;
        }
        if self.state.consecutive_failures >= self.state.queue.len() {
            tracing::info!("every queued song failed, stopping");
            self.console.notice("nothing playable left in the queue");
            self.stop().await;
            return;
        }
        self.advance(true).await;
    }

    fn set_transport(&mut self, next: TransportState) {
        if self.state.transport == next {
            return;
        }
        tracing::debug!(from = self.state.transport.label(), to = next.label(), "transport");
        self.state.transport = next;
        self.console.transport(next);
    }

    fn persist_played(&self, song: &Song) {
        if let Err(e) = self.storage.save_history(self.state.queue.history()) {
            tracing::warn!("saving history: {e:#}");
        }
        if let Err(e) = self.storage.save_last_played(song) {
            tracing::warn!("saving last played song: {e:#}");
        }
    }

    // Lyrics and translation

    fn load_lyrics(&mut self, song: &Song) {
        let have_doc = self
            .state
            .lyrics
            .as_ref()
            .is_some_and(|d| d.query.song_id.as_deref() == Some(song.id.as_str()));
        if have_doc {
            let synced = self.state.lyrics.as_ref().is_some_and(|d| d.synced);
            self.state.active_line.reset(synced);
            return;
        }
        let in_flight = self
            .requests
            .pending(RequestKind::Lyrics)
            .is_some_and(|t| t.song_id == song.id);
        if in_flight {
            return;
        }

        self.state.lyrics = None;
        self.state.lyrics_loading = true;
        self.state.active_line.reset(false);
        self.services.translations.load_document(None, None);

        let ticket = self.requests.issue(RequestKind::Lyrics, &song.id);
        let resolver = Arc::clone(&self.services.resolver);
        let query = LyricsQuery::for_song(song);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let doc = resolver.resolve(&query).await;
            let _ = tx
                .send(Event::Network(NetworkEvent::LyricsResolved { ticket, doc }))
                .await;
        });
    }

    fn apply_lyrics(&mut self, doc: Option<LyricDocument>) {
        self.state.lyrics_loading = false;
        self.console.lyrics(doc.as_ref());

        let synced = doc.as_ref().is_some_and(|d| d.synced);
        self.state.active_line.reset(synced);
        let source_lang = doc.as_ref().map(|d| self.source_language(d));
        self.services
            .translations
            .load_document(doc.as_ref(), source_lang);
        self.state.lyrics = doc;

        self.update_active_line();
        self.prefetch_translations();
    }

    /// Language of the current song's lyrics: the catalog's tag if it has
    /// one, otherwise guessed from the script.
    fn source_language(&self, doc: &LyricDocument) -> String {
        if let Some(lang) = self.state.current.as_ref().and_then(|s| s.language.clone()) {
            return lang;
        }
        let sample: String = doc.lines.iter().take(10).map(|l| l.text.as_str()).collect();
        detect_language(&sample).to_string()
    }

    fn update_active_line(&mut self) {
        let Some(doc) = self.state.lyrics.as_ref() else {
            return;
        };
        if doc.query.song_id.as_deref() != self.state.current.as_ref().map(|s| s.id.as_str()) {
            return;
        }
        if !self.state.active_line.update(&doc.lines, self.state.progress) {
            return;
        }
        let Some(index) = self.state.active_line.current() else {
            return;
        };
        if let Some(line) = doc.lines.get(index) {
            self.console.active_line(index, line);
        }
        if self.state.translation_enabled {
            let target = self.services.translations.target_language();
            if let Some(text) = self.services.translations.cached(index, &target) {
                self.console.translation(index, &text);
            }
        }
        self.prefetch_translations();
    }

    fn prefetch_translations(&self) {
        if !self.state.translation_enabled {
            return;
        }
        let (Some(doc), Some(song_id)) = (self.state.lyrics_for_current(), self.state.current_id())
        else {
            return;
        };
        for line in prefetch_targets(doc, self.state.active_index(), self.settings.prefetch_window) {
            self.spawn_translation(song_id.to_string(), line);
        }
    }

    fn spawn_translation(&self, song_id: String, line: usize) {
        let cache = self.services.translations.clone();
        let language = cache.target_language();
        if cache.cached(line, &language).is_some() || cache.is_in_flight(line, &language) {
            return;
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            cache.get(line, &language).await;
            let _ = tx
                .send(Event::Network(NetworkEvent::TranslationSettled {
                    song_id,
                    line,
                    language,
                }))
                .await;
        });
    }

    fn set_target_language(&mut self, code: &str) {
        let code = code.trim().to_lowercase();
        if code.is_empty() {
            return;
        }
        if !self.services.translations.set_target_language(&code) {
            return;
        }
        if let Err(e) = self.storage.save_language(&code) {
            tracing::warn!("saving language preference: {e:#}");
        }
        self.console.notice(format!("translating into {code}"));
        self.prefetch_translations();
    }

    fn show_lyrics(&self) {
        let Some(doc) = self.state.lyrics_for_current() else {
            let msg = if self.state.lyrics_loading {
                "lyrics are loading"
            } else {
                "no lyrics available"
            };
            self.console.notice(msg);
            return;
        };
        let lines = if self.state.translation_enabled {
            let target = self.services.translations.target_language();
            self.services.translations.annotate(&doc.lines, &target)
        } else {
            doc.lines.clone()
        };
        let annotated = LyricDocument {
            lines,
            ..doc.clone()
        };
        self.console
            .document(&annotated, self.state.active_index());
    }

    fn spawn_word_lookup(&self, word: String, save: bool) {
        let word = word.trim().to_string();
        if word.is_empty() {
            return;
        }
        let translator = Arc::clone(&self.services.translator);
        let target = self.services.translations.target_language();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ev = match translator.word_meaning(&word, &target).await {
                Ok(meaning) => NetworkEvent::WordMeaning {
                    word,
                    meaning,
                    save,
                },
                Err(e) => NetworkEvent::Error(format!("looking up {word:?}: {e:#}")),
            };
            let _ = tx.send(Event::Network(ev)).await;
        });
    }

    // Library

    fn save_word(&mut self, word: String) {
        let word = word.trim().to_string();
        if word.is_empty() {
            return;
        }
        if self.storage.is_saved_word(&word) {
            let entry = VocabularyEntry::new(&word, "", "", None);
            match self.storage.toggle_vocabulary(entry) {
                Ok(_) => self.console.notice(format!("removed {word:?} from vocabulary")),
                Err(e) => tracing::warn!("updating vocabulary: {e:#}"),
            }
            return;
        }
        let known = self
            .state
            .last_word
            .as_ref()
            .filter(|(w, _)| w.to_lowercase() == word.to_lowercase())
            .map(|(_, m)| m.clone());
        match known {
            Some(meaning) => self.toggle_saved_word(&word, &meaning),
            None => self.spawn_word_lookup(word, true),
        }
    }

    fn toggle_saved_word(&self, word: &str, meaning: &WordMeaning) {
        let song_id = self.state.current_id().map(str::to_string);
        let entry = VocabularyEntry::new(word, &meaning.translation, &meaning.meaning, song_id);
        match self.storage.toggle_vocabulary(entry) {
            Ok(true) => self.console.notice(format!("saved {word:?}")),
            Ok(false) => self.console.notice(format!("removed {word:?} from vocabulary")),
            Err(e) => tracing::warn!("updating vocabulary: {e:#}"),
        }
    }

    fn toggle_like(&self) {
        let Some(song) = self.state.current.as_ref() else {
            self.console.notice("nothing is playing");
            return;
        };
        match self.storage.toggle_like(song) {
            Ok(true) => self.console.notice(format!("liked {}", song.display_line())),
            Ok(false) => self.console.notice(format!("unliked {}", song.display_line())),
            Err(e) => tracing::warn!("updating liked songs: {e:#}"),
        }
    }

    fn favorite_active_line(&self) {
        let (Some(song), Some(index), Some(line)) = (
            self.state.current.clone(),
            self.state.active_index(),
            self.state.active_lyric(),
        ) else {
            self.console.notice("no active lyric line");
            return;
        };
        let target = self.services.translations.target_language();
        let translation = self.services.translations.cached(index, &target);
        let fav = FavoriteLine::new(song, line.time, &line.text, translation);
        match self.storage.toggle_favorite_line(fav) {
            Ok(true) => self.console.notice("line saved to favorites"),
            Ok(false) => self.console.notice("line removed from favorites"),
            Err(e) => tracing::warn!("updating favorite lines: {e:#}"),
        }
    }

    // Background fetches

    /// Look up `id` and play it once found, unless another play request
    /// comes first.
    fn spawn_fetch_song(&mut self, id: String, seek_to: Option<f64>) {
        let ticket = self.requests.issue(RequestKind::SongFetch, &id);
        let catalog = Arc::clone(&self.services.catalog);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ev = match catalog.song(&id).await {
                Ok(song) => NetworkEvent::SongFetched {
                    ticket,
                    song,
                    seek_to,
                },
                Err(e) => NetworkEvent::Error(format!("fetching song {id}: {e:#}")),
            };
            let _ = tx.send(Event::Network(ev)).await;
        });
    }

    fn spawn_recommendations(&mut self, seed: &Song) {
        let ticket = self.requests.issue(RequestKind::Recommendations, &seed.id);
        let catalog = Arc::clone(&self.services.catalog);
        let seed = seed.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let songs = fetch_recommendations(catalog.as_ref(), &seed).await;
            let _ = tx
                .send(Event::Network(NetworkEvent::Recommendations { ticket, songs }))
                .await;
        });
    }
}

/// Songs to queue after `seed`: the catalog's suggestions, or a search on the
/// seed's artist when there are none.
async fn fetch_recommendations(catalog: &dyn Catalog, seed: &Song) -> Vec<Song> {
    match catalog.recommendations(&seed.id).await {
        Ok(songs) if !songs.is_empty() => return songs,
        Ok(_) => tracing::debug!(id = %seed.id, "no suggestions, searching by artist"),
        Err(e) => tracing::warn!(id = %seed.id, "suggestions failed: {e:#}"),
    }

    let query = if seed.artist.is_empty() {
        &seed.title
    } else {
        &seed.artist
    };
    match catalog.search_songs(query).await {
        Ok(songs) => songs.into_iter().filter(|s| s.id != seed.id).collect(),
        Err(e) => {
            tracing::warn!(id = %seed.id, "artist search failed: {e:#}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::lrclib::{CorpusRecord, LyricsCorpus};
    use crate::lyrics::resolver::ResolverSettings;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDevice {
        log: Mutex<Vec<String>>,
    }

    impl RecordingDevice {
        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn loads(&self) -> Vec<String> {
            self.log()
                .into_iter()
                .filter_map(|e| e.strip_prefix("load:").map(str::to_string))
                .collect()
        }
    }

    #[async_trait]
    impl PlaybackDevice for RecordingDevice {
        async fn load(&self, url: &str) -> anyhow::Result<()> {
            self.push(format!("load:{url}"));
            Ok(())
        }
        async fn pause(&self) -> anyhow::Result<()> {
            self.push("pause".into());
            Ok(())
        }
        async fn resume(&self) -> anyhow::Result<()> {
            self.push("resume".into());
            Ok(())
        }
        async fn seek(&self, seconds: f64) -> anyhow::Result<()> {
            self.push(format!("seek:{seconds}"));
            Ok(())
        }
        async fn stop(&self) -> anyhow::Result<()> {
            self.push("stop".into());
            Ok(())
        }
        async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
            self.push(format!("volume:{volume}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubCatalog {
        recs: HashMap<String, Vec<Song>>,
        /// Per-id latency of `song` lookups.
        delays: HashMap<String, Duration>,
    }

    #[async_trait]
    impl Catalog for StubCatalog {
        async fn song(&self, id: &str) -> anyhow::Result<Song> {
            if let Some(delay) = self.delays.get(id) {
                tokio::time::sleep(*delay).await;
            }
            Ok(song(id))
        }
        async fn search_songs(&self, _query: &str) -> anyhow::Result<Vec<Song>> {
            Ok(Vec::new())
        }
        async fn recommendations(&self, song_id: &str) -> anyhow::Result<Vec<Song>> {
            Ok(self.recs.get(song_id).cloned().unwrap_or_default())
        }
        async fn embedded_lyrics(&self, _song_id: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct StubCorpus {
        exact: HashMap<String, CorpusRecord>,
    }

    #[async_trait]
    impl LyricsCorpus for StubCorpus {
        async fn get_exact(&self, track: &str, _artist: &str) -> anyhow::Result<Option<CorpusRecord>> {
            Ok(self.exact.get(track).cloned())
        }
        async fn search(&self, _query: &str) -> anyhow::Result<Vec<CorpusRecord>> {
            Ok(Vec::new())
        }
    }

    struct TagTranslator;

    #[async_trait]
    impl Translator for TagTranslator {
        async fn translate(&self, text: &str, _s: Option<&str>, target: &str) -> anyhow::Result<String> {
            Ok(format!("[{target}] {text}"))
        }
        async fn word_meaning(&self, word: &str, target: &str) -> anyhow::Result<WordMeaning> {
            Ok(WordMeaning {
                translation: format!("[{target}] {word}"),
                meaning: "noun".into(),
            })
        }
    }

    fn song(id: &str) -> Song {
        Song {
            id: id.into(),
            title: format!("Title {id}"),
            artist: "Artist".into(),
            artist_id: None,
            album: String::new(),
            image: String::new(),
            url: format!("url-{id}"),
            duration: Some(200),
            language: None,
        }
    }

    struct Harness {
        session: Session,
        rx: mpsc::Receiver<Event>,
        device: Arc<RecordingDevice>,
    }

    impl Harness {
        fn new(catalog: StubCatalog, corpus: StubCorpus) -> Self {
            let (tx, rx) = mpsc::channel(256);
            let device = Arc::new(RecordingDevice::default());
            let catalog: Arc<dyn Catalog> = Arc::new(catalog);
            let translator: Arc<dyn Translator> = Arc::new(TagTranslator);
            let resolver = Arc::new(LyricsResolver::new(
                Arc::new(corpus),
                Arc::clone(&catalog),
                Arc::clone(&translator),
                ResolverSettings::default(),
            ));
            let services = Services {
                catalog,
                resolver,
                translator: Arc::clone(&translator),
                translations: TranslationCache::new(translator, "en"),
                device: device.clone(),
            };
            let session = Session::new(
                services,
                SessionSettings::default(),
                Storage::open_in_memory().unwrap(),
                tx,
                Console::silent(),
            );
            Self { session, rx, device }
        }

        async fn send(&mut self, ev: Event) {
            self.session.handle_event(ev).await;
        }

        async fn act(&mut self, action: Action) {
            self.send(Event::Input(action)).await;
        }

        async fn player(&mut self, pe: PlayerEvent) {
            self.send(Event::Player(pe)).await;
        }

        /// Feed queued events back in until `done` holds.
        async fn pump_until(&mut self, done: impl Fn(&Session) -> bool) {
            for _ in 0..100 {
                if done(&self.session) {
                    return;
                }
                let ev = tokio::time::timeout(Duration::from_secs(60), self.rx.recv())
                    .await
                    .expect("event before timeout")
                    .expect("channel open");
                self.session.handle_event(ev).await;
            }
            panic!("condition never reached");
        }

        /// Let spawned tasks finish, then handle whatever they sent.
        async fn drain(&mut self) {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            while let Ok(ev) = self.rx.try_recv() {
                self.session.handle_event(ev).await;
            }
        }

        fn state(&self) -> &SessionState {
            self.session.state()
        }

        fn queue_ids(&self) -> Vec<String> {
            self.state().queue.songs().iter().map(|s| s.id.clone()).collect()
        }
    }

    fn catalog_with_recs(seed: &str, ids: &[&str]) -> StubCatalog {
        let mut catalog = StubCatalog::default();
        catalog
            .recs
            .insert(seed.into(), ids.iter().map(|id| song(id)).collect());
        catalog
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_error_skips_to_next_entry() {
        let mut h = Harness::new(catalog_with_recs("a", &["b", "c"]), StubCorpus::default());
        h.act(Action::Play(song("a"))).await;
        assert_eq!(h.state().transport, TransportState::Loading);
        h.pump_until(|s| s.state().queue.len() == 3).await;

        h.player(PlayerEvent::Ready).await;
        assert_eq!(h.state().transport, TransportState::Playing);

        h.player(PlayerEvent::Error("decoder failed".into())).await;
        assert_eq!(h.state().transport, TransportState::Error);
        assert_eq!(h.state().current_id(), Some("a"));

        h.pump_until(|s| s.state().current_id() == Some("b")).await;
        assert_eq!(h.state().transport, TransportState::Loading);
        assert_eq!(h.device.loads(), ["url-a", "url-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_next_cancels_pending_auto_skip() {
        let mut h = Harness::new(catalog_with_recs("a", &["b", "c"]), StubCorpus::default());
        h.act(Action::Play(song("a"))).await;
        h.pump_until(|s| s.state().queue.len() == 3).await;

        h.player(PlayerEvent::Error("boom".into())).await;
        h.act(Action::Next).await;
        assert_eq!(h.state().current_id(), Some("b"));

        // The skip scheduled for "a" arrives late and must not move past "b".
        h.pump_until(|s| s.state().current_id() == Some("b")).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        h.drain().await;
        assert_eq!(h.state().current_id(), Some("b"));
        assert_eq!(h.device.loads(), ["url-a", "url-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_entries_failing_stops() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        h.act(Action::PlayAll {
            songs: vec![song("a"), song("b")],
            start: 0,
        })
        .await;
        h.player(PlayerEvent::Error("gone".into())).await;
        h.pump_until(|s| s.state().current_id() == Some("b")).await;

        h.player(PlayerEvent::Error("gone".into())).await;
        h.pump_until(|s| s.state().transport == TransportState::Idle).await;
        assert!(h.state().current.is_none());
        assert_eq!(h.state().last_played.as_ref().map(|s| s.id.as_str()), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_song_without_url_is_a_media_error() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        let mut broken = song("a");
        broken.url.clear();
        h.act(Action::PlayAll {
            songs: vec![broken, song("b")],
            start: 0,
        })
        .await;
        assert_eq!(h.state().transport, TransportState::Error);
        h.pump_until(|s| s.state().current_id() == Some("b")).await;
        assert_eq!(h.device.loads(), ["url-b"]);
    }

    fn slow_catalog(delays: &[(&str, u64)]) -> StubCatalog {
        let mut catalog = StubCatalog::default();
        for (id, secs) in delays {
            catalog
                .delays
                .insert(id.to_string(), Duration::from_secs(*secs));
        }
        catalog
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_play_by_id_wins() {
        let mut h = Harness::new(slow_catalog(&[("x", 5), ("y", 1)]), StubCorpus::default());
        h.act(Action::PlayId("x".into())).await;
        h.act(Action::PlayId("y".into())).await;
        h.pump_until(|s| s.state().current_id() == Some("y")).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        h.drain().await;
        assert_eq!(h.state().current_id(), Some("y"));
        assert_eq!(h.queue_ids(), ["y"]);
        assert_eq!(h.device.loads(), ["url-y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_play_supersedes_pending_fetch() {
        let mut h = Harness::new(slow_catalog(&[("x", 5)]), StubCorpus::default());
        h.act(Action::PlayId("x".into())).await;
        h.act(Action::Play(song("z"))).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        h.drain().await;
        assert_eq!(h.state().current_id(), Some("z"));
        assert_eq!(h.device.loads(), ["url-z"]);
    }

    #[tokio::test]
    async fn test_progress_before_ready_is_ignored() {
        let mut h = Harness::new(catalog_with_recs("a", &["b"]), StubCorpus::default());
        h.act(Action::Play(song("a"))).await;
        h.pump_until(|s| s.state().queue.len() == 2).await;
        h.player(PlayerEvent::Ready).await;
        h.player(PlayerEvent::Progress { seconds: 50.0 }).await;
        assert_eq!(h.state().progress, 50.0);

        h.act(Action::Next).await;
        // A tick from "a" that was already queued when "b" started loading.
        h.player(PlayerEvent::Progress { seconds: 51.0 }).await;
        assert_eq!(h.state().transport, TransportState::Loading);
        assert_eq!(h.state().progress, 0.0);

        h.act(Action::Previous).await;
        assert_eq!(h.state().current_id(), Some("a"));
        assert_eq!(h.device.loads(), ["url-a", "url-b", "url-a"]);
    }

    #[tokio::test]
    async fn test_history_is_capped_most_recent_first() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        for i in 0..60 {
            h.act(Action::Play(song(&format!("s{i}")))).await;
        }
        h.act(Action::Play(song("s30"))).await;

        let stored = h.session.storage.history();
        assert_eq!(stored.len(), HISTORY_CAP);
        assert_eq!(stored[0].id, "s30");
        assert_eq!(stored[1].id, "s59");
        let mut ids: Vec<_> = stored.iter().map(|s| s.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), HISTORY_CAP);
        assert_eq!(h.state().queue.history().len(), HISTORY_CAP);
    }

    #[tokio::test]
    async fn test_stale_recommendations_are_dropped() {
        let mut catalog = catalog_with_recs("a", &["a1", "a2"]);
        catalog.recs.insert("b".into(), vec![song("b1")]);
        let mut h = Harness::new(catalog, StubCorpus::default());

        h.act(Action::Play(song("a"))).await;
        h.act(Action::Play(song("b"))).await;
        h.pump_until(|s| s.state().queue.len() == 2).await;
        h.drain().await;

        assert_eq!(h.queue_ids(), ["b", "b1"]);
    }

    #[tokio::test]
    async fn test_replaying_the_sole_entry_keeps_the_queue() {
        let mut h = Harness::new(catalog_with_recs("a", &["b"]), StubCorpus::default());
        h.act(Action::PlayAll {
            songs: vec![song("a")],
            start: 0,
        })
        .await;
        h.act(Action::Play(song("a"))).await;
        h.drain().await;
        // No recommendation request for a song that already is the queue.
        assert_eq!(h.queue_ids(), ["a"]);
    }

    #[tokio::test]
    async fn test_previous_restarts_or_steps_back() {
        let mut h = Harness::new(catalog_with_recs("a", &["b"]), StubCorpus::default());
        h.act(Action::Play(song("a"))).await;
        h.pump_until(|s| s.state().queue.len() == 2).await;
        h.act(Action::Next).await;
        h.player(PlayerEvent::Ready).await;
        assert_eq!(h.state().current_id(), Some("b"));

        h.player(PlayerEvent::Progress { seconds: 10.0 }).await;
        h.act(Action::Previous).await;
        assert_eq!(h.state().current_id(), Some("b"));
        assert_eq!(h.state().progress, 0.0);
        assert_eq!(h.device.log().last().map(String::as_str), Some("seek:0"));

        h.player(PlayerEvent::Progress { seconds: 1.0 }).await;
        h.act(Action::Previous).await;
        assert_eq!(h.state().current_id(), Some("a"));

        // Already at the head: nothing happens.
        h.player(PlayerEvent::Ready).await;
        h.act(Action::Previous).await;
        assert_eq!(h.state().current_id(), Some("a"));
        assert_eq!(h.device.loads(), ["url-a", "url-b", "url-a"]);
    }

    #[tokio::test]
    async fn test_end_of_queue_goes_idle() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        h.act(Action::Play(song("a"))).await;
        h.drain().await;
        h.player(PlayerEvent::Ready).await;
        h.player(PlayerEvent::Ended).await;

        assert_eq!(h.state().transport, TransportState::Idle);
        assert!(h.state().current.is_none());
        assert_eq!(h.state().last_played.as_ref().map(|s| s.id.as_str()), Some("a"));
        assert_eq!(h.device.log().last().map(String::as_str), Some("stop"));
    }

    #[tokio::test]
    async fn test_repeat_one_replays_on_natural_end() {
        let mut h = Harness::new(catalog_with_recs("a", &["b"]), StubCorpus::default());
        h.act(Action::Play(song("a"))).await;
        h.pump_until(|s| s.state().queue.len() == 2).await;
        h.act(Action::ToggleRepeat).await; // all
        h.act(Action::ToggleRepeat).await; // one
        h.player(PlayerEvent::Ready).await;
        h.player(PlayerEvent::Ended).await;

        assert_eq!(h.state().current_id(), Some("a"));
        assert_eq!(h.device.loads(), ["url-a", "url-a"]);
    }

    #[tokio::test]
    async fn test_transport_commands_need_media() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        h.act(Action::Pause).await;
        h.act(Action::Resume).await;
        h.act(Action::Seek(10.0)).await;
        assert!(h.device.log().is_empty());
        assert_eq!(h.state().transport, TransportState::Idle);

        h.act(Action::Play(song("a"))).await;
        h.player(PlayerEvent::Ready).await;
        h.player(PlayerEvent::Duration { seconds: 100.0 }).await;
        h.act(Action::Seek(500.0)).await;
        assert_eq!(h.state().progress, 100.0);
        h.act(Action::SeekRelative(-250.0)).await;
        assert_eq!(h.state().progress, 0.0);

        h.act(Action::TogglePause).await;
        assert_eq!(h.state().transport, TransportState::Paused);
        h.act(Action::TogglePause).await;
        assert_eq!(h.state().transport, TransportState::Playing);
        assert_eq!(
            h.device.log(),
            ["load:url-a", "seek:100", "seek:0", "pause", "resume"]
        );
    }

    #[tokio::test]
    async fn test_play_record_uses_best_variants() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        let record = serde_json::json!({
            "id": "A",
            "name": "X",
            "primaryArtists": "P, Q",
            "downloadUrl": [{"quality": "96kbps", "url": "u1"}, {"quality": "320kbps", "url": "u2"}],
            "image": [{"quality": "50x50", "url": "i1"}, {"quality": "500x500", "url": "i2"}],
            "duration": "200"
        });
        h.act(Action::PlayRecord(record)).await;

        let current = h.state().current.clone().unwrap();
        assert_eq!(current.artist, "P");
        assert_eq!(current.image, "i2");
        assert_eq!(h.device.loads(), ["u2"]);
    }

    #[tokio::test]
    async fn test_synced_lyrics_track_progress_and_translate() {
        let mut corpus = StubCorpus::default();
        corpus.exact.insert(
            "Title a".into(),
            CorpusRecord {
                synced_lyrics: Some("[00:05.00]hola\n[00:12.00]adios".into()),
                ..Default::default()
            },
        );
        let mut h = Harness::new(StubCatalog::default(), corpus);
        h.act(Action::Play(song("a"))).await;
        h.pump_until(|s| s.state().lyrics_for_current().is_some()).await;
        assert!(!h.state().lyrics_loading);
        assert_eq!(h.state().active_index(), None);

        h.player(PlayerEvent::Ready).await;
        h.player(PlayerEvent::Progress { seconds: 6.0 }).await;
        assert_eq!(h.state().active_lyric().map(|l| l.text.as_str()), Some("hola"));

        let translations = h.session.services.translations.clone();
        h.pump_until(|_| translations.cached(1, "en").is_some()).await;
        assert_eq!(translations.cached(0, "en").as_deref(), Some("[en] hola"));
        assert_eq!(translations.cached(1, "en").as_deref(), Some("[en] adios"));

        h.act(Action::SeekToLine(1)).await;
        assert_eq!(h.state().progress, 12.0);
        assert_eq!(h.state().active_index(), Some(1));
    }

    #[tokio::test]
    async fn test_language_switch_is_persisted() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        h.act(Action::SetTargetLanguage(" HI ".into())).await;
        assert_eq!(h.session.services.translations.target_language(), "hi");
        assert_eq!(h.session.storage.language().as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_like_and_save_word() {
        let mut h = Harness::new(StubCatalog::default(), StubCorpus::default());
        h.act(Action::ToggleLike).await;
        assert!(h.session.storage.liked_songs().is_empty());

        h.act(Action::Play(song("a"))).await;
        h.act(Action::ToggleLike).await;
        assert!(h.session.storage.is_liked("a"));

        h.act(Action::SaveWord("Corazón".into())).await;
        h.pump_until(|s| s.storage.is_saved_word("corazón")).await;
        let vocab = h.session.storage.vocabulary();
        assert_eq!(vocab[0].translation, "[en] Corazón");
        assert_eq!(vocab[0].song_id.as_deref(), Some("a"));

        h.act(Action::SaveWord("corazón".into())).await;
        assert!(!h.session.storage.is_saved_word("Corazón"));
    }
}
