//! Playback coordinator.
//!
//! Owns the playlist, the play-order controller, the current index and the
//! embedded player handle. Every user command and every player callback goes
//! through a `&mut self` method here, so handlers never overlap; state may
//! still have changed between an async request and its completion, which is
//! why handlers re-check the current index against the playlist before use.
//!
//! State changes are published as [`SessionEvent`]s when an event sender is
//! attached.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{PlayerSettings, Preferences};
use crate::error::Result;
use crate::order::{OrderController, PlayMode};
use crate::player::{
    PlayerConfig, PlayerErrorCode, PlayerEvent, PlayerFactory, PlayerHandle, PlayerState,
    validate_playback_rate,
};
use crate::playlist::{
    ActiveIndexChange, ImportSummary, MetadataUpdate, PlaylistEntry, PlaylistStore,
    active_index_after_removal,
};
use crate::storage::{self, KeyValueStore};
use crate::transfer::Clipboard;
use crate::youtube::{VideoId, aggregate_link};

/// Coarse player status as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// Nothing loaded.
    #[default]
    Idle,
    /// A load was issued and the player hasn't reported playing yet.
    Loading,
    /// The player reported playing.
    Playing,
}

/// Notification for whatever renders the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An entry was appended.
    EntryAdded {
        /// Index of the new entry.
        index: usize,
        /// Its identifier.
        id: VideoId,
    },
    /// An entry was removed.
    EntryRemoved {
        /// Index it had.
        index: usize,
        /// Its identifier.
        id: VideoId,
    },
    /// The list was emptied.
    Cleared,
    /// A bulk import finished.
    Imported {
        /// Entries appended.
        added: usize,
        /// Lines skipped.
        skipped: usize,
    },
    /// A load was issued for an entry.
    NowPlaying {
        /// Index of the entry.
        index: usize,
        /// Its identifier.
        id: VideoId,
    },
    /// Playback stopped and nothing is active.
    Stopped,
    /// The player reported an entry's duration.
    DurationLearned {
        /// Index of the entry.
        index: usize,
        /// Duration in seconds.
        secs: f64,
    },
    /// The provider refused embedded playback of an entry.
    EmbedRestricted {
        /// Index of the entry.
        index: usize,
        /// Its identifier.
        id: VideoId,
    },
    /// A link should be opened outside the embedded player.
    OpenExternally {
        /// The link.
        url: String,
    },
    /// The play mode changed.
    ModeChanged {
        /// New mode.
        mode: PlayMode,
    },
    /// The playback rate changed.
    RateChanged {
        /// New rate.
        rate: f64,
    },
}

/// Sender half for [`SessionEvent`]s.
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// Drives playback of a [`PlaylistStore`] through an embedded player.
pub struct PlaybackCoordinator<R = StdRng> {
    playlist: PlaylistStore,
    order: OrderController<R>,
    storage: Arc<dyn KeyValueStore>,
    factory: Box<dyn PlayerFactory>,
    player: Option<Box<dyn PlayerHandle>>,
    player_ready: bool,
    pending_load: Option<VideoId>,
    player_settings: PlayerSettings,
    status: PlayerStatus,
    current_index: Option<usize>,
    mode: PlayMode,
    playback_rate: f64,
    preferences: Preferences,
    events: Option<SessionEventSender>,
}

impl<R> fmt::Debug for PlaybackCoordinator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("entries", &self.playlist.len())
            .field("current_index", &self.current_index)
            .field("mode", &self.mode)
            .field("playback_rate", &self.playback_rate)
            .field("status", &self.status)
            .field("player_ready", &self.player_ready)
            .finish_non_exhaustive()
    }
}

impl PlaybackCoordinator<StdRng> {
    /// Restore a session from `storage` with an OS-seeded shuffle.
    pub fn restore(storage: Arc<dyn KeyValueStore>, factory: Box<dyn PlayerFactory>) -> Self {
        Self::restore_with_order(storage, factory, OrderController::new())
    }
}

impl<R: RngCore> PlaybackCoordinator<R> {
    /// Restore a session from `storage` using the given order controller.
    ///
    /// The playlist, play mode, playback rate and preferences are read back;
    /// anything missing or unreadable takes its default.
    pub fn restore_with_order(
        storage: Arc<dyn KeyValueStore>,
        factory: Box<dyn PlayerFactory>,
        order: OrderController<R>,
    ) -> Self {
        let playlist = PlaylistStore::load(Arc::clone(&storage));
        let mode = storage::load_mode(storage.as_ref());
        let playback_rate = storage::load_rate(storage.as_ref());
        let preferences = storage::load_preferences(storage.as_ref());
        debug!("Restored mode {} at rate {}", mode, playback_rate);

        Self {
            playlist,
            order,
            storage,
            factory,
            player: None,
            player_ready: false,
            pending_load: None,
            player_settings: PlayerSettings::default(),
            status: PlayerStatus::Idle,
            current_index: None,
            mode,
            playback_rate,
            preferences,
            events: None,
        }
    }

    /// Use these settings when the player is created.
    #[must_use]
    pub fn with_player_settings(mut self, settings: PlayerSettings) -> Self {
        self.player_settings = settings;
        self
    }

    /// Publish session events to `sender`.
    #[must_use]
    pub fn with_event_sender(mut self, sender: SessionEventSender) -> Self {
        self.events = Some(sender);
        self
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// The playlist.
    #[must_use]
    pub const fn playlist(&self) -> &PlaylistStore {
        &self.playlist
    }

    /// The play-order controller.
    #[must_use]
    pub const fn order(&self) -> &OrderController<R> {
        &self.order
    }

    /// Index of the active entry.
    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// The active entry.
    #[must_use]
    pub fn current_entry(&self) -> Option<&PlaylistEntry> {
        self.current_index.and_then(|index| self.playlist.get(index))
    }

    /// Current play mode.
    #[must_use]
    pub const fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Stored playback rate.
    #[must_use]
    pub const fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Current preferences.
    #[must_use]
    pub const fn preferences(&self) -> Preferences {
        self.preferences
    }

    /// Player status.
    #[must_use]
    pub const fn status(&self) -> PlayerStatus {
        self.status
    }

    /// Whether the player has been created and reported ready.
    #[must_use]
    pub const fn is_player_ready(&self) -> bool {
        self.player_ready
    }

    // ---------------------------------------------------------------------
    // Playlist mutations
    // ---------------------------------------------------------------------

    /// Parse and append `source_text`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] or [`Error::DuplicateEntry`]; the list is unchanged.
    pub fn add(&mut self, source_text: &str) -> Result<usize> {
        let index = self.playlist.add(source_text)?;
        if let Some(entry) = self.playlist.get(index) {
            let id = entry.id.clone();
            self.emit(SessionEvent::EntryAdded { index, id });
        }
        Ok(index)
    }

    /// Remove the entry at `index`, keeping the active index on the same entry.
    ///
    /// Removing the active entry stops playback. Out of range is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<PlaylistEntry> {
        let removed = self.playlist.remove(index)?;

        match active_index_after_removal(self.current_index, index) {
            ActiveIndexChange::Removed => self.stop(),
            ActiveIndexChange::Shifted(active) => self.current_index = Some(active),
            ActiveIndexChange::Unaffected => {}
        }

        self.emit(SessionEvent::EntryRemoved {
            index,
            id: removed.id.clone(),
        });
        Some(removed)
    }

    /// Empty the list and stop playback. Returns `false` if already empty.
    pub fn clear(&mut self) -> bool {
        if !self.playlist.clear() {
            return false;
        }
        self.stop();
        self.order.invalidate();
        self.emit(SessionEvent::Cleared);
        true
    }

    /// Import a batch of lines.
    pub fn import_lines<I, S>(&mut self, lines: I) -> ImportSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let summary = self.playlist.import_lines(lines);
        self.emit(SessionEvent::Imported {
            added: summary.added,
            skipped: summary.skipped,
        });
        summary
    }

    /// Import newline-delimited text, e.g. a file's contents once read.
    pub fn import_text(&mut self, text: &str) -> ImportSummary {
        self.import_lines(text.lines())
    }

    /// Import whatever is on the clipboard.
    ///
    /// # Errors
    ///
    /// [`Error::ClipboardUnavailable`] if the clipboard can't be read.
    pub fn import_from_clipboard(
        &mut self,
        clipboard: &mut dyn Clipboard,
    ) -> Result<ImportSummary> {
        let text = clipboard.read_text()?;
        Ok(self.import_text(&text))
    }

    /// Source texts in playlist order.
    #[must_use]
    pub fn export_lines(&self) -> Vec<String> {
        self.playlist.export_lines()
    }

    /// Copy the list to the clipboard. Returns the number of lines written.
    ///
    /// # Errors
    ///
    /// [`Error::ClipboardUnavailable`] if the clipboard can't be written.
    pub fn export_to_clipboard(&self, clipboard: &mut dyn Clipboard) -> Result<usize> {
        if self.playlist.is_empty() {
            return Ok(0);
        }
        clipboard.write_text(&self.playlist.export_text())?;
        Ok(self.playlist.len())
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Change the play mode. The current index and shuffle order are untouched.
    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
        if let Err(e) = storage::save_mode(self.storage.as_ref(), mode) {
            warn!("Play mode not saved: {}", e);
        }
        info!("Play mode set to {}", mode);
        self.emit(SessionEvent::ModeChanged { mode });
    }

    /// Change the playback rate and apply it to a ready player.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPlaybackRate`] outside `[0.5, 2.0]`; nothing changes.
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        let rate = validate_playback_rate(rate)?;
        self.playback_rate = rate;
        if let Err(e) = storage::save_rate(self.storage.as_ref(), rate) {
            warn!("Playback rate not saved: {}", e);
        }
        if self.player_ready
            && let Some(player) = self.player.as_mut()
        {
            player.set_rate(rate);
        }
        debug!("Playback rate set to {}", rate);
        self.emit(SessionEvent::RateChanged { rate });
        Ok(())
    }

    /// Replace the preferences.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
        if let Err(e) = storage::save_preferences(self.storage.as_ref(), &preferences) {
            warn!("Preferences not saved: {}", e);
        }
    }

    // ---------------------------------------------------------------------
    // Playback commands
    // ---------------------------------------------------------------------

    /// Load and play the entry at `index`.
    ///
    /// Returns `Ok(false)` without doing anything when `index` is out of range.
    ///
    /// # Errors
    ///
    /// [`Error::PlayerNotReady`] if the player widget can't be created yet;
    /// the previous state is kept.
    pub fn play_at(&mut self, index: usize) -> Result<bool> {
        let Some(entry) = self.playlist.get(index) else {
            debug!("Ignoring play request for index {}", index);
            return Ok(false);
        };
        let id = entry.id.clone();

        if self.mode == PlayMode::Shuffle {
            self.order.sync_to(index, self.playlist.len());
        }

        self.load(&id)?;
        self.current_index = Some(index);
        self.status = PlayerStatus::Loading;
        info!("Playing {} ({})", index, id);
        self.emit(SessionEvent::NowPlaying { index, id });
        Ok(true)
    }

    /// Start from the beginning of a cycle: index 0, or the first slot of a
    /// fresh shuffle.
    ///
    /// # Errors
    ///
    /// [`Error::PlayerNotReady`] as for [`Self::play_at`].
    pub fn play_all(&mut self) -> Result<Option<usize>> {
        let Some(index) = self.order.start(self.mode, self.playlist.len()) else {
            return Ok(None);
        };
        self.play_at(index)?;
        Ok(Some(index))
    }

    /// Advance according to the play mode.
    ///
    /// # Errors
    ///
    /// [`Error::PlayerNotReady`] as for [`Self::play_at`].
    pub fn next(&mut self) -> Result<Option<usize>> {
        self.advance(self.mode)
    }

    /// Step back according to the play mode.
    ///
    /// # Errors
    ///
    /// [`Error::PlayerNotReady`] as for [`Self::play_at`].
    pub fn previous(&mut self) -> Result<Option<usize>> {
        let Some(index) = self
            .order
            .previous(self.mode, self.current_index, self.playlist.len())
        else {
            return Ok(None);
        };
        self.play_at(index)?;
        Ok(Some(index))
    }

    /// Stop playback; nothing is active afterwards.
    pub fn stop(&mut self) {
        if self.player_ready
            && let Some(player) = self.player.as_mut()
        {
            player.stop();
        }
        self.pending_load = None;
        self.status = PlayerStatus::Idle;
        if self.current_index.take().is_some() {
            info!("Playback stopped");
            self.emit(SessionEvent::Stopped);
        }
    }

    /// Link opening every embed-restricted entry on youtube.com.
    ///
    /// Also published as [`SessionEvent::OpenExternally`].
    pub fn open_disabled_externally(&mut self) -> Option<String> {
        let url = aggregate_link(&self.playlist.embed_disabled_ids())?;
        self.emit(SessionEvent::OpenExternally { url: url.clone() });
        Some(url)
    }

    // ---------------------------------------------------------------------
    // Player callbacks
    // ---------------------------------------------------------------------

    /// Dispatch a player callback.
    ///
    /// # Errors
    ///
    /// Propagates errors from an automatic advance.
    pub fn handle_player_event(&mut self, event: PlayerEvent) -> Result<()> {
        match event {
            PlayerEvent::Ready => {
                self.on_player_ready();
                Ok(())
            }
            PlayerEvent::Error(code) => self.on_player_error(code),
            PlayerEvent::StateChanged(state) => self.on_player_state_changed(state),
        }
    }

    /// The player finished initializing.
    pub fn on_player_ready(&mut self) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        self.player_ready = true;
        debug!("Player ready");

        if self.current_index.is_some() {
            match self.pending_load.take() {
                Some(id) => player.load_by_id(&id),
                None => player.play(),
            }
        }
        player.set_rate(self.playback_rate);
    }

    /// The player reported an error for the loaded video.
    ///
    /// # Errors
    ///
    /// Propagates errors from an automatic skip.
    pub fn on_player_error(&mut self, code: PlayerErrorCode) -> Result<()> {
        if !code.is_embed_restricted() {
            warn!("Player error {:?}", code);
            return Ok(());
        }
        let Some(index) = self.valid_current_index() else {
            return Ok(());
        };

        self.playlist
            .update_metadata(index, MetadataUpdate::embed_disabled(true));
        if let Some(entry) = self.playlist.get(index) {
            let id = entry.id.clone();
            warn!("{} cannot be played embedded", id);
            self.emit(SessionEvent::EmbedRestricted { index, id });
        }

        if !self.preferences.auto_skip_embed_restricted {
            return Ok(());
        }

        let all_restricted = self.playlist.entries().iter().all(|e| e.embed_disabled);
        if self.playlist.len() < 2 || all_restricted {
            self.stop();
            return Ok(());
        }

        // Looping a video that can't play would just fail again.
        let mode = match self.mode {
            PlayMode::SingleLoop => PlayMode::Sequential,
            mode => mode,
        };
        self.advance(mode).map(|_| ())
    }

    /// The player's lifecycle state changed.
    ///
    /// # Errors
    ///
    /// Propagates errors from an automatic advance.
    pub fn on_player_state_changed(&mut self, state: PlayerState) -> Result<()> {
        match state {
            PlayerState::Ended => self.on_ended(),
            PlayerState::Playing | PlayerState::Cued => {
                if state == PlayerState::Playing {
                    self.status = PlayerStatus::Playing;
                }
                self.on_started();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_started(&mut self) {
        let Some(index) = self.valid_current_index() else {
            return;
        };
        let Some(player) = self.player.as_mut() else {
            return;
        };

        let duration = player.duration();
        player.set_rate(self.playback_rate);

        let Some(secs) = duration.filter(|secs| secs.is_finite() && *secs > 0.0) else {
            return;
        };
        let known = self.playlist.get(index).and_then(|e| e.duration_secs);
        if known != Some(secs) {
            self.playlist
                .update_metadata(index, MetadataUpdate::duration(secs));
            self.emit(SessionEvent::DurationLearned { index, secs });
        }
    }

    fn on_ended(&mut self) -> Result<()> {
        let Some(current) = self.valid_current_index() else {
            self.status = PlayerStatus::Idle;
            return Ok(());
        };

        let len = self.playlist.len();
        let cycles = matches!(self.mode, PlayMode::Sequential | PlayMode::Shuffle);
        if cycles
            && self.preferences.open_disabled_externally
            && self.playlist.has_embed_disabled()
            && self.order.is_cycle_end(self.mode, Some(current), len)
        {
            info!("End of list, handing restricted videos to the browser");
            self.stop();
            self.open_disabled_externally();
            return Ok(());
        }

        self.next().map(|_| ())
    }

    fn advance(&mut self, mode: PlayMode) -> Result<Option<usize>> {
        let Some(step) = self
            .order
            .next(mode, self.current_index, self.playlist.len())
        else {
            return Ok(None);
        };
        if step.wrapped {
            debug!("Play order wrapped");
        }
        self.play_at(step.index)?;
        Ok(Some(step.index))
    }

    fn load(&mut self, id: &VideoId) -> Result<()> {
        match self.player.as_mut() {
            Some(player) if self.player_ready => player.load_by_id(id),
            Some(_) => self.pending_load = Some(id.clone()),
            None => {
                let config = PlayerConfig {
                    container: self.player_settings.container.clone(),
                    initial_video_id: id.clone(),
                    autoplay: true,
                    width: self.player_settings.width.clone(),
                    height: self.player_settings.height.clone(),
                };
                let player = self.factory.create(config)?;
                debug!("Player created for {}", id);
                self.player = Some(player);
                self.player_ready = false;
                self.pending_load = None;
            }
        }
        Ok(())
    }

    fn valid_current_index(&self) -> Option<usize> {
        self.current_index.filter(|&index| index < self.playlist.len())
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sender) = &self.events
            && sender.send(event).is_err()
        {
            debug!("Session event receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::player::{MockPlayerFactory, MockPlayerHandle};
    use crate::storage::{MODE_KEY, MemoryStore, RATE_KEY};
    use crate::transfer::MockClipboard;
    use mockall::predicate::eq;

    const A: &str = "dQw4w9WgXcQ";
    const B: &str = "9bZkp7q19f0";
    const C: &str = "kJQP7kiw5Fk";

    fn coordinator_with(
        factory: MockPlayerFactory,
        backing: Arc<MemoryStore>,
    ) -> PlaybackCoordinator {
        let mut coordinator = PlaybackCoordinator::restore_with_order(
            backing,
            Box::new(factory),
            OrderController::with_seed(17),
        );
        for id in [A, B, C] {
            coordinator.add(id).unwrap();
        }
        coordinator
    }

    fn factory_returning(player: MockPlayerHandle) -> MockPlayerFactory {
        let mut factory = MockPlayerFactory::new();
        factory
            .expect_create()
            .times(1)
            .return_once(move |_| Ok(Box::new(player) as Box<dyn PlayerHandle>));
        factory
    }

    #[test]
    fn test_first_play_creates_player_with_initial_video() {
        let mut player = MockPlayerHandle::new();
        player.expect_play().times(1).return_const(());
        player
            .expect_set_rate()
            .with(eq(1.0))
            .times(1)
            .return_const(());
        player.expect_load_by_id().times(0);

        let mut factory = MockPlayerFactory::new();
        factory
            .expect_create()
            .withf(|config| config.initial_video_id.as_str() == B && config.autoplay)
            .times(1)
            .return_once(move |_| Ok(Box::new(player) as Box<dyn PlayerHandle>));

        let mut coordinator = coordinator_with(factory, Arc::new(MemoryStore::new()));
        assert!(coordinator.play_at(1).unwrap());
        assert_eq!(coordinator.current_index(), Some(1));
        assert_eq!(coordinator.status(), PlayerStatus::Loading);
        assert!(!coordinator.is_player_ready());

        coordinator.on_player_ready();
        assert!(coordinator.is_player_ready());
    }

    #[test]
    fn test_play_before_ready_loads_latest_on_ready() {
        let mut player = MockPlayerHandle::new();
        player
            .expect_load_by_id()
            .withf(|id| id.as_str() == C)
            .times(1)
            .return_const(());
        player.expect_play().times(0);
        player.expect_set_rate().return_const(());

        let mut coordinator =
            coordinator_with(factory_returning(player), Arc::new(MemoryStore::new()));
        coordinator.play_at(0).unwrap();
        coordinator.play_at(2).unwrap();
        coordinator.on_player_ready();
        assert_eq!(coordinator.current_index(), Some(2));
    }

    #[test]
    fn test_play_out_of_range_is_noop() {
        let mut factory = MockPlayerFactory::new();
        factory.expect_create().times(0);

        let mut coordinator = coordinator_with(factory, Arc::new(MemoryStore::new()));
        assert!(!coordinator.play_at(3).unwrap());
        assert_eq!(coordinator.current_index(), None);
    }

    #[test]
    fn test_player_not_ready_keeps_state() {
        let mut factory = MockPlayerFactory::new();
        factory
            .expect_create()
            .returning(|_| Err(Error::PlayerNotReady));

        let mut coordinator = coordinator_with(factory, Arc::new(MemoryStore::new()));
        let err = coordinator.play_at(0).unwrap_err();
        assert!(matches!(err, Error::PlayerNotReady));
        assert!(err.is_retryable());
        assert_eq!(coordinator.current_index(), None);
        assert_eq!(coordinator.status(), PlayerStatus::Idle);
    }

    #[test]
    fn test_set_playback_rate_applies_to_ready_player() {
        let mut player = MockPlayerHandle::new();
        player.expect_play().return_const(());
        player.expect_set_rate().with(eq(1.0)).return_const(());
        player
            .expect_set_rate()
            .with(eq(1.5))
            .times(1)
            .return_const(());

        let backing = Arc::new(MemoryStore::new());
        let mut coordinator = coordinator_with(factory_returning(player), backing.clone());
        coordinator.play_at(0).unwrap();
        coordinator.on_player_ready();

        coordinator.set_playback_rate(1.5).unwrap();
        assert_eq!(coordinator.playback_rate(), 1.5);
        assert_eq!(backing.get(RATE_KEY).unwrap().as_deref(), Some("1.5"));

        assert!(coordinator.set_playback_rate(2.5).is_err());
        assert!(coordinator.set_playback_rate(0.3).is_err());
        assert_eq!(coordinator.playback_rate(), 1.5);
    }

    #[test]
    fn test_stop_stops_ready_player() {
        let mut player = MockPlayerHandle::new();
        player.expect_play().return_const(());
        player.expect_set_rate().return_const(());
        player.expect_stop().times(1).return_const(());

        let mut coordinator =
            coordinator_with(factory_returning(player), Arc::new(MemoryStore::new()));
        coordinator.play_at(0).unwrap();
        coordinator.on_player_ready();
        coordinator.stop();

        assert_eq!(coordinator.current_index(), None);
        assert_eq!(coordinator.status(), PlayerStatus::Idle);
    }

    #[test]
    fn test_duration_recorded_on_playing() {
        let mut player = MockPlayerHandle::new();
        player.expect_play().return_const(());
        player.expect_set_rate().return_const(());
        player.expect_duration().return_const(Some(212.0));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut coordinator =
            coordinator_with(factory_returning(player), Arc::new(MemoryStore::new()))
                .with_event_sender(tx);
        coordinator.play_at(1).unwrap();
        coordinator.on_player_ready();
        coordinator
            .on_player_state_changed(PlayerState::Playing)
            .unwrap();

        assert_eq!(coordinator.status(), PlayerStatus::Playing);
        assert_eq!(coordinator.playlist().get(1).unwrap().duration_secs, Some(212.0));

        let mut learned = false;
        while let Ok(event) = rx.try_recv() {
            if event == (SessionEvent::DurationLearned { index: 1, secs: 212.0 }) {
                learned = true;
            }
        }
        assert!(learned);
    }

    #[test]
    fn test_unusable_duration_ignored() {
        let mut player = MockPlayerHandle::new();
        player.expect_play().return_const(());
        player.expect_set_rate().return_const(());
        player.expect_duration().return_const(Some(f64::NAN));

        let mut coordinator =
            coordinator_with(factory_returning(player), Arc::new(MemoryStore::new()));
        coordinator.play_at(0).unwrap();
        coordinator.on_player_ready();
        coordinator.on_player_state_changed(PlayerState::Cued).unwrap();

        assert_eq!(coordinator.playlist().get(0).unwrap().duration_secs, None);
        assert_eq!(coordinator.status(), PlayerStatus::Loading);
    }

    #[test]
    fn test_set_mode_persists_without_touching_position() {
        let backing = Arc::new(MemoryStore::new());
        let mut coordinator = coordinator_with(MockPlayerFactory::new(), backing.clone());

        coordinator.set_mode(PlayMode::Shuffle);
        assert_eq!(coordinator.mode(), PlayMode::Shuffle);
        assert_eq!(backing.get(MODE_KEY).unwrap().as_deref(), Some("shuffle"));
        assert!(coordinator.order().shuffle_order().is_empty());
        assert_eq!(coordinator.current_index(), None);
    }

    #[test]
    fn test_restore_reads_mode_rate_and_preferences() {
        let backing = Arc::new(MemoryStore::new());
        storage::save_mode(backing.as_ref(), PlayMode::SingleLoop).unwrap();
        storage::save_rate(backing.as_ref(), 0.75).unwrap();
        let prefs = Preferences {
            auto_skip_embed_restricted: false,
            open_disabled_externally: true,
        };
        storage::save_preferences(backing.as_ref(), &prefs).unwrap();

        let coordinator = PlaybackCoordinator::restore(backing, Box::new(MockPlayerFactory::new()));
        assert_eq!(coordinator.mode(), PlayMode::SingleLoop);
        assert_eq!(coordinator.playback_rate(), 0.75);
        assert_eq!(coordinator.preferences(), prefs);
    }

    #[test]
    fn test_clipboard_import_and_export() {
        let mut coordinator =
            coordinator_with(MockPlayerFactory::new(), Arc::new(MemoryStore::new()));

        let mut clipboard = MockClipboard::new();
        clipboard
            .expect_read_text()
            .times(1)
            .returning(|| Ok("https://youtu.be/OPf0YbXqDm0\nnope\n".to_string()));
        clipboard
            .expect_write_text()
            .withf(|text| text.lines().count() == 4)
            .times(1)
            .returning(|_| Ok(()));

        let summary = coordinator.import_from_clipboard(&mut clipboard).unwrap();
        assert_eq!(summary, ImportSummary { added: 1, skipped: 1 });
        assert_eq!(coordinator.export_to_clipboard(&mut clipboard).unwrap(), 4);
    }

    #[test]
    fn test_clipboard_unavailable_is_reported() {
        let mut coordinator =
            coordinator_with(MockPlayerFactory::new(), Arc::new(MemoryStore::new()));
        let mut clipboard = MockClipboard::new();
        clipboard
            .expect_read_text()
            .returning(|| Err(Error::ClipboardUnavailable("permission denied".to_string())));

        let err = coordinator.import_from_clipboard(&mut clipboard).unwrap_err();
        assert!(matches!(err, Error::ClipboardUnavailable(_)));
        assert_eq!(coordinator.playlist().len(), 3);
    }

    #[test]
    fn test_open_disabled_externally_link() {
        let mut coordinator =
            coordinator_with(MockPlayerFactory::new(), Arc::new(MemoryStore::new()));
        assert!(coordinator.open_disabled_externally().is_none());

        coordinator.playlist.update_metadata(0, MetadataUpdate::embed_disabled(true));
        coordinator.playlist.update_metadata(2, MetadataUpdate::embed_disabled(true));
        assert_eq!(
            coordinator.open_disabled_externally().as_deref(),
            Some("https://www.youtube.com/watch_videos?video_ids=dQw4w9WgXcQ,kJQP7kiw5Fk")
        );
    }
}
