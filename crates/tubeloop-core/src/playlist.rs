//! Playlist store.
//!
//! Holds the ordered list of entries and writes it through to the key-value
//! store after every mutation. Identifiers are unique within the list.
//!
//! The store knows nothing about playback. Callers that track an active index
//! use [`active_index_after_removal`] to keep it pointing at the same entry.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::{self, KeyValueStore};
use crate::youtube::{VideoId, format_duration, parse_video_id, thumbnail_url, watch_url};

/// One video in the playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    /// Canonical video identifier.
    pub id: VideoId,
    /// Text the user pasted, kept for display and export.
    #[serde(rename = "url")]
    pub source_text: String,
    /// Duration reported by the player once playback started.
    #[serde(
        rename = "duration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_secs: Option<f64>,
    /// The provider refused embedded playback for this video.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub embed_disabled: bool,
}

impl PlaylistEntry {
    /// Create an entry with no metadata.
    pub fn new(id: VideoId, source_text: impl Into<String>) -> Self {
        Self {
            id,
            source_text: source_text.into(),
            duration_secs: None,
            embed_disabled: false,
        }
    }

    /// Duration as `m:ss` / `h:mm:ss`, once known.
    #[must_use]
    pub fn formatted_duration(&self) -> Option<String> {
        self.duration_secs.and_then(format_duration)
    }

    /// Thumbnail image for list rendering.
    #[must_use]
    pub fn thumbnail_url(&self) -> String {
        thumbnail_url(&self.id)
    }

    /// Watch page on youtube.com.
    #[must_use]
    pub fn watch_url(&self) -> String {
        watch_url(&self.id)
    }
}

/// Side-channel data learned from the player.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetadataUpdate {
    /// New duration in seconds.
    pub duration_secs: Option<f64>,
    /// New embed-restricted flag.
    pub embed_disabled: Option<bool>,
}

impl MetadataUpdate {
    /// Update only the duration.
    #[must_use]
    pub const fn duration(secs: f64) -> Self {
        Self {
            duration_secs: Some(secs),
            embed_disabled: None,
        }
    }

    /// Update only the embed-restricted flag.
    #[must_use]
    pub const fn embed_disabled(disabled: bool) -> Self {
        Self {
            duration_secs: None,
            embed_disabled: Some(disabled),
        }
    }
}

/// Counts reported after a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Entries appended.
    pub added: usize,
    /// Non-blank lines that were invalid or already present.
    pub skipped: usize,
}

/// What happened to an active index when another entry was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveIndexChange {
    /// Nothing was active, or the removed entry came after it.
    Unaffected,
    /// The removed entry came before it; it now lives at this index.
    Shifted(usize),
    /// The active entry itself was removed.
    Removed,
}

/// Work out where the active entry is after removing `removed`.
#[must_use]
pub fn active_index_after_removal(active: Option<usize>, removed: usize) -> ActiveIndexChange {
    match active {
        Some(active) if active == removed => ActiveIndexChange::Removed,
        Some(active) if active > removed => ActiveIndexChange::Shifted(active - 1),
        _ => ActiveIndexChange::Unaffected,
    }
}

/// Ordered, de-duplicated, persisted list of entries.
pub struct PlaylistStore {
    entries: Vec<PlaylistEntry>,
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PlaylistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistStore")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl PlaylistStore {
    /// Create an empty store writing to `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: Vec::new(),
            storage,
        }
    }

    /// Create a store holding whatever `storage` has saved.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let entries = storage::load_playlist(storage.as_ref());
        info!("Restored playlist with {} entries", entries.len());
        Self { entries, storage }
    }

    /// Entries in playback order.
    #[must_use]
    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    /// Entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PlaylistEntry> {
        self.entries.get(index)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry with `id`.
    #[must_use]
    pub fn position_of(&self, id: &VideoId) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.id == id)
    }

    /// Whether `id` is already in the list.
    #[must_use]
    pub fn contains(&self, id: &VideoId) -> bool {
        self.position_of(id).is_some()
    }

    /// Identifiers of entries the provider refused to embed, in list order.
    #[must_use]
    pub fn embed_disabled_ids(&self) -> Vec<VideoId> {
        self.entries
            .iter()
            .filter(|entry| entry.embed_disabled)
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Whether any entry is embed-restricted.
    #[must_use]
    pub fn has_embed_disabled(&self) -> bool {
        self.entries.iter().any(|entry| entry.embed_disabled)
    }

    /// Parse `source_text` and append it.
    ///
    /// Returns the new entry's index.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if no identifier can be parsed,
    /// [`Error::DuplicateEntry`] if it is already in the list. Neither mutates.
    pub fn add(&mut self, source_text: &str) -> Result<usize> {
        let source_text = source_text.trim();
        let id = parse_video_id(source_text)
            .ok_or_else(|| Error::InvalidInput(source_text.to_string()))?;

        if self.contains(&id) {
            debug!("Rejected duplicate {}", id);
            return Err(Error::DuplicateEntry(id.to_string()));
        }

        info!("Added {} to playlist", id);
        self.entries.push(PlaylistEntry::new(id, source_text));
        self.persist();
        Ok(self.entries.len() - 1)
    }

    /// Remove the entry at `index`. Out-of-range indices are a no-op.
    pub fn remove(&mut self, index: usize) -> Option<PlaylistEntry> {
        if index >= self.entries.len() {
            return None;
        }

        let removed = self.entries.remove(index);
        info!("Removed {} from playlist", removed.id);
        self.persist();
        Some(removed)
    }

    /// Remove every entry. Returns `false` if the list was already empty.
    pub fn clear(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        info!("Cleared {} entries", self.entries.len());
        self.entries.clear();
        self.persist();
        true
    }

    /// Apply player-learned metadata to the entry at `index`.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn update_metadata(&mut self, index: usize, update: MetadataUpdate) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };

        if let Some(secs) = update.duration_secs {
            entry.duration_secs = Some(secs);
        }
        if let Some(disabled) = update.embed_disabled {
            entry.embed_disabled = disabled;
        }
        debug!("Updated metadata for {}", entry.id);

        self.persist();
        true
    }

    /// Append every valid, not-yet-present identifier from `lines`.
    ///
    /// Blank lines are ignored. Duplicates within the batch are skipped too.
    /// The list is saved once at the end.
    pub fn import_lines<I, S>(&mut self, lines: I) -> ImportSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<VideoId> = self.entries.iter().map(|e| e.id.clone()).collect();
        let mut summary = ImportSummary::default();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }

            match parse_video_id(line) {
                Some(id) if seen.insert(id.clone()) => {
                    self.entries.push(PlaylistEntry::new(id, line));
                    summary.added += 1;
                }
                _ => summary.skipped += 1,
            }
        }

        if summary.added > 0 {
            self.persist();
        }
        info!(
            "Imported {} entries, skipped {}",
            summary.added, summary.skipped
        );
        summary
    }

    /// Import newline-delimited text (`\n` or `\r\n`).
    pub fn import_text(&mut self, text: &str) -> ImportSummary {
        self.import_lines(text.lines())
    }

    /// Source texts in playlist order.
    #[must_use]
    pub fn export_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.source_text.clone())
            .collect()
    }

    /// Source texts joined by newlines.
    #[must_use]
    pub fn export_text(&self) -> String {
        self.export_lines().join("\n")
    }

    fn persist(&self) {
        if let Err(e) = storage::save_playlist(self.storage.as_ref(), &self.entries) {
            warn!("Playlist not saved, continuing in memory: {}", e);
        }
    }
}
