//! Player registry: the multi-player arbitration state machine.
//!
//! Keyed by bus owner, never by identity — a player may disconnect and come
//! back under a new owner while the name persists. Election is recomputed
//! from the full current state on every change; no diffs, no caching across
//! structural changes, so it is correct regardless of signal arrival order.
//!
//! Every mutator returns the resulting emission, already deduplicated
//! against the last one: identical consecutive `(icon, text)` states never
//! yield more than one queued update.

use std::collections::HashMap;

use crate::format::{MprisStyle, player_status};
use crate::player::{PlaybackStatus, PlayerEntry, PlayerUpdate};
use crate::update::StatusUpdate;

/// Store tag for the media status file.
pub const MPRIS_TAG: &str = "mpris";

#[derive(Debug)]
pub struct PlayerRegistry {
    players: HashMap<String, PlayerEntry>,
    /// Last `(icon, text)` handed out, consulted only for dedup.
    last_emitted: Option<(String, String)>,
    style: MprisStyle,
}

impl PlayerRegistry {
    pub fn new(style: MprisStyle) -> Self {
        Self {
            players: HashMap::new(),
            last_emitted: None,
            style,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains_owner(&self, owner: &str) -> bool {
        self.players.contains_key(owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }

    /// Insert a player during the initial bus scan, before the first
    /// emission. Arbitration runs once afterwards via [`refresh`].
    ///
    /// [`refresh`]: Self::refresh
    pub fn seed_player(&mut self, entry: PlayerEntry) {
        self.players.insert(entry.owner.clone(), entry);
    }

    /// Register a player under its owner. Emits only when the newcomer wins
    /// the election (a fresh Stopped player must not pre-empt one that is
    /// already playing).
    pub fn add_player(&mut self, entry: PlayerEntry) -> Option<StatusUpdate> {
        let owner = entry.owner.clone();
        self.players.insert(owner.clone(), entry);
        if self.elected_owner().as_deref() == Some(owner.as_str()) {
            self.refresh()
        } else {
            None
        }
    }

    /// Drop a player immediately — no tombstones. Emits whenever a player
    /// was actually removed, since the elected status may have changed.
    pub fn remove_player(&mut self, owner: &str) -> Option<StatusUpdate> {
        if self.players.remove(owner).is_some() {
            self.refresh()
        } else {
            None
        }
    }

    /// Atomic owner change for a reconnecting player: remove the old owner,
    /// register the new entry.
    pub fn replace_owner(&mut self, old_owner: &str, entry: PlayerEntry) -> Option<StatusUpdate> {
        let removed = self.players.remove(old_owner).is_some();
        let owner = entry.owner.clone();
        self.players.insert(owner.clone(), entry);
        if removed || self.elected_owner().as_deref() == Some(owner.as_str()) {
            self.refresh()
        } else {
            None
        }
    }

    /// Apply a property change to one player. Values identical to the
    /// stored ones are discarded before any re-election happens; any actual
    /// change re-renders, so a change that hands the election to a
    /// different owner still emits. Churn on a non-elected player leaves
    /// the rendered status identical and is swallowed by the dedup.
    pub fn apply_update(&mut self, owner: &str, change: PlayerUpdate) -> Option<StatusUpdate> {
        let entry = self.players.get_mut(owner)?;
        let mut changed = false;
        if let Some(status) = change.status {
            if entry.status != status {
                entry.status = status;
                changed = true;
            }
        }
        if let Some(metadata) = change.metadata {
            if entry.metadata != metadata {
                entry.metadata = metadata;
                changed = true;
            }
        }
        if let Some(volume) = change.volume {
            if entry.volume != Some(volume) {
                entry.volume = Some(volume);
                changed = true;
            }
        }
        if changed {
            self.refresh()
        } else {
            None
        }
    }

    /// Seek notification: stored state is untouched, but the elected
    /// player's rendered status is recomputed (and deduplicated as usual).
    pub fn touch(&mut self, owner: &str) -> Option<StatusUpdate> {
        if self.elected_owner().as_deref() == Some(owner) {
            self.refresh()
        } else {
            None
        }
    }

    /// Recompute and emit if different from the last emission. Used
    /// directly after the initial seeding pass, so the store always gets a
    /// first value even when no player is running.
    pub fn refresh(&mut self) -> Option<StatusUpdate> {
        let status = self.current_status();
        if self.last_emitted.as_ref() == Some(&status) {
            return None;
        }
        self.last_emitted = Some(status.clone());
        Some(StatusUpdate::new(MPRIS_TAG, status.0, status.1))
    }

    /// Rendered `(icon, text)` for the elected player, or the stopped icon
    /// with empty text when no player is connected.
    pub fn current_status(&self) -> (String, String) {
        match self.elected_owner() {
            Some(owner) => player_status(&self.players[&owner], &self.style),
            None => (self.style.icon_stopped.clone(), String::new()),
        }
    }

    /// Election: total order by `(status rank, connection ordinal)`
    /// descending, then prefer the first playing-or-paused entry, falling
    /// back to the first entry overall. Two phases on purpose: a
    /// newly-connected Stopped player must not pre-empt a Playing one, yet
    /// when everything is inactive a deterministic owner is still reported.
    pub fn elected_owner(&self) -> Option<String> {
        let mut ranked: Vec<&PlayerEntry> = self.players.values().collect();
        ranked.sort_by_key(|e| std::cmp::Reverse((e.status.rank(), e.ordinal)));
        ranked
            .iter()
            .find(|e| {
                matches!(
                    e.status,
                    PlaybackStatus::Playing | PlaybackStatus::Paused
                )
            })
            .or_else(|| ranked.first())
            .map(|e| e.owner.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::TrackMetadata;

    fn registry() -> PlayerRegistry {
        PlayerRegistry::new(MprisStyle::default())
    }

    fn playing(identity: &str, owner: &str) -> PlayerEntry {
        let mut e = PlayerEntry::new(identity, owner);
        e.status = PlaybackStatus::Playing;
        e.metadata = TrackMetadata {
            artist: Some("X".into()),
            title: Some("Y".into()),
            url: Some("file:///x/y.flac".into()),
            now_playing: None,
        };
        e
    }

    // -----------------------------------------------------------------------
    // Election
    // -----------------------------------------------------------------------

    #[test]
    fn empty_registry_elects_nobody() {
        assert_eq!(registry().elected_owner(), None);
    }

    #[test]
    fn older_playing_beats_newer_stopped() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));
        assert_eq!(reg.elected_owner().as_deref(), Some(":1.10"));
    }

    #[test]
    fn among_stopped_players_newest_connection_wins() {
        let mut reg = registry();
        reg.add_player(PlayerEntry::new("vlc", ":1.10"));
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));
        assert_eq!(reg.elected_owner().as_deref(), Some(":1.99"));
    }

    #[test]
    fn paused_beats_stopped_but_loses_to_playing() {
        let mut reg = registry();
        let mut paused = PlayerEntry::new("mpv", ":1.50");
        paused.status = PlaybackStatus::Paused;
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));
        reg.add_player(paused);
        assert_eq!(reg.elected_owner().as_deref(), Some(":1.50"));

        reg.add_player(playing("vlc", ":1.10"));
        assert_eq!(reg.elected_owner().as_deref(), Some(":1.10"));
    }

    #[test]
    fn election_never_returns_a_removed_owner() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));
        reg.remove_player(":1.10");
        let elected = reg.elected_owner();
        assert!(elected.as_deref() == Some(":1.99"));
        reg.remove_player(":1.99");
        assert_eq!(reg.elected_owner(), None);
    }

    // -----------------------------------------------------------------------
    // Emission dedup
    // -----------------------------------------------------------------------

    #[test]
    fn initial_refresh_reports_stopped_with_empty_text() {
        let mut reg = registry();
        let update = reg.refresh().expect("first refresh always emits");
        assert_eq!(update.tag, "mpris");
        assert_eq!(update.icon, "⏹");
        assert_eq!(update.text, "");
        // Same state again: suppressed.
        assert_eq!(reg.refresh(), None);
    }

    #[test]
    fn add_play_then_disconnect_round_trip() {
        let mut reg = registry();
        reg.refresh();

        let update = reg.add_player(playing("vlc", ":1.10")).expect("emits");
        assert_eq!(update.icon, "▶");
        assert_eq!(update.text, "X - Y");

        let update = reg.remove_player(":1.10").expect("emits");
        assert_eq!(update.icon, "⏹");
        assert_eq!(update.text, "");
    }

    #[test]
    fn identical_states_never_emit_twice() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));

        // Replay the exact same stored values.
        let change = PlayerUpdate {
            status: Some(PlaybackStatus::Playing),
            metadata: Some(TrackMetadata {
                artist: Some("X".into()),
                title: Some("Y".into()),
                url: Some("file:///x/y.flac".into()),
                now_playing: None,
            }),
            volume: None,
        };
        assert_eq!(reg.apply_update(":1.10", change), None);
    }

    #[test]
    fn noop_update_triggers_no_reelection_and_no_emission() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));
        assert_eq!(reg.apply_update(":1.10", PlayerUpdate::default()), None);
    }

    #[test]
    fn update_for_unknown_owner_is_ignored() {
        let mut reg = registry();
        let change = PlayerUpdate {
            status: Some(PlaybackStatus::Playing),
            ..PlayerUpdate::default()
        };
        assert_eq!(reg.apply_update(":1.404", change), None);
    }

    #[test]
    fn background_player_change_does_not_emit() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));

        // Metadata churn on the non-elected player stays silent.
        let change = PlayerUpdate {
            metadata: Some(TrackMetadata {
                title: Some("idle playlist".into()),
                ..TrackMetadata::default()
            }),
            ..PlayerUpdate::default()
        };
        assert_eq!(reg.apply_update(":1.99", change), None);
    }

    #[test]
    fn pausing_elected_player_emits_new_icon() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));

        let change = PlayerUpdate {
            status: Some(PlaybackStatus::Paused),
            ..PlayerUpdate::default()
        };
        let update = reg.apply_update(":1.10", change).expect("emits");
        assert_eq!(update.icon, "⏸");
        assert_eq!(update.text, "X - Y");
    }

    #[test]
    fn stopping_the_elected_player_emits_the_new_winner() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));
        let mut paused = PlayerEntry::new("mpv", ":1.50");
        paused.status = PlaybackStatus::Paused;
        paused.metadata = TrackMetadata {
            title: Some("Film".into()),
            ..TrackMetadata::default()
        };
        reg.add_player(paused);

        // vlc stops: the election moves to mpv, and that handover must be
        // rendered right away, not on the next unrelated event.
        let change = PlayerUpdate {
            status: Some(PlaybackStatus::Stopped),
            ..PlayerUpdate::default()
        };
        let update = reg.apply_update(":1.10", change).expect("emits");
        assert_eq!(update.icon, "⏸");
        assert_eq!(update.text, "Film");
        assert_eq!(reg.elected_owner().as_deref(), Some(":1.50"));
    }

    #[test]
    fn background_player_starting_playback_takes_over() {
        let mut reg = registry();
        let mut paused = playing("vlc", ":1.10");
        paused.status = PlaybackStatus::Paused;
        reg.add_player(paused);
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));

        let change = PlayerUpdate {
            status: Some(PlaybackStatus::Playing),
            metadata: Some(TrackMetadata {
                title: Some("New Track".into()),
                ..TrackMetadata::default()
            }),
            ..PlayerUpdate::default()
        };
        let update = reg.apply_update(":1.99", change).expect("emits");
        assert_eq!(update.icon, "▶");
        assert_eq!(update.text, "New Track");
        assert_eq!(reg.elected_owner().as_deref(), Some(":1.99"));
    }

    #[test]
    fn seek_on_elected_owner_is_deduplicated() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));
        // Rendered text carries no position, so a seek changes nothing.
        assert_eq!(reg.touch(":1.10"), None);
        // Seek from a non-elected owner is also silent.
        reg.add_player(PlayerEntry::new("spotify", ":1.99"));
        assert_eq!(reg.touch(":1.99"), None);
    }

    #[test]
    fn owner_replacement_is_atomic() {
        let mut reg = registry();
        reg.add_player(playing("vlc", ":1.10"));

        let mut reconnected = playing("vlc", ":1.120");
        reconnected.metadata.title = Some("Z".into());
        let update = reg.replace_owner(":1.10", reconnected).expect("emits");
        assert_eq!(update.text, "X - Z");
        assert!(!reg.contains_owner(":1.10"));
        assert!(reg.contains_owner(":1.120"));
    }
}
