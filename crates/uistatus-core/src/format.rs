//! Text rendering for the mpris status: icons, now-playing composition and
//! truncation.

use crate::player::{PlaybackStatus, PlayerEntry};

/// Maximum rendered length of the artist field.
const ARTIST_MAX: usize = 30;
/// Maximum rendered length of the title field.
const TITLE_MAX: usize = 45;
/// Maximum rendered length of the composed now-playing string.
const TEXT_MAX: usize = 75;

/// Presentation knobs for the mpris status, filled from CLI flags.
#[derive(Debug, Clone)]
pub struct MprisStyle {
    pub icon_playing: String,
    pub icon_paused: String,
    pub icon_stopped: String,
    pub icon_none: String,
    /// Marker appended to truncated fields, counted against the limit.
    pub truncate_marker: String,
}

impl Default for MprisStyle {
    fn default() -> Self {
        Self {
            icon_playing: "▶".to_string(),
            icon_paused: "⏸".to_string(),
            icon_stopped: "⏹".to_string(),
            icon_none: "○".to_string(),
            truncate_marker: "…".to_string(),
        }
    }
}

impl MprisStyle {
    pub fn status_icon(&self, status: PlaybackStatus) -> &str {
        match status {
            PlaybackStatus::Playing => &self.icon_playing,
            PlaybackStatus::Paused => &self.icon_paused,
            PlaybackStatus::Stopped => &self.icon_stopped,
        }
    }
}

/// Shorten `s` to at most `max` characters, marker included.
///
/// Char-based, not byte-based: titles are routinely non-ASCII.
pub fn truncate(s: &str, marker: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(marker.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(marker);
    out
}

/// Render `(icon, text)` for one player.
///
/// Text is empty unless the player is playing or paused. A pre-formatted
/// now-playing string wins; otherwise "artist - title" for local files with
/// both fields, else title alone, else the raw source URL.
pub fn player_status(entry: &PlayerEntry, style: &MprisStyle) -> (String, String) {
    let icon = style.status_icon(entry.status).to_string();
    if !matches!(
        entry.status,
        PlaybackStatus::Playing | PlaybackStatus::Paused
    ) {
        return (icon, String::new());
    }

    let marker = &style.truncate_marker;
    let meta = &entry.metadata;
    let text = match meta.now_playing.as_deref() {
        Some(np) if !np.is_empty() => np.to_string(),
        _ => {
            let artist = truncate(meta.artist.as_deref().unwrap_or(""), marker, ARTIST_MAX);
            let title = truncate(meta.title.as_deref().unwrap_or(""), marker, TITLE_MAX);
            let url = meta.url.as_deref().unwrap_or("");
            if url.starts_with("file://") && !artist.is_empty() && !title.is_empty() {
                format!("{artist} - {title}")
            } else if !title.is_empty() {
                title
            } else {
                url.to_string()
            }
        }
    };
    (icon, truncate(&text, marker, TEXT_MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::TrackMetadata;

    fn entry(status: PlaybackStatus, metadata: TrackMetadata) -> PlayerEntry {
        let mut e = PlayerEntry::new("vlc", ":1.10");
        e.status = status;
        e.metadata = metadata;
        e
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("short", "…", 45), "short");
        assert_eq!(truncate("", "…", 45), "");
    }

    #[test]
    fn truncate_total_length_includes_marker() {
        let long: String = "x".repeat(50);
        let out = truncate(&long, "…", 45);
        assert_eq!(out.chars().count(), 45);
        assert_eq!(out, format!("{}…", "x".repeat(44)));
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let long: String = "é".repeat(50);
        let out = truncate(&long, "…", 10);
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn local_file_renders_artist_dash_title() {
        let e = entry(
            PlaybackStatus::Playing,
            TrackMetadata {
                artist: Some("X".into()),
                title: Some("Y".into()),
                url: Some("file:///music/y.flac".into()),
                now_playing: None,
            },
        );
        let (icon, text) = player_status(&e, &MprisStyle::default());
        assert_eq!(icon, "▶");
        assert_eq!(text, "X - Y");
    }

    #[test]
    fn stream_without_artist_falls_back_to_title_then_url() {
        let style = MprisStyle::default();
        let e = entry(
            PlaybackStatus::Paused,
            TrackMetadata {
                artist: None,
                title: Some("Some Show".into()),
                url: Some("https://radio.example/stream".into()),
                now_playing: None,
            },
        );
        assert_eq!(player_status(&e, &style).1, "Some Show");

        let e = entry(
            PlaybackStatus::Paused,
            TrackMetadata {
                url: Some("https://radio.example/stream".into()),
                ..TrackMetadata::default()
            },
        );
        assert_eq!(player_status(&e, &style).1, "https://radio.example/stream");
    }

    #[test]
    fn preformatted_now_playing_wins() {
        let e = entry(
            PlaybackStatus::Playing,
            TrackMetadata {
                artist: Some("ignored".into()),
                title: Some("ignored".into()),
                url: Some("file:///x".into()),
                now_playing: Some("Radio Jazz - Night Set".into()),
            },
        );
        let (_, text) = player_status(&e, &MprisStyle::default());
        assert_eq!(text, "Radio Jazz - Night Set");
    }

    #[test]
    fn stopped_player_renders_empty_text() {
        let e = entry(
            PlaybackStatus::Stopped,
            TrackMetadata {
                title: Some("leftover".into()),
                ..TrackMetadata::default()
            },
        );
        let (icon, text) = player_status(&e, &MprisStyle::default());
        assert_eq!(icon, "⏹");
        assert_eq!(text, "");
    }

    #[test]
    fn composed_text_is_capped() {
        let e = entry(
            PlaybackStatus::Playing,
            TrackMetadata {
                now_playing: Some("n".repeat(100)),
                ..TrackMetadata::default()
            },
        );
        let (_, text) = player_status(&e, &MprisStyle::default());
        assert_eq!(text.chars().count(), 75);
    }
}
