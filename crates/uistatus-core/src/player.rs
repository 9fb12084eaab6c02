//! Playback model for MPRIS media players.

use std::str::FromStr;

/// Well-known bus name prefix advertised by MPRIS players.
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// Playback state of a single player.
///
/// One canonical casing everywhere; anything unrecognized on the wire maps
/// to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl FromStr for PlaybackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Playing" => Self::Playing,
            "Paused" => Self::Paused,
            _ => Self::Stopped,
        })
    }
}

impl PlaybackStatus {
    /// Election rank: playing beats paused beats anything else.
    pub fn rank(self) -> u8 {
        match self {
            Self::Playing => 2,
            Self::Paused => 1,
            Self::Stopped => 0,
        }
    }
}

/// Track attributes reported by a player. Partially populated; an absent
/// field is `None`, never an error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackMetadata {
    /// First entry of xesam:artist.
    pub artist: Option<String>,
    /// xesam:title.
    pub title: Option<String>,
    /// xesam:url.
    pub url: Option<String>,
    /// Pre-formatted "now playing" string some players provide
    /// (any metadata key ending in ":nowplaying", e.g. vlc:nowplaying).
    pub now_playing: Option<String>,
}

/// One currently-connected media player, keyed in the registry by `owner`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    /// Stable player name derived from the bus name ("vlc", "spotify", ...).
    pub identity: String,
    /// Unique connection name on the bus (":1.234"). Changes if the process
    /// reconnects, which is why it is the registry key rather than identity.
    pub owner: String,
    /// Numeric suffix of the owner; higher means more recently connected.
    pub ordinal: u64,
    pub status: PlaybackStatus,
    pub metadata: TrackMetadata,
    /// Last known volume, informational only.
    pub volume: Option<f64>,
}

impl PlayerEntry {
    pub fn new(identity: impl Into<String>, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        let ordinal = owner_ordinal(&owner);
        Self {
            identity: identity.into(),
            owner,
            ordinal,
            status: PlaybackStatus::Stopped,
            metadata: TrackMetadata::default(),
            volume: None,
        }
    }
}

/// Partial state change applied to one player. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct PlayerUpdate {
    pub status: Option<PlaybackStatus>,
    pub metadata: Option<TrackMetadata>,
    pub volume: Option<f64>,
}

/// Numeric suffix of a unique connection name: ":1.234" -> 234.
/// Unknown shapes rank lowest.
pub fn owner_ordinal(owner: &str) -> u64 {
    owner
        .rsplit('.')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Player name for a bus name matching the MPRIS prefix:
/// "org.mpris.MediaPlayer2.vlc.instance123" -> "vlc".
/// `None` when the name is not a player at all.
pub fn player_identity(bus_name: &str) -> Option<&str> {
    let rest = bus_name.strip_prefix(MPRIS_PREFIX)?;
    let identity = rest.split('.').next().unwrap_or(rest);
    if identity.is_empty() {
        None
    } else {
        Some(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_status_from_wire() {
        assert_eq!("Playing".parse(), Ok(PlaybackStatus::Playing));
        assert_eq!("Paused".parse(), Ok(PlaybackStatus::Paused));
        assert_eq!("Stopped".parse(), Ok(PlaybackStatus::Stopped));
        // Off-casing and garbage both rank as stopped.
        assert_eq!("paused".parse(), Ok(PlaybackStatus::Stopped));
        assert_eq!("???".parse(), Ok(PlaybackStatus::Stopped));
    }

    #[test]
    fn ordinal_from_owner() {
        assert_eq!(owner_ordinal(":1.234"), 234);
        assert_eq!(owner_ordinal(":1.7"), 7);
        assert_eq!(owner_ordinal("not-an-owner"), 0);
    }

    #[test]
    fn identity_from_bus_name() {
        assert_eq!(player_identity("org.mpris.MediaPlayer2.vlc"), Some("vlc"));
        assert_eq!(
            player_identity("org.mpris.MediaPlayer2.firefox.instance_1_42"),
            Some("firefox")
        );
        assert_eq!(player_identity("org.freedesktop.Notifications"), None);
        assert_eq!(player_identity("org.mpris.MediaPlayer2."), None);
    }
}
