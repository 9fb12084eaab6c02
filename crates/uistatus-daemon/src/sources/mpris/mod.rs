//! Session-bus media player tracking.
//!
//! The tracker owns the single logical thread of control for the player
//! registry: NameOwnerChanged events and per-player property signals all
//! funnel into one loop, so registry access never needs a lock. Each tracked
//! player gets a small forwarder task that turns its typed zbus streams into
//! messages on the tracker channel.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zbus::Connection;
use zbus::fdo::{DBusProxy, NameOwnerChanged};
use zbus::zvariant::OwnedValue;

use uistatus_core::player::player_identity;
use uistatus_core::{
    MprisStyle, PlaybackStatus, PlayerEntry, PlayerRegistry, PlayerUpdate, StatusUpdate,
    TrackMetadata,
};

use crate::error::DaemonError;

mod proxy;
use proxy::PlayerProxy;

/// Some players tear down and re-register their interface right after
/// acquiring the name; ownership changes are processed only after this has
/// settled.
const OWNER_CHANGE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct MprisConfig {
    /// Player identities ("vlc", "spotify", ...) to ignore entirely.
    pub blacklist: Vec<String>,
    pub style: MprisStyle,
}

/// One event from a per-player forwarder task.
#[derive(Debug)]
enum PlayerSignal {
    Status { owner: String, status: PlaybackStatus },
    Metadata { owner: String, metadata: TrackMetadata },
    Volume { owner: String, volume: f64 },
    Seeked { owner: String },
}

pub struct MprisTracker {
    conn: Connection,
    registry: PlayerRegistry,
    blacklist: Vec<String>,
    tx: UnboundedSender<StatusUpdate>,
    signal_tx: UnboundedSender<PlayerSignal>,
    signal_rx: Option<UnboundedReceiver<PlayerSignal>>,
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl MprisTracker {
    /// Connect to the session bus. Failure here is fatal for the daemon:
    /// without the bus the media status would silently never update.
    pub async fn connect(
        config: MprisConfig,
        tx: UnboundedSender<StatusUpdate>,
    ) -> Result<Self, DaemonError> {
        let conn = Connection::session().await?;
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Ok(Self {
            conn,
            registry: PlayerRegistry::new(config.style),
            blacklist: config.blacklist,
            tx,
            signal_tx,
            signal_rx: Some(signal_rx),
            forwarders: HashMap::new(),
        })
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), DaemonError> {
        let dbus = DBusProxy::new(&self.conn).await?;
        let mut owner_changes = dbus.receive_name_owner_changed().await?;
        let Some(mut signal_rx) = self.signal_rx.take() else {
            return Ok(());
        };

        self.seed(&dbus).await?;
        // Unconditional first emission, stopped icon with empty text when no
        // player is running.
        let initial = self.registry.refresh();
        self.emit(initial);
        info!(players = self.registry.owners().count(), "mpris tracker ready");

        loop {
            tokio::select! {
                change = owner_changes.next() => match change {
                    Some(change) => self.handle_owner_change(change).await,
                    None => break,
                },
                signal = signal_rx.recv() => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Register every player already on the bus, then let `refresh` run the
    /// first election over the full set.
    async fn seed(&mut self, dbus: &DBusProxy<'_>) -> Result<(), DaemonError> {
        for name in dbus.list_names().await? {
            let Some(identity) = player_identity(name.inner().as_str()) else {
                continue;
            };
            let identity = identity.to_string();
            if self.is_blacklisted(&identity) {
                continue;
            }
            let owner = match dbus.get_name_owner(name.inner().clone()).await {
                Ok(owner) => owner.to_string(),
                // Raced with the player exiting between list and lookup.
                Err(err) => {
                    debug!(name = %name.inner(), "owner lookup failed: {err}");
                    continue;
                }
            };
            if let Some(entry) = self.attach_player(&identity, &owner).await {
                info!(player = %identity, owner = %owner, "found running player");
                self.registry.seed_player(entry);
            }
        }
        Ok(())
    }

    async fn handle_owner_change(&mut self, change: NameOwnerChanged) {
        let args = match change.args() {
            Ok(args) => args,
            Err(err) => {
                debug!("ignoring malformed NameOwnerChanged: {err}");
                return;
            }
        };
        let name = args.name().to_string();
        let Some(identity) = player_identity(&name) else {
            return;
        };
        let identity = identity.to_string();
        if self.is_blacklisted(&identity) {
            debug!(player = %identity, "blacklisted player ignored");
            return;
        }
        let old_owner: Option<String> = args.old_owner().as_ref().map(|o| o.to_string());
        let new_owner: Option<String> = args.new_owner().as_ref().map(|o| o.to_string());
        debug!(
            player = %identity,
            old = ?old_owner,
            new = ?new_owner,
            "player ownership changed"
        );

        tokio::time::sleep(OWNER_CHANGE_DEBOUNCE).await;

        let emission = match (old_owner, new_owner) {
            (None, Some(new)) => match self.attach_player(&identity, &new).await {
                Some(entry) => self.registry.add_player(entry),
                None => None,
            },
            (Some(old), None) => {
                self.detach_player(&old);
                self.registry.remove_player(&old)
            }
            // Owner handover without the name ever being free: swap atomically
            // so no intermediate "no player" state is rendered.
            (Some(old), Some(new)) => {
                self.detach_player(&old);
                match self.attach_player(&identity, &new).await {
                    Some(entry) => self.registry.replace_owner(&old, entry),
                    None => self.registry.remove_player(&old),
                }
            }
            (None, None) => None,
        };
        self.emit(emission);
    }

    /// Build a proxy against the unique owner, take an initial snapshot of
    /// its properties and start its signal forwarder. `None` means the
    /// player vanished while we were setting up.
    async fn attach_player(&mut self, identity: &str, owner: &str) -> Option<PlayerEntry> {
        let builder = match PlayerProxy::builder(&self.conn).destination(owner.to_string()) {
            Ok(builder) => builder,
            Err(err) => {
                debug!(owner = %owner, "invalid player destination: {err}");
                return None;
            }
        };
        let proxy = match builder.build().await {
            Ok(proxy) => proxy,
            Err(err) => {
                debug!(owner = %owner, "player proxy setup failed: {err}");
                return None;
            }
        };

        let mut entry = PlayerEntry::new(identity, owner);
        // A player exiting mid-read keeps the defaults rather than failing.
        if let Ok(status) = proxy.playback_status().await {
            entry.status = status.parse().unwrap_or_default();
        }
        if let Ok(map) = proxy.metadata().await {
            entry.metadata = parse_metadata(map);
        }
        if let Ok(volume) = proxy.volume().await {
            entry.volume = Some(volume);
        }

        let forwarder = tokio::spawn(forward_player_signals(
            proxy,
            owner.to_string(),
            self.signal_tx.clone(),
        ));
        register_forwarder(&mut self.forwarders, owner.to_string(), forwarder);
        Some(entry)
    }

    fn detach_player(&mut self, owner: &str) {
        if let Some(task) = self.forwarders.remove(owner) {
            task.abort();
        }
    }

    fn handle_signal(&mut self, signal: PlayerSignal) {
        let emission = match signal {
            PlayerSignal::Status { owner, status } => self.registry.apply_update(
                &owner,
                PlayerUpdate {
                    status: Some(status),
                    ..PlayerUpdate::default()
                },
            ),
            PlayerSignal::Metadata { owner, metadata } => self.registry.apply_update(
                &owner,
                PlayerUpdate {
                    metadata: Some(metadata),
                    ..PlayerUpdate::default()
                },
            ),
            PlayerSignal::Volume { owner, volume } => self.registry.apply_update(
                &owner,
                PlayerUpdate {
                    volume: Some(volume),
                    ..PlayerUpdate::default()
                },
            ),
            PlayerSignal::Seeked { owner } => self.registry.touch(&owner),
        };
        self.emit(emission);
    }

    fn emit(&self, emission: Option<StatusUpdate>) {
        if let Some(update) = emission {
            debug!(status = %update.render(), "media status changed");
            let _ = self.tx.send(update);
        }
    }

    fn is_blacklisted(&self, identity: &str) -> bool {
        self.blacklist.iter().any(|entry| entry == identity)
    }

    /// Stop all forwarders; match rules and the connection itself drop with
    /// the tracker.
    fn shutdown(&mut self) {
        for (_, task) in self.forwarders.drain() {
            task.abort();
        }
        debug!("mpris tracker stopped");
    }
}

/// Turn one player's zbus streams into tracker messages. Aborted by the
/// tracker when the player detaches; exits on its own when every stream
/// closes.
async fn forward_player_signals(
    proxy: PlayerProxy<'static>,
    owner: String,
    tx: UnboundedSender<PlayerSignal>,
) {
    let mut status_changes = proxy.receive_playback_status_changed().await;
    let mut metadata_changes = proxy.receive_metadata_changed().await;
    let mut volume_changes = proxy.receive_volume_changed().await;
    // Both extra subscriptions are best-effort: a player without them still
    // gets full property forwarding.
    let mut seeks = match proxy.receive_seeked().await {
        Ok(seeks) => Some(seeks),
        Err(err) => {
            debug!(owner = %owner, "seek subscription failed: {err}");
            None
        }
    };
    // Non-standard signal a few players emit instead of PropertiesChanged.
    let mut legacy_metadata = match proxy.inner().receive_signal("TrackMetadataChanged").await {
        Ok(stream) => Some(stream),
        Err(err) => {
            debug!(owner = %owner, "legacy metadata subscription failed: {err}");
            None
        }
    };

    loop {
        tokio::select! {
            Some(change) = status_changes.next() => {
                if let Ok(value) = change.get().await {
                    let _ = tx.send(PlayerSignal::Status {
                        owner: owner.clone(),
                        status: value.parse().unwrap_or_default(),
                    });
                }
            }
            Some(change) = metadata_changes.next() => {
                if let Ok(map) = change.get().await {
                    let _ = tx.send(PlayerSignal::Metadata {
                        owner: owner.clone(),
                        metadata: parse_metadata(map),
                    });
                }
            }
            Some(change) = volume_changes.next() => {
                if let Ok(volume) = change.get().await {
                    let _ = tx.send(PlayerSignal::Volume { owner: owner.clone(), volume });
                }
            }
            Some(_) = next_or_pending(&mut seeks) => {
                let _ = tx.send(PlayerSignal::Seeked { owner: owner.clone() });
            }
            Some(_) = next_or_pending(&mut legacy_metadata) => {
                // Payload shape varies per player; re-read the property instead
                // of parsing the signal body.
                if let Ok(map) = proxy.metadata().await {
                    let _ = tx.send(PlayerSignal::Metadata {
                        owner: owner.clone(),
                        metadata: parse_metadata(map),
                    });
                }
            }
            else => break,
        }
    }
}

/// Next item of an optional stream. A stream that could not be subscribed
/// never yields, instead of tearing the forwarder down.
async fn next_or_pending<S>(stream: &mut Option<S>) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Track a player's forwarder under its owner, aborting any forwarder the
/// same owner already had so a duplicate add cannot leak a running task.
fn register_forwarder(
    forwarders: &mut HashMap<String, JoinHandle<()>>,
    owner: String,
    forwarder: JoinHandle<()>,
) {
    if let Some(previous) = forwarders.insert(owner, forwarder) {
        previous.abort();
    }
}

/// Pick the fields the status renderer cares about out of the raw MPRIS
/// metadata dict. Wrong-typed or empty values degrade to absent.
fn parse_metadata(map: HashMap<String, OwnedValue>) -> TrackMetadata {
    let mut metadata = TrackMetadata::default();
    for (key, value) in map {
        match key.as_str() {
            "xesam:artist" => {
                metadata.artist = Vec::<String>::try_from(value)
                    .ok()
                    .and_then(|artists| artists.into_iter().next())
                    .filter(|artist| !artist.is_empty());
            }
            "xesam:title" => metadata.title = non_empty(String::try_from(value).ok()),
            "xesam:url" => metadata.url = non_empty(String::try_from(value).ok()),
            // vlc:nowplaying and friends: a pre-formatted stream title.
            key if key.ends_with(":nowplaying") => {
                metadata.now_playing = non_empty(String::try_from(value).ok());
            }
            _ => {}
        }
    }
    metadata
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
