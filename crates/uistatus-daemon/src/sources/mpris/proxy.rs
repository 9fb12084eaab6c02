//! Typed proxy for org.mpris.MediaPlayer2.Player.
//!
//! No default destination: every proxy is built against the unique owner
//! name of one connection, so a bus name being re-acquired by another
//! process can never cross wires.

use std::collections::HashMap;

use zbus::zvariant::OwnedValue;

#[zbus::proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2",
    gen_blocking = false
)]
pub trait Player {
    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn volume(&self) -> zbus::Result<f64>;

    #[zbus(signal)]
    fn seeked(&self, position: i64) -> zbus::Result<()>;
}
