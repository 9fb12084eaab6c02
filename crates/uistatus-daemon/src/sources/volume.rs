//! Default-sink volume via pactl.
//!
//! `pactl subscribe` is kept running as a child process; every sink event
//! triggers a re-query of the default sink so we never parse event payloads,
//! only the stable `get-sink-volume` / `get-sink-mute` output.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use uistatus_core::StatusUpdate;

const ICON_MUTED: &str = "🔇";
const ICON_RAMP: [&str; 6] = ["🔈", "🔈", "🔉", "🔉", "🔊", "🔊"];

/// `volume` (icon + right-aligned percentage) and `rawvolume` (bare value,
/// `!`-suffixed when muted).
pub async fn volume(tx: UnboundedSender<StatusUpdate>, cancel: CancellationToken) {
    let mut child = match Command::new("pactl")
        .arg("subscribe")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            error!("starting pactl subscribe failed: {err}");
            return;
        }
    };
    let Some(stdout) = child.stdout.take() else {
        error!("pactl subscribe has no stdout");
        return;
    };
    let mut lines = BufReader::new(stdout).lines();

    // Initial reading so the store has a value before any event fires.
    emit_volume(&tx).await;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if is_sink_event(&line) {
                        emit_volume(&tx).await;
                    }
                }
                Ok(None) => {
                    warn!("pactl subscribe stream ended");
                    break;
                }
                Err(err) => {
                    warn!("pactl subscribe read failed: {err}");
                    break;
                }
            },
            _ = cancel.cancelled() => break,
        }
    }
    let _ = child.kill().await;
}

async fn emit_volume(tx: &UnboundedSender<StatusUpdate>) {
    let Some(volume_out) = pactl(&["get-sink-volume", "@DEFAULT_SINK@"]).await else {
        return;
    };
    let Some(mute_out) = pactl(&["get-sink-mute", "@DEFAULT_SINK@"]).await else {
        return;
    };
    let (Some(value), Some(mute)) = (parse_volume(&volume_out), parse_mute(&mute_out)) else {
        warn!("unparseable pactl sink output");
        return;
    };
    let _ = tx.send(StatusUpdate::text_only("rawvolume", raw_text(value, mute)));
    let _ = tx.send(StatusUpdate::new(
        "volume",
        volume_icon(value, mute),
        format!("{value:>3}%"),
    ));
}

async fn pactl(args: &[&str]) -> Option<String> {
    let output = Command::new("pactl").args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Matches "Event 'change' on sink #47" but not sink-input events.
fn is_sink_event(line: &str) -> bool {
    line.contains("on sink ")
}

/// First percentage token of `get-sink-volume` output.
fn parse_volume(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|digits| digits.parse().ok())
}

fn parse_mute(output: &str) -> Option<bool> {
    let (_, rest) = output.split_once("Mute:")?;
    Some(rest.trim_start().starts_with("yes"))
}

fn volume_icon(value: u32, mute: bool) -> &'static str {
    if mute {
        return ICON_MUTED;
    }
    let pos = value as usize * ICON_RAMP.len() / 100;
    ICON_RAMP[pos.min(ICON_RAMP.len() - 1)]
}

fn raw_text(value: u32, mute: bool) -> String {
    if mute {
        format!("{value}!")
    } else {
        value.to_string()
    }
}
