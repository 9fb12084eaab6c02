//! Procfs pollers: cpu, load average, memory/swap, network throughput.
//!
//! Each poller is one task on a fixed interval. The first tick fires
//! immediately so the store gets a value right after startup. Parsing is
//! split out into pure functions so the formats can be tested without
//! touching /proc.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use uistatus_core::StatusUpdate;

const STAT_PATH: &str = "/proc/stat";
const LOADAVG_PATH: &str = "/proc/loadavg";
const MEMINFO_PATH: &str = "/proc/meminfo";
const NET_DEV_PATH: &str = "/proc/net/dev";

const CPU_INTERVAL: Duration = Duration::from_secs(1);
const LOAD_INTERVAL: Duration = Duration::from_secs(10);
const MEM_INTERVAL: Duration = Duration::from_secs(5);
const NET_INTERVAL: Duration = Duration::from_secs(1);

/// Aggregate cpu time counters from the first line of /proc/stat, in jiffies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "cpu" {
        return None;
    }
    let values: Vec<u64> = parts.map(str::parse).collect::<Result<_, _>>().ok()?;
    if values.len() < 4 {
        return None;
    }
    Some(CpuTimes {
        idle: values[3],
        total: values.iter().sum(),
    })
}

/// Busy fraction over the window between two samples. `None` when the
/// counters did not advance (a sub-jiffy poll window).
fn busy_fraction(prev: CpuTimes, cur: CpuTimes) -> Option<f64> {
    let total = cur.total.checked_sub(prev.total)?;
    if total == 0 {
        return None;
    }
    let idle = cur.idle.saturating_sub(prev.idle);
    Some(1.0 - idle as f64 / total as f64)
}

/// Right-aligned percentage, e.g. `" 25%"`.
fn format_percent(fraction: f64) -> String {
    format!("{:>3.0}%", fraction * 100.0)
}

/// `cpupercent`: busy percentage over the last second. The first sample is
/// measured against zeroed counters, i.e. busy-since-boot.
pub async fn cpu_percent(tx: UnboundedSender<StatusUpdate>, cancel: CancellationToken) {
    let mut prev = CpuTimes::default();
    let mut ticker = tokio::time::interval(CPU_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        let content = match tokio::fs::read_to_string(STAT_PATH).await {
            Ok(content) => content,
            Err(err) => {
                warn!("reading {STAT_PATH} failed: {err}");
                continue;
            }
        };
        let Some(cur) = parse_cpu_line(content.lines().next().unwrap_or_default()) else {
            continue;
        };
        if let Some(fraction) = busy_fraction(prev, cur) {
            let _ = tx.send(StatusUpdate::text_only("cpupercent", format_percent(fraction)));
        }
        prev = cur;
    }
}

fn parse_loadavg(content: &str) -> Option<String> {
    let mut parts = content.split_whitespace();
    let (one, five, fifteen) = (parts.next()?, parts.next()?, parts.next()?);
    Some(format!("{one} {five} {fifteen}"))
}

/// `loadavg`: the three load averages, verbatim.
pub async fn load_avg(tx: UnboundedSender<StatusUpdate>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(LOAD_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        match tokio::fs::read_to_string(LOADAVG_PATH).await {
            Ok(content) => {
                if let Some(text) = parse_loadavg(&content) {
                    let _ = tx.send(StatusUpdate::text_only("loadavg", text));
                }
            }
            Err(err) => warn!("reading {LOADAVG_PATH} failed: {err}"),
        }
    }
}

/// The four /proc/meminfo fields the memory poller needs, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MemInfo {
    mem_total: u64,
    mem_available: u64,
    swap_total: u64,
    swap_free: u64,
}

fn parse_meminfo(content: &str) -> Option<MemInfo> {
    let mut info = MemInfo::default();
    let mut seen = 0;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse() else { continue };
        match key {
            "MemTotal:" => info.mem_total = value,
            "MemAvailable:" => info.mem_available = value,
            "SwapTotal:" => info.swap_total = value,
            "SwapFree:" => info.swap_free = value,
            _ => continue,
        }
        seen += 1;
    }
    (seen == 4).then_some(info)
}

/// `mempercent` and `swapused`, every five seconds.
pub async fn memory(tx: UnboundedSender<StatusUpdate>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(MEM_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        let content = match tokio::fs::read_to_string(MEMINFO_PATH).await {
            Ok(content) => content,
            Err(err) => {
                warn!("reading {MEMINFO_PATH} failed: {err}");
                continue;
            }
        };
        let Some(info) = parse_meminfo(&content) else {
            continue;
        };
        if info.mem_total > 0 {
            let used = info.mem_total.saturating_sub(info.mem_available);
            let fraction = used as f64 / info.mem_total as f64;
            let _ = tx.send(StatusUpdate::text_only("mempercent", format_percent(fraction)));
        }
        let swap_mib = info.swap_total.saturating_sub(info.swap_free) as f64 / 1024.0;
        let _ = tx.send(StatusUpdate::text_only(
            "swapused",
            format!("{swap_mib:>3.0} MiB"),
        ));
    }
}

/// Cumulative byte counters for the first external interface.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetDev {
    device: String,
    down: u64,
    up: u64,
}

fn parse_net_dev(content: &str) -> Option<NetDev> {
    for line in content.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 10 {
            continue;
        }
        let Some(device) = tokens[0].strip_suffix(':') else {
            continue;
        };
        if device == "lo" {
            continue;
        }
        let down = tokens[1].parse().ok()?;
        let up = tokens[9].parse().ok()?;
        return Some(NetDev {
            device: device.to_string(),
            down,
            up,
        });
    }
    None
}

fn format_speed(kib_per_sec: f64) -> String {
    format!("{kib_per_sec:>4.1} KiB/s")
}

fn format_total(bytes: u64) -> String {
    format!("{:>4.1} MiB", bytes as f64 / 1024.0 / 1024.0)
}

/// `device`, `downspeed`, `downtotal`, `upspeed`, `uptotal` for the first
/// non-loopback interface, every second.
pub async fn network(tx: UnboundedSender<StatusUpdate>, cancel: CancellationToken) {
    let mut prev_down = 0u64;
    let mut prev_up = 0u64;
    let mut ticker = tokio::time::interval(NET_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        let content = match tokio::fs::read_to_string(NET_DEV_PATH).await {
            Ok(content) => content,
            Err(err) => {
                warn!("reading {NET_DEV_PATH} failed: {err}");
                continue;
            }
        };
        let Some(dev) = parse_net_dev(&content) else {
            continue;
        };
        let down_kib = dev.down.saturating_sub(prev_down) as f64 / 1024.0;
        let up_kib = dev.up.saturating_sub(prev_up) as f64 / 1024.0;
        prev_down = dev.down;
        prev_up = dev.up;

        let _ = tx.send(StatusUpdate::text_only("device", dev.device.clone()));
        let _ = tx.send(StatusUpdate::text_only("downspeed", format_speed(down_kib)));
        let _ = tx.send(StatusUpdate::text_only("downtotal", format_total(dev.down)));
        let _ = tx.send(StatusUpdate::text_only("upspeed", format_speed(up_kib)));
        let _ = tx.send(StatusUpdate::text_only("uptotal", format_total(dev.up)));
    }
}
