//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use serde::Serialize;
use tether_config::ServerProfile;
use tether_core::{
    BatchSummary, FilePriority, SessionSettings, SessionStats, Torrent, TorrentFiles, TorrentId,
};
use tether_events::{Event, EventEnvelope};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn render_torrent_list(
    torrents: &[&Torrent],
    stats: Option<&SessionStats>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(torrents)?),
        OutputFormat::Table => {
            println!(
                "{:>6} {:<11} {:>6} {:>10} {:>10} {:>6} NAME",
                "ID", "STATUS", "PROG", "DOWN", "UP", "RATIO"
            );
            for torrent in torrents {
                println!("{}", torrent_row(torrent));
            }
            if let Some(stats) = stats {
                println!("{}", stats_line(stats));
            }
        }
    }
    Ok(())
}

fn torrent_row(torrent: &Torrent) -> String {
    format!(
        "{:>6} {:<11} {:>6} {:>10} {:>10} {:>6} {}",
        torrent.id,
        torrent.category().as_str(),
        format_percent(torrent.percent_done),
        format_rate(torrent.rate_download),
        format_rate(torrent.rate_upload),
        format_ratio(torrent.upload_ratio),
        torrent.name
    )
}

fn stats_line(stats: &SessionStats) -> String {
    format!(
        "{} torrents ({} active, {} paused); down {} / up {}",
        stats.torrent_count,
        stats.active_torrent_count,
        stats.paused_torrent_count,
        format_rate(stats.download_speed),
        format_rate(stats.upload_speed)
    )
}

#[derive(Serialize)]
struct FileRow<'a> {
    index: usize,
    name: &'a str,
    length: u64,
    bytes_completed: u64,
    wanted: bool,
    priority: FilePriority,
}

pub(crate) fn render_files(
    torrent_id: TorrentId,
    files: &TorrentFiles,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = files
                .files()
                .iter()
                .zip(files.stats())
                .enumerate()
                .map(|(index, (file, stat))| FileRow {
                    index,
                    name: &file.name,
                    length: file.length,
                    bytes_completed: stat.bytes_completed,
                    wanted: stat.wanted,
                    priority: stat.priority,
                })
                .collect();
            println!("{}", to_json(&rows)?);
        }
        OutputFormat::Table => {
            if files.is_empty() {
                println!("torrent {torrent_id} has no files yet");
                return Ok(());
            }
            println!(
                "{:>5} {:>10} {:>6} {:<4} {:<8} PATH",
                "INDEX", "SIZE", "DONE", "WANT", "PRIORITY"
            );
            for (index, (file, stat)) in files.files().iter().zip(files.stats()).enumerate() {
                println!(
                    "{:>5} {:>10} {:>6} {:<4} {:<8} {}",
                    index,
                    format_bytes(file.length),
                    format_percent(completion(stat.bytes_completed, file.length)),
                    if stat.wanted { "yes" } else { "no" },
                    format_priority(stat.priority),
                    file.name
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_settings(settings: &SessionSettings, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(settings)?),
        OutputFormat::Table => {
            for (key, value) in settings_rows(settings) {
                println!("{key:<24} {value}");
            }
        }
    }
    Ok(())
}

fn settings_rows(settings: &SessionSettings) -> Vec<(&'static str, String)> {
    vec![
        (
            "version",
            format!("{} (rpc {})", settings.version, settings.rpc_version),
        ),
        ("download-dir", settings.download_dir.clone()),
        (
            "speed-limit-down",
            format_limit(settings.speed_limit_down, settings.speed_limit_down_enabled),
        ),
        (
            "speed-limit-up",
            format_limit(settings.speed_limit_up, settings.speed_limit_up_enabled),
        ),
        (
            "alt-speed",
            format!(
                "{} (down {} KB/s, up {} KB/s)",
                on_off(settings.alt_speed_enabled),
                settings.alt_speed_down,
                settings.alt_speed_up
            ),
        ),
        ("peer-limit-global", settings.peer_limit_global.to_string()),
        (
            "peer-limit-per-torrent",
            settings.peer_limit_per_torrent.to_string(),
        ),
        ("peer-port", settings.peer_port.to_string()),
        (
            "seed-ratio-limit",
            if settings.seed_ratio_limited {
                format!("{:.2}", settings.seed_ratio_limit)
            } else {
                "off".to_string()
            },
        ),
        (
            "start-added-torrents",
            on_off(settings.start_added_torrents).to_string(),
        ),
        (
            "download-queue",
            if settings.download_queue_enabled {
                settings.download_queue_size.to_string()
            } else {
                "off".to_string()
            },
        ),
    ]
}

pub(crate) fn render_batch(summary: &BatchSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(summary)?),
        OutputFormat::Table => {
            println!("{}", summary.brief());
            for line in summary.details() {
                println!("  {line}");
            }
        }
    }
    Ok(())
}

/// Profile view that never exposes the stored password.
#[derive(Serialize)]
struct ServerRow<'a> {
    name: &'a str,
    url: String,
    username: Option<&'a str>,
    has_password: bool,
    active: bool,
}

pub(crate) fn render_servers(
    servers: &[ServerProfile],
    active: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    let rows: Vec<_> = servers
        .iter()
        .map(|profile| ServerRow {
            name: &profile.name,
            url: format!(
                "{}://{}:{}{}",
                profile.scheme.as_str(),
                profile.host,
                profile.port,
                profile.rpc_path
            ),
            username: profile.username.as_deref(),
            has_password: profile.password.is_some(),
            active: active == Some(profile.name.as_str()),
        })
        .collect();
    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)?),
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("no server profiles (add one with `tether servers add`)");
                return Ok(());
            }
            for row in rows {
                let marker = if row.active { '*' } else { ' ' };
                let user = row.username.unwrap_or("-");
                println!("{marker} {:<16} {:<40} {user}", row.name, row.url);
            }
        }
    }
    Ok(())
}

/// One line per alert, suitable for stderr.
pub(crate) fn format_alert(envelope: &EventEnvelope) -> Option<String> {
    match &envelope.event {
        Event::ConnectionLost {
            server,
            consecutive_unauthorized,
        } => Some(format!(
            "connection to {server} lost after {consecutive_unauthorized} rejected polls"
        )),
        Event::ConnectionRestored { server } => Some(format!("connection to {server} restored")),
        Event::MutationFailed {
            action,
            brief,
            detail,
            ..
        } => Some(format!("{action}: {brief} ({detail})")),
        Event::BatchFailed {
            action,
            brief,
            detail,
            ..
        } => Some(format!("{action}: {brief}\n{detail}")),
        _ => None,
    }
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut unit = 0;
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub(crate) fn format_rate(bytes_per_second: u64) -> String {
    if bytes_per_second == 0 {
        "-".to_string()
    } else {
        format!("{}/s", format_bytes(bytes_per_second))
    }
}

fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn format_ratio(ratio: f64) -> String {
    if ratio < 0.0 {
        "-".to_string()
    } else {
        format!("{ratio:.2}")
    }
}

fn format_limit(limit: u64, enabled: bool) -> String {
    if enabled {
        format!("{limit} KB/s")
    } else {
        "unlimited".to_string()
    }
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

#[allow(clippy::cast_precision_loss)]
fn completion(done: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}

pub(crate) const fn format_priority(priority: FilePriority) -> &'static str {
    match priority {
        FilePriority::Low => "low",
        FilePriority::Normal => "normal",
        FilePriority::High => "high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tether_core::TransmissionResponse;
    use tether_test_support::fixtures;

    #[test]
    fn byte_formatting_picks_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1_536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
        assert_eq!(format_rate(0), "-");
        assert_eq!(format_rate(2_048), "2.0 KiB/s");
    }

    #[test]
    fn torrent_rows_show_category_and_progress() {
        let mut torrent = fixtures::torrent(7, "ubuntu.iso");
        torrent.percent_done = 0.25;
        torrent.upload_ratio = -1.0;
        let row = torrent_row(&torrent);
        assert!(row.contains("25.0%"));
        assert!(row.contains(torrent.category().as_str()));
        assert!(row.ends_with("ubuntu.iso"));
    }

    #[test]
    fn disabled_limits_read_as_unlimited() {
        let settings = fixtures::settings();
        let rows = settings_rows(&SessionSettings {
            speed_limit_down: 500,
            speed_limit_down_enabled: false,
            ..settings
        });
        let (_, value) = rows
            .iter()
            .find(|(key, _)| *key == "speed-limit-down")
            .expect("row present");
        assert_eq!(value, "unlimited");
    }

    #[test]
    fn only_alerts_are_formatted() {
        let failed = EventEnvelope {
            id: 1,
            timestamp: Utc::now(),
            event: Event::MutationFailed {
                action: "rename".into(),
                outcome: TransmissionResponse::Failed,
                brief: "Rename failed".into(),
                detail: "the daemon did not respond".into(),
            },
        };
        let line = format_alert(&failed).expect("alert line");
        assert!(line.starts_with("rename: Rename failed"));

        let refreshed = EventEnvelope {
            id: 2,
            timestamp: Utc::now(),
            event: Event::TorrentsRefreshed { count: 3 },
        };
        assert!(format_alert(&refreshed).is_none());
    }

    #[test]
    fn empty_files_count_as_complete() {
        assert!((completion(0, 0) - 1.0).abs() < f64::EPSILON);
        assert!((completion(50, 200) - 0.25).abs() < f64::EPSILON);
    }
}
