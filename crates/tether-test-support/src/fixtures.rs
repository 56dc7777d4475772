//! Sample domain values for tests.

use tether_core::{
    FilePriority, Scheme, ServerEndpoint, SessionSettings, SessionStats, Torrent, TorrentFile,
    TorrentFileStats, TorrentFiles, TorrentId, TorrentStatus,
};

/// A downloading torrent with neutral counters.
#[must_use]
pub fn torrent(id: TorrentId, name: &str) -> Torrent {
    Torrent {
        id,
        name: name.to_string(),
        status: TorrentStatus::Downloading,
        is_stalled: false,
        metadata_percent_complete: 1.0,
        percent_done: 0.25,
        downloaded_ever: 0,
        uploaded_ever: 0,
        total_size: 1_000,
        left_until_done: 750,
        rate_download: 0,
        rate_upload: 0,
        peers_connected: 0,
        peers_sending_to_us: 0,
        peers_getting_from_us: 0,
        eta: None,
        upload_ratio: 0.0,
        queue_position: id,
        labels: Vec::new(),
        added_at: None,
        download_dir: "/downloads".to_string(),
        error_string: String::new(),
    }
}

/// A torrent with the given status.
#[must_use]
pub fn torrent_with_status(id: TorrentId, name: &str, status: TorrentStatus) -> Torrent {
    Torrent {
        status,
        ..torrent(id, name)
    }
}

/// A fully downloaded torrent.
#[must_use]
pub fn completed_torrent(id: TorrentId, name: &str) -> Torrent {
    Torrent {
        status: TorrentStatus::Seeding,
        percent_done: 1.0,
        left_until_done: 0,
        ..torrent(id, name)
    }
}

/// `count` wanted, normal-priority files under a `name/` root.
#[must_use]
pub fn files(name: &str, count: usize) -> TorrentFiles {
    let files = (0..count)
        .map(|index| TorrentFile {
            name: format!("{name}/part-{index}.bin"),
            length: 100,
        })
        .collect();
    let stats = (0..count)
        .map(|_| TorrentFileStats {
            bytes_completed: 0,
            wanted: true,
            priority: FilePriority::Normal,
        })
        .collect();
    TorrentFiles::new(files, stats).unwrap_or_default()
}

/// A plain-HTTP server profile on the default port.
#[must_use]
pub fn server(name: &str) -> ServerEndpoint {
    ServerEndpoint {
        name: name.to_string(),
        host: format!("{name}.local"),
        port: 9091,
        scheme: Scheme::Http,
        rpc_path: "/transmission/rpc".to_string(),
        credentials: None,
    }
}

/// Aggregate statistics with the given active and paused counts.
#[must_use]
pub fn stats(active: u32, paused: u32) -> SessionStats {
    SessionStats {
        active_torrent_count: active,
        paused_torrent_count: paused,
        torrent_count: active + paused,
        ..SessionStats::default()
    }
}

/// Daemon settings with a few distinguishable values.
#[must_use]
pub fn settings() -> SessionSettings {
    SessionSettings {
        download_dir: "/downloads".to_string(),
        speed_limit_down: 1_000,
        speed_limit_up: 500,
        peer_limit_global: 200,
        peer_port: 51_413,
        version: "4.0.5".to_string(),
        rpc_version: 17,
        ..SessionSettings::default()
    }
}
