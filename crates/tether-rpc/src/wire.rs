//! Wire representation of daemon requests and responses.
//!
//! Torrent fields travel in camelCase while most session fields are
//! hyphenated; the structs below carry the renames so the domain types in
//! `tether-core` stay free of protocol spelling.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_core::{
    AddTorrent, AddTorrentSource, AddedTorrent, FilePriority, SessionSettings,
    SessionSettingsChangeset, SessionStats, Torrent, TorrentChangeset, TorrentFile,
    TorrentFileStats, TorrentFiles, TorrentId, TorrentStatus, TransferTotals,
};

use crate::error::{RpcError, RpcResult};

pub(crate) const TORRENT_GET: &str = "torrent-get";
pub(crate) const TORRENT_SET: &str = "torrent-set";
pub(crate) const TORRENT_ADD: &str = "torrent-add";
pub(crate) const TORRENT_REMOVE: &str = "torrent-remove";
pub(crate) const TORRENT_RENAME_PATH: &str = "torrent-rename-path";
pub(crate) const SESSION_GET: &str = "session-get";
pub(crate) const SESSION_SET: &str = "session-set";
pub(crate) const SESSION_STATS: &str = "session-stats";

/// Fields requested for the polled torrent list.
pub(crate) const TORRENT_LIST_FIELDS: &[&str] = &[
    "id",
    "name",
    "status",
    "isStalled",
    "metadataPercentComplete",
    "percentDone",
    "downloadedEver",
    "uploadedEver",
    "totalSize",
    "leftUntilDone",
    "rateDownload",
    "rateUpload",
    "peersConnected",
    "peersSendingToUs",
    "peersGettingFromUs",
    "eta",
    "uploadRatio",
    "queuePosition",
    "labels",
    "addedDate",
    "downloadDir",
    "errorString",
];

/// Fields requested when loading one torrent's file list.
pub(crate) const TORRENT_FILE_FIELDS: &[&str] = &["id", "files", "fileStats"];

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, A> {
    pub(crate) method: &'a str,
    pub(crate) arguments: &'a A,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    pub(crate) result: String,
    #[serde(default)]
    pub(crate) arguments: serde_json::Value,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct NoArguments {}

#[derive(Debug, Serialize)]
pub(crate) struct TorrentGetArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ids: Option<&'a [TorrentId]>,
    pub(crate) fields: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct IdsArgs<'a> {
    pub(crate) ids: &'a [TorrentId],
}

#[derive(Debug, Serialize)]
pub(crate) struct TorrentRemoveArgs<'a> {
    pub(crate) ids: &'a [TorrentId],
    #[serde(rename = "delete-local-data")]
    pub(crate) delete_local_data: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenamePathArgs<'a> {
    pub(crate) ids: [TorrentId; 1],
    pub(crate) path: &'a str,
    pub(crate) name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentGetResponse<T> {
    #[serde(default = "Vec::new")]
    pub(crate) torrents: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTorrent {
    id: TorrentId,
    #[serde(default)]
    name: String,
    status: i64,
    #[serde(default)]
    is_stalled: bool,
    #[serde(default = "complete_ratio")]
    metadata_percent_complete: f64,
    #[serde(default)]
    percent_done: f64,
    #[serde(default)]
    downloaded_ever: u64,
    #[serde(default)]
    uploaded_ever: u64,
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    left_until_done: u64,
    #[serde(default)]
    rate_download: u64,
    #[serde(default)]
    rate_upload: u64,
    #[serde(default)]
    peers_connected: u32,
    #[serde(default)]
    peers_sending_to_us: u32,
    #[serde(default)]
    peers_getting_from_us: u32,
    #[serde(default = "unknown_eta")]
    eta: i64,
    #[serde(default)]
    upload_ratio: f64,
    #[serde(default)]
    queue_position: i64,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    added_date: i64,
    #[serde(default)]
    download_dir: String,
    #[serde(default)]
    error_string: String,
}

const fn complete_ratio() -> f64 {
    1.0
}

const fn unknown_eta() -> i64 {
    -1
}

impl WireTorrent {
    pub(crate) fn into_torrent(self) -> RpcResult<Torrent> {
        let status = TorrentStatus::from_code(self.status).ok_or_else(|| RpcError::Malformed {
            method: TORRENT_GET,
            reason: format!("torrent {} has unknown status {}", self.id, self.status),
        })?;
        let added_at: Option<DateTime<Utc>> = (self.added_date > 0)
            .then(|| DateTime::from_timestamp(self.added_date, 0))
            .flatten();
        Ok(Torrent {
            id: self.id,
            name: self.name,
            status,
            is_stalled: self.is_stalled,
            metadata_percent_complete: self.metadata_percent_complete,
            percent_done: self.percent_done,
            downloaded_ever: self.downloaded_ever,
            uploaded_ever: self.uploaded_ever,
            total_size: self.total_size,
            left_until_done: self.left_until_done,
            rate_download: self.rate_download,
            rate_upload: self.rate_upload,
            peers_connected: self.peers_connected,
            peers_sending_to_us: self.peers_sending_to_us,
            peers_getting_from_us: self.peers_getting_from_us,
            eta: (self.eta >= 0).then_some(self.eta),
            upload_ratio: self.upload_ratio,
            queue_position: self.queue_position,
            labels: self.labels,
            added_at,
            download_dir: self.download_dir,
            error_string: self.error_string,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    name: String,
    #[serde(default)]
    length: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFileStats {
    #[serde(default)]
    bytes_completed: u64,
    #[serde(default)]
    wanted: bool,
    #[serde(default)]
    priority: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTorrentFiles {
    pub(crate) id: TorrentId,
    #[serde(default)]
    files: Vec<WireFile>,
    #[serde(default)]
    file_stats: Vec<WireFileStats>,
}

impl WireTorrentFiles {
    pub(crate) fn into_files(self) -> RpcResult<TorrentFiles> {
        let files = self
            .files
            .into_iter()
            .map(|file| TorrentFile {
                name: file.name,
                length: file.length,
            })
            .collect();
        let stats = self
            .file_stats
            .into_iter()
            .map(|stat| TorrentFileStats {
                bytes_completed: stat.bytes_completed,
                wanted: stat.wanted,
                priority: FilePriority::from_code(stat.priority),
            })
            .collect();
        TorrentFiles::new(files, stats).map_err(|err| RpcError::Malformed {
            method: TORRENT_GET,
            reason: format!("torrent {}: {err}", self.id),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireTotals {
    uploaded_bytes: u64,
    downloaded_bytes: u64,
    files_added: u64,
    session_count: u64,
    seconds_active: u64,
}

impl From<WireTotals> for TransferTotals {
    fn from(value: WireTotals) -> Self {
        Self {
            uploaded_bytes: value.uploaded_bytes,
            downloaded_bytes: value.downloaded_bytes,
            files_added: value.files_added,
            session_count: value.session_count,
            seconds_active: value.seconds_active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSessionStats {
    active_torrent_count: u32,
    paused_torrent_count: u32,
    #[serde(default)]
    torrent_count: u32,
    #[serde(default)]
    download_speed: u64,
    #[serde(default)]
    upload_speed: u64,
    #[serde(rename = "cumulative-stats", default)]
    cumulative: WireTotals,
    #[serde(rename = "current-stats", default)]
    current: WireTotals,
}

impl From<WireSessionStats> for SessionStats {
    fn from(value: WireSessionStats) -> Self {
        Self {
            active_torrent_count: value.active_torrent_count,
            paused_torrent_count: value.paused_torrent_count,
            torrent_count: value.torrent_count,
            download_speed: value.download_speed,
            upload_speed: value.upload_speed,
            cumulative: value.cumulative.into(),
            current: value.current.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub(crate) struct WireSessionSettings {
    download_dir: String,
    speed_limit_down: u64,
    speed_limit_down_enabled: bool,
    speed_limit_up: u64,
    speed_limit_up_enabled: bool,
    alt_speed_enabled: bool,
    alt_speed_down: u64,
    alt_speed_up: u64,
    peer_limit_global: u32,
    peer_limit_per_torrent: u32,
    #[serde(rename = "seedRatioLimit")]
    seed_ratio_limit: f64,
    #[serde(rename = "seedRatioLimited")]
    seed_ratio_limited: bool,
    peer_port: u16,
    start_added_torrents: bool,
    download_queue_size: u32,
    download_queue_enabled: bool,
    version: String,
    rpc_version: u32,
}

impl From<WireSessionSettings> for SessionSettings {
    fn from(value: WireSessionSettings) -> Self {
        Self {
            download_dir: value.download_dir,
            speed_limit_down: value.speed_limit_down,
            speed_limit_down_enabled: value.speed_limit_down_enabled,
            speed_limit_up: value.speed_limit_up,
            speed_limit_up_enabled: value.speed_limit_up_enabled,
            alt_speed_enabled: value.alt_speed_enabled,
            alt_speed_down: value.alt_speed_down,
            alt_speed_up: value.alt_speed_up,
            peer_limit_global: value.peer_limit_global,
            peer_limit_per_torrent: value.peer_limit_per_torrent,
            seed_ratio_limit: value.seed_ratio_limit,
            seed_ratio_limited: value.seed_ratio_limited,
            peer_port: value.peer_port,
            start_added_torrents: value.start_added_torrents,
            download_queue_size: value.download_queue_size,
            download_queue_enabled: value.download_queue_enabled,
            version: value.version,
            rpc_version: value.rpc_version,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct SessionSetArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    download_dir: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed_limit_down: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed_limit_down_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed_limit_up: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed_limit_up_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alt_speed_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alt_speed_down: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alt_speed_up: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_limit_global: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_limit_per_torrent: Option<u32>,
    #[serde(rename = "seedRatioLimit", skip_serializing_if = "Option::is_none")]
    seed_ratio_limit: Option<f64>,
    #[serde(rename = "seedRatioLimited", skip_serializing_if = "Option::is_none")]
    seed_ratio_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_added_torrents: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_queue_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_queue_enabled: Option<bool>,
}

impl<'a> From<&'a SessionSettingsChangeset> for SessionSetArgs<'a> {
    fn from(value: &'a SessionSettingsChangeset) -> Self {
        Self {
            download_dir: value.download_dir.as_deref(),
            speed_limit_down: value.speed_limit_down,
            speed_limit_down_enabled: value.speed_limit_down_enabled,
            speed_limit_up: value.speed_limit_up,
            speed_limit_up_enabled: value.speed_limit_up_enabled,
            alt_speed_enabled: value.alt_speed_enabled,
            alt_speed_down: value.alt_speed_down,
            alt_speed_up: value.alt_speed_up,
            peer_limit_global: value.peer_limit_global,
            peer_limit_per_torrent: value.peer_limit_per_torrent,
            seed_ratio_limit: value.seed_ratio_limit,
            seed_ratio_limited: value.seed_ratio_limited,
            peer_port: value.peer_port,
            start_added_torrents: value.start_added_torrents,
            download_queue_size: value.download_queue_size,
            download_queue_enabled: value.download_queue_enabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TorrentSetArgs<'a> {
    ids: &'a [TorrentId],
    #[serde(rename = "files-wanted", skip_serializing_if = "Vec::is_empty")]
    files_wanted: Vec<usize>,
    #[serde(rename = "files-unwanted", skip_serializing_if = "Vec::is_empty")]
    files_unwanted: Vec<usize>,
    #[serde(rename = "priority-high", skip_serializing_if = "Vec::is_empty")]
    priority_high: Vec<usize>,
    #[serde(rename = "priority-normal", skip_serializing_if = "Vec::is_empty")]
    priority_normal: Vec<usize>,
    #[serde(rename = "priority-low", skip_serializing_if = "Vec::is_empty")]
    priority_low: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
    #[serde(rename = "downloadLimit", skip_serializing_if = "Option::is_none")]
    download_limit: Option<u64>,
    #[serde(rename = "downloadLimited", skip_serializing_if = "Option::is_none")]
    download_limited: Option<bool>,
    #[serde(rename = "uploadLimit", skip_serializing_if = "Option::is_none")]
    upload_limit: Option<u64>,
    #[serde(rename = "uploadLimited", skip_serializing_if = "Option::is_none")]
    upload_limited: Option<bool>,
    #[serde(rename = "bandwidthPriority", skip_serializing_if = "Option::is_none")]
    bandwidth_priority: Option<i64>,
}

impl<'a> TorrentSetArgs<'a> {
    pub(crate) fn new(ids: &'a [TorrentId], changes: &TorrentChangeset) -> Self {
        Self {
            ids,
            files_wanted: changes.files_wanted.clone(),
            files_unwanted: changes.files_unwanted.clone(),
            priority_high: changes.priority_high.clone(),
            priority_normal: changes.priority_normal.clone(),
            priority_low: changes.priority_low.clone(),
            labels: changes.labels.clone(),
            download_limit: changes.bandwidth.download_limit,
            download_limited: changes.bandwidth.download_limited,
            upload_limit: changes.bandwidth.upload_limit,
            upload_limited: changes.bandwidth.upload_limited,
            bandwidth_priority: changes.bandwidth.bandwidth_priority.map(FilePriority::code),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TorrentAddArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metainfo: Option<String>,
    #[serde(rename = "download-dir", skip_serializing_if = "Option::is_none")]
    download_dir: Option<&'a str>,
    paused: bool,
}

impl<'a> From<&'a AddTorrent> for TorrentAddArgs<'a> {
    fn from(value: &'a AddTorrent) -> Self {
        let (filename, metainfo) = match &value.source {
            AddTorrentSource::Link { uri } => (Some(uri.as_str()), None),
            AddTorrentSource::Metainfo { bytes } => (None, Some(STANDARD.encode(bytes))),
        };
        Self {
            filename,
            metainfo,
            download_dir: value.download_dir.as_deref(),
            paused: value.paused,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAddedTorrent {
    id: TorrentId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    hash_string: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentAddResponse {
    #[serde(rename = "torrent-added")]
    added: Option<WireAddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    duplicate: Option<WireAddedTorrent>,
}

impl TorrentAddResponse {
    pub(crate) fn into_added(self) -> RpcResult<AddedTorrent> {
        let (torrent, duplicate) = match (self.added, self.duplicate) {
            (Some(torrent), _) => (torrent, false),
            (None, Some(torrent)) => (torrent, true),
            (None, None) => {
                return Err(RpcError::Malformed {
                    method: TORRENT_ADD,
                    reason: "response names neither an added nor a duplicate torrent".into(),
                });
            }
        };
        Ok(AddedTorrent {
            id: torrent.id,
            name: torrent.name,
            hash_string: torrent.hash_string,
            duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::{BandwidthLimits, StatusCategory};

    #[test]
    fn torrent_decodes_sentinels() -> anyhow::Result<()> {
        let wire: WireTorrent = serde_json::from_value(json!({
            "id": 7,
            "name": "debian.iso",
            "status": 4,
            "metadataPercentComplete": 0.5,
            "eta": -1,
            "addedDate": 0,
            "labels": ["linux"]
        }))?;
        let torrent = wire.into_torrent()?;
        assert_eq!(torrent.status, TorrentStatus::Downloading);
        assert_eq!(torrent.category(), StatusCategory::Metadata);
        assert_eq!(torrent.eta, None);
        assert_eq!(torrent.added_at, None);
        assert_eq!(torrent.labels, ["linux"]);
        Ok(())
    }

    #[test]
    fn unknown_status_is_malformed() -> anyhow::Result<()> {
        let wire: WireTorrent = serde_json::from_value(json!({"id": 1, "status": 42}))?;
        let err = wire.into_torrent().expect_err("status 42 is not defined");
        assert!(matches!(err, RpcError::Malformed { .. }));
        Ok(())
    }

    #[test]
    fn misaligned_file_arrays_are_malformed() -> anyhow::Result<()> {
        let wire: WireTorrentFiles = serde_json::from_value(json!({
            "id": 3,
            "files": [{"name": "a", "length": 1, "bytesCompleted": 0}],
            "fileStats": []
        }))?;
        assert!(matches!(
            wire.into_files(),
            Err(RpcError::Malformed { .. })
        ));
        Ok(())
    }

    #[test]
    fn torrent_set_uses_protocol_keys() -> anyhow::Result<()> {
        let mut changes = TorrentChangeset::wanted(vec![0, 2], false);
        changes.bandwidth = BandwidthLimits {
            download_limit: Some(500),
            download_limited: Some(true),
            bandwidth_priority: Some(FilePriority::High),
            ..BandwidthLimits::default()
        };
        let value = serde_json::to_value(TorrentSetArgs::new(&[5], &changes))?;
        assert_eq!(
            value,
            json!({
                "ids": [5],
                "files-unwanted": [0, 2],
                "downloadLimit": 500,
                "downloadLimited": true,
                "bandwidthPriority": 1
            })
        );
        Ok(())
    }

    #[test]
    fn session_set_mixes_key_styles() -> anyhow::Result<()> {
        let changes = SessionSettingsChangeset {
            speed_limit_down: Some(100),
            seed_ratio_limit: Some(2.0),
            ..SessionSettingsChangeset::default()
        };
        let value = serde_json::to_value(SessionSetArgs::from(&changes))?;
        assert_eq!(
            value,
            json!({"speed-limit-down": 100, "seedRatioLimit": 2.0})
        );
        Ok(())
    }

    #[test]
    fn add_response_flags_duplicates() -> anyhow::Result<()> {
        let response: TorrentAddResponse = serde_json::from_value(json!({
            "torrent-duplicate": {"id": 9, "name": "dup", "hashString": "abc"}
        }))?;
        let added = response.into_added()?;
        assert!(added.duplicate);
        assert_eq!(added.id, 9);
        Ok(())
    }

    #[test]
    fn metainfo_is_base64_encoded() -> anyhow::Result<()> {
        let request = AddTorrent {
            label: "file.torrent".into(),
            source: AddTorrentSource::Metainfo {
                bytes: b"d4:infoe".to_vec(),
            },
            download_dir: Some("/data".into()),
            paused: true,
        };
        let value = serde_json::to_value(TorrentAddArgs::from(&request))?;
        assert_eq!(
            value,
            json!({"metainfo": "ZDQ6aW5mb2U=", "download-dir": "/data", "paused": true})
        );
        Ok(())
    }
}
