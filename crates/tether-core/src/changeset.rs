//! Sparse mutation payloads.
//!
//! # Design
//! - A changeset carries only the fields that should change; unset fields are
//!   left alone by the daemon.
//! - Session settings changesets are derived by diffing the desired settings
//!   against the last-known server values, so unchanged fields never travel.

use serde::{Deserialize, Serialize};

use crate::model::{FilePriority, SessionSettings};

/// Per-torrent bandwidth knobs applied through `torrent-set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthLimits {
    /// Download cap in KB/s.
    pub download_limit: Option<u64>,
    /// Whether the download cap is enforced.
    pub download_limited: Option<bool>,
    /// Upload cap in KB/s.
    pub upload_limit: Option<u64>,
    /// Whether the upload cap is enforced.
    pub upload_limited: Option<bool>,
    /// Bandwidth priority relative to other torrents.
    pub bandwidth_priority: Option<FilePriority>,
}

impl BandwidthLimits {
    /// Whether no knob is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.download_limit.is_none()
            && self.download_limited.is_none()
            && self.upload_limit.is_none()
            && self.upload_limited.is_none()
            && self.bandwidth_priority.is_none()
    }
}

/// Arguments for one `torrent-set` call, minus the target ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentChangeset {
    /// File indices to mark wanted.
    pub files_wanted: Vec<usize>,
    /// File indices to mark unwanted.
    pub files_unwanted: Vec<usize>,
    /// File indices to raise to high priority.
    pub priority_high: Vec<usize>,
    /// File indices to set to normal priority.
    pub priority_normal: Vec<usize>,
    /// File indices to lower to low priority.
    pub priority_low: Vec<usize>,
    /// Replacement label set.
    pub labels: Option<Vec<String>>,
    /// Bandwidth knobs.
    pub bandwidth: BandwidthLimits,
}

impl TorrentChangeset {
    /// Mark the given files wanted or unwanted.
    #[must_use]
    pub fn wanted(indices: Vec<usize>, wanted: bool) -> Self {
        if wanted {
            Self {
                files_wanted: indices,
                ..Self::default()
            }
        } else {
            Self {
                files_unwanted: indices,
                ..Self::default()
            }
        }
    }

    /// Set one priority on every given file.
    #[must_use]
    pub fn priority(indices: Vec<usize>, priority: FilePriority) -> Self {
        match priority {
            FilePriority::High => Self {
                priority_high: indices,
                ..Self::default()
            },
            FilePriority::Normal => Self {
                priority_normal: indices,
                ..Self::default()
            },
            FilePriority::Low => Self {
                priority_low: indices,
                ..Self::default()
            },
        }
    }

    /// Replace the label set.
    #[must_use]
    pub fn labels(labels: Vec<String>) -> Self {
        Self {
            labels: Some(labels),
            ..Self::default()
        }
    }

    /// Apply bandwidth knobs.
    #[must_use]
    pub fn bandwidth(limits: BandwidthLimits) -> Self {
        Self {
            bandwidth: limits,
            ..Self::default()
        }
    }

    /// Whether the changeset would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_wanted.is_empty()
            && self.files_unwanted.is_empty()
            && self.priority_high.is_empty()
            && self.priority_normal.is_empty()
            && self.priority_low.is_empty()
            && self.labels.is_none()
            && self.bandwidth.is_empty()
    }
}

/// Session settings fields that differ from the last-known server values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettingsChangeset {
    /// New default download directory.
    pub download_dir: Option<String>,
    /// New global download cap.
    pub speed_limit_down: Option<u64>,
    /// New download cap toggle.
    pub speed_limit_down_enabled: Option<bool>,
    /// New global upload cap.
    pub speed_limit_up: Option<u64>,
    /// New upload cap toggle.
    pub speed_limit_up_enabled: Option<bool>,
    /// New alternative-speed toggle.
    pub alt_speed_enabled: Option<bool>,
    /// New alternative download cap.
    pub alt_speed_down: Option<u64>,
    /// New alternative upload cap.
    pub alt_speed_up: Option<u64>,
    /// New global peer limit.
    pub peer_limit_global: Option<u32>,
    /// New per-torrent peer limit.
    pub peer_limit_per_torrent: Option<u32>,
    /// New seed ratio limit.
    pub seed_ratio_limit: Option<f64>,
    /// New seed ratio toggle.
    pub seed_ratio_limited: Option<bool>,
    /// New peer port.
    pub peer_port: Option<u16>,
    /// New start-added-torrents toggle.
    pub start_added_torrents: Option<bool>,
    /// New download queue size.
    pub download_queue_size: Option<u32>,
    /// New download queue toggle.
    pub download_queue_enabled: Option<bool>,
}

fn changed<T: PartialEq + Clone>(current: &T, desired: &T) -> Option<T> {
    (current != desired).then(|| desired.clone())
}

impl SessionSettingsChangeset {
    /// Collect every writable field where `desired` differs from `current`.
    /// Read-only fields (`version`, `rpc_version`) are ignored.
    #[must_use]
    pub fn diff(current: &SessionSettings, desired: &SessionSettings) -> Self {
        Self {
            download_dir: changed(&current.download_dir, &desired.download_dir),
            speed_limit_down: changed(&current.speed_limit_down, &desired.speed_limit_down),
            speed_limit_down_enabled: changed(
                &current.speed_limit_down_enabled,
                &desired.speed_limit_down_enabled,
            ),
            speed_limit_up: changed(&current.speed_limit_up, &desired.speed_limit_up),
            speed_limit_up_enabled: changed(
                &current.speed_limit_up_enabled,
                &desired.speed_limit_up_enabled,
            ),
            alt_speed_enabled: changed(&current.alt_speed_enabled, &desired.alt_speed_enabled),
            alt_speed_down: changed(&current.alt_speed_down, &desired.alt_speed_down),
            alt_speed_up: changed(&current.alt_speed_up, &desired.alt_speed_up),
            peer_limit_global: changed(&current.peer_limit_global, &desired.peer_limit_global),
            peer_limit_per_torrent: changed(
                &current.peer_limit_per_torrent,
                &desired.peer_limit_per_torrent,
            ),
            seed_ratio_limit: changed(&current.seed_ratio_limit, &desired.seed_ratio_limit),
            seed_ratio_limited: changed(&current.seed_ratio_limited, &desired.seed_ratio_limited),
            peer_port: changed(&current.peer_port, &desired.peer_port),
            start_added_torrents: changed(
                &current.start_added_torrents,
                &desired.start_added_torrents,
            ),
            download_queue_size: changed(
                &current.download_queue_size,
                &desired.download_queue_size,
            ),
            download_queue_enabled: changed(
                &current.download_queue_enabled,
                &desired.download_queue_enabled,
            ),
        }
    }

    /// Whether no field differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay the populated fields onto `settings`.
    pub fn apply_to(&self, settings: &mut SessionSettings) {
        fn overlay<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        overlay(&mut settings.download_dir, self.download_dir.as_ref());
        overlay(&mut settings.speed_limit_down, self.speed_limit_down.as_ref());
        overlay(
            &mut settings.speed_limit_down_enabled,
            self.speed_limit_down_enabled.as_ref(),
        );
        overlay(&mut settings.speed_limit_up, self.speed_limit_up.as_ref());
        overlay(
            &mut settings.speed_limit_up_enabled,
            self.speed_limit_up_enabled.as_ref(),
        );
        overlay(&mut settings.alt_speed_enabled, self.alt_speed_enabled.as_ref());
        overlay(&mut settings.alt_speed_down, self.alt_speed_down.as_ref());
        overlay(&mut settings.alt_speed_up, self.alt_speed_up.as_ref());
        overlay(&mut settings.peer_limit_global, self.peer_limit_global.as_ref());
        overlay(
            &mut settings.peer_limit_per_torrent,
            self.peer_limit_per_torrent.as_ref(),
        );
        overlay(&mut settings.seed_ratio_limit, self.seed_ratio_limit.as_ref());
        overlay(&mut settings.seed_ratio_limited, self.seed_ratio_limited.as_ref());
        overlay(&mut settings.peer_port, self.peer_port.as_ref());
        overlay(
            &mut settings.start_added_torrents,
            self.start_added_torrents.as_ref(),
        );
        overlay(
            &mut settings.download_queue_size,
            self.download_queue_size.as_ref(),
        );
        overlay(
            &mut settings.download_queue_enabled,
            self.download_queue_enabled.as_ref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            download_dir: "/downloads".into(),
            speed_limit_down: 100,
            speed_limit_down_enabled: false,
            peer_port: 51_413,
            version: "4.0.5".into(),
            rpc_version: 17,
            ..SessionSettings::default()
        }
    }

    #[test]
    fn diff_of_identical_settings_is_empty() {
        let current = settings();
        assert!(SessionSettingsChangeset::diff(&current, &current.clone()).is_empty());
    }

    #[test]
    fn diff_only_carries_changed_fields() {
        let current = settings();
        let mut desired = current.clone();
        desired.speed_limit_down_enabled = true;
        desired.peer_port = 6_881;
        desired.version = "ignored".into();

        let changes = SessionSettingsChangeset::diff(&current, &desired);
        assert_eq!(
            changes,
            SessionSettingsChangeset {
                speed_limit_down_enabled: Some(true),
                peer_port: Some(6_881),
                ..SessionSettingsChangeset::default()
            }
        );
    }

    #[test]
    fn apply_overlays_changes_only() {
        let mut current = settings();
        let changes = SessionSettingsChangeset {
            download_dir: Some("/new".into()),
            ..SessionSettingsChangeset::default()
        };
        changes.apply_to(&mut current);
        assert_eq!(current.download_dir, "/new");
        assert_eq!(current.speed_limit_down, 100);
        assert_eq!(current.peer_port, 51_413);
    }

    #[test]
    fn torrent_changeset_routes_priority_to_matching_bucket() {
        let changes = TorrentChangeset::priority(vec![1, 2], FilePriority::Low);
        assert_eq!(changes.priority_low, vec![1, 2]);
        assert!(changes.priority_high.is_empty());
        assert!(!changes.is_empty());
        assert!(TorrentChangeset::default().is_empty());
        assert_eq!(TorrentChangeset::wanted(vec![3], false).files_unwanted, vec![3]);
    }
}
