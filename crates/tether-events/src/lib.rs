#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Notification bus between the sync worker and UI-facing consumers.
//!
//! The bus carries typed notifications with sequential identifiers and keeps
//! a bounded replay ring so late subscribers (a UI that attaches after the
//! first poll) can catch up. Internally it uses `tokio::broadcast`; when a
//! subscriber lags, the oldest notifications are dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tether_core::{TorrentId, TransmissionResponse};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each published notification.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Notifications surfaced to UI consumers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A different daemon became active; cached state was cleared.
    ServerSwitched {
        /// Profile name of the new server, if any.
        server: Option<String>,
    },
    /// A torrent-list response was applied.
    TorrentsRefreshed {
        /// Number of torrents now cached.
        count: usize,
    },
    /// A session-statistics response was applied.
    SessionStatsRefreshed,
    /// Daemon settings were fetched or changed.
    SessionSettingsRefreshed,
    /// A torrent's file list was fetched.
    FilesRefreshed {
        /// Torrent whose file list changed.
        torrent_id: TorrentId,
    },
    /// Repeated authorization failures crossed the escalation threshold.
    ConnectionLost {
        /// Profile name of the server.
        server: String,
        /// Consecutive unauthorized poll responses observed.
        consecutive_unauthorized: u32,
    },
    /// A poll succeeded after the connection had been flagged as lost.
    ConnectionRestored {
        /// Profile name of the server.
        server: String,
    },
    /// A mutation failed and its optimistic change was reverted.
    MutationFailed {
        /// Mutation label (`set_wanted`, `rename`, ...).
        action: String,
        /// Outcome reported by the daemon call.
        outcome: TransmissionResponse,
        /// One-line summary.
        brief: String,
        /// Longer explanation.
        detail: String,
    },
    /// A batch of independent calls finished with at least one failure.
    BatchFailed {
        /// Batch label (`add`).
        action: String,
        /// One-line summary.
        brief: String,
        /// Kept failure lines.
        detail: String,
        /// Number of failed items.
        failed: usize,
    },
}

impl Event {
    /// Machine-friendly discriminator for consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ServerSwitched { .. } => "server_switched",
            Self::TorrentsRefreshed { .. } => "torrents_refreshed",
            Self::SessionStatsRefreshed => "session_stats_refreshed",
            Self::SessionSettingsRefreshed => "session_settings_refreshed",
            Self::FilesRefreshed { .. } => "files_refreshed",
            Self::ConnectionLost { .. } => "connection_lost",
            Self::ConnectionRestored { .. } => "connection_restored",
            Self::MutationFailed { .. } => "mutation_failed",
            Self::BatchFailed { .. } => "batch_failed",
        }
    }

    /// Whether the notification is an error the user should see.
    #[must_use]
    pub const fn is_alert(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost { .. } | Self::MutationFailed { .. } | Self::BatchFailed { .. }
        )
    }
}

/// Metadata wrapper tracking the notification id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Notification payload.
    pub event: Event,
}

/// Shared notification bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a bus whose broadcast channel and replay ring share `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a notification, assigning it the next sequential identifier.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe, replaying buffered notifications newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog = since_id.map_or_else(VecDeque::new, |since| {
            self.buffer()
                .iter()
                .filter(|item| item.id > since)
                .cloned()
                .collect()
        });
        EventStream { backlog, receiver }
    }

    /// Returns the last assigned identifier, if anything has been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.buffer().back().map(|event| event.id)
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream yielding notifications from the replay backlog, then the live channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next notification, respecting the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return the next notification if one is already queued.
    pub fn try_next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    fn refreshed(count: usize) -> Event {
        Event::TorrentsRefreshed { count }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(refreshed(i));
        }
        assert_eq!(last_id, 5);
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            let event = timeout(RECV_TIMEOUT, stream.next())
                .await
                .expect("replay timed out")
                .expect("stream closed");
            received.push(event.id);
        }
        assert_eq!(received, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        for i in 0..4 {
            bus.publish(refreshed(i));
        }
        let mut stream = bus.subscribe(Some(0));
        assert_eq!(stream.try_next().map(|e| e.id), Some(3));
        assert_eq!(stream.try_next().map(|e| e.id), Some(4));
        assert!(stream.try_next().is_none());
    }

    #[tokio::test]
    async fn live_subscribers_receive_new_events() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        bus.publish(Event::SessionStatsRefreshed);
        let event = timeout(RECV_TIMEOUT, stream.next())
            .await
            .expect("receive timed out")
            .expect("stream closed");
        assert_eq!(event.event.kind(), "session_stats_refreshed");
        assert!(!event.event.is_alert());
    }

    #[test]
    fn alerts_are_errors_only() {
        let lost = Event::ConnectionLost {
            server: "home".into(),
            consecutive_unauthorized: 3,
        };
        assert!(lost.is_alert());
        assert!(
            !Event::ConnectionRestored {
                server: "home".into()
            }
            .is_alert()
        );
    }
}
