use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which feed an event came from. Resolved at the merge boundary; nothing
/// past that point branches on it except presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    DeviceCalendar,
    ExternalAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,

    pub title: String,

    pub start: DateTime<Utc>,

    /// Absent means a single-instant event.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    pub source: SourceKind,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        source: SourceKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            source,
        }
    }
}

/// Merge the device-calendar and external-account feeds into one snapshot.
/// Order is normalized to (start, id) so the snapshot is independent of
/// feed arrival order.
pub fn merge_feeds(device: Vec<Event>, external: Vec<Event>) -> Vec<Event> {
    let device_count = device.len();
    let external_count = external.len();

    let mut merged: Vec<Event> = device.into_iter().chain(external).collect();
    merged.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    debug!(
        device = device_count,
        external = external_count,
        total = merged.len(),
        "merged event feeds"
    );
    merged
}
