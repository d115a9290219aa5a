use std::collections::HashMap;
use std::sync::Arc;

use chrono::Weekday;
use chrono_tz::Tz;
use parking_lot::Mutex;
use tracing::debug;

use crate::event::Event;
use crate::layout::{MonthKey, MonthLayout, layout_month};

/// Month-keyed memo of computed layouts.
///
/// Entries appear lazily on first request and are returned by shared
/// handle afterwards. The lock is held across the compute so concurrent
/// callers get at-most-once computation per month. The cache does not
/// watch the event set; callers must `invalidate` (or `invalidate_all`)
/// when their events change, or reads go stale.
pub struct LayoutCache {
    week_start: Weekday,
    tz: Tz,
    inner: Mutex<HashMap<MonthKey, Arc<MonthLayout>>>,
}

impl LayoutCache {
    pub fn new(week_start: Weekday, tz: Tz) -> Self {
        Self {
            week_start,
            tz,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_compute(&self, month: MonthKey, events: &[Event]) -> Arc<MonthLayout> {
        let mut inner = self.inner.lock();
        if let Some(layout) = inner.get(&month) {
            return Arc::clone(layout);
        }

        debug!(month = %month, events = events.len(), "layout cache miss");
        let layout = Arc::new(layout_month(events, month, self.week_start, self.tz));
        inner.insert(month, Arc::clone(&layout));
        layout
    }

    /// Returns whether an entry was present.
    pub fn invalidate(&self, month: MonthKey) -> bool {
        let removed = self.inner.lock().remove(&month).is_some();
        debug!(month = %month, removed, "invalidated month layout");
        removed
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.len();
        inner.clear();
        debug!(dropped, "invalidated all month layouts");
    }

    /// Bounded retention: keep only months within `radius` of `focus`.
    pub fn retain_around(&self, focus: MonthKey, radius: u32) {
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|month, _| month.months_from(focus).unsigned_abs() <= u64::from(radius));
        let evicted = before - inner.len();
        if evicted > 0 {
            debug!(focus = %focus, radius, evicted, "evicted distant month layouts");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
