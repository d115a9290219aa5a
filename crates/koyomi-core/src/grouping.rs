use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::datetime::to_local_date;
use crate::event::Event;
use crate::task::Task;

/// Anything that can sit on a single calendar date.
pub trait Dated {
    /// The local calendar date this item belongs to, or `None` when the
    /// item has no date and should be left out of date buckets.
    fn calendar_date(&self, tz: Tz) -> Option<NaiveDate>;
}

impl Dated for Task {
    fn calendar_date(&self, tz: Tz) -> Option<NaiveDate> {
        self.calendar_instant().map(|dt| to_local_date(dt, tz))
    }
}

impl Dated for Event {
    fn calendar_date(&self, tz: Tz) -> Option<NaiveDate> {
        Some(to_local_date(self.start, tz))
    }
}

/// Bucket items by their local calendar date. Items without a date are
/// dropped silently; relative input order is preserved within each bucket.
/// The `NaiveDate` key renders as `YYYY-MM-DD`.
pub fn group_by_date<I, T>(items: I, tz: Tz) -> BTreeMap<NaiveDate, Vec<T>>
where
    I: IntoIterator<Item = T>,
    T: Dated,
{
    let mut buckets: BTreeMap<NaiveDate, Vec<T>> = BTreeMap::new();
    for item in items {
        if let Some(date) = item.calendar_date(tz) {
            buckets.entry(date).or_default().push(item);
        }
    }
    buckets
}
