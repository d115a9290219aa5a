use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::{add_days, first_day_of_month, last_day_of_month, start_of_week, to_local_date};
use crate::event::{Event, SourceKind};

/// One calendar month, the unit the layout cache is keyed by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(self) -> NaiveDate {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Months since year zero; adjacency math runs on this.
    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn shifted(self, months: i32) -> Self {
        let idx = self.index() + i64::from(months);
        Self {
            year: idx.div_euclid(12) as i32,
            month: (idx.rem_euclid(12) + 1) as u32,
        }
    }

    /// Signed distance in months from `other` to `self`.
    pub fn months_from(self, other: MonthKey) -> i64 {
        self.index() - other.index()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("expected YYYY-MM, got: {s}"))?;
        let year: i32 = year.parse().map_err(|_| anyhow!("invalid year in: {s}"))?;
        let month: u32 = month.parse().map_err(|_| anyhow!("invalid month in: {s}"))?;
        MonthKey::new(year, month).ok_or_else(|| anyhow!("month out of range in: {s}"))
    }
}

/// One event's visible stretch within a single week row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSegment {
    pub event_id: String,
    pub title: String,
    pub source: SourceKind,
    /// Week row within the grid, 0-based from the top.
    pub row: usize,
    /// Column of the first visible day, 0-6.
    pub start_col: usize,
    /// Visible days within this row, 1-7.
    pub span: usize,
    /// Vertical stacking slot within the row, 0-based.
    pub lane: usize,
}

impl EventSegment {
    pub fn columns(&self) -> Range<usize> {
        self.start_col..self.start_col + self.span
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRow {
    pub row: usize,
    /// Date of column 0.
    pub start: NaiveDate,
    pub segments: Vec<EventSegment>,
    /// Stack depth the caller must reserve; max lane + 1, 0 when empty.
    pub lane_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthLayout {
    pub month: MonthKey,
    pub grid_start: NaiveDate,
    pub grid_end: NaiveDate,
    pub weeks: Vec<WeekRow>,
}

impl MonthLayout {
    pub fn week_row_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn day_at(&self, row: usize, col: usize) -> NaiveDate {
        add_days(self.grid_start, row as i64 * 7 + col as i64)
    }
}

/// The calendar dates an event occupies. Degenerate ranges (end before
/// start) collapse to the start day; a missing end means single-instant.
pub(crate) fn event_days(event: &Event, tz: Tz) -> (NaiveDate, NaiveDate) {
    let first = to_local_date(event.start, tz);
    let last = event
        .end
        .map(|end| to_local_date(end, tz))
        .unwrap_or(first);
    if last < first { (first, first) } else { (first, last) }
}

/// Lay out `events` on the month grid of `month`.
///
/// The grid starts at the week-start day on or before the 1st and runs
/// whole weeks through the end of the month. Events are clipped to the
/// grid; each week row is packed independently: candidates sorted by
/// (start column, visible span descending, event id) each take the lowest
/// lane whose columns are still free. Pure and deterministic; input order
/// never shows in the output.
pub fn layout_month(events: &[Event], month: MonthKey, week_start: Weekday, tz: Tz) -> MonthLayout {
    let first = month.first_day();
    let last = month.last_day();
    let grid_start = start_of_week(first, week_start);
    let week_count = ((last - grid_start).num_days() / 7 + 1) as usize;
    let grid_end = add_days(grid_start, week_count as i64 * 7 - 1);

    let mut visible: Vec<(&Event, NaiveDate, NaiveDate)> = Vec::new();
    for event in events {
        let (first_day, last_day) = event_days(event, tz);
        if last_day < grid_start || first_day > grid_end {
            continue;
        }
        visible.push((event, first_day.max(grid_start), last_day.min(grid_end)));
    }

    let mut weeks = Vec::with_capacity(week_count);
    for row in 0..week_count {
        let row_start = add_days(grid_start, row as i64 * 7);
        let row_end = add_days(row_start, 6);

        let mut pending: Vec<(usize, usize, &Event)> = visible
            .iter()
            .filter(|(_, first_day, last_day)| *first_day <= row_end && *last_day >= row_start)
            .map(|(event, first_day, last_day)| {
                let from = (*first_day).max(row_start);
                let to = (*last_day).min(row_end);
                let start_col = (from - row_start).num_days() as usize;
                let span = (to - from).num_days() as usize + 1;
                (start_col, span, *event)
            })
            .collect();

        pending.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.id.cmp(&b.2.id))
        });

        let mut lanes: Vec<[bool; 7]> = Vec::new();
        let mut segments = Vec::with_capacity(pending.len());
        for (start_col, span, event) in pending {
            let cols = start_col..start_col + span;
            let lane = lanes
                .iter()
                .position(|taken| cols.clone().all(|col| !taken[col]))
                .unwrap_or_else(|| {
                    lanes.push([false; 7]);
                    lanes.len() - 1
                });
            for col in cols {
                lanes[lane][col] = true;
            }
            segments.push(EventSegment {
                event_id: event.id.clone(),
                title: event.title.clone(),
                source: event.source,
                row,
                start_col,
                span,
                lane,
            });
        }

        let lane_count = lanes.len();
        weeks.push(WeekRow {
            row,
            start: row_start,
            segments,
            lane_count,
        });
    }

    debug!(
        month = %month,
        grid_start = %grid_start,
        grid_end = %grid_end,
        weeks = weeks.len(),
        visible_events = visible.len(),
        "computed month layout"
    );

    MonthLayout {
        month,
        grid_start,
        grid_end,
        weeks,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    const TZ: Tz = chrono_tz::UTC;

    fn day_event(id: &str, y: i32, m: u32, d: u32) -> Event {
        let start = Utc
            .with_ymd_and_hms(y, m, d, 10, 0, 0)
            .single()
            .expect("valid start");
        Event::new(id, id.to_uppercase(), start, None, SourceKind::DeviceCalendar)
    }

    fn span_event(id: &str, from: (i32, u32, u32), to: (i32, u32, u32)) -> Event {
        let start = Utc
            .with_ymd_and_hms(from.0, from.1, from.2, 9, 0, 0)
            .single()
            .expect("valid start");
        let end = Utc
            .with_ymd_and_hms(to.0, to.1, to.2, 18, 0, 0)
            .single()
            .expect("valid end");
        Event::new(id, id.to_uppercase(), start, Some(end), SourceKind::ExternalAccount)
    }

    fn march() -> MonthKey {
        MonthKey::new(2024, 3).expect("valid month")
    }

    fn segments(layout: &MonthLayout) -> Vec<&EventSegment> {
        layout.weeks.iter().flat_map(|week| &week.segments).collect()
    }

    #[test]
    fn month_key_parses_and_displays() {
        let key: MonthKey = "2024-03".parse().expect("parse month key");
        assert_eq!(key, march());
        assert_eq!(key.to_string(), "2024-03");
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("march".parse::<MonthKey>().is_err());
    }

    #[test]
    fn month_key_shifts_across_year_edges() {
        assert_eq!(
            MonthKey::new(2024, 1).expect("valid").shifted(-1),
            MonthKey::new(2023, 12).expect("valid")
        );
        assert_eq!(
            MonthKey::new(2024, 12).expect("valid").shifted(2),
            MonthKey::new(2025, 2).expect("valid")
        );
        assert_eq!(
            MonthKey::new(2024, 6).expect("valid").months_from(MonthKey::new(2023, 12).expect("valid")),
            6
        );
    }

    #[test]
    fn sunday_grid_covers_whole_weeks() {
        let layout = layout_month(&[], march(), Weekday::Sun, TZ);

        let grid_start = NaiveDate::from_ymd_opt(2024, 2, 25).expect("valid date");
        assert_eq!(layout.grid_start, grid_start);
        assert_eq!(layout.week_row_count(), 6);
        assert_eq!(
            layout.grid_end,
            NaiveDate::from_ymd_opt(2024, 4, 6).expect("valid date")
        );
        assert!(layout.weeks.iter().all(|week| week.segments.is_empty() && week.lane_count == 0));
    }

    #[test]
    fn monday_grid_is_tighter_for_march_2024() {
        let layout = layout_month(&[], march(), Weekday::Mon, TZ);

        assert_eq!(
            layout.grid_start,
            NaiveDate::from_ymd_opt(2024, 2, 26).expect("valid date")
        );
        assert_eq!(layout.week_row_count(), 5);
        assert_eq!(
            layout.grid_end,
            NaiveDate::from_ymd_opt(2024, 3, 31).expect("valid date")
        );
    }

    #[test]
    fn single_day_event_lands_on_its_weekday_column() {
        let events = vec![day_event("solo", 2024, 3, 15)];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let all = segments(&layout);
        assert_eq!(all.len(), 1);
        let segment = all[0];
        assert_eq!(segment.row, 2);
        assert_eq!(segment.start_col, 5);
        assert_eq!(segment.span, 1);
        assert_eq!(segment.lane, 0);
    }

    #[test]
    fn overlapping_events_stack_in_lowest_free_lanes() {
        let events = vec![
            span_event("b", (2024, 3, 10), (2024, 3, 12)),
            day_event("c", 2024, 3, 11),
            span_event("a", (2024, 3, 10), (2024, 3, 12)),
        ];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let week = &layout.weeks[2];
        assert_eq!(week.lane_count, 3);

        let lane_of = |id: &str| {
            week.segments
                .iter()
                .find(|segment| segment.event_id == id)
                .map(|segment| segment.lane)
                .expect("segment present")
        };
        assert_eq!(lane_of("a"), 0);
        assert_eq!(lane_of("b"), 1);
        assert_eq!(lane_of("c"), 2);
    }

    #[test]
    fn non_overlapping_event_reuses_lane_zero() {
        let events = vec![
            span_event("long", (2024, 3, 10), (2024, 3, 12)),
            day_event("late", 2024, 3, 15),
        ];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let week = &layout.weeks[2];
        assert_eq!(week.lane_count, 1);
        assert!(week.segments.iter().all(|segment| segment.lane == 0));
    }

    #[test]
    fn month_boundary_event_is_clipped_to_the_grid() {
        // Starts before the March grid; its first visible record must
        // begin at the grid's leading boundary, not before.
        let events = vec![span_event("x", (2024, 2, 20), (2024, 3, 3))];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let all = segments(&layout);
        assert_eq!(all.len(), 2);
        assert_eq!((all[0].row, all[0].start_col, all[0].span), (0, 0, 7));
        assert_eq!((all[1].row, all[1].start_col, all[1].span), (1, 0, 1));
    }

    #[test]
    fn leading_days_keep_their_own_columns() {
        // Starts inside the grid's leading days, after the boundary.
        let events = vec![span_event("x", (2024, 2, 28), (2024, 3, 3))];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let all = segments(&layout);
        assert_eq!(all.len(), 2);
        assert_eq!((all[0].row, all[0].start_col, all[0].span), (0, 3, 4));
        assert_eq!((all[1].row, all[1].start_col, all[1].span), (1, 0, 1));
    }

    #[test]
    fn event_outside_the_grid_yields_no_records() {
        let events = vec![day_event("far", 2024, 1, 5)];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);
        assert!(segments(&layout).is_empty());
    }

    #[test]
    fn month_spanning_event_touches_every_row() {
        let events = vec![span_event("all", (2024, 2, 1), (2024, 4, 30))];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let all = segments(&layout);
        assert_eq!(all.len(), layout.week_row_count());
        for (row, segment) in all.iter().enumerate() {
            assert_eq!(segment.row, row);
            assert_eq!(segment.start_col, 0);
            assert_eq!(segment.span, 7);
            assert_eq!(segment.lane, 0);
        }
    }

    #[test]
    fn degenerate_range_collapses_to_start_day() {
        let start = Utc
            .with_ymd_and_hms(2024, 3, 10, 18, 0, 0)
            .single()
            .expect("valid start");
        let end = Utc
            .with_ymd_and_hms(2024, 3, 8, 9, 0, 0)
            .single()
            .expect("valid end");
        let events = vec![Event::new(
            "rev",
            "REV",
            start,
            Some(end),
            SourceKind::DeviceCalendar,
        )];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        let all = segments(&layout);
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].row, all[0].start_col, all[0].span), (2, 0, 1));
    }

    #[test]
    fn layout_is_deterministic_and_order_independent() {
        let mut events = vec![
            span_event("a", (2024, 3, 4), (2024, 3, 8)),
            span_event("b", (2024, 3, 6), (2024, 3, 12)),
            day_event("c", 2024, 3, 6),
            span_event("d", (2024, 3, 25), (2024, 4, 2)),
            day_event("e", 2024, 3, 6),
        ];
        let first = layout_month(&events, march(), Weekday::Sun, TZ);
        let again = layout_month(&events, march(), Weekday::Sun, TZ);
        events.reverse();
        let reordered = layout_month(&events, march(), Weekday::Sun, TZ);

        assert_eq!(first, again);
        assert_eq!(first, reordered);
    }

    #[test]
    fn overlapping_segments_never_share_a_lane() {
        let events = vec![
            span_event("a", (2024, 3, 1), (2024, 3, 9)),
            span_event("b", (2024, 3, 3), (2024, 3, 5)),
            span_event("c", (2024, 3, 4), (2024, 3, 11)),
            day_event("d", 2024, 3, 4),
            day_event("e", 2024, 3, 8),
            span_event("f", (2024, 3, 7), (2024, 3, 8)),
        ];
        let layout = layout_month(&events, march(), Weekday::Sun, TZ);

        for week in &layout.weeks {
            for (i, left) in week.segments.iter().enumerate() {
                for right in &week.segments[i + 1..] {
                    let overlap = left.columns().start < right.columns().end
                        && right.columns().start < left.columns().end;
                    if overlap {
                        assert_ne!(
                            left.lane, right.lane,
                            "{} and {} overlap in row {} but share lane {}",
                            left.event_id, right.event_id, week.row, left.lane
                        );
                    }
                }
            }
            let depth = week.segments.iter().map(|s| s.lane + 1).max().unwrap_or(0);
            assert_eq!(week.lane_count, depth);
        }
    }
}
