use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::cache::LayoutCache;
use crate::config::Config;
use crate::event::{Event, merge_feeds};
use crate::grouping::group_by_date;
use crate::layout::{MonthKey, MonthLayout, event_days};
use crate::task::Task;

/// Everything shown for one selected day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAgenda {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
    pub events: Vec<Event>,
}

/// Headless calendar state: the focused month, the selected day, the
/// merged event snapshot, tasks bucketed by date, and the layout cache.
///
/// Navigation pre-warms the adjacent months' layouts and then applies the
/// bounded retention policy, so paging back and forth never recomputes a
/// month that stayed inside the retention window.
pub struct CalendarWorkspace {
    tz: Tz,
    prewarm_radius: u32,
    cache_radius: u32,
    focus: MonthKey,
    selected: NaiveDate,
    events: Vec<Event>,
    tasks_by_date: BTreeMap<NaiveDate, Vec<Task>>,
    cache: LayoutCache,
}

impl CalendarWorkspace {
    pub fn new(config: &Config, today: NaiveDate) -> Self {
        let tz = config.timezone();
        let workspace = Self {
            tz,
            prewarm_radius: config.calendar.prewarm_radius,
            cache_radius: config.calendar.cache_radius,
            focus: MonthKey::from_date(today),
            selected: today,
            events: Vec::new(),
            tasks_by_date: BTreeMap::new(),
            cache: LayoutCache::new(config.week_start(), tz),
        };
        workspace.prewarm();
        workspace
    }

    pub fn focus(&self) -> MonthKey {
        self.focus
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Replace the event snapshot from the two feeds. The event set
    /// changed, so every cached layout is stale and gets dropped.
    #[instrument(skip(self, device, external))]
    pub fn set_feeds(&mut self, device: Vec<Event>, external: Vec<Event>) {
        self.events = merge_feeds(device, external);
        self.cache.invalidate_all();
        self.prewarm();
    }

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        debug!(count = tasks.len(), "replacing task snapshot");
        self.tasks_by_date = group_by_date(tasks, self.tz);
    }

    #[instrument(skip(self))]
    pub fn focus_month(&mut self, month: MonthKey) {
        if self.focus != month {
            debug!(from = %self.focus, to = %month, "moving calendar focus");
            self.focus = month;
        }
        self.prewarm();
    }

    pub fn shift_focus(&mut self, months: i32) -> MonthKey {
        self.focus_month(self.focus.shifted(months));
        self.focus
    }

    /// Jump back to today: reselect the date and refocus its month when
    /// the view drifted elsewhere.
    pub fn go_to_today(&mut self, today: NaiveDate) {
        self.selected = today;
        if !self.focus.contains(today) {
            self.focus_month(MonthKey::from_date(today));
        }
    }

    pub fn select_day(&mut self, date: NaiveDate) {
        self.selected = date;
    }

    pub fn layout(&self) -> Arc<MonthLayout> {
        self.layout_of(self.focus)
    }

    pub fn layout_of(&self, month: MonthKey) -> Arc<MonthLayout> {
        self.cache.get_or_compute(month, &self.events)
    }

    pub fn tasks_by_date(&self) -> &BTreeMap<NaiveDate, Vec<Task>> {
        &self.tasks_by_date
    }

    pub fn tasks_on(&self, date: NaiveDate) -> &[Task] {
        self.tasks_by_date
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Events whose day span covers `date`, in snapshot order.
    pub fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        self.events
            .iter()
            .filter(|event| {
                let (first, last) = event_days(event, self.tz);
                first <= date && date <= last
            })
            .cloned()
            .collect()
    }

    pub fn agenda(&self, date: NaiveDate) -> DayAgenda {
        DayAgenda {
            date,
            tasks: self.tasks_on(date).to_vec(),
            events: self.events_on(date),
        }
    }

    pub fn cached_months(&self) -> usize {
        self.cache.len()
    }

    fn prewarm(&self) {
        let radius = self.prewarm_radius as i32;
        for delta in -radius..=radius {
            self.cache.get_or_compute(self.focus.shifted(delta), &self.events);
        }
        self.cache.retain_around(self.focus, self.cache_radius);
    }
}
