use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use koyomi_core::config::Config;
use koyomi_core::datastore::DataStore;
use koyomi_core::event::{Event, SourceKind};
use koyomi_core::task::Task;
use koyomi_core::workspace::CalendarWorkspace;
use tempfile::tempdir;

#[test]
fn datastore_roundtrip_feeds_the_workspace() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let trip_start = Utc
        .with_ymd_and_hms(2024, 3, 10, 9, 0, 0)
        .single()
        .expect("valid start");
    let trip_end = Utc
        .with_ymd_and_hms(2024, 3, 12, 18, 0, 0)
        .single()
        .expect("valid end");
    store
        .add_event(Event::new(
            "trip",
            "Kyoto trip",
            trip_start,
            Some(trip_end),
            SourceKind::ExternalAccount,
        ))
        .expect("add trip event");

    let standup_start = Utc
        .with_ymd_and_hms(2024, 3, 11, 8, 30, 0)
        .single()
        .expect("valid start");
    store
        .add_event(Event::new(
            "standup",
            "Standup",
            standup_start,
            None,
            SourceKind::DeviceCalendar,
        ))
        .expect("add standup event");

    let due = Utc
        .with_ymd_and_hms(2024, 3, 11, 12, 0, 0)
        .single()
        .expect("valid due");
    let task = Task::new("pack bags".to_string(), Some(due));
    store.add_task(task.clone()).expect("add task");

    // fresh handles see the persisted records
    assert_eq!(store.load_events().expect("load events").len(), 2);
    assert_eq!(store.load_tasks().expect("load tasks").len(), 1);

    let config = Config {
        timezone: Some("UTC".to_string()),
        ..Config::default()
    };
    let today = NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date");
    let mut workspace = CalendarWorkspace::new(&config, today);

    let (device, external): (Vec<Event>, Vec<Event>) = store
        .load_events()
        .expect("load events")
        .into_iter()
        .partition(|event| event.source == SourceKind::DeviceCalendar);
    workspace.set_feeds(device, external);
    workspace.set_tasks(store.load_tasks().expect("load tasks"));

    // the trip and the standup overlap on the 11th, so the week stacks two lanes
    let layout = workspace.layout();
    let week = &layout.weeks[2];
    assert_eq!(week.lane_count, 2);
    assert_eq!(week.segments.len(), 2);

    // repeated requests come from the cache
    assert!(Arc::ptr_eq(&layout, &workspace.layout()));

    let selected = NaiveDate::from_ymd_opt(2024, 3, 11).expect("valid date");
    workspace.select_day(selected);
    let agenda = workspace.agenda(workspace.selected_date());
    assert_eq!(agenda.events.len(), 2);
    assert_eq!(agenda.tasks.len(), 1);
    assert_eq!(agenda.tasks[0].title, "pack bags");

    let now = Utc
        .with_ymd_and_hms(2024, 3, 11, 13, 0, 0)
        .single()
        .expect("valid now");
    store.complete_task(task.uuid, now).expect("complete task");

    let reloaded = store.load_tasks().expect("load tasks");
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded[0].is_completed());
}
