use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cli::Command;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{parse_instant, to_local_date};
use crate::event::{Event, SourceKind};
use crate::layout::MonthKey;
use crate::render::Renderer;
use crate::task::Task;
use crate::workspace::CalendarWorkspace;

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        Command::Month { month } => cmd_month(store, cfg, renderer, month, now),
        Command::Agenda { date } => cmd_agenda(store, cfg, renderer, date, now),
        Command::AddEvent {
            title,
            start,
            end,
            external,
        } => cmd_add_event(store, cfg, title, start, end, external),
        Command::AddTask { title, due } => cmd_add_task(store, cfg, title, due),
        Command::Done { uuid } => cmd_done(store, uuid, now),
    }
}

/// Build a workspace from the stored snapshots, split back into feeds at
/// the source boundary.
fn open_workspace(
    store: &DataStore,
    cfg: &Config,
    now: DateTime<Utc>,
) -> anyhow::Result<CalendarWorkspace> {
    let today = to_local_date(now, cfg.timezone());
    let mut workspace = CalendarWorkspace::new(cfg, today);

    let (device, external): (Vec<Event>, Vec<Event>) = store
        .load_events()?
        .into_iter()
        .partition(|event| event.source == SourceKind::DeviceCalendar);
    workspace.set_feeds(device, external);
    workspace.set_tasks(store.load_tasks()?);

    Ok(workspace)
}

#[instrument(skip(store, cfg, renderer, now))]
fn cmd_month(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    month: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command month");

    let mut workspace = open_workspace(store, cfg, now)?;
    if let Some(raw) = month {
        let key: MonthKey = raw.parse()?;
        workspace.focus_month(key);
    }

    let layout = workspace.layout();
    let today = to_local_date(now, workspace.timezone());
    renderer.print_month(&layout, workspace.tasks_by_date(), today)
}

#[instrument(skip(store, cfg, renderer, now))]
fn cmd_agenda(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    date: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command agenda");

    let mut workspace = open_workspace(store, cfg, now)?;
    if let Some(raw) = date {
        let selected = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date (expected YYYY-MM-DD): {raw}"))?;
        workspace.select_day(selected);
    }

    let agenda = workspace.agenda(workspace.selected_date());
    renderer.print_agenda(&agenda, workspace.timezone())
}

#[instrument(skip(store, cfg, title, start, end))]
fn cmd_add_event(
    store: &DataStore,
    cfg: &Config,
    title: String,
    start: String,
    end: Option<String>,
    external: bool,
) -> anyhow::Result<()> {
    info!("command add-event");

    let tz = cfg.timezone();
    let start = parse_instant(&start, tz).ok_or_else(|| anyhow!("unrecognized start: {start}"))?;
    let end = end
        .map(|raw| parse_instant(&raw, tz).ok_or_else(|| anyhow!("unrecognized end: {raw}")))
        .transpose()?;
    let source = if external {
        SourceKind::ExternalAccount
    } else {
        SourceKind::DeviceCalendar
    };

    let event = Event::new(Uuid::new_v4().to_string(), title, start, end, source);
    store.add_event(event.clone())?;

    println!("Added event '{}' ({}).", event.title, event.id);
    Ok(())
}

#[instrument(skip(store, cfg, title, due))]
fn cmd_add_task(
    store: &DataStore,
    cfg: &Config,
    title: String,
    due: Option<String>,
) -> anyhow::Result<()> {
    info!("command add-task");

    let tz = cfg.timezone();
    let due = due
        .map(|raw| parse_instant(&raw, tz).ok_or_else(|| anyhow!("unrecognized due: {raw}")))
        .transpose()?;

    let task = Task::new(title, due);
    store.add_task(task.clone())?;

    println!("Added task '{}' ({}).", task.title, task.uuid);
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_done(store: &DataStore, uuid: String, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command done");

    let prefix = uuid.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("empty task uuid"));
    }

    let tasks = store.load_tasks()?;
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|task| !task.is_completed() && task.uuid.to_string().starts_with(&prefix))
        .collect();

    let task = match matches.as_slice() {
        [] => return Err(anyhow!("no open task matches uuid prefix: {prefix}")),
        [task] => *task,
        _ => return Err(anyhow!("uuid prefix is ambiguous: {prefix}")),
    };

    let completed = store.complete_task(task.uuid, now)?;
    println!("Completed task '{}'.", completed.title);
    Ok(())
}
