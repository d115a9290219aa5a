use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthChar;

use crate::config::Config;
use crate::event::SourceKind;
use crate::layout::MonthLayout;
use crate::task::Task;
use crate::workspace::DayAgenda;

const CELL_WIDTH: usize = 12;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    /// Print a month grid: weekday header, then per week a day-number
    /// line followed by one line per occupied lane. Days outside the
    /// month are dimmed; days carrying tasks get a dot marker.
    #[tracing::instrument(skip(self, layout, tasks_by_date))]
    pub fn print_month(
        &self,
        layout: &MonthLayout,
        tasks_by_date: &BTreeMap<NaiveDate, Vec<Task>>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{}", layout.month.first_day().format("%B %Y"))?;

        let mut header = String::new();
        for col in 0..7 {
            let day = layout.day_at(0, col);
            let label = fit_width(&day.format("%a").to_string(), CELL_WIDTH);
            header.push_str(&self.paint_weekday(&label, day.weekday()));
        }
        writeln!(out, "{header}")?;

        for week in &layout.weeks {
            let mut days_line = String::new();
            for col in 0..7 {
                let day = layout.day_at(week.row, col);
                let marker = if tasks_by_date.contains_key(&day) { "*" } else { "" };
                let cell = fit_width(&format!("{:>2}{}", day.day(), marker), CELL_WIDTH);
                let cell = if day == today {
                    self.paint(&cell, "33")
                } else if !layout.month.contains(day) {
                    self.paint(&cell, "90")
                } else {
                    cell
                };
                days_line.push_str(&cell);
            }
            writeln!(out, "{days_line}")?;

            for lane in 0..week.lane_count {
                let mut line = String::new();
                let mut col = 0;
                while col < 7 {
                    let segment = week
                        .segments
                        .iter()
                        .find(|segment| segment.lane == lane && segment.start_col == col);
                    match segment {
                        Some(segment) => {
                            let width = segment.span * CELL_WIDTH;
                            let bar = fit_width(&format!("|{}", segment.title), width);
                            line.push_str(&self.paint_source(&bar, segment.source));
                            col += segment.span;
                        }
                        None => {
                            line.push_str(&" ".repeat(CELL_WIDTH));
                            col += 1;
                        }
                    }
                }
                writeln!(out, "{}", line.trim_end())?;
            }
        }

        Ok(())
    }

    /// Print one day's tasks and events as a flat agenda list.
    #[tracing::instrument(skip(self, agenda))]
    pub fn print_agenda(&self, agenda: &DayAgenda, tz: Tz) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{}", agenda.date.format("%A, %Y-%m-%d"))?;

        if agenda.events.is_empty() && agenda.tasks.is_empty() {
            writeln!(out, "No events or tasks.")?;
            return Ok(());
        }

        for event in &agenda.events {
            let time = event.start.with_timezone(&tz).format("%H:%M");
            let tag = match event.source {
                SourceKind::DeviceCalendar => "device",
                SourceKind::ExternalAccount => "external",
            };
            let line = format!("{time}  {}  ({tag})", event.title);
            writeln!(out, "{}", self.paint_source(&line, event.source))?;
        }

        for task in &agenda.tasks {
            let check = if task.is_completed() { "[x]" } else { "[ ]" };
            match task.due {
                Some(due) => {
                    let time = due.with_timezone(&tz).format("%H:%M");
                    writeln!(out, "{check} {}  (due {time})", task.title)?;
                }
                None => writeln!(out, "{check} {}", task.title)?,
            }
        }

        Ok(())
    }

    fn paint_weekday(&self, text: &str, weekday: Weekday) -> String {
        match weekday {
            Weekday::Sun => self.paint(text, "31"),
            Weekday::Sat => self.paint(text, "34"),
            _ => text.to_string(),
        }
    }

    fn paint_source(&self, text: &str, source: SourceKind) -> String {
        match source {
            SourceKind::DeviceCalendar => self.paint(text, "36"),
            SourceKind::ExternalAccount => self.paint(text, "32"),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Truncate to at most `width` display columns, then pad with spaces to
/// exactly `width`. Wide (CJK) characters count as two columns.
fn fit_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }

    out.push_str(&" ".repeat(width - used));
    out
}
