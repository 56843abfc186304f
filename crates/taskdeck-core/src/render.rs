use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::Task;

const EMPTY_PLACEHOLDER: &str = "No tasks added yet. Start by creating a new task.";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, out, view, now))]
    pub fn print_task_table<W: Write>(
        &mut self,
        mut out: W,
        view: &[&Task],
        total: usize,
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if view.is_empty() {
            writeln!(out, "{EMPTY_PLACEHOLDER}")?;
            return Ok(());
        }

        let headers = ["ID", "Due", "Pri", "Category", "Subs", "Title", ""];
        let mut rows = Vec::with_capacity(view.len());

        for task in view {
            let id = task
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let id = self.paint(&id, "33");

            let mut due = task.due_date.format("%Y-%m-%d").to_string();
            if let Some(time) = task.due_time {
                due.push_str(&time.format(" %H:%M").to_string());
            }
            if task.is_due_soon(now) {
                due = self.paint(&due, "31");
            }

            let subs = match task.subtask_progress() {
                (_, 0) => String::new(),
                (done, total) => format!("{done}/{total}"),
            };

            let mut flags = Vec::new();
            if task.completed {
                flags.push(self.paint("done", "32"));
            }
            if task.is_due_soon(now) {
                flags.push(self.paint("due soon", "31"));
            }
            match task.recurrence.label() {
                "none" => {}
                label => flags.push(label.to_string()),
            }

            rows.push(vec![
                id,
                due,
                task.priority.label().to_string(),
                task.category.clone(),
                subs,
                task.title.clone(),
                flags.join(" "),
            ]);
        }

        write_table(&mut out, &headers, rows)?;

        if crate::view::clear_all_visible(total, view.len()) {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                self.paint("run 'taskdeck clear yes' to remove all tasks", "2")
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, task, now))]
    pub fn print_task_detail(&mut self, task: &Task, now: NaiveDateTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(
            out,
            "id          {}",
            task.id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "uuid        {}", task.uuid)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description)?;
        writeln!(out, "due         {}", task.due_date.format("%Y-%m-%d"))?;
        if let Some(time) = task.due_time {
            writeln!(out, "time        {}", time.format("%H:%M"))?;
        }
        writeln!(out, "priority    {}", task.priority.label())?;
        writeln!(out, "category    {}", task.category)?;
        writeln!(out, "recurrence  {}", task.recurrence.label())?;
        writeln!(
            out,
            "status      {}",
            if task.completed { "completed" } else { "incomplete" }
        )?;
        if task.is_due_soon(now) {
            writeln!(out, "            {}", self.paint("due soon", "31"))?;
        }

        if !task.subtasks.is_empty() {
            writeln!(out, "subtasks")?;
            for (idx, sub) in task.subtasks.iter().enumerate() {
                let mark = if sub.completed { "x" } else { " " };
                writeln!(out, "  {}. [{mark}] {}", idx + 1, sub.title)?;
            }
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{EMPTY_PLACEHOLDER, Renderer, strip_ansi, write_table};
    use crate::config::Config;
    use crate::task::{Priority, Recurrence, Task};

    fn renderer() -> Renderer {
        let cfg = Config::load(Some(Path::new("/dev/null"))).expect("load config");
        Renderer::new(&cfg).expect("renderer")
    }

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .expect("date")
            .and_hms_opt(12, 0, 0)
            .expect("time")
    }

    fn sample_task() -> Task {
        Task {
            uuid: Uuid::new_v4(),
            id: Some(1),
            title: "Water plants".to_string(),
            description: "Balcony first".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"),
            due_time: None,
            priority: Priority::Medium,
            category: "Home".to_string(),
            recurrence: Recurrence::None,
            completed: false,
            subtasks: vec![],
        }
    }

    #[test]
    fn empty_view_prints_the_placeholder() {
        let mut buf = Vec::new();
        renderer()
            .print_task_table(&mut buf, &[], 0, now())
            .expect("print");

        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.trim_end(), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn filtered_out_view_prints_placeholder_without_clear_hint() {
        let mut buf = Vec::new();
        // one task exists, but the current filters match nothing
        renderer()
            .print_task_table(&mut buf, &[], 1, now())
            .expect("print");

        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.trim_end(), EMPTY_PLACEHOLDER);
        assert!(!text.contains("clear"));
    }

    #[test]
    fn populated_view_prints_rows_and_clear_hint() {
        let task = sample_task();
        let mut buf = Vec::new();
        renderer()
            .print_task_table(&mut buf, &[&task], 1, now())
            .expect("print");

        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Water plants"));
        assert!(text.contains("2024-02-01"));
        assert!(text.contains("taskdeck clear yes"));
        assert!(!text.contains(EMPTY_PLACEHOLDER));
    }

    #[test]
    fn table_pads_columns_to_the_widest_cell() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            &["ID", "Title"],
            vec![
                vec!["1".to_string(), "short".to_string()],
                vec!["12".to_string(), "a longer title".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Title          ");
        assert!(lines[1].starts_with("--"));
        assert_eq!(lines[2], "1  short          ");
        assert_eq!(lines[3], "12 a longer title ");
    }

    #[test]
    fn strip_ansi_removes_color_codes() {
        assert_eq!(strip_ansi("\x1b[31mdue\x1b[0m"), "due");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
