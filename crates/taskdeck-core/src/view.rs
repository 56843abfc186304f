use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    DueDate,
    Priority,
    Completed,
}

impl std::str::FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "due" | "duedate" | "date" => Ok(SortKey::DueDate),
            "priority" | "pri" => Ok(SortKey::Priority),
            "completed" | "done" => Ok(SortKey::Completed),
            other => Err(anyhow!(
                "invalid sort key: {other} (expected due, priority, or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub completion: CompletionFilter,
    pub search: String,
    pub due_on: Option<NaiveDate>,
    pub sort: SortKey,
}

impl ViewOptions {
    /// View tokens as they appear on the `list` command line:
    /// `all` / `completed` / `incomplete`, `search:WORD`,
    /// `due:YYYY-MM-DD`, `sort:due|priority|completed`. An explicit
    /// `sort:` token wins over the configured default.
    pub fn parse(tokens: &[String], default_sort: SortKey) -> anyhow::Result<Self> {
        let mut opts = Self {
            sort: default_sort,
            ..Self::default()
        };

        for token in tokens {
            if let Some(value) = token.strip_prefix("search:") {
                opts.search = value.trim().to_lowercase();
            } else if let Some(value) = token.strip_prefix("due:") {
                let date = value
                    .parse::<NaiveDate>()
                    .map_err(|_| anyhow!("invalid date filter: {value} (expected YYYY-MM-DD)"))?;
                opts.due_on = Some(date);
            } else if let Some(value) = token.strip_prefix("sort:") {
                opts.sort = value.parse()?;
            } else {
                opts.completion = match token.to_ascii_lowercase().as_str() {
                    "all" => CompletionFilter::All,
                    "completed" | "done" => CompletionFilter::Completed,
                    "incomplete" | "open" | "pending" => CompletionFilter::Incomplete,
                    other => return Err(anyhow!("unknown list token: {other}")),
                };
            }
        }

        Ok(opts)
    }
}

/// Fixed stage order: completion filter, keyword filter, date filter,
/// sort. Sorting is stable, so ties keep their collection order.
#[tracing::instrument(skip(tasks, opts))]
pub fn apply<'a>(tasks: &'a [Task], opts: &ViewOptions) -> Vec<&'a Task> {
    let mut view: Vec<&Task> = tasks
        .iter()
        .filter(|task| match opts.completion {
            CompletionFilter::All => true,
            CompletionFilter::Completed => task.completed,
            CompletionFilter::Incomplete => !task.completed,
        })
        .collect();

    if !opts.search.is_empty() {
        let keyword = opts.search.to_lowercase();
        view.retain(|task| matches_keyword(task, &keyword));
    }

    if let Some(date) = opts.due_on {
        view.retain(|task| task.due_date == date);
    }

    match opts.sort {
        SortKey::DueDate => view.sort_by_key(|task| task.due_instant()),
        SortKey::Priority => view.sort_by_key(|task| task.priority.rank()),
        SortKey::Completed => view.sort_by_key(|task| task.completed),
    }

    debug!(total = tasks.len(), visible = view.len(), "derived view");
    view
}

/// Case-insensitive substring match over title, description, category,
/// and every subtask title.
fn matches_keyword(task: &Task, keyword: &str) -> bool {
    let ok = task.title.to_lowercase().contains(keyword)
        || task.description.to_lowercase().contains(keyword)
        || task.category.to_lowercase().contains(keyword)
        || task
            .subtasks
            .iter()
            .any(|sub| sub.title.to_lowercase().contains(keyword));
    trace!(uuid = %task.uuid, keyword, ok, "keyword match");
    ok
}

/// The clear-all affordance is shown only when there is something to clear
/// and the current view is not empty.
pub fn clear_all_visible(total: usize, visible: usize) -> bool {
    total > 0 && visible > 0
}
