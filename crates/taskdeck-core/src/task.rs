use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Sort rank; High sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow::anyhow!(
                "invalid priority: {other} (expected low, medium, or high)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
}

impl Recurrence {
    pub fn label(self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
        }
    }

    /// Due date of the successor spawned when a recurring task completes.
    pub fn next_due(self, due: NaiveDate) -> Option<NaiveDate> {
        let days = match self {
            Recurrence::None => return None,
            Recurrence::Daily => 1,
            Recurrence::Weekly => 7,
        };
        due.checked_add_days(Days::new(days))
    }
}

impl std::str::FromStr for Recurrence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Recurrence::None),
            "daily" | "day" => Ok(Recurrence::Daily),
            "weekly" | "week" => Ok(Recurrence::Weekly),
            other => Err(anyhow::anyhow!(
                "invalid recurrence: {other} (expected none, daily, or weekly)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub completed: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: Uuid,

    /// Small display id for CLI addressing; not identity.
    #[serde(default)]
    pub id: Option<u64>,

    pub title: String,
    pub description: String,

    pub due_date: NaiveDate,

    #[serde(default)]
    pub due_time: Option<NaiveTime>,

    pub priority: Priority,
    pub category: String,

    #[serde(default)]
    pub recurrence: Recurrence,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// A task missing its time component is treated as due at 23:59.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

impl Task {
    pub fn due_instant(&self) -> NaiveDateTime {
        self.due_date.and_time(self.due_time.unwrap_or_else(end_of_day))
    }

    /// Due within the next 24 hours, inclusive on both ends, and not past.
    pub fn is_due_soon(&self, now: NaiveDateTime) -> bool {
        if self.completed {
            return false;
        }
        let remaining = self.due_instant() - now;
        remaining >= TimeDelta::zero() && remaining <= TimeDelta::hours(24)
    }

    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }
}

/// Candidate task fields held by the form session until commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub priority: Priority,
    pub category: String,
    pub recurrence: Recurrence,
    pub subtasks: Vec<Subtask>,
}

impl TaskDraft {
    pub fn empty(default_category: &str, default_priority: Priority) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            due_date: None,
            due_time: None,
            priority: default_priority,
            category: default_category.to_string(),
            recurrence: Recurrence::None,
            subtasks: vec![],
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: Some(task.due_date),
            due_time: task.due_time,
            priority: task.priority,
            category: task.category.clone(),
            recurrence: task.recurrence,
            subtasks: task.subtasks.clone(),
        }
    }

    /// Validation gate for create/update; an invalid draft must not reach
    /// the store.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.description.trim().is_empty()
            && self.due_date.is_some()
            && !self.category.trim().is_empty()
            && self.subtasks.iter().all(|s| !s.title.trim().is_empty())
    }
}
