//! Core domain types for taskpilot
//!
//! These mirror the REST backend's JSON (camelCase on the wire).
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Task** | A unit of work with status, priority, category, optional deadline and milestones |
//! | **Milestone** | An ordered checkpoint inside a task; completing all of them completes the task |
//! | **Context entry** | A free-form note (email, message, thought) the assistant flows read |
//! | **Category** | A named bucket tasks are filed under |
//!
//! The AI flows never hold references to these types; they receive copies of
//! the fields they need (see [`crate::flows`]).

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================
// Tasks
// ============================================

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("unknown task status: {}", s)),
        }
    }
}

/// How pressing a task is
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    /// Map a 1-10 urgency score (as produced by the prioritize flow).
    ///
    /// 1-3 low, 4-6 medium, 7-8 high, 9-10 urgent.
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            TaskPriority::Urgent
        } else if score >= 7.0 {
            TaskPriority::High
        } else if score >= 4.0 {
            TaskPriority::Medium
        } else {
            TaskPriority::Low
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(format!("unknown task priority: {}", s)),
        }
    }
}

/// A checkpoint inside a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            completed: false,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Task {
    /// Set one milestone's completion and re-derive the task status.
    ///
    /// All milestones complete means done, some means in-progress, none
    /// means todo. Leaves the task untouched when the milestone is unknown.
    pub fn toggle_milestone(
        &mut self,
        milestone_id: u64,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let milestone = self
            .milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or(Error::MilestoneNotFound {
                task: self.id,
                milestone: milestone_id,
            })?;

        milestone.completed = completed;
        milestone.completed_at = completed.then_some(now);
        self.status = self.derived_status();
        Ok(())
    }

    /// Status implied by the milestones; a task without milestones keeps its own.
    pub fn derived_status(&self) -> TaskStatus {
        if self.milestones.is_empty() {
            return self.status;
        }
        let done = self.milestones.iter().filter(|m| m.completed).count();
        if done == self.milestones.len() {
            TaskStatus::Done
        } else if done > 0 {
            TaskStatus::InProgress
        } else {
            TaskStatus::Todo
        }
    }

    /// Replace the milestones with fresh, uncompleted ones.
    pub fn replace_milestones<I, S>(&mut self, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.milestones = titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| Milestone::new(i as u64 + 1, title))
            .collect();
    }

    /// Fraction of milestones completed, `None` without milestones
    pub fn progress(&self) -> Option<f64> {
        if self.milestones.is_empty() {
            return None;
        }
        let done = self.milestones.iter().filter(|m| m.completed).count();
        Some(done as f64 / self.milestones.len() as f64)
    }

    /// Whether the deadline falls on `date` in local time
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.deadline
            .map(|d| d.with_timezone(&Local).date_naive() == date)
            .unwrap_or(false)
    }

    /// Title and description as one line, the way the assistant reads a task
    pub fn summary(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.description)
        }
    }
}

/// Task creation payload (no id, no creation time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            category: String::new(),
            deadline: None,
            milestones: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Title is required.".to_string()));
        }
        Ok(())
    }

    pub fn into_task(self, id: u64, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            category: self.category,
            deadline: self.deadline,
            created_at,
            milestones: self.milestones,
        }
    }
}

/// Partial task update (PATCH body); absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<Milestone>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self == &TaskUpdate::default()
    }

    /// Merge into `task`, overwriting only the fields that are set.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(deadline) = self.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(milestones) = &self.milestones {
            task.milestones = milestones.clone();
        }
    }

    /// The update that brings the stored task to `task`'s milestones and status
    pub fn milestones_of(task: &Task) -> Self {
        Self {
            status: Some(task.status),
            milestones: Some(task.milestones.clone()),
            ..Default::default()
        }
    }
}

// ============================================
// Context
// ============================================

/// Where a context entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextSource {
    Email,
    Whatsapp,
    #[default]
    Notes,
    Other,
}

impl ContextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSource::Email => "email",
            ContextSource::Whatsapp => "whatsapp",
            ContextSource::Notes => "notes",
            ContextSource::Other => "other",
        }
    }
}

impl std::fmt::Display for ContextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ContextSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "email" => Ok(ContextSource::Email),
            "whatsapp" => Ok(ContextSource::Whatsapp),
            "notes" => Ok(ContextSource::Notes),
            "other" => Ok(ContextSource::Other),
            _ => Err(format!("unknown context source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    pub id: u64,
    pub content: String,
    pub source: ContextSource,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContextEntry {
    pub content: String,
    pub source: ContextSource,
}

impl NewContextEntry {
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Context content cannot be empty.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

/// Categories available before the backend has been asked
pub fn default_categories() -> Vec<Category> {
    ["Work", "Personal", "Shopping", "Health"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| Category {
            id: i as u64 + 1,
            name: name.to_string(),
        })
        .collect()
}

// ============================================
// Users and authentication
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Login payload; `login` is the email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_email(&self.login) {
            return Err(Error::InvalidInput("Please enter a valid email.".to_string()));
        }
        if self.password.chars().count() < 8 {
            return Err(Error::InvalidInput("Password is required.".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < 3 {
            return Err(Error::InvalidInput("Name is required.".to_string()));
        }
        if self.username.trim().chars().count() < 3 {
            return Err(Error::InvalidInput("username is required.".to_string()));
        }
        if !is_valid_email(&self.email) {
            return Err(Error::InvalidInput("Please enter a valid email.".to_string()));
        }
        if self.password.chars().count() < 8 {
            return Err(Error::InvalidInput(
                "Password must be at least 8 characters.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Access token returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access: String,
}

/// Structural email check: `local@domain.tld`, no whitespace
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn task_with_milestones(status: TaskStatus, completed: &[bool]) -> Task {
        Task {
            id: 7,
            title: "Plan weekend trip".to_string(),
            description: String::new(),
            status,
            priority: TaskPriority::Low,
            category: "Personal".to_string(),
            deadline: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            milestones: completed
                .iter()
                .enumerate()
                .map(|(i, done)| Milestone {
                    id: i as u64 + 1,
                    title: format!("step {}", i + 1),
                    completed: *done,
                    completed_at: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_task_wire_format() {
        let raw = json!({
            "id": 1,
            "title": "Finalize Q3 report",
            "description": "Slides",
            "status": "in-progress",
            "priority": "urgent",
            "category": "Work",
            "deadline": "2024-05-02T17:00:00Z",
            "createdAt": "2024-05-01T09:00:00Z",
            "milestones": [{"id": 11, "title": "Gather data", "completed": true, "completedAt": "2024-05-01T10:00:00Z"}]
        });
        let task: Task = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::Urgent);
        assert!(task.milestones[0].completed);
        assert_eq!(serde_json::to_value(&task).unwrap(), raw);
    }

    #[test]
    fn test_task_missing_optionals() {
        let task: Task = serde_json::from_value(json!({
            "id": 2,
            "title": "Book dentist",
            "createdAt": "2024-05-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.deadline.is_none());
        assert!(task.milestones.is_empty());
    }

    #[test]
    fn test_toggle_milestone_derives_status() {
        let now = Utc::now();
        let mut task = task_with_milestones(TaskStatus::Todo, &[false, false]);

        task.toggle_milestone(1, true, now).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.milestones[0].completed_at, Some(now));

        task.toggle_milestone(2, true, now).unwrap();
        assert_eq!(task.status, TaskStatus::Done);

        task.toggle_milestone(1, false, now).unwrap();
        task.toggle_milestone(2, false, now).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.milestones.iter().all(|m| m.completed_at.is_none()));
    }

    #[test]
    fn test_toggle_unknown_milestone_leaves_task() {
        let mut task = task_with_milestones(TaskStatus::InProgress, &[true, false]);
        let before = task.clone();
        let err = task.toggle_milestone(99, true, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::MilestoneNotFound { task: 7, milestone: 99 }));
        assert_eq!(task, before);
    }

    #[test]
    fn test_zero_milestones_keep_status() {
        let task = task_with_milestones(TaskStatus::InProgress, &[]);
        assert_eq!(task.derived_status(), TaskStatus::InProgress);
        assert_eq!(task.progress(), None);
    }

    #[test]
    fn test_priority_from_score() {
        assert_eq!(TaskPriority::from_score(1.0), TaskPriority::Low);
        assert_eq!(TaskPriority::from_score(5.0), TaskPriority::Medium);
        assert_eq!(TaskPriority::from_score(8.0), TaskPriority::High);
        assert_eq!(TaskPriority::from_score(10.0), TaskPriority::Urgent);
    }

    #[test]
    fn test_task_update_apply() {
        let mut task = task_with_milestones(TaskStatus::Todo, &[]);
        let update = TaskUpdate {
            title: Some("New title".to_string()),
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        update.apply_to(&mut task);
        assert_eq!(task.title, "New title");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.category, "Personal");

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"title": "New title", "priority": "high"})
        );
        assert!(TaskUpdate::default().is_empty());
    }

    #[test]
    fn test_credentials_validation() {
        let ok = Credentials {
            login: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = Credentials {
            login: "ada.example.com".to_string(),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let short = Credentials {
            password: "short".to_string(),
            ..ok
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_registration_validation() {
        let reg = Registration {
            name: "Ada".to_string(),
            username: "ad".to_string(),
            email: "ada@example.com".to_string(),
            password: "long enough".to_string(),
        };
        let err = reg.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid input: username is required.");
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("whatsapp".parse::<ContextSource>(), Ok(ContextSource::Whatsapp));
        assert!("someday".parse::<TaskPriority>().is_err());
        assert_eq!(default_categories()[3].name, "Health");
    }
}
