//! Task backend abstraction.
//!
//! [`Backend`] is the REST surface the stores talk to. [`crate::api::ApiClient`]
//! implements it over HTTP; [`InMemoryBackend`] implements it in process,
//! seeded with demo data, for offline use and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, Utc};

use crate::error::{BackendError, Error, Result};
use crate::types::{
    default_categories, AuthToken, Category, ContextEntry, ContextSource, Credentials, Milestone,
    NewContextEntry, NewTask, Registration, Task, TaskPriority, TaskStatus, TaskUpdate, User,
};

#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken>;
    async fn register(&self, registration: &Registration) -> Result<()>;

    async fn list_context(&self) -> Result<Vec<ContextEntry>>;
    async fn create_context(&self, entry: &NewContextEntry) -> Result<ContextEntry>;

    /// The REST API has no category endpoint; the defaults apply unless overridden
    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(default_categories())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>>;
    async fn today_tasks(&self) -> Result<Vec<Task>>;
    async fn get_task(&self, id: u64) -> Result<Task>;
    async fn create_task(&self, task: &NewTask) -> Result<Task>;
    async fn update_task(&self, id: u64, update: &TaskUpdate) -> Result<Task>;
    async fn delete_task(&self, id: u64) -> Result<()>;
    /// Create the given tasks, keeping the ones already stored
    async fn import_tasks(&self, tasks: &[Task]) -> Result<()>;

    async fn get_user(&self) -> Result<User>;
    async fn update_user(&self, user: &User) -> Result<User>;
    async fn delete_user(&self) -> Result<()>;
}

#[derive(Debug)]
struct Data {
    tasks: Vec<Task>,
    context: Vec<ContextEntry>,
    categories: Vec<Category>,
    user: Option<User>,
}

/// In-process backend.
#[derive(Debug)]
pub struct InMemoryBackend {
    data: Mutex<Data>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::empty()
    }
}

impl InMemoryBackend {
    /// No tasks, no context, no user
    pub fn empty() -> Self {
        Self {
            data: Mutex::new(Data {
                tasks: Vec::new(),
                context: Vec::new(),
                categories: default_categories(),
                user: None,
            }),
        }
    }

    /// Demo tasks, context entries and user, timed relative to `now`
    pub fn with_demo_data(now: DateTime<Utc>) -> Self {
        Self {
            data: Mutex::new(Data {
                tasks: demo_tasks(now),
                context: demo_context(now),
                categories: default_categories(),
                user: Some(demo_user()),
            }),
        }
    }

    pub fn seeded() -> Self {
        Self::with_demo_data(Utc::now())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Data> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found() -> Error {
    Error::Backend(BackendError::from_status(404, None))
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        credentials.validate()?;
        let data = self.lock();
        match &data.user {
            Some(user) if user.email == credentials.login => Ok(AuthToken {
                access: format!("offline-{}", user.id),
            }),
            _ => Err(Error::Backend(BackendError::from_status(401, None))),
        }
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        registration.validate()?;
        let mut data = self.lock();
        if let Some(user) = &data.user {
            if user.email == registration.email || user.username == registration.username {
                return Err(Error::Backend(BackendError::from_status(409, None)));
            }
        }
        let id = data.user.as_ref().map(|u| u.id + 1).unwrap_or(1);
        data.user = Some(User {
            id,
            name: registration.name.clone(),
            email: registration.email.clone(),
            username: registration.username.clone(),
            image: None,
        });
        Ok(())
    }

    async fn list_context(&self) -> Result<Vec<ContextEntry>> {
        Ok(self.lock().context.clone())
    }

    async fn create_context(&self, entry: &NewContextEntry) -> Result<ContextEntry> {
        entry.validate()?;
        let mut data = self.lock();
        let created = ContextEntry {
            id: data.context.iter().map(|e| e.id).max().unwrap_or(0) + 1,
            content: entry.content.clone(),
            source: entry.source,
            timestamp: Utc::now(),
        };
        data.context.insert(0, created.clone());
        Ok(created)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.lock().categories.clone())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.lock().tasks.clone())
    }

    async fn today_tasks(&self) -> Result<Vec<Task>> {
        let today = Local::now().date_naive();
        Ok(self
            .lock()
            .tasks
            .iter()
            .filter(|t| t.is_due_on(today))
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: u64) -> Result<Task> {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        task.validate()?;
        let mut data = self.lock();
        let id = data.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let created = task.clone().into_task(id, Utc::now());
        data.tasks.insert(0, created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: u64, update: &TaskUpdate) -> Result<Task> {
        let mut data = self.lock();
        let task = data
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(not_found)?;
        update.apply_to(task);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: u64) -> Result<()> {
        let mut data = self.lock();
        let before = data.tasks.len();
        data.tasks.retain(|t| t.id != id);
        if data.tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn import_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.lock().tasks.extend_from_slice(tasks);
        Ok(())
    }

    async fn get_user(&self) -> Result<User> {
        self.lock().user.clone().ok_or_else(not_found)
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut data = self.lock();
        let current = data.user.as_mut().ok_or_else(not_found)?;
        let id = current.id;
        *current = User { id, ..user.clone() };
        Ok(current.clone())
    }

    async fn delete_user(&self) -> Result<()> {
        self.lock().user.take().map(|_| ()).ok_or_else(not_found)
    }
}

// ============================================
// Demo data
// ============================================

pub fn demo_user() -> User {
    User {
        id: 1,
        name: "Demo User".to_string(),
        email: "demo@example.com".to_string(),
        username: "demo".to_string(),
        image: None,
    }
}

fn done_milestone(id: u64, title: &str, at: DateTime<Utc>) -> Milestone {
    Milestone {
        completed: true,
        completed_at: Some(at),
        ..Milestone::new(id, title)
    }
}

fn demo_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let days_ago = |n: i64| now - Duration::days(n);
    vec![
        Task {
            id: 1,
            title: "Finalize Q3 report presentation".to_string(),
            description: "Gather all the data from the team and create the final presentation slides for the Q3 review meeting.".to_string(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::Urgent,
            category: "Work".to_string(),
            deadline: Some(now),
            created_at: now,
            milestones: vec![
                done_milestone(11, "Gather sales data", days_ago(1)),
                done_milestone(12, "Collect marketing metrics", now),
                Milestone::new(13, "Draft presentation slides"),
                Milestone::new(14, "Review with management"),
            ],
        },
        Task {
            id: 2,
            title: "Book dentist appointment".to_string(),
            description: "Call the clinic to schedule a routine check-up.".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            category: "Health".to_string(),
            deadline: None,
            created_at: days_ago(1),
            milestones: Vec::new(),
        },
        Task {
            id: 3,
            title: "Buy groceries for the week".to_string(),
            description: "Milk, eggs, bread, chicken, and vegetables.".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::High,
            category: "Shopping".to_string(),
            deadline: Some(now),
            created_at: now,
            milestones: Vec::new(),
        },
        Task {
            id: 4,
            title: "Plan weekend trip".to_string(),
            description: "Research destinations and book accommodation for the upcoming long weekend.".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            category: "Personal".to_string(),
            deadline: None,
            created_at: days_ago(5),
            milestones: vec![
                done_milestone(41, "Choose destination", days_ago(3)),
                Milestone::new(42, "Find hotel/airbnb"),
                Milestone::new(43, "Book travel tickets"),
            ],
        },
        Task {
            id: 5,
            title: "Review project proposal from team B".to_string(),
            description: "Read through the new proposal and provide feedback by end of day.".to_string(),
            status: TaskStatus::Done,
            priority: TaskPriority::High,
            category: "Work".to_string(),
            deadline: Some(days_ago(1)),
            created_at: days_ago(2),
            milestones: Vec::new(),
        },
    ]
}

fn demo_context(now: DateTime<Utc>) -> Vec<ContextEntry> {
    let hours_ago = |n: i64| now - Duration::hours(n);
    vec![
        ContextEntry {
            id: 1,
            content: "From: boss@example.com - \"Hey, can we move the deadline for the Q3 report to this Wednesday? It's super important we get it to the stakeholders ASAP.\"".to_string(),
            source: ContextSource::Email,
            timestamp: hours_ago(4),
        },
        ContextEntry {
            id: 2,
            content: "Reminder from calendar: \"Dentist check-up next month\"".to_string(),
            source: ContextSource::Notes,
            timestamp: hours_ago(8),
        },
        ContextEntry {
            id: 3,
            content: "WhatsApp from Sarah: \"Don't forget we need to buy a birthday gift for mom!\"".to_string(),
            source: ContextSource::Whatsapp,
            timestamp: hours_ago(1),
        },
    ]
}
