//! The eight assistant flows.
//!
//! Each submodule declares one [`Flow`](crate::flow::Flow) as data: typed
//! input/output structs, their schemas and a prompt template.
//! [`TaskAssistant`] bundles them with a shared [`ModelInvoker`] and builds
//! flow inputs from domain values.

pub mod calendar_slots;
pub mod categorize;
pub mod deadline;
pub mod enhance_description;
pub mod extract_keywords;
pub mod milestones;
pub mod prioritize;
pub mod sentiment;

use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{FlowError, Result};
use crate::flow::{Flow, FlowSpec};
use crate::model::{HttpModelInvoker, ModelInvoker, WithTimeout};
use crate::types::{Category, ContextEntry, Task, TaskStatus};

pub use calendar_slots::{CalendarSlotsInput, CalendarSlotsOutput};
pub use categorize::{CategorizeTaskInput, CategorizeTaskOutput};
pub use deadline::{SuggestDeadlineInput, SuggestDeadlineOutput};
pub use enhance_description::{EnhanceDescriptionInput, EnhanceDescriptionOutput};
pub use extract_keywords::{ExtractKeywordsInput, ExtractKeywordsOutput};
pub use milestones::{SuggestMilestonesInput, SuggestMilestonesOutput};
pub use prioritize::{
    PrioritizeContextEntry, PrioritizeTask, PrioritizeTasksInput, PrioritizeTasksOutput,
    PrioritizedTask,
};
pub use sentiment::{EntrySentiment, SentimentInput, SentimentOutput};

type FlowResult<T> = std::result::Result<T, FlowError>;

/// All flows over one model invoker.
///
/// Holds no per-call state, so calls may run concurrently.
pub struct TaskAssistant {
    invoker: Arc<dyn ModelInvoker>,
    categorize: Flow<CategorizeTaskInput, CategorizeTaskOutput>,
    enhance_description: Flow<EnhanceDescriptionInput, EnhanceDescriptionOutput>,
    extract_keywords: Flow<ExtractKeywordsInput, ExtractKeywordsOutput>,
    prioritize: Flow<PrioritizeTasksInput, PrioritizeTasksOutput>,
    calendar_slots: Flow<CalendarSlotsInput, CalendarSlotsOutput>,
    sentiment: Flow<SentimentInput, SentimentOutput>,
    deadline: Flow<SuggestDeadlineInput, SuggestDeadlineOutput>,
    milestones: Flow<SuggestMilestonesInput, SuggestMilestonesOutput>,
}

impl TaskAssistant {
    /// Build every flow; fails if any definition is inconsistent.
    pub fn new(invoker: Arc<dyn ModelInvoker>) -> Result<Self> {
        Ok(Self {
            invoker,
            categorize: categorize::flow()?,
            enhance_description: enhance_description::flow()?,
            extract_keywords: extract_keywords::flow()?,
            prioritize: prioritize::flow()?,
            calendar_slots: calendar_slots::flow()?,
            sentiment: sentiment::flow()?,
            deadline: deadline::flow()?,
            milestones: milestones::flow()?,
        })
    }

    /// Hosted provider from config, every call bounded by `timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = HttpModelInvoker::new(config)?;
        let invoker = WithTimeout::new(http, Duration::from_secs(config.timeout_secs));
        tracing::info!(
            provider = config.provider.as_str(),
            model = config.model_name(),
            timeout_secs = config.timeout_secs,
            "Task assistant ready"
        );
        Self::new(Arc::new(invoker))
    }

    /// Every flow definition, for listing and diagnostics
    pub fn specs(&self) -> Vec<&FlowSpec> {
        vec![
            self.categorize.spec(),
            self.enhance_description.spec(),
            self.extract_keywords.spec(),
            self.prioritize.spec(),
            self.calendar_slots.spec(),
            self.sentiment.spec(),
            self.deadline.spec(),
            self.milestones.spec(),
        ]
    }

    pub async fn categorize(&self, input: &CategorizeTaskInput) -> FlowResult<CategorizeTaskOutput> {
        self.categorize.invoke(self.invoker.as_ref(), input).await
    }

    pub async fn enhance_description(
        &self,
        input: &EnhanceDescriptionInput,
    ) -> FlowResult<EnhanceDescriptionOutput> {
        self.enhance_description
            .invoke(self.invoker.as_ref(), input)
            .await
    }

    pub async fn extract_keywords(
        &self,
        input: &ExtractKeywordsInput,
    ) -> FlowResult<ExtractKeywordsOutput> {
        self.extract_keywords.invoke(self.invoker.as_ref(), input).await
    }

    pub async fn prioritize(&self, input: &PrioritizeTasksInput) -> FlowResult<PrioritizeTasksOutput> {
        self.prioritize.invoke(self.invoker.as_ref(), input).await
    }

    pub async fn suggest_calendar_slots(
        &self,
        input: &CalendarSlotsInput,
    ) -> FlowResult<CalendarSlotsOutput> {
        self.calendar_slots.invoke(self.invoker.as_ref(), input).await
    }

    pub async fn analyze_sentiment(&self, input: &SentimentInput) -> FlowResult<SentimentOutput> {
        self.sentiment.invoke(self.invoker.as_ref(), input).await
    }

    pub async fn suggest_deadline(
        &self,
        input: &SuggestDeadlineInput,
    ) -> FlowResult<SuggestDeadlineOutput> {
        self.deadline.invoke(self.invoker.as_ref(), input).await
    }

    pub async fn suggest_milestones(
        &self,
        input: &SuggestMilestonesInput,
    ) -> FlowResult<SuggestMilestonesOutput> {
        self.milestones.invoke(self.invoker.as_ref(), input).await
    }
}

// ============================================
// Inputs from domain values
// ============================================

fn joined_contents(entries: &[ContextEntry]) -> String {
    entries
        .iter()
        .map(|e| e.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn categorize_input(
    task: &Task,
    context: &[ContextEntry],
    categories: &[Category],
) -> CategorizeTaskInput {
    CategorizeTaskInput {
        task_content: task.summary(),
        context: joined_contents(context),
        available_categories: categories.iter().map(|c| c.name.clone()).collect(),
    }
}

pub fn enhance_input(task: &Task, context: &[ContextEntry]) -> EnhanceDescriptionInput {
    EnhanceDescriptionInput {
        task_description: task.summary(),
        context_entries: joined_contents(context),
    }
}

pub fn keywords_input(context: &[ContextEntry]) -> ExtractKeywordsInput {
    ExtractKeywordsInput {
        context_entries: context.iter().map(|e| e.content.clone()).collect(),
    }
}

pub fn prioritize_input(tasks: &[Task], context: &[ContextEntry]) -> PrioritizeTasksInput {
    PrioritizeTasksInput {
        tasks: tasks
            .iter()
            .map(|t| PrioritizeTask {
                id: t.id.to_string(),
                title: t.title.clone(),
                description: t.description.clone(),
                category: Some(t.category.clone()).filter(|c| !c.is_empty()),
                deadline: t.deadline.map(|d| d.to_rfc3339()),
                priority: None,
            })
            .collect(),
        context_entries: context
            .iter()
            .map(|e| PrioritizeContextEntry {
                id: e.id.to_string(),
                content: e.content.clone(),
                timestamp: e.timestamp.to_rfc3339(),
            })
            .collect(),
    }
}

/// Titles of unfinished tasks and all context contents, one per line
pub fn calendar_input(tasks: &[Task], context: &[ContextEntry]) -> CalendarSlotsInput {
    CalendarSlotsInput {
        context: joined_contents(context),
        tasks: tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .map(|t| t.title.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn sentiment_input(context: &[ContextEntry]) -> SentimentInput {
    SentimentInput {
        context_entries: context.iter().map(|e| e.content.clone()).collect(),
    }
}

pub fn deadline_input(
    task: &Task,
    context: &[ContextEntry],
    complexity: Option<&str>,
) -> SuggestDeadlineInput {
    SuggestDeadlineInput {
        task_description: format!("{} - {}", task.title, task.description),
        context_entries: Some(joined_contents(context)).filter(|c| !c.is_empty()),
        task_complexity: complexity.map(str::to_string),
    }
}

pub fn milestones_input(task: &Task) -> SuggestMilestonesInput {
    SuggestMilestonesInput {
        title: task.title.clone(),
        description: Some(task.description.clone()).filter(|d| !d.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::testing::ScriptedInvoker;
    use crate::types::{ContextSource, TaskPriority};
    use chrono::{TimeZone, Utc};

    fn task(id: u64, title: &str, status: TaskStatus) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: format!("{title} details"),
            status,
            priority: TaskPriority::Medium,
            category: String::new(),
            deadline: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            milestones: Vec::new(),
        }
    }

    fn entry(id: u64, content: &str) -> ContextEntry {
        ContextEntry {
            id,
            content: content.to_string(),
            source: ContextSource::Notes,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_all_flows_build() {
        let assistant =
            TaskAssistant::new(Arc::new(ScriptedInvoker::answering("{}"))).unwrap();
        let names: Vec<_> = assistant.specs().iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"suggestDeadline"));
    }

    #[test]
    fn test_calendar_input_skips_done_tasks() {
        let tasks = vec![
            task(1, "Report", TaskStatus::InProgress),
            task(2, "Old review", TaskStatus::Done),
            task(3, "Groceries", TaskStatus::Todo),
        ];
        let context = vec![entry(1, "Meeting at 10"), entry(2, "Gym at 6")];
        let input = calendar_input(&tasks, &context);
        assert_eq!(input.tasks, "Report\nGroceries");
        assert_eq!(input.context, "Meeting at 10\nGym at 6");
    }

    #[test]
    fn test_deadline_input_uses_title_and_description() {
        let input = deadline_input(&task(1, "Report", TaskStatus::Todo), &[], None);
        assert_eq!(input.task_description, "Report - Report details");
        assert_eq!(input.context_entries, None);
    }

    #[test]
    fn test_prioritize_input_stringifies_ids() {
        let input = prioritize_input(&[task(42, "Report", TaskStatus::Todo)], &[entry(7, "x")]);
        assert_eq!(input.tasks[0].id, "42");
        assert_eq!(input.tasks[0].category, None);
        assert_eq!(input.context_entries[0].id, "7");
        assert_eq!(input.context_entries[0].timestamp, "2024-05-01T08:00:00+00:00");
    }

    #[tokio::test]
    async fn test_flows_run_concurrently() {
        let invoker = Arc::new(ScriptedInvoker::answering(r#"{"keywords": ["a"]}"#));
        let assistant = TaskAssistant::new(invoker.clone()).unwrap();
        let input = keywords_input(&[entry(1, "one")]);
        let (a, b) = tokio::join!(
            assistant.extract_keywords(&input),
            assistant.extract_keywords(&input)
        );
        assert_eq!(a.unwrap().keywords, vec!["a".to_string()]);
        assert_eq!(b.unwrap().keywords, vec!["a".to_string()]);
        assert_eq!(invoker.calls(), 2);
    }
}
