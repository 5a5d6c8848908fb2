//! Score tasks 1-10 by urgency given the day's context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldError, FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "prioritizeTasks";

const TEMPLATE: &str = "\
You are an AI assistant designed to prioritize tasks based on their urgency and context.

Given the following list of tasks:
{{#each tasks}}
- Title: {{this.title}}
  Description: {{this.description}}
  Deadline: {{this.deadline}}
{{/each}}

And the following context entries:
{{#each contextEntries}}
- Content: {{this.content}}
  Timestamp: {{this.timestamp}}
{{/each}}

Determine the priority of each task on a scale of 1 to 10 (1 being the lowest, 10 being the highest).
Consider the context entries to understand the user's current situation and urgency.
Return the tasks with updated priority scores.

Prioritized Tasks:
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeTask {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeContextEntry {
    pub id: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeTasksInput {
    pub tasks: Vec<PrioritizeTask>,
    pub context_entries: Vec<PrioritizeContextEntry>,
}

/// A task echoed back with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedTask {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// 1 (lowest) to 10 (highest)
    pub priority: f64,
}

pub type PrioritizeTasksOutput = Vec<PrioritizedTask>;

fn task_fields(priority: FieldSchema) -> Vec<FieldSchema> {
    vec![
        FieldSchema::string("id", "Task identifier."),
        FieldSchema::string("title", "Task title."),
        FieldSchema::string("description", "Task description."),
        FieldSchema::string("category", "Task category.").optional(),
        FieldSchema::string("deadline", "Task deadline.").optional(),
        priority,
    ]
}

pub fn flow() -> Result<Flow<PrioritizeTasksInput, PrioritizeTasksOutput>> {
    let input_task = ObjectSchema::closed(task_fields(
        FieldSchema::new("priority", Kind::number(), "Current priority.").optional(),
    ));
    let context_entry = ObjectSchema::closed(vec![
        FieldSchema::string("id", "Entry identifier."),
        FieldSchema::string("content", "Entry text."),
        FieldSchema::string("timestamp", "When the entry was recorded."),
    ]);
    let input = ObjectSchema::closed(vec![
        FieldSchema::new(
            "tasks",
            Kind::array(Kind::object(input_task)),
            "A list of tasks to prioritize.",
        ),
        FieldSchema::new(
            "contextEntries",
            Kind::array(Kind::object(context_entry)),
            "A list of daily context entries.",
        ),
    ]);
    let output = Kind::array(Kind::object(ObjectSchema::closed(task_fields(
        FieldSchema::new(
            "priority",
            Kind::number_in(1.0, 10.0),
            "The updated priority score for the task.",
        ),
    ))));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?
        .with_output_check(ids_are_known);
    Ok(Flow::new(spec))
}

/// Every scored task must be one of the input tasks.
fn ids_are_known(input: &Value, output: Value) -> std::result::Result<Value, Vec<FieldError>> {
    let known: Vec<&str> = input
        .get("tasks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|task| task.get("id").and_then(Value::as_str))
        .collect();

    let errors: Vec<FieldError> = output
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(i, task)| {
            let id = task.get("id").and_then(Value::as_str).unwrap_or_default();
            (!known.contains(&id)).then(|| {
                FieldError::new(format!("[{i}].id"), format!("`{id}` is not one of the input tasks"))
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(errors)
    }
}
