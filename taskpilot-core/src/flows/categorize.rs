//! Pick the best category for a task from the user's own list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldError, FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "categorizeTask";

const TEMPLATE: &str = "\
You are an expert in task categorization. Given the task content and the provided context, determine the most appropriate category for the task from the list of available categories.

Task Content: {{{taskContent}}}
Context: {{{context}}}

Available Categories:
{{#each availableCategories}}
- {{{this}}}
{{/each}}

Respond with a JSON object containing the category and a confidence score (0-1).";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeTaskInput {
    pub task_content: String,
    pub context: String,
    pub available_categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeTaskOutput {
    /// Always one of the supplied categories, in the supplied spelling
    pub category: String,
    pub confidence: f64,
}

pub fn flow() -> Result<Flow<CategorizeTaskInput, CategorizeTaskOutput>> {
    let input = ObjectSchema::closed(vec![
        FieldSchema::string("taskContent", "The content of the task to categorize."),
        FieldSchema::string("context", "The context related to the task."),
        FieldSchema::new(
            "availableCategories",
            Kind::array(Kind::string()),
            "A list of available categories to choose from.",
        ),
    ]);
    let output = Kind::object(ObjectSchema::closed(vec![
        FieldSchema::string(
            "category",
            "The predicted category for the task from the available list.",
        ),
        FieldSchema::new(
            "confidence",
            Kind::number_in(0.0, 1.0),
            "The confidence level of the category prediction (0-1).",
        ),
    ]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?
        .with_output_check(category_is_available);
    Ok(Flow::new(spec))
}

/// The answer must name a supplied category (case-insensitive); it is
/// normalized to the supplied spelling.
fn category_is_available(
    input: &Value,
    mut output: Value,
) -> std::result::Result<Value, Vec<FieldError>> {
    let answer = output
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let available = input
        .get("availableCategories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let matched = available
        .iter()
        .filter_map(Value::as_str)
        .find(|candidate| candidate.eq_ignore_ascii_case(&answer));

    match matched {
        Some(category) => {
            output["category"] = Value::String(category.to_string());
            Ok(output)
        }
        None => Err(vec![FieldError::new(
            "category",
            format!("`{answer}` is not one of the available categories"),
        )]),
    }
}
