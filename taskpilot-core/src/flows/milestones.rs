//! Break a task into a handful of actionable milestones.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "suggestTaskMilestones";

// 3-5 milestones is guidance for the model; the output contract only asks for a list.
const TEMPLATE: &str = "\
You are an expert project manager. Based on the task title and description, break it down into a short list of 3-5 actionable milestones or checkpoints.

Task Title: {{{title}}}
{{#if description}}
Task Description: {{{description}}}
{{/if}}

Provide a list of clear, concise milestones that would help someone complete this task.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestMilestonesInput {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestMilestonesOutput {
    pub milestones: Vec<String>,
}

pub fn flow() -> Result<Flow<SuggestMilestonesInput, SuggestMilestonesOutput>> {
    let input = ObjectSchema::closed(vec![
        FieldSchema::string("title", "The title of the task."),
        FieldSchema::string("description", "The description of the task.").optional(),
    ]);
    let output = Kind::object(ObjectSchema::closed(vec![FieldSchema::new(
        "milestones",
        Kind::array(Kind::string()),
        "A list of suggested, actionable milestones to complete the task.",
    )]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?;
    Ok(Flow::new(spec))
}
