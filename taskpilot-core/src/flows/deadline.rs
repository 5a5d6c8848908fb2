//! Suggest a deadline from the task and the day's context.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::{HarmBlockThreshold, HarmCategory, ModelConfig, SafetySetting};
use crate::schema::{FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "suggestDeadline";

const TEMPLATE: &str = "\
You are a helpful assistant that suggests deadlines for tasks based on user context and task complexity.

Consider the following task description, context entries, and task complexity to suggest a deadline for the task.
The deadline should be based on how long the task takes, and when they should do it based on their other context entries.

Task Description: {{{taskDescription}}}
{{#if contextEntries}}
Context Entries: {{{contextEntries}}}
{{/if}}
{{#if taskComplexity}}
Task Complexity: {{{taskComplexity}}}
{{/if}}

Suggest a deadline in ISO format (YYYY-MM-DDTHH:mm:ss.sssZ) and provide a reasoning for the suggested deadline.
Format the response as a JSON object.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestDeadlineInput {
    pub task_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_entries: Option<String>,
    /// e.g. easy, medium, hard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_complexity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestDeadlineOutput {
    /// ISO-8601 timestamp
    pub suggested_deadline: String,
    pub reasoning: String,
}

fn model_config() -> ModelConfig {
    ModelConfig {
        safety_settings: vec![
            SafetySetting::new(HarmCategory::HateSpeech, HarmBlockThreshold::BlockOnlyHigh),
            SafetySetting::new(HarmCategory::DangerousContent, HarmBlockThreshold::BlockNone),
            SafetySetting::new(
                HarmCategory::Harassment,
                HarmBlockThreshold::BlockMediumAndAbove,
            ),
            SafetySetting::new(
                HarmCategory::SexuallyExplicit,
                HarmBlockThreshold::BlockLowAndAbove,
            ),
        ],
        ..Default::default()
    }
}

pub fn flow() -> Result<Flow<SuggestDeadlineInput, SuggestDeadlineOutput>> {
    let input = ObjectSchema::closed(vec![
        FieldSchema::string("taskDescription", "The description of the task."),
        FieldSchema::string("contextEntries", "The user context entries for the day.").optional(),
        FieldSchema::string(
            "taskComplexity",
            "The complexity of the task (e.g., easy, medium, hard).",
        )
        .optional(),
    ]);
    let output = Kind::object(ObjectSchema::closed(vec![
        FieldSchema::new(
            "suggestedDeadline",
            Kind::date_time(),
            "The suggested deadline for the task in ISO format (YYYY-MM-DDTHH:mm:ss.sssZ).",
        ),
        FieldSchema::string("reasoning", "The reasoning behind the suggested deadline."),
    ]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, model_config())?;
    Ok(Flow::new(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::flow::testing::ScriptedInvoker;

    fn input() -> SuggestDeadlineInput {
        SuggestDeadlineInput {
            task_description: "Q3 report - Slides for the review".to_string(),
            context_entries: None,
            task_complexity: None,
        }
    }

    #[test]
    fn test_safety_settings_attached() {
        let flow = flow().unwrap();
        let settings = &flow.spec().model_config().safety_settings;
        assert_eq!(settings.len(), 4);
        assert_eq!(
            settings[1],
            SafetySetting::new(HarmCategory::DangerousContent, HarmBlockThreshold::BlockNone)
        );
    }

    #[test]
    fn test_optional_sections_omitted() {
        let prompt = flow().unwrap().render(&input()).unwrap();
        assert!(!prompt.contains("Context Entries:"));
        assert!(!prompt.contains("Task Complexity:"));

        let with_all = SuggestDeadlineInput {
            context_entries: Some("Boss wants it Wednesday".to_string()),
            task_complexity: Some("hard".to_string()),
            ..input()
        };
        let prompt = flow().unwrap().render(&with_all).unwrap();
        assert!(prompt.contains("Context Entries: Boss wants it Wednesday\nTask Complexity: hard\n"));
    }

    #[tokio::test]
    async fn test_iso_deadline_accepted() {
        let invoker = ScriptedInvoker::answering(
            r#"{"suggestedDeadline": "2024-05-03T17:00:00.000Z", "reasoning": "Two days of work"}"#,
        );
        let out = flow().unwrap().invoke(&invoker, &input()).await.unwrap();
        assert_eq!(out.suggested_deadline, "2024-05-03T17:00:00.000Z");
    }

    #[tokio::test]
    async fn test_non_iso_deadline_rejected() {
        let invoker = ScriptedInvoker::answering(
            r#"{"suggestedDeadline": "next Friday", "reasoning": "soon"}"#,
        );
        let err = flow().unwrap().invoke(&invoker, &input()).await.unwrap_err();
        match err {
            FlowError::InvalidOutput(errors) => assert!(errors.has_path("suggestedDeadline")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
