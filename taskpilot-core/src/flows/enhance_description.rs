//! Enrich a task description with details from the day's context.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "enhanceTaskDescription";

const TEMPLATE: &str = "\
You are an AI assistant designed to enhance task descriptions by incorporating relevant details from daily context entries.

Original Task Description: {{{taskDescription}}}

Daily Context Entries: {{{contextEntries}}}

Please provide an enhanced task description that includes specific and actionable details from the context entries to provide a more complete and informative understanding of what needs to be done.
Focus on identifying the most relevant information to improve the task description.
The enhanced task description should be clear and concise.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceDescriptionInput {
    pub task_description: String,
    /// All of the day's entries as one string
    pub context_entries: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceDescriptionOutput {
    pub enhanced_task_description: String,
}

pub fn flow() -> Result<Flow<EnhanceDescriptionInput, EnhanceDescriptionOutput>> {
    let input = ObjectSchema::closed(vec![
        FieldSchema::string("taskDescription", "The original task description to be enhanced."),
        FieldSchema::string(
            "contextEntries",
            "The context entries for the day, as a single string.",
        ),
    ]);
    let output = Kind::object(ObjectSchema::closed(vec![FieldSchema::string(
        "enhancedTaskDescription",
        "The enhanced task description with context-aware details.",
    )]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?;
    Ok(Flow::new(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::flow::testing::ScriptedInvoker;

    fn input() -> EnhanceDescriptionInput {
        EnhanceDescriptionInput {
            task_description: "Finish report".to_string(),
            context_entries: "Boss wants it by Wednesday".to_string(),
        }
    }

    #[test]
    fn test_prompt_interpolates_raw_text() {
        let input = EnhanceDescriptionInput {
            task_description: "Q&A <draft>".to_string(),
            ..input()
        };
        let prompt = flow().unwrap().render(&input).unwrap();
        assert!(prompt.contains("Original Task Description: Q&A <draft>\n"));
        assert!(prompt.contains("Daily Context Entries: Boss wants it by Wednesday\n"));
    }

    #[tokio::test]
    async fn test_enhanced_description_returned() {
        let invoker = ScriptedInvoker::answering(
            r#"{"enhancedTaskDescription": "Finish the Q3 report by Wednesday for stakeholders"}"#,
        );
        let out = flow().unwrap().invoke(&invoker, &input()).await.unwrap();
        assert_eq!(
            out.enhanced_task_description,
            "Finish the Q3 report by Wednesday for stakeholders"
        );
    }

    #[tokio::test]
    async fn test_extra_output_field_rejected() {
        let invoker = ScriptedInvoker::answering(
            r#"{"enhancedTaskDescription": "x", "notes": "y"}"#,
        );
        let err = flow().unwrap().invoke(&invoker, &input()).await.unwrap_err();
        match err {
            FlowError::InvalidOutput(errors) => assert!(errors.has_path("notes")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
