//! Suggest time blocks for open tasks.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "suggestCalendarSlots";

const TEMPLATE: &str = "\
You are a personal assistant helping the user to schedule their tasks in a calendar.

Given the following context and tasks, suggest calendar slots in ISO format to complete the tasks.
Explain your reasoning behind the suggested slots.

Context: {{{context}}}
Tasks: {{{tasks}}}

Return the suggested slots and reasoning in the format specified in the output schema.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSlotsInput {
    /// Context entry contents, one per line
    pub context: String,
    /// Task titles, one per line
    pub tasks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSlotsOutput {
    /// ISO-8601 start times
    pub suggested_slots: Vec<String>,
    pub reasoning: String,
}

pub fn flow() -> Result<Flow<CalendarSlotsInput, CalendarSlotsOutput>> {
    let input = ObjectSchema::closed(vec![
        FieldSchema::string(
            "context",
            "The daily context entries, including WhatsApp messages, emails, and notes.",
        ),
        FieldSchema::string("tasks", "A list of tasks to be scheduled."),
    ]);
    let output = Kind::object(ObjectSchema::closed(vec![
        FieldSchema::new(
            "suggestedSlots",
            Kind::array(Kind::date_time()),
            "A list of suggested calendar slots in ISO format.",
        ),
        FieldSchema::string("reasoning", "The reasoning behind the suggested slots."),
    ]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?;
    Ok(Flow::new(spec))
}
