//! Overall and per-entry sentiment of context entries.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "analyzeSentiment";

const TEMPLATE: &str = "\
You are an assistant that reads a user's daily context entries and judges their emotional tone.

For each context entry, classify its sentiment as positive, neutral or negative. Then summarize the overall sentiment of the day in a short phrase.

Context Entries:
{{#each contextEntries}}
- {{{this}}}
{{/each}}

Return the overall sentiment and a breakdown with one item per entry, quoting the entry text.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentInput {
    pub context_entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySentiment {
    pub entry: String,
    pub sentiment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentOutput {
    pub overall_sentiment: String,
    pub sentiment_breakdown: Vec<EntrySentiment>,
}

pub fn flow() -> Result<Flow<SentimentInput, SentimentOutput>> {
    let input = ObjectSchema::closed(vec![FieldSchema::new(
        "contextEntries",
        Kind::array(Kind::string()),
        "The context entries to analyze.",
    )]);
    let breakdown = ObjectSchema::closed(vec![
        FieldSchema::string("entry", "The context entry text."),
        FieldSchema::string("sentiment", "positive, neutral or negative."),
    ]);
    let output = Kind::object(ObjectSchema::closed(vec![
        FieldSchema::string("overallSentiment", "The overall sentiment of the entries."),
        FieldSchema::new(
            "sentimentBreakdown",
            Kind::array(Kind::object(breakdown)),
            "Sentiment for each entry.",
        ),
    ]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?;
    Ok(Flow::new(spec))
}
