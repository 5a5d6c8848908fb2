//! Pull the main topics out of a set of context entries.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{Flow, FlowSpec};
use crate::model::ModelConfig;
use crate::schema::{FieldSchema, Kind, ObjectSchema};

pub const NAME: &str = "extractContextKeywords";

const TEMPLATE: &str = "\
You are an expert keyword extractor.

Given the following context entries, extract the most relevant keywords that represent the main topics and themes. Return the keywords as a list of strings.

Context Entries:
{{#each contextEntries}}
- {{{this}}}
{{/each}}

Keywords:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractKeywordsInput {
    pub context_entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractKeywordsOutput {
    pub keywords: Vec<String>,
}

pub fn flow() -> Result<Flow<ExtractKeywordsInput, ExtractKeywordsOutput>> {
    let input = ObjectSchema::closed(vec![FieldSchema::new(
        "contextEntries",
        Kind::array(Kind::string()),
        "An array of context entries from which to extract keywords.",
    )]);
    let output = Kind::object(ObjectSchema::closed(vec![FieldSchema::new(
        "keywords",
        Kind::array(Kind::string()),
        "An array of extracted keywords.",
    )]));

    let spec = FlowSpec::new(NAME, input, output, TEMPLATE, ModelConfig::default())?;
    Ok(Flow::new(spec))
}
