//! Generic flow runtime.
//!
//! A flow is data: a [`FlowSpec`] names the input and output shapes, the
//! prompt template and the model tunables. Running one is always the same
//! five steps, implemented once in [`FlowSpec::run`]:
//!
//! 1. validate the input (failure: [`FlowError::InvalidInput`], model not called)
//! 2. render the prompt
//! 3. call the [`ModelInvoker`]
//! 4. parse, validate and coerce the answer (failure: [`FlowError::InvalidOutput`])
//! 5. return the coerced value
//!
//! [`Flow`] adds the typed serde boundary on top.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Error, FlowError, Result};
use crate::model::{ModelConfig, ModelInvoker, ModelRequest};
use crate::schema::{self, FieldError, Kind, ObjectSchema, ValidationErrors};
use crate::template::Template;

/// Contract that depends on the input as well as the output.
///
/// Receives the validated input and the coerced output; may normalize the
/// output further.
pub type OutputCheck = fn(&Value, Value) -> std::result::Result<Value, Vec<FieldError>>;

/// Immutable description of one flow.
#[derive(Debug, Clone)]
pub struct FlowSpec {
    name: &'static str,
    input_schema: Kind,
    output_schema: Kind,
    output_json_schema: Value,
    template: Template,
    model_config: ModelConfig,
    output_check: Option<OutputCheck>,
}

impl FlowSpec {
    /// Build a spec, compiling the template against the input schema.
    pub fn new(
        name: &'static str,
        input: ObjectSchema,
        output: Kind,
        template: &str,
        model_config: ModelConfig,
    ) -> Result<Self> {
        let definition_error = |message: String| Error::FlowDefinition {
            flow: name.to_string(),
            message,
        };

        input
            .check_unique_names()
            .map_err(|m| definition_error(format!("input schema: {m}")))?;
        if let Kind::Object(object) = &output {
            object
                .check_unique_names()
                .map_err(|m| definition_error(format!("output schema: {m}")))?;
        }
        if let Kind::Array(item) = &output {
            if let Kind::Object(object) = item.as_ref() {
                object
                    .check_unique_names()
                    .map_err(|m| definition_error(format!("output schema: {m}")))?;
            }
        }

        let template = Template::compile(template, &input)
            .map_err(|e| definition_error(format!("template: {e}")))?;

        Ok(Self {
            name,
            output_json_schema: output.to_json_schema(),
            input_schema: Kind::Object(input),
            output_schema: output,
            template,
            model_config,
            output_check: None,
        })
    }

    pub fn with_output_check(mut self, check: OutputCheck) -> Self {
        self.output_check = Some(check);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn output_schema(&self) -> &Kind {
        &self.output_schema
    }

    /// Steps 1 and 2: validate the input and render the prompt.
    pub fn prepare(&self, input: &Value) -> std::result::Result<(Value, String), FlowError> {
        let input = schema::validate(input, &self.input_schema).map_err(FlowError::InvalidInput)?;
        let prompt = self.template.render(&input);
        Ok((input, prompt))
    }

    /// Step 4: parse and validate raw model text.
    pub fn accept(&self, input: &Value, raw: &str) -> std::result::Result<Value, FlowError> {
        let parsed = parse_structured(raw).map_err(FlowError::InvalidOutput)?;
        let output =
            schema::validate(&parsed, &self.output_schema).map_err(FlowError::InvalidOutput)?;
        match self.output_check {
            Some(check) => {
                check(input, output).map_err(|errors| FlowError::InvalidOutput(ValidationErrors(errors)))
            }
            None => Ok(output),
        }
    }

    /// Run all five steps.
    pub async fn run(
        &self,
        invoker: &dyn ModelInvoker,
        input: &Value,
    ) -> std::result::Result<Value, FlowError> {
        let (input, prompt) = match self.prepare(input) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(flow = self.name, error = %e, "Rejected flow input");
                return Err(e);
            }
        };

        let prompt_hash = hex::encode(Sha256::digest(prompt.as_bytes()));
        tracing::debug!(
            flow = self.name,
            prompt_hash = %prompt_hash,
            prompt_len = prompt.len(),
            "Invoking model"
        );

        let raw = invoker
            .invoke(ModelRequest {
                flow: self.name,
                prompt: &prompt,
                output_schema: &self.output_json_schema,
                config: &self.model_config,
            })
            .await
            .map_err(|e| {
                tracing::warn!(flow = self.name, error = %e, "Model call failed");
                FlowError::Provider(e)
            })?;

        self.accept(&input, &raw).map_err(|e| {
            tracing::warn!(flow = self.name, prompt_hash = %prompt_hash, error = %e, "Model output violates contract");
            e
        })
    }
}

/// Best-effort JSON extraction: the whole text, else the outermost
/// object/array span (models like wrapping answers in code fences).
pub fn parse_structured(raw: &str) -> std::result::Result<Value, ValidationErrors> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let not_json = |reason: String| ValidationErrors::single("$", reason);
    let start = trimmed
        .find(['{', '['])
        .ok_or_else(|| not_json("response did not contain JSON".to_string()))?;
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or_else(|| not_json("response JSON bounds are invalid".to_string()))?;

    serde_json::from_str::<Value>(&trimmed[start..=end])
        .map_err(|e| not_json(format!("response is not valid JSON: {e}")))
}

/// A [`FlowSpec`] with typed input and output.
#[derive(Debug, Clone)]
pub struct Flow<I, O> {
    spec: FlowSpec,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Flow<I, O>
where
    I: Serialize,
    O: DeserializeOwned,
{
    pub fn new(spec: FlowSpec) -> Self {
        Self {
            spec,
            _types: PhantomData,
        }
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    /// Render the prompt for `input` without calling the model.
    pub fn render(&self, input: &I) -> std::result::Result<String, FlowError> {
        let value = to_input_value(input)?;
        self.spec.prepare(&value).map(|(_, prompt)| prompt)
    }

    pub async fn invoke(
        &self,
        invoker: &dyn ModelInvoker,
        input: &I,
    ) -> std::result::Result<O, FlowError> {
        let value = to_input_value(input)?;
        let output = self.spec.run(invoker, &value).await?;
        serde_json::from_value(output)
            .map_err(|e| FlowError::InvalidOutput(ValidationErrors::single("$", e.to_string())))
    }
}

fn to_input_value<I: Serialize>(input: &I) -> std::result::Result<Value, FlowError> {
    serde_json::to_value(input)
        .map_err(|e| FlowError::InvalidInput(ValidationErrors::single("$", e.to_string())))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted invoker shared by flow tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::ProviderError;
    use crate::model::{ModelInvoker, ModelRequest};

    /// Replays a fixed answer and records every prompt it was given.
    pub struct ScriptedInvoker {
        answer: Result<String, ProviderError>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedInvoker {
        pub fn answering(raw: &str) -> Self {
            Self {
                answer: Ok(raw.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(error: ProviderError) -> Self {
            Self {
                answer: Err(error),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(&self, request: ModelRequest<'_>) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            self.answer.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedInvoker;
    use super::*;
    use crate::error::ProviderError;
    use crate::schema::FieldSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct EchoIn {
        word: String,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct EchoOut {
        echo: String,
        score: f64,
    }

    fn echo_flow() -> Flow<EchoIn, EchoOut> {
        let spec = FlowSpec::new(
            "echo",
            ObjectSchema::closed(vec![FieldSchema::string("word", "")]),
            Kind::object(ObjectSchema::closed(vec![
                FieldSchema::string("echo", ""),
                FieldSchema::new("score", Kind::number_in(0.0, 1.0), ""),
            ])),
            "Say {{word}}",
            ModelConfig::default(),
        )
        .unwrap();
        Flow::new(spec)
    }

    #[tokio::test]
    async fn test_happy_path() {
        let invoker = ScriptedInvoker::answering(r#"{"echo":"hi","score":0.5}"#);
        let out = echo_flow()
            .invoke(&invoker, &EchoIn { word: "hi".to_string() })
            .await
            .unwrap();
        assert_eq!(out, EchoOut { echo: "hi".to_string(), score: 0.5 });
        assert_eq!(invoker.prompts.lock().unwrap()[0], "Say hi");
    }

    #[tokio::test]
    async fn test_out_of_contract_output_is_rejected() {
        let invoker = ScriptedInvoker::answering(r#"{"echo":"hi","score":3}"#);
        let err = echo_flow()
            .invoke(&invoker, &EchoIn { word: "hi".to_string() })
            .await
            .unwrap_err();
        match err {
            FlowError::InvalidOutput(errors) => assert!(errors.has_path("score")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_typed() {
        let invoker = ScriptedInvoker::failing(ProviderError::Rejected("blocked".to_string()));
        let err = echo_flow()
            .invoke(&invoker, &EchoIn { word: "hi".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Provider(ProviderError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_skips_model() {
        let spec = echo_flow().spec().clone();
        let invoker = ScriptedInvoker::answering("{}");
        let err = spec.run(&invoker, &json!({"word": 7})).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(_)));
        assert_eq!(invoker.calls(), 0);
    }

    #[test]
    fn test_parse_structured_accepts_fenced_json() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(parse_structured(raw).unwrap(), json!({"a": 1}));

        let raw = "Here you go: [1, 2]";
        assert_eq!(parse_structured(raw).unwrap(), json!([1, 2]));

        assert!(parse_structured("no json here").is_err());
    }

    #[test]
    fn test_bad_template_fails_at_definition() {
        let err = FlowSpec::new(
            "broken",
            ObjectSchema::closed(vec![FieldSchema::string("word", "")]),
            Kind::string(),
            "Say {{nope}}",
            ModelConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FlowDefinition { .. }));
    }
}
