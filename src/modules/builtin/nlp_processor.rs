//! Text-processing module backed by the configured language model
//!
//! Without a provider API key the module answers with a deterministic mock
//! that only reports the input length.

use crate::llm::{CompletionRequest, LlmProvider};
use crate::modules::{
    ModuleContext, ModuleDescriptor, ModuleError, ModuleHandler, ModuleServices,
    RegisteredModule,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const MODULE_ID: &str = "nlp_processor";

const MOCK_MODEL: &str = "mock";
const MOCK_NOTE: &str = "OpenAI API key not configured, using mock response";

/// `input_data` accepted by the text module
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NlpInput {
    /// Text sent to the language model
    #[serde(default)]
    pub text: Option<String>,
}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor {
        id: MODULE_ID.to_string(),
        name: "NLP Processing Agent".to_string(),
        category: "nlp".to_string(),
        description: "Processes free text with a hosted language model".to_string(),
    }
}

pub fn module() -> RegisteredModule {
    let schema = serde_json::to_value(schemars::schema_for!(NlpInput))
        .unwrap_or_else(|_| json!({"type": "object"}));
    RegisteredModule::new(descriptor(), schema, build)
}

fn build(context: ModuleContext, services: &ModuleServices) -> Box<dyn ModuleHandler> {
    Box::new(NlpProcessor::new(context, services))
}

pub struct NlpProcessor {
    context: ModuleContext,
    llm: Option<Arc<dyn LlmProvider>>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl NlpProcessor {
    pub fn new(context: ModuleContext, services: &ModuleServices) -> Self {
        Self {
            context,
            llm: services.llm.clone(),
            model: services.model.clone(),
            system_prompt: services.system_prompt.clone(),
            max_tokens: services.max_tokens,
            temperature: services.temperature,
        }
    }

    /// Deterministic answer used when no provider is configured
    pub fn mock_response(text: &str) -> Value {
        let characters = text.chars().count();
        json!({
            "success": true,
            "processed_text": format!("[NLP Processing] Text analyzed: {characters} characters"),
            "original_text": text,
            "character_count": characters,
            "model": MOCK_MODEL,
            "note": MOCK_NOTE,
        })
    }

    async fn complete(&self, llm: &dyn LlmProvider, text: &str) -> Result<Value, ModuleError> {
        let request = CompletionRequest::single_turn(&self.model, &self.system_prompt, text)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        debug!(provider = llm.name(), model = %self.model, "Requesting completion");

        let response = llm.complete(request).await.map_err(|e| {
            warn!(provider = llm.name(), error = %e, "Language model call failed");
            ModuleError::Upstream(format!("OpenAI processing failed: {e}"))
        })?;

        let model = if response.model.is_empty() {
            self.model.clone()
        } else {
            response.model
        };

        Ok(json!({
            "success": true,
            "processed_text": response.content,
            "original_text": text,
            "model": model,
        }))
    }
}

#[async_trait]
impl ModuleHandler for NlpProcessor {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut ModuleContext {
        &mut self.context
    }

    async fn execute(&mut self, input: &Map<String, Value>) -> Result<Value, ModuleError> {
        let parsed: NlpInput = serde_json::from_value(Value::Object(input.clone()))
            .map_err(|e| ModuleError::InvalidInput(e.to_string()))?;

        let text = match parsed.text {
            Some(text) if !text.is_empty() => text,
            _ => {
                return Err(ModuleError::MissingInput(
                    "No text provided for processing".to_string(),
                ))
            }
        };

        match &self.llm {
            Some(llm) => self.complete(llm.as_ref(), &text).await,
            None => Ok(Self::mock_response(&text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLlmProvider;

    fn processor(llm: Option<Arc<dyn LlmProvider>>) -> NlpProcessor {
        let services = ModuleServices::default().with_llm(llm);
        NlpProcessor::new(ModuleContext::new("org-1", None), &services)
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_missing_text_is_domain_failure() {
        let mut nlp = processor(None);
        for value in [json!({}), json!({"text": ""}), json!({"text": null})] {
            let err = nlp.execute(&input(value)).await.unwrap_err();
            assert!(matches!(err, ModuleError::MissingInput(_)));
            assert_eq!(err.to_string(), "No text provided for processing");
        }
    }

    #[tokio::test]
    async fn test_mock_response_without_provider() {
        let mut nlp = processor(None);
        let output = nlp
            .execute(&input(json!({"text": "hello world"})))
            .await
            .unwrap();

        assert_eq!(output["model"], "mock");
        assert_eq!(output["character_count"], 11);
        assert_eq!(
            output["processed_text"],
            "[NLP Processing] Text analyzed: 11 characters"
        );
        assert_eq!(output["original_text"], "hello world");
        assert_eq!(output["note"], MOCK_NOTE);
    }

    #[test]
    fn test_mock_counts_characters_not_bytes() {
        let output = NlpProcessor::mock_response("héllo");
        assert_eq!(output["character_count"], 5);
    }

    #[tokio::test]
    async fn test_provider_completion() {
        let llm: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider::single_response("Summary."));
        let mut nlp = processor(Some(llm));

        let output = nlp
            .execute(&input(json!({"text": "Long text"})))
            .await
            .unwrap();

        assert_eq!(output["success"], true);
        assert_eq!(output["processed_text"], "Summary.");
        assert_eq!(output["original_text"], "Long text");
        assert_eq!(output["model"], "mock-model");
        assert!(output.get("note").is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_is_wrapped() {
        let llm: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider::with_failure());
        let mut nlp = processor(Some(llm));

        let err = nlp
            .execute(&input(json!({"text": "hi"})))
            .await
            .unwrap_err();

        assert!(matches!(err, ModuleError::Upstream(_)));
        assert!(err.to_string().starts_with("OpenAI processing failed: "));
    }

    #[tokio::test]
    async fn test_request_uses_configured_prompt() {
        let mock = Arc::new(MockLlmProvider::single_response("ok"));
        let llm: Arc<dyn LlmProvider> = mock.clone();
        let mut nlp = processor(Some(llm));

        nlp.execute(&input(json!({"text": "abc"}))).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].max_tokens, Some(1000));
        assert_eq!(
            requests[0].messages[0].content,
            "You are a helpful assistant for NLP processing."
        );
        assert_eq!(requests[0].messages[1].content, "abc");
    }
}
