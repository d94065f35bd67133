//! Prompt chain execution.
//!
//! A chain is an ordered list of prompt templates. The first template goes to the API
//! verbatim; each later template has every `^^` replaced by the previous step's output
//! before it is sent. The output of the last step is the chain's result.

use crate::error::ProviderError;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use tracing::trace;

/// Token in a template that is replaced by the previous step's output
pub const PLACEHOLDER: &str = "^^";

/// Resolve one template against the previous step's output.
pub fn render_step(template: &str, previous: Option<&str>) -> String {
    match previous {
        Some(output) => template.replace(PLACEHOLDER, output),
        None => template.to_string(),
    }
}

/// Run every template of a chain in order and return the final output.
///
/// Provider errors are returned unchanged. An empty chain is an invalid request.
pub async fn execute_chain(
    client: &dyn ModelProviderClient,
    templates: &[String],
    model: &str,
    temperature: f32,
) -> Result<String, ProviderError> {
    if templates.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "prompt chain has no templates".to_string(),
        ));
    }

    let mut previous: Option<String> = None;
    for (step, template) in templates.iter().enumerate() {
        let prompt = render_step(template, previous.as_deref());
        trace!(step, prompt_len = prompt.len(), "Sending chain step");
        let response = client
            .complete(
                vec![ChatMessage::user(prompt)],
                CompletionOptions::new(model, temperature),
            )
            .await?;
        previous = Some(response.content);
    }

    // non-empty chain always leaves an output
    previous.ok_or_else(|| ProviderError::Api("prompt chain produced no output".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn chain(templates: &[&str]) -> Vec<String> {
        templates.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_template_is_sent_verbatim() {
        let client = MockProvider::new(vec![Ok("hello there".to_string())]);
        let output = execute_chain(&client, &chain(&["A ^^"]), "gpt-4", 0.0)
            .await
            .unwrap();

        assert_eq!(output, "hello there");
        assert_eq!(client.prompts(), vec!["A ^^".to_string()]);
    }

    #[tokio::test]
    async fn test_placeholder_carries_previous_output() {
        let client = MockProvider::new(vec![Ok("X".to_string()), Ok("final".to_string())]);
        let output = execute_chain(&client, &chain(&["A", "do ^^ more"]), "gpt-4", 0.5)
            .await
            .unwrap();

        assert_eq!(output, "final");
        assert_eq!(client.prompts(), vec!["A".to_string(), "do X more".to_string()]);
    }

    #[tokio::test]
    async fn test_every_occurrence_is_replaced() {
        let client = MockProvider::new(vec![Ok("x".to_string()), Ok("y".to_string())]);
        execute_chain(&client, &chain(&["A", "^^ and ^^"]), "m", 0.0)
            .await
            .unwrap();
        assert_eq!(client.prompts()[1], "x and x");
    }

    #[tokio::test]
    async fn test_error_stops_the_chain() {
        let client = MockProvider::new(vec![
            Ok("x".to_string()),
            Err(ProviderError::Timeout("slow".to_string())),
        ]);
        let err = execute_chain(&client, &chain(&["A", "B ^^", "C ^^"]), "m", 0.0)
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::Timeout("slow".to_string()));
        assert_eq!(client.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_chain_is_invalid() {
        let client = MockProvider::new(vec![]);
        let err = execute_chain(&client, &[], "m", 0.0).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(client.prompts().is_empty());
    }

    #[test]
    fn test_render_step() {
        assert_eq!(render_step("a ^^", None), "a ^^");
        assert_eq!(render_step("a ^^", Some("b")), "a b");
        assert_eq!(render_step("no marker", Some("b")), "no marker");
    }
}
