//! Shared test utilities for integration tests
//!
//! A scripted provider client standing in for the generation API, and a temp-dir
//! store pre-loaded with a generator.

use async_trait::async_trait;
use dialogforge::error::ProviderError;
use dialogforge::generation::CancelSignal;
use dialogforge::generator::{Generator, NewGenerator};
use dialogforge::job::{GenerationJob, NewJob};
use dialogforge::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, ModelProviderClient, TokenUsage,
};
use dialogforge::store::{GenerationStore, SledGenerationStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Provider client that replays scripted results, then answers every prompt.
///
/// Optionally sleeps per call (on the tokio clock) and raises a cancel signal after a
/// given number of calls.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
    cancel_after: Mutex<Option<(usize, CancelSignal)>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Every call takes `delay` of tokio time
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Raise `signal` once `calls` calls have completed
    pub fn cancel_after(&self, calls: usize, signal: CancelSignal) {
        *self.cancel_after.lock() = Some((calls, signal));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ModelProviderClient for ScriptedClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let call = {
            let mut prompts = self.prompts.lock();
            prompts.push(prompt.clone());
            prompts.len()
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("dialog {} for '{}'", call, prompt)));

        if let Some((after, signal)) = self.cancel_after.lock().as_ref() {
            if call >= *after {
                signal.cancel();
            }
        }

        result.map(|content| CompletionResponse {
            content,
            model: options.model,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

pub fn transient() -> ProviderError {
    ProviderError::ServiceUnavailable("try later".to_string())
}

/// Temp-dir backed store with one generator in project 1
pub struct TestStore {
    _dir: TempDir,
    pub store: Arc<SledGenerationStore>,
    pub generator: Generator,
}

impl TestStore {
    pub fn new(templates: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SledGenerationStore::new(dir.path().join("store")).unwrap());
        let generator = store
            .insert_generator(NewGenerator {
                project_id: 1,
                name: "test-generator".to_string(),
                templates: templates.iter().map(|t| t.to_string()).collect(),
            })
            .unwrap();
        Self {
            _dir: dir,
            store,
            generator,
        }
    }

    pub fn job_request(&self, total: u64) -> NewJob {
        NewJob {
            project_id: 1,
            generator_id: self.generator.id,
            name: None,
            model_name: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            total_count: total,
            variables: BTreeMap::new(),
        }
    }

    pub fn add_job(&self, total: u64) -> GenerationJob {
        self.store.insert_job(self.job_request(total)).unwrap()
    }

    pub fn job(&self, id: u64) -> GenerationJob {
        self.store.get_job(id).unwrap().unwrap()
    }
}
