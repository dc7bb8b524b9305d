//! In-memory fakes and builders shared by unit and handler tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fake::faker::lorem::en::Words;
use fake::Fake;
use futures::{future, stream, StreamExt};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::prompts::models::{Prompt, PromptVersion};
use crate::features::prompts::store::PromptStore;
use crate::modules::llm::{ChunkStream, CompletionRequest, GenerationProvider, ProviderError};

pub fn prompt_with_slug(slug: &str) -> Prompt {
    let words: Vec<String> = Words(2..4).fake();
    let now = Utc::now();
    Prompt {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        name: words.join(" "),
        slug: slug.to_string(),
        description: None,
        is_archived: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn version_at(prompt_id: Uuid, seq: i64, label: &str, created_at: DateTime<Utc>) -> PromptVersion {
    PromptVersion {
        id: Uuid::new_v4(),
        seq,
        prompt_id,
        version_label: label.to_string(),
        is_published: false,
        template: json!({"primary": "", "secondary": ""}),
        structure: None,
        variables: json!([]),
        config: json!({}),
        commit_message: None,
        created_by: None,
        created_at,
    }
}

/// Version created now with the given stored template and config.
pub fn version_with(prompt_id: Uuid, seq: i64, template: Value, config: Value) -> PromptVersion {
    PromptVersion {
        template,
        config,
        ..version_at(prompt_id, seq, "1.0.0", Utc::now())
    }
}

#[derive(Default)]
pub struct InMemoryPromptStore {
    prompts: Mutex<Vec<Prompt>>,
    versions: Mutex<Vec<PromptVersion>>,
}

impl InMemoryPromptStore {
    pub fn with_prompt(self, prompt: Prompt, versions: Vec<PromptVersion>) -> Self {
        self.prompts.lock().unwrap().push(prompt);
        self.versions.lock().unwrap().extend(versions);
        self
    }
}

#[async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Prompt>> {
        Ok(self
            .prompts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn list_versions(&self, prompt_id: Uuid) -> Result<Vec<PromptVersion>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.prompt_id == prompt_id)
            .cloned()
            .collect())
    }
}

/// Behaviour of a [`ScriptedProvider`].
#[derive(Debug, Clone)]
pub enum Script {
    /// Complete with this text; stream it as a single chunk
    Reply(String),
    /// Fail when the call is opened
    Fail(String),
    /// Never respond
    Hang,
    /// Stream these chunks, then end
    Chunks(Vec<String>),
    /// Stream these chunks, then fail
    ChunksThenFail(Vec<String>, String),
    /// Stream these chunks, then stall forever
    ChunksThenHang(Vec<String>),
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Generation provider replaying a fixed script and recording every call.
pub struct ScriptedProvider {
    script: Script,
    calls: Mutex<Vec<CompletionRequest>>,
    stream_dropped: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether a stream handed out by this provider has been dropped
    pub fn stream_dropped(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }

    fn record(&self, request: &CompletionRequest) {
        self.calls.lock().unwrap().push(request.clone());
    }
}

fn ok_chunks(chunks: &[String]) -> Vec<std::result::Result<String, ProviderError>> {
    chunks.iter().cloned().map(Ok).collect()
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, ProviderError> {
        self.record(request);
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(message) | Script::ChunksThenFail(_, message) => {
                Err(ProviderError::Request(message.clone()))
            }
            Script::Hang | Script::ChunksThenHang(_) => future::pending().await,
            Script::Chunks(chunks) => Ok(chunks.concat()),
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> std::result::Result<ChunkStream, ProviderError> {
        self.record(request);
        let chunks: ChunkStream = match &self.script {
            Script::Fail(message) => return Err(ProviderError::Request(message.clone())),
            Script::Hang => future::pending().await,
            Script::Reply(text) => stream::iter(ok_chunks(std::slice::from_ref(text))).boxed(),
            Script::Chunks(chunks) => stream::iter(ok_chunks(chunks)).boxed(),
            Script::ChunksThenFail(chunks, message) => stream::iter(ok_chunks(chunks))
                .chain(stream::once(future::ready(Err(ProviderError::Request(
                    message.clone(),
                )))))
                .boxed(),
            Script::ChunksThenHang(chunks) => stream::iter(ok_chunks(chunks))
                .chain(stream::pending())
                .boxed(),
        };

        let guard = DropFlag(Arc::clone(&self.stream_dropped));
        Ok(chunks
            .map(move |item| {
                let _keep = &guard;
                item
            })
            .boxed())
    }
}
