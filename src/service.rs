//! Remote service abstraction and the OpenAI-compatible implementation.
//!
//! Defines the [`RetrievalService`] and [`AssistantService`] traits and the
//! concrete [`OpenAiClient`] that speaks to a vector-store/assistants API
//! over HTTP. Components receive the services as trait objects at
//! construction, so tests can substitute fakes without any network.
//!
//! # Retry Strategy
//!
//! Each HTTP call retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 404 → `Error::NotFound`, no retry
//! - other HTTP 4xx → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::models::{
    BatchOutcome, BatchStatus, DocumentPayload, IndexHandle, Role, RunState, SearchResult,
    ThreadMessage,
};

/// Result of handing a batch of documents to the retrieval service.
///
/// `batch_id` is `None` when no document survived staging; the caller then
/// skips polling and reports every file as failed.
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub batch_id: Option<String>,
    pub staged: u64,
    pub rejected: u64,
}

/// Operations of the remote semantic index.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn create_index(&self, name: &str) -> Result<IndexHandle>;
    async fn get_index(&self, index_id: &str) -> Result<IndexHandle>;
    async fn delete_index(&self, index_id: &str) -> Result<()>;

    /// Upload `documents` and tie them to the index as one ingestion batch.
    /// Per-document upload failures are counted, never fatal.
    async fn submit_batch(
        &self,
        index_id: &str,
        documents: Vec<DocumentPayload>,
    ) -> Result<BatchSubmission>;

    async fn get_batch_status(&self, index_id: &str, batch_id: &str) -> Result<BatchOutcome>;

    /// List the ids of all files stored in the index.
    async fn list_files(&self, index_id: &str) -> Result<Vec<String>>;

    /// Resolve a file id to its original filename.
    async fn get_file_name(&self, file_id: &str) -> Result<String>;

    /// Semantic search scoped to the index. When `file_scope` is set, the
    /// query enumerates chunks of that single file instead.
    async fn search(
        &self,
        index_id: &str,
        query: &str,
        file_scope: Option<&str>,
    ) -> Result<Vec<SearchResult>>;
}

/// Operations of the language-model service backing the chat session.
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn create_profile(
        &self,
        instructions: &str,
        model: &str,
        file_search: bool,
    ) -> Result<String>;
    async fn attach_files(&self, profile_id: &str, file_ids: &[String]) -> Result<()>;
    async fn create_thread(&self) -> Result<String>;
    async fn append_message(&self, thread_id: &str, role: Role, content: &str) -> Result<()>;
    async fn create_run(&self, thread_id: &str, profile_id: &str) -> Result<String>;
    async fn get_run_status(&self, thread_id: &str, run_id: &str) -> Result<RunState>;

    /// Thread messages, newest first, as the service delivers them.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}

// ============ OpenAI-compatible client ============

/// HTTP client for an OpenAI-compatible vector-store and assistants API.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the API key environment variable is not set or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            Error::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with retry/backoff, returning the parsed JSON body.
    ///
    /// `build` is called once per attempt so multipart bodies can be rebuilt.
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<serde_json::Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = build()
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    if status.as_u16() == 404 {
                        return Err(Error::NotFound(what.to_string()));
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::Transport(format!(
                            "{}: API error {}: {}",
                            what, status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Transport(format!(
                        "{}: API error {}: {}",
                        what, status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Transport(format!("{}: failed after retries", what))))
    }

    /// Upload one document to the file store, returning its id.
    async fn upload_file(&self, doc: &DocumentPayload) -> Result<String> {
        let url = self.url("/files");
        let json = self
            .send_with_retry("upload file", || {
                let part = reqwest::multipart::Part::bytes(doc.bytes.clone())
                    .file_name(doc.file_name.clone())
                    .mime_str(doc.content_type)
                    .unwrap_or_else(|_| {
                        reqwest::multipart::Part::bytes(doc.bytes.clone())
                            .file_name(doc.file_name.clone())
                    });
                let form = reqwest::multipart::Form::new()
                    .text("purpose", "assistants")
                    .part("file", part);
                self.client.post(&url).multipart(form)
            })
            .await?;

        let parsed: IdResponse = parse(json, "file upload response")?;
        Ok(parsed.id)
    }
}

fn parse<T: serde::de::DeserializeOwned>(json: serde_json::Value, what: &str) -> Result<T> {
    serde_json::from_value(json)
        .map_err(|e| Error::Transport(format!("invalid {}: {}", what, e)))
}

// ============ Wire types ============

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct VectorStoreResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct FileCounts {
    #[serde(default)]
    in_progress: u64,
    #[serde(default)]
    completed: u64,
    #[serde(default)]
    failed: u64,
    #[serde(default)]
    cancelled: u64,
    #[serde(default)]
    total: u64,
}

#[derive(Deserialize)]
struct FileBatchResponse {
    id: String,
    status: BatchStatus,
    file_counts: FileCounts,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct FileEntry {
    id: String,
}

#[derive(Deserialize)]
struct FileDetails {
    filename: String,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RunResponse {
    id: String,
    status: RunState,
}

#[derive(Deserialize)]
struct MessageEntry {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    value: String,
}

impl From<FileBatchResponse> for BatchOutcome {
    fn from(r: FileBatchResponse) -> Self {
        BatchOutcome {
            status: r.status,
            succeeded: r.file_counts.completed,
            failed: r.file_counts.failed,
            in_progress: r.file_counts.in_progress,
            cancelled: r.file_counts.cancelled,
            total: r.file_counts.total,
        }
    }
}

// ============ RetrievalService over HTTP ============

#[async_trait]
impl RetrievalService for OpenAiClient {
    async fn create_index(&self, name: &str) -> Result<IndexHandle> {
        let url = self.url("/vector_stores");
        let body = serde_json::json!({ "name": name });
        let json = self
            .send_with_retry("create index", || self.client.post(&url).json(&body))
            .await?;
        let parsed: VectorStoreResponse = parse(json, "vector store response")?;
        Ok(IndexHandle {
            id: parsed.id,
            name: parsed.name.unwrap_or_else(|| name.to_string()),
        })
    }

    async fn get_index(&self, index_id: &str) -> Result<IndexHandle> {
        let url = self.url(&format!("/vector_stores/{}", index_id));
        let json = self
            .send_with_retry("get index", || self.client.get(&url))
            .await?;
        let parsed: VectorStoreResponse = parse(json, "vector store response")?;
        Ok(IndexHandle {
            id: parsed.id,
            name: parsed.name.unwrap_or_default(),
        })
    }

    async fn delete_index(&self, index_id: &str) -> Result<()> {
        let url = self.url(&format!("/vector_stores/{}", index_id));
        self.send_with_retry("delete index", || self.client.delete(&url))
            .await?;
        Ok(())
    }

    async fn submit_batch(
        &self,
        index_id: &str,
        documents: Vec<DocumentPayload>,
    ) -> Result<BatchSubmission> {
        let mut file_ids = Vec::with_capacity(documents.len());
        let mut rejected = 0u64;

        for doc in &documents {
            match self.upload_file(doc).await {
                Ok(id) => file_ids.push(id),
                Err(e) => {
                    warn!(file = %doc.file_name, error = %e, "file upload failed, skipping");
                    rejected += 1;
                }
            }
        }

        if file_ids.is_empty() {
            return Ok(BatchSubmission {
                batch_id: None,
                staged: 0,
                rejected,
            });
        }

        let url = self.url(&format!("/vector_stores/{}/file_batches", index_id));
        let body = serde_json::json!({ "file_ids": file_ids });
        let json = self
            .send_with_retry("create file batch", || self.client.post(&url).json(&body))
            .await?;
        let parsed: FileBatchResponse = parse(json, "file batch response")?;

        Ok(BatchSubmission {
            batch_id: Some(parsed.id),
            staged: file_ids.len() as u64,
            rejected,
        })
    }

    async fn get_batch_status(&self, index_id: &str, batch_id: &str) -> Result<BatchOutcome> {
        let url = self.url(&format!(
            "/vector_stores/{}/file_batches/{}",
            index_id, batch_id
        ));
        let json = self
            .send_with_retry("get batch status", || self.client.get(&url))
            .await?;
        let parsed: FileBatchResponse = parse(json, "file batch response")?;
        Ok(parsed.into())
    }

    async fn list_files(&self, index_id: &str) -> Result<Vec<String>> {
        let url = self.url(&format!("/vector_stores/{}/files", index_id));
        let json = self
            .send_with_retry("list files", || self.client.get(&url))
            .await?;
        let parsed: ListResponse<FileEntry> = parse(json, "file list response")?;
        Ok(parsed.data.into_iter().map(|f| f.id).collect())
    }

    async fn get_file_name(&self, file_id: &str) -> Result<String> {
        let url = self.url(&format!("/files/{}", file_id));
        let json = self
            .send_with_retry("get file", || self.client.get(&url))
            .await?;
        let parsed: FileDetails = parse(json, "file response")?;
        Ok(parsed.filename)
    }

    async fn search(
        &self,
        index_id: &str,
        query: &str,
        file_scope: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        // File-scoped enumeration uses the `file:<id>` query convention.
        let effective_query = match file_scope {
            Some(file_id) => format!("file:{}", file_id),
            None => query.to_string(),
        };

        let url = self.url(&format!("/vector_stores/{}/search", index_id));
        let body = serde_json::json!({ "query": effective_query });
        let json = self
            .send_with_retry("search", || self.client.post(&url).json(&body))
            .await?;
        let parsed: ListResponse<SearchHit> = parse(json, "search response")?;

        Ok(parsed
            .data
            .into_iter()
            .map(|hit| {
                let content = hit
                    .content
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("\n");
                SearchResult {
                    content,
                    score: hit.score,
                    file_id: hit.file_id,
                    file_name: hit.filename,
                }
            })
            .collect())
    }
}

// ============ AssistantService over HTTP ============

/// Assistants endpoints require the beta opt-in header.
const ASSISTANTS_BETA: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[async_trait]
impl AssistantService for OpenAiClient {
    async fn create_profile(
        &self,
        instructions: &str,
        model: &str,
        file_search: bool,
    ) -> Result<String> {
        let url = self.url("/assistants");
        let tools = if file_search {
            serde_json::json!([{ "type": "file_search" }])
        } else {
            serde_json::json!([])
        };
        let body = serde_json::json!({
            "instructions": instructions,
            "model": model,
            "tools": tools,
        });
        let json = self
            .send_with_retry("create profile", || {
                self.client
                    .post(&url)
                    .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
                    .json(&body)
            })
            .await?;
        let parsed: IdResponse = parse(json, "assistant response")?;
        Ok(parsed.id)
    }

    async fn attach_files(&self, profile_id: &str, file_ids: &[String]) -> Result<()> {
        let url = self.url(&format!("/assistants/{}", profile_id));
        let body = serde_json::json!({ "file_ids": file_ids });
        self.send_with_retry("attach files", || {
            self.client
                .post(&url)
                .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
                .json(&body)
        })
        .await?;
        Ok(())
    }

    async fn create_thread(&self) -> Result<String> {
        let url = self.url("/threads");
        let json = self
            .send_with_retry("create thread", || {
                self.client
                    .post(&url)
                    .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
                    .json(&serde_json::json!({}))
            })
            .await?;
        let parsed: IdResponse = parse(json, "thread response")?;
        Ok(parsed.id)
    }

    async fn append_message(&self, thread_id: &str, role: Role, content: &str) -> Result<()> {
        let url = self.url(&format!("/threads/{}/messages", thread_id));
        let body = serde_json::json!({ "role": role.as_str(), "content": content });
        self.send_with_retry("append message", || {
            self.client
                .post(&url)
                .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
                .json(&body)
        })
        .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, profile_id: &str) -> Result<String> {
        let url = self.url(&format!("/threads/{}/runs", thread_id));
        let body = serde_json::json!({ "assistant_id": profile_id });
        let json = self
            .send_with_retry("create run", || {
                self.client
                    .post(&url)
                    .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
                    .json(&body)
            })
            .await?;
        let parsed: RunResponse = parse(json, "run response")?;
        Ok(parsed.id)
    }

    async fn get_run_status(&self, thread_id: &str, run_id: &str) -> Result<RunState> {
        let url = self.url(&format!("/threads/{}/runs/{}", thread_id, run_id));
        let json = self
            .send_with_retry("get run status", || {
                self.client
                    .get(&url)
                    .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
            })
            .await?;
        let parsed: RunResponse = parse(json, "run response")?;
        Ok(parsed.status)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let url = self.url(&format!("/threads/{}/messages", thread_id));
        let json = self
            .send_with_retry("list messages", || {
                self.client
                    .get(&url)
                    .header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
            })
            .await?;
        let parsed: ListResponse<MessageEntry> = parse(json, "message list response")?;

        Ok(parsed
            .data
            .into_iter()
            .map(|entry| {
                let role = if entry.role == "assistant" {
                    Role::Assistant
                } else {
                    Role::User
                };
                let content = entry
                    .content
                    .into_iter()
                    .filter_map(|part| part.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("\n");
                ThreadMessage { role, content }
            })
            .collect())
    }
}
