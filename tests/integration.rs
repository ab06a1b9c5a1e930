//! End-to-end scenarios over the library API.
//!
//! The remote retrieval and assistant services are replaced by an in-memory
//! fake so the build/search/chat/delete flows run without a network. The
//! fake models the observable remote behavior: index creation, batch
//! ingestion that progresses across polls, file listing, scored search
//! results, and run state sequences.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use vsctl::chat::{ChatSession, SessionState, FALLBACK_REPLY};
use vsctl::delete::delete_index;
use vsctl::error::{Error, Result};
use vsctl::ingest::build_index;
use vsctl::models::{
    BatchOutcome, BatchStatus, DocumentPayload, DocumentRef, IndexHandle, Role, RunState,
    SearchResult, ThreadMessage,
};
use vsctl::registry::IndexRegistry;
use vsctl::scanner::scan_corpus;
use vsctl::search::rank;
use vsctl::service::{AssistantService, BatchSubmission, RetrievalService};

/// In-memory remote service. Batches complete after a configurable number
/// of polls; search returns a scripted result set.
#[derive(Default)]
struct FakeRemote {
    indexes: Mutex<Vec<IndexHandle>>,
    files: Mutex<Vec<(String, String)>>, // (file_id, file_name)
    polls_until_done: Mutex<u32>,
    batch_total: Mutex<u64>,
    submit_calls: Mutex<u32>,
    search_results: Mutex<Vec<SearchResult>>,
    // assistant side
    thread: Mutex<Vec<ThreadMessage>>,
    run_states: Mutex<Vec<RunState>>,
    attached: Mutex<Vec<String>>,
}

impl FakeRemote {
    fn new() -> Self {
        Self {
            polls_until_done: Mutex::new(1),
            ..Self::default()
        }
    }

    fn with_search_results(results: Vec<SearchResult>) -> Self {
        let remote = Self::new();
        *remote.search_results.lock().unwrap() = results;
        remote
    }

    fn with_run_states(states: Vec<RunState>) -> Self {
        let remote = Self::new();
        *remote.run_states.lock().unwrap() = states;
        remote
    }

    fn submit_calls(&self) -> u32 {
        *self.submit_calls.lock().unwrap()
    }

    fn thread_messages(&self) -> Vec<ThreadMessage> {
        self.thread.lock().unwrap().clone()
    }

    fn attached_files(&self) -> Vec<String> {
        self.attached.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalService for FakeRemote {
    async fn create_index(&self, name: &str) -> Result<IndexHandle> {
        let handle = IndexHandle {
            id: format!("vs_{}", self.indexes.lock().unwrap().len() + 1),
            name: name.to_string(),
        };
        self.indexes.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    async fn get_index(&self, index_id: &str) -> Result<IndexHandle> {
        self.indexes
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.id == index_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("index {}", index_id)))
    }

    async fn delete_index(&self, index_id: &str) -> Result<()> {
        let mut indexes = self.indexes.lock().unwrap();
        let before = indexes.len();
        indexes.retain(|h| h.id != index_id);
        if indexes.len() == before {
            return Err(Error::NotFound(format!("index {}", index_id)));
        }
        Ok(())
    }

    async fn submit_batch(
        &self,
        _index_id: &str,
        documents: Vec<DocumentPayload>,
    ) -> Result<BatchSubmission> {
        *self.submit_calls.lock().unwrap() += 1;
        *self.batch_total.lock().unwrap() = documents.len() as u64;
        let mut files = self.files.lock().unwrap();
        for doc in &documents {
            let id = format!("file_{}", files.len() + 1);
            files.push((id, doc.file_name.clone()));
        }
        Ok(BatchSubmission {
            batch_id: Some("batch_1".to_string()),
            staged: documents.len() as u64,
            rejected: 0,
        })
    }

    async fn get_batch_status(&self, _index_id: &str, _batch_id: &str) -> Result<BatchOutcome> {
        let total = *self.batch_total.lock().unwrap();
        let mut polls = self.polls_until_done.lock().unwrap();
        if *polls > 0 {
            *polls -= 1;
            return Ok(BatchOutcome {
                status: BatchStatus::InProgress,
                succeeded: 0,
                failed: 0,
                in_progress: total,
                cancelled: 0,
                total,
            });
        }
        Ok(BatchOutcome {
            status: BatchStatus::Completed,
            succeeded: total,
            failed: 0,
            in_progress: 0,
            cancelled: 0,
            total,
        })
    }

    async fn list_files(&self, _index_id: &str) -> Result<Vec<String>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_file_name(&self, file_id: &str) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == file_id)
            .map(|(_, name)| name.clone())
            .ok_or_else(|| Error::NotFound(format!("file {}", file_id)))
    }

    async fn search(
        &self,
        _index_id: &str,
        _query: &str,
        _file_scope: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.search_results.lock().unwrap().clone())
    }
}

#[async_trait]
impl AssistantService for FakeRemote {
    async fn create_profile(
        &self,
        _instructions: &str,
        _model: &str,
        _file_search: bool,
    ) -> Result<String> {
        Ok("asst_1".to_string())
    }

    async fn attach_files(&self, _profile_id: &str, file_ids: &[String]) -> Result<()> {
        *self.attached.lock().unwrap() = file_ids.to_vec();
        Ok(())
    }

    async fn create_thread(&self) -> Result<String> {
        Ok("thread_1".to_string())
    }

    async fn append_message(&self, _thread_id: &str, role: Role, content: &str) -> Result<()> {
        self.thread.lock().unwrap().insert(
            0,
            ThreadMessage {
                role,
                content: content.to_string(),
            },
        );
        Ok(())
    }

    async fn create_run(&self, _thread_id: &str, _profile_id: &str) -> Result<String> {
        Ok("run_1".to_string())
    }

    async fn get_run_status(&self, _thread_id: &str, _run_id: &str) -> Result<RunState> {
        let mut states = self.run_states.lock().unwrap();
        let state = if states.is_empty() {
            RunState::Completed
        } else {
            states.remove(0)
        };
        if state == RunState::Completed {
            self.thread.lock().unwrap().insert(
                0,
                ThreadMessage {
                    role: Role::Assistant,
                    content: "grounded answer".to_string(),
                },
            );
        }
        Ok(state)
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
        Ok(self.thread.lock().unwrap().clone())
    }
}

fn corpus_with(files: &[(&str, &str)]) -> (TempDir, Vec<DocumentRef>) {
    let tmp = TempDir::new().unwrap();
    for (name, body) in files {
        std::fs::write(tmp.path().join(name), body).unwrap();
    }
    let config = vsctl::config::CorpusConfig {
        root: tmp.path().to_path_buf(),
        extensions: vec!["md".to_string(), "txt".to_string()],
        exclude_globs: Vec::new(),
    };
    let docs = scan_corpus(&config).unwrap();
    (tmp, docs)
}

fn registry_in(dir: &Path) -> IndexRegistry {
    IndexRegistry::new(dir.join("handle.json"))
}

const POLL: Duration = Duration::from_millis(1);

#[tokio::test]
async fn build_three_documents_end_to_end() {
    let (tmp, docs) = corpus_with(&[
        ("alpha.md", "# Alpha\nRust programming notes."),
        ("beta.md", "# Beta\nPython and machine learning."),
        ("gamma.txt", "Deployment and infrastructure notes."),
    ]);
    assert_eq!(docs.len(), 3);

    let remote = FakeRemote::new();
    let registry = registry_in(tmp.path());

    let (handle, outcome) = build_index(&remote, &registry, "Document Store", &docs, POLL)
        .await
        .unwrap();

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.succeeded, 3);
    assert_eq!(outcome.failed, 0);
    assert!(outcome.is_fully_successful());
    assert_eq!(registry.load().unwrap(), Some(handle));
}

#[tokio::test]
async fn build_empty_corpus_never_uploads() {
    let tmp = TempDir::new().unwrap();
    let remote = FakeRemote::new();
    let registry = registry_in(tmp.path());

    let (_, outcome) = build_index(&remote, &registry, "Document Store", &[], POLL)
        .await
        .unwrap();

    assert_eq!(outcome.total, 0);
    assert_eq!(remote.submit_calls(), 0);
    assert!(registry.load().unwrap().is_some());
}

#[tokio::test]
async fn search_scenario_ranks_top_three() {
    let scores = [0.9, 0.7, 0.95, 0.2, 0.6];
    let results: Vec<SearchResult> = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| SearchResult {
            content: format!("chunk {}", i),
            score,
            file_id: None,
            file_name: None,
        })
        .collect();

    let remote = FakeRemote::with_search_results(results);
    let raw = remote.search("vs_1", "refund policy", None).await.unwrap();
    let top = rank(raw, Some(3));

    let ranked_scores: Vec<f64> = top.iter().map(|r| r.score).collect();
    assert_eq!(ranked_scores, vec![0.95, 0.9, 0.7]);
}

#[tokio::test]
async fn chat_session_attaches_indexed_files() {
    let (tmp, docs) = corpus_with(&[("a.md", "alpha"), ("b.md", "beta")]);
    let remote = Arc::new(FakeRemote::new());
    let registry = registry_in(tmp.path());

    let (handle, _) = build_index(remote.as_ref(), &registry, "Document Store", &docs, POLL)
        .await
        .unwrap();

    let _session = ChatSession::start(
        remote.clone(),
        remote.clone(),
        &handle,
        "answer from files",
        "gpt-4o-mini",
        POLL,
    )
    .await
    .unwrap();

    assert_eq!(remote.attached_files().len(), 2);
}

#[tokio::test]
async fn chat_turn_round_trip() {
    let remote = Arc::new(FakeRemote::with_run_states(vec![
        RunState::Queued,
        RunState::InProgress,
        RunState::Completed,
    ]));
    let handle = remote.create_index("Document Store").await.unwrap();

    let mut session = ChatSession::start(
        remote.clone(),
        remote.clone(),
        &handle,
        "answer from files",
        "gpt-4o-mini",
        POLL,
    )
    .await
    .unwrap();

    let reply = session.ask("what do the docs say?").await.unwrap();
    assert_eq!(reply, "grounded answer");
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn chat_expired_run_degrades_and_recovers() {
    let remote = Arc::new(FakeRemote::with_run_states(vec![
        RunState::Expired,
        RunState::Completed,
    ]));
    let handle = remote.create_index("Document Store").await.unwrap();

    let mut session = ChatSession::start(
        remote.clone(),
        remote.clone(),
        &handle,
        "answer from files",
        "gpt-4o-mini",
        POLL,
    )
    .await
    .unwrap();

    let reply = session.ask("first").await.unwrap();
    assert_eq!(reply, FALLBACK_REPLY);

    // The user's message survived the failed run.
    let thread = remote.thread_messages();
    assert!(thread.iter().any(|m| m.role == Role::User && m.content == "first"));

    // Session remains READY and the next turn succeeds.
    assert_eq!(session.state(), SessionState::Ready);
    let reply = session.ask("second").await.unwrap();
    assert_eq!(reply, "grounded answer");
}

#[tokio::test]
async fn delete_flow_clears_registry_after_remote_delete() {
    let tmp = TempDir::new().unwrap();
    let remote = FakeRemote::new();
    let registry = registry_in(tmp.path());

    let handle = remote.create_index("Document Store").await.unwrap();
    registry.store(&handle).unwrap();

    let deleted = delete_index(&remote, &registry, None, |h| h.name == "Document Store")
        .await
        .unwrap();

    assert!(deleted);
    assert_eq!(registry.load().unwrap(), None);
    assert!(matches!(
        remote.get_index(&handle.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_without_any_handle_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let remote = FakeRemote::new();
    let registry = registry_in(tmp.path());

    let result = delete_index(&remote, &registry, None, |_| true).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn full_lifecycle_build_chat_delete() {
    let (tmp, docs) = corpus_with(&[("doc.md", "# Doc\nRefunds take 30 days.")]);
    let remote = Arc::new(FakeRemote::new());
    let registry = registry_in(tmp.path());

    let (handle, outcome) = build_index(remote.as_ref(), &registry, "Document Store", &docs, POLL)
        .await
        .unwrap();
    assert!(outcome.is_fully_successful());

    let mut session = ChatSession::start(
        remote.clone(),
        remote.clone(),
        &handle,
        "answer from files",
        "gpt-4o-mini",
        POLL,
    )
    .await
    .unwrap();
    let reply = session.ask("how long do refunds take?").await.unwrap();
    assert_eq!(reply, "grounded answer");
    session.close();

    let deleted = delete_index(remote.as_ref(), &registry, None, |_| true)
        .await
        .unwrap();
    assert!(deleted);
    assert_eq!(registry.load().unwrap(), None);
}
