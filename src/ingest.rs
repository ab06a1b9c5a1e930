//! Ingestion orchestration.
//!
//! Coordinates the full build flow: scan corpus → create remote index →
//! stage document payloads → submit one upload batch → poll to a terminal
//! status → aggregate per-file counts → persist the handle. Individual file
//! failures are counted, never fatal; retrying them is the operator's call.

use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::{BatchOutcome, DocumentPayload, DocumentRef, IndexHandle};
use crate::registry::IndexRegistry;
use crate::scanner;
use crate::service::{OpenAiClient, RetrievalService};

/// Build a remote index from `documents` and persist its handle.
///
/// An empty document set is valid: the index is created, the upload step is
/// skipped entirely, and the outcome reports total = 0.
pub async fn build_index(
    service: &dyn RetrievalService,
    registry: &IndexRegistry,
    index_name: &str,
    documents: &[DocumentRef],
    poll_interval: Duration,
) -> Result<(IndexHandle, BatchOutcome)> {
    let handle = service.create_index(index_name).await?;
    info!(index = %handle.id, "created index");

    let mut local_failures = 0u64;
    let mut payloads: Vec<DocumentPayload> = Vec::with_capacity(documents.len());

    for doc in documents {
        match std::fs::read(&doc.path) {
            Ok(bytes) => payloads.push(DocumentPayload {
                file_name: doc.file_name.clone(),
                content_type: doc.content_type,
                bytes,
            }),
            Err(e) => {
                warn!(file = %doc.path.display(), error = %e, "could not read document, skipping");
                local_failures += 1;
            }
        }
    }

    let mut outcome = if payloads.is_empty() {
        BatchOutcome::empty()
    } else {
        let submission = service.submit_batch(&handle.id, payloads).await?;
        local_failures += submission.rejected;
        match submission.batch_id {
            Some(batch_id) => poll_batch(service, &handle.id, &batch_id, poll_interval).await?,
            None => BatchOutcome::empty(),
        }
    };

    outcome.absorb_local_failures(local_failures);

    registry.store(&handle)?;

    Ok((handle, outcome))
}

/// Poll the batch at a fixed interval until it reaches a terminal status.
async fn poll_batch(
    service: &dyn RetrievalService,
    index_id: &str,
    batch_id: &str,
    interval: Duration,
) -> Result<BatchOutcome> {
    loop {
        let outcome = service.get_batch_status(index_id, batch_id).await?;
        if outcome.status.is_terminal() {
            return Ok(outcome);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Create the corpus directory layout with README files so the operator
/// knows where to drop documents. Existing files are left untouched.
pub fn scaffold_corpus(config: &Config) -> Result<()> {
    let root = &config.corpus.root;
    std::fs::create_dir_all(root)?;

    let readme = root.join("README.md");
    if !readme.exists() {
        let extensions = config.corpus.extensions.join(", ");
        std::fs::write(
            &readme,
            format!(
                "# Data Directory\n\n\
                 Files placed here are uploaded to the remote index by `vsctl build`.\n\n\
                 Supported extensions: {}\n",
                extensions
            ),
        )?;
    }

    if let Some(parent) = config.registry.path.parent() {
        std::fs::create_dir_all(parent)?;
        let build_readme = parent.join("README.md");
        if !build_readme.exists() {
            std::fs::write(
                &build_readme,
                "# Build Directory\n\n\
                 Holds the persisted handle of the active remote index.\n",
            )?;
        }
    }

    Ok(())
}

/// CLI entry point for `vsctl build`.
pub async fn run_build(config: &Config) -> anyhow::Result<()> {
    scaffold_corpus(config)?;

    let documents = scanner::scan_corpus(&config.corpus)?;
    if documents.is_empty() {
        println!("No supported files found in {}.", config.corpus.root.display());
    }

    let client = OpenAiClient::new(&config.service)?;
    let registry = IndexRegistry::new(&config.registry.path);
    let interval = Duration::from_millis(config.service.poll_interval_ms);

    let (handle, outcome) = build_index(
        &client,
        &registry,
        &config.assistant.index_name,
        &documents,
        interval,
    )
    .await?;

    println!("build {}", handle.name);
    println!("  index: {}", handle.id);
    println!("  documents: {}", outcome.total);
    println!("  status: {}", outcome.status.as_str());
    println!("  succeeded: {}", outcome.succeeded);
    println!("  failed: {}", outcome.failed);
    println!("  handle saved to: {}", registry.path().display());
    if !outcome.is_fully_successful() {
        // The batch was delivered and the handle is saved; the non-zero
        // exit tells the operator to rerun and retry the failed files.
        return Err(crate::error::Error::PartialBatch(outcome).into());
    }
    println!("ok");

    Ok(())
}
