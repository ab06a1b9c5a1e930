//! Index teardown.
//!
//! Resolves the handle to delete (explicit argument first, then the
//! registry record), confirms the destructive action against the index's
//! human-readable name, deletes the remote index, and clears the registry.
//! The registry is cleared only after remote deletion succeeds, so a failed
//! delete can be retried.

use std::io::{BufRead, Write};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::IndexHandle;
use crate::registry::IndexRegistry;
use crate::service::{OpenAiClient, RetrievalService};

/// Resolve which handle to delete: explicit argument, else registry record,
/// else `NotFound`.
pub fn resolve_handle(explicit: Option<&str>, registry: &IndexRegistry) -> Result<IndexHandle> {
    if let Some(id) = explicit {
        return Ok(IndexHandle {
            id: id.to_string(),
            name: String::new(),
        });
    }
    registry
        .load()?
        .ok_or_else(|| Error::NotFound("no index handle argument or registry record".to_string()))
}

/// Delete the resolved index. Returns `Ok(false)` when the operator does
/// not confirm — an unconfirmed destructive action is a no-op, not an
/// error. `confirm` receives the handle with its remote metadata so the
/// prompt can name the index.
pub async fn delete_index<F>(
    service: &dyn RetrievalService,
    registry: &IndexRegistry,
    explicit: Option<&str>,
    confirm: F,
) -> Result<bool>
where
    F: FnOnce(&IndexHandle) -> bool,
{
    let resolved = resolve_handle(explicit, registry)?;

    // Fetch metadata so confirmation is bound to the real name; an absent
    // remote handle surfaces as NotFound before any prompt.
    let handle = service.get_index(&resolved.id).await?;

    if !confirm(&handle) {
        return Ok(false);
    }

    service.delete_index(&handle.id).await?;
    registry.clear()?;

    Ok(true)
}

/// CLI entry point for `vsctl delete [handle]`.
pub async fn run_delete(config: &Config, explicit: Option<&str>) -> anyhow::Result<()> {
    let client = OpenAiClient::new(&config.service)?;
    let registry = IndexRegistry::new(&config.registry.path);

    let deleted = delete_index(&client, &registry, explicit, |handle| {
        print!(
            "Are you sure you want to delete the vector store '{}' (ID: {})? (yes/no): ",
            handle.name, handle.id
        );
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("yes")
    })
    .await?;

    if deleted {
        println!("Successfully deleted vector store.");
        println!("Cleared handle record: {}", config.registry.path.display());
    } else {
        println!("Deletion cancelled.");
    }

    Ok(())
}
