//! Relevance ranking and the `search` command.
//!
//! The ranking rule is deliberately simple: sort by score descending with a
//! stable sort (ties keep the service's response order), truncate to the
//! requested `top_k`, and never touch the scores themselves.

use tracing::warn;

use crate::config::Config;
use crate::error::Error;
use crate::models::{IndexedFile, SearchResult};
use crate::registry::IndexRegistry;
use crate::service::{OpenAiClient, RetrievalService};

/// Select the `top_k` most relevant results.
///
/// `None` means unbounded (used for file-scoped chunk enumeration).
pub fn rank(mut results: Vec<SearchResult>, top_k: Option<usize>) -> Vec<SearchResult> {
    // sort_by is stable: equal scores keep response order.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(k) = top_k {
        results.truncate(k);
    }
    results
}

fn load_handle(config: &Config) -> Result<crate::models::IndexHandle, Error> {
    let registry = IndexRegistry::new(&config.registry.path);
    registry.load()?.ok_or_else(|| {
        Error::NotFound(format!(
            "no index handle at {} — run `vsctl build` first",
            config.registry.path.display()
        ))
    })
}

/// CLI entry point for `vsctl search <query>`.
pub async fn run_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let handle = load_handle(config)?;
    let client = OpenAiClient::new(&config.service)?;

    println!("Vector Store: {}", handle.name);
    println!("ID: {}", handle.id);
    println!();
    println!("Searching for: {}", query);

    let results = client.search(&handle.id, query, None).await?;
    let returned = results.len();
    let top = rank(results, Some(config.search.top_k));

    if top.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!(
        "Top {} most relevant results (of {}):",
        top.len(),
        returned
    );
    for (i, result) in top.iter().enumerate() {
        println!();
        println!("Result {}:", i + 1);
        println!("Score: {:.4}", result.score);
        if let Some(ref name) = result.file_name {
            println!("File: {}", name);
        }
        println!("Content: {}", result.content);
    }

    Ok(())
}

/// CLI entry point for `vsctl search --list-files`: enumerate every indexed
/// file and print all of its chunks. Per-file failures are logged and
/// skipped — one broken file never hides the rest.
pub async fn run_list_chunks(config: &Config) -> anyhow::Result<()> {
    let handle = load_handle(config)?;
    let client = OpenAiClient::new(&config.service)?;

    println!("Vector Store: {}", handle.name);
    println!("ID: {}", handle.id);

    let file_ids = client.list_files(&handle.id).await?;
    println!();
    println!("Found {} files in the vector store", file_ids.len());

    for file_id in file_ids {
        let file = match client.get_file_name(&file_id).await {
            Ok(name) => IndexedFile {
                id: file_id,
                file_name: name,
            },
            Err(e) => {
                warn!(file = %file_id, error = %e, "could not resolve file details, skipping");
                continue;
            }
        };

        println!();
        println!("Retrieving chunks for file: {}", file.file_name);
        println!("File ID: {}", file.id);

        let chunks = match client.search(&handle.id, "", Some(&file.id)).await {
            Ok(results) => rank(results, None),
            Err(e) => {
                warn!(file = %file.id, error = %e, "chunk retrieval failed, skipping");
                continue;
            }
        };

        println!("Found {} chunks:", chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            println!();
            println!("Chunk {}:", i + 1);
            println!("{}", chunk.content);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(content: &str, score: f64) -> SearchResult {
        SearchResult {
            content: content.to_string(),
            score,
            file_id: None,
            file_name: None,
        }
    }

    #[test]
    fn test_rank_selects_top_three_by_score() {
        let results = vec![
            result("a", 0.9),
            result("b", 0.7),
            result("c", 0.95),
            result("d", 0.2),
            result("e", 0.6),
        ];
        let top = rank(results, Some(3));
        let scores: Vec<f64> = top.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.95, 0.9, 0.7]);
        assert_eq!(top[0].content, "c");
    }

    #[test]
    fn test_rank_ties_keep_response_order() {
        let results = vec![
            result("first", 0.5),
            result("second", 0.5),
            result("third", 0.5),
        ];
        let ranked = rank(results, Some(3));
        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rank_empty_is_empty() {
        assert!(rank(Vec::new(), Some(3)).is_empty());
    }

    #[test]
    fn test_rank_shorter_than_k() {
        let ranked = rank(vec![result("only", 0.4)], Some(3));
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_rank_unbounded_returns_all() {
        let results: Vec<SearchResult> =
            (0..10).map(|i| result("chunk", i as f64 / 10.0)).collect();
        let ranked = rank(results, None);
        assert_eq!(ranked.len(), 10);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_does_not_mutate_scores() {
        let ranked = rank(vec![result("a", 0.123456)], Some(1));
        assert_eq!(ranked[0].score, 0.123456);
    }
}
