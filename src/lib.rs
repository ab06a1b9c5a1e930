//! # vsctl
//!
//! Remote vector-store lifecycle and grounded chat CLI.
//!
//! vsctl ingests a local document corpus into a remotely hosted semantic
//! index, searches it with relevance ranking, runs a multi-turn chat
//! session grounded in the indexed documents, and tears the index down.
//! Embeddings and similarity search are performed by the remote service;
//! vsctl orchestrates the asynchronous operations around them — batch
//! upload polling, run polling, ranking, and the persisted index handle.
//!
//! ## Quick Start
//!
//! ```bash
//! vsctl build                   # ingest ./build/datas into a new index
//! vsctl search "refund policy"  # top-k semantic search
//! vsctl chat                    # grounded conversation
//! vsctl delete                  # tear the index down (asks for confirmation)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy |
//! | [`scanner`] | Corpus enumeration by extension allow-list |
//! | [`service`] | Remote service traits and HTTP client |
//! | [`registry`] | Persisted index handle record |
//! | [`ingest`] | Index build orchestration with batch polling |
//! | [`search`] | Relevance ranking and search command |
//! | [`chat`] | Conversational session state machine |
//! | [`delete`] | Index teardown |

pub mod chat;
pub mod config;
pub mod delete;
pub mod error;
pub mod ingest;
pub mod models;
pub mod registry;
pub mod scanner;
pub mod search;
pub mod service;
