//! # embodied-eval
//!
//! Evaluation harness runtime for embodied-agent benchmarks. A planner hands over a
//! conversation (text plus an optional image of the current scene), a model proposes its
//! next action(s), and the reply comes back as one canonical JSON action plan.
//!
//! ## Overview
//!
//! - **Backend selection**: a model name plus mode flags picks exactly one call path from a
//!   fixed, ordered table ([`routing`]).
//! - **Dispatch**: one synchronous, single-attempt call per turn through the bound backend
//!   ([`EvalClient`]).
//! - **Normalization**: best-effort repair of whatever text came back into a JSON object in
//!   one of four plan schemas ([`structured`]).
//! - **Aggregation**: per-task summary files folded into one combined report ([`results`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use embodied_eval::{EvalClient, EvalConfig, ImageRef, Message, ModelRequest};
//!
//! fn main() -> embodied_eval::Result<()> {
//!     let config = EvalConfig::from_yaml_file("configs/gpt4o.yaml")?;
//!     let client = EvalClient::from_config(config)?;
//!
//!     let request = ModelRequest::new(vec![
//!         Message::system("You are a robot operating in a home. Reply in JSON."),
//!         Message::user_with_image("Put the apple in the fridge.", ImageRef::path("frame_0.png")),
//!     ]);
//!     let plan = client.respond(&request)?;
//!     println!("{plan}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routing`] | Binding table, mode flags and backend selection |
//! | [`client`] | Client builder and the dispatch path |
//! | [`drivers`] | Per-API request bodies and reply extraction |
//! | [`transport`] | Blocking HTTP with a uniform timeout |
//! | [`auth`] | Azure AD credential chain and token cache |
//! | [`structured`] | Plan schemas, `response_format`, reply normalization |
//! | [`results`] | Results-tree aggregation |
//! | [`config`] | YAML run configuration |
//! | [`types`] | Messages and model requests |

pub mod auth;
pub mod client;
pub mod config;
pub mod drivers;
pub mod error;
pub mod results;
pub mod routing;
pub mod structured;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{CallStats, EvalClient, EvalClientBuilder};
pub use config::EvalConfig;
pub use error::{Error, ErrorContext};
pub use results::{combine, write_combined, CombinedResults};
pub use routing::{select, BackendBinding, ExecutionMode, ModeFlags, Selection};
pub use structured::{normalize, Normalizer, PlanSchema, TaskDomain};
pub use types::message::{ImageRef, Message, MessageRole, ModelRequest};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
