//! # taskpilot-core
//!
//! Core library for taskpilot, a task manager with an AI assistant.
//!
//! This library provides:
//! - Domain types for tasks, milestones, context entries and users
//! - The AI-flow layer: schema validation, prompt templates, model invokers
//!   and eight assistant flows
//! - A REST client and an in-memory backend behind one [`Backend`] trait
//! - Client-side stores ([`AppState`])
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! An assistant request moves through one pipeline, whatever the flow:
//! - **Validate** the input against the flow's input schema
//! - **Render** the prompt template
//! - **Invoke** the model with the expected output schema
//! - **Validate** the answer and hand back a typed value
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskpilot_core::flows::{self, TaskAssistant};
//! use taskpilot_core::{AppState, AuthStore, Config, InMemoryBackend};
//!
//! # async fn run() -> taskpilot_core::Result<()> {
//! let config = Config::load()?;
//! let mut state = AppState::new(
//!     Arc::new(InMemoryBackend::seeded()),
//!     Arc::new(AuthStore::in_memory()),
//! );
//! state.tasks.refresh().await?;
//!
//! let assistant = TaskAssistant::from_config(&config.llm)?;
//! let input = flows::milestones_input(&state.tasks.tasks()[0]);
//! let suggestion = assistant.suggest_milestones(&input).await?;
//! println!("{:?}", suggestion.milestones);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::ApiClient;
pub use backend::{Backend, InMemoryBackend};
pub use config::Config;
pub use error::{BackendError, Error, FlowError, ProviderError, Result};
pub use flows::TaskAssistant;
pub use store::{AppState, AuthStore, ImportMode, Suggestion};
pub use types::*;

// Public modules
pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod flow;
pub mod flows;
pub mod logging;
pub mod model;
pub mod schema;
pub mod store;
pub mod template;
pub mod transfer;
pub mod types;
