//! Plugin generation and the build-repair loop.

// Library code reports through `tracing`, never straight to stdout/stderr.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod cache;
pub mod compiler;
pub mod config;
pub mod consistency;
pub mod error;
pub mod extract;
pub mod file_list;
mod forge;
pub mod fixer;
pub mod generation;
pub mod llm;
pub mod model_selection;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod relevance;
pub mod templates;
pub mod test_support;
mod util;

pub use crate::config::ForgeConfig;
pub use crate::error::ForgeErr;
pub use crate::error::ModelError;
pub use crate::forge::CreateOutcome;
pub use crate::forge::Forge;
pub use crate::forge::new_build_id;
pub use crate::forge::validate_build_id;
pub use crate::llm::LanguageModel;
pub use crate::llm::RemoteModel;
