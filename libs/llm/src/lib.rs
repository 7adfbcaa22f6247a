//! Chat-completion client
//!
//! A small async interface over chat-style LLM endpoints. The CQL translator,
//! the legacy OID extraction strategy and the vocabulary fallback all talk to
//! a model through [`CompletionProvider`], so tests can swap in a scripted
//! provider.
//!
//! ```rust,no_run
//! use ferrum_llm::{ChatMessage, CompletionOptions, CompletionProvider, OpenAiCompatibleProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAiCompatibleProvider::new("https://api.openai.com/v1", "sk-...")?;
//! let completion = provider
//!     .complete(
//!         &[ChatMessage::user("Write a CQL library for diabetes")],
//!         &CompletionOptions::default(),
//!     )
//!     .await?;
//! println!("{}", completion.content);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod models;
pub mod provider;

pub use error::{Error, Result};
pub use models::{ChatMessage, Completion, CompletionOptions, Role, Usage};
pub use provider::{strip_code_fences, CompletionProvider, OpenAiCompatibleProvider};
