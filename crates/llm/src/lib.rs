//! LLM gateway.
//!
//! One uniform `chat(messages) → text` operation over heterogeneous
//! providers, with per-role provider selection, capped retries, and typed
//! failures. Role-to-provider mapping lives in configuration; lookups go
//! through a small registry rather than inheritance.

pub mod error;
pub mod gateway;
pub mod message;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;

pub use error::LlmError;
pub use gateway::{ChatOutcome, LlmGateway};
pub use message::{ChatMessage, ChatOptions, ChatRole};
pub use provider::{ChatResponse, Provider};
pub use registry::{LlmRole, ProviderRegistry};
pub use retry::RetryPolicy;
