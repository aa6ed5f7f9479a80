//! Natural-language command pipeline.
//!
//! Free text goes to the model gateway ([`llm`]), the raw model output is
//! parsed and normalized into a [`Command`], and the command is routed to
//! exactly one store operation by the [`Dispatcher`]. [`NlpService`] wires
//! the three stages together for a single request; nothing is shared or
//! retried across requests.

pub mod command;
pub mod dispatch;
pub mod llm;
pub mod service;

pub use command::{Command, Operation};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use llm::{LlmError, LlmProvider, OpenAiClient, OpenAiConfig, StubLlmProvider};
pub use service::NlpService;
