//! User administration service core.
//!
//! Exposes user-record CRUD over HTTP together with a natural-language
//! path: free text is sent to an OpenAI-compatible model, the model's
//! JSON output is parsed and normalized into a [`nlp::Command`], and the
//! command is dispatched onto the same store operations the direct
//! endpoints use.

pub mod errors;
pub mod gateway;
pub mod nlp;
pub mod user;

pub use errors::ApiError;
pub use gateway::{Gateway, GatewayConfig};
pub use nlp::{Command, DispatchOutcome, Dispatcher, LlmProvider, NlpService, OpenAiClient};
pub use user::store::{InMemoryUserStore, SqliteUserStore, UserStore};
pub use user::{NewUser, User, UserPatch};
