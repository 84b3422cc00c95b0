pub mod admission;
pub mod ai;
pub mod config;
pub mod error;
pub mod model;
pub mod prompt;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use admission::{exceeds_limit, is_on_topic, Rejection};
pub use ai::{FragmentStream, InferenceClient, InferenceRequest, ReplicateClient};
pub use config::{ApiToken, Config, TokenSource};
pub use error::{ChatError, Result};
pub use model::{ModelChoice, ModelConfig};
pub use prompt::{build_prompt, SYSTEM_PREAMBLE};
pub use session::{respond, Outcome, Session, Submission};
pub use state::{Conversation, Role, Turn};
