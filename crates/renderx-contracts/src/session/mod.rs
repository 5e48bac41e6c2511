//! Session state that outlives individual interactions.
//!
//! Every front end re-renders from a [`SessionState`] and changes it only
//! through the named operations on [`PromptList`], [`ResultStore`] and
//! [`SessionState`] itself, never while rendering.

mod prompts;
mod results;
mod state;

use std::path::PathBuf;

pub use prompts::{PromptItem, PromptList};
pub use results::{JobStage, ResultRecord, ResultStatus, ResultStore};
pub use state::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("prompt text is empty")]
    EmptyPrompt,

    #[error("no prompt matches '{0}'")]
    UnknownPrompt(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
