use std::path::PathBuf;

/// Kickoff failures. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("kickoff request failed: {0}")]
    Transport(String),

    #[error("{status}: {body}")]
    Http { status: u16, body: String },

    #[error("bad response: {body}")]
    MalformedResponse { body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("poll request failed: {0}")]
    Transport(String),

    #[error("{status}: {body}")]
    Http { status: u16, body: String },

    #[error("undecodable operation status: {0}")]
    Decode(String),

    #[error("timeout polling operation after {waited_secs}s")]
    Timeout { waited_secs: u64 },
}

/// A terminal operation that did not yield anything downloadable.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("operation failed: {message}")]
    OperationFailed { message: String },

    #[error("no uri in operation response")]
    NoMediaUri,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid media uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("download request failed: {0}")]
    Transport(String),

    /// `message` is the server's text/JSON body, or `HTTP <status>`.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Preconditions checked once before a batch starts. The only fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("API key is missing")]
    MissingCredential,

    #[error("prompt queue is empty")]
    EmptyQueue,
}
