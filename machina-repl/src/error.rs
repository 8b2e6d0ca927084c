//! Errors raised binding or serving a [`crate::Server`].

use thiserror::Error;

/// Failures from binding or serving the REPL socket.
#[derive(Debug, Error)]
pub enum ReplError {
    /// Binding the Unix domain socket failed.
    #[error("failed to bind repl socket at {path}: {source}")]
    Bind {
        /// The socket path that failed to bind.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing the dir file (the socket path advertisement) failed.
    #[error("failed to write dir file at {path}: {source}")]
    DirFile {
        /// The dir file path that failed to write.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Accepting a connection off the listener failed.
    #[error("failed to accept a repl connection: {0}")]
    Accept(#[source] std::io::Error),
}
