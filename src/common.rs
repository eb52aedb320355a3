use thiserror::Error;

/// Errors that could occur while building a client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The daemon address could not be resolved to a socket address.
    #[error("invalid daemon address: {0}")]
    InvalidAddress(String),

    /// Neither an address nor an external transport was configured.
    #[error("no address or transport was configured")]
    MissingTransport,

    /// Creating the background runtime for the exporter failed.
    #[error("failed to create exporter runtime: {0}")]
    FailedToCreateRuntime(String),

    /// Installing the bridge as the global `metrics` recorder failed.
    #[error("failed to install global recorder: a recorder is already installed")]
    FailedToSetGlobalRecorder,
}

/// Errors reported by a client or its transport.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport was already closed.
    #[error("transport is closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}
