use thiserror::Error;

/// Errors surfaced by the ingestion loop and writer tasks.
///
/// Mirrors the taxonomy of transient-vs-fatal errors: anything the ingestion
/// loop should terminate on is marked fatal via [`CaptureError::is_fatal`];
/// everything else is logged and the offending packet or segment is dropped.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    SocketBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("UDP socket receive failed: {0}")]
    SocketRecv(#[source] std::io::Error),

    #[error("failed to create output folder {path}: {source}")]
    OutputFolderCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write segment file {path}: {source}")]
    SegmentWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rewrap command {command} failed for segment {path}: {reason}")]
    RewrapFailed {
        command: String,
        path: String,
        reason: String,
    },

    #[error("failed to adjust ownership of {path} to {owner}: {source}")]
    ChownFailed {
        path: String,
        owner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TS parsing error: {0}")]
    Ts(#[from] ts::TsError),
}

impl CaptureError {
    /// Whether this error should terminate the ingestion process (the
    /// external supervisor is expected to restart it), as opposed to being
    /// logged and absorbed for a single packet or segment.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::SocketBind { .. }
                | CaptureError::SocketRecv(_)
                | CaptureError::OutputFolderCreate { .. }
        )
    }
}
