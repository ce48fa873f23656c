//! Error taxonomy for the compiler proxy
//!
//! Only two failures cross the facade boundary: a failed server startup
//! and a lost transport. Compiler-reported problems travel out-of-band
//! through the message sink, and malformed replies decay to default
//! values inside the parser.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting the compiler server process
#[derive(Debug, Error)]
pub enum StartupError {
    /// Installation root could not be resolved from the environment
    #[error("OPENMODELICAHOME is not set and no installation directory could be derived")]
    HomeNotFound,

    /// Failed to spawn the compiler executable
    #[error("Failed to start compiler process '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The handle file never appeared within the retry ceiling
    #[error("Unable to find the compiler server, handle file {path} not created after {attempts} attempts")]
    HandleFileTimeout { path: PathBuf, attempts: u32 },

    /// The handle file exists but its channel address could not be read
    #[error("Failed to read channel address from handle file {path}: {source}")]
    HandleFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Initial channel negotiation failed
    #[error("Failed to connect to the compiler server: {0}")]
    Connect(#[source] TransportError),
}

/// Transport-level failures on the RPC channel
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to connect to the channel address
    #[error("Failed to connect to '{address}': {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a request frame
    #[error("Failed to send request: {0}")]
    Write(#[source] std::io::Error),

    /// Failed to read a reply frame
    #[error("Failed to read reply: {0}")]
    Read(#[source] std::io::Error),

    /// A frame violated the wire format
    #[error("Protocol error: {0}")]
    Frame(String),

    /// The channel worker or peer has gone away
    #[error("Channel is closed")]
    Closed,
}

/// Fatal errors surfaced by the command facade
///
/// Everything else resolves to a typed return value, with compiler
/// diagnostics pushed to the message sink.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Connection with the compiler has been lost mid-session
    #[error("Connection with the compiler server has been lost: {0}")]
    ConnectionLost(#[source] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_display() {
        let err = StartupError::HandleFileTimeout {
            path: PathBuf::from("/tmp/openmodelica.objid.x"),
            attempts: 20,
        };
        assert!(err.to_string().contains("20 attempts"));
        assert!(err.to_string().contains("openmodelica.objid.x"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Closed;
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_proxy_error_from_startup() {
        let err: ProxyError = StartupError::HomeNotFound.into();
        assert!(matches!(err, ProxyError::Startup(_)));
        assert!(err.to_string().contains("OPENMODELICAHOME"));
    }

    #[test]
    fn test_connection_lost_display() {
        let err = ProxyError::ConnectionLost(TransportError::Closed);
        assert!(err.to_string().contains("lost"));
    }
}
