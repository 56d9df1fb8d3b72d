use msrpc_ndr::NdrError;
use msrpc_rpc::{RpcError, RpcStatus};
use msrpc_transport::TransportError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),
    #[error("RPC error: {0}")]
    RpcError(#[from] RpcError),
    #[error("Failed to read or write PDU: {0}")]
    BinRWError(#[from] binrw::Error),
    #[error("NDR error: {0}")]
    NdrError(#[from] NdrError),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Bind rejected: {0}")]
    BindRejected(String),
    #[error("Call failed with fault status {0}")]
    Fault(RpcStatus),
    #[error("Connection stopped")]
    ConnectionStopped,
    #[error("Connection closed by the server")]
    ConnectionClosed,
    #[error("Task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl From<Error> for RpcError {
    /// Hands errors to typed clients: faults keep their status, the rest is reported as text.
    fn from(value: Error) -> Self {
        match value {
            Error::Fault(status) => RpcError::Fault(status),
            Error::RpcError(e) => e,
            Error::NdrError(e) => RpcError::NdrError(e),
            other => RpcError::SendReceiveError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
