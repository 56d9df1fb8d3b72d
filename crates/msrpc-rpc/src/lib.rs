//! MS-RPCE (DCE/RPC) connection-oriented PDUs, opnum dispatch, and interface definitions.
//!
//! Interfaces are declared with [`rpc_interface!`], which generates the server trait,
//! its opnum dispatcher, and a typed client.

pub mod fault;
pub mod interface;
pub mod pdu;

pub use fault::RpcStatus;

use pdu::DceRpcSyntaxId;

#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("Send/Receive provider error: {0}")]
    SendReceiveError(String),

    #[error("Invalid response data: {0}")]
    InvalidResponseData(&'static str),

    #[error("Failed to parse PDU: {0}")]
    FailedToParsePdu(#[from] binrw::Error),

    #[error("NDR error: {0}")]
    NdrError(#[from] msrpc_ndr::NdrError),

    #[error("Call failed with fault status {0}")]
    Fault(RpcStatus),

    #[error("Interface {0} is already registered")]
    DuplicateInterface(DceRpcSyntaxId),
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
    pub use msrpc_dtyp;
    pub use msrpc_ndr;
    pub use log;
    pub use pastey;
}
