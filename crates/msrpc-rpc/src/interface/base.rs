use std::{fmt::Debug, future::Future, net::SocketAddr};

use async_trait::async_trait;
use msrpc_dtyp::Guid;
use msrpc_ndr::{NdrContext, NdrDecode, NdrEncode, NdrError, NdrReader, decode_stub, encode_stub};

use crate::{RpcStatus, pdu::DceRpcSyntaxId};

/// The request structure of an operation.
pub trait RpcCall: NdrEncode + NdrDecode {
    const OPNUM: u16;

    type ResponseType: NdrEncode + NdrDecode;
}

/// A typed client of an interface, wrapping a bound connection.
pub trait RpcInterface<T> {
    const SYNTAX_ID: DceRpcSyntaxId;

    fn new(bound_pipe: T) -> Self;
}

/// A connection bound to a single interface, able to carry calls.
pub trait BoundRpcConnection {
    /// The NDR flavor negotiated at bind time.
    fn ndr_context(&self) -> NdrContext;

    fn send_receive_raw(
        &mut self,
        opnum: u16,
        stub_input: Vec<u8>,
    ) -> impl Future<Output = crate::Result<Vec<u8>>> + Send;

    fn send_receive<C>(
        &mut self,
        request: C,
    ) -> impl Future<Output = crate::Result<C::ResponseType>> + Send
    where
        Self: Send,
        C: RpcCall + Send,
    {
        async move {
            let ctx = self.ndr_context();
            let stub_input = encode_stub(ctx, &request)?;
            let stub_output = self.send_receive_raw(C::OPNUM, stub_input).await?;
            Ok(decode_stub(ctx, &stub_output)?)
        }
    }
}

/// What a handler knows about the call it serves.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Identifies the transport connection; passed to [`ServerHandle::rundown`] on close.
    pub association_id: u64,
    pub assoc_group_id: u32,
    pub call_id: u32,
    pub context_id: u16,
    /// The object UUID of the request, when the client sent one.
    pub object: Option<Guid>,
    pub ndr: NdrContext,
    pub peer: Option<SocketAddr>,
}

/// An encodable response, type-erased by the dispatcher.
pub trait RpcResponse: NdrEncode + Send + Sync + Debug {}

impl<T> RpcResponse for T where T: NdrEncode + Send + Sync + Debug {}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Failed to decode request stub: {0}")]
    Decode(#[from] NdrError),

    #[error("Unknown opnum {0}")]
    UnknownOpnum(u16),

    #[error("Handler failed: {0}")]
    Handler(#[from] RpcStatus),
}

impl DispatchError {
    /// The status of the fault PDU answering this error.
    pub fn fault_status(&self) -> RpcStatus {
        match self {
            DispatchError::Decode(_) => RpcStatus::NCA_S_FAULT_NDR,
            DispatchError::UnknownOpnum(_) => RpcStatus::NCA_S_OP_RNG_ERROR,
            DispatchError::Handler(status) => *status,
        }
    }

    /// Whether the handler was never invoked.
    pub fn did_not_execute(&self) -> bool {
        !matches!(self, DispatchError::Handler(_))
    }
}

/// A registered interface implementation, as seen by the runtime.
///
/// Implemented by the `<Name>ServerHandle` types that [`rpc_interface!`](crate::rpc_interface)
/// generates.
#[async_trait]
pub trait ServerHandle: Send + Sync {
    fn syntax_id(&self) -> DceRpcSyntaxId;

    fn name(&self) -> &'static str;

    /// Decodes the request of `opnum` from `reader`, and invokes the handler.
    async fn dispatch(
        &self,
        ctx: &CallContext,
        opnum: u16,
        reader: &mut NdrReader<'_>,
    ) -> Result<Box<dyn RpcResponse>, DispatchError>;

    /// Called once the association has closed.
    async fn rundown(&self, _association_id: u64) {}
}
