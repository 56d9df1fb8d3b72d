//! Request reassembly and stub fragmentation.

use std::collections::HashMap;

use msrpc_dtyp::Guid;
use msrpc_rpc::{
    RpcStatus,
    pdu::{DceRpcCoPktFlags, DcRpcCoPktRequest},
};

/// Calls of one connection that may be mid-reassembly at once.
pub const MAX_PENDING_CALLS: usize = 64;

/// A request whose fragments have all arrived.
#[derive(Debug, PartialEq, Eq)]
pub struct CompleteRequest {
    pub call_id: u32,
    pub context_id: u16,
    pub opnum: u16,
    pub object: Option<Guid>,
    pub stub_data: Vec<u8>,
}

#[derive(Debug)]
struct PendingRequest {
    context_id: u16,
    opnum: u16,
    object: Option<Guid>,
    stub_data: Vec<u8>,
}

/// Reassembles request fragments, per call id.
///
/// `max_request_size` bounds a single request, and also the bytes buffered
/// across every incomplete call of the connection.
#[derive(Debug)]
pub struct FragmentAssembler {
    max_request_size: usize,
    buffered: usize,
    pending: HashMap<u32, PendingRequest>,
}

impl FragmentAssembler {
    pub fn new(max_request_size: usize) -> Self {
        Self {
            max_request_size,
            buffered: 0,
            pending: HashMap::new(),
        }
    }

    /// Adds a fragment. Returns the request once its last fragment is in.
    ///
    /// On error, anything buffered for the call is dropped, and the status should be
    /// sent back as a fault.
    pub fn push(
        &mut self,
        call_id: u32,
        flags: DceRpcCoPktFlags,
        fragment: DcRpcCoPktRequest,
    ) -> Result<Option<CompleteRequest>, RpcStatus> {
        if flags.first_frag() {
            if self.discard(call_id) {
                log::error!("Call {call_id} restarted before its last fragment");
                return Err(RpcStatus::NCA_S_PROTO_ERROR);
            }
            if fragment.stub_data.len() > self.max_request_size {
                return Err(RpcStatus::NCA_S_FAULT_REMOTE_NO_MEMORY);
            }
            if flags.last_frag() {
                return Ok(Some(CompleteRequest {
                    call_id,
                    context_id: fragment.context_id,
                    opnum: fragment.opnum,
                    object: fragment.object,
                    stub_data: fragment.stub_data,
                }));
            }
            if self.pending.len() >= MAX_PENDING_CALLS
                || self.buffered + fragment.stub_data.len() > self.max_request_size
            {
                log::debug!(
                    "Call {call_id} refused: {} calls hold {} bytes of fragments",
                    self.pending.len(),
                    self.buffered
                );
                return Err(RpcStatus::NCA_S_FAULT_REMOTE_NO_MEMORY);
            }
            self.buffered += fragment.stub_data.len();
            self.pending.insert(
                call_id,
                PendingRequest {
                    context_id: fragment.context_id,
                    opnum: fragment.opnum,
                    object: fragment.object,
                    stub_data: fragment.stub_data,
                },
            );
            return Ok(None);
        }

        let Some(pending) = self.pending.get_mut(&call_id) else {
            log::error!("Fragment of call {call_id} arrived without a first fragment");
            return Err(RpcStatus::NCA_S_PROTO_ERROR);
        };
        if pending.context_id != fragment.context_id || pending.opnum != fragment.opnum {
            self.discard(call_id);
            return Err(RpcStatus::NCA_S_PROTO_ERROR);
        }
        // The call's own bytes are part of `buffered`.
        if self.buffered + fragment.stub_data.len() > self.max_request_size {
            log::debug!(
                "Call {call_id} exceeds the request size limit of {} bytes",
                self.max_request_size
            );
            self.discard(call_id);
            return Err(RpcStatus::NCA_S_FAULT_REMOTE_NO_MEMORY);
        }
        pending.stub_data.extend_from_slice(&fragment.stub_data);
        self.buffered += fragment.stub_data.len();

        if !flags.last_frag() {
            return Ok(None);
        }
        Ok(self.take(call_id).map(|pending| CompleteRequest {
            call_id,
            context_id: pending.context_id,
            opnum: pending.opnum,
            object: pending.object,
            stub_data: pending.stub_data,
        }))
    }

    fn take(&mut self, call_id: u32) -> Option<PendingRequest> {
        let pending = self.pending.remove(&call_id)?;
        self.buffered -= pending.stub_data.len();
        Some(pending)
    }

    /// Drops the buffered fragments of a call. Returns whether there were any.
    pub fn discard(&mut self, call_id: u32) -> bool {
        self.take(call_id).is_some()
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Stub bytes held by incomplete calls.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }
}

/// Splits stub data into the bodies of request or response fragments of at most
/// `max_frag` bytes. Every chunk but the last is a multiple of 8 bytes.
///
/// An empty stub still makes one (empty) fragment.
pub fn split_stub(stub: &[u8], max_frag: u16) -> Vec<&[u8]> {
    let room = (max_frag as usize).saturating_sub(DcRpcCoPktRequest::HEADER_SIZE);
    let chunk_size = (room & !7).max(8);
    if stub.is_empty() {
        return vec![stub];
    }
    stub.chunks(chunk_size).collect()
}
