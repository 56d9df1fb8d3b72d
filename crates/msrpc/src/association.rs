//! The server side of one connection: presentation contexts, fragment reassembly,
//! and the mapping of dispatch results to response and fault PDUs.

use std::{
    collections::HashMap,
    net::SocketAddr,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use futures_util::FutureExt;
use msrpc_ndr::{NdrContext, NdrReader, encode_stub};
use msrpc_rpc::{
    RpcStatus,
    interface::{CallContext, ServerHandle, ServerRegistry},
    pdu::*,
};

use crate::{
    config::{MIN_FRAG_SIZE, ServerConfig},
    fragment::{FragmentAssembler, split_stub},
};

/// State shared by every connection of a server.
pub struct ServerShared {
    pub config: ServerConfig,
    pub registry: ServerRegistry,
    next_association_id: AtomicU64,
    next_assoc_group_id: AtomicU32,
}

impl ServerShared {
    pub fn new(config: ServerConfig, registry: ServerRegistry) -> Self {
        Self {
            config,
            registry,
            next_association_id: AtomicU64::new(1),
            next_assoc_group_id: AtomicU32::new(0x1000),
        }
    }

    pub fn allocate_association_id(&self) -> u64 {
        self.next_association_id.fetch_add(1, Ordering::Relaxed)
    }

    fn allocate_assoc_group_id(&self) -> u32 {
        self.next_assoc_group_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// What was agreed in the bind.
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    max_xmit_frag: u16,
    max_recv_frag: u16,
    assoc_group_id: u32,
    features: BindTimeFeatures,
}

#[derive(Clone)]
struct PresentationContext {
    handle: Arc<dyn ServerHandle>,
    syntax: DceRpcSyntaxId,
    ndr: msrpc_ndr::NdrSyntax,
}

/// A request ready to run.
pub struct PreparedCall {
    handle: Arc<dyn ServerHandle>,
    ctx: CallContext,
    opnum: u16,
    stub_data: Vec<u8>,
    max_xmit_frag: u16,
}

impl PreparedCall {
    pub fn call_id(&self) -> u32 {
        self.ctx.call_id
    }

    pub fn context_id(&self) -> u16 {
        self.ctx.context_id
    }

    /// Dispatches the call, and returns the PDUs answering it.
    pub async fn execute(self) -> Vec<DceRpcCoResponsePkt> {
        let PreparedCall {
            handle,
            ctx,
            opnum,
            stub_data,
            max_xmit_frag,
        } = self;

        log::trace!(
            "Association {}: call {} -> {} opnum {opnum} ({} stub bytes, {})",
            ctx.association_id,
            ctx.call_id,
            handle.name(),
            stub_data.len(),
            ctx.ndr.syntax
        );

        let mut reader = NdrReader::new(&stub_data, ctx.ndr);
        let dispatched = AssertUnwindSafe(handle.dispatch(&ctx, opnum, &mut reader))
            .catch_unwind()
            .await;
        let Ok(dispatched) = dispatched else {
            log::error!(
                "Call {} to {} opnum {opnum}: handler panicked",
                ctx.call_id,
                handle.name()
            );
            return vec![fault_pdu(
                ctx.call_id,
                ctx.context_id,
                RpcStatus::RPC_S_CALL_FAILED,
                false,
            )];
        };
        let (status, did_not_execute) = match dispatched {
            Ok(response) => match encode_stub(ctx.ndr, response.as_ref()) {
                Ok(output) => {
                    return response_pdus(ctx.call_id, ctx.context_id, &output, max_xmit_frag);
                }
                Err(e) => {
                    log::error!(
                        "Failed to encode response of {} opnum {opnum}: {e}",
                        handle.name()
                    );
                    (RpcStatus::NCA_S_FAULT_NDR, false)
                }
            },
            Err(e) => {
                log::debug!(
                    "Call {} to {} opnum {opnum} failed: {e}",
                    ctx.call_id,
                    handle.name()
                );
                (e.fault_status(), e.did_not_execute())
            }
        };
        vec![fault_pdu(
            ctx.call_id,
            ctx.context_id,
            status,
            did_not_execute,
        )]
    }
}

/// The outcome of a request fragment.
pub enum RequestOutcome {
    /// More fragments are expected.
    Pending,
    Ready(PreparedCall),
    Fault(DceRpcCoResponsePkt),
}

/// The server side of one transport connection.
pub struct Association {
    id: u64,
    shared: Arc<ServerShared>,
    port_spec: String,
    peer: Option<SocketAddr>,
    negotiated: Option<Negotiated>,
    contexts: HashMap<u16, PresentationContext>,
    fragments: FragmentAssembler,
}

impl Association {
    pub fn new(
        id: u64,
        shared: Arc<ServerShared>,
        port_spec: String,
        peer: Option<SocketAddr>,
    ) -> Self {
        let fragments = FragmentAssembler::new(shared.config.max_request_size);
        Self {
            id,
            shared,
            port_spec,
            peer,
            negotiated: None,
            contexts: HashMap::new(),
            fragments,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_bound(&self) -> bool {
        self.negotiated.is_some()
    }

    /// The fragment size used for responses.
    pub fn max_xmit_frag(&self) -> u16 {
        self.negotiated
            .map_or(self.shared.config.max_xmit_frag, |n| n.max_xmit_frag)
    }

    pub fn negotiated_features(&self) -> BindTimeFeatures {
        self.negotiated.map(|n| n.features).unwrap_or_default()
    }

    /// The transfer syntax accepted for a presentation context.
    pub fn context_syntax(&self, context_id: u16) -> Option<DceRpcSyntaxId> {
        self.contexts.get(&context_id).map(|c| c.syntax)
    }

    pub fn handle_bind(
        &mut self,
        call_id: u32,
        rpc_ver: DceRpcVersion,
        bind: &DcRpcCoPktBind,
    ) -> DceRpcCoResponsePkt {
        if rpc_ver.major != DCE_RPC_VERSION.major {
            log::debug!(
                "Association {}: rejecting bind with rpc version {rpc_ver}",
                self.id
            );
            return bind_nak(
                call_id,
                DceRpcCoPktBindRejectReason::ProtocolVersionNotSupported,
                vec![DCE_RPC_VERSION],
            );
        }
        if self.negotiated.is_some() {
            log::debug!("Association {}: rejecting a second bind", self.id);
            return bind_nak(
                call_id,
                DceRpcCoPktBindRejectReason::ReasonNotSpecified,
                vec![],
            );
        }

        let config = &self.shared.config;
        let assoc_group_id = match bind.assoc_group_id {
            0 => self.shared.allocate_assoc_group_id(),
            requested => requested,
        };
        let mut negotiated = Negotiated {
            max_xmit_frag: bind.max_recv_frag.min(config.max_xmit_frag).max(MIN_FRAG_SIZE),
            max_recv_frag: bind.max_xmit_frag.min(config.max_recv_frag).max(MIN_FRAG_SIZE),
            assoc_group_id,
            features: BindTimeFeatures::new(),
        };

        let results = self.negotiate_contexts(&bind.context_elements, &mut negotiated.features);
        log::debug!(
            "Association {}: bound in group {assoc_group_id:#x}, frag sizes xmit {} recv {}",
            self.id,
            negotiated.max_xmit_frag,
            negotiated.max_recv_frag
        );
        self.negotiated = Some(negotiated);

        let ack = DcRpcCoPktBindAck {
            max_xmit_frag: negotiated.max_xmit_frag,
            max_recv_frag: negotiated.max_recv_frag,
            assoc_group_id,
            port_spec: self.port_spec.clone(),
            results,
        };
        DceRpcCoResponsePkt::new(ack.into(), call_id, self.ack_flags(), PACKED_DREP_LE)
    }

    pub fn handle_alter_context(
        &mut self,
        call_id: u32,
        alter: &DcRpcCoPktAlterContext,
    ) -> DceRpcCoResponsePkt {
        let Some(mut negotiated) = self.negotiated else {
            log::debug!(
                "Association {}: alter context before bind",
                self.id
            );
            return fault_pdu(call_id, 0, RpcStatus::NCA_S_PROTO_ERROR, true);
        };

        let results = self.negotiate_contexts(&alter.0.context_elements, &mut negotiated.features);
        self.negotiated = Some(negotiated);

        let resp = DcRpcCoPktAlterContextResp(DcRpcCoPktBindAck {
            max_xmit_frag: negotiated.max_xmit_frag,
            max_recv_frag: negotiated.max_recv_frag,
            assoc_group_id: negotiated.assoc_group_id,
            port_spec: String::new(),
            results,
        });
        DceRpcCoResponsePkt::new(resp.into(), call_id, self.ack_flags(), PACKED_DREP_LE)
    }

    fn ack_flags(&self) -> DceRpcCoPktFlags {
        DceRpcCoPktFlags::single_fragment().with_conc_mpx(self.shared.config.conc_mpx)
    }

    fn negotiate_contexts(
        &mut self,
        elements: &[DcRpcCoPktBindContextElement],
        features: &mut BindTimeFeatures,
    ) -> Vec<DcRpcCoPktBindAckResult> {
        elements
            .iter()
            .map(|element| self.negotiate_context(element, features))
            .collect()
    }

    fn negotiate_context(
        &mut self,
        element: &DcRpcCoPktBindContextElement,
        features: &mut BindTimeFeatures,
    ) -> DcRpcCoPktBindAckResult {
        if let Some(proposed) = element
            .transfer_syntaxes
            .iter()
            .find_map(|syntax| syntax.bind_time_features())
        {
            let agreed = BindTimeFeatures::new()
                .with_keep_connection_on_orphan(proposed.keep_connection_on_orphan());
            log::trace!(
                "Association {}: bind time features {proposed:?}, agreed {agreed:?}",
                self.id
            );
            *features = agreed;
            return DcRpcCoPktBindAckResult::negotiate_ack(agreed);
        }

        let Some(handle) = self.shared.registry.lookup(&element.abstract_syntax) else {
            log::debug!(
                "Association {}: context {} asks for unknown interface {}",
                self.id,
                element.context_id,
                element.abstract_syntax
            );
            return DcRpcCoPktBindAckResult::rejected(
                DcRpcCoPktBindAckReason::AbstractSyntaxNotSupported,
            );
        };

        let Some((syntax, ndr)) = element
            .transfer_syntaxes
            .iter()
            .find_map(|syntax| syntax.ndr_syntax().map(|ndr| (*syntax, ndr)))
        else {
            return DcRpcCoPktBindAckResult::rejected(
                DcRpcCoPktBindAckReason::ProposedTransferSyntaxesNotSupported,
            );
        };

        log::debug!(
            "Association {}: context {} is {} over {ndr}",
            self.id,
            element.context_id,
            handle.name()
        );
        self.contexts.insert(
            element.context_id,
            PresentationContext {
                handle,
                syntax,
                ndr,
            },
        );
        DcRpcCoPktBindAckResult::accepted(syntax)
    }

    /// Takes a request fragment.
    pub fn handle_request(
        &mut self,
        call_id: u32,
        flags: DceRpcCoPktFlags,
        packed_drep: u32,
        request: DcRpcCoPktRequest,
    ) -> RequestOutcome {
        let context_id = request.context_id;
        let complete = match self.fragments.push(call_id, flags, request) {
            Ok(Some(complete)) => complete,
            Ok(None) => return RequestOutcome::Pending,
            Err(status) => {
                return RequestOutcome::Fault(fault_pdu(call_id, context_id, status, true));
            }
        };

        let Some(context) = self.contexts.get(&complete.context_id) else {
            log::debug!(
                "Association {}: call {call_id} on unknown context {}",
                self.id,
                complete.context_id
            );
            return RequestOutcome::Fault(fault_pdu(
                call_id,
                complete.context_id,
                RpcStatus::NCA_S_UNK_IF,
                true,
            ));
        };

        let assoc_group_id = self.negotiated.map_or(0, |n| n.assoc_group_id);
        RequestOutcome::Ready(PreparedCall {
            handle: context.handle.clone(),
            ctx: CallContext {
                association_id: self.id,
                assoc_group_id,
                call_id,
                context_id: complete.context_id,
                object: complete.object,
                ndr: NdrContext::from_drep(context.ndr, packed_drep),
                peer: self.peer,
            },
            opnum: complete.opnum,
            stub_data: complete.stub_data,
            max_xmit_frag: self.max_xmit_frag(),
        })
    }

    /// Drops the partial fragments of an abandoned call.
    pub fn discard_fragments(&mut self, call_id: u32) -> bool {
        self.fragments.discard(call_id)
    }
}

/// Splits an encoded response into response PDUs.
pub fn response_pdus(
    call_id: u32,
    context_id: u16,
    stub: &[u8],
    max_xmit_frag: u16,
) -> Vec<DceRpcCoResponsePkt> {
    let chunks = split_stub(stub, max_xmit_frag);
    let count = chunks.len();
    let mut remaining = stub.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let response = DcRpcCoPktResponse {
                alloc_hint: remaining as u32,
                context_id,
                cancel_count: 0,
                stub_data: chunk.to_vec(),
            };
            remaining -= chunk.len();
            let flags = DceRpcCoPktFlags::new()
                .with_first_frag(i == 0)
                .with_last_frag(i + 1 == count);
            DceRpcCoResponsePkt::new(response.into(), call_id, flags, PACKED_DREP_LE)
        })
        .collect()
}

pub fn fault_pdu(
    call_id: u32,
    context_id: u16,
    status: RpcStatus,
    did_not_execute: bool,
) -> DceRpcCoResponsePkt {
    let fault = DcRpcCoPktFault {
        alloc_hint: 0,
        context_id,
        cancel_count: 0,
        status: status.0,
        stub_data: vec![],
    };
    DceRpcCoResponsePkt::new(
        fault.into(),
        call_id,
        DceRpcCoPktFlags::single_fragment().with_did_not_execute(did_not_execute),
        PACKED_DREP_LE,
    )
}

fn bind_nak(
    call_id: u32,
    reason: DceRpcCoPktBindRejectReason,
    protocols: Vec<DceRpcVersion>,
) -> DceRpcCoResponsePkt {
    DceRpcCoResponsePkt::new(
        DcRpcCoPktBindNak { reason, protocols }.into(),
        call_id,
        DceRpcCoPktFlags::single_fragment(),
        PACKED_DREP_LE,
    )
}
