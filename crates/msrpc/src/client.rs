//! A client for connection-oriented RPC: bind to one interface, then issue calls.

use std::{future::Future, net::SocketAddr};

use msrpc_ndr::{NdrContext, NdrSyntax};
use msrpc_rpc::{
    RpcStatus,
    interface::{BoundRpcConnection, RpcInterface},
    pdu::*,
};
use msrpc_transport::{RpcTransport, RpcTransportRead, RpcTransportWrite, TcpTransport};

use crate::{Error, config::ClientConfig, fragment::split_stub};

/// Caps what a response's `alloc_hint` may make us reserve up front.
const MAX_PREALLOCATION: usize = 1 << 20;

/// An unbound connection to an RPC server.
pub struct RpcClient {
    reader: Box<dyn RpcTransportRead>,
    writer: Box<dyn RpcTransportWrite>,
    config: ClientConfig,
    server_address: SocketAddr,
    next_call_id: u32,
}

impl RpcClient {
    pub async fn connect(server_address: SocketAddr, config: ClientConfig) -> crate::Result<Self> {
        config.validate()?;
        let mut transport = Box::new(TcpTransport::new(config.timeout()));
        transport.connect(server_address).await?;
        let (reader, writer) = transport.split()?;
        log::debug!("Connected to {server_address}");
        Ok(Self {
            reader,
            writer,
            config,
            server_address,
            next_call_id: 1,
        })
    }

    pub fn server_address(&self) -> SocketAddr {
        self.server_address
    }

    fn next_call_id(&mut self) -> u32 {
        let call_id = self.next_call_id;
        self.next_call_id = self.next_call_id.wrapping_add(1).max(1);
        call_id
    }

    async fn send(&mut self, pdu: DceRpcCoRequestPkt) -> crate::Result<()> {
        let data: Vec<u8> = pdu.try_into()?;
        self.writer.send_raw(&data).await?;
        Ok(())
    }

    async fn receive(&mut self) -> crate::Result<DceRpcCoResponsePkt> {
        let data = self.reader.receive().await?;
        Ok(DceRpcCoResponsePkt::try_from(data.as_slice())?)
    }

    /// Binds the connection to an interface, proposing a single transfer syntax.
    pub async fn bind(mut self, syntax: DceRpcSyntaxId, ndr: NdrSyntax) -> crate::Result<BoundPipe> {
        let call_id = self.next_call_id();
        let transfer_syntax = DceRpcSyntaxId::from(ndr);
        let bind = DcRpcCoPktBind {
            max_xmit_frag: self.config.max_xmit_frag,
            max_recv_frag: self.config.max_recv_frag,
            assoc_group_id: 0,
            context_elements: vec![DcRpcCoPktBindContextElement {
                context_id: 0,
                abstract_syntax: syntax,
                transfer_syntaxes: vec![transfer_syntax],
            }],
        };
        log::debug!("Binding to {syntax} over {ndr}");
        self.send(DceRpcCoRequestPkt::new(
            bind.into(),
            call_id,
            DceRpcCoPktFlags::single_fragment(),
            PACKED_DREP_LE,
        ))
        .await?;

        let ack = match self.receive().await?.into_content() {
            DcRpcCoPktResponseContent::BindAck(ack) => ack,
            DcRpcCoPktResponseContent::BindNak(nak) => {
                return Err(Error::BindRejected(format!("{:?}", nak.reason)));
            }
            DcRpcCoPktResponseContent::Shutdown(_) => return Err(Error::ConnectionClosed),
            other => {
                return Err(Error::InvalidMessage(format!(
                    "Unexpected {:?} in answer to bind",
                    other.get_type()
                )));
            }
        };

        let result = ack
            .results
            .first()
            .ok_or_else(|| Error::InvalidMessage("Bind ack has no results".to_string()))?;
        if result.result != DceRpcCoPktBindAckDefResult::Acceptance {
            return Err(Error::BindRejected(format!(
                "{:?} ({:?})",
                result.result, result.reason
            )));
        }
        if result.syntax != transfer_syntax {
            return Err(Error::InvalidMessage(format!(
                "Server accepted unproposed transfer syntax {}",
                result.syntax
            )));
        }

        log::debug!(
            "Bound to {syntax}, group {:#x}, frag sizes xmit {} recv {}",
            ack.assoc_group_id,
            ack.max_recv_frag,
            ack.max_xmit_frag
        );
        Ok(BoundPipe {
            // The server's receive size bounds what we transmit, and vice versa.
            max_xmit_frag: ack.max_recv_frag,
            max_recv_frag: ack.max_xmit_frag,
            assoc_group_id: ack.assoc_group_id,
            ndr: NdrContext::new(ndr),
            context_id: 0,
            client: self,
        })
    }

    /// Binds and wraps the pipe in the interface's typed client.
    pub async fn bind_interface<I>(self, ndr: NdrSyntax) -> crate::Result<I>
    where
        I: RpcInterface<BoundPipe>,
    {
        Ok(I::new(self.bind(I::SYNTAX_ID, ndr).await?))
    }
}

/// A connection bound to one interface.
pub struct BoundPipe {
    client: RpcClient,
    ndr: NdrContext,
    context_id: u16,
    max_xmit_frag: u16,
    max_recv_frag: u16,
    assoc_group_id: u32,
}

impl BoundPipe {
    pub fn assoc_group_id(&self) -> u32 {
        self.assoc_group_id
    }

    pub fn max_xmit_frag(&self) -> u16 {
        self.max_xmit_frag
    }

    pub fn max_recv_frag(&self) -> u16 {
        self.max_recv_frag
    }

    /// Sends a request, fragmented as needed, and returns the reassembled response stub.
    pub async fn call(&mut self, opnum: u16, stub_input: Vec<u8>) -> crate::Result<Vec<u8>> {
        let call_id = self.client.next_call_id();
        let chunks = split_stub(&stub_input, self.max_xmit_frag);
        let count = chunks.len();
        let mut remaining = stub_input.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let request = DcRpcCoPktRequest {
                alloc_hint: remaining as u32,
                context_id: self.context_id,
                opnum,
                object: None,
                stub_data: chunk.to_vec(),
            };
            remaining -= chunk.len();
            let flags = DceRpcCoPktFlags::new()
                .with_first_frag(i == 0)
                .with_last_frag(i + 1 == count);
            self.client
                .send(DceRpcCoRequestPkt::new(
                    request.into(),
                    call_id,
                    flags,
                    PACKED_DREP_LE,
                ))
                .await?;
        }
        log::trace!("Sent call {call_id} opnum {opnum} in {count} fragments");

        let mut stub_output = Vec::new();
        loop {
            let pdu = self.client.receive().await?;
            let pdu_call_id = pdu.call_id();
            let flags = pdu.pfc_flags();
            match pdu.into_content() {
                DcRpcCoPktResponseContent::Shutdown(_) => return Err(Error::ConnectionClosed),
                DcRpcCoPktResponseContent::Response(response) if pdu_call_id == call_id => {
                    if stub_output.is_empty() {
                        stub_output.reserve((response.alloc_hint as usize).min(MAX_PREALLOCATION));
                    }
                    stub_output.extend_from_slice(&response.stub_data);
                    if flags.last_frag() {
                        return Ok(stub_output);
                    }
                }
                DcRpcCoPktResponseContent::Fault(fault) if pdu_call_id == call_id => {
                    return Err(Error::Fault(RpcStatus(fault.status)));
                }
                other => {
                    return Err(Error::InvalidMessage(format!(
                        "Unexpected {:?} for call {pdu_call_id} while waiting for call {call_id}",
                        other.get_type()
                    )));
                }
            }
        }
    }
}

impl BoundRpcConnection for BoundPipe {
    fn ndr_context(&self) -> NdrContext {
        self.ndr
    }

    fn send_receive_raw(
        &mut self,
        opnum: u16,
        stub_input: Vec<u8>,
    ) -> impl Future<Output = msrpc_rpc::Result<Vec<u8>>> + Send {
        async move { self.call(opnum, stub_input).await.map_err(Into::into) }
    }
}
