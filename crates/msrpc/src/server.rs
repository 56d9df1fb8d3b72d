//! The listener, and the worker loops serving each connection.

use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use msrpc_rpc::{RpcStatus, interface::ServerRegistry, pdu::*};
use msrpc_transport::{RpcTransport, RpcTransportRead, RpcTransportWrite, TcpTransport, TransportError};
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    select,
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    association::{Association, RequestOutcome, ServerShared, fault_pdu},
    config::ServerConfig,
};

/// PDUs answering one call, or one control PDU; written back to back.
type Outgoing = Vec<DceRpcCoResponsePkt>;

/// Serves registered interfaces over ncacn_ip_tcp.
pub struct RpcServer {
    shared: Arc<ServerShared>,
}

impl RpcServer {
    pub fn new(config: ServerConfig, registry: ServerRegistry) -> crate::Result<Self> {
        config.validate()?;
        if registry.is_empty() {
            log::debug!("Creating a server with no registered interface");
        }
        Ok(Self {
            shared: Arc::new(ServerShared::new(config, registry)),
        })
    }

    /// Starts listening. Connections are accepted once [`ListeningServer::serve`] runs.
    pub async fn bind(self, address: impl ToSocketAddrs) -> crate::Result<ListeningServer> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(TransportError::from)?;
        let local_addr = listener.local_addr().map_err(TransportError::from)?;
        let port_spec = self
            .shared
            .config
            .port_spec
            .clone()
            .unwrap_or_else(|| local_addr.port().to_string());
        log::debug!("Listening on {local_addr}");
        Ok(ListeningServer {
            listener,
            local_addr,
            port_spec: format!("{port_spec}\0"),
            shared: self.shared,
            token: CancellationToken::new(),
        })
    }
}

/// Stops a running server: the accept loop ends, and every connection is sent a
/// shutdown PDU and closed.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        log::debug!("Server shutdown requested");
        self.0.cancel();
    }
}

pub struct ListeningServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    port_spec: String,
    shared: Arc<ServerShared>,
    token: CancellationToken,
}

impl ListeningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.token.clone())
    }

    /// Accepts and serves connections until shut down.
    pub async fn serve(self) -> crate::Result<()> {
        let mut connections = JoinSet::new();
        loop {
            select! {
                _ = self.token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let worker = ConnectionWorker {
                            association: Association::new(
                                self.shared.allocate_association_id(),
                                self.shared.clone(),
                                self.port_spec.clone(),
                                Some(peer),
                            ),
                            shared: self.shared.clone(),
                            token: self.token.child_token(),
                            calls: RunningCalls::default(),
                        };
                        log::debug!("Accepted connection {} from {peer}", worker.association.id());
                        connections.spawn(worker.run(socket));
                    }
                    Err(e) => log::error!("Failed to accept a connection: {e}"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        log::error!("Connection task failed: {e}");
                    }
                }
            }
        }

        log::debug!(
            "Stopping server, waiting for {} connections",
            connections.len()
        );
        while let Some(finished) = connections.join_next().await {
            finished?;
        }
        Ok(())
    }
}

struct RunningCall {
    context_id: u16,
    /// Set once the call's answer is produced; it can no longer be cancelled.
    answered: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Calls running on their own tasks, by call id.
#[derive(Default)]
struct RunningCalls(HashMap<u32, RunningCall>);

impl RunningCalls {
    /// Runs `call` on a new task, which queues the call's answer on `tx`.
    fn spawn<F>(&mut self, call_id: u32, context_id: u16, call: F, tx: mpsc::Sender<Outgoing>)
    where
        F: Future<Output = Outgoing> + Send + 'static,
    {
        self.0.retain(|_, running| !running.task.is_finished());
        let answered = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn({
            let answered = answered.clone();
            async move {
                let pdus = call.await;
                answered.store(true, Ordering::Release);
                let _ = tx.send(pdus).await;
            }
        });
        self.0.insert(
            call_id,
            RunningCall {
                context_id,
                answered,
                task,
            },
        );
    }

    /// Aborts a call. Returns its context id when it was aborted before answering.
    fn abort(&mut self, call_id: u32) -> Option<u16> {
        let call = self.0.remove(&call_id)?;
        if call.task.is_finished() || call.answered.load(Ordering::Acquire) {
            return None;
        }
        call.task.abort();
        Some(call.context_id)
    }

    /// Aborts every unfinished call, and waits for all of them.
    async fn abort_all(&mut self, id: u64) {
        for (call_id, call) in self.0.drain() {
            if !call.task.is_finished() {
                log::debug!("Connection {id}: aborting call {call_id}");
                call.task.abort();
            }
            let _ = call.task.await;
        }
    }
}

/// Serves one connection: a receive loop handling PDUs, and a send loop writing
/// whatever the receive loop and running calls produce.
struct ConnectionWorker {
    association: Association,
    shared: Arc<ServerShared>,
    token: CancellationToken,
    calls: RunningCalls,
}

impl ConnectionWorker {
    async fn run(mut self, socket: TcpStream) {
        let id = self.association.id();
        let timeout = self.shared.config.idle_timeout.unwrap_or(Duration::ZERO);
        let transport = match TcpTransport::from_stream(socket, timeout) {
            Ok(transport) => transport.with_max_frame_size(self.shared.config.max_recv_frag as usize),
            Err(e) => {
                log::error!("Connection {id}: failed to set up transport: {e}");
                return;
            }
        };
        let (rtransport, wtransport) = match Box::new(transport).split() {
            Ok(halves) => halves,
            Err(e) => {
                log::error!("Connection {id}: failed to split transport: {e}");
                return;
            }
        };

        let (tx, rx) = mpsc::channel(100);
        let send_task = tokio::spawn(Self::loop_send(id, wtransport, rx));
        self.loop_receive(rtransport, &tx).await;

        self.calls.abort_all(id).await;
        drop(tx);
        if let Err(e) = send_task.await {
            log::error!("Connection {id}: send loop failed: {e}");
        }

        for handle in self.shared.registry.handles() {
            handle.rundown(id).await;
        }
        log::debug!("Connection {id} closed");
    }

    async fn loop_receive(
        &mut self,
        mut rtransport: Box<dyn RpcTransportRead>,
        tx: &mpsc::Sender<Outgoing>,
    ) {
        let id = self.association.id();
        let mut pdu_count: u64 = 0;
        loop {
            let received = select! {
                biased;

                _ = self.token.cancelled() => {
                    log::debug!("Connection {id}: server is shutting down");
                    let shutdown = DceRpcCoResponsePkt::new(
                        DcRpcCoPktShutdown.into(),
                        0,
                        DceRpcCoPktFlags::single_fragment(),
                        PACKED_DREP_LE,
                    );
                    let _ = tx.send(vec![shutdown]).await;
                    break;
                }

                received = rtransport.receive() => received,
            };

            let data = match received {
                Ok(data) => data,
                Err(TransportError::NotConnected) => {
                    log::debug!("Connection {id}: peer closed after {pdu_count} PDUs");
                    break;
                }
                Err(TransportError::Timeout(t)) => {
                    log::debug!("Connection {id}: idle for {t:?}, closing");
                    break;
                }
                Err(e) => {
                    log::error!("Connection {id}: receive failed after {pdu_count} PDUs: {e}");
                    break;
                }
            };
            pdu_count += 1;

            match self.handle_pdu(&data, tx).await {
                Ok(()) => {}
                Err(Error::ConnectionStopped) => break,
                Err(e) => {
                    log::error!("Connection {id}: {e}; closing");
                    break;
                }
            }
        }
    }

    async fn loop_send(
        id: u64,
        mut wtransport: Box<dyn RpcTransportWrite>,
        mut rx: mpsc::Receiver<Outgoing>,
    ) {
        while let Some(pdus) = rx.recv().await {
            for pdu in pdus {
                let data: Vec<u8> = match pdu.try_into() {
                    Ok(data) => data,
                    Err(e) => {
                        log::error!("Connection {id}: failed to write PDU: {e}");
                        continue;
                    }
                };
                if let Err(e) = wtransport.send_raw(&data).await {
                    log::error!("Connection {id}: send failed: {e}");
                    rx.close();
                    return;
                }
            }
        }
        log::trace!("Connection {id}: send loop done");
    }

    async fn send(tx: &mpsc::Sender<Outgoing>, pdus: Outgoing) -> crate::Result<()> {
        tx.send(pdus).await.map_err(|_| Error::ConnectionStopped)
    }

    async fn handle_pdu(&mut self, data: &[u8], tx: &mpsc::Sender<Outgoing>) -> crate::Result<()> {
        let header = peek_header(data)?;
        if !header.is_little_endian() {
            return Err(Error::InvalidMessage(format!(
                "unsupported data representation {:#010x}",
                header.packed_drep
            )));
        }

        let pdu = DceRpcCoRequestPkt::try_from(data)?;
        let call_id = pdu.call_id();
        let flags = pdu.pfc_flags();
        let rpc_ver = pdu.rpc_ver();
        let packed_drep = pdu.packed_drep();
        log::trace!(
            "Connection {}: {:?} for call {call_id}, flags {flags:?}",
            self.association.id(),
            pdu.content().get_type()
        );

        match pdu.into_content() {
            DcRpcCoPktRequestContent::Bind(bind) => {
                let reply = self.association.handle_bind(call_id, rpc_ver, &bind);
                Self::send(tx, vec![reply]).await
            }
            DcRpcCoPktRequestContent::AlterContext(alter) => {
                let reply = self.association.handle_alter_context(call_id, &alter);
                Self::send(tx, vec![reply]).await
            }
            DcRpcCoPktRequestContent::Request(request) => {
                match self
                    .association
                    .handle_request(call_id, flags, packed_drep, request)
                {
                    RequestOutcome::Pending => Ok(()),
                    RequestOutcome::Fault(fault) => Self::send(tx, vec![fault]).await,
                    RequestOutcome::Ready(call) => self.start_call(call, tx).await,
                }
            }
            DcRpcCoPktRequestContent::CoCancel(_) => {
                self.association.discard_fragments(call_id);
                if let Some(context_id) = self.calls.abort(call_id) {
                    log::debug!(
                        "Connection {}: call {call_id} cancelled",
                        self.association.id()
                    );
                    let fault = fault_pdu(call_id, context_id, RpcStatus::NCA_S_FAULT_CANCEL, false);
                    return Self::send(tx, vec![fault]).await;
                }
                Ok(())
            }
            DcRpcCoPktRequestContent::Orphaned(_) => {
                let discarded = self.association.discard_fragments(call_id);
                let aborted = self.calls.abort(call_id).is_some();
                log::debug!(
                    "Connection {}: call {call_id} orphaned (fragments dropped: {discarded}, aborted: {aborted})",
                    self.association.id()
                );
                Ok(())
            }
        }
    }

    async fn start_call(
        &mut self,
        call: crate::association::PreparedCall,
        tx: &mpsc::Sender<Outgoing>,
    ) -> crate::Result<()> {
        if !self.shared.config.conc_mpx {
            let pdus = call.execute().await;
            return Self::send(tx, pdus).await;
        }

        let call_id = call.call_id();
        let context_id = call.context_id();
        self.calls.spawn(call_id, context_id, call.execute(), tx.clone());
        Ok(())
    }
}
