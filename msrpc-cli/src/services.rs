//! Implementations served by `msrpc serve`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use msrpc::{
    dtyp::status::{hresult, win32},
    ndr::{ContextHandle, NdrPtr},
    rpc::{
        RpcError, RpcStatus,
        interface::{
            CallContext, ServerRegistry,
            iunknown::*,
            nspi::{self, *},
            srvsvc::*,
            vds::*,
            windowsshutdown::*,
        },
    },
};

/// Logs shutdown requests without acting on them.
#[derive(Default)]
pub struct LoggingShutdown {
    pending: Mutex<bool>,
}

#[async_trait]
impl WindowsShutdownServer for LoggingShutdown {
    async fn wsdr_initiate_shutdown(
        &self,
        ctx: &CallContext,
        request: WsdrInitiateShutdownRequest,
    ) -> Result<WsdrInitiateShutdownResponse, RpcStatus> {
        let message = request
            .message
            .as_ref()
            .map(|m| m.to_string_lossy())
            .unwrap_or_default();
        let mut pending = self.pending.lock().map_err(|_| RpcStatus::RPC_S_CALL_FAILED)?;
        if *pending {
            return Ok(WsdrInitiateShutdownResponse {
                return_value: win32::ERROR_SHUTDOWN_IN_PROGRESS,
            });
        }
        *pending = true;
        log::info!(
            "Shutdown requested by {:?} in {}s (restart: {}, reason {:#x}): {message:?}",
            ctx.peer,
            request.grace_period,
            request.shutdown_flags.restart(),
            request.reason,
        );
        Ok(WsdrInitiateShutdownResponse {
            return_value: win32::ERROR_SUCCESS,
        })
    }

    async fn wsdr_abort_shutdown(
        &self,
        ctx: &CallContext,
        _request: WsdrAbortShutdownRequest,
    ) -> Result<WsdrAbortShutdownResponse, RpcStatus> {
        let mut pending = self.pending.lock().map_err(|_| RpcStatus::RPC_S_CALL_FAILED)?;
        let return_value = if std::mem::take(&mut *pending) {
            log::info!("Shutdown aborted by {:?}", ctx.peer);
            win32::ERROR_SUCCESS
        } else {
            win32::ERROR_NO_SHUTDOWN_IN_PROGRESS
        };
        Ok(WsdrAbortShutdownResponse { return_value })
    }
}

struct NspiSession {
    association_id: u64,
    stat: Stat,
}

/// Address book sessions, released when their connection closes.
#[derive(Default)]
pub struct NspiSessions {
    sessions: Mutex<HashMap<ContextHandle, NspiSession>>,
}

impl NspiSessions {
    fn sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ContextHandle, NspiSession>>, RpcStatus> {
        self.sessions.lock().map_err(|_| RpcStatus::RPC_S_CALL_FAILED)
    }
}

#[async_trait]
impl NspiServer for NspiSessions {
    async fn nspi_bind(
        &self,
        ctx: &CallContext,
        request: NspiBindRequest,
    ) -> Result<NspiBindResponse, RpcStatus> {
        let context_handle = ContextHandle::generate();
        self.sessions()?.insert(
            context_handle,
            NspiSession {
                association_id: ctx.association_id,
                stat: request.stat,
            },
        );
        log::info!(
            "NSPI session opened on connection {} (anonymous: {})",
            ctx.association_id,
            request.flags & FLAG_ANONYMOUS_LOGIN != 0
        );
        Ok(NspiBindResponse {
            server_guid: request
                .server_guid
                .into_inner()
                .map(|_| FlatUid::default())
                .into(),
            context_handle,
            return_value: nspi::ec::SUCCESS,
        })
    }

    async fn nspi_unbind(
        &self,
        _ctx: &CallContext,
        request: NspiUnbindRequest,
    ) -> Result<NspiUnbindResponse, RpcStatus> {
        let removed = self.sessions()?.remove(&request.context_handle);
        Ok(NspiUnbindResponse {
            context_handle: ContextHandle::NULL,
            return_value: match removed {
                Some(_) => nspi::ec::UNBIND_SUCCESS,
                None => nspi::ec::UNBIND_FAILURE,
            },
        })
    }

    async fn nspi_update_stat(
        &self,
        _ctx: &CallContext,
        request: NspiUpdateStatRequest,
    ) -> Result<NspiUpdateStatResponse, RpcStatus> {
        let mut sessions = self.sessions()?;
        let Some(session) = sessions.get_mut(&request.context_handle) else {
            return Err(RpcStatus::NCA_S_FAULT_CONTEXT_MISMATCH);
        };
        session.stat = request.stat;
        // The demo address book is empty: every position is the end.
        let delta = request.delta.into_inner().map(|_| 0).into();
        Ok(NspiUpdateStatResponse {
            stat: session.stat,
            delta,
            return_value: nspi::ec::SUCCESS,
        })
    }

    async fn nspi_rundown(&self, association_id: u64) {
        if let Ok(mut sessions) = self.sessions.lock() {
            let before = sessions.len();
            sessions.retain(|_, session| session.association_id != association_id);
            let released = before - sessions.len();
            if released > 0 {
                log::info!("Released {released} NSPI sessions of connection {association_id}");
            }
        }
    }
}

/// A fixed share list.
pub struct StaticShares {
    shares: Vec<ShareInfo1>,
}

impl StaticShares {
    /// Parses `NAME[:REMARK]` specifications; `IPC$` is always listed.
    pub fn new(specs: &[String]) -> Self {
        let mut shares = vec![ShareInfo1::new(
            "IPC$",
            ShareType::new().with_kind(ShareKind::IPC).with_special(true),
            "Remote IPC",
        )];
        shares.extend(specs.iter().map(|spec| {
            let (name, remark) = spec.split_once(':').unwrap_or((spec.as_str(), ""));
            ShareInfo1::new(name, ShareType::new(), remark)
        }));
        Self { shares }
    }
}

#[async_trait]
impl SrvSvcServer for StaticShares {
    async fn netr_share_enum(
        &self,
        _ctx: &CallContext,
        request: NetrShareEnumRequest,
    ) -> Result<NetrShareEnumResponse, RpcStatus> {
        let share_info = match request.info_struct.level {
            0 => ShareEnumUnion::Info0(NdrPtr::new(
                self.shares
                    .iter()
                    .map(|share| ShareInfo0 {
                        netname: share.netname.clone(),
                    })
                    .collect::<Vec<_>>()
                    .into(),
            )),
            1 => ShareEnumUnion::Info1(NdrPtr::new(self.shares.clone().into())),
            level => {
                log::debug!("Share enumeration at unsupported level {level}");
                return Ok(NetrShareEnumResponse {
                    info_struct: request.info_struct,
                    total_entries: 0,
                    resume_handle: NdrPtr::null(),
                    return_value: win32::ERROR_INVALID_LEVEL,
                });
            }
        };
        Ok(NetrShareEnumResponse {
            info_struct: share_info.into(),
            total_entries: self.shares.len() as u32,
            resume_handle: NdrPtr::null(),
            return_value: win32::ERROR_SUCCESS,
        })
    }
}

/// A disk service whose SAN policy lives in memory.
pub struct SanPolicyService {
    policy: Mutex<VdsSanPolicy>,
    references: Mutex<u32>,
}

impl Default for SanPolicyService {
    fn default() -> Self {
        Self {
            policy: Mutex::new(VdsSanPolicy::OfflineShared),
            references: Mutex::new(1),
        }
    }
}

impl SanPolicyService {
    fn adjust_references(&self, delta: i32) -> Result<u32, RpcStatus> {
        let mut references = self
            .references
            .lock()
            .map_err(|_| RpcStatus::RPC_S_CALL_FAILED)?;
        *references = references.saturating_add_signed(delta).max(1);
        Ok(*references)
    }
}

#[async_trait]
impl IUnknownServer for SanPolicyService {
    async fn query_interface(
        &self,
        _ctx: &CallContext,
        request: QueryInterfaceRequest,
    ) -> Result<QueryInterfaceResponse, RpcStatus> {
        log::debug!("QueryInterface for {}", request.iid);
        Ok(QueryInterfaceResponse {
            that: Default::default(),
            object: NdrPtr::null(),
            return_value: hresult::E_NOINTERFACE,
        })
    }

    async fn add_ref(
        &self,
        _ctx: &CallContext,
        _request: AddRefRequest,
    ) -> Result<AddRefResponse, RpcStatus> {
        Ok(AddRefResponse {
            that: Default::default(),
            return_value: self.adjust_references(1)?,
        })
    }

    async fn release(
        &self,
        _ctx: &CallContext,
        _request: ReleaseRequest,
    ) -> Result<ReleaseResponse, RpcStatus> {
        Ok(ReleaseResponse {
            that: Default::default(),
            return_value: self.adjust_references(-1)?,
        })
    }
}

#[async_trait]
impl IVdsServiceSanServer for SanPolicyService {
    async fn get_san_policy(
        &self,
        _ctx: &CallContext,
        _request: GetSanPolicyRequest,
    ) -> Result<GetSanPolicyResponse, RpcStatus> {
        let policy = *self.policy.lock().map_err(|_| RpcStatus::RPC_S_CALL_FAILED)?;
        Ok(GetSanPolicyResponse {
            that: Default::default(),
            san_policy: policy,
            return_value: hresult::S_OK,
        })
    }

    async fn set_san_policy(
        &self,
        _ctx: &CallContext,
        request: SetSanPolicyRequest,
    ) -> Result<SetSanPolicyResponse, RpcStatus> {
        let return_value = match request.san_policy {
            VdsSanPolicy::Unknown | VdsSanPolicy::Max => hresult::E_INVALIDARG,
            policy => {
                *self.policy.lock().map_err(|_| RpcStatus::RPC_S_CALL_FAILED)? = policy;
                log::info!("SAN policy set to {policy:?}");
                hresult::S_OK
            }
        };
        Ok(SetSanPolicyResponse {
            that: Default::default(),
            return_value,
        })
    }
}

/// Registers every demo interface.
pub fn registry(shares: &[String]) -> Result<ServerRegistry, RpcError> {
    let mut registry = ServerRegistry::new();
    register_windows_shutdown_server(&mut registry, Arc::new(LoggingShutdown::default()))?;
    register_nspi_server(&mut registry, Arc::new(NspiSessions::default()))?;
    register_srv_svc_server(&mut registry, Arc::new(StaticShares::new(shares)))?;
    register_i_vds_service_san_server(&mut registry, Arc::new(SanPolicyService::default()))?;
    Ok(registry)
}
