use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use msrpc_dtyp::{Guid, status::hresult, status::win32};
use msrpc_ndr::{NdrContext, NdrDecode, NdrEncode, NdrReader, NdrSyntax, decode_stub, encode_stub};
use pretty_assertions::assert_eq;

use super::{
    dcom::{OrpcThat, OrpcThis},
    iunknown::*,
    vds::*,
    windowsshutdown::*,
    *,
};
use crate::{RpcError, RpcStatus, pdu::DceRpcSyntaxId};

#[derive(Default)]
struct ShutdownRecorder {
    calls: Mutex<Vec<String>>,
    rundowns: AtomicU32,
}

impl ShutdownRecorder {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WindowsShutdownServer for ShutdownRecorder {
    async fn wsdr_initiate_shutdown(
        &self,
        _ctx: &CallContext,
        request: WsdrInitiateShutdownRequest,
    ) -> Result<WsdrInitiateShutdownResponse, RpcStatus> {
        self.record(format!("initiate {}", request.grace_period));
        if request.shutdown_flags.poweroff() {
            return Err(RpcStatus::RPC_S_ACCESS_DENIED);
        }
        Ok(WsdrInitiateShutdownResponse {
            return_value: win32::ERROR_SUCCESS,
        })
    }

    async fn wsdr_abort_shutdown(
        &self,
        _ctx: &CallContext,
        _request: WsdrAbortShutdownRequest,
    ) -> Result<WsdrAbortShutdownResponse, RpcStatus> {
        self.record("abort");
        Ok(WsdrAbortShutdownResponse {
            return_value: win32::ERROR_NO_SHUTDOWN_IN_PROGRESS,
        })
    }

    async fn windows_shutdown_rundown(&self, association_id: u64) {
        self.record(format!("rundown {association_id}"));
        self.rundowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct SanService {
    refs: AtomicU32,
    policy: Mutex<VdsSanPolicy>,
}

impl SanService {
    fn new() -> Self {
        Self {
            refs: AtomicU32::new(1),
            policy: Mutex::new(VdsSanPolicy::Online),
        }
    }
}

#[async_trait]
impl IUnknownServer for SanService {
    async fn query_interface(
        &self,
        _ctx: &CallContext,
        _request: QueryInterfaceRequest,
    ) -> Result<QueryInterfaceResponse, RpcStatus> {
        Ok(QueryInterfaceResponse {
            return_value: hresult::E_NOINTERFACE,
            ..Default::default()
        })
    }

    async fn add_ref(
        &self,
        _ctx: &CallContext,
        _request: AddRefRequest,
    ) -> Result<AddRefResponse, RpcStatus> {
        Ok(AddRefResponse {
            that: OrpcThat::default(),
            return_value: self.refs.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn release(
        &self,
        _ctx: &CallContext,
        _request: ReleaseRequest,
    ) -> Result<ReleaseResponse, RpcStatus> {
        Ok(ReleaseResponse {
            that: OrpcThat::default(),
            return_value: self.refs.fetch_sub(1, Ordering::SeqCst) - 1,
        })
    }
}

#[async_trait]
impl IVdsServiceSanServer for SanService {
    async fn get_san_policy(
        &self,
        _ctx: &CallContext,
        _request: GetSanPolicyRequest,
    ) -> Result<GetSanPolicyResponse, RpcStatus> {
        Ok(GetSanPolicyResponse {
            that: OrpcThat::default(),
            san_policy: *self.policy.lock().unwrap(),
            return_value: hresult::S_OK,
        })
    }

    async fn set_san_policy(
        &self,
        _ctx: &CallContext,
        request: SetSanPolicyRequest,
    ) -> Result<SetSanPolicyResponse, RpcStatus> {
        if request.san_policy == VdsSanPolicy::Unknown || request.san_policy == VdsSanPolicy::Max {
            return Ok(SetSanPolicyResponse {
                that: OrpcThat::default(),
                return_value: hresult::E_INVALIDARG,
            });
        }
        *self.policy.lock().unwrap() = request.san_policy;
        Ok(SetSanPolicyResponse {
            that: OrpcThat::default(),
            return_value: hresult::S_OK,
        })
    }
}

fn call_context(syntax: NdrSyntax) -> CallContext {
    CallContext {
        association_id: 7,
        assoc_group_id: 0x1234,
        call_id: 1,
        context_id: 0,
        object: None,
        ndr: NdrContext::new(syntax),
        peer: None,
    }
}

/// Runs one call through `handle`, and decodes its response.
async fn call<Req, Resp>(
    handle: &dyn ServerHandle,
    syntax: NdrSyntax,
    opnum: u16,
    request: &Req,
) -> Result<Resp, DispatchError>
where
    Req: NdrEncode,
    Resp: NdrDecode,
{
    let ctx = call_context(syntax);
    let stub = encode_stub(ctx.ndr, request).unwrap();
    let mut reader = NdrReader::new(&stub, ctx.ndr);
    let response = handle.dispatch(&ctx, opnum, &mut reader).await?;
    let data = encode_stub(ctx.ndr, response.as_ref()).unwrap();
    Ok(decode_stub(ctx.ndr, &data).unwrap())
}

fn shutdown_registry() -> (ServerRegistry, Arc<ShutdownRecorder>) {
    let server = Arc::new(ShutdownRecorder::default());
    let mut registry = ServerRegistry::new();
    register_windows_shutdown_server(&mut registry, server.clone()).unwrap();
    (registry, server)
}

#[tokio::test]
async fn test_dispatch_routes_by_opnum() {
    let (registry, server) = shutdown_registry();
    let handle = registry.lookup(&WindowsShutdown::SYNTAX_ID).unwrap();
    assert_eq!(handle.name(), "WindowsShutdown");

    for syntax in [NdrSyntax::Ndr20, NdrSyntax::Ndr64] {
        let response: WsdrAbortShutdownResponse =
            call(handle.as_ref(), syntax, 1, &WsdrAbortShutdownRequest::default())
                .await
                .unwrap();
        assert_eq!(response.return_value, win32::ERROR_NO_SHUTDOWN_IN_PROGRESS);
    }

    let request = WsdrInitiateShutdownRequest {
        grace_period: 60,
        ..Default::default()
    };
    let response: WsdrInitiateShutdownResponse =
        call(handle.as_ref(), NdrSyntax::Ndr20, 0, &request)
            .await
            .unwrap();
    assert_eq!(response.return_value, win32::ERROR_SUCCESS);
    assert_eq!(server.calls(), ["abort", "abort", "initiate 60"]);
}

#[tokio::test]
async fn test_unknown_opnum() {
    let (registry, server) = shutdown_registry();
    let handle = registry.lookup(&WindowsShutdown::SYNTAX_ID).unwrap();

    let err = call::<_, WsdrAbortShutdownResponse>(
        handle.as_ref(),
        NdrSyntax::Ndr20,
        2,
        &WsdrAbortShutdownRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DispatchError::UnknownOpnum(2)));
    assert_eq!(err.fault_status(), RpcStatus::NCA_S_OP_RNG_ERROR);
    assert!(err.did_not_execute());
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_stub_skips_handler() {
    let (registry, server) = shutdown_registry();
    let handle = registry.lookup(&WindowsShutdown::SYNTAX_ID).unwrap();
    let ctx = call_context(NdrSyntax::Ndr20);

    // A message pointer, then nothing.
    let stub = [0x00, 0x00, 0x02, 0x00];
    let mut reader = NdrReader::new(&stub, ctx.ndr);
    let err = handle.dispatch(&ctx, 0, &mut reader).await.unwrap_err();
    assert!(matches!(err, DispatchError::Decode(_)));
    assert_eq!(err.fault_status(), RpcStatus::NCA_S_FAULT_NDR);
    assert!(err.did_not_execute());
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_handler_status_is_returned_verbatim() {
    let (registry, server) = shutdown_registry();
    let handle = registry.lookup(&WindowsShutdown::SYNTAX_ID).unwrap();

    let request = WsdrInitiateShutdownRequest {
        grace_period: 0,
        shutdown_flags: ShutdownFlags::new().with_poweroff(true),
        ..Default::default()
    };
    let err = call::<_, WsdrInitiateShutdownResponse>(
        handle.as_ref(),
        NdrSyntax::Ndr64,
        0,
        &request,
    )
    .await
    .unwrap_err();
    assert_eq!(err.fault_status(), RpcStatus::RPC_S_ACCESS_DENIED);
    assert!(!err.did_not_execute());
    assert_eq!(server.calls(), ["initiate 0"]);
}

#[tokio::test]
async fn test_base_interface_opnums_are_delegated() {
    let mut registry = ServerRegistry::new();
    register_i_vds_service_san_server(&mut registry, Arc::new(SanService::new())).unwrap();
    let handle = registry.lookup(&IVdsServiceSan::SYNTAX_ID).unwrap();
    // Only the derived interface is registered.
    assert!(registry.lookup(&IUnknown::SYNTAX_ID).is_none());

    let add_ref: AddRefResponse = call(
        handle.as_ref(),
        NdrSyntax::Ndr20,
        1,
        &AddRefRequest {
            this: OrpcThis::new(),
        },
    )
    .await
    .unwrap();
    assert_eq!(add_ref.return_value, 2);

    let query: QueryInterfaceResponse = call(
        handle.as_ref(),
        NdrSyntax::Ndr64,
        0,
        &QueryInterfaceRequest {
            this: OrpcThis::new(),
            iid: Guid::generate(),
        },
    )
    .await
    .unwrap();
    assert_eq!(query.return_value, hresult::E_NOINTERFACE);
    assert!(query.object.is_none());

    let set: SetSanPolicyResponse = call(
        handle.as_ref(),
        NdrSyntax::Ndr20,
        4,
        &SetSanPolicyRequest {
            this: OrpcThis::new(),
            san_policy: VdsSanPolicy::OfflineShared,
        },
    )
    .await
    .unwrap();
    assert_eq!(set.return_value, hresult::S_OK);

    let get: GetSanPolicyResponse = call(
        handle.as_ref(),
        NdrSyntax::Ndr20,
        3,
        &GetSanPolicyRequest {
            this: OrpcThis::new(),
        },
    )
    .await
    .unwrap();
    assert_eq!(get.san_policy, VdsSanPolicy::OfflineShared);

    let err = call::<_, GetSanPolicyResponse>(
        handle.as_ref(),
        NdrSyntax::Ndr20,
        5,
        &GetSanPolicyRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DispatchError::UnknownOpnum(5)));
}

#[tokio::test]
async fn test_rundown_reaches_server() {
    let (registry, server) = shutdown_registry();
    for handle in registry.handles() {
        handle.rundown(42).await;
    }
    assert_eq!(server.rundowns.load(Ordering::SeqCst), 1);
    assert_eq!(server.calls(), ["rundown 42"]);
}

#[test]
fn test_registry_rejects_duplicates() {
    let (mut registry, _) = shutdown_registry();
    let err = register_windows_shutdown_server(&mut registry, Arc::new(ShutdownRecorder::default()))
        .unwrap_err();
    assert!(matches!(err, RpcError::DuplicateInterface(syntax) if syntax == WindowsShutdown::SYNTAX_ID));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_registry_version_matching() {
    let (registry, _) = shutdown_registry();
    let uuid = WindowsShutdown::SYNTAX_ID.uuid;

    assert!(registry.lookup(&DceRpcSyntaxId::new(uuid, 1, 0)).is_some());
    // Server minor version must cover the requested one.
    assert!(registry.lookup(&DceRpcSyntaxId::new(uuid, 1, 1)).is_none());
    assert!(registry.lookup(&DceRpcSyntaxId::new(uuid, 2, 0)).is_none());
    assert!(registry.lookup(&DceRpcSyntaxId::new(Guid::ZERO, 1, 0)).is_none());
}
