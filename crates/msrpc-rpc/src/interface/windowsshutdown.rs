//! [MS-RSP](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-rsp>)
//! WindowsShutdown interface.

use modular_bitfield::prelude::*;
use msrpc_ndr::{NdrPtr, RpcUnicodeString, ndr_bitfield, ndr_params};

use crate::rpc_interface;

/// `dwShutdownFlags`
#[ndr_bitfield]
pub struct ShutdownFlags {
    /// Log off interactive users other than the caller.
    pub force_others: bool,
    pub force_self: bool,
    pub restart: bool,
    pub poweroff: bool,
    pub noreboot: bool,
    pub grace_override: bool,
    pub install_updates: bool,
    pub restart_apps: bool,
    pub skip_svc_preshutdown: bool,
    pub hybrid: bool,
    #[skip]
    __: B22,
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct WsdrInitiateShutdownRequest {
        pub message: NdrPtr<RpcUnicodeString>,
        pub grace_period: u32,
        pub shutdown_flags: ShutdownFlags,
        pub reason: u32,
        pub client_hint: NdrPtr<RpcUnicodeString>,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct WsdrInitiateShutdownResponse {
        pub return_value: u32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct WsdrAbortShutdownRequest {
        pub client_hint: NdrPtr<RpcUnicodeString>,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct WsdrAbortShutdownResponse {
        pub return_value: u32,
    }
}

rpc_interface! {
    /// Remote shutdown of a machine.
    pub interface WindowsShutdown {
        uuid: "d95afe70-a6d5-4259-822e-2c84da1ddb0d",
        version: (1, 0),
        operations {
            0 => wsdr_initiate_shutdown(WsdrInitiateShutdownRequest) -> WsdrInitiateShutdownResponse;
            1 => wsdr_abort_shutdown(WsdrAbortShutdownRequest) -> WsdrAbortShutdownResponse;
        }
    }
}
