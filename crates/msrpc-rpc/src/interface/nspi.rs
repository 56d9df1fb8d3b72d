//! [MS-NSPI](<https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-nspi>)
//! Name Service Provider Interface: session setup and teardown.

use msrpc_ndr::{ContextHandle, NdrPtr, ndr_params, ndr_struct};

use crate::rpc_interface;

/// Status codes returned by NSPI methods.
pub mod ec {
    pub const SUCCESS: u32 = 0x0000_0000;
    pub const UNBIND_SUCCESS: u32 = 0x0000_0001;
    pub const UNBIND_FAILURE: u32 = 0x0000_0002;
    pub const GENERAL_FAILURE: u32 = 0x8000_4005;
    pub const INVALID_PARAMETER: u32 = 0x8007_0057;
    pub const LOGON_FAILED: u32 = 0x8004_0111;
    pub const NOT_FOUND: u32 = 0x8004_010f;
    pub const OUT_OF_MEMORY: u32 = 0x8007_000e;
}

/// `dwFlags` of NspiBind: the client requests an anonymous session.
pub const FLAG_ANONYMOUS_LOGIN: u32 = 0x0000_0020;

ndr_struct! {
    /// `STAT`:
    /// the position of a client in an address book container.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Stat {
        pub sort_type: u32,
        pub container_id: u32,
        pub current_rec: u32,
        pub delta: i32,
        pub num_pos: u32,
        pub total_recs: u32,
        pub code_page: u32,
        pub template_locale: u32,
        pub sort_locale: u32,
    }
}

ndr_struct! {
    /// FlatUID_r
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlatUid {
        pub ab: [u8; 16],
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct NspiBindRequest {
        pub flags: u32,
        pub stat: Stat,
        pub server_guid: NdrPtr<FlatUid>,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct NspiBindResponse {
        pub server_guid: NdrPtr<FlatUid>,
        pub context_handle: ContextHandle,
        pub return_value: u32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct NspiUnbindRequest {
        pub context_handle: ContextHandle,
        pub reserved: u32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct NspiUnbindResponse {
        pub context_handle: ContextHandle,
        pub return_value: u32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct NspiUpdateStatRequest {
        pub context_handle: ContextHandle,
        pub reserved: u32,
        pub stat: Stat,
        pub delta: NdrPtr<i32>,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct NspiUpdateStatResponse {
        pub stat: Stat,
        pub delta: NdrPtr<i32>,
        pub return_value: u32,
    }
}

rpc_interface! {
    /// Address book sessions of an Exchange server.
    pub interface Nspi {
        uuid: "f5cc5a18-4264-101a-8c59-08002b2f8426",
        version: (56, 0),
        operations {
            0 => nspi_bind(NspiBindRequest) -> NspiBindResponse;
            1 => nspi_unbind(NspiUnbindRequest) -> NspiUnbindResponse;
            2 => nspi_update_stat(NspiUpdateStatRequest) -> NspiUpdateStatResponse;
        }
    }
}
