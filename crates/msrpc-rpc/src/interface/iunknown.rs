//! `IUnknown`, the base of every DCOM interface.

use msrpc_dtyp::Guid;
use msrpc_ndr::{NdrPtr, ndr_params};

use crate::rpc_interface;

use super::dcom::{MInterfacePointer, OrpcThat, OrpcThis};

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct QueryInterfaceRequest {
        pub this: OrpcThis,
        pub iid: Guid,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct QueryInterfaceResponse {
        pub that: OrpcThat,
        pub object: NdrPtr<MInterfacePointer>,
        pub return_value: i32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct AddRefRequest {
        pub this: OrpcThis,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct AddRefResponse {
        pub that: OrpcThat,
        pub return_value: u32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct ReleaseRequest {
        pub this: OrpcThis,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct ReleaseResponse {
        pub that: OrpcThat,
        pub return_value: u32,
    }
}

rpc_interface! {
    /// Reference counting and interface discovery.
    pub interface IUnknown {
        uuid: "00000000-0000-0000-c000-000000000046",
        version: (0, 0),
        operations {
            0 => query_interface(QueryInterfaceRequest) -> QueryInterfaceResponse;
            1 => add_ref(AddRefRequest) -> AddRefResponse;
            2 => release(ReleaseRequest) -> ReleaseResponse;
        }
    }
}

