//! [MS-SRVS](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs>)
//! Server Service Remote Protocol: share enumeration.

use modular_bitfield::prelude::*;
use msrpc_ndr::{NdrArray, NdrPtr, NdrWString, ndr_bitfield, ndr_params, ndr_struct, ndr_union};

use crate::{RpcError, rpc_interface};

use super::BoundRpcConnection;

#[derive(Specifier, Debug, Clone, Copy, PartialEq, Eq)]
#[bits = 2]
pub enum ShareKind {
    Disk = 0,
    PrintQ = 1,
    Device = 2,
    IPC = 3,
}

/// Share types
///
/// [MS-SRVS](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/6069f8c0-c93f-43a0-a5b4-7ed447eb4b84>)
#[ndr_bitfield]
pub struct ShareType {
    pub kind: ShareKind,
    #[skip]
    __: B23,
    pub cluster_fs: bool,
    pub cluster_sofs: bool,
    pub cluster_dfs: bool,
    #[skip]
    __: B2,
    pub temporary: bool,
    pub special: bool,
}

impl ShareType {
    /// Returns whether this is the windows IPC share (IPC$)
    pub fn is_win_ipc(&self) -> bool {
        self.kind() == ShareKind::IPC && self.special()
    }
}

ndr_struct! {
    /// [`SHARE_INFO_0`](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/73a25288-8086-4975-91a3-5cbee5b590cc>)
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct ShareInfo0 {
        pub netname: NdrPtr<NdrWString>,
    }
}

ndr_struct! {
    /// [`SHARE_INFO_1`](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/fc69f110-998d-4c16-9667-514e22fdd80b>)
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct ShareInfo1 {
        pub netname: NdrPtr<NdrWString>,
        pub share_type: ShareType,
        pub remark: NdrPtr<NdrWString>,
    }
}

impl ShareInfo1 {
    pub fn new(netname: &str, share_type: ShareType, remark: &str) -> Self {
        Self {
            netname: NdrPtr::new(netname.into()),
            share_type,
            remark: NdrPtr::new(remark.into()),
        }
    }

    pub fn netname(&self) -> &str {
        self.netname.as_ref().map_or("", |s| s.as_str())
    }

    pub fn remark(&self) -> &str {
        self.remark.as_ref().map_or("", |s| s.as_str())
    }
}

ndr_struct! {
    /// [`SHARE_INFO_0_CONTAINER`](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/544ff4e7-7fcf-4bfe-8d39-50d9d7bf3e51>)
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct ShareInfo0Container {
        pub entries_read: u32,
        pub buffer: NdrPtr<NdrArray<ShareInfo0>>,
    }
}

ndr_struct! {
    /// [`SHARE_INFO_1_CONTAINER`](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/919abd5d-87d9-4ffa-b4b1-632a66053bc6>)
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct ShareInfo1Container {
        pub entries_read: u32,
        pub buffer: NdrPtr<NdrArray<ShareInfo1>>,
    }
}

impl From<Vec<ShareInfo0>> for ShareInfo0Container {
    fn from(shares: Vec<ShareInfo0>) -> Self {
        Self {
            entries_read: shares.len() as u32,
            buffer: NdrPtr::new(shares.into()),
        }
    }
}

impl From<Vec<ShareInfo1>> for ShareInfo1Container {
    fn from(shares: Vec<ShareInfo1>) -> Self {
        Self {
            entries_read: shares.len() as u32,
            buffer: NdrPtr::new(shares.into()),
        }
    }
}

ndr_union! {
    /// [`SHARE_ENUM_UNION`](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/7894d7e4-bb82-419c-b431-0247c8ae4dfe>)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ShareEnumUnion: u32 {
        Info0(NdrPtr<ShareInfo0Container>) = 0,
        Info1(NdrPtr<ShareInfo1Container>) = 1,
    }
}

ndr_struct! {
    /// [SHARE_ENUM_STRUCT](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/79ee052e-e16b-4ec5-b4b7-e99777c26eca>)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ShareEnumStruct {
        pub level: u32,
        pub share_info: ShareEnumUnion,
    }
}

impl From<ShareEnumUnion> for ShareEnumStruct {
    fn from(share_info: ShareEnumUnion) -> Self {
        Self {
            level: share_info.discriminant(),
            share_info,
        }
    }
}

// FYI: RPC top-level stub data is aligned to min(8, arg_size0, arg_size1, ...) bytes.
// DCE/RPC Chap. 12.3: RPC PDU Encodings/Alignment.

ndr_params! {
    /// Input arguments for [NetrShareEnum](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/c4a98e7b-d416-439c-97bd-4d9f52f8ba52>)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct NetrShareEnumRequest {
        pub server_name: NdrPtr<NdrWString>,
        pub info_struct: ShareEnumStruct,
        pub prefered_maximum_length: u32,
        pub resume_handle: NdrPtr<u32>,
    }
}

ndr_params! {
    /// Return value and out params of [NetrShareEnum](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-srvs/c4a98e7b-d416-439c-97bd-4d9f52f8ba52>)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct NetrShareEnumResponse {
        pub info_struct: ShareEnumStruct,
        pub total_entries: u32,
        pub resume_handle: NdrPtr<u32>,
        pub return_value: u32,
    }
}

rpc_interface! {
    /// Share, session and server administration.
    pub interface SrvSvc {
        uuid: "4b324fc8-1670-01d3-1278-5a47bf6ee188",
        version: (3, 0),
        operations {
            15 => netr_share_enum(NetrShareEnumRequest) -> NetrShareEnumResponse;
        }
    }
}

impl<T> SrvSvcClient<T>
where
    T: BoundRpcConnection + Send,
{
    /// Lists the shares of the server, with their type and remark.
    pub async fn list_shares(&mut self, server_name: &str) -> crate::Result<Vec<ShareInfo1>> {
        let request = NetrShareEnumRequest {
            server_name: NdrPtr::new(server_name.into()),
            info_struct: ShareEnumUnion::Info1(NdrPtr::new(ShareInfo1Container::default())).into(),
            prefered_maximum_length: u32::MAX,
            resume_handle: NdrPtr::null(),
        };
        let enum_result = self.netr_share_enum(request).await?;
        if enum_result.return_value != 0 {
            return Err(RpcError::SendReceiveError(format!(
                "NetrShareEnum failed with status {:#x}",
                enum_result.return_value
            )));
        }

        let ShareEnumUnion::Info1(container) = enum_result.info_struct.share_info else {
            return Err(RpcError::InvalidResponseData(
                "NetrShareEnum returned a different info level",
            ));
        };
        let buffer = container
            .into_inner()
            .and_then(|container| container.buffer.into_inner())
            .ok_or(RpcError::InvalidResponseData("NetrShareEnum returned no data"))?;
        Ok(buffer.into_inner())
    }
}
