//! [MS-VDS](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-vds>)
//! `IVdsServiceSan`: the SAN policy of a disk service.

use msrpc_ndr::{ndr_enum, ndr_params};

use crate::rpc_interface;

use super::{
    dcom::{OrpcThat, OrpcThis},
    iunknown::*,
};

ndr_enum! {
    /// `VDS_SAN_POLICY`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum VdsSanPolicy {
        #[default]
        Unknown = 0,
        Online = 1,
        OfflineShared = 2,
        Offline = 3,
        OfflineInternal = 4,
        Max = 5,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct GetSanPolicyRequest {
        pub this: OrpcThis,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct GetSanPolicyResponse {
        pub that: OrpcThat,
        pub san_policy: VdsSanPolicy,
        pub return_value: i32,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct SetSanPolicyRequest {
        pub this: OrpcThis,
        pub san_policy: VdsSanPolicy,
    }
}

ndr_params! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct SetSanPolicyResponse {
        pub that: OrpcThat,
        pub return_value: i32,
    }
}

rpc_interface! {
    pub interface IVdsServiceSan {
        uuid: "fc5d23e8-a88b-41a5-8de0-2d2f73c5a630",
        version: (0, 0),
        base: IUnknown(3),
        operations {
            3 => get_san_policy(GetSanPolicyRequest) -> GetSanPolicyResponse;
            4 => set_san_policy(SetSanPolicyRequest) -> SetSanPolicyResponse;
        }
    }
}

#[cfg(test)]
mod tests {
    use msrpc_dtyp::Guid;

    use super::*;
    use crate::interface::dcom::ComVersion;

    msrpc_tests::test_ndr_write! {
        Ndr20 struct SetSanPolicyRequest {
            this: OrpcThis {
                version: ComVersion::DCOM_5_7,
                flags: 0,
                reserved1: 0,
                cid: Guid::ZERO,
                extensions: msrpc_ndr::NdrPtr::null(),
            },
            san_policy: VdsSanPolicy::Offline,
        } => "05000700000000000000000000000000000000000000000000000000000000000300"
    }

    #[test]
    fn test_san_policy_values() {
        assert_eq!(VdsSanPolicy::OfflineShared.value(), 2);
        assert_eq!(VdsSanPolicy::from_value(4), Some(VdsSanPolicy::OfflineInternal));
        assert_eq!(VdsSanPolicy::from_value(9), None);
    }
}
