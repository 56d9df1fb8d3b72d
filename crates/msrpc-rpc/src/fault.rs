//! Status codes carried by `fault` PDUs (C706 appendix E, MS-RPCE 3.1.1.5.5).

use std::fmt;

/// The status of a failed call.
///
/// Handlers return it to make the runtime answer with a fault PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RpcStatus(pub u32);

impl RpcStatus {
    /// The opnum is out of range for the interface.
    pub const NCA_S_OP_RNG_ERROR: Self = Self(0x1c01_0002);
    /// The presentation context does not identify a bound interface.
    pub const NCA_S_UNK_IF: Self = Self(0x1c01_0003);
    pub const NCA_S_PROTO_ERROR: Self = Self(0x1c01_000b);
    pub const NCA_S_FAULT_CANCEL: Self = Self(0x1c00_000d);
    pub const NCA_S_FAULT_CONTEXT_MISMATCH: Self = Self(0x1c00_001a);
    pub const NCA_S_FAULT_REMOTE_NO_MEMORY: Self = Self(0x1c00_0022);
    /// The stub data could not be unmarshalled.
    pub const NCA_S_FAULT_NDR: Self = Self(0x0000_06f7);
    pub const RPC_X_BAD_STUB_DATA: Self = Self::NCA_S_FAULT_NDR;
    pub const RPC_S_CALL_FAILED: Self = Self(0x0000_06be);
    pub const RPC_S_ACCESS_DENIED: Self = Self(0x0000_0005);

    pub fn name(&self) -> Option<&'static str> {
        Some(match *self {
            Self::NCA_S_OP_RNG_ERROR => "nca_s_op_rng_error",
            Self::NCA_S_UNK_IF => "nca_s_unk_if",
            Self::NCA_S_PROTO_ERROR => "nca_s_proto_error",
            Self::NCA_S_FAULT_CANCEL => "nca_s_fault_cancel",
            Self::NCA_S_FAULT_CONTEXT_MISMATCH => "nca_s_fault_context_mismatch",
            Self::NCA_S_FAULT_REMOTE_NO_MEMORY => "nca_s_fault_remote_no_memory",
            Self::NCA_S_FAULT_NDR => "nca_s_fault_ndr",
            Self::RPC_S_CALL_FAILED => "rpc_s_call_failed",
            Self::RPC_S_ACCESS_DENIED => "rpc_s_access_denied",
            _ => return None,
        })
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#010x})", self.0),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

impl std::error::Error for RpcStatus {}

impl From<u32> for RpcStatus {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
