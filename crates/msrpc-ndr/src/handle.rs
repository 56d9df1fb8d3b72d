use msrpc_dtyp::Guid;

use crate::ndr_struct;

ndr_struct! {
    /// An RPC context handle, as it appears on the wire (20 bytes).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextHandle {
        pub attributes: u32,
        pub uuid: Guid,
    }
}

impl ContextHandle {
    pub const NULL: ContextHandle = ContextHandle {
        attributes: 0,
        uuid: Guid::ZERO,
    };

    pub fn generate() -> Self {
        Self {
            attributes: 0,
            uuid: Guid::generate(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.attributes == 0 && self.uuid.is_zero()
    }
}
