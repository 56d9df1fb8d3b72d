//! DCOM remote activation structures shared by ORPC interfaces.
//!
//! [MS-DCOM](<https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dcom>)

use msrpc_dtyp::Guid;
use msrpc_ndr::{
    NdrAligned, NdrArray, NdrDecode, NdrEncode, NdrError, NdrPtr, NdrReader, NdrSyntax, NdrWriter,
    ndr_struct,
};

ndr_struct! {
    /// `COMVERSION`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ComVersion {
        pub major: u16,
        pub minor: u16,
    }
}

impl ComVersion {
    pub const DCOM_5_7: ComVersion = ComVersion { major: 5, minor: 7 };
}

/// `ORPC_EXTENT`: an extension blob, padded to 8 bytes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrpcExtent {
    pub id: Guid,
    pub size: u32,
    pub data: Vec<u8>,
}

impl OrpcExtent {
    pub fn new(id: Guid, mut data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        data.resize(Self::padded_len(size), 0);
        Self { id, size, data }
    }

    fn padded_len(size: u32) -> usize {
        ((size as usize) + 7) & !7
    }
}

impl NdrAligned for OrpcExtent {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align().max(4)
    }
}

impl NdrEncode for OrpcExtent {
    fn encode_inline(&self, writer: &mut NdrWriter) -> msrpc_ndr::Result<()> {
        let align = Self::ndr_align(writer.syntax());
        if self.data.len() != Self::padded_len(self.size) {
            return Err(NdrError::InvalidCount(format!(
                "extent of size {} carries {} bytes",
                self.size,
                self.data.len()
            )));
        }
        writer.align(align)?;
        writer.write_size(self.data.len() as u64)?;
        self.id.encode_inline(writer)?;
        writer.write_u32(self.size)?;
        writer.write_bytes(&self.data)?;
        writer.pad_struct(align)
    }
}

impl NdrDecode for OrpcExtent {
    fn decode_inline(reader: &mut NdrReader<'_>) -> msrpc_ndr::Result<Self> {
        let align = Self::ndr_align(reader.syntax());
        reader.align(align)?;
        let count = reader.read_count(1)?;
        let id = Guid::decode_inline(reader)?;
        let size = reader.read_u32()?;
        if count != Self::padded_len(size) {
            return Err(NdrError::InvalidCount(format!(
                "extent of size {size} declares {count} bytes"
            )));
        }
        let data = reader.read_bytes(count)?.to_vec();
        reader.pad_struct(align)?;
        Ok(Self { id, size, data })
    }
}

ndr_struct! {
    /// `ORPC_EXTENT_ARRAY`
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct OrpcExtentArray {
        pub size: u32,
        pub reserved: u32,
        pub extent: NdrPtr<NdrArray<NdrPtr<OrpcExtent>>>,
    }
}

ndr_struct! {
    /// `ORPCTHIS`: the implicit first argument of every ORPC request.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct OrpcThis {
        pub version: ComVersion,
        pub flags: u32,
        pub reserved1: u32,
        pub cid: Guid,
        pub extensions: NdrPtr<OrpcExtentArray>,
    }
}

impl OrpcThis {
    /// A fresh call with a new causality id.
    pub fn new() -> Self {
        Self {
            version: ComVersion::DCOM_5_7,
            flags: 0,
            reserved1: 0,
            cid: Guid::generate(),
            extensions: NdrPtr::null(),
        }
    }
}

ndr_struct! {
    /// `ORPCTHAT`: the implicit first result of every ORPC response.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct OrpcThat {
        pub flags: u32,
        pub extensions: NdrPtr<OrpcExtentArray>,
    }
}

/// `MInterfacePointer`: a marshaled `OBJREF`, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MInterfacePointer {
    pub data: Vec<u8>,
}

impl NdrAligned for MInterfacePointer {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align().max(4)
    }
}

impl NdrEncode for MInterfacePointer {
    fn encode_inline(&self, writer: &mut NdrWriter) -> msrpc_ndr::Result<()> {
        let align = Self::ndr_align(writer.syntax());
        let len = u32::try_from(self.data.len())
            .map_err(|_| NdrError::InvalidCount(format!("{} bytes", self.data.len())))?;
        writer.align(align)?;
        writer.write_size(len as u64)?;
        writer.write_u32(len)?;
        writer.write_bytes(&self.data)?;
        writer.pad_struct(align)
    }
}

impl NdrDecode for MInterfacePointer {
    fn decode_inline(reader: &mut NdrReader<'_>) -> msrpc_ndr::Result<Self> {
        let align = Self::ndr_align(reader.syntax());
        reader.align(align)?;
        let count = reader.read_count(1)?;
        let cnt_data = reader.read_u32()? as usize;
        if cnt_data != count {
            return Err(NdrError::InvalidCount(format!(
                "ulCntData {cnt_data} does not match conformance {count}"
            )));
        }
        let data = reader.read_bytes(count)?.to_vec();
        reader.pad_struct(align)?;
        Ok(Self { data })
    }
}
