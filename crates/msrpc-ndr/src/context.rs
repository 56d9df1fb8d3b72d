use binrw::Endian;

/// The NDR transfer syntax negotiated for a presentation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NdrSyntax {
    Ndr20,
    Ndr64,
}

impl NdrSyntax {
    /// Wire size of referent ids, conformance and variance counts.
    pub const fn size_len(self) -> usize {
        match self {
            NdrSyntax::Ndr20 => 4,
            NdrSyntax::Ndr64 => 8,
        }
    }

    /// Alignment of pointers and counts, which is also the
    /// minimum alignment of conformant data.
    pub const fn size_align(self) -> usize {
        self.size_len()
    }
}

impl std::fmt::Display for NdrSyntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NdrSyntax::Ndr20 => write!(f, "NDR"),
            NdrSyntax::Ndr64 => write!(f, "NDR64"),
        }
    }
}

/// Everything needed to encode or decode a stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrContext {
    pub syntax: NdrSyntax,
    pub endian: Endian,
}

impl NdrContext {
    pub const fn new(syntax: NdrSyntax) -> Self {
        Self {
            syntax,
            endian: Endian::Little,
        }
    }

    pub const fn with_endian(self, endian: Endian) -> Self {
        Self { endian, ..self }
    }

    /// Builds a context from a PDU's packed data representation label.
    ///
    /// Only the integer representation (high nibble of the first byte) matters here:
    /// 1 is little endian, 0 is big endian.
    pub const fn from_drep(syntax: NdrSyntax, packed_drep: u32) -> Self {
        let endian = if packed_drep & 0x10 != 0 {
            Endian::Little
        } else {
            Endian::Big
        };
        Self { syntax, endian }
    }
}
