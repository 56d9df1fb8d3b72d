use crate::{NdrContext, NdrReader, NdrSyntax, NdrWriter, Result};

/// The wire alignment of a type.
pub trait NdrAligned {
    fn ndr_align(syntax: NdrSyntax) -> usize
    where
        Self: Sized;
}

/// Marshals a value.
///
/// A value is written in two phases: the inline (flat) part, and the deferred part
/// holding the pointees of embedded pointers. Implementations of `encode_inline`
/// align themselves.
pub trait NdrEncode: NdrAligned {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()>;

    fn encode_deferred(&self, _writer: &mut NdrWriter) -> Result<()> {
        Ok(())
    }

    /// Writes the value and everything it points to.
    fn encode_ndr(&self, writer: &mut NdrWriter) -> Result<()> {
        self.encode_inline(writer)?;
        self.encode_deferred(writer)
    }
}

/// Unmarshals a value; the mirror of [`NdrEncode`].
pub trait NdrDecode: NdrAligned + Sized {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self>;

    fn decode_deferred(&mut self, _reader: &mut NdrReader<'_>) -> Result<()> {
        Ok(())
    }

    fn decode_ndr(reader: &mut NdrReader<'_>) -> Result<Self> {
        let mut value = Self::decode_inline(reader)?;
        value.decode_deferred(reader)?;
        Ok(value)
    }
}

/// Encodes a whole stub (usually an [`ndr_params!`](crate::ndr_params) block).
pub fn encode_stub<T: NdrEncode + ?Sized>(ctx: NdrContext, value: &T) -> Result<Vec<u8>> {
    let mut writer = NdrWriter::new(ctx);
    value.encode_ndr(&mut writer)?;
    Ok(writer.into_inner())
}

/// Decodes a whole stub. Trailing bytes are ignored.
pub fn decode_stub<T: NdrDecode>(ctx: NdrContext, data: &[u8]) -> Result<T> {
    let mut reader = NdrReader::new(data, ctx);
    T::decode_ndr(&mut reader)
}
