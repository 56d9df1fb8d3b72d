use msrpc_dtyp::Guid;

use crate::{NdrAligned, NdrDecode, NdrEncode, NdrError, NdrReader, NdrSyntax, NdrWriter, Result};

macro_rules! ndr_primitives {
    ($($ty:ty),+) => {
        $(
            impl NdrAligned for $ty {
                fn ndr_align(_syntax: NdrSyntax) -> usize {
                    std::mem::size_of::<$ty>()
                }
            }

            impl NdrEncode for $ty {
                fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
                    writer.write_primitive(*self)
                }
            }

            impl NdrDecode for $ty {
                fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
                    reader.read_primitive()
                }
            }
        )+
    };
}

ndr_primitives!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl NdrAligned for bool {
    fn ndr_align(_syntax: NdrSyntax) -> usize {
        1
    }
}

impl NdrEncode for bool {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        writer.write_u8(*self as u8)
    }
}

impl NdrDecode for bool {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        Ok(reader.read_u8()? != 0)
    }
}

impl<T: NdrAligned, const N: usize> NdrAligned for [T; N] {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        T::ndr_align(syntax)
    }
}

impl<T: NdrEncode, const N: usize> NdrEncode for [T; N] {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        self.iter().try_for_each(|item| item.encode_inline(writer))
    }

    fn encode_deferred(&self, writer: &mut NdrWriter) -> Result<()> {
        self.iter().try_for_each(|item| item.encode_deferred(writer))
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for [T; N] {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        let items = (0..N)
            .map(|_| T::decode_inline(reader))
            .collect::<Result<Vec<_>>>()?;
        items
            .try_into()
            .map_err(|_| NdrError::InvalidData(format!("expected {N} array elements")))
    }

    fn decode_deferred(&mut self, reader: &mut NdrReader<'_>) -> Result<()> {
        self.iter_mut()
            .try_for_each(|item| item.decode_deferred(reader))
    }
}

impl NdrAligned for Guid {
    fn ndr_align(_syntax: NdrSyntax) -> usize {
        4
    }
}

impl NdrEncode for Guid {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        writer.write_u32(self.data1)?;
        writer.write_u16(self.data2)?;
        writer.write_u16(self.data3)?;
        writer.write_bytes(&self.data4)
    }
}

impl NdrDecode for Guid {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        let data1 = reader.read_u32()?;
        let data2 = reader.read_u16()?;
        let data3 = reader.read_u16()?;
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(reader.read_bytes(8)?);
        Ok(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }
}
