use std::io::Cursor;

use binrw::{BinWrite, BinWriterExt};

use crate::{NdrContext, NdrError, NdrSyntax, Result};

/// Builds the stub data of a single call.
pub struct NdrWriter {
    cursor: Cursor<Vec<u8>>,
    ctx: NdrContext,
    next_referent: u32,
}

impl NdrWriter {
    /// The first referent id handed out, as the Windows runtime does.
    pub const FIRST_REFERENT: u32 = 0x0002_0000;

    pub fn new(ctx: NdrContext) -> Self {
        Self {
            cursor: Cursor::new(Vec::new()),
            ctx,
            next_referent: Self::FIRST_REFERENT,
        }
    }

    pub fn context(&self) -> NdrContext {
        self.ctx
    }

    pub fn syntax(&self) -> NdrSyntax {
        self.ctx.syntax
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    /// Zero-pads up to the next multiple of `align`.
    pub fn align(&mut self, align: usize) -> Result<()> {
        let padding = (align - self.position() % align) % align;
        self.write_bytes(&[0u8; 8][..padding])
    }

    pub fn pad_struct(&mut self, align: usize) -> Result<()> {
        match self.ctx.syntax {
            NdrSyntax::Ndr20 => Ok(()),
            NdrSyntax::Ndr64 => self.align(align),
        }
    }

    pub fn write_primitive<T>(&mut self, value: T) -> Result<()>
    where
        T: for<'b> BinWrite<Args<'b> = ()>,
    {
        self.align(std::mem::size_of::<T>())?;
        Ok(self.cursor.write_type(&value, self.ctx.endian)?)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_primitive(value)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_primitive(value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_primitive(value)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_primitive(value)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.cursor
            .write_all(data)
            .map_err(|e| NdrError::BinRWError(e.into()))
    }

    pub fn write_size(&mut self, size: u64) -> Result<()> {
        match self.ctx.syntax {
            NdrSyntax::Ndr20 => {
                let size = u32::try_from(size).map_err(|_| {
                    NdrError::InvalidCount(format!("{size} does not fit an NDR20 count"))
                })?;
                self.write_u32(size)
            }
            NdrSyntax::Ndr64 => self.write_u64(size),
        }
    }

    /// Writes a referent id for a non-null pointer.
    ///
    /// NDR20 ids increase by 4 per pointer; NDR64 stubs carry the same id for every pointer.
    pub fn write_new_referent(&mut self) -> Result<()> {
        let referent = self.next_referent;
        if self.ctx.syntax == NdrSyntax::Ndr20 {
            self.next_referent = self.next_referent.wrapping_add(4);
        }
        self.write_size(referent as u64)
    }

    pub fn write_null_referent(&mut self) -> Result<()> {
        self.write_size(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::Endian;

    #[test]
    fn test_write_pads_with_zeros() {
        let mut writer = NdrWriter::new(NdrContext::new(NdrSyntax::Ndr20));
        writer.write_u8(0xaa).unwrap();
        writer.write_u32(0x11223344).unwrap();
        writer.write_u8(0xbb).unwrap();
        writer.write_u16(0x5566).unwrap();
        assert_eq!(
            writer.into_inner(),
            [0xaa, 0, 0, 0, 0x44, 0x33, 0x22, 0x11, 0xbb, 0, 0x66, 0x55]
        );
    }

    #[test]
    fn test_write_big_endian() {
        let ctx = NdrContext::new(NdrSyntax::Ndr64).with_endian(Endian::Big);
        let mut writer = NdrWriter::new(ctx);
        writer.write_size(1).unwrap();
        assert_eq!(writer.into_inner(), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_referents() {
        let mut writer = NdrWriter::new(NdrContext::new(NdrSyntax::Ndr20));
        writer.write_new_referent().unwrap();
        writer.write_null_referent().unwrap();
        writer.write_new_referent().unwrap();
        assert_eq!(
            writer.into_inner(),
            [0, 0, 2, 0, 0, 0, 0, 0, 4, 0, 2, 0]
        );

        let mut writer = NdrWriter::new(NdrContext::new(NdrSyntax::Ndr64));
        writer.write_new_referent().unwrap();
        writer.write_new_referent().unwrap();
        assert_eq!(
            writer.into_inner(),
            [0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_ndr20_size_overflow() {
        let mut writer = NdrWriter::new(NdrContext::new(NdrSyntax::Ndr20));
        assert!(matches!(
            writer.write_size(u64::MAX),
            Err(NdrError::InvalidCount(_))
        ));
    }
}
