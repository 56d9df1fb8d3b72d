use std::io::Cursor;

use binrw::{BinRead, BinReaderExt};

use crate::{NdrContext, NdrError, NdrSyntax, Result};

/// A cursor over the stub data of a single call.
///
/// Alignment is relative to the start of the stub.
pub struct NdrReader<'a> {
    cursor: Cursor<&'a [u8]>,
    ctx: NdrContext,
}

impl<'a> NdrReader<'a> {
    pub fn new(data: &'a [u8], ctx: NdrContext) -> Self {
        Self {
            cursor: Cursor::new(data),
            ctx,
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

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(NdrError::UnexpectedEof {
                offset: self.position(),
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Skips padding up to the next multiple of `align`. Padding content is not checked.
    pub fn align(&mut self, align: usize) -> Result<()> {
        let padding = (align - self.position() % align) % align;
        self.ensure(padding)?;
        self.cursor.set_position((self.position() + padding) as u64);
        Ok(())
    }

    /// NDR64 pads structures and unions to their alignment; NDR20 does not.
    pub fn pad_struct(&mut self, align: usize) -> Result<()> {
        match self.ctx.syntax {
            NdrSyntax::Ndr20 => Ok(()),
            NdrSyntax::Ndr64 => self.align(align),
        }
    }

    /// Reads an aligned primitive.
    pub fn read_primitive<T>(&mut self) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let size = std::mem::size_of::<T>();
        self.align(size)?;
        self.ensure(size)?;
        Ok(self.cursor.read_type(self.ctx.endian)?)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_primitive()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_primitive()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_primitive()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_primitive()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    /// Reads a conformance/variance count, or a referent id: 4 bytes in NDR20, 8 in NDR64.
    pub fn read_size(&mut self) -> Result<u64> {
        match self.ctx.syntax {
            NdrSyntax::Ndr20 => Ok(self.read_u32()? as u64),
            NdrSyntax::Ndr64 => self.read_u64(),
        }
    }

    pub fn read_referent(&mut self) -> Result<u64> {
        self.read_size()
    }

    /// Reads an element count, and makes sure that many elements of at least
    /// `min_element_size` bytes could still follow.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let count = self.read_size()?;
        let needed = count.saturating_mul(min_element_size.max(1) as u64);
        if needed > self.remaining() as u64 {
            return Err(NdrError::InvalidCount(format!(
                "{count} elements declared at offset {}, only {} bytes remain",
                self.position(),
                self.remaining()
            )));
        }
        Ok(count as usize)
    }
}
