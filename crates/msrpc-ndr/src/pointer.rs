use std::ops::{Deref, DerefMut};

use crate::{NdrAligned, NdrDecode, NdrEncode, NdrError, NdrReader, NdrSyntax, NdrWriter, Result};

/// A `[unique]` pointer.
///
/// Inline, it is a referent id (zero for null). The pointee is written in the
/// deferred phase, or immediately after the id when the pointer is a top-level parameter.
#[derive(Clone)]
pub struct NdrPtr<T> {
    value: Option<T>,
    // Set between reading a non-null referent and reading the pointee.
    pending: bool,
}

impl<T> NdrPtr<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            pending: false,
        }
    }

    pub fn null() -> Self {
        Self {
            value: None,
            pending: false,
        }
    }

    pub fn into_inner(self) -> Option<T> {
        self.value
    }
}

impl<T> Default for NdrPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: PartialEq> PartialEq for NdrPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for NdrPtr<T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for NdrPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => f.debug_tuple("NdrPtr").field(value).finish(),
            None => write!(f, "NdrPtr(null)"),
        }
    }
}

impl<T> Deref for NdrPtr<T> {
    type Target = Option<T>;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for NdrPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T> From<T> for NdrPtr<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Option<T>> for NdrPtr<T> {
    fn from(value: Option<T>) -> Self {
        Self {
            value,
            pending: false,
        }
    }
}

impl<T> NdrAligned for NdrPtr<T> {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align()
    }
}

impl<T: NdrEncode> NdrEncode for NdrPtr<T> {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        match self.value {
            Some(_) => writer.write_new_referent(),
            None => writer.write_null_referent(),
        }
    }

    fn encode_deferred(&self, writer: &mut NdrWriter) -> Result<()> {
        match &self.value {
            Some(value) => value.encode_ndr(writer),
            None => Ok(()),
        }
    }
}

impl<T: NdrDecode> NdrDecode for NdrPtr<T> {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        let referent = reader.read_referent()?;
        Ok(Self {
            value: None,
            pending: referent != 0,
        })
    }

    fn decode_deferred(&mut self, reader: &mut NdrReader<'_>) -> Result<()> {
        if self.pending {
            self.value = Some(T::decode_ndr(reader)?);
            self.pending = false;
        }
        Ok(())
    }
}

/// An embedded `[ref]` pointer: never null, but still marshalled as a referent id.
///
/// Top-level `[ref]` parameters carry no referent id; declare them as the plain pointee type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefPtr<T>(pub T);

impl<T> Deref for RefPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for RefPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> From<T> for RefPtr<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> NdrAligned for RefPtr<T> {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align()
    }
}

impl<T: NdrEncode> NdrEncode for RefPtr<T> {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        writer.write_new_referent()
    }

    fn encode_deferred(&self, writer: &mut NdrWriter) -> Result<()> {
        self.0.encode_ndr(writer)
    }
}

impl<T: NdrDecode + Default> NdrDecode for RefPtr<T> {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        if reader.read_referent()? == 0 {
            return Err(NdrError::NullRefPointer);
        }
        Ok(Self(T::default()))
    }

    fn decode_deferred(&mut self, reader: &mut NdrReader<'_>) -> Result<()> {
        self.0 = T::decode_ndr(reader)?;
        Ok(())
    }
}
