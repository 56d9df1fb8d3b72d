use std::ops::{Deref, DerefMut};

use crate::{NdrAligned, NdrDecode, NdrEncode, NdrError, NdrReader, NdrSyntax, NdrWriter, Result};

/// A conformant array: the maximum count, followed by the elements.
///
/// Only valid as a pointee or a top-level parameter; embedding one in a structure
/// would require the conformance to be hoisted in front of the structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdrArray<T>(pub Vec<T>);

impl<T> NdrArray<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for NdrArray<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for NdrArray<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> From<Vec<T>> for NdrArray<T> {
    fn from(value: Vec<T>) -> Self {
        Self(value)
    }
}

impl<T> FromIterator<T> for NdrArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: NdrAligned> NdrAligned for NdrArray<T> {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align().max(T::ndr_align(syntax))
    }
}

impl<T: NdrEncode> NdrEncode for NdrArray<T> {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        writer.align(Self::ndr_align(writer.syntax()))?;
        writer.write_size(self.0.len() as u64)?;
        self.0.iter().try_for_each(|item| item.encode_inline(writer))
    }

    fn encode_deferred(&self, writer: &mut NdrWriter) -> Result<()> {
        self.0.iter().try_for_each(|item| item.encode_deferred(writer))
    }
}

impl<T: NdrDecode> NdrDecode for NdrArray<T> {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        reader.align(Self::ndr_align(reader.syntax()))?;
        let count = reader.read_count(1)?;
        (0..count)
            .map(|_| T::decode_inline(reader))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    fn decode_deferred(&mut self, reader: &mut NdrReader<'_>) -> Result<()> {
        self.0
            .iter_mut()
            .try_for_each(|item| item.decode_deferred(reader))
    }
}

/// A conformant varying array: maximum count, offset and actual count, then
/// the transmitted elements. Only offset zero is supported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdrVaryingArray<T> {
    pub max_count: usize,
    pub items: Vec<T>,
}

impl<T> NdrVaryingArray<T> {
    pub fn new(max_count: usize, items: Vec<T>) -> Self {
        Self { max_count, items }
    }
}

impl<T> From<Vec<T>> for NdrVaryingArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            max_count: items.len(),
            items,
        }
    }
}

impl<T: NdrAligned> NdrAligned for NdrVaryingArray<T> {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align().max(T::ndr_align(syntax))
    }
}

impl<T: NdrEncode> NdrEncode for NdrVaryingArray<T> {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        if self.items.len() > self.max_count {
            return Err(NdrError::InvalidCount(format!(
                "{} elements exceed the maximum count {}",
                self.items.len(),
                self.max_count
            )));
        }
        writer.align(Self::ndr_align(writer.syntax()))?;
        writer.write_size(self.max_count as u64)?;
        writer.write_size(0)?;
        writer.write_size(self.items.len() as u64)?;
        self.items
            .iter()
            .try_for_each(|item| item.encode_inline(writer))
    }

    fn encode_deferred(&self, writer: &mut NdrWriter) -> Result<()> {
        self.items
            .iter()
            .try_for_each(|item| item.encode_deferred(writer))
    }
}

impl<T: NdrDecode> NdrDecode for NdrVaryingArray<T> {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        reader.align(Self::ndr_align(reader.syntax()))?;
        let (max_count, actual_count) = read_variance(reader, 1)?;
        let items = (0..actual_count)
            .map(|_| T::decode_inline(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { max_count, items })
    }

    fn decode_deferred(&mut self, reader: &mut NdrReader<'_>) -> Result<()> {
        self.items
            .iter_mut()
            .try_for_each(|item| item.decode_deferred(reader))
    }
}

/// Reads `max_count`, `offset` and `actual_count`, returning `(max_count, actual_count)`.
pub(crate) fn read_variance(
    reader: &mut NdrReader<'_>,
    min_element_size: usize,
) -> Result<(usize, usize)> {
    let max_count = reader.read_size()?;
    let offset = reader.read_size()?;
    if offset != 0 {
        return Err(NdrError::InvalidData(format!(
            "non-zero varying array offset {offset}"
        )));
    }
    let actual_count = reader.read_count(min_element_size)?;
    if actual_count as u64 > max_count {
        return Err(NdrError::InvalidCount(format!(
            "actual count {actual_count} exceeds maximum count {max_count}"
        )));
    }
    Ok((max_count as usize, actual_count))
}
