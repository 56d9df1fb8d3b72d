use std::{convert::Infallible, fmt, marker::PhantomData, ops::Deref, str::FromStr};

use crate::{
    NdrAligned, NdrDecode, NdrEncode, NdrError, NdrPtr, NdrReader, NdrSyntax, NdrVaryingArray,
    NdrWriter, Result, array::read_variance, ndr_struct,
};

/// A character unit of an NDR string.
pub trait NdrChar: NdrEncode + NdrDecode + Copy + Default + PartialEq {
    fn encode_str(value: &str) -> Vec<Self>;
    fn decode_str(chars: &[Self]) -> Result<String>;
}

impl NdrChar for u16 {
    fn encode_str(value: &str) -> Vec<Self> {
        value.encode_utf16().collect()
    }

    fn decode_str(chars: &[Self]) -> Result<String> {
        String::from_utf16(chars).map_err(|_| NdrError::InvalidString("invalid UTF-16"))
    }
}

impl NdrChar for u8 {
    fn encode_str(value: &str) -> Vec<Self> {
        value.bytes().collect()
    }

    fn decode_str(chars: &[Self]) -> Result<String> {
        String::from_utf8(chars.to_vec()).map_err(|_| NdrError::InvalidString("invalid UTF-8"))
    }
}

/// A `[string]` conformant varying array, null terminated on the wire.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct NdrString<C> {
    value: String,
    _char: PhantomData<C>,
}

/// `[string] wchar_t*`
pub type NdrWString = NdrString<u16>;
/// `[string] char*`
pub type NdrAnsiString = NdrString<u8>;

impl<C> NdrString<C> {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<C> Deref for NdrString<C> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<C> From<&str> for NdrString<C> {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl<C> From<String> for NdrString<C> {
    fn from(value: String) -> Self {
        Self {
            value,
            _char: PhantomData,
        }
    }
}

impl<C> FromStr for NdrString<C> {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl<C> fmt::Display for NdrString<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<C> fmt::Debug for NdrString<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

impl<C: NdrChar> NdrAligned for NdrString<C> {
    fn ndr_align(syntax: NdrSyntax) -> usize {
        syntax.size_align().max(C::ndr_align(syntax))
    }
}

impl<C: NdrChar> NdrEncode for NdrString<C> {
    fn encode_inline(&self, writer: &mut NdrWriter) -> Result<()> {
        let mut chars = C::encode_str(&self.value);
        chars.push(C::default());

        writer.align(Self::ndr_align(writer.syntax()))?;
        writer.write_size(chars.len() as u64)?;
        writer.write_size(0)?;
        writer.write_size(chars.len() as u64)?;
        chars.iter().try_for_each(|c| c.encode_inline(writer))
    }
}

impl<C: NdrChar> NdrDecode for NdrString<C> {
    fn decode_inline(reader: &mut NdrReader<'_>) -> Result<Self> {
        reader.align(Self::ndr_align(reader.syntax()))?;
        let (_, actual_count) = read_variance(reader, std::mem::size_of::<C>())?;
        let chars = (0..actual_count)
            .map(|_| C::decode_inline(reader))
            .collect::<Result<Vec<_>>>()?;

        let value = match chars.split_last() {
            None => String::new(),
            Some((last, rest)) if *last == C::default() => C::decode_str(rest)?,
            Some(_) => return Err(NdrError::InvalidString("missing null terminator")),
        };
        Ok(value.into())
    }
}

ndr_struct! {
    /// MS-DTYP RPC_UNICODE_STRING: byte lengths, and a unique pointer to
    /// an unterminated UTF-16 buffer.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct RpcUnicodeString {
        pub length: u16,
        pub maximum_length: u16,
        pub buffer: NdrPtr<NdrVaryingArray<u16>>,
    }
}

impl RpcUnicodeString {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.buffer.is_none()
    }

    /// The string value, replacing invalid UTF-16 sequences.
    pub fn to_string_lossy(&self) -> String {
        match self.buffer.as_ref() {
            Some(buffer) => String::from_utf16_lossy(&buffer.items),
            None => String::new(),
        }
    }
}

/// Fails when the string does not fit the 16-bit byte length.
impl TryFrom<&str> for RpcUnicodeString {
    type Error = NdrError;

    fn try_from(value: &str) -> Result<Self> {
        let items: Vec<u16> = value.encode_utf16().collect();
        let length = u16::try_from(items.len() * 2).map_err(|_| {
            NdrError::InvalidCount(format!(
                "{} UTF-16 units do not fit a RPC_UNICODE_STRING",
                items.len()
            ))
        })?;
        Ok(Self {
            length,
            maximum_length: length,
            buffer: NdrPtr::new(items.into()),
        })
    }
}
