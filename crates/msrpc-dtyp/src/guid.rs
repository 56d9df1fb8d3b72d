use std::{fmt, str::FromStr};

use binrw::prelude::*;

/// A GUID (UUID), in its Windows memory layout.
///
/// `data1`..`data3` follow the stream endianness; `data4` is a plain byte array.
#[binrw::binrw]
#[derive(PartialEq, Eq, Clone, Copy, Hash, Default, PartialOrd, Ord)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Invalid GUID string: {0:?}")]
pub struct GuidParseError(pub String);

impl Guid {
    pub const ZERO: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    pub const SIZE: usize = 16;

    /// Generates a new random (version 4) GUID.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        let mut guid = Self::from_le_bytes(&bytes);
        guid.data3 = (guid.data3 & 0x0fff) | 0x4000;
        guid.data4[0] = (guid.data4[0] & 0x3f) | 0x80;
        guid
    }

    pub fn from_le_bytes(bytes: &[u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }

    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..].copy_from_slice(&self.data4);
        bytes
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Parses the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    ///
    /// Usable in const context; see [`make_guid!`](crate::make_guid).
    pub const fn try_parse(s: &str) -> Option<Guid> {
        let b = s.as_bytes();
        if b.len() != 36 || b[8] != b'-' || b[13] != b'-' || b[18] != b'-' || b[23] != b'-' {
            return None;
        }

        let data1 = match hex_value(b, 0, 8) {
            Some(v) => v as u32,
            None => return None,
        };
        let data2 = match hex_value(b, 9, 4) {
            Some(v) => v as u16,
            None => return None,
        };
        let data3 = match hex_value(b, 14, 4) {
            Some(v) => v as u16,
            None => return None,
        };

        let mut data4 = [0u8; 8];
        let mut i = 0;
        while i < 8 {
            // Two bytes before the last dash, six after it.
            let start = if i < 2 { 19 + i * 2 } else { 24 + (i - 2) * 2 };
            data4[i] = match hex_value(b, start, 2) {
                Some(v) => v as u8,
                None => return None,
            };
            i += 1;
        }

        Some(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }

    /// Like [`Guid::try_parse`], but panics on malformed input.
    pub const fn parse_const(s: &str) -> Guid {
        match Self::try_parse(s) {
            Some(guid) => guid,
            None => panic!("Invalid GUID literal"),
        }
    }
}

const fn hex_value(b: &[u8], start: usize, len: usize) -> Option<u64> {
    let mut value = 0u64;
    let mut i = 0;
    while i < len {
        let digit = match b[start + i] {
            c @ b'0'..=b'9' => c - b'0',
            c @ b'a'..=b'f' => c - b'a' + 10,
            c @ b'A'..=b'F' => c - b'A' + 10,
            _ => return None,
        };
        value = (value << 4) | digit as u64;
        i += 1;
    }
    Some(value)
}

/// Builds a [`Guid`] from its string form at compile time.
#[macro_export]
macro_rules! make_guid {
    ($s:expr) => {
        const { $crate::guid::Guid::parse_const($s) }
    };
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(s);
        Self::try_parse(trimmed).ok_or_else(|| GuidParseError(s.to_string()))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for b in &self.data4[2..] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRVSVC: Guid = make_guid!("4b324fc8-1670-01d3-1278-5a47bf6ee188");

    #[test]
    fn test_guid_parse_and_display() {
        assert_eq!(SRVSVC.data1, 0x4b324fc8);
        assert_eq!(SRVSVC.data2, 0x1670);
        assert_eq!(SRVSVC.data3, 0x01d3);
        assert_eq!(SRVSVC.data4, [0x12, 0x78, 0x5a, 0x47, 0xbf, 0x6e, 0xe1, 0x88]);
        assert_eq!(SRVSVC.to_string(), "4b324fc8-1670-01d3-1278-5a47bf6ee188");
        assert_eq!(
            "{4B324FC8-1670-01D3-1278-5A47BF6EE188}".parse::<Guid>(),
            Ok(SRVSVC)
        );
    }

    #[test]
    fn test_guid_parse_rejects_garbage() {
        assert!("4b324fc8-1670-01d3-1278".parse::<Guid>().is_err());
        assert!("4b324fc8x1670-01d3-1278-5a47bf6ee188".parse::<Guid>().is_err());
        assert!("4b324fc8-1670-01d3-1278-5a47bf6ee18g".parse::<Guid>().is_err());
    }

    #[test]
    fn test_guid_le_layout() {
        let bytes = SRVSVC.to_le_bytes();
        assert_eq!(
            bytes,
            [
                0xc8, 0x4f, 0x32, 0x4b, 0x70, 0x16, 0xd3, 0x01, 0x12, 0x78, 0x5a, 0x47, 0xbf,
                0x6e, 0xe1, 0x88
            ]
        );
        assert_eq!(Guid::from_le_bytes(&bytes), SRVSVC);

        let mut cursor = std::io::Cursor::new(Vec::new());
        SRVSVC.write_le(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner(), bytes);
    }

    #[test]
    fn test_guid_generate_is_v4() {
        let a = Guid::generate();
        let b = Guid::generate();
        assert_ne!(a, b);
        assert_eq!(a.data3 >> 12, 4);
        assert_eq!(a.data4[0] & 0xc0, 0x80);
        assert!(!a.is_zero());
    }
}
