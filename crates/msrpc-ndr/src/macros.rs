/// Declares a structure encoded field by field.
///
/// The structure aligns to its most-aligned field. In NDR64 it is also padded to that
/// alignment at its end. Pointees of embedded pointers follow the whole structure,
/// in field order.
#[macro_export]
macro_rules! ndr_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::NdrAligned for $name {
            #[allow(unused_mut)]
            fn ndr_align(syntax: $crate::NdrSyntax) -> usize {
                let mut align = 1;
                $(
                    align = align.max(<$ty as $crate::NdrAligned>::ndr_align(syntax));
                )*
                align
            }
        }

        impl $crate::NdrEncode for $name {
            fn encode_inline(&self, writer: &mut $crate::NdrWriter) -> $crate::Result<()> {
                let __align = <Self as $crate::NdrAligned>::ndr_align(writer.syntax());
                writer.align(__align)?;
                $(
                    $crate::NdrEncode::encode_inline(&self.$field, writer)?;
                )*
                writer.pad_struct(__align)
            }

            #[allow(unused_variables)]
            fn encode_deferred(&self, writer: &mut $crate::NdrWriter) -> $crate::Result<()> {
                $(
                    $crate::NdrEncode::encode_deferred(&self.$field, writer)?;
                )*
                Ok(())
            }
        }

        impl $crate::NdrDecode for $name {
            fn decode_inline(reader: &mut $crate::NdrReader<'_>) -> $crate::Result<Self> {
                let __align = <Self as $crate::NdrAligned>::ndr_align(reader.syntax());
                reader.align(__align)?;
                $(
                    let $field = <$ty as $crate::NdrDecode>::decode_inline(reader)?;
                )*
                reader.pad_struct(__align)?;
                Ok(Self { $($field),* })
            }

            #[allow(unused_variables)]
            fn decode_deferred(&mut self, reader: &mut $crate::NdrReader<'_>) -> $crate::Result<()> {
                $(
                    $crate::NdrDecode::decode_deferred(&mut self.$field, reader)?;
                )*
                Ok(())
            }
        }
    };
}

/// Declares the parameter block of one direction of an operation.
///
/// Each field is a separate top-level parameter: it is aligned, written, and
/// followed by its pointees before the next parameter starts. Declare a
/// top-level `[ref]` parameter as its pointee type.
#[macro_export]
macro_rules! ndr_params {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::NdrAligned for $name {
            fn ndr_align(_syntax: $crate::NdrSyntax) -> usize {
                1
            }
        }

        impl $crate::NdrEncode for $name {
            #[allow(unused_variables)]
            fn encode_inline(&self, writer: &mut $crate::NdrWriter) -> $crate::Result<()> {
                $(
                    $crate::NdrEncode::encode_ndr(&self.$field, writer)?;
                )*
                Ok(())
            }
        }

        impl $crate::NdrDecode for $name {
            #[allow(unused_variables)]
            fn decode_inline(reader: &mut $crate::NdrReader<'_>) -> $crate::Result<Self> {
                $(
                    let $field = <$ty as $crate::NdrDecode>::decode_ndr(reader)?;
                )*
                Ok(Self { $($field),* })
            }
        }
    };
}

/// Declares a non-encapsulated union, selected by a `u16` or `u32` discriminant.
///
/// ```ignore
/// ndr_union! {
///     pub enum Info: u32 {
///         Level0(NdrPtr<Info0>) = 0,
///         Level1(NdrPtr<Info1>) = 1,
///     }
/// }
/// ```
#[macro_export]
macro_rules! ndr_union {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $disc:ty {
            $(
                $(#[$vmeta:meta])*
                $variant:ident($ty:ty) = $value:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant($ty),
            )+
        }

        impl $name {
            pub fn discriminant(&self) -> $disc {
                match self {
                    $(
                        Self::$variant(_) => $value,
                    )+
                }
            }

            fn arms_align(syntax: $crate::NdrSyntax) -> usize {
                let mut align = 1;
                $(
                    align = align.max(<$ty as $crate::NdrAligned>::ndr_align(syntax));
                )+
                align
            }
        }

        impl $crate::NdrAligned for $name {
            fn ndr_align(syntax: $crate::NdrSyntax) -> usize {
                <$disc as $crate::NdrAligned>::ndr_align(syntax).max(Self::arms_align(syntax))
            }
        }

        impl $crate::NdrEncode for $name {
            fn encode_inline(&self, writer: &mut $crate::NdrWriter) -> $crate::Result<()> {
                let syntax = writer.syntax();
                let align = <Self as $crate::NdrAligned>::ndr_align(syntax);
                writer.align(align)?;
                $crate::NdrEncode::encode_inline(&self.discriminant(), writer)?;
                if syntax == $crate::NdrSyntax::Ndr64 {
                    writer.align(Self::arms_align(syntax))?;
                }
                match self {
                    $(
                        Self::$variant(value) => $crate::NdrEncode::encode_inline(value, writer)?,
                    )+
                }
                writer.pad_struct(align)
            }

            fn encode_deferred(&self, writer: &mut $crate::NdrWriter) -> $crate::Result<()> {
                match self {
                    $(
                        Self::$variant(value) => $crate::NdrEncode::encode_deferred(value, writer),
                    )+
                }
            }
        }

        impl $crate::NdrDecode for $name {
            fn decode_inline(reader: &mut $crate::NdrReader<'_>) -> $crate::Result<Self> {
                let syntax = reader.syntax();
                let align = <Self as $crate::NdrAligned>::ndr_align(syntax);
                reader.align(align)?;
                let discriminant = <$disc as $crate::NdrDecode>::decode_inline(reader)?;
                if syntax == $crate::NdrSyntax::Ndr64 {
                    reader.align(Self::arms_align(syntax))?;
                }
                let value = match discriminant {
                    $(
                        $value => Self::$variant(<$ty as $crate::NdrDecode>::decode_inline(reader)?),
                    )+
                    other => return Err($crate::NdrError::InvalidDiscriminant(other as u64)),
                };
                reader.pad_struct(align)?;
                Ok(value)
            }

            fn decode_deferred(&mut self, reader: &mut $crate::NdrReader<'_>) -> $crate::Result<()> {
                match self {
                    $(
                        Self::$variant(value) => $crate::NdrDecode::decode_deferred(value, reader),
                    )+
                }
            }
        }
    };
}

/// Declares an IDL `enum`: 16 bits in NDR20, 32 bits in NDR64.
#[macro_export]
macro_rules! ndr_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
        }

        impl $name {
            pub fn value(&self) -> u32 {
                match self {
                    $(
                        Self::$variant => $value,
                    )+
                }
            }

            pub fn from_value(value: u32) -> Option<Self> {
                match value {
                    $(
                        $value => Some(Self::$variant),
                    )+
                    _ => None,
                }
            }
        }

        impl $crate::NdrAligned for $name {
            fn ndr_align(syntax: $crate::NdrSyntax) -> usize {
                match syntax {
                    $crate::NdrSyntax::Ndr20 => 2,
                    $crate::NdrSyntax::Ndr64 => 4,
                }
            }
        }

        impl $crate::NdrEncode for $name {
            fn encode_inline(&self, writer: &mut $crate::NdrWriter) -> $crate::Result<()> {
                writer.align(<Self as $crate::NdrAligned>::ndr_align(writer.syntax()))?;
                match writer.syntax() {
                    $crate::NdrSyntax::Ndr20 => writer.write_u16(self.value() as u16),
                    $crate::NdrSyntax::Ndr64 => writer.write_u32(self.value()),
                }
            }
        }

        impl $crate::NdrDecode for $name {
            fn decode_inline(reader: &mut $crate::NdrReader<'_>) -> $crate::Result<Self> {
                reader.align(<Self as $crate::NdrAligned>::ndr_align(reader.syntax()))?;
                let value = match reader.syntax() {
                    $crate::NdrSyntax::Ndr20 => reader.read_u16()? as u32,
                    $crate::NdrSyntax::Ndr64 => reader.read_u32()?,
                };
                Self::from_value(value)
                    .ok_or($crate::NdrError::InvalidDiscriminant(value as u64))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{NdrContext, NdrError, NdrPtr, NdrSyntax, decode_stub, encode_stub};

    ndr_struct! {
        #[derive(Debug, PartialEq, Eq)]
        struct Padded {
            wide: u64,
            narrow: u8,
        }
    }

    ndr_union! {
        #[derive(Debug, PartialEq, Eq)]
        enum Choice: u32 {
            Number(u16) = 1,
            Pointer(NdrPtr<u32>) = 2,
        }
    }

    ndr_params! {
        #[derive(Debug, PartialEq, Eq)]
        struct Params {
            first: NdrPtr<u16>,
            choice: Choice,
        }
    }

    ndr_enum! {
        #[derive(Debug, PartialEq, Eq, Clone, Copy)]
        enum Color {
            Red = 0,
            Blue = 3,
        }
    }

    #[crate::ndr_bitfield]
    struct Flags {
        pub force: bool,
        pub restart: bool,
        #[skip]
        __: modular_bitfield::specifiers::B30,
    }

    #[test]
    fn test_bitfield_is_a_u32() {
        let ctx = NdrContext::new(NdrSyntax::Ndr20);
        let flags = Flags::new().with_restart(true);
        let data = encode_stub(ctx, &flags).unwrap();
        assert_eq!(data, [2, 0, 0, 0]);
        assert_eq!(decode_stub::<Flags>(ctx, &data).unwrap(), flags);
    }

    #[test]
    fn test_struct_tail_padding_ndr64_only() {
        let value = Padded {
            wide: 1,
            narrow: 2,
        };
        let data = encode_stub(NdrContext::new(NdrSyntax::Ndr20), &value).unwrap();
        assert_eq!(data.len(), 9);
        let data = encode_stub(NdrContext::new(NdrSyntax::Ndr64), &value).unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(
            decode_stub::<Padded>(NdrContext::new(NdrSyntax::Ndr64), &data).unwrap(),
            value
        );
    }

    #[test]
    fn test_params_encode_each_parameter_whole() {
        let value = Params {
            first: NdrPtr::new(0x1234),
            choice: Choice::Pointer(NdrPtr::new(5)),
        };
        let ctx = NdrContext::new(NdrSyntax::Ndr20);
        let data = encode_stub(ctx, &value).unwrap();
        assert_eq!(
            data,
            [
                0, 0, 2, 0, // first referent
                0x34, 0x12, 0, 0, // *first, padding
                2, 0, 0, 0, // discriminant
                4, 0, 2, 0, // arm referent
                5, 0, 0, 0, // arm pointee
            ]
        );
        assert_eq!(decode_stub::<Params>(ctx, &data).unwrap(), value);
    }

    #[test]
    fn test_union_ndr64_aligns_arm() {
        let ctx = NdrContext::new(NdrSyntax::Ndr64);
        let data = encode_stub(ctx, &Choice::Pointer(NdrPtr::null())).unwrap();
        assert_eq!(
            data,
            [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(Choice::Number(3).discriminant(), 1);
    }

    #[test]
    fn test_union_unknown_discriminant() {
        let ctx = NdrContext::new(NdrSyntax::Ndr20);
        assert!(matches!(
            decode_stub::<Choice>(ctx, &[9, 0, 0, 0, 0, 0, 0, 0]),
            Err(NdrError::InvalidDiscriminant(9))
        ));
    }

    #[test]
    fn test_enum_width_per_syntax() {
        let data = encode_stub(NdrContext::new(NdrSyntax::Ndr20), &Color::Blue).unwrap();
        assert_eq!(data, [3, 0]);
        let data = encode_stub(NdrContext::new(NdrSyntax::Ndr64), &Color::Blue).unwrap();
        assert_eq!(data, [3, 0, 0, 0]);
        assert!(matches!(
            decode_stub::<Color>(NdrContext::new(NdrSyntax::Ndr20), &[7, 0]),
            Err(NdrError::InvalidDiscriminant(7))
        ));
    }
}
