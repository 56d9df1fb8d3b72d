use proc_macro::TokenStream;

/// Declares a `modular_bitfield` struct that binrw reads and writes as its raw bytes,
/// the way PDU flag fields travel.
///
/// `modular_bitfield` and `binrw` must be dependencies of the calling crate.
#[proc_macro_attribute]
pub fn mbitfield(attr: TokenStream, input: TokenStream) -> TokenStream {
    let attr = proc_macro2::TokenStream::from(attr);
    let input = syn::parse_macro_input!(input as syn::ItemStruct);
    quote::quote! {
        #[::modular_bitfield::bitfield(#attr)]
        #[derive(::binrw::BinWrite, ::binrw::BinRead)]
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        #[bw(map = |&x| Self::into_bytes(x))]
        #[br(map = Self::from_bytes)]
        #input
    }
    .into()
}

/// Declares a 32-bit `modular_bitfield` struct that travels in NDR stubs
/// as an unsigned long.
///
/// `modular_bitfield` and `msrpc_ndr` must be dependencies of the calling crate.
#[proc_macro_attribute]
pub fn ndr_bitfield(attr: TokenStream, input: TokenStream) -> TokenStream {
    let attr = proc_macro2::TokenStream::from(attr);
    let input = syn::parse_macro_input!(input as syn::ItemStruct);
    let name = &input.ident;
    quote::quote! {
        #[::modular_bitfield::bitfield(#attr)]
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        #input

        impl ::msrpc_ndr::NdrAligned for #name {
            fn ndr_align(_syntax: ::msrpc_ndr::NdrSyntax) -> usize {
                4
            }
        }

        impl ::msrpc_ndr::NdrEncode for #name {
            fn encode_inline(&self, writer: &mut ::msrpc_ndr::NdrWriter) -> ::msrpc_ndr::Result<()> {
                writer.align(4)?;
                writer.write_u32(u32::from_le_bytes(self.into_bytes()))
            }
        }

        impl ::msrpc_ndr::NdrDecode for #name {
            fn decode_inline(reader: &mut ::msrpc_ndr::NdrReader<'_>) -> ::msrpc_ndr::Result<Self> {
                reader.align(4)?;
                Ok(Self::from_bytes(reader.read_u32()?.to_le_bytes()))
            }
        }
    }
    .into()
}
