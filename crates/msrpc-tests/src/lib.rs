//! Helpers for NDR test vectors. Vectors are hex strings, as captured from the wire.

#[doc(hidden)]
pub mod __private {
    pub use hex;
    pub use msrpc_ndr;
    pub use pastey;
    pub use pretty_assertions;
}

/// Generates a test decoding `$hex` with `$syntax`, expecting the given value.
#[macro_export]
macro_rules! test_ndr_read {
    ($syntax:ident struct $name:ident $body:tt => $hex:literal) => {
        $crate::__private::pastey::paste! {
            #[test]
            fn [<test_ $name:snake _ $syntax:lower _read>]() {
                use $crate::__private::msrpc_ndr as ndr;
                let ctx = ndr::NdrContext::new(ndr::NdrSyntax::$syntax);
                let data = $crate::__private::hex::decode($hex).unwrap();
                let value: $name = ndr::decode_stub(ctx, &data).unwrap();
                $crate::__private::pretty_assertions::assert_eq!(value, $name $body);
            }
        }
    };
}

/// Generates a test encoding the given value with `$syntax`, expecting `$hex`.
#[macro_export]
macro_rules! test_ndr_write {
    ($syntax:ident struct $name:ident $body:tt => $hex:literal) => {
        $crate::__private::pastey::paste! {
            #[test]
            fn [<test_ $name:snake _ $syntax:lower _write>]() {
                use $crate::__private::msrpc_ndr as ndr;
                let ctx = ndr::NdrContext::new(ndr::NdrSyntax::$syntax);
                let value = $name $body;
                let data = ndr::encode_stub(ctx, &value).unwrap();
                $crate::__private::pretty_assertions::assert_eq!(
                    data,
                    $crate::__private::hex::decode($hex).unwrap()
                );
            }
        }
    };
}
