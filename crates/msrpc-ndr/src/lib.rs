//! Network Data Representation (NDR) for MS-RPC stubs.
//!
//! Supports the NDR20 (C706 chapter 14) and NDR64 (MS-RPCE 2.2.5) transfer syntaxes.
//! Types describe their wire form through [`NdrEncode`] and [`NdrDecode`]; structures,
//! parameter blocks and unions are usually declared with [`ndr_struct!`], [`ndr_params!`],
//! [`ndr_union!`] and [`ndr_enum!`].

#![forbid(unsafe_code)]

extern crate self as msrpc_ndr;

mod array;
mod codec;
mod context;
mod error;
mod handle;
mod macros;
mod pointer;
mod primitives;
mod reader;
mod string;
mod writer;

pub use array::*;
pub use codec::*;
pub use context::*;
pub use error::*;
pub use handle::*;
pub use pointer::*;
pub use reader::*;
pub use string::*;
pub use writer::*;

pub use msrpc_dtyp_derive::ndr_bitfield;
