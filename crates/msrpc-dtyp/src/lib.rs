//! Windows Data Types (MS-DTYP) for MS-RPC

#![forbid(unsafe_code)]

pub mod binrw_util;
pub mod guid;
pub mod status;

pub use guid::*;

pub use msrpc_dtyp_derive::mbitfield;
