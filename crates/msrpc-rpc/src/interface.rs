//! RPC interfaces: the dispatcher framework, and the interfaces built on it.

mod base;
mod macros;
mod registry;

pub mod dcom;
pub mod iunknown;
pub mod nspi;
pub mod srvsvc;
pub mod vds;
pub mod windowsshutdown;

pub use base::*;
pub use registry::*;

#[cfg(test)]
mod tests;
