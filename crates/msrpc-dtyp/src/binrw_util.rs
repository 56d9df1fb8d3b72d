//! Helpers for writing `binrw` structures.

pub mod pos_marker;

pub mod prelude {
    pub use super::pos_marker::PosMarker;
}
