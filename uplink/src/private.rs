//! Operations that aren't part of the stable API of this crate.
//!
//! They exist for debugging and testing the satellites and they may change or disappear in any
//! release.

pub mod access;
