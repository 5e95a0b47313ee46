//! The archive handle and its operation families.
//!
//! [`MtArchive`] is the single entry point: lifecycle (create/open/flush/
//! close), hierarchy mutation, consistency propagation, the channel summary
//! index, and verification all hang off it.

mod consistency;
mod hierarchy;
mod lifecycle;
mod summary;
mod verify;

pub use lifecycle::MtArchive;
