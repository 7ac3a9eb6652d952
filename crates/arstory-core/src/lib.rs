//! AR story core — shared abstractions.
//!
//! This crate defines the types and ports every other component depends on:
//! the clock, error types, configuration, decoded assets, spatial math and the
//! `Stage` scene graph. It contains no I/O and no rendering.

pub mod asset;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod spatial;
pub mod stage;
