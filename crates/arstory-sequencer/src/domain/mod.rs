//! Scene progression state.

pub mod state;
