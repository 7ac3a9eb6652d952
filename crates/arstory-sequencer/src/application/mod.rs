//! Scene loading and transition orchestration.

pub mod sequencer;
