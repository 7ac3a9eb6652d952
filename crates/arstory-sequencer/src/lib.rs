//! AR story — timed scene sequencing.
//!
//! Responsible for entering the opening scene on the first AR frame, arming
//! the transition timer, and replacing scene 1 with scene 2 exactly once.

pub mod application;
pub mod domain;
