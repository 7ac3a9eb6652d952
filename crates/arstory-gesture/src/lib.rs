//! AR story — touch gesture interpretation and panel picking.
//!
//! Turns raw multi-touch streams into rotate, pinch and pan deltas for the
//! content group, and turns taps into a ray pick against interactive panels.

pub mod interpreter;
pub mod picking;
pub mod session;

pub use interpreter::{GestureInterpreter, Tap};
pub use picking::pick_panel;
pub use session::{GestureMode, GestureSession};
