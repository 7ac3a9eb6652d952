//! AR story — presentation shell.
//!
//! The entry point a host page drives: it checks AR support, reacts to
//! session start and end, feeds frames and touches into the engine, and
//! tears everything down when the session is over. Logging setup and the
//! on-screen debug console live here as well.

pub mod debug_console;
pub mod session;
pub mod shell;
pub mod telemetry;

pub use debug_console::DebugConsole;
pub use session::{ArCapabilities, FrameInput, SessionEvent, ShellPhase, ShellPorts};
pub use shell::PresentationShell;
pub use telemetry::TelemetryConfig;
