//! On-screen debug console.
//!
//! A `tracing` layer that keeps the most recent log lines in memory so the
//! host can overlay them on the AR view. Error events are prefixed with
//! [`ERROR_PREFIX`] so the overlay can colour them.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Lines retained.
pub const DEBUG_CONSOLE_CAPACITY: usize = 21;

/// Prefix marking error lines.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Bounded in-memory log sink. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct DebugConsole {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl DebugConsole {
    /// An empty console.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a line, dropping the oldest beyond capacity.
    pub fn push(&self, line: String) {
        let mut lines = self.buffer();
        if lines.len() == DEBUG_CONSOLE_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Retained lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.buffer().iter().cloned().collect()
    }

    /// Empties the buffer.
    pub fn clear(&self) {
        self.buffer().clear();
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

impl<S: Subscriber> Layer<S> for DebugConsole {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut line = String::new();
        if level == Level::ERROR {
            line.push_str(ERROR_PREFIX);
        }
        line.push_str(&visitor.message);
        line.push_str(&visitor.fields);
        self.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(console: &DebugConsole, emit: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(console.clone());
        tracing::subscriber::with_default(subscriber, emit);
    }

    #[test]
    fn test_info_and_error_lines_are_captured_in_order() {
        // Arrange
        let console = DebugConsole::new();

        // Act
        capture(&console, || {
            info!("scene 1 model loaded");
            error!(url = "/scene1.mp3", "narration load failed");
        });

        // Assert
        assert_eq!(
            console.lines(),
            vec![
                "scene 1 model loaded".to_owned(),
                "ERROR: narration load failed url=/scene1.mp3".to_owned(),
            ]
        );
    }

    #[test]
    fn test_warnings_are_unprefixed_and_debug_is_ignored() {
        let console = DebugConsole::new();

        capture(&console, || {
            debug!("noisy");
            warn!("late model dropped");
        });

        assert_eq!(console.lines(), vec!["late model dropped".to_owned()]);
    }

    #[test]
    fn test_console_keeps_only_the_most_recent_lines() {
        // Arrange
        let console = DebugConsole::new();

        // Act
        capture(&console, || {
            for i in 0..30 {
                info!("line {i}");
            }
        });

        // Assert
        let lines = console.lines();
        assert_eq!(lines.len(), DEBUG_CONSOLE_CAPACITY);
        assert_eq!(lines.first().map(String::as_str), Some("line 9"));
        assert_eq!(lines.last().map(String::as_str), Some("line 29"));
    }

    #[test]
    fn test_clones_share_one_buffer() {
        let console = DebugConsole::new();
        let overlay = console.clone();

        console.push("hello".to_owned());
        overlay.clear();

        assert!(console.lines().is_empty());
    }
}
