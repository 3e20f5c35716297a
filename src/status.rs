//! Status reporting
//!
//! User-facing transient status messages ("Generating response...",
//! "Saved", queue progress). The UI layer supplies its own sink; the
//! default one writes to the log.

/// Sink for transient user-facing status messages
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
}

/// Default sink that logs status messages
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&self, message: &str) {
        log::info!("status: {}", message);
    }
}

#[cfg(test)]
pub mod testing {
    use super::StatusSink;
    use std::sync::Mutex;

    /// Records every status message for assertions
    #[derive(Default)]
    pub struct RecordingStatus {
        pub messages: Mutex<Vec<String>>,
    }

    impl StatusSink for RecordingStatus {
        fn status(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    impl RecordingStatus {
        pub fn contains(&self, needle: &str) -> bool {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .any(|m| m.contains(needle))
        }
    }
}
