/// Write access to a clipboard.
pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: &str) -> anyhow::Result<()>;
}

/// The desktop clipboard of the machine the server runs on.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> anyhow::Result<()> {
        let mut clipboard = match arboard::Clipboard::new() {
            Ok(v) => v,
            Err(err) => anyhow::bail!("Failed to access clipboard: {err}"),
        };
        match clipboard.set_text(text) {
            Ok(()) => Ok(()),
            Err(err) => anyhow::bail!("Failed to write to clipboard: {err}"),
        }
    }
}

/// Copies `text`, logging a failure instead of returning it.
pub fn copy_or_warn(clipboard: &dyn Clipboard, text: &str) {
    if let Err(err) = clipboard.set_text(text) {
        tracing::warn!("Copy failed: {err}");
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::{Arc, Mutex, PoisonError};
    use super::Clipboard;

    /// Keeps every copied text; fails on demand.
    #[derive(Clone, Default)]
    pub struct RecordingClipboard {
        copied: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }
    impl RecordingClipboard {
        /// A clipboard whose every write fails.
        pub fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }
        pub fn copied(&self) -> Vec<String> {
            self.copied.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }
    impl Clipboard for RecordingClipboard {
        fn set_text(&self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("clipboard unavailable");
            }
            self.copied.lock().unwrap_or_else(PoisonError::into_inner).push(text.to_string());
            Ok(())
        }
    }
}
