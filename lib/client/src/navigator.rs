//! Full-page navigation seam.

use std::sync::{Mutex, PoisonError};

use url::Url;

/// Performs a full-page navigation, leaving the current page lifecycle.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Records navigations instead of performing them.
///
/// Used by headless hosts that hand the URL to something else, and in tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recent navigation target.
    #[must_use]
    pub fn last(&self) -> Option<Url> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Returns every navigation target in order.
    #[must_use]
    pub fn visited(&self) -> Vec<Url> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());
    }
}
