//! Lazily populated, never invalidated cache cells.

use std::future::Future;
use std::sync::OnceLock;

/// A cell filled on first successful use and kept for the life of the owner.
///
/// Concurrent first callers may each run their initializer. The first value
/// stored wins and later ones are dropped, so every caller observes the same
/// value. Failed initializations are not stored; the next caller retries.
#[derive(Debug)]
pub struct RacyOnceCell<T> {
    inner: OnceLock<T>,
}

impl<T> RacyOnceCell<T> {
    /// Creates an empty cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Returns the cached value, if one has been stored.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.inner.get()
    }

    /// Returns the cached value, running `init` to produce it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the initializer's error unchanged. Nothing is cached on error.
    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.inner.get() {
            return Ok(value);
        }

        let value = init().await?;
        Ok(self.inner.get_or_init(|| value))
    }
}

impl<T> Default for RacyOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
