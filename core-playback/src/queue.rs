//! # Playback Queue
//!
//! Ordered list of track URLs. Insertion order is play order; the queue is
//! replaced wholesale by [`PlaybackQueue::load`] and never edited in place.

use crate::error::{PlaybackError, Result};

/// Track URLs plus the index of the current track.
///
/// Invariant: once loaded the queue is non-empty and the current index is
/// within `[0, len)`. Before the first load there is no current index.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    urls: Vec<String>,
    current: Option<usize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue and reset the current index to 0.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::EmptyQueue`] when `urls` is empty. The
    /// previous contents are kept in that case.
    pub fn load(&mut self, urls: Vec<String>) -> Result<()> {
        if urls.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.urls = urls;
        self.current = Some(0);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    /// Index of the current track, `None` before any load.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// URL of track `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::IndexOutOfRange`] outside `[0, len)`.
    pub fn url_at(&self, index: usize) -> Result<&str> {
        self.urls
            .get(index)
            .map(String::as_str)
            .ok_or(PlaybackError::IndexOutOfRange {
                index,
                len: self.urls.len(),
            })
    }

    /// Make `index` the current track.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::IndexOutOfRange`] outside `[0, len)`; the
    /// current index is left unchanged.
    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        self.url_at(index)?;
        self.current = Some(index);
        Ok(())
    }

    /// All URLs in play order.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}
