//! Sliding window of per-frame feature vectors
//!
//! Keeps the N most recent vectors in append order. Snapshots are immutable
//! shared copies so a classification in flight never sees later appends.

use crate::error::{Error, Result};
use crate::features::FeatureVector;
use std::collections::VecDeque;
use std::sync::Arc;

/// Immutable copy of a full window, oldest vector first
pub type WindowSnapshot = Arc<[FeatureVector]>;

/// Fixed-capacity FIFO window over feature vectors
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    /// Vectors in append order (front = oldest)
    vectors: VecDeque<FeatureVector>,

    /// Window length N
    capacity: usize,

    /// Width every vector must have; pinned by config or by the first append
    width: Option<usize>,

    /// Width configured up front (survives `clear`)
    configured_width: Option<usize>,
}

impl WindowBuffer {
    /// Create an empty window holding at most `capacity` vectors
    pub fn new(capacity: usize) -> Self {
        Self::with_width(capacity, None)
    }

    /// Create an empty window that only accepts vectors of `width` values
    pub fn with_width(capacity: usize, width: Option<usize>) -> Self {
        Self {
            vectors: VecDeque::with_capacity(capacity + 1),
            capacity,
            width,
            configured_width: width,
        }
    }

    /// Append a vector, evicting the oldest once more than N are held
    pub fn append(&mut self, vector: FeatureVector) -> Result<()> {
        match self.width {
            Some(width) if width != vector.len() => {
                return Err(Error::contract(format!(
                    "feature vector width {} does not match window width {}",
                    vector.len(),
                    width
                )));
            }
            Some(_) => {}
            None => self.width = Some(vector.len()),
        }

        self.vectors.push_back(vector);
        while self.vectors.len() > self.capacity {
            self.vectors.pop_front();
        }
        Ok(())
    }

    /// Whether the window holds exactly N vectors
    pub fn is_full(&self) -> bool {
        self.vectors.len() == self.capacity
    }

    /// Copy of the current window; fails unless the window is full
    pub fn snapshot(&self) -> Result<WindowSnapshot> {
        if !self.is_full() {
            return Err(Error::WindowNotFull {
                len: self.vectors.len(),
                capacity: self.capacity,
            });
        }
        Ok(self.vectors.iter().cloned().collect())
    }

    /// Number of vectors currently held
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Window length N
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Width accepted by this window, once known
    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// Drop all vectors (stream reset)
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.width = self.configured_width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(tag: f32) -> FeatureVector {
        vec![tag, tag + 0.5, tag + 1.0]
    }

    #[test]
    fn test_fills_to_capacity() {
        let mut window = WindowBuffer::new(3);
        assert!(window.is_empty());

        window.append(vector(1.0)).unwrap();
        window.append(vector(2.0)).unwrap();
        assert!(!window.is_full());
        assert_eq!(window.len(), 2);

        window.append(vector(3.0)).unwrap();
        assert!(window.is_full());
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut window = WindowBuffer::new(3);
        for i in 0..5 {
            window.append(vector(i as f32)).unwrap();
        }

        assert_eq!(window.len(), 3);
        let snapshot = window.snapshot().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0], vector(2.0));
        assert_eq!(snapshot[1], vector(3.0));
        assert_eq!(snapshot[2], vector(4.0));
    }

    #[test]
    fn test_snapshot_requires_full_window() {
        let mut window = WindowBuffer::new(2);
        window.append(vector(0.0)).unwrap();

        match window.snapshot() {
            Err(Error::WindowNotFull { len, capacity }) => {
                assert_eq!(len, 1);
                assert_eq!(capacity, 2);
            }
            other => panic!("expected WindowNotFull, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let mut window = WindowBuffer::new(2);
        window.append(vector(0.0)).unwrap();
        window.append(vector(1.0)).unwrap();

        let snapshot = window.snapshot().unwrap();
        window.append(vector(9.0)).unwrap();

        assert_eq!(snapshot[0], vector(0.0));
        assert_eq!(snapshot[1], vector(1.0));
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let mut window = WindowBuffer::new(4);
        window.append(vec![0.0; 3]).unwrap();

        let err = window.append(vec![0.0; 4]).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_configured_width() {
        let mut window = WindowBuffer::with_width(2, Some(5));
        assert!(window.append(vec![0.0; 3]).is_err());
        assert!(window.append(vec![0.0; 5]).is_ok());

        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.width(), Some(5));
    }

    #[test]
    fn test_clear_releases_inferred_width() {
        let mut window = WindowBuffer::new(2);
        window.append(vec![0.0; 3]).unwrap();
        window.clear();
        assert_eq!(window.width(), None);
        assert!(window.append(vec![0.0; 7]).is_ok());
    }
}
