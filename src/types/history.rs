//! Bounded face history used by the anti-spoofing analyses

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::ResolvedFace;

/// One derived sample per validated frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceHistoryEntry {
    /// √(yaw² + pitch² + roll²) in degrees
    pub rotation_magnitude: f64,
    /// Bounding-box diagonal in pixels
    pub face_size: f64,
    pub timestamp_ms: u64,
}

impl FaceHistoryEntry {
    pub fn from_face(face: &ResolvedFace) -> Self {
        Self {
            rotation_magnitude: face.rotation_magnitude(),
            face_size: face.bounding_box.diagonal(),
            timestamp_ms: face.timestamp_ms,
        }
    }
}

/// FIFO window of history entries; the oldest entry is evicted on overflow
#[derive(Debug, Clone)]
pub struct FaceHistory {
    entries: VecDeque<FaceHistoryEntry>,
    capacity: usize,
}

impl Default for FaceHistory {
    fn default() -> Self {
        Self::new(crate::MAX_HISTORY_LENGTH)
    }
}

impl FaceHistory {
    /// Create a window holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: FaceHistoryEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &FaceHistoryEntry> {
        self.entries.iter()
    }

    pub fn rotation_samples(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.rotation_magnitude).collect()
    }

    pub fn size_samples(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.face_size).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts: u64) -> FaceHistoryEntry {
        FaceHistoryEntry {
            rotation_magnitude: ts as f64,
            face_size: 100.0,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut history = FaceHistory::new(5);
        for ts in 0..12 {
            history.push(entry(ts));
            assert!(history.len() <= 5);
        }
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut history = FaceHistory::new(3);
        for ts in 0..5 {
            history.push(entry(ts));
        }
        let stamps: Vec<u64> = history.entries().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut history = FaceHistory::new(0);
        history.push(entry(1));
        history.push(entry(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }
}
