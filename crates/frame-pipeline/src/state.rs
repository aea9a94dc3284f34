//! Latest detection result shared between the producer and its readers

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use emotion::DetectionSnapshot;

#[derive(Debug, Default)]
struct Slot {
    snapshot: DetectionSnapshot,
    version: u64,
}

/// Handle on the shared detection snapshot.
///
/// Writes replace the whole snapshot; reads return a complete copy. The lock
/// is only held to move a value in or clone it out.
#[derive(Debug, Clone, Default)]
pub struct SharedDetection {
    inner: Arc<Mutex<Slot>>,
}

impl SharedDetection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot, returning the previous one
    pub fn write(&self, snapshot: DetectionSnapshot) -> DetectionSnapshot {
        let mut slot = self.lock();
        slot.version += 1;
        std::mem::replace(&mut slot.snapshot, snapshot)
    }

    /// Copy of the current snapshot
    pub fn read(&self) -> DetectionSnapshot {
        self.lock().snapshot.clone()
    }

    /// Number of writes so far
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    // The slot is always whole, so a writer panicking elsewhere cannot leave
    // it half updated.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotion::{EmotionLabel, Face, FaceBox};
    use std::thread;

    fn snapshot(label: EmotionLabel, score: f32) -> DetectionSnapshot {
        DetectionSnapshot::from_face(&Face::new(FaceBox::new(1, 2, 3, 4), [(label, score)]))
    }

    #[test]
    fn test_starts_empty() {
        let shared = SharedDetection::new();
        assert_eq!(shared.read(), DetectionSnapshot::empty());
        assert_eq!(shared.version(), 0);
    }

    #[test]
    fn test_write_replaces() {
        let shared = SharedDetection::new();
        shared.write(snapshot(EmotionLabel::Happy, 0.8));
        let previous = shared.write(snapshot(EmotionLabel::Sad, 0.6));

        assert_eq!(previous.dominant, Some(EmotionLabel::Happy));
        assert_eq!(shared.read().dominant, Some(EmotionLabel::Sad));
        assert_eq!(shared.version(), 2);
    }

    #[test]
    fn test_readers_never_see_mixed_snapshots() {
        let shared = SharedDetection::new();
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    let (label, score) = if i % 2 == 0 {
                        (EmotionLabel::Happy, 0.9)
                    } else {
                        (EmotionLabel::Angry, 0.4)
                    };
                    shared.write(snapshot(label, score));
                }
            })
        };

        for _ in 0..2000 {
            let read = shared.read();
            if let Some(dominant) = read.dominant {
                assert_eq!(read.confidence, read.emotions[&dominant]);
                assert_eq!(read.emotions.len(), 1);
            }
        }
        writer.join().unwrap();
        assert_eq!(shared.version(), 2000);
    }
}
