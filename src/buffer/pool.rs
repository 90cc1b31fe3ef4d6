use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::BufferId;

use super::Frame;

/// BufferPool owns a fixed array of frames plus the clock hand. Victim
/// selection is a second-chance sweep: the hand gives every recently used
/// frame one pass of grace before reclaiming it.
pub struct BufferPool {
    frames: Vec<Arc<Frame>>,
    /// Position of the clock hand
    next_victim_id: Mutex<BufferId>,
}

impl BufferPool {
    /// Creates a pool with `pool_size` empty frames.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool must have at least one frame");

        let frames = (0..pool_size).map(|_| Arc::new(Frame::new())).collect();

        Self {
            frames,
            next_victim_id: Mutex::new(BufferId::new(0)),
        }
    }

    /// Number of frames in the pool.
    pub fn size(&self) -> usize {
        self.frames.len()
    }

    /// Returns the frame in the given slot.
    pub fn frame(&self, buffer_id: BufferId) -> &Arc<Frame> {
        &self.frames[buffer_id.as_usize()]
    }

    /// Selects a frame whose page can be evicted, or `None` when every
    /// frame stays pinned for a full revolution of the hand.
    ///
    /// Single pass of the second-chance algorithm:
    /// - an unpinned frame with usage count 0 is the victim; the hand stays
    ///   on it so the freshly rebound page is the first candidate next time,
    /// - an unpinned frame with usage count > 0 is decayed by one and the
    ///   consecutive-pinned counter resets, so such frames become evictable
    ///   after at most one full sweep,
    /// - a pinned frame bumps the consecutive-pinned counter; `pool_size`
    ///   pinned frames in a row mean nothing is evictable.
    pub fn evict(&self) -> Option<BufferId> {
        let pool_size = self.size();
        let mut consecutive_pinned = 0;
        let mut hand = self.next_victim_id.lock();

        loop {
            let victim = *hand;
            let frame = &self.frames[victim.as_usize()];

            if frame.is_pinned() {
                consecutive_pinned += 1;
                if consecutive_pinned >= pool_size {
                    return None;
                }
            } else if frame.usage_count() == 0 {
                return Some(victim);
            } else {
                frame.decay_usage();
                consecutive_pinned = 0;
            }

            *hand = BufferId::new((victim.as_usize() + 1) % pool_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_new() {
        let pool = BufferPool::new(4);
        assert_eq!(pool.size(), 4);
        for i in 0..4 {
            assert!(pool.frame(BufferId::new(i)).page_id().valid().is_none());
        }
    }

    #[test]
    fn test_evict_fresh_pool() {
        let pool = BufferPool::new(3);
        // Every frame is empty and unpinned; the hand picks the first one.
        assert_eq!(pool.evict(), Some(BufferId::new(0)));
    }

    #[test]
    fn test_evict_skips_pinned() {
        let pool = BufferPool::new(3);
        pool.frame(BufferId::new(0)).pin();

        assert_eq!(pool.evict(), Some(BufferId::new(1)));
    }

    #[test]
    fn test_evict_all_pinned() {
        let pool = BufferPool::new(3);
        for i in 0..3 {
            pool.frame(BufferId::new(i)).pin();
        }

        assert_eq!(pool.evict(), None);
    }

    #[test]
    fn test_evict_decays_used_frames() {
        let pool = BufferPool::new(3);
        for i in 0..3 {
            let frame = pool.frame(BufferId::new(i));
            frame.set_usage_count(1);
            frame.mark_dirty();
        }

        // One full sweep decays every usage count to 0, then the hand wraps
        // around and claims the first frame.
        assert_eq!(pool.evict(), Some(BufferId::new(0)));
        for i in 1..3 {
            assert_eq!(pool.frame(BufferId::new(i)).usage_count(), 0);
        }
    }

    #[test]
    fn test_evict_hand_stays_on_victim() {
        let pool = BufferPool::new(2);

        let victim = pool.evict().unwrap();
        assert_eq!(victim, BufferId::new(0));

        // The victim frame was not rebound, so the hand has no reason to
        // have moved past it.
        assert_eq!(pool.evict(), Some(BufferId::new(0)));
    }

    #[test]
    fn test_evict_pinned_counter_resets_on_used_frame() {
        let pool = BufferPool::new(2);
        pool.frame(BufferId::new(0)).pin();
        pool.frame(BufferId::new(1)).set_usage_count(2);

        // frame 0 pinned, frame 1 decays twice before being claimed; the
        // used frame keeps resetting the consecutive-pinned counter so the
        // sweep never gives up early.
        assert_eq!(pool.evict(), Some(BufferId::new(1)));
    }
}
