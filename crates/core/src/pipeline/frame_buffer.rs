use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::shared::constants::{DEFAULT_BUFFERED_FRAMES, FRAME_BUFFER_MEMORY_DIVISOR};
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;

/// What capture does when every slot is taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Evict the oldest queued frame. Keeps latency bounded on live sources.
    #[default]
    DropOldest,
    /// Wait for a slot. Every frame of a file or directory is processed.
    Block,
}

/// How an arriving frame was admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// Admitted after evicting the oldest queued frame.
    EvictedOldest(u64),
}

struct Inner {
    queue: VecDeque<Frame>,
    in_flight: usize,
    capacity: usize,
    closed: bool,
    dropped: u64,
}

/// Bounded hand-off between capture and inference.
///
/// Capacity covers every frame the session holds: queued frames plus
/// frames popped for inference that have not yet been released by the
/// output stage. Under [`AdmissionPolicy::DropOldest`] the oldest *queued*
/// frame makes room; a frame already inside inference or the sink is never
/// evicted, so if every slot is in flight the arriving frame itself is
/// dropped. Under [`AdmissionPolicy::Block`] the producer waits instead.
pub struct FrameBuffer {
    inner: Mutex<Inner>,
    policy: AdmissionPolicy,
    available: Condvar,
    space: Condvar,
}

impl FrameBuffer {
    pub fn new(capacity: usize, policy: AdmissionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                in_flight: 0,
                capacity: capacity.max(1),
                closed: false,
                dropped: 0,
            }),
            policy,
            available: Condvar::new(),
            space: Condvar::new(),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Frames the session may hold for a memory ceiling and frame size.
    pub fn capacity_for(memory_limit_bytes: Option<u64>, frame_bytes: usize) -> usize {
        match memory_limit_bytes {
            None => DEFAULT_BUFFERED_FRAMES,
            Some(bytes) => {
                let frames = bytes / FRAME_BUFFER_MEMORY_DIVISOR / frame_bytes.max(1) as u64;
                frames.clamp(1, DEFAULT_BUFFERED_FRAMES as u64) as usize
            }
        }
    }

    pub fn resize(&self, capacity: usize) {
        self.lock().capacity = capacity.max(1);
        self.space.notify_all();
    }

    /// Admits a frame according to the buffer's policy.
    ///
    /// Returns `StopRequested` once the buffer is closed, including while
    /// blocked waiting for a slot. Under `DropOldest` it returns
    /// `MemoryBudgetExceeded` when every slot is in flight; only that case
    /// and evictions are counted as drops.
    pub fn push(&self, frame: Frame) -> Result<Admission, SwapError> {
        let mut inner = self.lock();
        if self.policy == AdmissionPolicy::Block {
            while !inner.closed && inner.queue.len() + inner.in_flight >= inner.capacity {
                inner = match self.space.wait(inner) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        }
        if inner.closed {
            return Err(SwapError::StopRequested);
        }

        if inner.queue.len() + inner.in_flight < inner.capacity {
            inner.queue.push_back(frame);
            self.available.notify_one();
            return Ok(Admission::Queued);
        }

        match inner.queue.pop_front() {
            Some(evicted) => {
                inner.dropped += 1;
                inner.queue.push_back(frame);
                self.available.notify_one();
                Ok(Admission::EvictedOldest(evicted.sequence()))
            }
            None => {
                inner.dropped += 1;
                Err(SwapError::MemoryBudgetExceeded {
                    capacity: inner.capacity,
                    in_flight: inner.in_flight,
                })
            }
        }
    }

    /// Takes the oldest queued frame, blocking until one arrives.
    ///
    /// After `close` the remaining queue drains before `None` is returned.
    pub fn pop(&self) -> Option<Frame> {
        let mut inner = self.lock();
        loop {
            if let Some(frame) = inner.queue.pop_front() {
                inner.in_flight += 1;
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            inner = match self.available.wait(inner) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Returns the slot of a popped frame once it has left the pipeline.
    pub fn release(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        self.space.notify_one();
    }

    /// Stops admission and wakes blocked producers and consumers.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
        self.space.notify_all();
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::Duration;

    fn frame(seq: u64) -> Frame {
        Frame::filled(4, 4, [0, 0, 0], seq)
    }

    #[rstest]
    #[case(None, 86_400, 8)]
    #[case(Some(1024 * 1024), 160 * 180 * 3, 3)]
    #[case(Some(1024), 86_400, 1)]
    #[case(Some(1 << 40), 86_400, 8)]
    #[case(Some(4 * 1000), 1000, 1)]
    #[case(Some(4 * 5000), 1000, 5)]
    fn test_capacity_for(
        #[case] limit: Option<u64>,
        #[case] frame_bytes: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(FrameBuffer::capacity_for(limit, frame_bytes), expected);
    }

    #[test]
    fn test_fifo_order() {
        let buffer = FrameBuffer::new(4, AdmissionPolicy::DropOldest);
        for seq in 0..3 {
            assert_eq!(buffer.push(frame(seq)).unwrap(), Admission::Queued);
        }
        let popped: Vec<u64> = (0..3).map(|_| buffer.pop().unwrap().sequence()).collect();
        assert_eq!(popped, vec![0, 1, 2]);
        assert_eq!(buffer.in_flight(), 3);
    }

    #[test]
    fn test_full_buffer_evicts_oldest_queued() {
        let buffer = FrameBuffer::new(2, AdmissionPolicy::DropOldest);
        buffer.push(frame(0)).unwrap();
        buffer.push(frame(1)).unwrap();

        assert_eq!(buffer.push(frame(2)).unwrap(), Admission::EvictedOldest(0));
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.pop().unwrap().sequence(), 1);
        assert_eq!(buffer.pop().unwrap().sequence(), 2);
    }

    #[test]
    fn test_in_flight_frames_are_never_evicted() {
        let buffer = FrameBuffer::new(2, AdmissionPolicy::DropOldest);
        buffer.push(frame(0)).unwrap();
        buffer.push(frame(1)).unwrap();
        buffer.pop().unwrap();
        buffer.pop().unwrap();

        let err = buffer.push(frame(2)).unwrap_err();
        assert!(matches!(
            err,
            SwapError::MemoryBudgetExceeded {
                capacity: 2,
                in_flight: 2
            }
        ));
        assert_eq!(buffer.dropped(), 1);

        buffer.release();
        assert_eq!(buffer.push(frame(3)).unwrap(), Admission::Queued);
    }

    #[test]
    fn test_in_flight_counts_toward_capacity() {
        let buffer = FrameBuffer::new(2, AdmissionPolicy::DropOldest);
        buffer.push(frame(0)).unwrap();
        buffer.pop().unwrap();
        buffer.push(frame(1)).unwrap();

        assert_eq!(buffer.push(frame(2)).unwrap(), Admission::EvictedOldest(1));
        assert_eq!(buffer.len() + buffer.in_flight(), 2);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let buffer = FrameBuffer::new(4, AdmissionPolicy::DropOldest);
        buffer.push(frame(0)).unwrap();
        buffer.push(frame(1)).unwrap();
        buffer.close();

        assert!(matches!(buffer.push(frame(2)), Err(SwapError::StopRequested)));
        assert_eq!(buffer.pop().unwrap().sequence(), 0);
        assert_eq!(buffer.pop().unwrap().sequence(), 1);
        assert!(buffer.pop().is_none());
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let buffer = Arc::new(FrameBuffer::new(2, AdmissionPolicy::DropOldest));
        let consumer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || buffer.pop())
        };
        std::thread::sleep(Duration::from_millis(20));
        buffer.close();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_push_wakes_blocked_consumer() {
        let buffer = Arc::new(FrameBuffer::new(2, AdmissionPolicy::DropOldest));
        let consumer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || buffer.pop().map(|f| f.sequence()))
        };
        std::thread::sleep(Duration::from_millis(20));
        buffer.push(frame(7)).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn test_resize_never_below_one() {
        let buffer = FrameBuffer::new(8, AdmissionPolicy::DropOldest);
        buffer.resize(0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_blocking_push_waits_for_release() {
        let buffer = Arc::new(FrameBuffer::new(1, AdmissionPolicy::Block));
        buffer.push(frame(0)).unwrap();
        buffer.pop().unwrap();

        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || buffer.push(frame(1)))
        };
        std::thread::sleep(Duration::from_millis(20));
        assert!(buffer.is_empty());

        buffer.release();
        assert_eq!(producer.join().unwrap().unwrap(), Admission::Queued);
        assert_eq!(buffer.pop().unwrap().sequence(), 1);
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_close_wakes_blocked_producer() {
        let buffer = Arc::new(FrameBuffer::new(1, AdmissionPolicy::Block));
        buffer.push(frame(0)).unwrap();

        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || buffer.push(frame(1)))
        };
        buffer.close();
        assert!(matches!(
            producer.join().unwrap(),
            Err(SwapError::StopRequested)
        ));
        assert_eq!(buffer.dropped(), 0);
    }
}
