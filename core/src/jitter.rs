//! [`JitterBuffer`]: a bounded FIFO of reassembled frames that absorbs
//! network jitter between arrival and display, plus the adaptive pacing
//! helpers the consumer uses to drain it (§4.8).

use parking_lot::Mutex;

/// Fixed capacity of the queue (§3).
pub const CAPACITY: usize = 20;

/// Frames that must be queued before playback begins (§4.8).
pub const PREBUFFER_THRESHOLD: usize = 3;

/// Consecutive empty dequeues at 0% fill that signal end-of-stream (§4.8).
pub const EOF_EMPTY_THRESHOLD: u32 = 30;

/// One slot of the circular queue: an opaque frame buffer, its length (via
/// `data`'s own length), the sequence number of the packet that completed
/// it, and a validity flag distinguishing "never written" from "written".
#[derive(Debug, Clone, Default)]
struct CachedFrame {
    data: Vec<u8>,
    seqnum: u16,
    valid: bool,
}

struct Inner {
    slots: Vec<CachedFrame>,
    write_idx: usize,
    read_idx: usize,
    count: usize,
    buffering: bool,
}

impl Inner {
    fn fresh() -> Self {
        Self {
            slots: vec![CachedFrame::default(); CAPACITY],
            write_idx: 0,
            read_idx: 0,
            count: 0,
            buffering: true,
        }
    }
}

/// Bounded FIFO of reassembled frames. All fields live behind one mutex
/// (§5): no other session state is reachable under it.
pub struct JitterBuffer {
    inner: Mutex<Inner>,
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterBuffer {
    /// A fresh buffer: empty, `buffering == true`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::fresh()),
        }
    }

    /// Enqueue a reassembled frame. If the buffer is full, the oldest frame
    /// is dropped to make room. Returns `true` if an eviction occurred, so
    /// the caller can bump [`crate::RtpStats::record_frame_dropped`] — the
    /// jitter buffer's own mutex must not be held while touching stats
    /// (§5 shared-resource policy).
    pub fn enqueue(&self, seqnum: u16, data: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        let mut evicted = false;

        if inner.count == CAPACITY {
            inner.read_idx = (inner.read_idx + 1) % CAPACITY;
            inner.count -= 1;
            evicted = true;
        }

        let write_idx = inner.write_idx;
        let slot = &mut inner.slots[write_idx];
        slot.data.clear();
        slot.data.extend_from_slice(data);
        slot.seqnum = seqnum;
        slot.valid = true;

        inner.write_idx = (inner.write_idx + 1) % CAPACITY;
        inner.count += 1;

        if inner.buffering && inner.count >= PREBUFFER_THRESHOLD {
            inner.buffering = false;
        }

        if evicted {
            tracing::warn!(seqnum, "jitter buffer full, dropped oldest frame");
        }
        evicted
    }

    /// Dequeue the oldest frame into `out` (cleared first). Returns `false`
    /// (leaving `out` untouched) while `buffering` is true, or when the
    /// queue is empty — the consumer should leave the previous frame on
    /// screen in that case.
    pub fn dequeue(&self, out: &mut Vec<u8>) -> bool {
        let mut inner = self.inner.lock();
        if inner.buffering || inner.count == 0 {
            return false;
        }
        let read_idx = inner.read_idx;
        out.clear();
        out.extend_from_slice(&inner.slots[read_idx].data);
        inner.read_idx = (inner.read_idx + 1) % CAPACITY;
        inner.count -= 1;
        true
    }

    /// Reset to empty and re-arm `buffering`. Called on SEEK so stale
    /// pre-seek frames are discarded (§4.8, §5).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.write_idx = 0;
        inner.read_idx = 0;
        inner.count = 0;
        inner.buffering = true;
    }

    /// Current number of queued frames, in `[0, CAPACITY]`.
    pub fn count(&self) -> usize {
        self.inner.lock().count
    }

    /// Whether the buffer is still waiting to reach the prebuffer threshold.
    pub fn is_buffering(&self) -> bool {
        self.inner.lock().buffering
    }

    /// Current fill level as a percentage in `[0, 100]`.
    pub fn fill_percent(&self) -> u8 {
        ((self.count() * 100) / CAPACITY) as u8
    }
}

/// Adaptive consume interval in milliseconds, from current buffer fill
/// percentage (§4.8): drain faster above 80%, fill faster below 70%,
/// otherwise a steady 33 ms (≈30 fps).
pub fn adaptive_interval_ms(fill_percent: u8) -> u64 {
    if fill_percent > 80 {
        32
    } else if fill_percent < 70 {
        34
    } else {
        33
    }
}

/// Tracks consecutive empty dequeues to detect end-of-stream: 30 in a row
/// while the buffer sits at 0% fill (§4.8).
#[derive(Debug, Default)]
pub struct EofDetector {
    consecutive_empty: u32,
}

impl EofDetector {
    /// Create a fresh detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the outcome of one dequeue attempt. Returns `true` once
    /// end-of-stream is declared.
    pub fn observe(&mut self, got_frame: bool, fill_percent: u8) -> bool {
        if got_frame {
            self.consecutive_empty = 0;
            return false;
        }
        if fill_percent == 0 {
            self.consecutive_empty += 1;
        } else {
            self.consecutive_empty = 0;
        }
        self.consecutive_empty > EOF_EMPTY_THRESHOLD
    }

    /// Reset the detector, e.g. after a SEEK restarts playback.
    pub fn reset(&mut self) {
        self.consecutive_empty = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffering_until_prebuffer_threshold() {
        let jb = JitterBuffer::new();
        assert!(jb.is_buffering());
        jb.enqueue(1, b"a");
        jb.enqueue(2, b"b");
        assert!(jb.is_buffering(), "still below threshold of 3");
        jb.enqueue(3, b"c");
        assert!(!jb.is_buffering());
    }

    #[test]
    fn dequeue_returns_none_while_buffering_even_if_nonempty() {
        let jb = JitterBuffer::new();
        jb.enqueue(1, b"a");
        let mut out = Vec::new();
        assert!(!jb.dequeue(&mut out));
    }

    #[test]
    fn dequeue_returns_frames_in_order_once_unbuffered() {
        let jb = JitterBuffer::new();
        jb.enqueue(1, b"a");
        jb.enqueue(2, b"b");
        jb.enqueue(3, b"c");
        let mut out = Vec::new();
        assert!(jb.dequeue(&mut out));
        assert_eq!(out, b"a");
        assert!(jb.dequeue(&mut out));
        assert_eq!(out, b"b");
    }

    #[test]
    fn dequeue_on_empty_queue_returns_false() {
        let jb = JitterBuffer::new();
        jb.enqueue(1, b"a");
        jb.enqueue(2, b"b");
        jb.enqueue(3, b"c");
        let mut out = Vec::new();
        jb.dequeue(&mut out);
        jb.dequeue(&mut out);
        jb.dequeue(&mut out);
        assert!(!jb.dequeue(&mut out));
    }

    #[test]
    fn clear_resets_to_buffering_and_empty() {
        let jb = JitterBuffer::new();
        jb.enqueue(1, b"a");
        jb.enqueue(2, b"b");
        jb.enqueue(3, b"c");
        assert!(!jb.is_buffering());
        jb.clear();
        assert!(jb.is_buffering());
        assert_eq!(jb.count(), 0);
    }

    #[test]
    fn overflow_drops_oldest_and_caps_at_capacity() {
        let jb = JitterBuffer::new();
        let mut dropped = 0;
        for i in 0..25u16 {
            if jb.enqueue(i, &i.to_be_bytes()) {
                dropped += 1;
            }
        }
        assert_eq!(jb.count(), CAPACITY);
        assert_eq!(dropped, 5);

        // The remaining 20 are the most recent 20, in order: seqnums 5..=24.
        let mut out = Vec::new();
        for expected in 5u16..25 {
            assert!(jb.dequeue(&mut out));
            assert_eq!(out, expected.to_be_bytes());
        }
    }

    #[test]
    fn adaptive_interval_thresholds() {
        assert_eq!(adaptive_interval_ms(100), 32);
        assert_eq!(adaptive_interval_ms(81), 32);
        assert_eq!(adaptive_interval_ms(80), 33);
        assert_eq!(adaptive_interval_ms(70), 33);
        assert_eq!(adaptive_interval_ms(69), 34);
        assert_eq!(adaptive_interval_ms(0), 34);
    }

    #[test]
    fn eof_detector_fires_after_threshold_empty_reads_at_zero_fill() {
        let mut detector = EofDetector::new();
        let mut ended = false;
        for _ in 0..EOF_EMPTY_THRESHOLD + 1 {
            ended = detector.observe(false, 0);
        }
        assert!(ended);
    }

    #[test]
    fn eof_detector_resets_on_any_frame_or_nonzero_fill() {
        let mut detector = EofDetector::new();
        for _ in 0..20 {
            detector.observe(false, 0);
        }
        assert!(!detector.observe(true, 0));
        for _ in 0..20 {
            detector.observe(false, 0);
        }
        assert!(!detector.observe(false, 5));
    }
}
