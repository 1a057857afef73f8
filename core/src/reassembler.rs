//! [`Reassembler`]: stitches fragments back into frames, detecting loss and
//! duplicates (§4.7). One [`PartialFrame`] slot per session — this system
//! assumes a single in-flight media stream per client.

use parking_lot::Mutex;

use crate::error::Result;
use crate::jitter::JitterBuffer;
use crate::media::{fragment, rtp};
use crate::stats::RtpStats;

struct PartialFrame {
    data: Vec<u8>,
    total_frags: u32,
    frags_received: u32,
    bitmap: u32,
    seqnum: u16,
    in_progress: bool,
}

impl Default for PartialFrame {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total_frags: 0,
            frags_received: 0,
            bitmap: 0,
            seqnum: 0,
            in_progress: false,
        }
    }
}

/// Reconstructs frames from a stream of incoming RTP+fragment datagrams.
/// Not thread-safe by itself — intended to be driven by the single UDP
/// receive listener thread (§5).
#[derive(Default)]
pub struct Reassembler {
    partial: PartialFrame,
}

impl Reassembler {
    /// A fresh reassembler with no frame in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one received datagram: update `stats`, and on completing (or
    /// receiving unfragmented) a frame, enqueue it into `jitter`.
    pub fn process_packet(
        &mut self,
        datagram: &[u8],
        stats: &Mutex<RtpStats>,
        jitter: &JitterBuffer,
    ) -> Result<()> {
        let (header, payload) = rtp::decode(datagram)?;
        stats.lock().record_packet(header.sequence_number);

        if payload.len() >= 2 && payload[0] == 0xFF && payload[1] == 0xD8 {
            if self.partial.in_progress {
                self.abandon_partial(stats);
            }
            self.deliver(header.sequence_number, payload, stats, jitter);
            return Ok(());
        }

        let frag_header = fragment::decode(payload)?;
        let frag_payload = &payload[fragment::HEADER_LEN..];

        if frag_header.is_first()
            && (!self.partial.in_progress || self.partial.seqnum != header.sequence_number)
        {
            if self.partial.in_progress {
                self.abandon_partial(stats);
            }
            self.partial = PartialFrame {
                data: vec![0u8; frag_header.total_frame_size as usize],
                total_frags: frag_header.total_fragments as u32,
                frags_received: 0,
                bitmap: 0,
                seqnum: header.sequence_number,
                in_progress: true,
            };
        }

        if !self.partial.in_progress || self.partial.seqnum != header.sequence_number {
            tracing::warn!(
                seqnum = header.sequence_number,
                "fragment discarded: no matching in-progress frame"
            );
            return Ok(());
        }

        let idx = frag_header.fragment_index;
        // The presence bitmap only covers 32 fragments; frames that large are
        // outside this system's practical range, so indices beyond 31 are
        // accepted but cannot be deduplicated.
        let bit = 1u32.checked_shl(idx as u32).unwrap_or(0);
        if bit != 0 && self.partial.bitmap & bit != 0 {
            tracing::debug!(seqnum = header.sequence_number, idx, "duplicate fragment dropped");
            return Ok(());
        }

        let offset = idx as usize * fragment::MTU_PAYLOAD;
        if offset < self.partial.data.len() {
            let end = (offset + frag_payload.len()).min(self.partial.data.len());
            self.partial.data[offset..end].copy_from_slice(&frag_payload[..end - offset]);
        }
        self.partial.bitmap |= bit;
        self.partial.frags_received += 1;

        if self.partial.frags_received == self.partial.total_frags {
            let frame = std::mem::take(&mut self.partial.data);
            let seqnum = self.partial.seqnum;
            self.partial.in_progress = false;
            self.deliver(seqnum, &frame, stats, jitter);
        }

        Ok(())
    }

    fn deliver(&self, seqnum: u16, frame: &[u8], stats: &Mutex<RtpStats>, jitter: &JitterBuffer) {
        let evicted = jitter.enqueue(seqnum, frame);
        let mut s = stats.lock();
        s.record_frame_received();
        if evicted {
            s.record_frame_dropped();
        }
    }

    fn abandon_partial(&mut self, stats: &Mutex<RtpStats>) {
        self.partial.in_progress = false;
        stats.lock().record_frame_dropped();
    }
}
