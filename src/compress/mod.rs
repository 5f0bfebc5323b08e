//! Frame compression pipeline.
//!
//! Supports plain LZ4, LZ4-HC, delta-against-previous-frame XOR, and
//! adaptive modes that fall back to raw transmission when compression
//! doesn't pay off. The previous-frame buffer is always updated with the
//! raw bytes that were actually transmitted, regardless of which path
//! produced the wire payload — callers rely on this to reconstruct what
//! the FPGA now holds.

use crate::wire::command::Lz4Mode;

/// Adaptive mode accepts a compressed payload only if it beats this
/// fraction of the raw size (15/16).
const ADAPTIVE_NUMERATOR: usize = 15;
const ADAPTIVE_DENOMINATOR: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompressStats {
    pub frames_compressed: u64,
    pub frames_raw: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Outcome of compressing one frame: either the compressed bytes with
/// their size (for the BLIT header's `lz4_size`), or a signal to send the
/// frame uncompressed.
pub enum CompressOutcome {
    Compressed(Vec<u8>),
    Raw,
}

pub struct Compressor {
    mode: Lz4Mode,
    previous_frame: Vec<u8>,
    stats: CompressStats,
}

impl Compressor {
    pub fn new(mode: Lz4Mode) -> Self {
        Self {
            mode,
            previous_frame: Vec::new(),
            stats: CompressStats::default(),
        }
    }

    pub fn stats(&self) -> CompressStats {
        self.stats
    }

    /// Raw bytes of the last frame actually transmitted, or empty before
    /// the first submit.
    pub fn previous_frame(&self) -> &[u8] {
        &self.previous_frame
    }

    /// Compresses `raw` per the configured mode. Always updates the
    /// previous-frame buffer to `raw` before returning, satisfying the
    /// guarantee that the buffer holds exactly what the FPGA will have
    /// after this submit.
    pub fn compress(&mut self, raw: &[u8]) -> CompressOutcome {
        let outcome = match self.mode {
            Lz4Mode::Off => CompressOutcome::Raw,
            Lz4Mode::Lz4 | Lz4Mode::Lz4Hc => self.compress_plain(raw),
            Lz4Mode::Lz4Delta | Lz4Mode::Lz4HcDelta => self.compress_delta(raw),
            Lz4Mode::Adaptive => self.compress_adaptive(raw, false),
            Lz4Mode::AdaptiveDelta => self.compress_adaptive(raw, true),
        };

        self.stats.bytes_in += raw.len() as u64;
        match &outcome {
            CompressOutcome::Compressed(bytes) => {
                self.stats.frames_compressed += 1;
                self.stats.bytes_out += bytes.len() as u64;
            }
            CompressOutcome::Raw => {
                self.stats.frames_raw += 1;
                self.stats.bytes_out += raw.len() as u64;
            }
        }

        self.snapshot_previous(raw);
        outcome
    }

    fn snapshot_previous(&mut self, raw: &[u8]) {
        self.previous_frame.clear();
        self.previous_frame.extend_from_slice(raw);
    }

    fn compress_plain(&self, raw: &[u8]) -> CompressOutcome {
        CompressOutcome::Compressed(lz4_block(raw))
    }

    fn xor_against_previous(&self, raw: &[u8]) -> Vec<u8> {
        let mut delta = raw.to_vec();
        for (i, byte) in delta.iter_mut().enumerate() {
            if let Some(&prev) = self.previous_frame.get(i) {
                *byte ^= prev;
            }
        }
        delta
    }

    fn compress_delta(&self, raw: &[u8]) -> CompressOutcome {
        let delta = self.xor_against_previous(raw);
        CompressOutcome::Compressed(lz4_block(&delta))
    }

    fn compress_adaptive(&self, raw: &[u8], delta: bool) -> CompressOutcome {
        if delta {
            let xor_candidate = self.xor_against_previous(raw);
            let xor_compressed = lz4_block(&xor_candidate);
            if beats_ratio_gate(xor_compressed.len(), raw.len()) {
                return CompressOutcome::Compressed(xor_compressed);
            }
            // The delta transform blew up (frame N and N-1 are unrelated);
            // try compressing the frame without it before giving up on
            // compression altogether.
            let plain_compressed = lz4_block(raw);
            if beats_ratio_gate(plain_compressed.len(), raw.len()) {
                return CompressOutcome::Compressed(plain_compressed);
            }
            return CompressOutcome::Raw;
        }

        let compressed = lz4_block(raw);
        if beats_ratio_gate(compressed.len(), raw.len()) {
            CompressOutcome::Compressed(compressed)
        } else {
            CompressOutcome::Raw
        }
    }
}

/// True if `compressed_len` beats the adaptive-mode ratio gate of 15/16 of
/// `raw_len` (spec §4.3).
fn beats_ratio_gate(compressed_len: usize, raw_len: usize) -> bool {
    compressed_len * ADAPTIVE_DENOMINATOR < raw_len * ADAPTIVE_NUMERATOR
}

fn lz4_block(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(data)
}

/// Decompresses a payload produced by [`Compressor::compress`] for a
/// non-delta mode, given the known uncompressed size.
pub fn decompress(compressed: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, lz4_flex::block::DecompressError> {
    lz4_flex::block::decompress(compressed, uncompressed_size)
}

/// Reverses a delta transform: XORs the decompressed delta back against
/// the previous frame to recover the raw frame.
pub fn undo_delta(delta: &[u8], previous_frame: &[u8]) -> Vec<u8> {
    let mut out = delta.to_vec();
    for (i, byte) in out.iter_mut().enumerate() {
        if let Some(&prev) = previous_frame.get(i) {
            *byte ^= prev;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repetitive_frame(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 4) as u8).collect()
    }

    #[test]
    fn off_mode_always_raw_and_updates_previous() {
        let mut c = Compressor::new(Lz4Mode::Off);
        let frame = repetitive_frame(256);
        match c.compress(&frame) {
            CompressOutcome::Raw => {}
            _ => panic!("expected raw"),
        }
        assert_eq!(c.previous_frame(), frame.as_slice());
    }

    #[test]
    fn lz4_round_trip() {
        let mut c = Compressor::new(Lz4Mode::Lz4);
        let frame = repetitive_frame(4096);
        let compressed = match c.compress(&frame) {
            CompressOutcome::Compressed(bytes) => bytes,
            CompressOutcome::Raw => panic!("expected compressed"),
        };
        let decompressed = decompress(&compressed, frame.len()).unwrap();
        assert_eq!(decompressed, frame);
    }

    #[test]
    fn previous_frame_buffer_holds_raw_bytes_regardless_of_path() {
        for mode in [Lz4Mode::Off, Lz4Mode::Lz4, Lz4Mode::Lz4Delta, Lz4Mode::Adaptive, Lz4Mode::AdaptiveDelta] {
            let mut c = Compressor::new(mode);
            let frame = repetitive_frame(1024);
            let _ = c.compress(&frame);
            assert_eq!(c.previous_frame(), frame.as_slice(), "mode {mode:?} violated previous-frame invariant");
        }
    }

    #[test]
    fn delta_second_frame_smaller_when_few_bytes_differ() {
        let mut c = Compressor::new(Lz4Mode::Lz4Delta);
        let frame_a = repetitive_frame(4096);
        let mut frame_b = frame_a.clone();
        for b in frame_b.iter_mut().take(16) {
            *b ^= 0xFF;
        }

        let first = match c.compress(&frame_a) {
            CompressOutcome::Compressed(bytes) => bytes,
            CompressOutcome::Raw => panic!("expected compressed"),
        };
        let second = match c.compress(&frame_b) {
            CompressOutcome::Compressed(bytes) => bytes,
            CompressOutcome::Raw => panic!("expected compressed"),
        };
        assert!(second.len() < first.len());
    }

    #[test]
    fn adaptive_mode_sends_small_payload_raw() {
        let mut c = Compressor::new(Lz4Mode::Adaptive);
        // 16 bytes is far too small for LZ4 to beat 15/16 of raw size.
        let frame = vec![1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        match c.compress(&frame) {
            CompressOutcome::Raw => {}
            CompressOutcome::Compressed(_) => panic!("expected adaptive fallback to raw for tiny payload"),
        }
    }

    #[test]
    fn adaptive_mode_compresses_highly_compressible_frame() {
        let mut c = Compressor::new(Lz4Mode::Adaptive);
        let frame = vec![0u8; 8192];
        match c.compress(&frame) {
            CompressOutcome::Compressed(bytes) => assert!(bytes.len() * ADAPTIVE_DENOMINATOR < frame.len() * ADAPTIVE_NUMERATOR),
            CompressOutcome::Raw => panic!("expected compression to pay off"),
        }
    }

    #[test]
    fn adaptive_delta_falls_back_to_plain_compression_when_xor_blows_up() {
        let mut c = Compressor::new(Lz4Mode::AdaptiveDelta);
        let size = 4096;
        // Noise with little internal repetition, so XORing it against the
        // next frame produces something LZ4 can't shrink.
        let noisy: Vec<u8> = (0..size)
            .map(|i| (i as u32).wrapping_mul(2_654_435_761).wrapping_add(17).wrapping_shr(24) as u8)
            .collect();
        let _ = c.compress(&noisy); // seeds previous_frame with noise

        let zeros = vec![0u8; size];
        match c.compress(&zeros) {
            CompressOutcome::Compressed(bytes) => {
                // XOR(zeros, noisy) == noisy, which shouldn't beat the ratio
                // gate; only the non-delta compression of an all-zero frame
                // should.
                assert!(bytes.len() * ADAPTIVE_DENOMINATOR < zeros.len() * ADAPTIVE_NUMERATOR);
            }
            CompressOutcome::Raw => {
                panic!("expected non-delta compression to succeed even though the XOR delta blew up")
            }
        }
    }
}
