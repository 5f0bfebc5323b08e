//! ACK frame decoding.
//!
//! The FPGA reports its raster and VRAM state as a fixed 41-byte little-
//! endian frame. Bytes 20..40 are reserved for future telemetry and
//! ignored.

pub const ACK_FRAME_SIZE: usize = 41;

/// A decoded ACK snapshot from the FPGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckSnapshot {
    pub frame: u32,
    pub frame_echo: u32,
    pub vcount: u16,
    pub vcount_echo: u16,
    pub vram_ready: u8,
    pub vram_end_frame: u8,
    pub vram_synced: u8,
    pub vga_frameskip: u8,
    pub vga_vblank: u8,
    pub vga_f1: u8,
    pub audio_active: u8,
    pub vram_queue: u8,
}

impl AckSnapshot {
    /// Parses a raw datagram into an [`AckSnapshot`]. Returns `None` if the
    /// packet is shorter than the fixed ACK frame size; the caller drops
    /// such packets silently.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ACK_FRAME_SIZE {
            return None;
        }

        Some(Self {
            frame: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            frame_echo: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            vcount: u16::from_le_bytes([data[8], data[9]]),
            vcount_echo: u16::from_le_bytes([data[10], data[11]]),
            vram_ready: data[12],
            vram_end_frame: data[13],
            vram_synced: data[14],
            vga_frameskip: data[15],
            vga_vblank: data[16],
            vga_f1: data[17],
            audio_active: data[18],
            vram_queue: data[19],
        })
    }

    /// Re-encodes this snapshot as a 41-byte ACK frame with the reserved
    /// tail zeroed. Exists mainly for round-trip testing against the wire
    /// format; production code never needs to emit an ACK frame itself.
    pub fn to_bytes(&self) -> [u8; ACK_FRAME_SIZE] {
        let mut out = [0u8; ACK_FRAME_SIZE];
        out[0..4].copy_from_slice(&self.frame.to_le_bytes());
        out[4..8].copy_from_slice(&self.frame_echo.to_le_bytes());
        out[8..10].copy_from_slice(&self.vcount.to_le_bytes());
        out[10..12].copy_from_slice(&self.vcount_echo.to_le_bytes());
        out[12] = self.vram_ready;
        out[13] = self.vram_end_frame;
        out[14] = self.vram_synced;
        out[15] = self.vga_frameskip;
        out[16] = self.vga_vblank;
        out[17] = self.vga_f1;
        out[18] = self.audio_active;
        out[19] = self.vram_queue;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AckSnapshot {
        AckSnapshot {
            frame: 1,
            frame_echo: 1,
            vcount: 150,
            vcount_echo: 400,
            vram_ready: 1,
            vram_end_frame: 0,
            vram_synced: 1,
            vga_frameskip: 0,
            vga_vblank: 0,
            vga_f1: 0,
            audio_active: 1,
            vram_queue: 2,
        }
    }

    #[test]
    fn round_trip() {
        let ack = sample();
        let bytes = ack.to_bytes();
        assert_eq!(bytes.len(), ACK_FRAME_SIZE);
        let parsed = AckSnapshot::parse(&bytes).unwrap();
        assert_eq!(parsed, ack);
    }

    #[test]
    fn short_packet_is_dropped() {
        let bytes = [0u8; ACK_FRAME_SIZE - 1];
        assert!(AckSnapshot::parse(&bytes).is_none());
    }

    #[test]
    fn reserved_tail_is_ignored() {
        let ack = sample();
        let mut bytes = ack.to_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA; 8]); // extra trailing noise, still valid
        let parsed = AckSnapshot::parse(&bytes).unwrap();
        assert_eq!(parsed, ack);
    }
}
