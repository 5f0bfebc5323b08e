//! Command encoding: INIT, SWITCHRES, BLIT, AUDIO, CLOSE.

use crate::raster::Modeline;

/// Command byte identifiers, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    Init = 1,
    Switchres = 2,
    Blit = 3,
    Audio = 4,
    Close = 5,
}

impl CommandId {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Init),
            2 => Some(Self::Switchres),
            3 => Some(Self::Blit),
            4 => Some(Self::Audio),
            5 => Some(Self::Close),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Compression mode requested at INIT time and echoed on each BLIT's
/// `lz4_size` framing. Values match the order the FPGA firmware expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz4Mode {
    Off = 0,
    Lz4 = 1,
    Lz4Delta = 2,
    Lz4Hc = 3,
    Lz4HcDelta = 4,
    Adaptive = 5,
    AdaptiveDelta = 6,
}

impl Lz4Mode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_delta(self) -> bool {
        matches!(self, Self::Lz4Delta | Self::Lz4HcDelta | Self::AdaptiveDelta)
    }

    pub fn is_adaptive(self) -> bool {
        matches!(self, Self::Adaptive | Self::AdaptiveDelta)
    }

    pub fn is_hc(self) -> bool {
        matches!(self, Self::Lz4Hc | Self::Lz4HcDelta)
    }
}

/// Encodes an INIT command payload: mtu u16, rgb_mode u8, sound_rate u8,
/// sound_channels u8, lz4_mode u8.
pub fn encode_init(mtu: u16, rgb_mode: u8, sound_rate: u8, sound_channels: u8, lz4_mode: Lz4Mode) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 6);
    out.push(CommandId::Init.as_byte());
    out.extend_from_slice(&mtu.to_le_bytes());
    out.push(rgb_mode);
    out.push(sound_rate);
    out.push(sound_channels);
    out.push(lz4_mode.as_byte());
    out
}

/// Encodes a SWITCHRES command payload from a [`Modeline`].
///
/// The `interlaced` byte trails the packet directly: unlike the in-memory
/// modeline struct this protocol originated from, the wire form carries no
/// alignment padding after it.
pub fn encode_switchres(m: &Modeline) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 8 + 8 * 2 + 1);
    out.push(CommandId::Switchres.as_byte());
    out.extend_from_slice(&m.pixel_clock.to_le_bytes());
    out.extend_from_slice(&m.h_active.to_le_bytes());
    out.extend_from_slice(&m.h_begin.to_le_bytes());
    out.extend_from_slice(&m.h_end.to_le_bytes());
    out.extend_from_slice(&m.h_total.to_le_bytes());
    out.extend_from_slice(&m.v_active.to_le_bytes());
    out.extend_from_slice(&m.v_begin.to_le_bytes());
    out.extend_from_slice(&m.v_end.to_le_bytes());
    out.extend_from_slice(&m.v_total.to_le_bytes());
    out.push(m.interlaced as u8);
    out
}

/// Encodes the fixed BLIT header: frame u32, vsync_line u16, lz4_size u32,
/// field u8. Does not include the leading command byte: the packetizer
/// prepends it (and, for later chunks, the continuation id) itself.
pub fn encode_blit_header(frame: u32, vsync_line: u16, lz4_size: u32, field: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 2 + 4 + 1);
    out.extend_from_slice(&frame.to_le_bytes());
    out.extend_from_slice(&vsync_line.to_le_bytes());
    out.extend_from_slice(&lz4_size.to_le_bytes());
    out.push(field);
    out
}

/// Encodes the fixed AUDIO header: sample_bytes u32. Does not include the
/// leading command byte, for the same reason as [`encode_blit_header`].
pub fn encode_audio_header(sample_bytes: u32) -> Vec<u8> {
    sample_bytes.to_le_bytes().to_vec()
}

/// Encodes the empty CLOSE command.
pub fn encode_close() -> Vec<u8> {
    vec![CommandId::Close.as_byte()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_round_trip_layout() {
        let bytes = encode_init(1472, 24, 3, 2, Lz4Mode::Lz4Delta);
        assert_eq!(bytes[0], CommandId::Init.as_byte());
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 1472);
        assert_eq!(bytes[3], 24);
        assert_eq!(bytes[4], 3);
        assert_eq!(bytes[5], 2);
        assert_eq!(bytes[6], Lz4Mode::Lz4Delta.as_byte());
    }

    #[test]
    fn switchres_layout_has_no_padding_after_interlaced() {
        let m = Modeline {
            pixel_clock: 25.175,
            h_active: 640,
            h_begin: 656,
            h_end: 752,
            h_total: 800,
            v_active: 480,
            v_begin: 490,
            v_end: 492,
            v_total: 525,
            interlaced: false,
        };
        let bytes = encode_switchres(&m);
        // command byte + f64 + 8*u16 + u8, no trailing padding
        assert_eq!(bytes.len(), 1 + 8 + 16 + 1);
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn command_id_from_byte_rejects_unknown() {
        assert!(CommandId::from_byte(0).is_none());
        assert!(CommandId::from_byte(6).is_none());
        assert_eq!(CommandId::from_byte(3), Some(CommandId::Blit));
    }
}
