//! Slices a (header || body) stream into MTU-bounded datagrams.
//!
//! The first datagram carries the full command header (command id plus
//! the command's fixed fields) and as much of the body as fits. Further
//! datagrams, when the body doesn't fit in one packet, carry a
//! continuation id and a 1-byte chunk ordinal that increments per chunk of
//! the same frame; the advertised payload size tells the receiver how
//! many continuation chunks to expect, so no explicit terminator is sent.
//!
//! BLIT continuations use `CONT_BLIT`, AUDIO continuations use
//! `CONT_AUDIO` — the source protocol documents only that a "continuation
//! id" exists, not its value, so these are fixed here as the high-bit
//! variants of their base command ids.

use crate::wire::CommandId;

pub const CONT_BLIT: u8 = 0x80 | CommandId::Blit as u8;
pub const CONT_AUDIO: u8 = 0x80 | CommandId::Audio as u8;

/// Packs `header || body` into datagrams no larger than `mtu` bytes.
/// `continuation_id` is the byte used to tag chunks after the first.
///
/// Panics if `mtu` is too small to fit even the header in one datagram;
/// callers validate MTU against the header size before calling this.
pub fn chunk(command_id: u8, continuation_id: u8, header: &[u8], body: &[u8], mtu: usize) -> Vec<Vec<u8>> {
    assert!(mtu > header.len(), "mtu too small for command header");

    let mut packets = Vec::new();

    let first_body_cap = mtu - 1 - header.len();
    let first_len = body.len().min(first_body_cap);
    let mut first = Vec::with_capacity(1 + header.len() + first_len);
    first.push(command_id);
    first.extend_from_slice(header);
    first.extend_from_slice(&body[..first_len]);
    packets.push(first);

    let mut offset = first_len;
    let mut ordinal: u8 = 1;
    let cont_cap = mtu.saturating_sub(2);
    assert!(cont_cap > 0, "mtu too small for continuation chunks");

    while offset < body.len() {
        let end = (offset + cont_cap).min(body.len());
        let mut packet = Vec::with_capacity(2 + (end - offset));
        packet.push(continuation_id);
        packet.push(ordinal);
        packet.extend_from_slice(&body[offset..end]);
        packets.push(packet);

        offset = end;
        ordinal = ordinal.wrapping_add(1);
    }

    packets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_fitting_in_one_chunk_produces_single_packet() {
        let header = [0u8; 4];
        let body = vec![7u8; 10];
        let mtu = 1 + header.len() + body.len();
        let packets = chunk(3, CONT_BLIT, &header, &body, mtu);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], 3);
    }

    #[test]
    fn payload_exactly_mtu_is_single_chunk() {
        let header: [u8; 0] = [];
        let mtu = 100;
        let body = vec![1u8; mtu - 1];
        let packets = chunk(3, CONT_BLIT, &header, &body, mtu);
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn payload_mtu_plus_one_is_two_chunks_with_ordinals_0_and_1() {
        let header: [u8; 0] = [];
        let mtu = 100;
        let body = vec![1u8; mtu]; // one byte over what fits in the first packet
        let packets = chunk(3, CONT_BLIT, &header, &body, mtu);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0][0], 3);
        assert_eq!(packets[1][0], CONT_BLIT);
        assert_eq!(packets[1][1], 1);
    }

    #[test]
    fn every_packet_respects_mtu() {
        let header = [1u8, 2, 3, 4];
        let body = vec![9u8; 5000];
        let mtu = 1472;
        let packets = chunk(3, CONT_BLIT, &header, &body, mtu);
        for p in &packets {
            assert!(p.len() <= mtu);
        }
        assert!(packets.len() > 1);
    }

    #[test]
    fn ordinals_increment_per_chunk() {
        let header: [u8; 0] = [];
        let body = vec![0u8; 300];
        let mtu = 100;
        let packets = chunk(4, CONT_AUDIO, &header, &body, mtu);
        for (i, p) in packets.iter().enumerate().skip(1) {
            assert_eq!(p[1], i as u8);
        }
    }
}
