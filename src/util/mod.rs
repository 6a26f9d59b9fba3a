//! Utility Functions Module
//!
//! Small helpers shared by the protocol engines and the demos: hardware
//! address formatting, the MAC-derived random seed, and a TLV dump for
//! debugging LLDP frames.
//!
//! # Example
//!
//! ```
//! use picostack_rs::util::{format_mac, parse_mac};
//!
//! let mac = parse_mac("00:04:a3:12:34:56").unwrap();
//! assert_eq!(format_mac(&mac), "00:04:A3:12:34:56");
//! ```

#[cfg(not(feature = "std"))]
use alloc::{format, string::String};

use core::fmt::Write;

use crate::tlv::{constants::TLV_HEADER_SIZE, TlvHeader, TlvType};
use crate::transport::FrameReader;

pub mod code_point;

/// Feedback taps for x^8 + x^6 + x^5 + x^4 + 1
const LFSR_TAPS: u8 = 0xB8;

/// One step of an 8-bit Galois LFSR
pub fn lfsr8(value: u8) -> u8 {
    let shifted = value >> 1;
    if value & 0x01 != 0 {
        shifted ^ LFSR_TAPS
    } else {
        shifted
    }
}

/// Random seed derived from the NIC-specific bytes of a MAC address
///
/// The vendor prefix is skipped; each of the last four bytes goes through
/// one LFSR step and they are packed big-endian.
pub fn mac_seed(mac: &[u8; 6]) -> u64 {
    let seed = mac[2..]
        .iter()
        .fold(0u32, |seed, byte| (seed << 8) | u32::from(lfsr8(*byte)));
    u64::from(seed)
}

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated) into a MAC address
pub fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(|c| c == ':' || c == '-');
    for byte in mac.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// One line per TLV of an LLDPDU: type name, length and payload in hex.
///
/// Bytes after the end marker, or a TLV running past the frame, are shown as
/// a raw hex tail.
pub fn tlv_dump(frame: &[u8], prefix: &str) -> String {
    let mut out = String::new();
    let mut reader = FrameReader::new(frame);

    while reader.remaining() >= TLV_HEADER_SIZE {
        let start = reader.byte_count();
        let Ok(header) = TlvHeader::read(&mut reader) else {
            break;
        };
        let Ok(value) = reader.read_block(usize::from(header.length)) else {
            reader = FrameReader::new(&frame[start..]);
            break;
        };
        let _ = writeln!(
            out,
            "{}{:04}: {} [{}] {}",
            prefix,
            start,
            header.kind(),
            header.length,
            hex::encode_upper(value)
        );
        if header.kind() == TlvType::EndOfLldpdu {
            break;
        }
    }

    if reader.remaining() > 0 {
        let rest = &reader.frame()[reader.byte_count()..];
        let _ = writeln!(out, "{}tail: {}", prefix, hex::encode_upper(rest));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lfsr_step() {
        assert_eq!(lfsr8(0x02), 0x01);
        assert_eq!(lfsr8(0x01), 0xB8);
        assert_eq!(lfsr8(0x00), 0x00);
    }

    #[test]
    fn test_mac_seed_ignores_vendor_prefix() {
        let a = mac_seed(&[0x00, 0x04, 0x10, 0x20, 0x30, 0x40]);
        let b = mac_seed(&[0xAA, 0xBB, 0x10, 0x20, 0x30, 0x40]);
        assert_eq!(a, b);
        assert_eq!(a, 0x0810_1820);
        assert_ne!(a, mac_seed(&[0x00, 0x04, 0x10, 0x20, 0x30, 0x41]));
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(
            parse_mac("00-04-A3-12-34-56"),
            Some([0x00, 0x04, 0xA3, 0x12, 0x34, 0x56])
        );
        assert_eq!(parse_mac("00:04:a3:12:34"), None);
        assert_eq!(parse_mac("00:04:a3:12:34:56:78"), None);
        assert_eq!(parse_mac("00:04:a3:12:34:zz"), None);
        assert_eq!(parse_mac("0:04:a3:12:34:56"), None);
    }

    #[test]
    fn test_tlv_dump() {
        let frame = [0x06, 0x02, 0x00, 0x78, 0x00, 0x00, 0xAA, 0xBB];
        let dump = tlv_dump(&frame, "> ");
        assert_eq!(
            dump,
            "> 0000: TimeToLive [2] 0078\n> 0004: EndOfLldpdu [0] \n> tail: AABB\n"
        );
    }

    #[test]
    fn test_tlv_dump_overrun() {
        // Chassis ID claims 7 bytes but only 2 follow
        let dump = tlv_dump(&[0x02, 0x07, 0x04, 0x00], "");
        assert_eq!(dump, "tail: 02070400\n");
    }
}
