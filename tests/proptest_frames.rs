use std::net::Ipv4Addr;

use proptest::prelude::*;

use picostack_rs::dns::{self, DnsClient, DnsConfig};
use picostack_rs::lldp::constants::{CISCO_OUI, IEEE802_3_OUI, TIA_OUI};
use picostack_rs::lldp::{AdminStatus, LldpAgent, LldpConfig};
use picostack_rs::ntp::{NtpClient, NtpConfig};
use picostack_rs::tlv::TlvHeader;
use picostack_rs::transport::{FrameReader, MemoryTransport};

const MAC: [u8; 6] = [0x00, 0x04, 0xA3, 0x12, 0x34, 0x56];

fn rx_agent() -> LldpAgent {
    LldpAgent::new(LldpConfig {
        admin_status: AdminStatus::RxOnly,
        ..Default::default()
    })
}

/// Chassis ID, port ID and TTL TLVs in order
fn mandatory_tlvs() -> Vec<u8> {
    vec![
        0x02, 0x07, 0x04, 0x00, 0x04, 0xA3, 0x12, 0x34, 0x56, // chassis, MAC subtype
        0x04, 0x03, 0x05, b'G', b'i', // port, interface name subtype
        0x06, 0x02, 0x00, 0x78, // TTL 120
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(5000))]

    #[test]
    fn tlv_header_preserves_type_and_length(tlv_type in 0u8..=127, length in 0usize..=511) {
        let header = TlvHeader::new(tlv_type, length).unwrap();
        let decoded = TlvHeader::decode(header.encode());
        prop_assert_eq!(decoded.tlv_type, tlv_type);
        prop_assert_eq!(usize::from(decoded.length), length);
    }

    #[test]
    fn tlv_header_rejects_oversized_fields(tlv_type in 128u8..=255, length in 512usize..4096) {
        prop_assert!(TlvHeader::new(tlv_type, 0).is_err());
        prop_assert!(TlvHeader::new(0, length).is_err());
    }

    #[test]
    fn lldp_rx_never_panics_on_arbitrary_bytes(data: Vec<u8>) {
        let mut agent = rx_agent();
        let _ = agent.process_frame(&mut FrameReader::new(&data));
    }

    #[test]
    fn lldp_rx_never_panics_after_valid_identity(
        tail in prop::collection::vec(any::<u8>(), 0..256)
    ) {
        let mut agent = rx_agent();
        let mut frame = mandatory_tlvs();
        frame.extend_from_slice(&tail);
        let _ = agent.process_frame(&mut FrameReader::new(&frame));
    }

    #[test]
    fn lldp_rx_never_panics_on_random_org_tlvs(
        oui in 0u32..0x0100_0000,
        subtype in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..64)
    ) {
        prop_assume!(![IEEE802_3_OUI, TIA_OUI, CISCO_OUI].contains(&oui));
        let mut agent = rx_agent();
        let mut frame = mandatory_tlvs();
        let header = TlvHeader::new(127, payload.len() + 4).unwrap();
        frame.extend_from_slice(&header.encode().to_be_bytes());
        frame.extend_from_slice(&oui.to_be_bytes()[1..]);
        frame.push(subtype);
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&[0x00, 0x00]);
        prop_assert!(agent.process_frame(&mut FrameReader::new(&frame)).is_ok());
        prop_assert!(agent.remote().is_some());
    }

    #[test]
    fn dns_name_decode_never_panics(data: Vec<u8>, start in 0usize..600) {
        let _ = dns::decode_name(&data, start);
    }

    #[test]
    fn dns_response_never_panics_on_arbitrary_bytes(body: Vec<u8>) {
        let mut transport = MemoryTransport::new(MAC, Ipv4Addr::new(10, 0, 0, 2));
        let mut client: DnsClient = DnsClient::new(
            DnsConfig {
                server: Ipv4Addr::new(10, 0, 0, 1),
                ..Default::default()
            },
            MAC,
        );
        let xid = client.query(&mut transport, "host.example", 0).unwrap();

        // Valid header for the pending transaction, then random records
        let mut message = Vec::new();
        message.extend_from_slice(&xid.to_be_bytes());
        message.extend_from_slice(&[0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
        message.extend_from_slice(&body);
        let _ = client.handle_response(&mut FrameReader::new(&message), 1);
    }

    #[test]
    fn ntp_response_never_panics(data: Vec<u8>) {
        let mut client = NtpClient::new(NtpConfig::default());
        let _ = client.handle_response(&mut FrameReader::new(&data));
    }
}
