#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod dns;
pub mod lldp;
pub mod ntp;
pub mod stack;
pub mod tftp;
pub mod tlv;
pub mod transport;
pub mod util;

// Re-export main types without glob imports to avoid conflicts
pub use dns::{DnsClient, DnsConfig, DnsError};
pub use lldp::{AdminStatus, LldpAgent, LldpConfig, LldpError};
pub use ntp::{NtpClient, NtpConfig, NtpError};
pub use stack::{NetStack, StackConfig, StackError};
pub use tftp::{TftpClient, TftpConfig, TftpError, TftpSink};
pub use tlv::{TlvError, TlvHeader, TlvType};
pub use transport::{Endpoint, FrameReader, FrameWriter, Transport, TransportError};

#[cfg(feature = "std")]
extern crate std;

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(test)]
mod tests {
    use crate::lldp::constants::LLDP_ETHER_TYPE;
    use crate::{AdminStatus, DnsError, TlvHeader, TlvType};

    #[cfg(not(feature = "std"))]
    use alloc::format;

    #[test]
    fn test_no_std_types() {
        // Test that our types work in both std and no-std environments
        let header = TlvHeader::new(TlvType::TimeToLive.into(), 2).unwrap();
        assert_eq!(header.encode(), 0x0602);
        assert_eq!(AdminStatus::RxTx as u8, 3);
        assert_eq!(LLDP_ETHER_TYPE, 0x88CC);
    }

    #[test]
    fn test_error_formatting() {
        let err = DnsError::Truncated;
        // In no-std, we can still format errors
        assert_eq!(format!("{}", err), "DNS message truncated");
    }
}
