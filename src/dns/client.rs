use core::net::Ipv4Addr;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::cache::DnsCache;
use super::constants::*;
use super::{read_name, write_name, DnsConfig, DnsError, DnsHeader, Result};
use crate::transport::{Endpoint, FrameReader, Transport};
use crate::util::mac_seed;

/// Caching stub resolver
///
/// `N` is the number of cache slots. Times are whole seconds from any
/// monotonic origin, supplied by the caller.
#[derive(Debug, Clone)]
pub struct DnsClient<const N: usize = DEFAULT_CACHE_SIZE> {
    config: DnsConfig,
    cache: DnsCache<N>,
    rng: SmallRng,
}

impl<const N: usize> DnsClient<N> {
    /// Create a resolver whose transaction IDs are seeded from `mac`
    pub fn new(config: DnsConfig, mac: [u8; 6]) -> Self {
        Self {
            config,
            cache: DnsCache::new(),
            rng: SmallRng::seed_from_u64(mac_seed(&mac)),
        }
    }

    pub fn config(&self) -> &DnsConfig {
        &self.config
    }

    /// Change the name server, e.g. after a DHCP renewal
    pub fn set_server(&mut self, server: Ipv4Addr) {
        self.config.server = server;
    }

    pub fn cache(&self) -> &DnsCache<N> {
        &self.cache
    }

    fn next_xid(&mut self) -> u16 {
        let a: u16 = self.rng.gen();
        let b: u16 = self.rng.gen();
        (u32::from(a).wrapping_mul(u32::from(b))) as u16
    }

    /// Send an A query for `name` and claim a cache slot for the answer.
    /// Returns the transaction ID.
    pub fn query<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        name: &str,
        now: u64,
    ) -> Result<u16> {
        super::validate_name(name)?;
        let slot = self.cache.slot_for(name).ok_or(DnsError::NoCapacity)?;
        let xid = self.next_xid();

        transport.start(&Endpoint::Udp {
            dest: self.config.server,
            src_port: self.config.port,
            dest_port: self.config.port,
        })?;
        let writer = transport.writer();
        DnsHeader::query(xid).write(writer)?;
        write_name(writer, name)?;
        writer.write_u16(TYPE_A)?;
        writer.write_u16(CLASS_IN)?;
        transport.send()?;

        self.cache.begin(slot, name, xid, now);
        log::info!("DNS query {:#06x} for {} to {}", xid, name, self.config.server);
        Ok(xid)
    }

    /// Parse a response and store its first A record.
    ///
    /// Returns the address when the response completed a pending query, and
    /// `None` when it was valid but carried no usable answer.
    pub fn handle_response(
        &mut self,
        reader: &mut FrameReader<'_>,
        now: u64,
    ) -> Result<Option<Ipv4Addr>> {
        let header = DnsHeader::read(reader)?;
        if !self.cache.has_pending_xid(header.id) {
            log::debug!("dropping DNS response {:#06x}", header.id);
            return Err(DnsError::UnknownTransaction(header.id));
        }
        if !header.is_response() {
            return Err(DnsError::Malformed("not a response"));
        }
        if header.qdcount == 0 {
            return Err(DnsError::Malformed("no question"));
        }
        if header.rcode() != 0 {
            log::debug!("DNS response {:#06x} rcode {}", header.id, header.rcode());
        }

        let question = read_name(reader)?;
        reader.dump(4)?;
        for _ in 1..header.qdcount {
            read_name(reader)?;
            reader.dump(4)?;
        }

        let mut answer = None;
        for _ in 0..header.ancount {
            read_name(reader)?;
            let rtype = reader.read_u16()?;
            let class = reader.read_u16()?;
            let ttl = reader.read_u32()?;
            let rdlength = usize::from(reader.read_u16()?);

            if rtype == TYPE_A && class == CLASS_IN && rdlength == 4 {
                answer = Some((Ipv4Addr::from(reader.read_u32()?), ttl));
                break;
            }
            log::trace!("skipping DNS record type {} ({} bytes)", rtype, rdlength);
            reader.dump(rdlength)?;
        }

        let Some((address, ttl)) = answer else {
            log::debug!("DNS response for {} has no A record", question);
            return Ok(None);
        };

        if self.cache.complete(&question, header.id, address, ttl, now) {
            log::info!("resolved {} to {} (ttl {})", question, address, ttl);
            Ok(Some(address))
        } else {
            log::debug!("no pending query for {} with ID {:#06x}", question, header.id);
            Ok(None)
        }
    }

    /// Cached address for `name`. On a miss a query is sent unless one is
    /// already outstanding, and `None` is returned; poll again later.
    pub fn lookup<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        name: &str,
        now: u64,
    ) -> Option<Ipv4Addr> {
        if let Some(address) = self.cache.get(name, now) {
            log::debug!("DNS found {} in cache: {}", name, address);
            return Some(address);
        }

        if !self.cache.is_pending(name) {
            if let Err(e) = self.query(transport, name, now) {
                log::warn!("DNS query for {} failed: {}", name, e);
            }
        }
        None
    }

    /// Forget timed-out queries and expired answers
    pub fn sweep(&mut self, now: u64) -> usize {
        self.cache.sweep(now, self.config.query_timeout)
    }
}
