//! Fixed-capacity name to address cache.

use core::net::Ipv4Addr;

#[cfg(not(feature = "std"))]
use alloc::string::String;

use super::constants::{DEFAULT_CACHE_SIZE, MIN_CACHE_TTL};

/// State of one cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryState {
    #[default]
    Empty,
    /// A query is outstanding for the slot's name
    Pending { xid: u16, issued_at: u64 },
    /// Answer received, usable until `ttl` seconds after insertion
    Valid { address: Ipv4Addr, ttl: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheEntry {
    pub name: String,
    pub state: EntryState,
    /// Second at which the slot was last claimed or filled
    pub inserted_at: u64,
}

impl CacheEntry {
    fn matches(&self, name: &str) -> bool {
        self.state != EntryState::Empty && self.name.eq_ignore_ascii_case(name)
    }

    fn expired(&self, ttl: u32, now: u64) -> bool {
        now.saturating_sub(self.inserted_at) >= u64::from(ttl)
    }
}

/// Cache of `N` slots. A name occupies at most one slot.
#[derive(Debug, Clone)]
pub struct DnsCache<const N: usize = DEFAULT_CACHE_SIZE> {
    entries: [CacheEntry; N],
}

impl<const N: usize> Default for DnsCache<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DnsCache<N> {
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|_| CacheEntry::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Address for `name` if a valid, unexpired answer is cached
    pub fn get(&self, name: &str, now: u64) -> Option<Ipv4Addr> {
        self.entries.iter().find_map(|entry| match entry.state {
            EntryState::Valid { address, ttl }
                if entry.matches(name) && !entry.expired(ttl, now) =>
            {
                Some(address)
            }
            _ => None,
        })
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.state, EntryState::Pending { .. }) && e.matches(name))
    }

    /// Whether any slot is waiting on transaction `xid`
    pub fn has_pending_xid(&self, xid: u16) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.state, EntryState::Pending { xid: x, .. } if x == xid))
    }

    /// Slot to use for a new query: the slot already holding `name`, else an
    /// empty slot, else the slot with the oldest insertion time
    pub fn slot_for(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.matches(name))
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|e| e.state == EntryState::Empty)
            })
            .or_else(|| {
                self.entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(i, _)| i)
            })
    }

    /// Claim `slot` for an outstanding query
    pub fn begin(&mut self, slot: usize, name: &str, xid: u16, now: u64) {
        if let Some(entry) = self.entries.get_mut(slot) {
            if entry.state != EntryState::Empty && !entry.name.eq_ignore_ascii_case(name) {
                log::debug!("evicting {} from DNS cache", entry.name);
            }
            entry.name.clear();
            entry.name.push_str(name);
            entry.state = EntryState::Pending { xid, issued_at: now };
            entry.inserted_at = now;
        }
    }

    /// Fill the slot pending on (`name`, `xid`). TTLs below
    /// [`MIN_CACHE_TTL`] are raised to it. Returns false when no such slot
    /// exists.
    pub fn complete(&mut self, name: &str, xid: u16, address: Ipv4Addr, ttl: u32, now: u64) -> bool {
        let slot = self.entries.iter_mut().find(|e| {
            e.matches(name) && matches!(e.state, EntryState::Pending { xid: x, .. } if x == xid)
        });
        match slot {
            Some(entry) => {
                entry.state = EntryState::Valid {
                    address,
                    ttl: ttl.max(MIN_CACHE_TTL),
                };
                entry.inserted_at = now;
                true
            }
            None => false,
        }
    }

    /// Empty slots whose query timed out or whose answer expired. Returns the
    /// number of slots freed.
    pub fn sweep(&mut self, now: u64, query_timeout: u32) -> usize {
        let mut freed = 0;
        for entry in self.entries.iter_mut() {
            let stale = match entry.state {
                EntryState::Empty => false,
                EntryState::Pending { issued_at, .. } => {
                    now.saturating_sub(issued_at) >= u64::from(query_timeout)
                }
                EntryState::Valid { ttl, .. } => entry.expired(ttl, now),
            };
            if stale {
                log::debug!("DNS cache drops {} ({:?})", entry.name, entry.state);
                *entry = CacheEntry::default();
                freed += 1;
            }
        }
        freed
    }
}
