//! Per-port LLDP state.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use bitflags::bitflags;

use super::AdminStatus;

/// Transmit timer state machine states (IEEE 802.1AB 9.2.9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxTimerState {
    Initialize,
    Idle,
    Tick,
    Expires,
    SignalTx,
    FastStart,
}

/// Transmit state machine states (IEEE 802.1AB 9.2.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Initialize,
    Idle,
    InfoFrame,
    ShutdownFrame,
}

/// Receive state machine states (IEEE 802.1AB 9.2.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    WaitPortOperational,
    Initialize,
    WaitForFrame,
    RxFrame,
}

bitflags! {
    /// Power negotiation results from the last received power TLVs
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
    pub struct OrgFlags: u8 {
        /// PSE supports 4-wire PoE
        const FOUR_WIRE_SUPPORTED = 1 << 0;
        /// We asked for the spare pair to be powered
        const PD_SPARE_PAIR_REQUESTED = 1 << 1;
        /// PSE reports the PoE pair enabled
        const POE_PAIR_ENABLED = 1 << 2;
        /// Allocation of 13 W or less
        const POE_MIN_POWER = 1 << 3;
        /// Allocation up to 25.5 W
        const POE_PLUS_POWER = 1 << 4;
        /// Allocation above 25.5 W
        const UPOE_POWER = 1 << 5;
        const POWER_TIERS = Self::POE_MIN_POWER.bits()
            | Self::POE_PLUS_POWER.bits()
            | Self::UPOE_POWER.bits();
    }
}

/// Transmit countdowns, in seconds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxTimers {
    /// txTTR, time until the next periodic announcement
    pub tx_ttr: u16,
    /// txShutdownWhile, time before tx may reinitialize
    pub tx_shutdown_while: u16,
    /// A tick is waiting to be consumed by the timer state machine
    pub tx_tick: bool,
}

/// Transmit side of the port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPortState {
    pub state: TxState,
    pub timer_state: TxTimerState,
    pub local_change: bool,
    pub tx_ttl: u16,
    pub timers: TxTimers,
    pub tx_credit: u8,
    pub tx_fast: u8,
    pub tx_now: bool,
}

/// Receive side of the port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPortState {
    pub state: RxState,
    pub bad_frame: bool,
    pub rcv_frame: bool,
}

/// Identity of the neighbour from the last accepted LLDPDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSystem {
    pub chassis_id_subtype: u8,
    pub chassis_id: Vec<u8>,
    pub port_id_subtype: u8,
    pub port_id: Vec<u8>,
    /// Advertised time to live, in seconds
    pub ttl: u16,
    /// Seconds until this information expires
    pub remaining: u16,
}

/// State of one LLDP port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpPort {
    pub admin_status: AdminStatus,
    pub port_enabled: bool,
    pub new_neighbor: bool,
    pub tx: TxPortState,
    pub rx: RxPortState,
    /// Power granted by the PSE, in 0.1 W
    pub allocated_power: u16,
    /// Power requested by the application, in 0.1 W
    pub desired_power: u16,
    pub org_flags: OrgFlags,
    pub remote: Option<RemoteSystem>,
}

impl LldpPort {
    pub fn new(admin_status: AdminStatus) -> Self {
        Self {
            admin_status,
            port_enabled: true,
            new_neighbor: false,
            tx: TxPortState {
                state: TxState::Initialize,
                timer_state: TxTimerState::Initialize,
                local_change: false,
                tx_ttl: 0,
                timers: TxTimers::default(),
                tx_credit: 0,
                tx_fast: 0,
                tx_now: false,
            },
            rx: RxPortState {
                state: RxState::WaitPortOperational,
                bad_frame: false,
                rcv_frame: false,
            },
            allocated_power: 0,
            desired_power: 0,
            org_flags: OrgFlags::empty(),
            remote: None,
        }
    }

    /// One second elapsed
    pub fn tick(&mut self) {
        let timers = &mut self.tx.timers;
        timers.tx_tick = true;
        timers.tx_ttr = timers.tx_ttr.saturating_sub(1);
        timers.tx_shutdown_while = timers.tx_shutdown_while.saturating_sub(1);

        if let Some(remote) = self.remote.as_mut() {
            remote.remaining = remote.remaining.saturating_sub(1);
            if remote.remaining == 0 {
                log::info!("LLDP neighbour information aged out");
                self.remote = None;
            }
        }
    }

    /// Classify an allocation into exactly one power tier
    pub fn set_power_tier(&mut self, allocated: u16) {
        self.allocated_power = allocated;
        self.org_flags.remove(OrgFlags::POWER_TIERS);
        let tier = match allocated {
            0..=130 => OrgFlags::POE_MIN_POWER,
            131..=255 => OrgFlags::POE_PLUS_POWER,
            _ => OrgFlags::UPOE_POWER,
        };
        self.org_flags.insert(tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_down() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.tx.timers.tx_ttr = 2;
        port.tx.timers.tx_shutdown_while = 1;

        port.tick();
        assert!(port.tx.timers.tx_tick);
        assert_eq!(port.tx.timers.tx_ttr, 1);
        assert_eq!(port.tx.timers.tx_shutdown_while, 0);

        // Counters stop at zero
        port.tick();
        port.tick();
        assert_eq!(port.tx.timers.tx_ttr, 0);
        assert_eq!(port.tx.timers.tx_shutdown_while, 0);
    }

    #[test]
    fn test_power_tiers_exclusive() {
        let mut port = LldpPort::new(AdminStatus::RxTx);

        port.set_power_tier(0x0100);
        assert_eq!(port.org_flags & OrgFlags::POWER_TIERS, OrgFlags::UPOE_POWER);
        assert_eq!(port.allocated_power, 256);

        port.set_power_tier(0x0082);
        assert_eq!(port.org_flags & OrgFlags::POWER_TIERS, OrgFlags::POE_MIN_POWER);

        port.set_power_tier(131);
        assert_eq!(port.org_flags & OrgFlags::POWER_TIERS, OrgFlags::POE_PLUS_POWER);

        port.set_power_tier(255);
        assert_eq!(port.org_flags & OrgFlags::POWER_TIERS, OrgFlags::POE_PLUS_POWER);
    }

    #[test]
    fn test_power_tier_keeps_capability_bits() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.org_flags = OrgFlags::FOUR_WIRE_SUPPORTED | OrgFlags::UPOE_POWER;
        port.set_power_tier(100);
        assert_eq!(
            port.org_flags,
            OrgFlags::FOUR_WIRE_SUPPORTED | OrgFlags::POE_MIN_POWER
        );
    }

    #[test]
    fn test_remote_ages_out() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.remote = Some(RemoteSystem {
            chassis_id_subtype: 4,
            chassis_id: vec![1, 2, 3, 4, 5, 6],
            port_id_subtype: 5,
            port_id: b"Gi1/0/1".to_vec(),
            ttl: 2,
            remaining: 2,
        });

        port.tick();
        assert!(port.remote.is_some());
        port.tick();
        assert!(port.remote.is_none());
    }
}
