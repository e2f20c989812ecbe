use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::rng::Rng;
use crate::val::{Ipv4Address, Ipv6Address, MacAddress};

/// Default MTU when the interface does not report one.
pub const DEFAULT_MTU: usize = 1500;

/// Host-side facts the compiler falls back to when the script does not
/// specify them: own MAC and IP addresses, the interface name and its
/// MTU. Initialized once at startup, read-only afterwards.
#[derive(Clone, Debug)]
pub struct Settings {
    my_mac: MacAddress,
    my_ipv4: Ipv4Address,
    my_ipv6: Ipv6Address,
    mtu: usize,
    if_name: String,
}

impl Settings {
    /// Settings with zero addresses, no interface and the default MTU.
    pub fn new() -> Settings {
        Settings {
            my_mac: MacAddress::NULL,
            my_ipv4: Ipv4Address::NULL,
            my_ipv6: Ipv6Address::NULL,
            mtu: DEFAULT_MTU,
            if_name: String::new(),
        }
    }

    /// Set the own MAC address.
    pub fn set_my_mac(&mut self, mac: MacAddress) -> &mut Self {
        self.my_mac = mac;
        self
    }

    /// Set the own IPv4 address.
    pub fn set_my_ipv4(&mut self, ip: Ipv4Address) -> &mut Self {
        self.my_ipv4 = ip;
        self
    }

    /// Set the own IPv6 address.
    pub fn set_my_ipv6(&mut self, ip: Ipv6Address) -> &mut Self {
        self.my_ipv6 = ip;
        self
    }

    /// Set the link MTU.
    pub fn set_mtu(&mut self, mtu: usize) -> &mut Self {
        self.mtu = mtu;
        self
    }

    /// Set the interface name.
    pub fn set_if_name(&mut self, name: &str) -> &mut Self {
        self.if_name = name.to_string();
        self
    }

    /// Own MAC address.
    pub fn my_mac(&self) -> MacAddress {
        self.my_mac
    }

    /// Own IPv4 address.
    pub fn my_ipv4(&self) -> Ipv4Address {
        self.my_ipv4
    }

    /// Own IPv6 address.
    pub fn my_ipv6(&self) -> Ipv6Address {
        self.my_ipv6
    }

    /// Link MTU.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Interface name.
    pub fn if_name(&self) -> &str {
        &self.if_name
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}

/// Shared state of one compilation run: the settings block, the random
/// source and the process-wide counters.
///
/// The counters are atomics so successive instructions observe each
/// other (all IPv4 fragments of one datagram share one identification
/// value; successive TCP segments continue one sequence space).
#[derive(Debug)]
pub struct Context {
    /// Host-side settings.
    pub settings: Settings,
    /// Random source for wildcard parameters.
    pub rng: Rng,
    next_ip_id: AtomicU16,
    tcp_sequence: AtomicU32,
}

impl Context {
    /// Context with a pseudo-random source.
    pub fn new(settings: Settings) -> Context {
        Context {
            settings,
            rng: Rng::new(),
            next_ip_id: AtomicU16::new(1),
            tcp_sequence: AtomicU32::new(42),
        }
    }

    /// Context with the deterministic counter random source, for
    /// reproducible runs and tests.
    pub fn with_counter_rng(settings: Settings, start: u64) -> Context {
        Context {
            settings,
            rng: Rng::counter(start),
            next_ip_id: AtomicU16::new(1),
            tcp_sequence: AtomicU32::new(42),
        }
    }

    /// Draw the next IPv4 identification value (wraps at 16 bits).
    pub fn next_ip_id(&self) -> u16 {
        self.next_ip_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Current TCP sequence number.
    pub fn tcp_sequence(&self) -> u32 {
        self.tcp_sequence.load(Ordering::Relaxed)
    }

    /// Reset the TCP sequence number (a script supplied an explicit
    /// sequence).
    pub fn set_tcp_sequence(&self, seq: u32) {
        self.tcp_sequence.store(seq, Ordering::Relaxed);
    }

    /// Advance the TCP sequence number by the given amount.
    pub fn advance_tcp_sequence(&self, amount: u32) {
        self.tcp_sequence.fetch_add(amount, Ordering::Relaxed);
    }
}
