//! Packet types: one encoder per protocol, all rendering down to
//! [`EthernetPacket`] frames through the [`Linkable`] seam.

mod arp;
mod ethernet;
mod gre;
mod icmp;
mod igmp;
mod ip;
mod linkable;
mod lldp;
mod stp;
mod tcp;
mod udp;
mod vrrp;
mod vxlan;

pub use arp::*;
pub use ethernet::*;
pub use gre::*;
pub use icmp::*;
pub use igmp::*;
pub use ip::*;
pub use linkable::*;
pub use lldp::*;
pub use stp::*;
pub use tcp::*;
pub use udp::*;
pub use vrrp::*;
pub use vxlan::*;
