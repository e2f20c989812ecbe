//! Value primitives: addresses, UUIDs and the microsecond time value.

mod ipv4_address;
mod ipv6_address;
mod mac_address;
mod micros;
mod uuid;

pub use ipv4_address::*;
pub use ipv6_address::*;
pub use mac_address::*;
pub use micros::*;
pub use uuid::*;
