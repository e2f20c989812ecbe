/// Error when assembled bytes cannot form a valid set of frames.
///
/// These are raised by the packet types themselves, independent of the
/// script syntax; the instruction parser wraps them with the failing
/// instruction's context before they reach the user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// Writing would exceed the frame's byte budget.
    FrameOverflow {
        /// Frame length after the write.
        required: usize,
        /// Maximum the frame may hold.
        max: usize,
    },

    /// L4 header plus payload plus IP header exceed 65535 bytes.
    DatagramTooBig {
        /// Total datagram length.
        len: usize,
    },

    /// The L4 header alone does not fit into `mtu - ip_header_len`,
    /// so no fragmentation can make the datagram sendable.
    HeaderExceedsMtu {
        /// L4 header length.
        header_len: usize,
        /// Room left in the first fragment.
        room: usize,
    },

    /// An IPv6 datagram would need fragmentation, which is not
    /// supported (IPv6 datagrams are one-shot).
    Ipv6NeedsFragmentation {
        /// Total payload length that did not fit.
        len: usize,
    },
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use EncodeError::*;
        match self {
            FrameOverflow { required, max } => write!(
                f,
                "frame size of {required} bytes exceeds the maximum of {max} bytes"
            ),
            DatagramTooBig { len } => {
                write!(f, "IP datagram of {len} bytes exceeds 65535 bytes")
            }
            HeaderExceedsMtu { header_len, room } => write!(
                f,
                "transport header of {header_len} bytes does not fit into the {room} bytes left by the MTU"
            ),
            Ipv6NeedsFragmentation { len } => write!(
                f,
                "IPv6 payload of {len} bytes exceeds the MTU (IPv6 fragmentation is not supported)"
            ),
        }
    }
}

impl std::error::Error for EncodeError {}
