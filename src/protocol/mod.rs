//! Wire protocol for the remote vibration sensor
//!
//! The device speaks a deliberately small protocol:
//!
//! - **Handshake**: the client sends `DISCOVER_VIBS_SERVER` as a datagram to
//!   the well-known port; the device answers `SERVER_ACK` and starts
//!   streaming to the sender's address. The same token doubles as the
//!   keep-alive - the device drops a client it has not heard from in ~10s.
//! - **Text records**: newline-terminated CSV of signed decimal integers,
//!   batched several records per datagram.
//! - **Binary records**: fixed-size little-endian structs, used by the
//!   reliable stream variant.

mod binary;
mod text;

pub use binary::{parse_records, BinaryLayout};
pub use text::{format_record, TextFrameParser};

use serde::{Deserialize, Serialize};

/// Token the client sends to discover the device and to keep it forwarding
pub const DISCOVERY_TOKEN: &[u8] = b"DISCOVER_VIBS_SERVER";

/// Token the device answers discovery with
pub const ACK_TOKEN: &[u8] = b"SERVER_ACK";

/// Well-known telemetry port on the device
pub const DEFAULT_PORT: u16 = 12345;

/// Receive buffer size; batched text datagrams stay well under this
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Record encoding carried by the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordFormat {
    /// Newline-terminated CSV records
    #[default]
    Text,
    /// 16-byte binary records (6 x i16 channels + u32 timestamp)
    Binary,
    /// 22-byte binary records adding a u32 counter and u16 sequence
    BinaryCounted,
}

/// Which text field layouts the parser accepts.
///
/// Deployed firmware variants disagree on the field count; `Auto` accepts
/// any supported layout, the pinned variants reject the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextSchema {
    /// Accept any supported field count (4, 6 or 7)
    #[default]
    Auto,
    /// `gx,gy,gz,ts` (4 fields)
    GyroTimestamp,
    /// `gx,gy,gz,ax,ay,az` (6 fields)
    GyroAccel,
    /// `gx,gy,gz,ax,ay,az,ts` (7 fields)
    GyroAccelTimestamp,
}

impl TextSchema {
    /// Whether a record with the given field count is acceptable
    pub fn accepts(self, field_count: usize) -> bool {
        match self {
            TextSchema::Auto => matches!(field_count, 4 | 6 | 7),
            TextSchema::GyroTimestamp => field_count == 4,
            TextSchema::GyroAccel => field_count == 6,
            TextSchema::GyroAccelTimestamp => field_count == 7,
        }
    }
}
