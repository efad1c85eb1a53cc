use crate::clock::Tick;

pub const PACKET_SIZE: usize = 18;
pub const DEFAULT_PORT: u16 = 11000;

/// Which display a node drives. Exactly one `Host` per session; the other
/// two roles are clients that slave their clocks to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    Host = 0,
    Side = 1,
    Bottom = 2,
}

pub const CLIENT_ROLES: [Role; 2] = [Role::Side, Role::Bottom];

impl Role {
    pub fn is_host(self) -> bool {
        self == Role::Host
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Role::Host),
            1 => Some(Role::Side),
            2 => Some(Role::Bottom),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Side => write!(f, "side"),
            Role::Bottom => write!(f, "bottom"),
        }
    }
}

/// Wire byte values are fixed by the deployed protocol; `SyncResponse` is
/// reserved and never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    JoinRequest = 1,
    JoinResponse = 2,
    RttRequest = 3,
    RttResponse = 4,
    PlayRequest = 11,
    SyncRequest = 12,
    SyncResponse = 13,
}

impl PacketKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(PacketKind::JoinRequest),
            2 => Some(PacketKind::JoinResponse),
            3 => Some(PacketKind::RttRequest),
            4 => Some(PacketKind::RttResponse),
            11 => Some(PacketKind::PlayRequest),
            12 => Some(PacketKind::SyncRequest),
            13 => Some(PacketKind::SyncResponse),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("datagram too short: {0} bytes, need {PACKET_SIZE}")]
    TooShort(usize),
    #[error("unknown role byte: {0}")]
    BadRole(u8),
    #[error("unknown packet kind byte: {0}")]
    BadKind(u8),
}

/// One wire message. `send_time` is always the sender's local monotonic tick
/// at construction; `payload` meaning depends on `kind`:
///
/// - `JoinRequest` / `JoinResponse` / `RttRequest`: unused (0)
/// - `RttResponse`: the echoed `send_time` of the triggering `RttRequest`
/// - `PlayRequest`: absolute target start tick in the host's clock domain
/// - `SyncRequest`: host playback position in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub sender: Role,
    pub kind: PacketKind,
    pub send_time: Tick,
    pub payload: i64,
}

impl Packet {
    pub fn new(sender: Role, kind: PacketKind, send_time: Tick, payload: i64) -> Self {
        Self {
            sender,
            kind,
            send_time,
            payload,
        }
    }

    /// Fixed layout: byte 0 role, byte 1 kind, bytes 2..10 `send_time` (LE
    /// i64), bytes 10..18 `payload` (LE i64).
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        buf[0] = self.sender as u8;
        buf[1] = self.kind as u8;
        buf[2..10].copy_from_slice(&self.send_time.to_le_bytes());
        buf[10..18].copy_from_slice(&self.payload.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < PACKET_SIZE {
            return Err(PacketError::TooShort(data.len()));
        }
        let sender = Role::from_byte(data[0]).ok_or(PacketError::BadRole(data[0]))?;
        let kind = PacketKind::from_byte(data[1]).ok_or(PacketError::BadKind(data[1]))?;
        let send_time = i64::from_le_bytes(data[2..10].try_into().unwrap());
        let payload = i64::from_le_bytes(data[10..18].try_into().unwrap());
        Ok(Self {
            sender,
            kind,
            send_time,
            payload,
        })
    }
}
