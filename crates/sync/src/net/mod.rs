mod protocol;
mod sender;
mod transport;

pub use protocol::{
    CLIENT_ROLES, DEFAULT_PORT, PACKET_SIZE, Packet, PacketError, PacketKind, Role,
};
pub use sender::{ClientSender, HostSender};
pub use transport::Transport;
