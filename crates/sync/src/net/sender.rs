use std::net::SocketAddr;

use crate::clock::Tick;
use super::protocol::{Packet, PacketKind, Role};
use super::transport::Transport;

/// Packets only the host emits. Every outgoing packet is stamped with the
/// host's local tick at build time.
pub struct HostSender<'t> {
    transport: &'t Transport,
}

impl<'t> HostSender<'t> {
    pub fn new(transport: &'t Transport) -> Self {
        Self { transport }
    }

    pub fn join_response(&self, now: Tick, target: SocketAddr) {
        let packet = Packet::new(Role::Host, PacketKind::JoinResponse, now, 0);
        self.transport.send_to(&packet, target);
    }

    /// `client_send_time` is echoed back untouched; the client measures its
    /// round trip against its own original stamp.
    pub fn rtt_response(&self, now: Tick, client_send_time: Tick, target: SocketAddr) {
        let packet = Packet::new(Role::Host, PacketKind::RttResponse, now, client_send_time);
        self.transport.send_to(&packet, target);
    }

    pub fn play_request(
        &self,
        now: Tick,
        start_tick: Tick,
        targets: impl Iterator<Item = SocketAddr>,
    ) {
        let packet = Packet::new(Role::Host, PacketKind::PlayRequest, now, start_tick);
        for target in targets {
            self.transport.send_to(&packet, target);
        }
    }

    pub fn sync_request(
        &self,
        now: Tick,
        position_us: i64,
        targets: impl Iterator<Item = SocketAddr>,
    ) {
        let packet = Packet::new(Role::Host, PacketKind::SyncRequest, now, position_us);
        for target in targets {
            self.transport.send_to(&packet, target);
        }
    }
}

/// Packets only clients emit, always unicast to the host.
pub struct ClientSender<'t> {
    transport: &'t Transport,
    role: Role,
}

impl<'t> ClientSender<'t> {
    pub fn new(transport: &'t Transport, role: Role) -> Self {
        Self { transport, role }
    }

    pub fn join_request(&self, now: Tick, host: SocketAddr) {
        let packet = Packet::new(self.role, PacketKind::JoinRequest, now, 0);
        self.transport.send_to(&packet, host);
    }

    pub fn rtt_request(&self, now: Tick, host: SocketAddr) {
        let packet = Packet::new(self.role, PacketKind::RttRequest, now, 0);
        self.transport.send_to(&packet, host);
    }
}
