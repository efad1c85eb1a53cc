//! Lockstep playback coordination for a multi-display video wall: one host
//! display and two client displays keep a video in tight temporal sync over
//! UDP, despite independent hardware clocks. The host is the clock
//! reference; clients estimate their offset against it with NTP-style RTT
//! sampling, a rendezvous barrier gates the session start, and periodic
//! sync broadcasts correct drift during playback.

pub mod clock;
pub mod config;
pub mod net;
pub mod node;
pub mod playback;
pub mod schedule;
pub mod session;

pub use clock::{Tick, TickClock, micros_to_secs, secs_to_micros, secs_to_ticks, ticks_to_secs};
pub use config::NodeConfig;
pub use net::{
    CLIENT_ROLES, ClientSender, DEFAULT_PORT, HostSender, PACKET_SIZE, Packet, PacketError,
    PacketKind, Role, Transport,
};
pub use node::Node;
pub use playback::PlaybackControl;
pub use schedule::{ActionQueue, PlaybackAction, ScheduledAction};
pub use session::{
    CALIBRATION_KEEP, CALIBRATION_SAMPLES, ClientMachine, ClockEstimate, HOST_READY_SAMPLES,
    HostMachine, LatencySample, PeerEntry, RTT_REQUEST_BUDGET, SessionState,
};
