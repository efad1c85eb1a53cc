use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::clock::{Tick, TickClock, micros_to_secs, secs_to_micros, secs_to_ticks, ticks_to_secs};
use crate::config::NodeConfig;
use crate::net::{ClientSender, HostSender, Packet, PacketKind, Transport};
use crate::playback::PlaybackControl;
use crate::schedule::{ActionQueue, PlaybackAction};
use crate::session::{ClientMachine, ClockEstimate, HostMachine, SessionState};

/// Inbound packets handled per tick; later arrivals wait for the next tick.
const MAX_PACKETS_PER_TICK: usize = 256;

const JOIN_RETRY_SECS: f64 = 0.5;
const RTT_RETRY_SECS: f64 = 0.5;

/// Positional disagreement beyond which a drift correction is issued.
const SYNC_TOLERANCE_SECS: f64 = 0.5;
/// Seek this far ahead of the host's position, leaving the seek time to
/// complete before the scheduled resume.
const SEEK_LOOKAHEAD_SECS: f64 = 1.0;
/// Resume slightly early; play-start overhead eats the difference.
const RESUME_BIAS_SECS: f64 = -0.15;

#[derive(Debug)]
enum Machine {
    Host(HostMachine),
    Client(ClientMachine),
}

/// One playback node. Owns the transport, the role's session machine, the
/// scheduled-action queue and the playback capability; everything advances
/// on `tick_once`.
pub struct Node<P: PlaybackControl> {
    config: NodeConfig,
    clock: TickClock,
    transport: Transport,
    player: P,
    machine: Machine,
    actions: ActionQueue,
    last_join_tx: Option<Tick>,
    last_rtt_activity: Option<Tick>,
    last_sync_tx: Option<Tick>,
    running: Arc<AtomicBool>,
}

impl<P: PlaybackControl> Node<P> {
    pub fn new(config: NodeConfig, player: P) -> io::Result<Self> {
        let transport = Transport::bind(config.bind_addr)?;
        log::info!(
            "{} node listening on {}",
            config.role,
            transport.local_addr()
        );

        let machine = if config.role.is_host() {
            Machine::Host(HostMachine::new())
        } else {
            Machine::Client(ClientMachine::new())
        };

        Ok(Self {
            config,
            clock: TickClock::new(),
            transport,
            player,
            machine,
            actions: ActionQueue::new(),
            last_join_tx: None,
            last_rtt_activity: None,
            last_sync_tx: None,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn state(&self) -> SessionState {
        match &self.machine {
            Machine::Host(host) => host.state,
            Machine::Client(client) => client.state,
        }
    }

    pub fn clock_estimate(&self) -> Option<ClockEstimate> {
        match &self.machine {
            Machine::Host(_) => None,
            Machine::Client(client) => client.estimate().copied(),
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.transport.close();
    }

    /// One scheduler tick: bounded inbound drain, timed retries, then the
    /// scheduled-action check. All protocol logic runs here, single-threaded.
    pub fn tick_once(&mut self) {
        let now = self.clock.now();

        for _ in 0..MAX_PACKETS_PER_TICK {
            match self.transport.try_recv() {
                Some((packet, from)) => self.route(packet, from, now),
                None => break,
            }
        }

        self.run_timers(now);
        self.fire_due_actions(now);
    }

    /// Static role-aware dispatch: clients only handle host-sent kinds, the
    /// host only handles client-sent kinds. Anything else is dropped.
    fn route(&mut self, packet: Packet, from: SocketAddr, now: Tick) {
        let host_context = matches!(self.machine, Machine::Host(_));

        if host_context {
            if packet.sender.is_host() {
                log::warn!("host received host-role packet from {}, dropping", from);
                return;
            }
            match packet.kind {
                PacketKind::JoinRequest => self.on_join_request(packet, from, now),
                PacketKind::RttRequest => self.on_rtt_request(packet, from, now),
                kind => log::warn!("host: unhandled packet kind {:?} from {}", kind, from),
            }
        } else {
            if !packet.sender.is_host() {
                log::warn!("client received non-host packet from {}, dropping", from);
                return;
            }
            match packet.kind {
                PacketKind::JoinResponse => self.on_join_response(now),
                PacketKind::RttResponse => self.on_rtt_response(packet, now),
                PacketKind::PlayRequest => self.on_play_request(packet, now),
                PacketKind::SyncRequest => self.on_sync_request(packet, now),
                kind => log::warn!("client: unhandled packet kind {:?} from {}", kind, from),
            }
        }
    }

    fn on_join_request(&mut self, packet: Packet, from: SocketAddr, now: Tick) {
        let Machine::Host(host) = &mut self.machine else {
            return;
        };
        if host.register_peer(packet.sender, from) {
            log::info!("{} joined from {}", packet.sender, from);
        } else {
            log::warn!("join request with invalid role {} from {}", packet.sender, from);
            return;
        }
        HostSender::new(&self.transport).join_response(now, from);
    }

    fn on_rtt_request(&mut self, packet: Packet, from: SocketAddr, now: Tick) {
        let Machine::Host(host) = &mut self.machine else {
            return;
        };
        let sender = HostSender::new(&self.transport);
        // echo the client's own stamp back, unaltered
        sender.rtt_response(now, packet.send_time, from);

        if host.record_rtt(packet.sender) {
            log::info!("{} clock converged", packet.sender);
            if host.try_open_barrier() {
                let start_tick = now + secs_to_ticks(self.config.start_delay_secs);
                sender.play_request(now, start_tick, host.client_endpoints());
                self.actions.push(start_tick, PlaybackAction::Start);
                host.state = SessionState::Scheduled;
                log::info!(
                    "all peers connected, playback scheduled in {:.2}s",
                    self.config.start_delay_secs
                );
            }
        }
    }

    fn on_join_response(&mut self, now: Tick) {
        let Machine::Client(client) = &mut self.machine else {
            return;
        };
        if client.mark_joined() {
            client.state = SessionState::Calibrating;
            log::info!("joined host, starting rtt calibration");
            // open the self-sustaining sampling loop
            ClientSender::new(&self.transport, self.config.role)
                .rtt_request(now, self.config.host_addr);
            client.note_rtt_sent();
            self.last_rtt_activity = Some(now);
        }
    }

    fn on_rtt_response(&mut self, packet: Packet, now: Tick) {
        let Machine::Client(client) = &mut self.machine else {
            return;
        };
        self.last_rtt_activity = Some(now);

        if let Some(estimate) = client.estimator_step(now, packet.send_time, packet.payload) {
            log::info!(
                "clock estimate committed: offset {:.6}s, latency {:.6}s",
                ticks_to_secs(estimate.offset),
                estimate.latency_secs
            );
        }

        if client.rtt_budget_remaining() {
            ClientSender::new(&self.transport, self.config.role)
                .rtt_request(now, self.config.host_addr);
            client.note_rtt_sent();
        }
    }

    fn on_play_request(&mut self, packet: Packet, _now: Tick) {
        let Machine::Client(client) = &mut self.machine else {
            return;
        };
        let offset = match client.estimate() {
            Some(estimate) => estimate.offset,
            None => {
                log::warn!("play request before calibration committed, assuming zero offset");
                0
            }
        };
        let local_tick = packet.payload + offset;
        self.actions.push(local_tick, PlaybackAction::Start);
        client.state = SessionState::Scheduled;
        log::info!(
            "playback scheduled at local tick {} ({:.2}s from now)",
            local_tick,
            ticks_to_secs(local_tick - self.clock.now())
        );
    }

    fn on_sync_request(&mut self, packet: Packet, now: Tick) {
        let Machine::Client(client) = &mut self.machine else {
            return;
        };
        let Some(estimate) = client.estimate() else {
            return;
        };
        // a pending resume marks a correction already in flight
        if self.actions.contains(PlaybackAction::Resume) {
            return;
        }

        let latency = estimate.latency_secs;
        let host_pos = micros_to_secs(packet.payload);
        let local_pos = self.player.position_secs();
        let diff = ((host_pos + latency) - local_pos).abs();
        if diff <= SYNC_TOLERANCE_SECS {
            return;
        }

        let seek_to = host_pos + SEEK_LOOKAHEAD_SECS;
        self.player.pause();
        self.player.seek(seek_to);
        let resume_tick = now + secs_to_ticks(SEEK_LOOKAHEAD_SECS) - secs_to_ticks(latency)
            + secs_to_ticks(RESUME_BIAS_SECS);
        self.actions.push(resume_tick, PlaybackAction::Resume);
        log::info!(
            "drift {:.3}s exceeds tolerance: paused, seeked to {:.3}s, resume in {:.3}s",
            diff,
            seek_to,
            ticks_to_secs(resume_tick - now)
        );
    }

    /// Timed cadences: join retry, rtt stall retry, periodic sync broadcast.
    fn run_timers(&mut self, now: Tick) {
        match &mut self.machine {
            Machine::Host(host) => {
                if host.barrier_opened()
                    && self.player.is_playing()
                    && interval_elapsed(self.last_sync_tx, now, self.config.sync_interval_secs)
                {
                    let position_us = secs_to_micros(self.player.position_secs());
                    HostSender::new(&self.transport).sync_request(
                        now,
                        position_us,
                        host.client_endpoints(),
                    );
                    self.last_sync_tx = Some(now);
                }
            }
            Machine::Client(client) => {
                if !client.is_joined() && interval_elapsed(self.last_join_tx, now, JOIN_RETRY_SECS)
                {
                    ClientSender::new(&self.transport, self.config.role)
                        .join_request(now, self.config.host_addr);
                    self.last_join_tx = Some(now);
                }

                // re-kick the sampling chain if a datagram got lost
                if client.is_joined()
                    && client.rtt_budget_remaining()
                    && self.last_rtt_activity.is_some()
                    && interval_elapsed(self.last_rtt_activity, now, RTT_RETRY_SECS)
                {
                    ClientSender::new(&self.transport, self.config.role)
                        .rtt_request(now, self.config.host_addr);
                    client.note_rtt_sent();
                    self.last_rtt_activity = Some(now);
                }
            }
        }
    }

    fn fire_due_actions(&mut self, now: Tick) {
        for scheduled in self.actions.drain_due(now) {
            match scheduled.action {
                PlaybackAction::Start => {
                    self.player.play();
                    self.set_state(SessionState::Synchronized);
                    log::info!("synchronized playback started");
                }
                PlaybackAction::Resume => {
                    self.player.play();
                    log::info!("drift correction complete, playback resumed");
                }
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        match &mut self.machine {
            Machine::Host(host) => host.state = state,
            Machine::Client(client) => client.state = state,
        }
    }
}

fn interval_elapsed(last: Option<Tick>, now: Tick, interval_secs: f64) -> bool {
    match last {
        Some(last) => now - last >= secs_to_ticks(interval_secs),
        None => true,
    }
}
