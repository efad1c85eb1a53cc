use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use super::protocol::{Packet, PACKET_SIZE};

/// How long the receive thread blocks per wait, so it can observe shutdown.
const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

const RECV_BUFFER_SIZE: usize = 64;

/// Owns the UDP socket. A dedicated thread blocks on the socket, decodes
/// datagrams and pushes them into an inbound queue; the tick consumer drains
/// that queue with `try_recv`. The receive thread never interprets packets.
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    inbound: Receiver<(Packet, SocketAddr)>,
    running: Arc<AtomicBool>,
    recv_thread: Option<JoinHandle<()>>,
}

impl Transport {
    /// Binds the socket and starts the receive thread. Bind failure is the
    /// only fatal transport error.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local_addr = socket.local_addr()?;

        let recv_socket = socket.try_clone()?;
        recv_socket.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let thread_running = Arc::clone(&running);
        let recv_thread = std::thread::spawn(move || {
            receive_loop(recv_socket, tx, thread_running);
        });

        Ok(Self {
            socket,
            local_addr,
            inbound: rx,
            running,
            recv_thread: Some(recv_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Best-effort unicast. Send failures are logged, never surfaced to the
    /// caller's control flow.
    pub fn send_to(&self, packet: &Packet, addr: SocketAddr) {
        let data = packet.encode();
        if let Err(e) = self.socket.send_to(&data, addr) {
            log::warn!("udp send to {} failed: {}", addr, e);
        }
    }

    /// Non-blocking pop from the inbound queue.
    pub fn try_recv(&self) -> Option<(Packet, SocketAddr)> {
        self.inbound.try_recv().ok()
    }

    /// Cooperative shutdown: signal the receive thread, wait for it to
    /// observe the signal, then the socket drops with `self`. Idempotent.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.recv_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn receive_loop(
    socket: UdpSocket,
    inbound: Sender<(Packet, SocketAddr)>,
    running: Arc<AtomicBool>,
) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((size, from)) => match Packet::decode(&buf[..size.min(PACKET_SIZE)]) {
                Ok(packet) => {
                    if inbound.send((packet, from)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("discarding malformed datagram from {}: {}", from, e);
                }
            },
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => {
                // ICMP port-unreachable while the peer is not yet bound;
                // expected during the pre-join phase.
                log::debug!("udp receive: peer not listening yet");
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    log::error!("udp receive error: {}", e);
                }
            }
        }
    }
}
