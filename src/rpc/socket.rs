//! UDP socket layer sending and receiving DHT messages.

use std::net::{SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use tracing::{debug, trace};

use crate::common::Message;

use super::config::Config;

/// Large enough for any datagram that fits the common MTUs.
const MTU: usize = 4096;

/// The maximum duration the receiver loop blocks on an empty socket before
/// checking whether the node was shut down.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(10);

/// A UdpSocket wrapper that encodes and decodes DHT messages.
#[derive(Debug)]
pub struct DhtSocket {
    socket: UdpSocket,
    local_addr: SocketAddrV4,
}

impl DhtSocket {
    pub(crate) fn new(config: &Config) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(SocketAddrV4::new(config.bind_address, config.port))?;

        let local_addr = match socket.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unimplemented!("DhtSocket does not support Ipv6"),
        };

        socket.set_read_timeout(Some(MAX_THREAD_BLOCK_DURATION))?;

        Ok(Self { socket, local_addr })
    }

    // === Getters ===

    /// Returns the address the socket is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    // === Public Methods ===

    /// Send a message, logging and swallowing io errors.
    ///
    /// A datagram that never arrives is indistinguishable from one that
    /// failed to send, either way the request times out.
    pub fn send(&self, address: SocketAddrV4, message: &Message) {
        trace!(context = "socket_message_sending", ?address, ?message);

        if let Err(error) = self.socket.send_to(&message.to_bytes(), address) {
            debug!(?error, ?address, "Error sending message");
        }
    }

    /// Receives a single message on the socket.
    /// On success, returns the message and the origin.
    pub fn recv_from(&self) -> Option<(Message, SocketAddrV4)> {
        let mut buf = [0u8; MTU];

        match self.socket.recv_from(&mut buf) {
            Ok((amt, SocketAddr::V4(from))) => {
                let bytes = &buf[..amt];

                match Message::from_bytes(bytes) {
                    Ok(message) => {
                        trace!(
                            context = "socket_message_receiving",
                            ?message,
                            ?from,
                            "Received message"
                        );

                        return Some((message, from));
                    }
                    Err(error) => {
                        trace!(
                            context = "socket_error",
                            ?error,
                            ?from,
                            "Received invalid message."
                        );
                    }
                }
            }
            Ok((_, SocketAddr::V6(_))) => {
                trace!(
                    context = "socket_validation",
                    message = "Received IPv6 packet"
                );
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                trace!(
                    context = "socket_error",
                    ?e,
                    "recv_from failed unexpectedly"
                );
            }
        }

        None
    }
}
