//! Position dispatch.
//!
//! The session hands one normalized position per tracked channel per
//! frame to a `PositionSink`. The production sink speaks OSC over UDP
//! with one endpoint per channel; `RecordingSink` captures calls for
//! tests and dry runs.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{anyhow, Context, Result};
use rosc::{encoder, OscMessage, OscPacket, OscType};

use crate::normalize::NormalizedPosition;
use crate::{Channel, FrameSize};

/// Receives one normalized position per tracked channel per frame.
///
/// Delivery is fire-and-forget from the session's perspective:
/// implementations handle (and log) their own transport failures instead
/// of propagating them into the frame loop.
pub trait PositionSink {
    fn send(&mut self, channel: Channel, position: NormalizedPosition, frame_size: FrameSize);
}

impl<T: PositionSink + ?Sized> PositionSink for &mut T {
    fn send(&mut self, channel: Channel, position: NormalizedPosition, frame_size: FrameSize) {
        (**self).send(channel, position, frame_size);
    }
}

// ----------------------------------------------------------------------------
// OSC/UDP sink
// ----------------------------------------------------------------------------

/// OSC/UDP sink. Each channel is routed to its own `host:port` endpoint;
/// the message address is the channel tag (`/r`, `/g`, `/b`) and the
/// payload is `[x, y, width, height]` as OSC floats.
pub struct OscSender {
    socket: UdpSocket,
    targets: Vec<(Channel, SocketAddr)>,
}

impl OscSender {
    /// Resolve the per-channel endpoints and bind the outgoing socket.
    pub fn new(host: &str, endpoints: &[(Channel, u16)]) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("bind OSC socket")?;
        let mut targets = Vec::with_capacity(endpoints.len());
        for &(channel, port) in endpoints {
            let addr = (host, port)
                .to_socket_addrs()
                .with_context(|| format!("resolve OSC endpoint {}:{}", host, port))?
                .next()
                .ok_or_else(|| anyhow!("no address for OSC endpoint {}:{}", host, port))?;
            targets.push((channel, addr));
        }
        Ok(Self { socket, targets })
    }
}

impl PositionSink for OscSender {
    fn send(&mut self, channel: Channel, position: NormalizedPosition, frame_size: FrameSize) {
        let Some(&(_, addr)) = self.targets.iter().find(|(c, _)| *c == channel) else {
            return;
        };
        let msg = OscMessage {
            addr: format!("/{}", channel.tag()),
            args: vec![
                OscType::Float(position.x),
                OscType::Float(position.y),
                OscType::Float(frame_size.width as f32),
                OscType::Float(frame_size.height as f32),
            ],
        };
        match encoder::encode(&OscPacket::Message(msg)) {
            Ok(data) => {
                if let Err(err) = self.socket.send_to(&data, addr) {
                    log::warn!("OscSender: send to {} failed: {}", addr, err);
                }
            }
            Err(err) => log::warn!("OscSender: encode failed: {}", err),
        }
    }
}

// ----------------------------------------------------------------------------
// Recording sink
// ----------------------------------------------------------------------------

/// Sink that records every call instead of sending anything.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<(Channel, NormalizedPosition, FrameSize)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionSink for RecordingSink {
    fn send(&mut self, channel: Channel, position: NormalizedPosition, frame_size: FrameSize) {
        self.sent.push((channel, position, frame_size));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
