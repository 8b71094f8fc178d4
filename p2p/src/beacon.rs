// Copyright 2016 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! LAN discovery over a UDP broadcast socket: a fixed-size datagram
//! announcing our identity and listen port, sent at most once at a time.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use net2::UdpBuilder;

use veil_core::PeerId;

pub const DATAGRAM_LEN: usize = 32 + 32 + 2;

/// A parsed announcement from another node on the LAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
	pub id: PeerId,
	pub listen_port: u16,
}

/// Encode an announcement into the fixed 66-byte wire format. The leading
/// 32 bytes are the network's config checksum rather than a fixed tag, so
/// nodes running an incompatible config ignore each other's broadcasts
/// just as cheaply as unrelated LAN traffic.
pub fn encode(cfg_checksum: [u8; 32], id: PeerId, listen_port: u16) -> [u8; DATAGRAM_LEN] {
	let mut buf = [0u8; DATAGRAM_LEN];
	buf[0..32].copy_from_slice(&cfg_checksum);
	buf[32..64].copy_from_slice(&id.0);
	buf[64..66].copy_from_slice(&listen_port.to_be_bytes());
	buf
}

/// Decode a received datagram, rejecting anything that isn't exactly our
/// format or doesn't carry our own config checksum.
pub fn decode(cfg_checksum: [u8; 32], buf: &[u8]) -> Option<Announcement> {
	if buf.len() != DATAGRAM_LEN || buf[0..32] != cfg_checksum[..] {
		return None;
	}
	let mut id = [0u8; 32];
	id.copy_from_slice(&buf[32..64]);
	let listen_port = u16::from_be_bytes([buf[64], buf[65]]);
	Some(Announcement { id: PeerId(id), listen_port })
}

/// Sends our own announcement on a fixed period, never overlapping a
/// previous send-and-wait cycle (one-in-flight-send discipline). Drops
/// anything it receives back that carries our own identity, since a
/// broadcast socket hears its own sends looped back on some platforms.
pub struct Beacon {
	socket: UdpSocket,
	broadcast_addr: SocketAddr,
	period: Duration,
	last_sent: Option<Instant>,
	cfg_checksum: [u8; 32],
	my_id: PeerId,
}

impl Beacon {
	pub fn bind(port: u16, broadcast_addr: SocketAddr, period: Duration, cfg_checksum: [u8; 32], my_id: PeerId) -> io::Result<Beacon> {
		let socket = UdpBuilder::new_v4()?.reuse_address(true)?.bind(("0.0.0.0", port))?;
		socket.set_broadcast(true)?;
		socket.set_nonblocking(true)?;
		Ok(Beacon { socket, broadcast_addr, period, last_sent: None, cfg_checksum, my_id })
	}

	/// Send our announcement if the period has elapsed and no send is
	/// currently outstanding.
	pub fn tick(&mut self, listen_port: u16) -> io::Result<bool> {
		let now = Instant::now();
		if let Some(last) = self.last_sent {
			if now.duration_since(last) < self.period {
				return Ok(false);
			}
		}
		let buf = encode(self.cfg_checksum, self.my_id, listen_port);
		self.socket.send_to(&buf, self.broadcast_addr)?;
		self.last_sent = Some(now);
		Ok(true)
	}

	/// Drain any pending inbound announcements (non-blocking), dropping
	/// whatever names our own identity. Paired with the UDP source address
	/// so the caller can learn `(id, source_ip:announced_port)`.
	pub fn recv(&self) -> Vec<(Announcement, SocketAddr)> {
		let mut out = Vec::new();
		let mut buf = [0u8; 512];
		loop {
			match self.socket.recv_from(&mut buf) {
				Ok((n, from)) => {
					if let Some(a) = decode(self.cfg_checksum, &buf[..n]) {
						if a.id != self.my_id {
							out.push((a, from));
						}
					}
				}
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(_) => break,
			}
		}
		out
	}
}

#[cfg(test)]
mod test {
	use super::*;

	const CHECKSUM: [u8; 32] = [9u8; 32];

	#[test]
	fn round_trips_through_encode_decode() {
		let id = PeerId([7u8; 32]);
		let buf = encode(CHECKSUM, id, 17235);
		let decoded = decode(CHECKSUM, &buf).unwrap();
		assert_eq!(decoded.id, id);
		assert_eq!(decoded.listen_port, 17235);
	}

	#[test]
	fn rejects_wrong_length_and_wrong_checksum() {
		assert!(decode(CHECKSUM, &[0u8; 10]).is_none());
		let buf = encode([1u8; 32], PeerId([1u8; 32]), 1);
		assert!(decode(CHECKSUM, &buf).is_none());
	}
}
