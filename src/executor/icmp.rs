//! Blocking ICMP echo over a raw or unprivileged datagram socket
//!
//! Callers run [`echo_once`] on the blocking pool. The socket is connected to
//! the target so the kernel only hands back traffic from it.

use crate::error::{AppError, ErrorContext, Result};
use pnet::packet::icmp::{
    self,
    echo_reply::EchoReplyPacket,
    echo_request::{IcmpCodes, MutableEchoRequestPacket},
    IcmpPacket, IcmpTypes, MutableIcmpPacket,
};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::MutablePacket;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

const ICMP_HEADER_SIZE: usize = 8;
const ICMP_PAYLOAD_SIZE: usize = 16;
const RECV_BUFFER_SIZE: usize = 1500;

static NEXT_SEQUENCE: AtomicU16 = AtomicU16::new(1);

/// How the socket was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Needs privileges; replies include the IPv4 header
    Raw,
    /// Unprivileged ICMP; replies are bare ICMP and the kernel owns the identifier
    Datagram,
}

/// Open an ICMP socket, preferring raw and falling back to datagram
pub fn open_socket() -> Result<(Socket, SocketKind)> {
    match Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) {
        Ok(socket) => Ok((socket, SocketKind::Raw)),
        Err(raw_err) => Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))
            .map(|socket| (socket, SocketKind::Datagram))
            .map_err(|dgram_err| {
                AppError::probe(format!(
                    "no ICMP socket available (raw: {}, datagram: {})",
                    raw_err, dgram_err
                ))
            }),
    }
}

/// True if this process can open some kind of ICMP socket
pub fn socket_available() -> bool {
    open_socket().is_ok()
}

/// Build an echo request with a valid checksum
pub fn build_echo_request(identifier: u16, sequence: u16) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; ICMP_HEADER_SIZE + ICMP_PAYLOAD_SIZE];
    {
        let mut echo = MutableEchoRequestPacket::new(&mut buf)
            .ok_or_else(|| AppError::internal("echo request buffer too small"))?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCodes::NoCode);
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.payload_mut()[..8].copy_from_slice(b"pingtest");
    }

    let checksum = IcmpPacket::new(&buf)
        .map(|packet| icmp::checksum(&packet))
        .ok_or_else(|| AppError::internal("echo request buffer too small"))?;
    MutableIcmpPacket::new(&mut buf)
        .ok_or_else(|| AppError::internal("echo request buffer too small"))?
        .set_checksum(checksum);

    Ok(buf)
}

/// Whether `datagram` is the reply to our request
///
/// Datagram sockets rewrite the identifier, so only the sequence is checked.
pub fn is_matching_reply(datagram: &[u8], kind: SocketKind, identifier: u16, sequence: u16) -> bool {
    let icmp_bytes = match kind {
        SocketKind::Raw => match Ipv4Packet::new(datagram) {
            Some(ip) => {
                let header_len = ip.get_header_length() as usize * 4;
                match datagram.get(header_len..) {
                    Some(rest) => rest,
                    None => return false,
                }
            }
            None => return false,
        },
        SocketKind::Datagram => datagram,
    };

    let is_reply = IcmpPacket::new(icmp_bytes).is_some_and(|p| p.get_icmp_type() == IcmpTypes::EchoReply);
    if !is_reply {
        return false;
    }

    EchoReplyPacket::new(icmp_bytes).is_some_and(|reply| {
        reply.get_sequence_number() == sequence
            && (kind == SocketKind::Datagram || reply.get_identifier() == identifier)
    })
}

/// Send one echo request and wait up to `timeout` for the reply
pub fn echo_once(target: Ipv4Addr, timeout: Duration) -> Result<Duration> {
    let (socket, kind) = open_socket()?;
    let identifier = std::process::id() as u16;
    let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let request = build_echo_request(identifier, sequence)?;

    let destination = SockAddr::from(SocketAddr::new(target.into(), 0));
    socket.connect(&destination).with_context(|| format!("connecting ICMP socket to {}", target))?;

    let sent_at = Instant::now();
    socket.send(&request).context("sending echo request")?;

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        let remaining = timeout.saturating_sub(sent_at.elapsed());
        if remaining.is_zero() {
            return Err(AppError::timeout(format!("no echo reply from {} within {}ms", target, timeout.as_millis())));
        }
        socket.set_read_timeout(Some(remaining))?;

        match (&socket).read(&mut buf) {
            Ok(len) => {
                if is_matching_reply(&buf[..len], kind, identifier, sequence) {
                    return Ok(sent_at.elapsed());
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(AppError::timeout(format!("no echo reply from {} within {}ms", target, timeout.as_millis())));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AppError::probe(format!("receiving from {} failed: {}", target, e))),
        }
    }
}
