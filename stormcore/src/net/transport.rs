use crate::SessionId;
use std::net::IpAddr;

/// Which session a transport context reports events for. Event routing is
/// a match on this owner tag at the `Core` entry points, one per callback
/// slot of the transport contract.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TcpOwner {
    Bgp(SessionId),
    Ldp(SessionId),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TcpState {
    Idle,
    Connecting,
    Listen,
    Sending,
    Closed,
}

/// Identifies the byte region an in-flight transmission points at. Each
/// session owns exactly one write buffer and at most one raw-update blob in
/// flight, so tag equality is buffer identity.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TxSource {
    None,
    WriteBuf,
    RawUpdate,
}

#[derive(Debug, Clone, Copy)]
pub struct TxState {
    pub source: TxSource,
    /// Committed length. The LDP send path extends this in place to
    /// coalesce messages into a transmission that has not drained yet.
    pub len: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TcpError {
    ConnectFailed,
    Reset,
    Aborted,
    WriteFailed,
}

/// Per-peer stream transport context, the contract consumed by the BGP and
/// LDP engines. The socket work behind it (raw sockets, reassembly) lives
/// in the I/O layer; the engines only see state, the tx cursor and events
/// delivered through `Core::tcp_*`.
pub struct TcpCtx {
    pub state: TcpState,
    pub owner: TcpOwner,
    pub interface: String,
    pub local: IpAddr,
    pub peer: Option<IpAddr>,
    pub port: u16,
    pub tos: u8,
    pub tx: TxState,
}

impl TcpCtx {
    /// Opens an outgoing connection context. The context starts in
    /// `Connecting`; the I/O layer reports the outcome through
    /// `Core::tcp_connected` or `Core::tcp_error`.
    pub fn connect(
        owner: TcpOwner,
        interface: &str,
        local: IpAddr,
        peer: IpAddr,
        port: u16,
        tos: u8,
    ) -> TcpCtx {
        TcpCtx {
            state: TcpState::Connecting,
            owner,
            interface: interface.to_string(),
            local,
            peer: Some(peer),
            port,
            tos,
            tx: TxState {
                source: TxSource::None,
                len: 0,
            },
        }
    }

    /// Opens a listening context. An accepted connection arrives as a fresh
    /// `TcpCtx` through `Core::tcp_accepted`.
    pub fn listen(owner: TcpOwner, interface: &str, local: IpAddr, port: u16, tos: u8) -> TcpCtx {
        TcpCtx {
            state: TcpState::Listen,
            owner,
            interface: interface.to_string(),
            local,
            peer: None,
            port,
            tos,
            tx: TxState {
                source: TxSource::None,
                len: 0,
            },
        }
    }

    /// Context handed to the engine for an accepted connection.
    pub fn accepted(owner: TcpOwner, interface: &str, local: IpAddr, peer: IpAddr, port: u16) -> TcpCtx {
        TcpCtx {
            state: TcpState::Idle,
            owner,
            interface: interface.to_string(),
            local,
            peer: Some(peer),
            port,
            tos: 0,
            tx: TxState {
                source: TxSource::None,
                len: 0,
            },
        }
    }

    /// Posts a transmission of `len` bytes out of `source`. Refused while a
    /// previous transmission has not drained or the context is not ready;
    /// the engines defer to a retry timer in that case.
    pub fn send(&mut self, source: TxSource, len: usize) -> bool {
        match self.state {
            TcpState::Idle => {
                self.state = TcpState::Sending;
                self.tx = TxState { source, len };
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == TcpState::Idle
    }

    #[inline]
    pub fn is_sending(&self) -> bool {
        self.state == TcpState::Sending
    }

    /// Marks the in-flight transmission drained. Called by the I/O layer
    /// (or a test driver) right before it delivers the idle event.
    pub fn complete_send(&mut self) {
        if self.state == TcpState::Sending {
            self.state = TcpState::Idle;
            self.tx = TxState {
                source: TxSource::None,
                len: 0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ctx() -> TcpCtx {
        TcpCtx::connect(
            TcpOwner::Bgp(0),
            "eth0",
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            179,
            0,
        )
    }

    #[test]
    fn test_send_requires_idle() {
        let mut tcpc = ctx();
        assert!(!tcpc.send(TxSource::WriteBuf, 19));

        tcpc.state = TcpState::Idle;
        assert!(tcpc.send(TxSource::WriteBuf, 19));
        assert_eq!(tcpc.state, TcpState::Sending);
        assert_eq!(tcpc.tx.source, TxSource::WriteBuf);
        assert_eq!(tcpc.tx.len, 19);

        // A second post is refused until the first drains.
        assert!(!tcpc.send(TxSource::RawUpdate, 100));
    }

    #[test]
    fn test_complete_send_resets_tx() {
        let mut tcpc = ctx();
        tcpc.state = TcpState::Idle;
        tcpc.send(TxSource::RawUpdate, 64);

        tcpc.complete_send();

        assert_eq!(tcpc.state, TcpState::Idle);
        assert_eq!(tcpc.tx.source, TxSource::None);
        assert_eq!(tcpc.tx.len, 0);
    }

    #[test]
    fn test_listen_has_no_peer() {
        let tcpc = TcpCtx::listen(
            TcpOwner::Ldp(3),
            "eth1",
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            646,
            0,
        );
        assert_eq!(tcpc.state, TcpState::Listen);
        assert!(tcpc.peer.is_none());
    }
}
