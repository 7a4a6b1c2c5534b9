use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::{info, warn};

use crate::endpoint::{Endpoint, Listener, Stream};

/// Depth of the pending-connection queue handed to listen(2).
pub const LISTEN_BACKLOG: i32 = 5;
/// Size of the scratch buffer the drain loop reads into.
pub const DRAIN_BUF_LEN: usize = 10_000;
/// How long a polled wait blocks before handing control back to the loop.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub endpoint: Endpoint,
    /// Put the listening socket in non-blocking mode.
    pub non_blocking: bool,
    /// Wait for connections with a timeout poll instead of a blocking accept.
    pub poll_accept: bool,
}

/// One capability, two ways to wait for it: the next inbound connection.
pub trait Accept {
    /// Wait for a connection. `Ok(None)` means the wait ended without one
    /// (poll timeout or a drained backlog) and the caller should try again.
    fn next_conn(&mut self) -> io::Result<Option<Stream>>;
}

/// Plain accept(2); blocks until the OS hands over a connection.
pub struct BlockingAcceptor {
    listener: Listener,
}

impl BlockingAcceptor {
    pub fn new(listener: Listener) -> Self {
        Self { listener }
    }
}

impl Accept for BlockingAcceptor {
    fn next_conn(&mut self) -> io::Result<Option<Stream>> {
        self.listener.accept().map(Some)
    }
}

const LISTENER_TOKEN: Token = Token(0);

/// Readiness-polled accept with a fixed timeout. mio readiness is
/// edge-triggered: once the listener reports ready, keep accepting until
/// the kernel says would-block before polling again, or connections already
/// queued in the backlog would never produce another wakeup.
pub struct PolledAcceptor {
    listener: Listener,
    poll: Poll,
    events: Events,
    timeout: Duration,
    ready: bool,
}

impl PolledAcceptor {
    pub fn new(listener: Listener, timeout: Duration) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        let poll = Poll::new()?;
        let fd = listener.as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), LISTENER_TOKEN, Interest::READABLE)?;
        Ok(Self {
            listener,
            poll,
            events: Events::with_capacity(4),
            timeout,
            ready: false,
        })
    }
}

impl Accept for PolledAcceptor {
    fn next_conn(&mut self) -> io::Result<Option<Stream>> {
        if !self.ready {
            self.events.clear();
            match self.poll.poll(&mut self.events, Some(self.timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(None),
                Err(e) => return Err(e),
            }
            if self.events.is_empty() {
                return Ok(None);
            }
            self.ready = true;
        }
        match self.listener.accept() {
            Ok(stream) => Ok(Some(stream)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.ready = false;
                Ok(None)
            }
            Err(e) => {
                self.ready = false;
                Err(e)
            }
        }
    }
}

/// Bind, listen, then serve connections one at a time forever. Setup
/// failures return `Err`; per-connection failures are logged and the loop
/// moves on.
pub fn run(config: &ServerConfig) -> Result<()> {
    let listener = Listener::bind(&config.endpoint, LISTEN_BACKLOG)
        .with_context(|| format!("fail to bind at [{}]", config.endpoint))?;

    if config.non_blocking {
        listener
            .set_nonblocking(true)
            .context("fail to set the listener non-blocking")?;
    }

    match listener.local_endpoint().context("no local addr")? {
        Endpoint::Inet(addr) => println!("INET server listening on port {}...", addr.port()),
        Endpoint::Local(path) => println!("UNIX server listening at {}...", path.display()),
    }

    let mut acceptor: Box<dyn Accept> = if config.poll_accept {
        Box::new(PolledAcceptor::new(listener, POLL_TIMEOUT).context("fail to set up the poll")?)
    } else {
        Box::new(BlockingAcceptor::new(listener))
    };

    loop {
        let wait_start = Instant::now();
        let mut stream = next_connection(acceptor.as_mut());
        println!(
            "Connection accepted in {:.6} seconds",
            wait_start.elapsed().as_secs_f64()
        );

        match drain(&mut stream) {
            Ok(n) => info!("drained {} bytes, the client has terminated", n),
            Err(e) => warn!("connection error [{}]", e),
        }
        // dropping the stream closes the connection
    }
}

/// Keep waiting until a connection actually arrives. Timeouts and
/// would-block conditions retry silently; a failed accept is logged and
/// the wait continues.
fn next_connection(acceptor: &mut dyn Accept) -> Stream {
    loop {
        match acceptor.next_conn() {
            Ok(Some(stream)) => return stream,
            Ok(None) => continue,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                continue
            }
            Err(e) => warn!("accept failed [{}]", e),
        }
    }
}

/// Read and discard everything the peer sends, returning the byte count.
/// Ends when the peer closes or the connection resets; would-block and
/// interrupted reads are retried.
pub fn drain(stream: &mut Stream) -> io::Result<u64> {
    let mut buf = [0u8; DRAIN_BUF_LEN];
    let mut total = 0u64;
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => total += n as u64,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                continue
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => return Ok(total),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_drain_counts_until_close() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let mut stream = Stream::Unix(local);

        peer.write_all(&[7u8; 1234]).unwrap();
        peer.write_all(&[7u8; 4321]).unwrap();
        drop(peer);

        assert_eq!(drain(&mut stream).unwrap(), 5555);
    }

    #[test]
    fn test_drain_empty_connection() {
        let (local, peer) = UnixStream::pair().unwrap();
        let mut stream = Stream::Unix(local);
        drop(peer);

        assert_eq!(drain(&mut stream).unwrap(), 0);
    }
}
