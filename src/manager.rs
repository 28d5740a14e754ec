use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::MAX_PACKET_LEN;
use crate::table::{Outbound, SessionTable, TableConfig};
use crate::transport::{UdpWire, Wire};
use crate::types::{CommandRequest, PrivilegeLevel, RequestToken, ResponseSink};

const DEFAULT_REAPER_PERIOD: Duration = Duration::from_millis(500);
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Builder for [`LanManager`].
#[derive(Debug, Clone)]
pub struct LanManagerBuilder {
    bind_addr: SocketAddr,
    privilege: PrivilegeLevel,
    enabled_suites: u16,
    v2_enabled: bool,
    max_sessions: usize,
    max_requests: usize,
    max_queued: usize,
    reaper_period: Duration,
}

impl Default for LanManagerBuilder {
    fn default() -> Self {
        let defaults = TableConfig::default();
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            privilege: defaults.privilege,
            enabled_suites: defaults.enabled_suites,
            v2_enabled: defaults.v2_enabled,
            max_sessions: defaults.max_sessions,
            max_requests: defaults.max_requests,
            max_queued: defaults.max_queued,
            reaper_period: DEFAULT_REAPER_PERIOD,
        }
    }
}

impl LanManagerBuilder {
    /// Create a builder with default pools and policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the UDP socket to a specific local address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Privilege level requested for every session.
    pub fn privilege(mut self, privilege: PrivilegeLevel) -> Self {
        self.privilege = privilege;
        self
    }

    /// Bitmask of enabled RMCP+ cipher suite ids. Suites this crate cannot
    /// negotiate are ignored; an empty intersection disables v2.0.
    pub fn enabled_cipher_suites(mut self, mask: u16) -> Self {
        self.enabled_suites = mask;
        self
    }

    /// Disable the v2.0 (RAKP) flow entirely; sessions use v1.5 only.
    pub fn v2_enabled(mut self, enabled: bool) -> Self {
        self.v2_enabled = enabled;
        self
    }

    /// Cap on concurrent sessions. The pool never grows.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Cap on concurrent in-flight requests across all sessions.
    pub fn max_requests(mut self, max: usize) -> Self {
        self.max_requests = max;
        self
    }

    /// Cap on commands queued behind incomplete handshakes.
    pub fn max_queued(mut self, max: usize) -> Self {
        self.max_queued = max;
        self
    }

    /// Interval between reaper sweeps.
    pub fn reaper_period(mut self, period: Duration) -> Self {
        self.reaper_period = period;
        self
    }

    /// Bind the socket and start the receiver and reaper threads.
    ///
    /// Failure to bind or to spawn either thread is fatal: the manager
    /// cannot provide its service without them, so `build` fails rather
    /// than limp along.
    pub fn build(self, sink: Arc<dyn ResponseSink>) -> Result<LanManager> {
        let wire = Arc::new(UdpWire::bind(self.bind_addr, RECV_POLL_INTERVAL)?);
        let local_addr = wire.local_addr()?;

        let config = TableConfig {
            max_sessions: self.max_sessions,
            max_requests: self.max_requests,
            max_queued: self.max_queued,
            enabled_suites: self.enabled_suites,
            v2_enabled: self.v2_enabled,
            privilege: self.privilege,
        };

        let shared = Arc::new(Shared {
            table: Mutex::new(SessionTable::new(config, sink)),
            reaper_cv: Condvar::new(),
            wire,
            reaper_period: self.reaper_period,
            shutdown: AtomicBool::new(false),
        });

        let receiver = std::thread::Builder::new()
            .name("ipmi-lan-recv".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_receiver(&shared)
            })?;
        let reaper = std::thread::Builder::new()
            .name("ipmi-lan-reaper".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_reaper(&shared)
            })?;

        tracing::info!(%local_addr, "ipmi lan manager started");

        Ok(LanManager {
            shared,
            local_addr,
            receiver: Some(receiver),
            reaper: Some(reaper),
        })
    }
}

/// Multiplexes caller commands over per-target IPMI LAN sessions.
///
/// One manager owns one UDP socket, a receiver thread, a reaper thread, and
/// the session table behind a single mutex. Responses (and synthetic local
/// failures) arrive through the [`ResponseSink`] passed at build time,
/// correlated by the caller's [`RequestToken`].
pub struct LanManager {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    receiver: Option<JoinHandle<()>>,
    reaper: Option<JoinHandle<()>>,
}

struct Shared {
    table: Mutex<SessionTable>,
    reaper_cv: Condvar,
    wire: Arc<UdpWire>,
    reaper_period: Duration,
    shutdown: AtomicBool,
}

impl LanManager {
    /// Create a [`LanManagerBuilder`].
    pub fn builder() -> LanManagerBuilder {
        LanManagerBuilder::new()
    }

    /// The local address of the bound UDP socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Submit one command. The response (or a synthetic failure with
    /// completion code [`crate::completion_code::NO_RESPONSE`]) is delivered
    /// through the sink; this call only fails when the manager is shut down
    /// or its lock is poisoned.
    pub fn submit(&self, request: CommandRequest) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Relaxed) {
            return Err(Error::Shutdown);
        }

        let out = self.lock_table()?.submit(request);
        self.send_all(&out);
        Ok(())
    }

    /// Close the session with one destination, if any. Best effort: the
    /// close response (delivered with `token`) releases the session, and a
    /// silent BMC is reaped on timeout.
    pub fn close_session(&self, addr: SocketAddr, token: RequestToken) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Relaxed) {
            return Err(Error::Shutdown);
        }

        let out = self.lock_table()?.close_session(addr, token);
        self.send_all(&out);
        Ok(())
    }

    /// Stop both threads and drop all session state.
    pub fn shutdown(mut self) {
        self.stop_threads();
    }

    fn lock_table(&self) -> Result<MutexGuard<'_, SessionTable>> {
        self.shared
            .table
            .lock()
            .map_err(|_| Error::Protocol("session table lock poisoned"))
    }

    fn send_all(&self, out: &[Outbound]) {
        for (addr, packet) in out {
            crate::debug::dump_hex("outbound datagram", packet);
            if let Err(e) = self.shared.wire.send_to(packet, *addr) {
                // The caller sees a timeout; nothing else to do here.
                tracing::warn!(%addr, error = %e, "failed to send datagram");
            }
        }
    }

    fn stop_threads(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.reaper_cv.notify_all();
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reaper.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LanManager {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

/// Blocking receive loop: one datagram in, zero or more datagrams out.
fn run_receiver(shared: &Shared) {
    let mut buf = vec![0u8; MAX_PACKET_LEN];

    while !shared.shutdown.load(Ordering::Relaxed) {
        match shared.wire.recv_from(&mut buf) {
            Ok(Some((n, src))) => {
                let out = match shared.table.lock() {
                    Ok(mut table) => table.handle_datagram(src, &buf[..n]),
                    Err(poisoned) => poisoned.into_inner().handle_datagram(src, &buf[..n]),
                };
                for (addr, packet) in out {
                    crate::debug::dump_hex("outbound datagram", &packet);
                    if let Err(e) = shared.wire.send_to(&packet, addr) {
                        tracing::warn!(%addr, error = %e, "failed to send datagram");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "receive failure");
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// Periodic sweep decrementing session and request countdowns. The condvar
/// shares the table mutex, so a sweep and the receive path never overlap.
fn run_reaper(shared: &Shared) {
    let period_ms = shared.reaper_period.as_millis() as i64;

    let mut table = match shared.table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    loop {
        let (guard, _timeout) = match shared.reaper_cv.wait_timeout(table, shared.reaper_period) {
            Ok(res) => res,
            Err(poisoned) => {
                let (guard, timeout) = poisoned.into_inner();
                (guard, timeout)
            }
        };
        table = guard;

        if shared.shutdown.load(Ordering::Relaxed) {
            return;
        }
        table.reap(period_ms);
    }
}
