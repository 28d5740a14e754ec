use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::observe;
use crate::protocol::{self, RMCPPLUS_AUTH_TYPE, commands, payload_type};
use crate::session::{Action, PendingRequest, QueuedMessage, Session, SessionState};
use crate::types::{
    Bridge, CommandRequest, CommandResponse, PrivilegeLevel, RequestToken, ResponseSink,
    completion_code,
};

/// Timeout applied when the caller passes zero.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Upper bound on caller-requested timeouts.
pub(crate) const MAX_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Fixed pool sizes and negotiation policy for one table instance.
#[derive(Debug, Clone)]
pub(crate) struct TableConfig {
    pub max_sessions: usize,
    pub max_requests: usize,
    pub max_queued: usize,
    /// Bitmask of caller-enabled cipher suite ids.
    pub enabled_suites: u16,
    pub v2_enabled: bool,
    pub privilege: PrivilegeLevel,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            max_requests: 512,
            max_queued: 256,
            enabled_suites: protocol::SUPPORTED_SUITE_MASK,
            v2_enabled: true,
            privilege: PrivilegeLevel::Administrator,
        }
    }
}

/// A datagram to put on the wire.
pub(crate) type Outbound = (SocketAddr, Vec<u8>);

enum Route {
    Act(Action),
    Deliver(protocol::LanResponse),
    Discard(&'static str),
}

/// The session table: owns every session, its pending requests and queued
/// messages, and the fixed pool accounting. One instance per manager; the
/// manager's mutex guards all access.
pub(crate) struct SessionTable {
    config: TableConfig,
    sink: Arc<dyn ResponseSink>,
    sessions: HashMap<SocketAddr, Session>,
    requests_in_flight: usize,
    queued_in_flight: usize,
}

impl SessionTable {
    pub(crate) fn new(config: TableConfig, sink: Arc<dyn ResponseSink>) -> Self {
        Self {
            config,
            sink,
            sessions: HashMap::new(),
            requests_in_flight: 0,
            queued_in_flight: 0,
        }
    }

    /// Accept one caller command: find or create the session, then either
    /// send immediately (ACTIVE) or queue until the handshake completes.
    /// Local failures surface as a synthetic response through the sink.
    pub(crate) fn submit(&mut self, req: CommandRequest) -> Vec<Outbound> {
        let mut out = Vec::new();

        if req.data.len() > protocol::MAX_DATA_LEN {
            self.deliver_synthetic(req.token, req.netfn, req.cmd, req.addr, "data too long");
            return out;
        }
        if req.credentials.username.len() > 16 {
            self.deliver_synthetic(req.token, req.netfn, req.cmd, req.addr, "username too long");
            return out;
        }

        let timeout_ms = clamp_timeout(req.timeout);

        if !self.sessions.contains_key(&req.addr) {
            if self.sessions.len() >= self.config.max_sessions {
                observe::record_pool_exhausted("session");
                self.deliver_synthetic(
                    req.token,
                    req.netfn,
                    req.cmd,
                    req.addr,
                    "session pool exhausted",
                );
                return out;
            }

            let request_v2 = self.config.v2_enabled
                && (self.config.enabled_suites & protocol::SUPPORTED_SUITE_MASK) != 0;
            let mut session =
                Session::new(req.addr, req.credentials.clone(), self.config.privilege);
            match session.start(request_v2) {
                Ok(packet) => {
                    observe::record_session_opened(req.addr);
                    out.push((req.addr, packet));
                    self.sessions.insert(req.addr, session);
                }
                Err(_) => {
                    self.deliver_synthetic(
                        req.token,
                        req.netfn,
                        req.cmd,
                        req.addr,
                        "failed to open session",
                    );
                    return out;
                }
            }
        }

        let Some(session) = self.sessions.get_mut(&req.addr) else {
            self.deliver_synthetic(req.token, req.netfn, req.cmd, req.addr, "session vanished");
            return out;
        };
        if !session.is_active() {
            if self.queued_in_flight >= self.config.max_queued {
                observe::record_pool_exhausted("queued-message");
                self.deliver_synthetic(
                    req.token,
                    req.netfn,
                    req.cmd,
                    req.addr,
                    "message queue exhausted",
                );
                return out;
            }
            session.queued.push_back(QueuedMessage {
                netfn: req.netfn,
                cmd: req.cmd,
                data: req.data,
                bridge: req.bridge,
                token: req.token,
                timeout_ms,
            });
            self.queued_in_flight += 1;
            return out;
        }

        match self.send_on_active(
            req.addr, req.netfn, req.cmd, req.data, &req.bridge, timeout_ms, req.token,
        ) {
            Ok(packet) => out.push((req.addr, packet)),
            Err(reason) => self.deliver_synthetic(req.token, req.netfn, req.cmd, req.addr, reason),
        }
        out
    }

    /// Best-effort close for one destination. Pre-ACTIVE sessions are
    /// released locally; ACTIVE sessions get a Close Session command and are
    /// released when its response is delivered (or when they time out).
    pub(crate) fn close_session(&mut self, addr: SocketAddr, token: RequestToken) -> Vec<Outbound> {
        let Some(active) = self.sessions.get(&addr).map(Session::is_active) else {
            return Vec::new();
        };
        if !active {
            self.release_session(addr, "closed-before-active");
            return Vec::new();
        }

        let timeout_ms = DEFAULT_REQUEST_TIMEOUT.as_millis() as i64;
        match self.send_on_active(
            addr,
            commands::NETFN_APP,
            commands::CMD_CLOSE_SESSION,
            Vec::new(),
            &Bridge::Direct,
            timeout_ms,
            token,
        ) {
            Ok(packet) => vec![(addr, packet)],
            Err(reason) => {
                // Could not even build the request; drop the session locally.
                self.release_session(addr, reason);
                Vec::new()
            }
        }
    }

    /// Classify and route one inbound datagram. Anything that cannot be
    /// matched to a session, state, or pending request is discarded at debug
    /// level, never escalated.
    pub(crate) fn handle_datagram(&mut self, src: SocketAddr, bytes: &[u8]) -> Vec<Outbound> {
        crate::debug::dump_hex("inbound datagram", bytes);

        let Some(auth_type) = protocol::classify_datagram(bytes) else {
            observe::record_discard(src, "not-ipmi-rmcp");
            return Vec::new();
        };
        if !self.sessions.contains_key(&src) {
            observe::record_discard(src, "unknown-session");
            return Vec::new();
        }

        let route = if auth_type == RMCPPLUS_AUTH_TYPE {
            self.route_v20(src, bytes)
        } else {
            self.route_v15(src, bytes)
        };

        match route {
            Route::Act(action) => self.apply_action(src, action),
            Route::Deliver(resp) => {
                self.deliver_response(src, resp);
                Vec::new()
            }
            Route::Discard(reason) => {
                observe::record_discard(src, reason);
                Vec::new()
            }
        }
    }

    fn route_v15(&mut self, src: SocketAddr, bytes: &[u8]) -> Route {
        let Ok(packet) = protocol::parse_v15_packet(bytes) else {
            return Route::Discard("malformed-v15-header");
        };
        let Ok(resp) = protocol::parse_lan_response(&packet.message) else {
            return Route::Discard("bad-lan-checksum");
        };
        if resp.netfn & 0x01 == 0 {
            return Route::Discard("not-a-response");
        }

        let Some(session) = self.sessions.get_mut(&src) else {
            return Route::Discard("unknown-session");
        };

        if session.is_active() {
            if packet.auth_type != session.auth_type.as_u8()
                || packet.session_id != session.v15_session_id()
            {
                return Route::Discard("v15-session-mismatch");
            }
            session.refresh_idle_timeout();
            return Route::Deliver(resp);
        }

        if (resp.netfn & 0x3E) != commands::NETFN_APP {
            return Route::Discard("handshake-netfn-mismatch");
        }

        let action = match (session.state, resp.cmd) {
            (SessionState::AuthCapSent, commands::CMD_GET_CHANNEL_AUTH_CAP) => {
                if packet.auth_type != 0x00 || packet.session_id != 0 {
                    return Route::Discard("pre-session-header-mismatch");
                }
                session.handle_auth_cap(
                    &resp.data,
                    self.config.v2_enabled,
                    self.config.enabled_suites,
                )
            }
            (SessionState::ChallengeSent, commands::CMD_GET_SESSION_CHALLENGE) => {
                if packet.auth_type != 0x00 || packet.session_id != 0 {
                    return Route::Discard("pre-session-header-mismatch");
                }
                session.handle_challenge(&resp.data)
            }
            (SessionState::ActivateSent, commands::CMD_ACTIVATE_SESSION) => {
                session.handle_activate(packet.auth_type, packet.session_id, &resp.data)
            }
            (SessionState::PrivSent, commands::CMD_SET_SESSION_PRIV) => {
                session.handle_privlvl(packet.auth_type, packet.session_id, &resp.data)
            }
            _ => return Route::Discard("unexpected-handshake-step"),
        };
        Route::Act(action)
    }

    fn route_v20(&mut self, src: SocketAddr, bytes: &[u8]) -> Route {
        let Some(session) = self.sessions.get_mut(&src) else {
            return Route::Discard("unknown-session");
        };

        let packet = match protocol::decode_v20_packet(bytes, session.crypto_for_inbound()) {
            Ok(packet) => packet,
            Err(crate::error::Error::AuthenticationFailed(_)) => {
                return Route::Discard("v20-integrity-failed");
            }
            Err(_) => return Route::Discard("malformed-v20"),
        };

        match (session.state, packet.payload_type) {
            (SessionState::OpenSessionSent, payload_type::OPEN_SESSION_RESPONSE) => {
                Route::Act(session.handle_open_session_response(&packet.payload))
            }
            (SessionState::Rakp1Sent, payload_type::RAKP_2) => {
                Route::Act(session.handle_rakp2(&packet.payload))
            }
            (SessionState::Rakp3Sent, payload_type::RAKP_4) => {
                Route::Act(session.handle_rakp4(&packet.payload))
            }
            (SessionState::PrivV2Sent, payload_type::IPMI) => {
                let Ok(resp) = protocol::parse_lan_response(&packet.payload) else {
                    return Route::Discard("bad-lan-checksum");
                };
                if resp.cmd != commands::CMD_SET_SESSION_PRIV {
                    return Route::Discard("unexpected-handshake-step");
                }
                Route::Act(session.handle_privlvl_v2(packet.session_id, &resp.data))
            }
            (SessionState::Active, payload_type::IPMI) => {
                if !session.owns_v2_session_id(packet.session_id) {
                    return Route::Discard("v20-session-mismatch");
                }
                let Ok(resp) = protocol::parse_lan_response(&packet.payload) else {
                    return Route::Discard("bad-lan-checksum");
                };
                if resp.netfn & 0x01 == 0 {
                    return Route::Discard("not-a-response");
                }
                session.refresh_idle_timeout();
                Route::Deliver(resp)
            }
            _ => Route::Discard("unexpected-payload-type"),
        }
    }

    fn apply_action(&mut self, src: SocketAddr, action: Action) -> Vec<Outbound> {
        match action {
            Action::None => Vec::new(),
            Action::Send(packet) => vec![(src, packet)],
            Action::Activated => self.flush_queued(src),
            Action::Release(reason) => {
                self.release_session(src, reason);
                Vec::new()
            }
        }
    }

    /// Drain the queue of a freshly activated session, each message drawing
    /// a fresh sequence, in original enqueue order.
    fn flush_queued(&mut self, addr: SocketAddr) -> Vec<Outbound> {
        let mut out = Vec::new();
        loop {
            let msg = {
                let Some(session) = self.sessions.get_mut(&addr) else {
                    return out;
                };
                session.refresh_idle_timeout();
                match session.queued.pop_front() {
                    Some(msg) => msg,
                    None => return out,
                }
            };
            self.queued_in_flight -= 1;

            match self.send_on_active(
                addr,
                msg.netfn,
                msg.cmd,
                msg.data,
                &msg.bridge,
                msg.timeout_ms,
                msg.token,
            ) {
                Ok(packet) => out.push((addr, packet)),
                Err(reason) => {
                    self.deliver_synthetic(msg.token, msg.netfn, msg.cmd, addr, reason)
                }
            }
        }
    }

    /// Assign a sequence, register the pending request and build the wire
    /// packet for a command on an ACTIVE session.
    #[allow(clippy::too_many_arguments)]
    fn send_on_active(
        &mut self,
        addr: SocketAddr,
        netfn: u8,
        cmd: u8,
        mut data: Vec<u8>,
        bridge: &Bridge,
        timeout_ms: i64,
        token: RequestToken,
    ) -> std::result::Result<Vec<u8>, &'static str> {
        if self.requests_in_flight >= self.config.max_requests {
            observe::record_pool_exhausted("pending-request");
            return Err("request pool exhausted");
        }

        let session = self.sessions.get_mut(&addr).ok_or("session vanished")?;

        // Close Session takes the BMC's session id; fill it in when the
        // caller left the data empty.
        if (netfn & 0x3E) == commands::NETFN_APP
            && cmd == commands::CMD_CLOSE_SESSION
            && data.is_empty()
        {
            let id = if session.is_v2() {
                session.v2_bmc_session_id()
            } else {
                session.v15_session_id()
            };
            data.extend_from_slice(&id.to_le_bytes());
        }

        let (match_netfn, match_cmd, bridged) = pending_match_key(netfn, cmd, bridge);
        let Some(seq) = next_seq(session, match_netfn, match_cmd) else {
            return Err("sequence space exhausted");
        };

        session.pending.push(PendingRequest {
            seq,
            netfn: match_netfn,
            cmd: match_cmd,
            token,
            bridged,
            timeout_ms,
        });
        self.requests_in_flight += 1;

        match session.build_user_packet(netfn, cmd, seq, &data, bridge) {
            Ok(packet) => {
                session.refresh_idle_timeout();
                Ok(packet)
            }
            Err(_) => {
                // Roll the registration back; the caller gets the synthetic
                // failure instead of a slot that would only time out.
                session
                    .pending
                    .retain(|p| !(p.seq == seq && p.netfn == match_netfn && p.cmd == match_cmd));
                self.requests_in_flight -= 1;
                Err("failed to build packet")
            }
        }
    }

    /// Match an ACTIVE-session response to its pending request and deliver
    /// it; a close-session response also releases the session.
    fn deliver_response(&mut self, src: SocketAddr, resp: protocol::LanResponse) {
        let Some(session) = self.sessions.get_mut(&src) else {
            return;
        };
        let Some(pending) = find_seq(session, resp.netfn, resp.cmd, resp.rq_seq) else {
            observe::record_discard(src, "no-matching-request");
            return;
        };
        self.requests_in_flight -= 1;

        let netfn = resp.netfn;
        let cmd = resp.cmd;
        self.sink.deliver(CommandResponse {
            token: pending.token,
            netfn,
            cmd,
            data: resp.data,
        });
        observe::record_delivered(src, netfn, cmd);

        if (netfn & 0x3E) == commands::NETFN_APP && cmd == commands::CMD_CLOSE_SESSION {
            self.release_session(src, "closed");
        }
    }

    /// One reaper sweep: decrement every countdown by `elapsed_ms`, release
    /// what expired. Releasing an already-released session is a no-op.
    pub(crate) fn reap(&mut self, elapsed_ms: i64) {
        let mut expired = Vec::new();
        let mut freed = 0usize;

        for (addr, session) in self.sessions.iter_mut() {
            session.timeout_ms -= elapsed_ms;
            if session.timeout_ms <= 0 {
                expired.push(*addr);
                continue;
            }

            let addr = *addr;
            let before = session.pending.len();
            session.pending.retain_mut(|p| {
                p.timeout_ms -= elapsed_ms;
                if p.timeout_ms <= 0 {
                    tracing::debug!(
                        %addr,
                        netfn = p.netfn,
                        cmd = p.cmd,
                        seq = p.seq,
                        "pending request expired"
                    );
                    false
                } else {
                    true
                }
            });
            freed += before - session.pending.len();
        }

        self.requests_in_flight -= freed;
        for addr in expired {
            self.release_session(addr, "timeout");
        }
    }

    fn release_session(&mut self, addr: SocketAddr, reason: &'static str) {
        if let Some(session) = self.sessions.remove(&addr) {
            self.requests_in_flight -= session.pending.len();
            self.queued_in_flight -= session.queued.len();
            observe::record_session_released(addr, reason);
        }
    }

    fn deliver_synthetic(
        &self,
        token: RequestToken,
        netfn: u8,
        cmd: u8,
        addr: SocketAddr,
        reason: &'static str,
    ) {
        observe::record_synthetic_failure(addr, netfn, cmd, reason);
        self.sink.deliver(CommandResponse {
            token,
            netfn,
            cmd,
            data: vec![completion_code::NO_RESPONSE],
        });
    }
}

fn clamp_timeout(timeout: Duration) -> i64 {
    let ms = timeout.as_millis().min(MAX_REQUEST_TIMEOUT.as_millis()) as i64;
    if ms == 0 {
        DEFAULT_REQUEST_TIMEOUT.as_millis() as i64
    } else {
        ms
    }
}

/// The (netfn, cmd) key the response will actually carry. Bridged responses
/// come back under the App netfn: a tracked single-hop answer carries the
/// embedded command, a dual-hop answer the Send Message wrapper.
fn pending_match_key(netfn: u8, cmd: u8, bridge: &Bridge) -> (u8, u8, bool) {
    match bridge {
        Bridge::Direct => (netfn & 0x3E, cmd, false),
        Bridge::Single { .. } => (commands::NETFN_APP, cmd, true),
        Bridge::Dual { .. } => (commands::NETFN_APP, commands::CMD_SEND_MESSAGE, true),
    }
}

/// Scan the 6-bit sequence space starting at the cursor, skipping values
/// already pending for the same (netfn, cmd).
fn next_seq(session: &mut Session, netfn: u8, cmd: u8) -> Option<u8> {
    let start = session.seq_cursor;
    for i in 0..protocol::SEQ_SPACE {
        let seq = start.wrapping_add(i) & 0x3F;
        let conflict = session
            .pending
            .iter()
            .any(|p| p.seq == seq && p.netfn == netfn && p.cmd == cmd);
        if !conflict {
            session.seq_cursor = (seq + 1) & 0x3F;
            return Some(seq);
        }
    }
    tracing::debug!(addr = %session.addr, netfn, cmd, "sequence space exhausted");
    None
}

/// Remove and return the pending request matching a response. Bridged
/// requests additionally match one sequence back, for BMCs that answer on
/// the wrapper's sequence.
fn find_seq(session: &mut Session, netfn: u8, cmd: u8, seq: u8) -> Option<PendingRequest> {
    let netfn = netfn & 0x3E;
    let matches = |p: &PendingRequest, seq: u8| p.seq == seq && p.netfn == netfn && p.cmd == cmd;

    let pos = session
        .pending
        .iter()
        .position(|p| matches(p, seq))
        .or_else(|| {
            let fallback = seq.wrapping_sub(1) & 0x3F;
            session
                .pending
                .iter()
                .position(|p| p.bridged && matches(p, fallback))
        })?;
    Some(session.pending.swap_remove(pos))
}
