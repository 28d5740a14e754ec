use std::collections::VecDeque;
use std::net::SocketAddr;

use zeroize::Zeroizing;

use crate::crypto::{KeyedHash, fill_random, random_u32};
use crate::error::{Error, Result};
use crate::protocol::{
    self, SessionCrypto, V15AuthCode, commands, open_status, payload_type,
};
use crate::types::{AuthType, Bridge, Credentials, PrivilegeLevel, RequestToken};

/// Countdown granted to a session while it negotiates.
pub(crate) const SESSION_SETUP_TIMEOUT_MS: i64 = 15_000;

/// Countdown granted to an ACTIVE session between messages.
pub(crate) const SESSION_IDLE_TIMEOUT_MS: i64 = 60_000;

/// Auth type support bits from Get Channel Authentication Capabilities.
const AUTH_BIT_NONE: u8 = 0x01;
const AUTH_BIT_MD5: u8 = 0x04;
const AUTH_BIT_PASSWORD: u8 = 0x10;
/// Bit 7 of the auth support byte: IPMI v2.0 extended data available.
const AUTH_V2_CAPABLE: u8 = 0x80;

/// Auth status byte: per-message authentication disabled.
const STATUS_PER_MSG_AUTH_DISABLED: u8 = 0x10;

/// Session handshake progression. Transitions are strictly forward except
/// the single cipher-suite retry, which re-enters `OpenSessionSent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    AuthCapSent,
    // v1.5
    ChallengeSent,
    ActivateSent,
    PrivSent,
    // v2.0
    OpenSessionSent,
    Rakp1Sent,
    Rakp3Sent,
    PrivV2Sent,
    Active,
}

/// What the table should do after a handshake step was processed.
pub(crate) enum Action {
    /// Nothing; the datagram was ignored or consumed silently.
    None,
    /// Send the next handshake packet.
    Send(Vec<u8>),
    /// The session reached ACTIVE; flush queued messages.
    Activated,
    /// Fatal handshake failure; release the session.
    Release(&'static str),
}

/// One in-flight command awaiting its response.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub seq: u8,
    /// Request netfn with the response bit masked off.
    pub netfn: u8,
    pub cmd: u8,
    pub token: RequestToken,
    pub bridged: bool,
    pub timeout_ms: i64,
}

/// A caller command accepted while the session is still negotiating.
#[derive(Debug)]
pub(crate) struct QueuedMessage {
    pub netfn: u8,
    pub cmd: u8,
    pub data: Vec<u8>,
    pub bridge: Bridge,
    pub token: RequestToken,
    pub timeout_ms: i64,
}

/// One conversation with a (host, port) target.
pub(crate) struct Session {
    pub addr: SocketAddr,
    pub state: SessionState,
    privilege: PrivilegeLevel,
    credentials: Credentials,

    /// v1.5 auth type; `RmcpPlus` once the session switched to v2.0.
    pub auth_type: AuthType,
    per_msg_auth_disabled: bool,

    // v1.5 session parameters.
    session_id: u32,
    challenge: [u8; 16],
    outbound_seq: u32,
    /// rq_seq counter private to handshake traffic; user traffic draws
    /// from the correlator instead.
    handshake_seq: u8,

    // v2.0 session parameters.
    console_session_id: u32,
    bmc_session_id: u32,
    console_random: [u8; 16],
    bmc_random: [u8; 16],
    bmc_guid: [u8; 16],
    cipher_suite: u8,
    suite_retry_done: bool,
    auth_hash: KeyedHash,
    integrity_alg: u8,
    confidentiality_alg: u8,
    msg_tag: u8,
    session_seq: u32,
    sik: Zeroizing<Vec<u8>>,
    crypto: Option<SessionCrypto>,

    // Correlator state owned by this session.
    pub seq_cursor: u8,
    pub pending: Vec<PendingRequest>,
    pub queued: VecDeque<QueuedMessage>,

    /// Countdown decremented by the reaper; expiry releases the session.
    pub timeout_ms: i64,
}

impl Session {
    pub(crate) fn new(
        addr: SocketAddr,
        credentials: Credentials,
        privilege: PrivilegeLevel,
    ) -> Self {
        Self {
            addr,
            state: SessionState::AuthCapSent,
            privilege,
            credentials,
            auth_type: AuthType::None,
            per_msg_auth_disabled: false,
            session_id: 0,
            challenge: [0u8; 16],
            outbound_seq: 0,
            handshake_seq: 0,
            console_session_id: 0,
            bmc_session_id: 0,
            console_random: [0u8; 16],
            bmc_random: [0u8; 16],
            bmc_guid: [0u8; 16],
            cipher_suite: 0,
            suite_retry_done: false,
            auth_hash: KeyedHash::None,
            integrity_alg: protocol::algorithm::INTEGRITY_NONE,
            confidentiality_alg: protocol::algorithm::CONFIDENTIALITY_NONE,
            msg_tag: 0,
            session_seq: 0,
            sik: Zeroizing::new(Vec::new()),
            crypto: None,
            seq_cursor: 0,
            pending: Vec::new(),
            queued: VecDeque::new(),
            timeout_ms: SESSION_SETUP_TIMEOUT_MS,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub(crate) fn is_v2(&self) -> bool {
        self.auth_type == AuthType::RmcpPlus
    }

    pub(crate) fn v15_session_id(&self) -> u32 {
        self.session_id
    }

    pub(crate) fn v2_bmc_session_id(&self) -> u32 {
        self.bmc_session_id
    }

    pub(crate) fn crypto_for_inbound(&self) -> Option<&SessionCrypto> {
        self.crypto.as_ref()
    }

    /// Whether an inbound session id belongs to this session. Some BMCs echo
    /// the console id, some their own; accept either.
    pub(crate) fn owns_v2_session_id(&self, id: u32) -> bool {
        id == self.console_session_id || id == self.bmc_session_id
    }

    pub(crate) fn refresh_idle_timeout(&mut self) {
        self.timeout_ms = SESSION_IDLE_TIMEOUT_MS;
    }

    // -----------------------------------------------------------------------
    // Handshake: shared first step
    // -----------------------------------------------------------------------

    /// Build the opening get-channel-authentication-capabilities request.
    ///
    /// `request_v2` sets the v2.0-extended bit so a v2.0-capable BMC
    /// advertises itself.
    pub(crate) fn start(&mut self, request_v2: bool) -> Result<Vec<u8>> {
        self.state = SessionState::AuthCapSent;
        let channel = if request_v2 {
            commands::LAN_CHANNEL_E | 0x80
        } else {
            commands::LAN_CHANNEL_E
        };
        self.send_v15_cmd(
            commands::NETFN_APP,
            commands::CMD_GET_CHANNEL_AUTH_CAP,
            &[channel, self.privilege.as_u8()],
        )
    }

    /// Process the auth capabilities response. Chooses between the v2.0
    /// (RAKP) flow and the v1.5 challenge flow.
    pub(crate) fn handle_auth_cap(
        &mut self,
        data: &[u8],
        v2_enabled: bool,
        enabled_suites: u16,
    ) -> Action {
        if data.len() < 9 || data[0] != 0x00 {
            tracing::debug!(addr = %self.addr, "invalid auth capabilities response");
            return Action::None;
        }

        let auth_support = data[2];
        let auth_status = data[3];
        self.per_msg_auth_disabled = (auth_status & STATUS_PER_MSG_AUTH_DISABLED) != 0;

        let usable_suites = enabled_suites & protocol::SUPPORTED_SUITE_MASK;
        if v2_enabled && usable_suites != 0 && (auth_support & AUTH_V2_CAPABLE) != 0 {
            let Some(suite) = protocol::SUITE_PREFERENCE
                .iter()
                .copied()
                .find(|&id| usable_suites & (1 << id) != 0)
            else {
                return Action::Release("no usable cipher suite enabled");
            };

            self.auth_type = AuthType::RmcpPlus;
            self.cipher_suite = suite;
            self.console_session_id = random_u32();
            return match self.build_open_session() {
                Ok(packet) => Action::Send(packet),
                Err(_) => Action::Release("failed to build open session request"),
            };
        }

        // v1.5: strongest usable auth type. MD2 is deliberately never
        // selected; the algorithm is broken and left unimplemented.
        let have_password = !self.credentials.password.is_empty();
        self.auth_type = if have_password && (auth_support & AUTH_BIT_MD5) != 0 {
            AuthType::Md5
        } else if have_password && (auth_support & AUTH_BIT_PASSWORD) != 0 {
            AuthType::Password
        } else if (auth_support & AUTH_BIT_NONE) != 0 {
            AuthType::None
        } else {
            return Action::Release("no supported authentication type");
        };

        tracing::debug!(
            addr = %self.addr,
            auth_type = ?self.auth_type,
            per_msg_auth_disabled = self.per_msg_auth_disabled,
            "v1.5 authentication selected"
        );

        self.state = SessionState::ChallengeSent;
        let mut data = Vec::with_capacity(17);
        data.push(self.auth_type.as_u8());
        data.extend_from_slice(&self.username16());
        match self.send_v15_cmd(commands::NETFN_APP, commands::CMD_GET_SESSION_CHALLENGE, &data) {
            Ok(packet) => Action::Send(packet),
            Err(_) => Action::Release("failed to build session challenge request"),
        }
    }

    // -----------------------------------------------------------------------
    // Handshake: v1.5
    // -----------------------------------------------------------------------

    pub(crate) fn handle_challenge(&mut self, data: &[u8]) -> Action {
        if data.len() < 21 || data[0] != 0x00 {
            tracing::debug!(addr = %self.addr, "invalid session challenge response");
            return Action::None;
        }

        self.session_id = u32::from_le_bytes(data[1..5].try_into().unwrap_or_default());
        self.challenge.copy_from_slice(&data[5..21]);

        tracing::debug!(
            addr = %self.addr,
            session_id = format_args!("{:08X}", self.session_id),
            "received session challenge"
        );

        self.state = SessionState::ActivateSent;

        // Fresh random initial outbound sequence, never zero.
        let initial_seq = (random_u32() & 0x0FFF_FFFF) | 0x0000_0001;
        let mut req = Vec::with_capacity(22);
        req.push(self.auth_type.as_u8());
        req.push(self.privilege.as_u8());
        req.extend_from_slice(&self.challenge);
        req.extend_from_slice(&initial_seq.to_le_bytes());

        match self.send_v15_cmd(commands::NETFN_APP, commands::CMD_ACTIVATE_SESSION, &req) {
            Ok(packet) => Action::Send(packet),
            Err(_) => Action::Release("failed to build activate session request"),
        }
    }

    pub(crate) fn handle_activate(&mut self, packet_auth_type: u8, session_id: u32, data: &[u8]) -> Action {
        if packet_auth_type != self.auth_type.as_u8()
            || session_id != self.session_id
            || data.len() < 11
            || data[0] != 0x00
        {
            tracing::debug!(addr = %self.addr, "invalid activate session response");
            return Action::None;
        }

        if self.per_msg_auth_disabled {
            self.auth_type = AuthType::None;
        } else if self.auth_type.as_u8() != (data[1] & 0x0F) {
            tracing::debug!(
                addr = %self.addr,
                auth_type = data[1] & 0x0F,
                "activate response switched authentication type"
            );
            return Action::None;
        }

        self.session_id = u32::from_le_bytes(data[2..6].try_into().unwrap_or_default());
        self.outbound_seq = u32::from_le_bytes(data[6..10].try_into().unwrap_or_default());
        if self.outbound_seq == 0 {
            self.outbound_seq = 1;
        }

        tracing::info!(
            addr = %self.addr,
            session_id = format_args!("{:08X}", self.session_id),
            auth_type = ?self.auth_type,
            max_privilege = data[10] & 0x0F,
            "v1.5 session activated"
        );

        if self.privilege.as_u8() <= PrivilegeLevel::User.as_u8() {
            self.state = SessionState::Active;
            return Action::Activated;
        }

        self.state = SessionState::PrivSent;
        match self.send_v15_cmd(
            commands::NETFN_APP,
            commands::CMD_SET_SESSION_PRIV,
            &[self.privilege.as_u8()],
        ) {
            Ok(packet) => Action::Send(packet),
            Err(_) => Action::Release("failed to build set privilege request"),
        }
    }

    pub(crate) fn handle_privlvl(&mut self, packet_auth_type: u8, session_id: u32, data: &[u8]) -> Action {
        if packet_auth_type != self.auth_type.as_u8()
            || session_id != self.session_id
            || data.len() < 2
            || data[0] != 0x00
        {
            tracing::debug!(addr = %self.addr, "invalid set privilege response");
            return Action::None;
        }

        tracing::debug!(addr = %self.addr, privilege = data[1] & 0x0F, "privilege level set");
        self.state = SessionState::Active;
        Action::Activated
    }

    // -----------------------------------------------------------------------
    // Handshake: v2.0 / RAKP
    // -----------------------------------------------------------------------

    fn build_open_session(&mut self) -> Result<Vec<u8>> {
        let (auth, integrity, conf) = protocol::cipher_suite_algorithms(self.cipher_suite)
            .ok_or(Error::Unsupported("cipher suite not implemented"))?;

        self.state = SessionState::OpenSessionSent;
        self.msg_tag = (random_u32() & 0xFF) as u8;

        let payload = protocol::build_open_session_request(
            self.msg_tag,
            self.privilege,
            self.console_session_id,
            auth,
            integrity,
            conf,
        );
        protocol::encode_v20_packet(
            payload_type::OPEN_SESSION_REQUEST,
            0,
            0,
            &payload,
            false,
            false,
            None,
        )
    }

    pub(crate) fn handle_open_session_response(&mut self, payload: &[u8]) -> Action {
        let Ok(resp) = protocol::parse_open_session_response(payload) else {
            tracing::debug!(addr = %self.addr, "malformed open session response");
            return Action::None;
        };

        if resp.message_tag != self.msg_tag {
            tracing::debug!(addr = %self.addr, "open session response tag mismatch");
            return Action::None;
        }

        if resp.status_code != open_status::NO_ERRORS {
            if open_status::is_algorithm_rejection(resp.status_code) && !self.suite_retry_done {
                tracing::debug!(
                    addr = %self.addr,
                    status = format_args!("{:#04x}", resp.status_code),
                    retry_suite = protocol::RETRY_SUITE,
                    "cipher suite rejected, retrying with weaker suite"
                );
                self.suite_retry_done = true;
                self.cipher_suite = protocol::RETRY_SUITE;
                return match self.build_open_session() {
                    Ok(packet) => Action::Send(packet),
                    Err(_) => Action::Release("failed to rebuild open session request"),
                };
            }
            return Action::Release("open session rejected");
        }

        if resp.console_session_id != self.console_session_id {
            tracing::debug!(addr = %self.addr, "open session console id mismatch");
            return Action::None;
        }

        let Some((auth, integrity, conf)) = protocol::cipher_suite_algorithms(self.cipher_suite)
        else {
            return Action::Release("cipher suite vanished");
        };
        if resp.auth_algorithm != auth
            || resp.integrity_algorithm != integrity
            || resp.confidentiality_algorithm != conf
        {
            return Action::Release("BMC selected algorithms we did not propose");
        }

        let Ok(auth_hash) = protocol::auth_algorithm_hash(auth) else {
            return Action::Release("unsupported RAKP algorithm accepted");
        };
        self.auth_hash = auth_hash;
        self.integrity_alg = integrity;
        self.confidentiality_alg = conf;
        self.bmc_session_id = resp.bmc_session_id;

        self.state = SessionState::Rakp1Sent;
        self.msg_tag = (random_u32() & 0xFF) as u8;
        fill_random(&mut self.console_random);

        let Ok(payload) = protocol::build_rakp1(
            self.msg_tag,
            self.bmc_session_id,
            &self.console_random,
            self.privilege,
            &self.credentials.username,
        ) else {
            return Action::Release("failed to build RAKP message 1");
        };

        match protocol::encode_v20_packet(payload_type::RAKP_1, 0, 0, &payload, false, false, None)
        {
            Ok(packet) => Action::Send(packet),
            Err(_) => Action::Release("failed to encode RAKP message 1"),
        }
    }

    pub(crate) fn handle_rakp2(&mut self, payload: &[u8]) -> Action {
        let code_len = self.auth_hash.digest_len();
        let Ok(rakp2) = protocol::parse_rakp2(payload, code_len) else {
            tracing::debug!(addr = %self.addr, "malformed RAKP message 2");
            return Action::None;
        };

        if rakp2.message_tag != self.msg_tag {
            tracing::debug!(addr = %self.addr, "RAKP message 2 tag mismatch");
            return Action::None;
        }
        if rakp2.status_code != open_status::NO_ERRORS {
            return Action::Release("RAKP message 2 reported failure");
        }
        if rakp2.console_session_id != self.console_session_id {
            tracing::debug!(addr = %self.addr, "RAKP message 2 console id mismatch");
            return Action::None;
        }

        let user_key = self.user_key();
        let expected = protocol::rakp2_auth_code(
            self.auth_hash,
            &user_key,
            self.console_session_id,
            self.bmc_session_id,
            &self.console_random,
            &rakp2.bmc_random,
            &rakp2.bmc_guid,
            self.privilege,
            &self.credentials.username,
        );
        match expected {
            Ok(code) if crate::crypto::ct_eq(&code, &rakp2.key_exchange_auth_code) => {}
            Ok(_) => return Action::Release("RAKP message 2 authentication code mismatch"),
            Err(_) => return Action::Release("RAKP message 2 code computation failed"),
        }

        self.bmc_random = rakp2.bmc_random;
        self.bmc_guid = rakp2.bmc_guid;

        self.state = SessionState::Rakp3Sent;
        self.msg_tag = (random_u32() & 0xFF) as u8;

        let Ok(code) = protocol::rakp3_auth_code(
            self.auth_hash,
            &user_key,
            &self.bmc_random,
            self.console_session_id,
            self.privilege,
            &self.credentials.username,
        ) else {
            return Action::Release("RAKP message 3 code computation failed");
        };

        let payload = protocol::build_rakp3(self.msg_tag, self.bmc_session_id, &code);
        match protocol::encode_v20_packet(payload_type::RAKP_3, 0, 0, &payload, false, false, None)
        {
            Ok(packet) => Action::Send(packet),
            Err(_) => Action::Release("failed to encode RAKP message 3"),
        }
    }

    pub(crate) fn handle_rakp4(&mut self, payload: &[u8]) -> Action {
        let icv_len = match self.auth_hash {
            KeyedHash::None => 0,
            KeyedHash::Sha1 => 12,
            KeyedHash::Md5 => 16,
        };
        let Ok(rakp4) = protocol::parse_rakp4(payload, icv_len) else {
            tracing::debug!(addr = %self.addr, "malformed RAKP message 4");
            return Action::None;
        };

        if rakp4.message_tag != self.msg_tag {
            tracing::debug!(addr = %self.addr, "RAKP message 4 tag mismatch");
            return Action::None;
        }
        if rakp4.status_code != open_status::NO_ERRORS {
            return Action::Release("RAKP message 4 reported failure");
        }
        if rakp4.console_session_id != self.console_session_id {
            tracing::debug!(addr = %self.addr, "RAKP message 4 console id mismatch");
            return Action::None;
        }

        // Keys exist only from here on.
        let kg = match &self.credentials.bmc_key {
            Some(kg) => kg.to_key(self.auth_hash.digest_len().max(1)),
            None => self.user_key(),
        };
        let Ok(sik) = protocol::compute_sik(
            self.auth_hash,
            &kg,
            &self.console_random,
            &self.bmc_random,
            self.privilege,
            &self.credentials.username,
        ) else {
            return Action::Release("SIK computation failed");
        };
        self.sik = Zeroizing::new(sik);

        if self.auth_hash != KeyedHash::None {
            let expected = protocol::rakp4_icv(
                self.auth_hash,
                &self.sik,
                &self.console_random,
                self.bmc_session_id,
                &self.bmc_guid,
                icv_len,
            );
            match expected {
                Ok(code) if crate::crypto::ct_eq(&code, &rakp4.integrity_check_value) => {}
                Ok(_) => return Action::Release("RAKP message 4 integrity check mismatch"),
                Err(_) => return Action::Release("RAKP message 4 ICV computation failed"),
            }
        }

        let integrity_hash = match protocol::integrity_algorithm_hash(self.integrity_alg) {
            Ok(h) => h,
            Err(_) => return Action::Release("unsupported integrity algorithm"),
        };

        let needs_keys = integrity_hash != KeyedHash::None
            || self.confidentiality_alg != protocol::algorithm::CONFIDENTIALITY_NONE;
        if needs_keys {
            let keys = match protocol::derive_session_keys(self.auth_hash, &self.sik) {
                Ok(keys) => keys,
                Err(_) => return Action::Release("session key derivation failed"),
            };
            let aes_key = (self.confidentiality_alg
                != protocol::algorithm::CONFIDENTIALITY_NONE)
                .then_some(keys.aes_key);
            self.crypto = Some(SessionCrypto {
                integrity: integrity_hash,
                k1: keys.k1,
                aes_key,
            });
        } else {
            self.crypto = Some(SessionCrypto {
                integrity: KeyedHash::None,
                k1: Vec::new(),
                aes_key: None,
            });
        }

        tracing::info!(
            addr = %self.addr,
            cipher_suite = self.cipher_suite,
            bmc_session_id = format_args!("{:08X}", self.bmc_session_id),
            "RAKP exchange complete"
        );

        self.state = SessionState::PrivV2Sent;
        self.session_seq = 0;
        let rq_seq = self.next_handshake_seq();
        match self.build_v20_user_packet(
            commands::NETFN_APP,
            commands::CMD_SET_SESSION_PRIV,
            rq_seq,
            &[self.privilege.as_u8()],
            &Bridge::Direct,
        ) {
            Ok(packet) => Action::Send(packet),
            Err(_) => Action::Release("failed to build v2.0 set privilege request"),
        }
    }

    pub(crate) fn handle_privlvl_v2(&mut self, session_id: u32, data: &[u8]) -> Action {
        if !self.owns_v2_session_id(session_id) || data.is_empty() || data[0] != 0x00 {
            tracing::debug!(addr = %self.addr, "invalid v2.0 set privilege response");
            return Action::None;
        }

        tracing::info!(
            addr = %self.addr,
            privilege = self.privilege.as_u8(),
            "v2.0 session active"
        );
        self.state = SessionState::Active;
        self.session_seq = 1;
        Action::Activated
    }

    // -----------------------------------------------------------------------
    // Outbound building
    // -----------------------------------------------------------------------

    /// Build a user command packet on an ACTIVE (or privilege-pending v2.0)
    /// session, consuming the caller-assigned rq_seq.
    pub(crate) fn build_user_packet(
        &mut self,
        netfn: u8,
        cmd: u8,
        rq_seq: u8,
        data: &[u8],
        bridge: &Bridge,
    ) -> Result<Vec<u8>> {
        if self.is_v2() {
            self.build_v20_user_packet(netfn, cmd, rq_seq, data, bridge)
        } else {
            let message = protocol::encode_bridged_message(netfn, cmd, rq_seq, data, bridge)?;
            let (auth_type, auth) = self.v15_wire_auth();
            let packet = protocol::encode_v15_packet(
                auth_type,
                self.outbound_seq,
                self.session_id,
                &auth,
                &message,
            )?;
            self.advance_outbound_seq();
            Ok(packet)
        }
    }

    fn build_v20_user_packet(
        &mut self,
        netfn: u8,
        cmd: u8,
        rq_seq: u8,
        data: &[u8],
        bridge: &Bridge,
    ) -> Result<Vec<u8>> {
        let message = protocol::encode_bridged_message(netfn, cmd, rq_seq, data, bridge)?;

        let encrypted =
            self.confidentiality_alg != protocol::algorithm::CONFIDENTIALITY_NONE;
        let authenticated = self.integrity_alg != protocol::algorithm::INTEGRITY_NONE;

        let payload = if encrypted {
            let crypto = self
                .crypto
                .as_ref()
                .ok_or(Error::Protocol("no session keys derived"))?;
            let aes_key = crypto
                .aes_key
                .as_ref()
                .ok_or(Error::Protocol("no confidentiality key"))?;
            let mut iv = [0u8; 16];
            fill_random(&mut iv);
            protocol::encrypt_payload_aes(&message, aes_key, &iv)?
        } else {
            message
        };

        self.session_seq = self.session_seq.wrapping_add(1);
        protocol::encode_v20_packet(
            payload_type::IPMI,
            self.bmc_session_id,
            self.session_seq,
            &payload,
            authenticated,
            encrypted,
            self.crypto.as_ref(),
        )
    }

    /// Handshake commands frame their own v1.5 packet with the private
    /// handshake rq_seq counter.
    fn send_v15_cmd(&mut self, netfn: u8, cmd: u8, data: &[u8]) -> Result<Vec<u8>> {
        let rq_seq = self.next_handshake_seq();
        let message = protocol::encode_lan_message(netfn, cmd, rq_seq, data)?;
        let (auth_type, auth) = self.v15_wire_auth();
        let packet = protocol::encode_v15_packet(
            auth_type,
            self.outbound_seq,
            self.session_id,
            &auth,
            &message,
        )?;
        self.advance_outbound_seq();
        Ok(packet)
    }

    fn next_handshake_seq(&mut self) -> u8 {
        let seq = self.handshake_seq;
        self.handshake_seq = (self.handshake_seq + 1) & 0x3F;
        seq
    }

    /// Auth type byte and per-message code for the current v1.5 state.
    /// Messages up to and including get-session-challenge go out
    /// unauthenticated; activate-session and later carry the negotiated
    /// code.
    fn v15_wire_auth(&self) -> (u8, V15AuthCode) {
        let authenticated = matches!(
            self.state,
            SessionState::ActivateSent | SessionState::PrivSent | SessionState::Active
        );
        if !authenticated {
            return (0x00, V15AuthCode::None);
        }

        let password = self.credentials.password.to_password16();
        match self.auth_type {
            AuthType::None => (0x00, V15AuthCode::None),
            AuthType::Md5 => (self.auth_type.as_u8(), V15AuthCode::Md5 { password }),
            AuthType::Password => (self.auth_type.as_u8(), V15AuthCode::Password(password)),
            // MD2 is never negotiated; RMCP+ uses the v2.0 wire path.
            AuthType::Md2 | AuthType::RmcpPlus => (0x00, V15AuthCode::None),
        }
    }

    fn advance_outbound_seq(&mut self) {
        if self.outbound_seq != 0 {
            self.outbound_seq = self.outbound_seq.wrapping_add(1);
            if self.outbound_seq == 0 {
                self.outbound_seq = 1;
            }
        }
    }

    fn username16(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        let n = self.credentials.username.len().min(16);
        out[..n].copy_from_slice(&self.credentials.username[..n]);
        out
    }

    /// Password normalized to the auth algorithm's digest length, the form
    /// RAKP uses as HMAC key.
    fn user_key(&self) -> Zeroizing<Vec<u8>> {
        self.credentials
            .password
            .to_key(self.auth_hash.digest_len().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new(
            "192.0.2.1:623".parse().expect("addr"),
            Credentials::new("root", "secret"),
            PrivilegeLevel::Administrator,
        )
    }

    #[test]
    fn auth_cap_selects_md5_over_none() {
        let mut sess = test_session();
        let _ = sess.start(false).expect("start");

        // cc, channel, auth support {MD5, NONE}, status, v2 data...
        let data = [0x00, 0x0E, AUTH_BIT_MD5 | AUTH_BIT_NONE, 0x00, 0x00, 0, 0, 0, 0];
        let action = sess.handle_auth_cap(&data, true, protocol::SUPPORTED_SUITE_MASK);

        assert!(matches!(action, Action::Send(_)));
        assert_eq!(sess.auth_type, AuthType::Md5);
        assert_eq!(sess.state, SessionState::ChallengeSent);
    }

    #[test]
    fn auth_cap_falls_back_to_none_without_password() {
        let mut sess = Session::new(
            "192.0.2.1:623".parse().expect("addr"),
            Credentials::new("root", ""),
            PrivilegeLevel::Administrator,
        );
        let _ = sess.start(false).expect("start");

        let data = [0x00, 0x0E, AUTH_BIT_MD5 | AUTH_BIT_NONE, 0x00, 0x00, 0, 0, 0, 0];
        let action = sess.handle_auth_cap(&data, false, 0);

        assert!(matches!(action, Action::Send(_)));
        assert_eq!(sess.auth_type, AuthType::None);
    }

    #[test]
    fn auth_cap_with_v2_bit_enters_rakp_flow() {
        let mut sess = test_session();
        let _ = sess.start(true).expect("start");

        let data = [
            0x00,
            0x0E,
            AUTH_V2_CAPABLE | AUTH_BIT_MD5 | AUTH_BIT_NONE,
            0x00,
            0x03,
            0,
            0,
            0,
            0,
        ];
        let action = sess.handle_auth_cap(&data, true, protocol::SUPPORTED_SUITE_MASK);

        assert!(matches!(action, Action::Send(_)));
        assert_eq!(sess.auth_type, AuthType::RmcpPlus);
        assert_eq!(sess.state, SessionState::OpenSessionSent);
        assert_eq!(sess.cipher_suite, 3);
    }

    #[test]
    fn activate_with_user_privilege_skips_priv_step() {
        let mut sess = Session::new(
            "192.0.2.1:623".parse().expect("addr"),
            Credentials::new("guest", "secret"),
            PrivilegeLevel::User,
        );
        let _ = sess.start(false).expect("start");
        let data = [0x00, 0x0E, AUTH_BIT_MD5 | AUTH_BIT_NONE, 0x00, 0x00, 0, 0, 0, 0];
        let _ = sess.handle_auth_cap(&data, false, 0);

        let mut challenge = vec![0x00, 0x44, 0x33, 0x22, 0x11];
        challenge.extend_from_slice(&[0xAB; 16]);
        let _ = sess.handle_challenge(&challenge);
        assert_eq!(sess.state, SessionState::ActivateSent);

        let mut activate = vec![0x00, AuthType::Md5.as_u8()];
        activate.extend_from_slice(&0x8899AABBu32.to_le_bytes());
        activate.extend_from_slice(&7u32.to_le_bytes());
        activate.push(0x04);
        let action = sess.handle_activate(AuthType::Md5.as_u8(), 0x11223344, &activate);

        assert!(matches!(action, Action::Activated));
        assert_eq!(sess.state, SessionState::Active);
    }

    #[test]
    fn open_session_rejection_retries_once_with_suite_1() {
        let mut sess = test_session();
        let _ = sess.start(true).expect("start");
        let data = [0x00, 0x0E, AUTH_V2_CAPABLE | AUTH_BIT_NONE, 0x00, 0x03, 0, 0, 0, 0];
        let _ = sess.handle_auth_cap(&data, true, protocol::SUPPORTED_SUITE_MASK);
        assert_eq!(sess.cipher_suite, 3);

        let tag = sess.msg_tag;
        let mut rejection = vec![tag, open_status::INVALID_INTEGRITY_ALGORITHM, 0x00, 0x00];
        rejection.extend_from_slice(&sess.console_session_id.to_le_bytes());

        let action = sess.handle_open_session_response(&rejection);
        assert!(matches!(action, Action::Send(_)));
        assert_eq!(sess.cipher_suite, protocol::RETRY_SUITE);
        assert_eq!(sess.state, SessionState::OpenSessionSent);

        // A second rejection is fatal.
        let tag = sess.msg_tag;
        let mut rejection = vec![tag, open_status::INVALID_AUTH_ALGORITHM, 0x00, 0x00];
        rejection.extend_from_slice(&sess.console_session_id.to_le_bytes());
        let action = sess.handle_open_session_response(&rejection);
        assert!(matches!(action, Action::Release(_)));
    }

    #[test]
    fn handshake_seq_is_independent_of_correlator_cursor() {
        let mut sess = test_session();
        let _ = sess.start(false).expect("start");
        let data = [0x00, 0x0E, AUTH_BIT_NONE, 0x00, 0x00, 0, 0, 0, 0];
        let _ = sess.handle_auth_cap(&data, false, 0);

        // Two handshake messages consumed handshake sequences, the
        // correlator cursor is untouched.
        assert_eq!(sess.handshake_seq, 2);
        assert_eq!(sess.seq_cursor, 0);
    }
}
