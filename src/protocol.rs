use crate::crypto::{
    KeyedHash, aes128_cbc_decrypt, aes128_cbc_encrypt, auth_code, session_digest_md5,
};
use crate::error::{Error, Result};
use crate::types::{Bridge, PrivilegeLevel};

/// RMCP header values.
const RMCP_VERSION: u8 = 0x06;
const RMCP_RESERVED: u8 = 0x00;
const RMCP_SEQ_NO_ACK: u8 = 0xFF;
const RMCP_CLASS_IPMI: u8 = 0x07;

/// RMCP+ session auth type/format marker.
pub(crate) const RMCPPLUS_AUTH_TYPE: u8 = 0x06;

/// RMCP+ session trailer next header value.
const RMCPPLUS_NEXT_HEADER: u8 = 0x07;

/// LAN interface addresses.
pub(crate) const BMC_SLAVE_ADDR: u8 = 0x20;
pub(crate) const REMOTE_SWID: u8 = 0x81;
const LUN: u8 = 0x00;

/// The rq_seq space is 6 bits wide.
pub(crate) const SEQ_SPACE: u8 = 64;

/// Upper bound for caller command data. Keeps every framing variant inside
/// the one-byte v1.5 payload length field.
pub(crate) const MAX_DATA_LEN: usize = 230;

/// Largest datagram this crate will build or accept.
pub(crate) const MAX_PACKET_LEN: usize = 512;

/// Network functions and commands used by the session machinery.
pub(crate) mod commands {
    pub const NETFN_APP: u8 = 0x06;

    pub const CMD_GET_CHANNEL_AUTH_CAP: u8 = 0x38;
    pub const CMD_GET_SESSION_CHALLENGE: u8 = 0x39;
    pub const CMD_ACTIVATE_SESSION: u8 = 0x3A;
    pub const CMD_SET_SESSION_PRIV: u8 = 0x3B;
    pub const CMD_CLOSE_SESSION: u8 = 0x3C;
    pub const CMD_SEND_MESSAGE: u8 = 0x34;

    pub const LAN_CHANNEL_E: u8 = 0x0E;
}

/// Payload type numbers (see IPMI v2.0 Table 13-16).
///
/// Only the baseline types required for IPMI messaging and session setup.
pub(crate) mod payload_type {
    /// Standard IPMI payload (LAN message) wrapped in RMCP+.
    pub const IPMI: u8 = 0x00;
    /// OEM explicit payload; carries extra OEM header fields.
    pub const OEM_EXPLICIT: u8 = 0x02;
    /// RMCP+ Open Session Request.
    pub const OPEN_SESSION_REQUEST: u8 = 0x10;
    /// RMCP+ Open Session Response.
    pub const OPEN_SESSION_RESPONSE: u8 = 0x11;
    /// RAKP Message 1.
    pub const RAKP_1: u8 = 0x12;
    /// RAKP Message 2.
    pub const RAKP_2: u8 = 0x13;
    /// RAKP Message 3.
    pub const RAKP_3: u8 = 0x14;
    /// RAKP Message 4.
    pub const RAKP_4: u8 = 0x15;
}

/// RMCP+ algorithm numbers (Table 13-17 .. 13-19).
pub(crate) mod algorithm {
    pub const AUTH_RAKP_NONE: u8 = 0x00;
    pub const AUTH_RAKP_HMAC_SHA1: u8 = 0x01;
    pub const AUTH_RAKP_HMAC_MD5: u8 = 0x02;

    pub const INTEGRITY_NONE: u8 = 0x00;
    pub const INTEGRITY_HMAC_SHA1_96: u8 = 0x01;
    pub const INTEGRITY_HMAC_MD5_128: u8 = 0x02;

    pub const CONFIDENTIALITY_NONE: u8 = 0x00;
    pub const CONFIDENTIALITY_AES_CBC_128: u8 = 0x01;
}

/// RMCP+ Open Session Response status codes (Table 13-15 subset).
pub(crate) mod open_status {
    pub const NO_ERRORS: u8 = 0x00;
    pub const INVALID_AUTH_ALGORITHM: u8 = 0x04;
    pub const INVALID_INTEGRITY_ALGORITHM: u8 = 0x05;
    pub const INVALID_CONFIDENTIALITY_ALGORITHM: u8 = 0x10;
    pub const NO_CIPHER_SUITE_MATCH: u8 = 0x11;

    /// Statuses that warrant one retry with a weaker suite.
    pub fn is_algorithm_rejection(status: u8) -> bool {
        matches!(
            status,
            INVALID_AUTH_ALGORITHM
                | INVALID_INTEGRITY_ALGORITHM
                | INVALID_CONFIDENTIALITY_ALGORITHM
                | NO_CIPHER_SUITE_MATCH
        )
    }
}

/// Cipher suites this crate can actually negotiate (Table 22-19 subset:
/// RC4 confidentiality and the non-HMAC MD5-128 integrity are excluded).
pub(crate) const SUPPORTED_SUITE_MASK: u16 = 0x01CF;

/// Preference order when picking a suite from the enabled mask.
pub(crate) const SUITE_PREFERENCE: [u8; 7] = [3, 8, 2, 7, 1, 6, 0];

/// Suite used for the single bounded retry after an algorithm rejection:
/// RAKP-HMAC-SHA1 with no integrity and no confidentiality.
pub(crate) const RETRY_SUITE: u8 = 1;

/// Map a cipher suite id to its (auth, integrity, confidentiality) triple.
pub(crate) fn cipher_suite_algorithms(id: u8) -> Option<(u8, u8, u8)> {
    use algorithm::*;
    let algs = match id {
        0 => (AUTH_RAKP_NONE, INTEGRITY_NONE, CONFIDENTIALITY_NONE),
        1 => (AUTH_RAKP_HMAC_SHA1, INTEGRITY_NONE, CONFIDENTIALITY_NONE),
        2 => (AUTH_RAKP_HMAC_SHA1, INTEGRITY_HMAC_SHA1_96, CONFIDENTIALITY_NONE),
        3 => (
            AUTH_RAKP_HMAC_SHA1,
            INTEGRITY_HMAC_SHA1_96,
            CONFIDENTIALITY_AES_CBC_128,
        ),
        6 => (AUTH_RAKP_HMAC_MD5, INTEGRITY_NONE, CONFIDENTIALITY_NONE),
        7 => (AUTH_RAKP_HMAC_MD5, INTEGRITY_HMAC_MD5_128, CONFIDENTIALITY_NONE),
        8 => (
            AUTH_RAKP_HMAC_MD5,
            INTEGRITY_HMAC_MD5_128,
            CONFIDENTIALITY_AES_CBC_128,
        ),
        _ => return None,
    };
    Some(algs)
}

/// Keyed-hash flavor for a RAKP authentication algorithm id.
pub(crate) fn auth_algorithm_hash(auth_alg: u8) -> Result<KeyedHash> {
    match auth_alg {
        algorithm::AUTH_RAKP_NONE => Ok(KeyedHash::None),
        algorithm::AUTH_RAKP_HMAC_SHA1 => Ok(KeyedHash::Sha1),
        algorithm::AUTH_RAKP_HMAC_MD5 => Ok(KeyedHash::Md5),
        _ => Err(Error::Unsupported("unknown RAKP authentication algorithm")),
    }
}

/// Keyed-hash flavor for an integrity algorithm id.
pub(crate) fn integrity_algorithm_hash(integrity_alg: u8) -> Result<KeyedHash> {
    match integrity_alg {
        algorithm::INTEGRITY_NONE => Ok(KeyedHash::None),
        algorithm::INTEGRITY_HMAC_SHA1_96 => Ok(KeyedHash::Sha1),
        algorithm::INTEGRITY_HMAC_MD5_128 => Ok(KeyedHash::Md5),
        _ => Err(Error::Unsupported("unknown integrity algorithm")),
    }
}

/// Compute the standard 2's complement checksum used by IPMI LAN messages.
pub(crate) fn ipmi_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1)
}

fn push_rmcp_header(packet: &mut Vec<u8>) {
    packet.push(RMCP_VERSION);
    packet.push(RMCP_RESERVED);
    packet.push(RMCP_SEQ_NO_ACK);
    packet.push(RMCP_CLASS_IPMI);
}

/// Verify the RMCP envelope and return the session auth type byte.
///
/// `None` means the datagram is not an IPMI-class RMCP message and must be
/// ignored.
pub(crate) fn classify_datagram(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 4 + 1 || bytes.len() > MAX_PACKET_LEN {
        return None;
    }
    if bytes[0] != RMCP_VERSION || bytes[3] != RMCP_CLASS_IPMI {
        return None;
    }
    Some(bytes[4])
}

// ---------------------------------------------------------------------------
// v1.5 session framing
// ---------------------------------------------------------------------------

/// Per-message authentication applied to an outbound v1.5 packet.
pub(crate) enum V15AuthCode {
    /// No auth code field in the session header.
    None,
    /// 16-byte password copied verbatim.
    Password([u8; 16]),
    /// MD5 multi-session digest over the message.
    Md5 { password: [u8; 16] },
}

/// Encode a complete v1.5 RMCP packet around an already-framed LAN message.
pub(crate) fn encode_v15_packet(
    auth_type: u8,
    outbound_seq: u32,
    session_id: u32,
    auth: &V15AuthCode,
    message: &[u8],
) -> Result<Vec<u8>> {
    if message.len() > u8::MAX as usize {
        return Err(Error::Protocol("LAN message too long"));
    }

    let mut packet = Vec::with_capacity(4 + 9 + 16 + 1 + message.len());
    push_rmcp_header(&mut packet);

    packet.push(auth_type);
    packet.extend_from_slice(&outbound_seq.to_le_bytes());
    packet.extend_from_slice(&session_id.to_le_bytes());

    match auth {
        V15AuthCode::None => {}
        V15AuthCode::Password(password) => packet.extend_from_slice(password),
        V15AuthCode::Md5 { password } => {
            let code = session_digest_md5(password, session_id, message, outbound_seq);
            packet.extend_from_slice(&code);
        }
    }

    packet.push(message.len() as u8);
    packet.extend_from_slice(message);

    if packet.len() > MAX_PACKET_LEN {
        return Err(Error::Protocol("packet exceeds maximum length"));
    }
    Ok(packet)
}

/// A parsed v1.5 session packet.
#[derive(Debug, Clone)]
pub(crate) struct V15Packet {
    pub auth_type: u8,
    #[allow(dead_code)]
    pub session_seq: u32,
    pub session_id: u32,
    pub message: Vec<u8>,
}

/// Parse the fixed v1.5 session header. The inbound auth code, when present,
/// is skipped; responses are trusted on checksum + session id + sequence.
pub(crate) fn parse_v15_packet(bytes: &[u8]) -> Result<V15Packet> {
    if bytes.len() < 4 + 9 + 1 {
        return Err(Error::Protocol("v1.5 packet too short"));
    }

    let auth_type = bytes[4];
    if auth_type == RMCPPLUS_AUTH_TYPE {
        return Err(Error::Protocol("RMCP+ packet in v1.5 parser"));
    }

    let session_seq = u32::from_le_bytes(
        bytes[5..9]
            .try_into()
            .map_err(|_| Error::Protocol("invalid session seq"))?,
    );
    let session_id = u32::from_le_bytes(
        bytes[9..13]
            .try_into()
            .map_err(|_| Error::Protocol("invalid session id"))?,
    );

    let mut offset = 13;
    if auth_type != 0x00 {
        offset += 16;
    }

    if bytes.len() < offset + 1 {
        return Err(Error::Protocol("v1.5 packet truncated at payload length"));
    }
    let payload_len = bytes[offset] as usize;
    offset += 1;

    if bytes.len() < offset + payload_len {
        return Err(Error::Protocol("v1.5 payload truncated"));
    }

    Ok(V15Packet {
        auth_type,
        session_seq,
        session_id,
        message: bytes[offset..offset + payload_len].to_vec(),
    })
}

/// Encode a plain IPMI LAN message (no bridging).
pub(crate) fn encode_lan_message(netfn: u8, cmd: u8, rq_seq: u8, data: &[u8]) -> Result<Vec<u8>> {
    if rq_seq >= SEQ_SPACE {
        return Err(Error::Protocol("rq_seq must be 6-bit"));
    }
    if data.len() > MAX_DATA_LEN {
        return Err(Error::Protocol("command data too long"));
    }

    let netfn_lun = (netfn << 2) | LUN;
    let mut msg = Vec::with_capacity(7 + data.len());
    msg.push(BMC_SLAVE_ADDR);
    msg.push(netfn_lun);
    msg.push(ipmi_checksum(&msg[0..2]));

    msg.push(REMOTE_SWID);
    msg.push((rq_seq << 2) | LUN);
    msg.push(cmd);
    msg.extend_from_slice(data);

    let csum = ipmi_checksum(&msg[3..]);
    msg.push(csum);

    Ok(msg)
}

/// Encode a bridged LAN message: the caller's command wrapped in one or two
/// Send Message envelopes with track-request channel bytes, each envelope
/// closing with its own checksum.
pub(crate) fn encode_bridged_message(
    netfn: u8,
    cmd: u8,
    rq_seq: u8,
    data: &[u8],
    bridge: &Bridge,
) -> Result<Vec<u8>> {
    let (target_addr, target_channel, transit) = match *bridge {
        Bridge::Direct => return encode_lan_message(netfn, cmd, rq_seq, data),
        Bridge::Single {
            target_addr,
            target_channel,
        } => (target_addr, target_channel, None),
        Bridge::Dual {
            target_addr,
            target_channel,
            transit_addr,
            transit_channel,
        } => (target_addr, target_channel, Some((transit_addr, transit_channel))),
    };

    if rq_seq >= SEQ_SPACE {
        return Err(Error::Protocol("rq_seq must be 6-bit"));
    }
    if data.len() > MAX_DATA_LEN {
        return Err(Error::Protocol("command data too long"));
    }

    let mut msg = Vec::with_capacity(7 + 8 + 8 + data.len() + 2);

    // Outer Send Message envelope addressed to the BMC.
    msg.push(BMC_SLAVE_ADDR);
    msg.push((commands::NETFN_APP << 2) | LUN);
    msg.push(ipmi_checksum(&msg[0..2]));
    let outer_body = msg.len();
    msg.push(REMOTE_SWID);
    msg.push((rq_seq << 2) | LUN);
    msg.push(commands::CMD_SEND_MESSAGE);

    // Transit Send Message envelope for a dual hop.
    let mut mid_body = None;
    if let Some((transit_addr, transit_channel)) = transit {
        msg.push(0x40 | transit_channel);
        let hdr = msg.len();
        msg.push(transit_addr);
        msg.push(commands::NETFN_APP << 2);
        let csum = ipmi_checksum(&msg[hdr..hdr + 2]);
        msg.push(csum);
        mid_body = Some(msg.len());
        msg.push(BMC_SLAVE_ADDR);
        msg.push((rq_seq << 2) | LUN);
        msg.push(commands::CMD_SEND_MESSAGE);
    }

    // Target envelope carrying the actual command.
    msg.push(0x40 | target_channel);
    let hdr = msg.len();
    msg.push(target_addr);
    msg.push((netfn << 2) | LUN);
    let csum = ipmi_checksum(&msg[hdr..hdr + 2]);
    msg.push(csum);
    let inner_body = msg.len();
    msg.push(BMC_SLAVE_ADDR);
    msg.push((rq_seq << 2) | LUN);
    msg.push(cmd);
    msg.extend_from_slice(data);

    let csum = ipmi_checksum(&msg[inner_body..]);
    msg.push(csum);
    if let Some(mid) = mid_body {
        let csum = ipmi_checksum(&msg[mid..]);
        msg.push(csum);
    }
    let csum = ipmi_checksum(&msg[outer_body..]);
    msg.push(csum);

    if msg.len() > u8::MAX as usize {
        return Err(Error::Protocol("bridged LAN message too long"));
    }
    Ok(msg)
}

/// A parsed IPMI LAN response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LanResponse {
    pub netfn: u8,
    pub rq_seq: u8,
    pub cmd: u8,
    /// Response bytes; the first byte is the completion code.
    pub data: Vec<u8>,
}

/// Parse and checksum-verify an inbound LAN response message.
pub(crate) fn parse_lan_response(msg: &[u8]) -> Result<LanResponse> {
    // Six header bytes, completion code, trailing checksum.
    if msg.len() < 8 {
        return Err(Error::Protocol("LAN response too short"));
    }

    let header_sum = msg[0].wrapping_add(msg[1]).wrapping_add(msg[2]);
    if header_sum != 0 {
        return Err(Error::Protocol("invalid LAN header checksum"));
    }

    let body_sum = msg[3..].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    if body_sum != 0 {
        return Err(Error::Protocol("invalid LAN body checksum"));
    }

    Ok(LanResponse {
        netfn: msg[1] >> 2,
        rq_seq: msg[4] >> 2,
        cmd: msg[5],
        data: msg[6..msg.len() - 1].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// v2.0 (RMCP+) session framing
// ---------------------------------------------------------------------------

/// Keys and algorithm selection for an established v2.0 session.
#[derive(Debug, Clone)]
pub(crate) struct SessionCrypto {
    /// Keyed-hash flavor of the negotiated integrity algorithm.
    pub integrity: KeyedHash,
    /// Integrity keying material (K1).
    pub k1: Vec<u8>,
    /// Confidentiality key (AES-128 key derived from K2), when negotiated.
    pub aes_key: Option<[u8; 16]>,
}

/// Parsed RMCP+ packet (payload is decrypted/verified when crypto is given).
#[derive(Debug, Clone)]
pub(crate) struct V20Packet {
    pub payload_type: u8,
    #[allow(dead_code)]
    pub is_authenticated: bool,
    pub is_encrypted: bool,
    pub session_id: u32,
    #[allow(dead_code)]
    pub session_seq: u32,
    pub payload: Vec<u8>,
}

fn make_payload_type_byte(payload_type_num: u8, authenticated: bool, encrypted: bool) -> u8 {
    let mut b = payload_type_num & 0x3F;
    if authenticated {
        b |= 0x40;
    }
    if encrypted {
        b |= 0x80;
    }
    b
}

fn split_payload_type(payload_type_byte: u8) -> (bool, bool, u8) {
    let is_encrypted = (payload_type_byte & 0x80) != 0;
    let is_authenticated = (payload_type_byte & 0x40) != 0;
    (is_authenticated, is_encrypted, payload_type_byte & 0x3F)
}

/// Encode a complete RMCP+ packet.
///
/// `payload` must already be encrypted (IV-prefixed) when `encrypted` is
/// set; this function only adds the session header and integrity trailer.
pub(crate) fn encode_v20_packet(
    payload_type_num: u8,
    session_id: u32,
    session_seq: u32,
    payload: &[u8],
    authenticated: bool,
    encrypted: bool,
    crypto: Option<&SessionCrypto>,
) -> Result<Vec<u8>> {
    if authenticated && crypto.is_none() {
        return Err(Error::Protocol(
            "session crypto required for authenticated packets",
        ));
    }

    let payload_len: u16 = payload
        .len()
        .try_into()
        .map_err(|_| Error::Protocol("payload too large"))?;

    let mut packet = Vec::with_capacity(4 + 12 + payload.len() + 32);
    push_rmcp_header(&mut packet);

    packet.push(RMCPPLUS_AUTH_TYPE);
    packet.push(make_payload_type_byte(payload_type_num, authenticated, encrypted));
    packet.extend_from_slice(&session_id.to_le_bytes());
    packet.extend_from_slice(&session_seq.to_le_bytes());
    packet.extend_from_slice(&payload_len.to_le_bytes());
    packet.extend_from_slice(payload);

    if authenticated {
        let crypto = crypto.ok_or(Error::Protocol("missing session crypto"))?;

        // Integrity padding aligns the authenticated range to 4 bytes.
        let base_len = 12usize + payload.len() + 2;
        let pad_len = ((4 - (base_len % 4)) % 4) as u8;

        packet.extend(std::iter::repeat_n(0xFF, pad_len as usize));
        packet.push(pad_len);
        packet.push(RMCPPLUS_NEXT_HEADER);

        let code = auth_code(crypto.integrity, &crypto.k1, &packet[4..])?;
        if code.len() < 12 {
            return Err(Error::Crypto("integrity digest too short"));
        }
        packet.extend_from_slice(&code[..12]);
    }

    if packet.len() > MAX_PACKET_LEN {
        return Err(Error::Protocol("packet exceeds maximum length"));
    }
    Ok(packet)
}

/// Decode an RMCP+ packet, verifying the integrity trailer and decrypting
/// the payload when the session crypto is provided.
pub(crate) fn decode_v20_packet(bytes: &[u8], crypto: Option<&SessionCrypto>) -> Result<V20Packet> {
    if bytes.len() < 4 + 12 {
        return Err(Error::Protocol("RMCP+ packet too short"));
    }
    if bytes[4] != RMCPPLUS_AUTH_TYPE {
        return Err(Error::Protocol("not an RMCP+ packet"));
    }

    let (is_authenticated, is_encrypted, payload_type_num) = split_payload_type(bytes[5]);
    if payload_type_num == payload_type::OEM_EXPLICIT {
        // OEM explicit payloads add OEM IANA fields this crate does not
        // implement.
        return Err(Error::Unsupported("OEM explicit payload"));
    }

    let session_id = u32::from_le_bytes(
        bytes[6..10]
            .try_into()
            .map_err(|_| Error::Protocol("invalid session id"))?,
    );
    let session_seq = u32::from_le_bytes(
        bytes[10..14]
            .try_into()
            .map_err(|_| Error::Protocol("invalid session seq"))?,
    );
    let payload_len = u16::from_le_bytes(
        bytes[14..16]
            .try_into()
            .map_err(|_| Error::Protocol("invalid payload length"))?,
    ) as usize;

    let payload_start = 16;
    let payload_end = payload_start + payload_len;
    if bytes.len() < payload_end {
        return Err(Error::Protocol("truncated RMCP+ payload"));
    }

    if is_authenticated {
        let crypto = crypto.ok_or(Error::Protocol(
            "session crypto required for authenticated packets",
        ))?;
        verify_integrity_trailer(bytes, payload_end, crypto)?;
    }

    let payload = if is_encrypted {
        let crypto = crypto.ok_or(Error::Protocol(
            "session crypto required for encrypted payload",
        ))?;
        let aes_key = crypto
            .aes_key
            .as_ref()
            .ok_or(Error::Protocol("no confidentiality key negotiated"))?;
        decrypt_payload_aes(&bytes[payload_start..payload_end], aes_key)?
    } else {
        bytes[payload_start..payload_end].to_vec()
    };

    Ok(V20Packet {
        payload_type: payload_type_num,
        is_authenticated,
        is_encrypted,
        session_id,
        session_seq,
        payload,
    })
}

fn verify_integrity_trailer(bytes: &[u8], payload_end: usize, crypto: &SessionCrypto) -> Result<()> {
    if crypto.integrity == KeyedHash::None {
        return Err(Error::Protocol(
            "authenticated packet but no integrity negotiated",
        ));
    }

    // Trailer: [0xFF pads][pad_len][0x07][12-byte code].
    if bytes.len() < payload_end + 2 + 12 {
        return Err(Error::Protocol("authenticated packet too short"));
    }

    let code_start = bytes.len() - 12;
    let expected = auth_code(crypto.integrity, &crypto.k1, &bytes[4..code_start])?;
    if expected.len() < 12 || !crate::crypto::ct_eq(&bytes[code_start..], &expected[..12]) {
        return Err(Error::AuthenticationFailed("invalid packet integrity code"));
    }

    let next_header = bytes[code_start - 1];
    let pad_len = bytes[code_start - 2] as usize;
    if next_header != RMCPPLUS_NEXT_HEADER {
        return Err(Error::Protocol("unexpected trailer next header"));
    }

    let Some(pad_start) = (code_start - 2).checked_sub(pad_len) else {
        return Err(Error::Protocol("trailer pad length mismatch"));
    };
    if pad_start < payload_end {
        return Err(Error::Protocol("trailer pad length mismatch"));
    }
    if bytes[pad_start..code_start - 2].iter().any(|&b| b != 0xFF) {
        return Err(Error::Protocol("invalid integrity pad bytes"));
    }

    Ok(())
}

/// Encrypt an IPMI payload using AES-CBC-128 and the confidentiality
/// trailer (pad bytes 0x01.. followed by the pad length).
///
/// Returns `iv || ciphertext`; the build fails rather than produce a
/// zero-length ciphertext.
pub(crate) fn encrypt_payload_aes(
    plaintext: &[u8],
    aes_key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<Vec<u8>> {
    let base = plaintext.len() + 1;
    let pad_len = (16 - (base % 16)) % 16;

    let mut to_encrypt = Vec::with_capacity(base + pad_len);
    to_encrypt.extend_from_slice(plaintext);
    for i in 0..pad_len {
        to_encrypt.push((i + 1) as u8);
    }
    to_encrypt.push(pad_len as u8);

    let ciphertext = aes128_cbc_encrypt(aes_key, iv, &to_encrypt)?;
    if ciphertext.is_empty() {
        return Err(Error::Crypto("encryption produced no output"));
    }

    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an `iv || ciphertext` payload and strip the confidentiality
/// trailer, rejecting inconsistent padding.
pub(crate) fn decrypt_payload_aes(payload: &[u8], aes_key: &[u8; 16]) -> Result<Vec<u8>> {
    if payload.len() < 16 {
        return Err(Error::Protocol("encrypted payload too short"));
    }

    let iv: [u8; 16] = payload[..16]
        .try_into()
        .map_err(|_| Error::Protocol("invalid IV"))?;
    let ciphertext = &payload[16..];
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(16) {
        return Err(Error::Protocol("invalid AES-CBC ciphertext length"));
    }

    let mut plaintext = aes128_cbc_decrypt(aes_key, &iv, ciphertext)?;

    let pad_len = *plaintext
        .last()
        .ok_or(Error::Protocol("missing confidentiality pad length"))? as usize;
    if pad_len > plaintext.len().saturating_sub(1) {
        return Err(Error::Protocol("invalid confidentiality pad length"));
    }

    let body_end = plaintext.len() - 1 - pad_len;
    for (i, &b) in plaintext[body_end..plaintext.len() - 1].iter().enumerate() {
        if b != (i as u8 + 1) {
            return Err(Error::Protocol("invalid confidentiality pad bytes"));
        }
    }

    plaintext.truncate(body_end);
    Ok(plaintext)
}

// ---------------------------------------------------------------------------
// RAKP payloads
// ---------------------------------------------------------------------------

/// Build the Open Session Request payload (Table 13-9).
pub(crate) fn build_open_session_request(
    message_tag: u8,
    requested_privilege: PrivilegeLevel,
    console_session_id: u32,
    auth_algorithm: u8,
    integrity_algorithm: u8,
    confidentiality_algorithm: u8,
) -> Vec<u8> {
    let mut p = Vec::with_capacity(32);

    p.push(message_tag);
    // Requested maximum privilege level; 0 means "highest level matching
    // the proposed algorithms".
    let requested = if matches!(requested_privilege, PrivilegeLevel::Administrator) {
        0x00
    } else {
        requested_privilege.as_u8() & 0x0F
    };
    p.push(requested);
    p.push(0x00);
    p.push(0x00);
    p.extend_from_slice(&console_session_id.to_le_bytes());

    p.extend_from_slice(&algorithm_proposal(0x00, auth_algorithm));
    p.extend_from_slice(&algorithm_proposal(0x01, integrity_algorithm));
    p.extend_from_slice(&algorithm_proposal(0x02, confidentiality_algorithm));

    debug_assert_eq!(p.len(), 32);
    p
}

fn algorithm_proposal(kind: u8, algorithm: u8) -> [u8; 8] {
    [kind, 0x00, 0x00, 0x08, algorithm & 0x3F, 0x00, 0x00, 0x00]
}

#[derive(Debug, Clone)]
pub(crate) struct OpenSessionResponse {
    pub message_tag: u8,
    pub status_code: u8,
    #[allow(dead_code)]
    pub max_privilege_level: u8,
    pub console_session_id: u32,
    pub bmc_session_id: u32,
    pub auth_algorithm: u8,
    pub integrity_algorithm: u8,
    pub confidentiality_algorithm: u8,
}

pub(crate) fn parse_open_session_response(payload: &[u8]) -> Result<OpenSessionResponse> {
    if payload.len() < 8 {
        return Err(Error::Protocol("open session response too short"));
    }

    let message_tag = payload[0];
    let status_code = payload[1];
    let max_privilege_level = payload[2];
    let console_session_id = u32::from_le_bytes(
        payload[4..8]
            .try_into()
            .map_err(|_| Error::Protocol("invalid console session id"))?,
    );

    if status_code != open_status::NO_ERRORS {
        return Ok(OpenSessionResponse {
            message_tag,
            status_code,
            max_privilege_level,
            console_session_id,
            bmc_session_id: 0,
            auth_algorithm: 0,
            integrity_algorithm: 0,
            confidentiality_algorithm: 0,
        });
    }

    if payload.len() < 36 {
        return Err(Error::Protocol("open session response too short"));
    }

    let bmc_session_id = u32::from_le_bytes(
        payload[8..12]
            .try_into()
            .map_err(|_| Error::Protocol("invalid BMC session id"))?,
    );

    // Selected algorithms sit in byte 5 of each 8-byte proposal block.
    Ok(OpenSessionResponse {
        message_tag,
        status_code,
        max_privilege_level,
        console_session_id,
        bmc_session_id,
        auth_algorithm: payload[12 + 4] & 0x3F,
        integrity_algorithm: payload[20 + 4] & 0x3F,
        confidentiality_algorithm: payload[28 + 4] & 0x3F,
    })
}

/// Build RAKP Message 1 payload (Table 13-11).
pub(crate) fn build_rakp1(
    message_tag: u8,
    bmc_session_id: u32,
    console_random: &[u8; 16],
    requested_privilege: PrivilegeLevel,
    username: &[u8],
) -> Result<Vec<u8>> {
    if username.len() > 16 {
        return Err(Error::Protocol("username too long (max 16 bytes)"));
    }

    let mut p = Vec::with_capacity(28 + username.len());
    p.push(message_tag);
    p.extend_from_slice(&[0x00, 0x00, 0x00]);
    p.extend_from_slice(&bmc_session_id.to_le_bytes());
    p.extend_from_slice(console_random);

    // Role with bit 4 clear: name-only privilege lookup.
    p.push(requested_privilege.as_u8() & 0x0F);
    p.extend_from_slice(&[0x00, 0x00]);
    p.push(username.len() as u8);
    p.extend_from_slice(username);

    Ok(p)
}

#[derive(Debug, Clone)]
pub(crate) struct Rakp2 {
    pub message_tag: u8,
    pub status_code: u8,
    pub console_session_id: u32,
    pub bmc_random: [u8; 16],
    pub bmc_guid: [u8; 16],
    pub key_exchange_auth_code: Vec<u8>,
}

/// Parse RAKP Message 2; `code_len` is the auth algorithm's digest length.
pub(crate) fn parse_rakp2(payload: &[u8], code_len: usize) -> Result<Rakp2> {
    if payload.len() < 40 + code_len {
        return Err(Error::Protocol("RAKP message 2 too short"));
    }

    let console_session_id = u32::from_le_bytes(
        payload[4..8]
            .try_into()
            .map_err(|_| Error::Protocol("invalid console session id"))?,
    );
    let bmc_random: [u8; 16] = payload[8..24]
        .try_into()
        .map_err(|_| Error::Protocol("invalid BMC random"))?;
    let bmc_guid: [u8; 16] = payload[24..40]
        .try_into()
        .map_err(|_| Error::Protocol("invalid BMC GUID"))?;

    Ok(Rakp2 {
        message_tag: payload[0],
        status_code: payload[1],
        console_session_id,
        bmc_random,
        bmc_guid,
        key_exchange_auth_code: payload[40..40 + code_len].to_vec(),
    })
}

/// Build RAKP Message 3 payload (Table 13-13).
pub(crate) fn build_rakp3(
    message_tag: u8,
    bmc_session_id: u32,
    key_exchange_auth_code: &[u8],
) -> Vec<u8> {
    let mut p = Vec::with_capacity(8 + key_exchange_auth_code.len());
    p.push(message_tag);
    p.push(0x00);
    p.extend_from_slice(&[0x00, 0x00]);
    p.extend_from_slice(&bmc_session_id.to_le_bytes());
    p.extend_from_slice(key_exchange_auth_code);
    p
}

#[derive(Debug, Clone)]
pub(crate) struct Rakp4 {
    pub message_tag: u8,
    pub status_code: u8,
    pub console_session_id: u32,
    pub integrity_check_value: Vec<u8>,
}

/// Parse RAKP Message 4; `icv_len` depends on the auth algorithm (12 for
/// HMAC-SHA1-96, 16 for HMAC-MD5).
pub(crate) fn parse_rakp4(payload: &[u8], icv_len: usize) -> Result<Rakp4> {
    if payload.len() < 8 {
        return Err(Error::Protocol("RAKP message 4 too short"));
    }

    let message_tag = payload[0];
    let status_code = payload[1];
    let console_session_id = u32::from_le_bytes(
        payload[4..8]
            .try_into()
            .map_err(|_| Error::Protocol("invalid console session id"))?,
    );

    if status_code != open_status::NO_ERRORS {
        return Ok(Rakp4 {
            message_tag,
            status_code,
            console_session_id,
            integrity_check_value: Vec::new(),
        });
    }

    if payload.len() < 8 + icv_len {
        return Err(Error::Protocol("RAKP message 4 too short"));
    }

    Ok(Rakp4 {
        message_tag,
        status_code,
        console_session_id,
        integrity_check_value: payload[8..8 + icv_len].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// RAKP authentication codes and key derivation
// ---------------------------------------------------------------------------

/// RAKP Message 2 key exchange authentication code.
#[allow(clippy::too_many_arguments)]
pub(crate) fn rakp2_auth_code(
    alg: KeyedHash,
    user_key: &[u8],
    console_session_id: u32,
    bmc_session_id: u32,
    console_random: &[u8; 16],
    bmc_random: &[u8; 16],
    bmc_guid: &[u8; 16],
    requested_privilege: PrivilegeLevel,
    username: &[u8],
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(58 + username.len());
    data.extend_from_slice(&console_session_id.to_le_bytes());
    data.extend_from_slice(&bmc_session_id.to_le_bytes());
    data.extend_from_slice(console_random);
    data.extend_from_slice(bmc_random);
    data.extend_from_slice(bmc_guid);
    data.push(requested_privilege.as_u8() & 0x0F);
    data.push(username.len() as u8);
    data.extend_from_slice(username);

    auth_code(alg, user_key, &data)
}

/// RAKP Message 3 key exchange authentication code.
pub(crate) fn rakp3_auth_code(
    alg: KeyedHash,
    user_key: &[u8],
    bmc_random: &[u8; 16],
    console_session_id: u32,
    requested_privilege: PrivilegeLevel,
    username: &[u8],
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(22 + username.len());
    data.extend_from_slice(bmc_random);
    data.extend_from_slice(&console_session_id.to_le_bytes());
    data.push(requested_privilege.as_u8() & 0x0F);
    data.push(username.len() as u8);
    data.extend_from_slice(username);

    auth_code(alg, user_key, &data)
}

/// The Session Integrity Key: `HMAC(Kg, Rm ‖ Rc ‖ role ‖ ulen ‖ uname)`.
pub(crate) fn compute_sik(
    alg: KeyedHash,
    kg: &[u8],
    console_random: &[u8; 16],
    bmc_random: &[u8; 16],
    requested_privilege: PrivilegeLevel,
    username: &[u8],
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(34 + username.len());
    data.extend_from_slice(console_random);
    data.extend_from_slice(bmc_random);
    data.push(requested_privilege.as_u8() & 0x0F);
    data.push(username.len() as u8);
    data.extend_from_slice(username);

    auth_code(alg, kg, &data)
}

/// RAKP Message 4 integrity check value over `Rm ‖ SIDc ‖ GUIDc`.
pub(crate) fn rakp4_icv(
    alg: KeyedHash,
    sik: &[u8],
    console_random: &[u8; 16],
    bmc_session_id: u32,
    bmc_guid: &[u8; 16],
    icv_len: usize,
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(console_random);
    data.extend_from_slice(&bmc_session_id.to_le_bytes());
    data.extend_from_slice(bmc_guid);

    let mut code = auth_code(alg, sik, &data)?;
    if code.len() < icv_len {
        return Err(Error::Crypto("ICV digest too short"));
    }
    code.truncate(icv_len);
    Ok(code)
}

/// Keys derived from the SIK on RAKP Message 4 acceptance.
#[derive(Debug, Clone)]
pub(crate) struct DerivedKeys {
    pub k1: Vec<u8>,
    #[allow(dead_code)]
    pub k2: Vec<u8>,
    #[allow(dead_code)]
    pub k3: Vec<u8>,
    pub aes_key: [u8; 16],
}

/// Derive K1 (integrity), K2 (confidentiality) and K3 (reserved) from the
/// SIK using the IPMI-defined constant byte strings, plus the AES key
/// taken from the first half of K2.
pub(crate) fn derive_session_keys(alg: KeyedHash, sik: &[u8]) -> Result<DerivedKeys> {
    let k1 = auth_code(alg, sik, &[0x01u8; 20])?;
    let k2 = auth_code(alg, sik, &[0x02u8; 20])?;
    let k3 = auth_code(alg, sik, &[0x03u8; 20])?;

    if k2.len() < 16 {
        return Err(Error::Crypto("K2 too short for AES key"));
    }
    let mut aes_key = [0u8; 16];
    aes_key.copy_from_slice(&k2[..16]);

    Ok(DerivedKeys { k1, k2, k3, aes_key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lan_request_encoding_get_device_id_no_data() {
        let msg = encode_lan_message(0x06, 0x01, 0, &[]).expect("encode");
        assert_eq!(msg, vec![0x20, 0x18, 0xC8, 0x81, 0x00, 0x01, 0x7E]);
    }

    #[test]
    fn lan_response_roundtrip() {
        // Response frame as a BMC would send it (roles flipped).
        let mut msg = vec![0x81, 0x1C, 0x00, 0x20, 0x04, 0x01, 0x00, 0xAA, 0xBB];
        msg[2] = ipmi_checksum(&msg[0..2]);
        let csum = ipmi_checksum(&msg[3..]);
        msg.push(csum);

        let parsed = parse_lan_response(&msg).expect("parse");
        assert_eq!(parsed.netfn, 0x07);
        assert_eq!(parsed.rq_seq, 1);
        assert_eq!(parsed.cmd, 0x01);
        assert_eq!(parsed.data, vec![0x00, 0xAA, 0xBB]);
    }

    #[test]
    fn lan_response_detects_corruption() {
        let mut msg = vec![0x81, 0x1C, 0x00, 0x20, 0x04, 0x01, 0x00, 0xAA];
        msg[2] = ipmi_checksum(&msg[0..2]);
        let csum = ipmi_checksum(&msg[3..]);
        msg.push(csum);
        msg[7] ^= 0xFF;

        assert!(parse_lan_response(&msg).is_err());
    }

    #[test]
    fn v15_packet_roundtrip_plain() {
        let message = encode_lan_message(0x06, 0x38, 0, &[0x8E, 0x04]).expect("lan");
        let packet =
            encode_v15_packet(0x00, 0, 0, &V15AuthCode::None, &message).expect("packet");

        let parsed = parse_v15_packet(&packet).expect("parse");
        assert_eq!(parsed.auth_type, 0x00);
        assert_eq!(parsed.session_id, 0);
        assert_eq!(parsed.message, message);
    }

    #[test]
    fn v15_packet_roundtrip_md5_authenticated() {
        let password = *b"secretpw\0\0\0\0\0\0\0\0";
        let message = encode_lan_message(0x06, 0x01, 3, &[]).expect("lan");
        let packet = encode_v15_packet(
            0x02,
            7,
            0xDEADBEEF,
            &V15AuthCode::Md5 { password },
            &message,
        )
        .expect("packet");

        let parsed = parse_v15_packet(&packet).expect("parse");
        assert_eq!(parsed.auth_type, 0x02);
        assert_eq!(parsed.session_id, 0xDEADBEEF);
        assert_eq!(parsed.message, message);
        // Header (13) + auth code (16) + length byte + message.
        assert_eq!(packet.len(), 13 + 16 + 1 + message.len());
    }

    #[test]
    fn bridged_single_layout() {
        let bridge = Bridge::Single {
            target_addr: 0x24,
            target_channel: 0x02,
        };
        let msg = encode_bridged_message(0x06, 0x01, 5, &[], &bridge).expect("encode");

        // Outer envelope is a Send Message to the BMC.
        assert_eq!(msg[0], BMC_SLAVE_ADDR);
        assert_eq!(msg[1], commands::NETFN_APP << 2);
        assert_eq!(msg[5], commands::CMD_SEND_MESSAGE);
        // Track-request channel byte.
        assert_eq!(msg[6], 0x42);
        // Inner envelope addresses the target.
        assert_eq!(msg[7], 0x24);
        assert_eq!(msg[8], 0x06 << 2);

        // Each envelope's checksum pair verifies.
        assert_eq!(msg[0].wrapping_add(msg[1]).wrapping_add(msg[2]), 0);
        assert_eq!(msg[7].wrapping_add(msg[8]).wrapping_add(msg[9]), 0);
        let inner_sum = msg[10..msg.len() - 1]
            .iter()
            .fold(0u8, |a, &b| a.wrapping_add(b));
        assert_eq!(inner_sum, 0);
        let outer_sum = msg[3..].iter().fold(0u8, |a, &b| a.wrapping_add(b));
        assert_eq!(outer_sum, 0);
    }

    #[test]
    fn bridged_dual_has_three_envelopes() {
        let bridge = Bridge::Dual {
            target_addr: 0x24,
            target_channel: 0x02,
            transit_addr: 0x22,
            transit_channel: 0x01,
        };
        let msg = encode_bridged_message(0x04, 0x2D, 1, &[0x01], &bridge).expect("encode");

        assert_eq!(msg[5], commands::CMD_SEND_MESSAGE);
        assert_eq!(msg[6], 0x41);
        assert_eq!(msg[7], 0x22);
        assert_eq!(msg[12], commands::CMD_SEND_MESSAGE);
        assert_eq!(msg[13], 0x42);
        assert_eq!(msg[14], 0x24);

        // Three trailing checksums close the three envelopes.
        let outer_sum = msg[3..].iter().fold(0u8, |a, &b| a.wrapping_add(b));
        assert_eq!(outer_sum, 0);
    }

    #[test]
    fn v20_packet_roundtrip_unprotected() {
        let payload = build_rakp3(0x07, 0x11223344, &[0xAB; 20]);
        let packet = encode_v20_packet(payload_type::RAKP_3, 0, 0, &payload, false, false, None)
            .expect("encode");

        let parsed = decode_v20_packet(&packet, None).expect("decode");
        assert_eq!(parsed.payload_type, payload_type::RAKP_3);
        assert!(!parsed.is_authenticated);
        assert!(!parsed.is_encrypted);
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn v20_packet_roundtrip_authenticated_encrypted() {
        let crypto = SessionCrypto {
            integrity: KeyedHash::Sha1,
            k1: vec![0x11; 20],
            aes_key: Some([0x22; 16]),
        };

        let inner = encode_lan_message(0x06, 0x01, 0, &[]).expect("lan");
        let iv = [0x33u8; 16];
        let encrypted =
            encrypt_payload_aes(&inner, crypto.aes_key.as_ref().unwrap(), &iv).expect("encrypt");

        let packet = encode_v20_packet(
            payload_type::IPMI,
            0x0A0B0C0D,
            2,
            &encrypted,
            true,
            true,
            Some(&crypto),
        )
        .expect("encode");

        let parsed = decode_v20_packet(&packet, Some(&crypto)).expect("decode");
        assert_eq!(parsed.payload_type, payload_type::IPMI);
        assert!(parsed.is_encrypted);
        assert_eq!(parsed.session_id, 0x0A0B0C0D);
        assert_eq!(parsed.payload, inner);
    }

    #[test]
    fn v20_tampered_integrity_code_is_rejected() {
        let crypto = SessionCrypto {
            integrity: KeyedHash::Sha1,
            k1: vec![0x11; 20],
            aes_key: None,
        };

        let inner = encode_lan_message(0x06, 0x01, 0, &[]).expect("lan");
        let mut packet =
            encode_v20_packet(payload_type::IPMI, 1, 1, &inner, true, false, Some(&crypto))
                .expect("encode");
        let last = packet.len() - 1;
        packet[last] ^= 0x01;

        let err = decode_v20_packet(&packet, Some(&crypto)).unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(_)));
    }

    #[test]
    fn confidentiality_padding_block_boundary() {
        // A 16-byte payload forces a full 15-byte pad run plus the length
        // byte, landing the plaintext on the next block boundary.
        let aes_key = [0x42u8; 16];
        let iv = [0x24u8; 16];
        let payload = [0x5Au8; 16];

        let sealed = encrypt_payload_aes(&payload, &aes_key, &iv).expect("encrypt");
        assert_eq!(sealed.len(), 16 + 32);

        let opened = decrypt_payload_aes(&sealed, &aes_key).expect("decrypt");
        assert_eq!(opened, payload);
    }

    #[test]
    fn confidentiality_bad_padding_is_rejected() {
        let aes_key = [0x42u8; 16];
        let iv = [0x24u8; 16];

        // Construct a block whose trailing pad bytes are inconsistent.
        let mut plain = vec![0u8; 16];
        plain[14] = 0x07; // should be 0x01 for pad_len 1
        plain[15] = 0x01;
        let ciphertext = aes128_cbc_encrypt(&aes_key, &iv, &plain).expect("encrypt");

        let mut sealed = Vec::new();
        sealed.extend_from_slice(&iv);
        sealed.extend_from_slice(&ciphertext);

        assert!(decrypt_payload_aes(&sealed, &aes_key).is_err());
    }

    #[test]
    fn open_session_request_layout() {
        let p = build_open_session_request(0x09, PrivilegeLevel::Administrator, 0x01020304, 1, 1, 1);
        assert_eq!(p.len(), 32);
        assert_eq!(p[0], 0x09);
        assert_eq!(p[1], 0x00);
        assert_eq!(&p[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(p[8], 0x00);
        assert_eq!(p[12], 0x01);
        assert_eq!(p[16], 0x01);
        assert_eq!(p[24], 0x02);
    }

    #[test]
    fn key_derivation_is_deterministic() {
        let mut sik = [0u8; 20];
        for (i, b) in sik.iter_mut().enumerate() {
            *b = i as u8;
        }

        let a = derive_session_keys(KeyedHash::Sha1, &sik).expect("derive");
        let b = derive_session_keys(KeyedHash::Sha1, &sik).expect("derive");
        assert_eq!(a.k1, b.k1);
        assert_eq!(a.k2, b.k2);
        assert_eq!(a.k3, b.k3);
        assert_eq!(a.aes_key, b.aes_key);

        assert_eq!(
            a.k1,
            [
                0x34, 0xE5, 0x1C, 0x57, 0x1C, 0x5C, 0x39, 0x24, 0x60, 0xE6, 0x77, 0x5D, 0xD5, 0xEC,
                0xFA, 0x79, 0xF4, 0xA7, 0xF5, 0x05,
            ]
        );
        assert_eq!(
            a.aes_key,
            [
                0xC1, 0x30, 0x76, 0xED, 0x19, 0x57, 0xA5, 0x9E, 0x8C, 0x7A, 0xBB, 0x24, 0x60, 0xD2,
                0x2C, 0x1A,
            ]
        );
    }

    #[test]
    fn cipher_suite_table_maps_known_ids() {
        assert_eq!(
            cipher_suite_algorithms(3),
            Some((
                algorithm::AUTH_RAKP_HMAC_SHA1,
                algorithm::INTEGRITY_HMAC_SHA1_96,
                algorithm::CONFIDENTIALITY_AES_CBC_128,
            ))
        );
        assert_eq!(
            cipher_suite_algorithms(1),
            Some((
                algorithm::AUTH_RAKP_HMAC_SHA1,
                algorithm::INTEGRITY_NONE,
                algorithm::CONFIDENTIALITY_NONE,
            ))
        );
        // RC4 suites are unsupported.
        assert_eq!(cipher_suite_algorithms(4), None);
        assert_eq!(cipher_suite_algorithms(9), None);
    }
}
