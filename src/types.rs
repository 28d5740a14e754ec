use core::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::crypto::SecretBytes;

/// The privilege level requested for an IPMI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Callback privilege.
    Callback = 0x01,
    /// User privilege.
    User = 0x02,
    /// Operator privilege.
    Operator = 0x03,
    /// Administrator privilege.
    Administrator = 0x04,
    /// OEM-defined privilege.
    Oem = 0x05,
}

impl PrivilegeLevel {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }
}

/// IPMI v1.5 session authentication types (session header byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum AuthType {
    None = 0x00,
    /// Advertised by some BMCs but deliberately never selected here.
    #[allow(dead_code)]
    Md2 = 0x01,
    Md5 = 0x02,
    Password = 0x04,
    /// RMCP+ marker; selects the v2.0 session header format.
    RmcpPlus = 0x06,
}

impl AuthType {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Credentials used to authenticate a session with one target.
#[derive(Clone)]
pub struct Credentials {
    pub(crate) username: Vec<u8>,
    pub(crate) password: SecretBytes,
    pub(crate) bmc_key: Option<SecretBytes>,
}

impl Credentials {
    /// Create credentials from a username and password.
    ///
    /// IPMI usernames are ASCII in most deployments, but the protocol treats
    /// them as raw bytes. Usernames longer than 16 bytes are rejected at
    /// submit time.
    pub fn new(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            username: username.into(),
            password: SecretBytes::new(password.into()),
            bmc_key: None,
        }
    }

    /// Set the optional BMC key (`Kg`) for "two-key" logins.
    ///
    /// If not set, the password key is used ("one-key" login), which is
    /// common in many BMC default configs.
    pub fn with_bmc_key(mut self, kg: impl Into<Vec<u8>>) -> Self {
        self.bmc_key = Some(SecretBytes::new(kg.into()));
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &String::from_utf8_lossy(&self.username))
            .finish_non_exhaustive()
    }
}

/// Bridged addressing for commands that traverse satellite controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridge {
    /// Command addressed directly to the BMC.
    Direct,
    /// One hop: the BMC forwards to `target_addr` on `target_channel`.
    Single {
        /// Slave address of the final target.
        target_addr: u8,
        /// Channel the target sits behind.
        target_channel: u8,
    },
    /// Two hops: through a transit controller, then to the target.
    Dual {
        /// Slave address of the final target.
        target_addr: u8,
        /// Channel the target sits behind.
        target_channel: u8,
        /// Slave address of the transit controller.
        transit_addr: u8,
        /// Channel the transit controller sits behind.
        transit_channel: u8,
    },
}

/// Opaque caller correlation id echoed back with the matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(pub u64);

/// An abstract IPMI command addressed to one target.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// BMC address (UDP host and port).
    pub addr: SocketAddr,
    /// Network function of the request.
    pub netfn: u8,
    /// Command number.
    pub cmd: u8,
    /// Request data bytes (excluding netfn/cmd framing).
    pub data: Vec<u8>,
    /// Bridged addressing, if the target sits behind a satellite controller.
    pub bridge: Bridge,
    /// How long to wait for the response before the request is reaped.
    pub timeout: Duration,
    /// Credentials for the session with this target.
    pub credentials: Credentials,
    /// Caller correlation id, echoed in the delivered response.
    pub token: RequestToken,
}

/// A correlated response (or synthetic local failure) for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// The token of the originating [`CommandRequest`].
    pub token: RequestToken,
    /// Network function of the response.
    pub netfn: u8,
    /// Command number.
    pub cmd: u8,
    /// Response bytes; the first byte is the IPMI completion code.
    pub data: Vec<u8>,
}

impl CommandResponse {
    /// The IPMI completion code, or the synthetic sentinel when empty.
    pub fn completion_code(&self) -> u8 {
        self.data.first().copied().unwrap_or(completion_code::NO_RESPONSE)
    }
}

impl fmt::Debug for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandResponse")
            .field("token", &self.token.0)
            .field("netfn", &format_args!("{:#04x}", self.netfn))
            .field("cmd", &format_args!("{:#04x}", self.cmd))
            .field(
                "completion_code",
                &format_args!("{:#04x}", self.completion_code()),
            )
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Upcall that delivers correlated responses back to the caller.
///
/// Delivery happens on the receiver thread while the session table lock is
/// held: implementations must hand off quickly (e.g. push to a channel) and
/// must not call back into the manager.
pub trait ResponseSink: Send + Sync + 'static {
    /// Deliver one response or synthetic failure.
    fn deliver(&self, response: CommandResponse);
}

/// Well-known IPMI completion codes used by this crate.
pub mod completion_code {
    /// Command completed normally.
    pub const OK: u8 = 0x00;
    /// Synthetic sentinel for local failures (no free session/sequence,
    /// build failure). Never produced by a BMC response this crate accepts.
    pub const NO_RESPONSE: u8 = 0xFF;
}
