#![deny(unsafe_code)]
#![warn(missing_docs)]

//! An IPMI-over-LAN session manager.
//!
//! The crate multiplexes many concurrent caller commands over one long-lived
//! session per BMC, implementing:
//! - the RMCP (IPMI v1.5) challenge/response handshake with MD5 or password
//!   per-message authentication
//! - the RMCP+ (IPMI v2.0) RAKP key exchange with cipher-suite negotiation,
//!   HMAC-SHA1-96 integrity and AES-CBC-128 confidentiality
//! - sequence-number correlation of out-of-order responses, with bounded
//!   session/request pools and a periodic timeout reaper
//! - single- and dual-hop bridged framing for targets behind satellite
//!   controllers
//!
//! Callers submit abstract `(netfn, cmd, data)` commands through
//! [`LanManager::submit`]; correlated responses come back asynchronously
//! through a [`ResponseSink`]. Nothing is persisted; all session state is
//! rebuilt from scratch on restart.

mod crypto;
mod debug;
mod error;
mod manager;
mod observe;
mod protocol;
mod session;
mod table;
mod transport;
mod types;

pub use crate::error::{Error, Result};
pub use crate::manager::{LanManager, LanManagerBuilder};
pub use crate::types::{
    Bridge, CommandRequest, CommandResponse, Credentials, PrivilegeLevel, RequestToken,
    ResponseSink, completion_code,
};
