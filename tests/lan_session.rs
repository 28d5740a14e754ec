//! End-to-end exercise of the public API against a scripted BMC on a
//! loopback UDP socket: v1.5 session establishment, queued-command flush,
//! and steady-state request/response correlation.

use std::net::UdpSocket;
use std::sync::Mutex;
use std::sync::mpsc::{Sender, channel};
use std::time::Duration;

use ipmi_lan::{
    Bridge, CommandRequest, CommandResponse, Credentials, LanManager, RequestToken, ResponseSink,
};

struct ChannelSink(Mutex<Sender<CommandResponse>>);

impl ResponseSink for ChannelSink {
    fn deliver(&self, response: CommandResponse) {
        let _ = self.0.lock().expect("sink lock").send(response);
    }
}

fn ipmi_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1)
}

/// Frame a LAN response the way a BMC does (roles flipped, completion code
/// first in the data).
fn lan_response(netfn: u8, rq_seq: u8, cmd: u8, data: &[u8]) -> Vec<u8> {
    let mut msg = vec![0x81, netfn << 2];
    msg.push(ipmi_checksum(&msg[0..2]));
    msg.push(0x20);
    msg.push(rq_seq << 2);
    msg.push(cmd);
    msg.extend_from_slice(data);
    let csum = ipmi_checksum(&msg[3..]);
    msg.push(csum);
    msg
}

/// Wrap a LAN message in an RMCP + v1.5 session envelope with auth type
/// NONE.
fn v15_wrap(session_id: u32, message: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x06, 0x00, 0xFF, 0x07];
    packet.push(0x00);
    packet.extend_from_slice(&0u32.to_le_bytes());
    packet.extend_from_slice(&session_id.to_le_bytes());
    packet.push(message.len() as u8);
    packet.extend_from_slice(message);
    packet
}

const TEMP_SESSION_ID: u32 = 0x1122_3344;
const REAL_SESSION_ID: u32 = 0x5566_7788;

/// A minimal BMC: auth type NONE only, answers the v1.5 handshake and Get
/// Device ID until the console goes quiet.
fn run_fake_bmc(socket: UdpSocket) {
    let mut buf = [0u8; 512];

    loop {
        let Ok((n, src)) = socket.recv_from(&mut buf) else {
            return;
        };
        let packet = &buf[..n];

        // RMCP (4) + auth type (1) + seq (4) + session id (4); auth NONE
        // requests carry no auth code.
        if packet.len() < 14 || packet[4] != 0x00 {
            continue;
        }
        let msg_len = packet[13] as usize;
        if packet.len() < 14 + msg_len {
            continue;
        }
        let msg = &packet[14..14 + msg_len];
        let netfn = msg[1] >> 2;
        let rq_seq = msg[4] >> 2;
        let cmd = msg[5];
        if netfn != 0x06 {
            continue;
        }

        let (session_id, data): (u32, Vec<u8>) = match cmd {
            // Get Channel Authentication Capabilities: NONE only, no v2.0.
            0x38 => (0, vec![0x00, 0x0E, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            // Get Session Challenge.
            0x39 => {
                let mut d = vec![0x00];
                d.extend_from_slice(&TEMP_SESSION_ID.to_le_bytes());
                d.extend_from_slice(&[0xCC; 16]);
                (0, d)
            }
            // Activate Session.
            0x3A => {
                let mut d = vec![0x00, 0x00];
                d.extend_from_slice(&REAL_SESSION_ID.to_le_bytes());
                d.extend_from_slice(&0x0000_0010u32.to_le_bytes());
                d.push(0x04);
                (TEMP_SESSION_ID, d)
            }
            // Set Session Privilege Level.
            0x3B => (REAL_SESSION_ID, vec![0x00, 0x04]),
            // Get Device ID.
            0x01 => (
                REAL_SESSION_ID,
                vec![0x00, 0x20, 0x01, 0x02, 0x43, 0x02, 0x00, 0xA2, 0x02, 0x00],
            ),
            _ => continue,
        };

        let response = v15_wrap(session_id, &lan_response(netfn | 0x01, rq_seq, cmd, &data));
        let _ = socket.send_to(&response, src);
    }
}

fn device_id_request(addr: std::net::SocketAddr, token: u64) -> CommandRequest {
    CommandRequest {
        addr,
        netfn: 0x06,
        cmd: 0x01,
        data: Vec::new(),
        bridge: Bridge::Direct,
        timeout: Duration::from_millis(5_000),
        // An empty password steers auth type selection to NONE.
        credentials: Credentials::new("root", ""),
        token: RequestToken(token),
    }
}

#[test]
fn v15_session_establishes_and_correlates_responses() {
    let bmc_socket = UdpSocket::bind("127.0.0.1:0").expect("bind bmc");
    bmc_socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout");
    let bmc_addr = bmc_socket.local_addr().expect("bmc addr");
    let bmc = std::thread::spawn(move || run_fake_bmc(bmc_socket));

    let (tx, rx) = channel();
    let manager = LanManager::builder()
        .bind_addr("127.0.0.1:0".parse().expect("addr"))
        .build(std::sync::Arc::new(ChannelSink(Mutex::new(tx))))
        .expect("manager");

    // First command triggers session establishment; the command itself is
    // queued and flushed once the handshake completes.
    manager
        .submit(device_id_request(bmc_addr, 1))
        .expect("submit");

    let first = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first response");
    assert_eq!(first.token, RequestToken(1));
    assert_eq!(first.netfn & 0x3E, 0x06);
    assert_eq!(first.cmd, 0x01);
    assert_eq!(first.completion_code(), 0x00);
    assert_eq!(&first.data[1..3], &[0x20, 0x01]);

    // Second command rides the now-ACTIVE session directly.
    manager
        .submit(device_id_request(bmc_addr, 2))
        .expect("submit");

    let second = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("second response");
    assert_eq!(second.token, RequestToken(2));
    assert_eq!(second.completion_code(), 0x00);

    manager.shutdown();
    bmc.join().expect("bmc thread");
}
