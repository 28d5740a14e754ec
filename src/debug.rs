use std::sync::OnceLock;

/// Wire-level hex dumps, enabled by setting `IPMI_LAN_DEBUG` to a non-empty
/// value. The environment is read once per process.
pub(crate) fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("IPMI_LAN_DEBUG")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    })
}

pub(crate) fn dump_hex(label: &str, bytes: &[u8]) {
    use std::fmt::Write;

    if !enabled() {
        return;
    }

    let mut line = String::with_capacity(label.len() + bytes.len() * 3 + 8);
    let _ = write!(line, "{label} ({}):", bytes.len());
    for b in bytes {
        let _ = write!(line, " {b:02x}");
    }

    tracing::trace!("{line}");
}
