use std::net::SocketAddr;

pub(crate) fn record_delivered(addr: SocketAddr, netfn: u8, cmd: u8) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_lan_responses_total", "outcome" => "delivered").increment(1);

    tracing::debug!(%addr, netfn, cmd, "delivered ipmi response");
}

pub(crate) fn record_synthetic_failure(addr: SocketAddr, netfn: u8, cmd: u8, reason: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_lan_responses_total", "outcome" => "synthetic").increment(1);

    tracing::debug!(%addr, netfn, cmd, reason, "synthetic failure response");
}

pub(crate) fn record_discard(addr: SocketAddr, reason: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_lan_discards_total", "reason" => reason).increment(1);

    tracing::debug!(%addr, reason, "discarded inbound datagram");
}

pub(crate) fn record_session_opened(addr: SocketAddr) {
    let _ = addr;

    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_lan_sessions_opened_total").increment(1);
}

pub(crate) fn record_session_released(addr: SocketAddr, reason: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_lan_sessions_released_total", "reason" => reason).increment(1);

    tracing::debug!(%addr, reason, "session released");
}

pub(crate) fn record_pool_exhausted(kind: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_lan_pool_exhausted_total", "pool" => kind).increment(1);

    tracing::warn!(pool = kind, "fixed pool exhausted, rejecting");
}
