use prometheus::{Counter, Encoder, Histogram, IntCounterVec, Opts, Registry, TextEncoder};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref RELAY_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_requests_total", "Relay requests by response status"),
        &["status"]
    ).expect("valid relay_requests_total definition");

    pub static ref RELAY_UPSTREAM_ERRORS: Counter = Counter::new(
        "relay_upstream_errors_total",
        "Upstream webhook calls that failed"
    ).expect("valid relay_upstream_errors_total definition");

    pub static ref RELAY_LATENCY: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "relay_upstream_latency_seconds",
            "Upstream webhook latency in seconds"
        ).buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0])
    ).expect("valid relay_upstream_latency_seconds definition");

    pub static ref WALLET_NOTIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("wallet_notifications_total", "Wallet notifications sent by outcome"),
        &["outcome"]
    ).expect("valid wallet_notifications_total definition");
}

pub fn init() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(RELAY_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(RELAY_UPSTREAM_ERRORS.clone()))?;
    REGISTRY.register(Box::new(RELAY_LATENCY.clone()))?;
    REGISTRY.register(Box::new(WALLET_NOTIFICATIONS.clone()))?;
    Ok(())
}

/// Text exposition of everything registered in [`REGISTRY`].
pub fn gather() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_and_exposition() {
        init().unwrap();
        assert!(init().is_err(), "collectors register once");

        RELAY_REQUESTS.with_label_values(&["200"]).inc();
        let text = gather().unwrap();
        assert!(text.contains("relay_requests_total{status=\"200\"}"));
        assert!(text.contains("relay_upstream_latency_seconds"));
    }
}
