use std::{sync::OnceLock, time::Duration};

use tracing::debug;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// `User-Agent` sent on every outbound request.
pub fn user_agent() -> String {
    format!("hyperpulse-webhook/{}", env!("CARGO_PKG_VERSION"))
}

/// Build the shared outbound HTTP client.
///
/// Per-request timeouts are applied by callers; `connect_timeout` bounds
/// only the TCP and TLS handshake.
pub fn build_client(connect_timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent())
        .pool_max_idle_per_host(4);

    if connect_timeout > Duration::ZERO {
        builder = builder.connect_timeout(connect_timeout);
    }

    builder.build().unwrap_or_else(|e| {
        debug!(error = %e, "Falling back to default reqwest client");
        reqwest::Client::new()
    })
}
