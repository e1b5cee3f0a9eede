//! Shared HTTP client construction for provider and embedding calls.

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "AGENTY_DISABLE_SYSTEM_PROXY";

/// Build a long-lived HTTP client respecting proxy settings.
pub fn build_http_client() -> Client {
    let builder = if should_disable_system_proxy() {
        Client::builder().no_proxy()
    } else {
        Client::builder()
    };
    builder.build().unwrap_or_default()
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
