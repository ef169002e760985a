use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

use crate::config::CONFIG;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_http_client(Duration::from_secs(CONFIG.gemini_timeout_secs))
        .expect("Failed to build HTTP client")
});

pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(15))
        .build()
}

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
