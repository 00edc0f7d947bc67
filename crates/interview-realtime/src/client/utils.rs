use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, ENGINE_IO_VERSION};
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

/// Maps the HTTP(S) API origin onto the Socket.IO WebSocket endpoint.
pub fn socket_url(config: &Config) -> String {
    let api_url = config.api_url();
    let origin = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_url.to_string()
    };
    format!(
        "{}{}?EIO={}&transport=websocket",
        origin,
        config.path(),
        ENGINE_IO_VERSION
    )
}

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = socket_url(config).into_client_request()?;
    let token = config.token().expose_secret();
    if !token.is_empty() {
        request
            .headers_mut()
            .insert(AUTHORIZATION_HEADER, format!("Bearer {}", token).as_str().parse()?);
    }
    Ok(request)
}
