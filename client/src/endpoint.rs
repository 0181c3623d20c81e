//! Derives the live-channel URL from the page origin.

use crate::error::{ClientError, ClientResult};
use url::Url;

/// Path of the live channel on the origin host.
pub const CHANNEL_PATH: &str = "/api/ws";

/// Maps a page origin such as `https://play.example.net` to its channel
/// endpoint `wss://play.example.net/api/ws`.
///
/// `http` becomes `ws` and `https` becomes `wss`; `ws`/`wss` origins are
/// accepted as-is. Any path, query or fragment on the origin is replaced.
pub fn channel_endpoint(origin: &str) -> ClientResult<Url> {
    let invalid = |reason: String| ClientError::InvalidEndpoint {
        origin: origin.to_string(),
        reason,
    };

    let mut url = Url::parse(origin).map_err(|e| invalid(e.to_string()))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to scheme '{scheme}'")))?;
    url.set_path(CHANNEL_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
