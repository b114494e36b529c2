//! SockJS session addressing and the `/info` probe.

use hearth_shared::SockJsInfo;
use rand::Rng;
use url::Url;

use crate::error::TransportError;

/// `<base>/<server>/<session>/websocket`, where server is three digits and
/// session a random string, as SockJS clients pick them.
pub(crate) fn session_url(base: &Url) -> Url {
    let server = rand::thread_rng().gen_range(0..1000u16);
    let session = uuid::Uuid::new_v4().simple().to_string();

    let mut url = base.clone();
    let path = format!(
        "{}/{:03}/{}/websocket",
        base.path().trim_end_matches('/'),
        server,
        session
    );
    url.set_path(&path);
    url
}

/// `ws(s)://host/ws` → `http(s)://host/ws/info`
pub(crate) fn info_url(base: &Url) -> Result<Url, TransportError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "wss" | "https" => "https",
        _ => "http",
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidEndpoint(base.to_string()))?;
    let path = format!("{}/info", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

/// Ask the server which transports it offers.
pub(crate) async fn fetch_info(
    http: &reqwest::Client,
    base: &Url,
) -> Result<SockJsInfo, TransportError> {
    let url = info_url(base)?;
    tracing::debug!(url = %url, "fetching SockJS info");
    let info = http
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| match e.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                TransportError::Unauthorized(format!("HTTP {}", status))
            }
            _ => TransportError::Info(e),
        })?
        .json::<SockJsInfo>()
        .await?;
    Ok(info)
}
