use url::Url;

use crate::error::{AdapterError, AdapterErrorKind};

/// Normalize a debugger address into a URL chromiumoxide can connect to.
///
/// Bare `host:port` becomes `http://host:port`; `http(s)` endpoints are
/// resolved by chromiumoxide through `/json/version`; `ws(s)` URLs are used
/// as-is.
pub fn normalize_debugger_url(raw: &str) -> Result<String, AdapterError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::new(AdapterErrorKind::InvalidAddress)
            .with_hint("debugger address is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).map_err(|err| {
        AdapterError::new(AdapterErrorKind::InvalidAddress)
            .with_hint(format!("{}: {}", trimmed, err))
    })?;

    match parsed.scheme() {
        "http" | "https" | "ws" | "wss" => {}
        other => {
            return Err(AdapterError::new(AdapterErrorKind::InvalidAddress)
                .with_hint(format!("unsupported scheme '{}'", other)))
        }
    }
    if parsed.host_str().is_none() {
        return Err(AdapterError::new(AdapterErrorKind::InvalidAddress)
            .with_hint(format!("{} has no host", trimmed)));
    }

    Ok(candidate.trim_end_matches('/').to_string())
}
