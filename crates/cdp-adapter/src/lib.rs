//! Chromium DevTools Protocol page probe
//!
//! Attaches to a browser that is already running with remote debugging
//! enabled and exposes one of its pages as an [`action_primitives::PageProbe`].

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum AdapterErrorKind {
        #[error("invalid debugger address")]
        InvalidAddress,
        #[error("could not attach to browser")]
        AttachFailed,
        #[error("no matching page")]
        PageNotFound,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target element not found")]
        TargetNotFound,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self { kind, hint: None }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }
    }

    impl From<AdapterError> for action_primitives::ProbeError {
        fn from(err: AdapterError) -> Self {
            match err.kind {
                AdapterErrorKind::TargetNotFound => {
                    action_primitives::ProbeError::ActionFailed(err.to_string())
                }
                AdapterErrorKind::Internal => {
                    action_primitives::ProbeError::Internal(err.to_string())
                }
                _ => action_primitives::ProbeError::CdpIo(err.to_string()),
            }
        }
    }
}

pub mod config {
    use serde::{Deserialize, Serialize};

    /// Where and how to attach to the running browser.
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(default)]
    pub struct CdpConfig {
        /// `host:port`, `http://host:port` or a `ws://` DevTools URL
        pub debugger_url: String,
        /// Pick the first page whose URL contains this text
        pub page_url_contains: Option<String>,
        pub connect_timeout_ms: u64,
        /// Delay after target discovery before pages are listed
        pub discovery_settle_ms: u64,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                debugger_url: "http://127.0.0.1:9211".to_string(),
                page_url_contains: None,
                connect_timeout_ms: 10_000,
                discovery_settle_ms: 300,
            }
        }
    }
}

pub mod probe;
pub mod scripts;
pub mod util;

pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use probe::CdpPageProbe;

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::ProbeError;

    #[test]
    fn adapter_error_display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::AttachFailed)
            .with_hint("connection refused at 127.0.0.1:9211");
        assert_eq!(
            err.to_string(),
            "could not attach to browser: connection refused at 127.0.0.1:9211"
        );
    }

    #[test]
    fn adapter_errors_map_to_probe_errors() {
        let missing: ProbeError = AdapterError::new(AdapterErrorKind::TargetNotFound).into();
        assert!(matches!(missing, ProbeError::ActionFailed(_)));

        let io: ProbeError = AdapterError::new(AdapterErrorKind::CdpIo).into();
        assert!(io.is_transient());
    }

    #[test]
    fn default_config_targets_local_debug_port() {
        let cfg = CdpConfig::default();
        assert_eq!(cfg.debugger_url, "http://127.0.0.1:9211");
        assert!(cfg.page_url_contains.is_none());
    }
}
