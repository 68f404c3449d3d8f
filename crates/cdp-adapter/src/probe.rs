//! Live page probe over an attached Chromium session

use std::time::Duration;

use action_primitives::{Locator, PageProbe, ProbeError, ReadinessCondition, UiAction};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts;
use crate::util::normalize_debugger_url;

#[derive(Debug, Deserialize)]
struct ScriptReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// [`PageProbe`] backed by one page of a running browser
pub struct CdpPageProbe {
    // Held so the connection stays open for the lifetime of the probe.
    _browser: Mutex<Browser>,
    page: Page,
    page_url: Option<String>,
    handler: JoinHandle<()>,
}

impl CdpPageProbe {
    /// Attach to the browser at `config.debugger_url` and select a page
    pub async fn attach(config: &CdpConfig) -> Result<Self, AdapterError> {
        let url = normalize_debugger_url(&config.debugger_url)?;
        info!(target: "cdp-adapter", url = %url, "attaching to running browser");

        let connect = Browser::connect(url.clone());
        let (mut browser, mut handler) =
            match timeout(Duration::from_millis(config.connect_timeout_ms), connect).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(err)) => {
                    return Err(AdapterError::new(AdapterErrorKind::AttachFailed)
                        .with_hint(format!("{}: {}", url, err)))
                }
                Err(_) => {
                    return Err(AdapterError::new(AdapterErrorKind::AttachFailed).with_hint(
                        format!(
                            "{}: no response within {}ms",
                            url, config.connect_timeout_ms
                        ),
                    ))
                }
            };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", "handler event error: {}", err);
                }
            }
            debug!(target: "cdp-adapter", "browser handler finished");
        });

        let discovered = browser.fetch_targets().await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("target discovery failed: {}", err))
        });
        let discovered = match discovered {
            Ok(targets) => targets,
            Err(err) => {
                handler_task.abort();
                return Err(err);
            }
        };
        debug!(target: "cdp-adapter", targets = discovered.len(), "targets discovered");
        sleep(Duration::from_millis(config.discovery_settle_ms)).await;

        let selected = select_page(&browser, config.page_url_contains.as_deref()).await;
        let (page, page_url) = match selected {
            Ok(found) => found,
            Err(err) => {
                handler_task.abort();
                return Err(err);
            }
        };

        info!(
            target: "cdp-adapter",
            page = page_url.as_deref().unwrap_or("<unknown>"),
            "attached to page"
        );

        Ok(Self {
            _browser: Mutex::new(browser),
            page,
            page_url,
            handler: handler_task,
        })
    }

    async fn evaluate(&self, script: String) -> Result<ScriptReply, AdapterError> {
        let result = self.page.evaluate(script).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("evaluate failed: {}", err))
        })?;
        result.into_value::<ScriptReply>().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("unexpected script result: {}", err))
        })
    }

    async fn run_action_script(&self, action: &UiAction, script: String) -> Result<(), ProbeError> {
        let reply = self.evaluate(script).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(ProbeError::ActionFailed(format!(
                "{}: {}",
                action,
                reply.error.unwrap_or_else(|| "rejected".to_string())
            )))
        }
    }

    async fn native_click(&self, locator: &Locator) -> Result<(), AdapterError> {
        let element = match scripts::css_equivalent(locator) {
            Some(css) => self.page.find_element(css).await,
            None => self.page.find_xpath(locator.expression()).await,
        }
        .map_err(|err| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("{}: {}", locator, err))
        })?;

        element.click().await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("click on {} failed: {}", locator, err))
        })?;
        Ok(())
    }
}

async fn select_page(
    browser: &Browser,
    url_contains: Option<&str>,
) -> Result<(Page, Option<String>), AdapterError> {
    let pages = browser.pages().await.map_err(|err| {
        AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("listing pages failed: {}", err))
    })?;

    let mut fallback = None;
    for page in pages {
        let url = page.url().await.ok().flatten();
        match (url_contains, url.as_deref()) {
            (Some(wanted), Some(current)) if current.contains(wanted) => return Ok((page, url)),
            (None, _) => return Ok((page, url)),
            _ => {
                if fallback.is_none() {
                    fallback = url;
                }
            }
        }
    }

    let hint = match url_contains {
        Some(wanted) => format!(
            "no page URL contains '{}' (first page seen: {})",
            wanted,
            fallback.as_deref().unwrap_or("none")
        ),
        None => "browser has no open pages".to_string(),
    };
    Err(AdapterError::new(AdapterErrorKind::PageNotFound).with_hint(hint))
}

#[async_trait]
impl PageProbe for CdpPageProbe {
    async fn check(&self, condition: &ReadinessCondition) -> Result<bool, ProbeError> {
        let Some(script) = scripts::condition_script(condition) else {
            return Ok(true);
        };
        let reply = self.evaluate(script).await?;
        Ok(reply.ok)
    }

    async fn perform(&self, action: &UiAction) -> Result<(), ProbeError> {
        debug!(target: "cdp-adapter", action = %action, "performing action");
        match action {
            UiAction::Click(locator) => Ok(self.native_click(locator).await?),
            UiAction::ScriptClick(locator) => {
                self.run_action_script(action, scripts::script_click_script(locator))
                    .await
            }
            UiAction::Type { target, text } => {
                self.run_action_script(action, scripts::type_script(target, text))
                    .await
            }
            UiAction::Select { target, option } => {
                self.run_action_script(action, scripts::select_script(target, option))
                    .await
            }
            UiAction::NavigateBack => {
                self.run_action_script(action, scripts::NAVIGATE_BACK_SCRIPT.to_string())
                    .await
            }
            UiAction::Refresh => {
                self.page.reload().await.map_err(|err| {
                    warn!(target: "cdp-adapter", "reload failed: {}", err);
                    ProbeError::CdpIo(format!("reload failed: {}", err))
                })?;
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "cdp page {}",
            self.page_url.as_deref().unwrap_or("<unknown url>")
        )
    }
}

impl Drop for CdpPageProbe {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
