//! Core data types for page probing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::ProbeError;
use crate::template::{render_template, render_xpath};

/// Element locator
///
/// Mirrors the lookup strategies a wizard configuration can name:
/// - XPath expression
/// - CSS selector
/// - `name` attribute
/// - class name
///
/// Locator text may contain `{field}` placeholders that are rendered
/// against a record before the locator reaches the probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// XPath expression
    Xpath(String),

    /// CSS selector
    Css(String),

    /// Value of the `name` attribute
    Name(String),

    /// Single class name
    ClassName(String),
}

impl Locator {
    /// Raw locator expression
    pub fn expression(&self) -> &str {
        match self {
            Locator::Xpath(s) | Locator::Css(s) | Locator::Name(s) | Locator::ClassName(s) => s,
        }
    }

    /// Whether the expression references record fields
    pub fn has_placeholders(&self) -> bool {
        crate::template::placeholders(self.expression())
            .map(|names| !names.is_empty())
            .unwrap_or(false)
    }

    /// Substitute `{field}` placeholders using `lookup`
    pub fn render<'a, F>(&self, lookup: F) -> Result<Locator, ProbeError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        Ok(match self {
            Locator::Xpath(expr) => Locator::Xpath(render_xpath(expr, lookup)?),
            Locator::Css(expr) => Locator::Css(render_template(expr, lookup)?),
            Locator::Name(expr) => Locator::Name(render_template(expr, lookup)?),
            Locator::ClassName(expr) => Locator::ClassName(render_template(expr, lookup)?),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Xpath(s) => write!(f, "xpath:{}", s),
            Locator::Css(s) => write!(f, "css:{}", s),
            Locator::Name(s) => write!(f, "name:{}", s),
            Locator::ClassName(s) => write!(f, "class:{}", s),
        }
    }
}

/// Readiness condition evaluated against the live surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessCondition {
    /// Always holds; used for steps whose action needs no gate
    Immediate,

    /// Element is attached to the document
    Present(Locator),

    /// Element is attached and rendered with a non-empty box
    Visible(Locator),

    /// Element is visible and enabled
    Clickable(Locator),

    /// Element is detached or not visible
    Absent(Locator),
}

impl ReadinessCondition {
    /// Locator the condition is evaluated against
    pub fn target(&self) -> Option<&Locator> {
        match self {
            ReadinessCondition::Immediate => None,
            ReadinessCondition::Present(l)
            | ReadinessCondition::Visible(l)
            | ReadinessCondition::Clickable(l)
            | ReadinessCondition::Absent(l) => Some(l),
        }
    }

    /// Render placeholders in the target locator
    pub fn render<'a, F>(&self, lookup: F) -> Result<ReadinessCondition, ProbeError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        Ok(match self {
            ReadinessCondition::Immediate => ReadinessCondition::Immediate,
            ReadinessCondition::Present(l) => ReadinessCondition::Present(l.render(lookup)?),
            ReadinessCondition::Visible(l) => ReadinessCondition::Visible(l.render(lookup)?),
            ReadinessCondition::Clickable(l) => ReadinessCondition::Clickable(l.render(lookup)?),
            ReadinessCondition::Absent(l) => ReadinessCondition::Absent(l.render(lookup)?),
        })
    }
}

impl fmt::Display for ReadinessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessCondition::Immediate => write!(f, "immediate"),
            ReadinessCondition::Present(l) => write!(f, "present({})", l),
            ReadinessCondition::Visible(l) => write!(f, "visible({})", l),
            ReadinessCondition::Clickable(l) => write!(f, "clickable({})", l),
            ReadinessCondition::Absent(l) => write!(f, "absent({})", l),
        }
    }
}

/// Fully resolved UI action, ready to be performed without further waiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiAction {
    /// Native click on the element
    Click(Locator),

    /// Click dispatched from page script, for targets covered by overlays
    ScriptClick(Locator),

    /// Append text to an input
    Type { target: Locator, text: String },

    /// Choose an option of a `<select>` by visible text or value
    Select { target: Locator, option: String },

    /// Go back one entry in session history
    NavigateBack,

    /// Reload the page
    Refresh,
}

impl UiAction {
    /// Element the action is fired against, if any
    pub fn target(&self) -> Option<&Locator> {
        match self {
            UiAction::Click(l) | UiAction::ScriptClick(l) => Some(l),
            UiAction::Type { target, .. } | UiAction::Select { target, .. } => Some(target),
            UiAction::NavigateBack | UiAction::Refresh => None,
        }
    }

    /// Short action name for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            UiAction::Click(_) => "click",
            UiAction::ScriptClick(_) => "script_click",
            UiAction::Type { .. } => "type",
            UiAction::Select { .. } => "select",
            UiAction::NavigateBack => "navigate_back",
            UiAction::Refresh => "refresh",
        }
    }
}

impl fmt::Display for UiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(target) => write!(f, "{}({})", self.kind(), target),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Bounds for [`crate::await_condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Upper bound for the whole wait
    pub timeout: Duration,

    /// Delay between two evaluations of the condition
    pub poll_interval: Duration,
}

impl WaitOptions {
    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_millis(25_000, 250)
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The condition held before the bound elapsed
    Ready,

    /// The bound elapsed first
    TimedOut { waited_ms: u64 },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_display_names_strategy() {
        assert_eq!(
            Locator::Xpath("//button[@title='Add']".into()).to_string(),
            "xpath://button[@title='Add']"
        );
        assert_eq!(Locator::Name("TRN".into()).to_string(), "name:TRN");
        assert_eq!(
            Locator::ClassName("MuiModal-backdrop".into()).to_string(),
            "class:MuiModal-backdrop"
        );
    }

    #[test]
    fn locator_render_substitutes_record_fields() {
        let locator = Locator::Xpath("//span[@title='{tag}']".into());
        assert!(locator.has_placeholders());

        let rendered = locator
            .render(|name| (name == "tag").then_some("Civil Works"))
            .unwrap();
        assert_eq!(rendered, Locator::Xpath("//span[@title='Civil Works']".into()));
        assert!(!rendered.has_placeholders());
    }

    #[test]
    fn xpath_locator_requotes_values_with_apostrophes() {
        let locator = Locator::Xpath("//span[@title='{tag}']".into());
        let rendered = locator.render(|_| Some("Contractor's Tools")).unwrap();
        assert_eq!(
            rendered,
            Locator::Xpath("//span[@title=\"Contractor's Tools\"]".into())
        );

        let css = Locator::Css("input[value='{tag}']".into());
        assert_eq!(
            css.render(|_| Some("Civil")).unwrap(),
            Locator::Css("input[value='Civil']".into())
        );
    }

    #[test]
    fn condition_render_reports_missing_field() {
        let cond = ReadinessCondition::Clickable(Locator::Xpath("//span[@title='{tag}']".into()));
        let err = cond.render(|_| None).unwrap_err();
        assert_eq!(err, ProbeError::MissingField("tag".into()));
    }

    #[test]
    fn readiness_condition_yaml_shape() {
        let cond: ReadinessCondition =
            serde_json::from_str(r#"{"clickable":{"xpath":"//button[@title='Add']"}}"#).unwrap();
        assert_eq!(
            cond,
            ReadinessCondition::Clickable(Locator::Xpath("//button[@title='Add']".into()))
        );

        let immediate: ReadinessCondition = serde_json::from_str(r#""immediate""#).unwrap();
        assert_eq!(immediate.target(), None);
    }

    #[test]
    fn action_display_includes_target() {
        let action = UiAction::Type {
            target: Locator::Name("companyName".into()),
            text: "Acme".into(),
        };
        assert_eq!(action.to_string(), "type(name:companyName)");
        assert_eq!(UiAction::Refresh.to_string(), "refresh");
    }

    #[test]
    fn wait_options_clamp_poll_interval() {
        let opts = WaitOptions::from_millis(1_000, 0);
        assert_eq!(opts.poll_interval, Duration::from_millis(1));
        assert_eq!(WaitOptions::default().timeout, Duration::from_secs(25));
    }
}
