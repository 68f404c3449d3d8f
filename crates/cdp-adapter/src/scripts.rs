//! JavaScript snippets evaluated in the attached page
//!
//! Every snippet is a self-invoking expression returning a JSON object
//! `{ ok: bool, error?: string }` so results always deserialize.

use action_primitives::{Locator, ReadinessCondition};

const LOCATE_PRELUDE: &str = r#"
  const locate = (kind, expr) => {
    switch (kind) {
      case 'xpath':
        return document.evaluate(expr, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
      case 'css':
        return document.querySelector(expr);
      case 'name':
        return document.getElementsByName(expr)[0] || null;
      case 'class':
        return document.getElementsByClassName(expr)[0] || null;
      default:
        return null;
    }
  };
  const visible = (el) => {
    if (!el || !el.isConnected) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };
  const enabled = (el) => !el.disabled && el.getAttribute('aria-disabled') !== 'true';
"#;

fn locator_kind(locator: &Locator) -> &'static str {
    match locator {
        Locator::Xpath(_) => "xpath",
        Locator::Css(_) => "css",
        Locator::Name(_) => "name",
        Locator::ClassName(_) => "class",
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn wrap(locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{{prelude}  const el = locate({kind}, {expr});\n{body}\n}})()",
        prelude = LOCATE_PRELUDE,
        kind = js_string(locator_kind(locator)),
        expr = js_string(locator.expression()),
        body = body,
    )
}

/// Single evaluation of a readiness condition
pub fn condition_script(condition: &ReadinessCondition) -> Option<String> {
    let (locator, predicate) = match condition {
        ReadinessCondition::Immediate => return None,
        ReadinessCondition::Present(l) => (l, "el !== null && el.isConnected"),
        ReadinessCondition::Visible(l) => (l, "visible(el)"),
        ReadinessCondition::Clickable(l) => (l, "visible(el) && enabled(el)"),
        ReadinessCondition::Absent(l) => (l, "!visible(el)"),
    };
    Some(wrap(locator, &format!("  return {{ ok: Boolean({}) }};", predicate)))
}

/// Click dispatched from page script
pub fn script_click_script(locator: &Locator) -> String {
    wrap(
        locator,
        r#"  if (!el) return { ok: false, error: 'target not found' };
  el.click();
  return { ok: true };"#,
    )
}

/// Append text the way a user would, through the native value setter so
/// framework-controlled inputs observe the change
pub fn type_script(locator: &Locator, text: &str) -> String {
    wrap(
        locator,
        &format!(
            r#"  if (!el) return {{ ok: false, error: 'target not found' }};
  if (!('value' in el)) return {{ ok: false, error: 'target does not accept text' }};
  el.focus();
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
  const next = (el.value || '') + {text};
  if (descriptor && descriptor.set) {{ descriptor.set.call(el, next); }} else {{ el.value = next; }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};"#,
            text = js_string(text)
        ),
    )
}

/// Select an `<option>` by visible text, falling back to its value
pub fn select_script(locator: &Locator, option: &str) -> String {
    wrap(
        locator,
        &format!(
            r#"  if (!el) return {{ ok: false, error: 'target not found' }};
  if (el.tagName !== 'SELECT') return {{ ok: false, error: 'target is not a select element' }};
  const wanted = {option};
  const match = Array.from(el.options).find((o) => o.text.trim() === wanted)
    || Array.from(el.options).find((o) => o.value === wanted);
  if (!match) return {{ ok: false, error: 'option not found: ' + wanted }};
  el.value = match.value;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};"#,
            option = js_string(option)
        ),
    )
}

/// Go back one history entry
pub const NAVIGATE_BACK_SCRIPT: &str = "(() => { window.history.back(); return { ok: true }; })()";

/// CSS selector equivalent used for native element lookup, if one exists
pub fn css_equivalent(locator: &Locator) -> Option<String> {
    match locator {
        Locator::Css(s) => Some(s.clone()),
        Locator::Name(s) => Some(format!("[name={}]", js_string(s))),
        Locator::ClassName(s) => Some(format!(".{}", s)),
        Locator::Xpath(_) => None,
    }
}
