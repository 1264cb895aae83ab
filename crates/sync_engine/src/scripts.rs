//! Page-context script sources evaluated through [`crate::RenderingSurface`].
//!
//! Selector strings are embedded as JSON string literals, which are valid
//! JavaScript string literals.

/// Returns a plain object that deserializes into [`crate::PageSnapshot`].
pub const SNAPSHOT: &str = r#"(() => {
  const storageKeys = [];
  try {
    for (let i = 0; i < localStorage.length; i++) storageKeys.push(localStorage.key(i));
  } catch (e) {}
  return {
    url: location.href,
    title: document.title,
    html: document.documentElement.outerHTML,
    text: document.body ? document.body.innerText : '',
    ready: document.readyState === 'complete',
    storageKeys: storageKeys,
    cookie: document.cookie
  };
})()"#;

pub const SCROLL_TO_BOTTOM: &str = r#"(() => {
  window.scrollTo({ top: document.documentElement.scrollHeight, behavior: 'smooth' });
  return true;
})()"#;

/// Clicks the `index`-th match of `selector`; evaluates to whether anything was clicked.
pub fn click_element(selector: &str, index: usize) -> String {
    let literal = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{\n  const el = document.querySelectorAll({literal})[{index}];\n  if (!el) return false;\n  el.click();\n  return true;\n}})()"
    )
}

pub fn scroll_by(pixels: u32) -> String {
    format!("(() => {{\n  window.scrollBy(0, {pixels});\n  return true;\n}})()")
}

pub fn is_click(source: &str) -> bool {
    source.contains("el.click()")
}

pub fn is_scroll_to_bottom(source: &str) -> bool {
    source == SCROLL_TO_BOTTOM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_script_escapes_selector_quotes() {
        let script = click_element(r#"button[class*="load"]"#, 2);
        assert!(script.contains(r#"querySelectorAll("button[class*=\"load\"]")[2]"#));
        assert!(is_click(&script));
        assert!(!is_click(SNAPSHOT));
    }
}
