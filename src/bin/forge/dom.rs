use anyhow::{Result, anyhow};
use headless_chrome::Tab;
use serde::Deserialize;
use std::sync::Arc;

use crate::types::DOM_SNAPSHOT_MAX_CHARS;

/// JavaScript injected into the page to produce a simplified DOM representation.
/// NON-DESTRUCTIVE apart from the `data-eid` attributes it sets.
///
/// The script:
///   1. Skips script, style, noscript, svg and link elements.
///   2. Walks the visible DOM tree (max depth 15).
///   3. Numbers interactive elements (a, button, input, textarea, select) densely
///      from 0 and stores the number in a data-eid attribute.
///   4. Emits one compact line per element, prefixed with `[N]`.
const SNAPSHOT_JS: &str = r#"
(() => {
  const SKIP = new Set(['SCRIPT','STYLE','NOSCRIPT','SVG','LINK']);
  document.querySelectorAll('[data-eid]').forEach(el => el.removeAttribute('data-eid'));
  let id = 0;
  const lines = [];
  const seen = new Set();

  function isVisible(el) {
    if (el.offsetParent === null && el.tagName !== 'BODY' && el.tagName !== 'HTML') return false;
    const s = getComputedStyle(el);
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
  }

  function walk(node, depth) {
    if (depth > 15) return;
    for (const child of node.children) {
      if (SKIP.has(child.tagName)) continue;
      if (!isVisible(child)) continue;
      const tag = child.tagName.toLowerCase();
      const interactive = ['a','button','input','textarea','select'].includes(tag);

      if (interactive) {
        const index = id++;
        child.setAttribute('data-eid', String(index));
        const eid = '[' + index + ']';
        let desc = '';
        if (tag === 'a') {
          desc = eid + ' link "' + (child.textContent||'').trim().slice(0,60) + '"';
        } else if (tag === 'input' || tag === 'textarea') {
          desc = eid + ' ' + tag + ' type=' + (child.type||'text') + ' placeholder="' + (child.placeholder||'') + '"';
          if (child.name) desc += ' name=' + child.name;
          if (child.value) desc += ' value="' + child.value.slice(0,30) + '"';
        } else if (tag === 'button') {
          desc = eid + ' button "' + (child.textContent||'').trim().slice(0,60) + '"';
        } else if (tag === 'select') {
          const opts = [...child.options].map(o => o.text.trim().slice(0,20)).join('|');
          desc = eid + ' select [' + opts + ']';
        }
        lines.push(desc);
      } else {
        const text = child.textContent ? child.textContent.trim() : '';
        if (text && text.length > 2 && text.length < 200 && child.children.length === 0) {
          const t = text.slice(0, 100);
          if (!seen.has(t)) {
            seen.add(t);
            lines.push('  "' + t + '"');
          }
        }
      }
      walk(child, depth + 1);
    }
  }

  walk(document.body, 0);
  return lines.join('\n');
})()
"#;

/// Returns `{"tag": ..., "xpath": ...}` for the element numbered `__INDEX__`,
/// or null when no such element exists. Ids win over positional paths.
const ELEMENT_INFO_JS: &str = r#"
(() => {
  const el = document.querySelector('[data-eid="__INDEX__"]');
  if (!el) return null;

  function xpathOf(node) {
    if (node.id && document.querySelectorAll('#' + CSS.escape(node.id)).length === 1) {
      return '//' + node.tagName.toLowerCase() + '[@id="' + node.id + '"]';
    }
    if (node === document.documentElement) return '/html';
    let position = 1;
    for (let sib = node.previousElementSibling; sib; sib = sib.previousElementSibling) {
      if (sib.tagName === node.tagName) position++;
    }
    return xpathOf(node.parentElement) + '/' + node.tagName.toLowerCase() + '[' + position + ']';
  }

  return JSON.stringify({ tag: el.tagName.toLowerCase(), xpath: xpathOf(el) });
})()
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub xpath: String,
}

/// CSS selector for an element numbered by the last snapshot.
pub fn selector_for(index: u32) -> String {
    format!("[data-eid=\"{index}\"]")
}

/// Capture a simplified DOM snapshot from the current page.
pub fn capture_dom_snapshot(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate(SNAPSHOT_JS, false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();

    if raw.len() > DOM_SNAPSHOT_MAX_CHARS {
        let cut = raw
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= DOM_SNAPSHOT_MAX_CHARS)
            .last()
            .unwrap_or(0);
        Ok(format!(
            "{}\n... [truncated, {} total chars]",
            &raw[..cut],
            raw.len()
        ))
    } else {
        Ok(raw)
    }
}

/// Tag name and XPath of the element numbered `index`.
pub fn element_info(tab: &Arc<Tab>, index: u32) -> Result<ElementInfo> {
    let script = ELEMENT_INFO_JS.replace("__INDEX__", &index.to_string());
    let result = tab.evaluate(&script, false)?;
    let json = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| anyhow!("element {index} is not on the page"))?;
    Ok(serde_json::from_str(&json)?)
}

/// Get the current page URL.
pub fn get_current_url(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate("window.location.href", false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string()))
}

/// Get the current page title.
pub fn get_page_title(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate("document.title", false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "untitled".to_string()))
}
