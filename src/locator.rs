//! Element index → XPath correlation.
//!
//! Engines report element handles as integer indices that are only
//! meaningful inside one run. The map below pins each index to a stable
//! XPath. Evidence arrives either through the structured `locator` field of a
//! [`RawAction`](crate::RawAction) or, as a fallback, embedded in free text,
//! which the pattern helpers in this module pick apart.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static DESCRIPTION_XPATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"xpath=(?:'([^']*)'|"([^"]*)")"#).expect("valid regex"));
static CONTENT_XPATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"The xpath of the element is (.+)").expect("valid regex"));
static CONTENT_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"element (\d+)").expect("valid regex"));

/// First-writer-wins mapping from element index to XPath.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementXPathMap(BTreeMap<u32, String>);

impl ElementXPathMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `index` unless it is already bound. Returns whether the map changed.
    pub fn bind(&mut self, index: u32, xpath: impl Into<String>) -> bool {
        let xpath = xpath.into();
        if xpath.is_empty() {
            return false;
        }
        match self.0.entry(index) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(xpath);
                true
            }
        }
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.0.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(i, x)| (*i, x.as_str()))
    }
}

impl FromIterator<(u32, String)> for ElementXPathMap {
    fn from_iter<T: IntoIterator<Item = (u32, String)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (index, xpath) in iter {
            map.bind(index, xpath);
        }
        map
    }
}

/// Pulls the `xpath='...'` (or `xpath="..."`) token out of an element description.
pub fn xpath_from_description(description: &str) -> Option<&str> {
    DESCRIPTION_XPATH
        .captures(description)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
        .filter(|x| !x.is_empty())
}

/// Reads an `(index, xpath)` pair out of an extracted-content line. Both
/// patterns have to match the same string.
pub fn binding_from_content(content: &str) -> Option<(u32, String)> {
    let xpath = CONTENT_XPATH.captures(content)?.get(1)?.as_str().trim();
    let index = CONTENT_INDEX.captures(content)?.get(1)?.as_str().parse().ok()?;
    if xpath.is_empty() {
        return None;
    }
    Some((index, xpath.to_string()))
}

/// Describes an element the way engines report `interacted_element`.
/// The xpath is double-quoted when it contains a single quote.
pub fn element_description(tag: &str, index: u32, xpath: &str) -> String {
    if xpath.contains('\'') && !xpath.contains('"') {
        format!("DOMElement(tag='{tag}', index={index}, xpath=\"{xpath}\")")
    } else {
        format!("DOMElement(tag='{tag}', index={index}, xpath='{xpath}')")
    }
}

/// Why a single locator lookup produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub index: u32,
    pub reason: String,
}

/// Outcome of resolving one element's XPath. Failures are reported, never raised.
pub type LocatorLookup = std::result::Result<String, LookupFailure>;

/// Renders a lookup as the content line an engine appends to its run.
pub fn lookup_content(index: u32, lookup: &LocatorLookup) -> String {
    match lookup {
        Ok(xpath) => format!("Resolved element {index}. The xpath of the element is {xpath}"),
        Err(failure) => format!(
            "Could not resolve xpath for element {}: {}",
            failure.index, failure.reason
        ),
    }
}
