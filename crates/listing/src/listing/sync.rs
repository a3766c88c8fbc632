//! Facet synchronization protocol.
//!
//! The facet-refresh endpoint answers with one object per facet field,
//! keyed by field identifier, mapping each surviving value to its label:
//!
//! ```json
//! { "color": { "Blue": "Blue (2)", "Red": "Red (1)" }, "maker__id": { "1": "Acme (3)" } }
//! ```
//!
//! A client applies it to each select by restoring the full original option
//! list, dropping options missing from the payload and relabelling the rest.
//! The "any" option (empty value) always survives. [`OptionList`] is that
//! algorithm on the server side; `static/faceted-listing.js` mirrors it in
//! the browser.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use super::types::{FacetOptions, FacetResultSet};

/// Label of the option that clears a facet selection.
pub const ANY_LABEL: &str = "(any)";

/// Wire form of a [`FacetResultSet`], in configured facet order.
pub struct FacetPayload<'a>(pub &'a FacetResultSet);

struct OptionLabels<'a>(&'a FacetOptions);

impl Serialize for OptionLabels<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.options.len()))?;
        for option in &self.0.options {
            map.serialize_entry(&option.value, &option.label)?;
        }
        map.end()
    }
}

impl Serialize for FacetPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.facets.len()))?;
        for facet in &self.0.facets {
            map.serialize_entry(&facet.identifier, &OptionLabels(facet))?;
        }
        map.end()
    }
}

impl FacetPayload<'_> {
    /// JSON text safe to place inside a `<script>` element.
    pub fn to_script_json(&self) -> serde_json::Result<String> {
        Ok(serde_json::to_string(self)?.replace("</", "<\\/"))
    }
}

/// Received payload: field identifier → value → label.
pub type ReceivedFacets = BTreeMap<String, BTreeMap<String, String>>;

/// One `<option>` of a facet select.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The "any" option.
    pub fn any() -> Self {
        Self::new("", ANY_LABEL)
    }

    pub fn is_any(&self) -> bool {
        self.value.is_empty()
    }
}

/// The option list of one facet select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionList {
    original: Vec<SelectOption>,
    options: Vec<SelectOption>,
    selected: Option<String>,
}

impl OptionList {
    /// A list whose full original set is "any" followed by `options`.
    pub fn new(options: Vec<SelectOption>) -> Self {
        let original: Vec<SelectOption> = std::iter::once(SelectOption::any())
            .chain(options.into_iter().filter(|o| !o.is_any()))
            .collect();
        Self {
            options: original.clone(),
            original,
            selected: None,
        }
    }

    /// Build the original list from unfiltered facet options.
    pub fn from_facet(facet: &FacetOptions) -> Self {
        Self::new(
            facet
                .options
                .iter()
                .map(|o| SelectOption::new(&o.value, &o.label))
                .collect(),
        )
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn original(&self) -> &[SelectOption] {
        &self.original
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select a value. Blank or unknown values select "any".
    pub fn select(&mut self, value: Option<&str>) {
        self.selected = value
            .filter(|v| !v.is_empty())
            .filter(|v| self.options.iter().any(|o| o.value == *v))
            .map(str::to_string);
    }

    /// Restore the full original list and clear the selection.
    pub fn reset(&mut self) {
        self.options = self.original.clone();
        self.selected = None;
    }

    /// Narrow the list to the values in `received`, relabelling survivors.
    ///
    /// Starts from the original list every time, so applying the same
    /// payload twice gives the same list. The selection is kept when its
    /// option survives.
    pub fn apply(&mut self, received: &BTreeMap<String, String>) {
        let selected = self.selected.take();

        self.options = self
            .original
            .iter()
            .filter_map(|option| {
                if option.is_any() {
                    return Some(option.clone());
                }
                received
                    .get(&option.value)
                    .map(|label| SelectOption::new(&option.value, label))
            })
            .collect();

        self.select(selected.as_deref());
    }

    /// Apply a computed facet result directly.
    pub fn apply_facet(&mut self, facet: &FacetOptions) {
        self.apply(&facet.labels());
    }
}
