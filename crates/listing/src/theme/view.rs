//! Template view models.
//!
//! Plain serializable structs handed to Tera. Building them is kept apart
//! from rendering so the link and selection logic can be tested without
//! templates.

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::listing::pager::per_page_summary;
use crate::listing::sort::{css_classes, link_direction};
use crate::listing::sync::{OptionList, SelectOption};
use crate::listing::types::{FacetResultSet, FilterRequest, KEYWORDS_PARAM, ListingPage};
use crate::listing::Listing;

/// Path of a listing's page.
pub fn listing_path(listing_id: &str) -> String {
    format!("/listings/{listing_id}")
}

/// Ordered query parameters of the current request, used to build links
/// that change one parameter and keep the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        Self(
            query
                .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
                .unwrap_or_default(),
        )
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Copy with `key` set to `value`, replacing earlier occurrences.
    pub fn with(&self, key: &str, value: impl ToString) -> Self {
        let mut pairs: Vec<_> = self.0.iter().filter(|(k, _)| k != key).cloned().collect();
        pairs.push((key.to_string(), value.to_string()));
        Self(pairs)
    }

    /// Copy with every occurrence of `key` removed.
    pub fn without(&self, key: &str) -> Self {
        Self(self.0.iter().filter(|(k, _)| k != key).cloned().collect())
    }

    /// Link to `path` carrying these parameters.
    pub fn link(&self, path: &str) -> String {
        if self.0.is_empty() {
            return path.to_string();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish();
        format!("{path}?{query}")
    }
}

/// A column header.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderColumn {
    pub name: String,
    pub title: String,
    pub sortable: bool,
    pub sort_link: Option<String>,
    pub sort_class: String,
}

/// One result row.
#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
    pub link: String,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCell {
    pub name: String,
    pub value: String,
}

/// One entry of the page-size selector.
#[derive(Debug, Clone, Serialize)]
pub struct PerPageLink {
    pub num: u32,
    pub link: String,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagerView {
    pub page_start: u64,
    pub page_length: u64,
    pub total_size: u64,
    pub current_page: u64,
    pub total_pages: u64,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
}

/// Hidden fields carried through filter submissions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HiddenFields {
    pub sort: String,
    pub dir: String,
    pub perpage: String,
}

/// One facet select.
#[derive(Debug, Clone, Serialize)]
pub struct FacetSelect {
    pub identifier: String,
    pub title: String,
    pub options: Vec<SelectOption>,
    pub selected: String,
    /// Full original option list as JSON, for client-side resets.
    pub original_json: String,
}

/// The facet and keyword controls of the filter form.
#[derive(Debug, Clone, Serialize)]
pub struct FilterControls {
    pub listing_id: String,
    /// Present only when the listing offers keyword search.
    pub keywords: Option<String>,
    pub keywords_param: &'static str,
    pub facets: Vec<FacetSelect>,
}

impl FilterControls {
    /// Controls for an unfiltered request: full option lists, nothing selected.
    pub fn initial(listing: &Listing, originals: &FacetResultSet) -> serde_json::Result<Self> {
        Self::build(listing, originals, None)
    }

    /// Controls narrowed to the current filter state with selections kept.
    pub fn filtered(
        listing: &Listing,
        originals: &FacetResultSet,
        request: &FilterRequest,
        current: &FacetResultSet,
    ) -> serde_json::Result<Self> {
        Self::build(listing, originals, Some((request, current)))
    }

    fn build(
        listing: &Listing,
        originals: &FacetResultSet,
        state: Option<(&FilterRequest, &FacetResultSet)>,
    ) -> serde_json::Result<Self> {
        let mut facets = Vec::with_capacity(listing.facets.len());

        for facet in &listing.facets {
            let mut list = originals
                .get(&facet.name)
                .map(OptionList::from_facet)
                .unwrap_or_else(|| OptionList::new(Vec::new()));

            if let Some((request, current)) = state {
                list.select(request.facet_value(&facet.identifier));
                match current.get(&facet.name) {
                    Some(narrowed) => list.apply_facet(narrowed),
                    None => list.apply(&Default::default()),
                }
            }

            facets.push(FacetSelect {
                identifier: facet.identifier.clone(),
                title: facet.title.clone(),
                original_json: serde_json::to_string(list.original())?,
                selected: list.selected().unwrap_or_default().to_string(),
                options: list.options().to_vec(),
            });
        }

        let keywords = listing.has_fulltext().then(|| {
            state
                .and_then(|(request, _)| request.keywords())
                .unwrap_or_default()
                .to_string()
        });

        Ok(Self {
            listing_id: listing.id.clone(),
            keywords,
            keywords_param: KEYWORDS_PARAM,
            facets,
        })
    }
}

/// Everything the listing page template needs.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub listing_id: String,
    pub title: String,
    pub singular_name: String,
    pub action: String,
    pub facets_link: String,
    pub filter_controls: String,
    pub hidden: HiddenFields,
    pub header: Vec<HeaderColumn>,
    pub rows: Vec<TableRow>,
    pub per_page: Vec<PerPageLink>,
    pub pager: PagerView,
    /// Facet payload for an already-filtered page.
    pub facets_json: Option<String>,
}

impl ListingView {
    pub fn build(
        listing: &Listing,
        page: &ListingPage,
        request: &FilterRequest,
        params: &QueryParams,
        filter_controls: String,
        facets_json: Option<String>,
    ) -> Self {
        let path = listing_path(&listing.id);

        let header = listing
            .columns
            .iter()
            .map(|column| {
                let name = column.name();
                let sortable = listing.sortable_fields.contains(name);
                let sort_link = sortable.then(|| {
                    let direction = link_direction(&page.sort, name);
                    params
                        .with("sort", name)
                        .with("dir", direction.as_str())
                        .link(&path)
                });
                HeaderColumn {
                    name: name.to_string(),
                    title: column.title.clone(),
                    sortable,
                    sort_link,
                    sort_class: css_classes(&page.sort, name, sortable),
                }
            })
            .collect();

        let rows = page
            .rows
            .iter()
            .map(|row| {
                let id = row.get(&listing.id_column).map(display_value).unwrap_or_default();
                TableRow {
                    link: format!("{path}/{id}"),
                    cells: listing
                        .columns
                        .iter()
                        .map(|column| TableCell {
                            name: column.name().to_string(),
                            value: row.get(column.name()).map(display_value).unwrap_or_default(),
                        })
                        .collect(),
                }
            })
            .collect();

        let current_size = u32::try_from(page.pager.page_length).unwrap_or(listing.default_page_size);
        let per_page = per_page_summary(&listing.allowed_page_sizes, current_size)
            .into_iter()
            .map(|option| PerPageLink {
                num: option.num,
                link: params.with("perpage", option.num).link(&path),
                current: option.current,
            })
            .collect();

        let pager = &page.pager;
        let pager = PagerView {
            page_start: pager.page_start,
            page_length: pager.page_length,
            total_size: pager.total_size,
            current_page: pager.current_page(),
            total_pages: pager.total_pages(),
            prev_link: pager
                .prev_start()
                .map(|start| params.with("start", start).link(&path)),
            next_link: pager
                .next_start()
                .map(|start| params.with("start", start).link(&path)),
        };

        Self {
            listing_id: listing.id.clone(),
            title: listing.title.clone(),
            singular_name: listing.singular_name.clone(),
            facets_link: format!("{path}/facets"),
            action: path,
            filter_controls,
            hidden: HiddenFields {
                sort: request.sort.clone().unwrap_or_default(),
                dir: request.direction.clone().unwrap_or_default(),
                perpage: request.page_size.clone().unwrap_or_default(),
            },
            header,
            rows,
            per_page,
            pager,
            facets_json,
        }
    }
}

/// One labelled value on the item page.
#[derive(Debug, Clone, Serialize)]
pub struct ItemField {
    pub title: String,
    pub value: String,
}

/// Everything the item template needs.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub title: String,
    pub singular_name: String,
    pub listing_title: String,
    pub listing_link: String,
    pub fields: Vec<ItemField>,
}

impl ItemView {
    pub fn build(listing: &Listing, item: &Value) -> Self {
        let title = item
            .get(&listing.title_field)
            .map(display_value)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| listing.singular_name.clone());

        Self {
            title,
            singular_name: listing.singular_name.clone(),
            listing_title: listing.title.clone(),
            listing_link: listing_path(&listing.id),
            fields: listing
                .columns
                .iter()
                .map(|column| ItemField {
                    title: column.title.clone(),
                    value: item.get(column.name()).map(display_value).unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Text shown for a cell value.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        other => other.to_string(),
    }
}
