//! Pagination resolution and pager metadata.

use serde::{Deserialize, Serialize};

/// Resolve the requested page size against the allow-list.
///
/// The raw value must spell one of the allowed sizes exactly; anything else
/// (non-numeric, zero, padded, not listed) yields `default`.
pub fn resolve_page_size(requested: Option<&str>, allowed: &[u32], default: u32) -> u32 {
    requested
        .and_then(|raw| {
            allowed
                .iter()
                .copied()
                .find(|size| *size > 0 && raw == size.to_string())
        })
        .unwrap_or(default)
}

/// Resolve the requested offset. Only a plain run of ASCII digits is
/// accepted; everything else, including values that overflow, is `0`.
pub fn resolve_offset(requested: Option<&str>) -> u64 {
    match requested {
        Some(raw) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => {
            raw.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Paging metadata for a result page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    /// Offset of the first row on this page.
    pub page_start: u64,
    /// Page size.
    pub page_length: u64,
    /// Rows matching the filters across all pages.
    pub total_size: u64,
}

impl Pager {
    pub fn new(page_start: u64, page_length: u64, total_size: u64) -> Self {
        Self {
            page_start,
            page_length,
            total_size,
        }
    }

    /// One-based page number. Offsets that fall between page boundaries
    /// count as the page they start in.
    pub fn current_page(&self) -> u64 {
        if self.page_length == 0 {
            return 1;
        }
        self.page_start / self.page_length + 1
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_length == 0 {
            return 1;
        }
        self.total_size.div_ceil(self.page_length).max(1)
    }

    /// Offset of the previous page, if this is not the first.
    pub fn prev_start(&self) -> Option<u64> {
        (self.page_start > 0).then(|| self.page_start.saturating_sub(self.page_length))
    }

    /// Offset of the next page, if any rows remain.
    pub fn next_start(&self) -> Option<u64> {
        let next = self.page_start.saturating_add(self.page_length);
        (self.page_length > 0 && next < self.total_size).then_some(next)
    }

    /// Whether the offset points past the last row.
    pub fn is_past_end(&self) -> bool {
        self.page_start > 0 && self.page_start >= self.total_size
    }
}

/// One entry of the page-size selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerPageOption {
    pub num: u32,
    pub current: bool,
}

/// Page-size selector entries in configured order.
pub fn per_page_summary(allowed: &[u32], current: u32) -> Vec<PerPageOption> {
    allowed
        .iter()
        .map(|num| PerPageOption {
            num: *num,
            current: *num == current,
        })
        .collect()
}
