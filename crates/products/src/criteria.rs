//! Search criteria: optional filters, paging, and sort order.

use rust_decimal::Decimal;
use serde::Serialize;

use stockroom_core::{DomainError, DomainResult};

/// Columns a search may sort by.
///
/// Tokens use the caller-facing camelCase property names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Name,
    Sku,
    Price,
    Stock,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification: field + direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    /// Creation time, newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    /// Parse a `field,direction` token (e.g. `price,asc`).
    ///
    /// A blank token yields the default sort. An unknown field is rejected.
    /// Only an exact case-insensitive `asc` selects ascending; any other
    /// direction token, or none, means descending.
    pub fn parse(token: &str) -> DomainResult<Self> {
        if token.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut parts = token.splitn(2, ',');
        let field_token = parts.next().unwrap_or("").trim();
        let field = match field_token {
            f if f.eq_ignore_ascii_case("createdAt") => SortField::CreatedAt,
            f if f.eq_ignore_ascii_case("updatedAt") => SortField::UpdatedAt,
            f if f.eq_ignore_ascii_case("name") => SortField::Name,
            f if f.eq_ignore_ascii_case("sku") => SortField::Sku,
            f if f.eq_ignore_ascii_case("price") => SortField::Price,
            f if f.eq_ignore_ascii_case("stock") => SortField::Stock,
            other => {
                return Err(DomainError::validation(format!(
                    "unknown sort field: {other}"
                )));
            }
        };

        let direction = match parts.next() {
            Some(d) if d.trim().eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };

        Ok(Self { field, direction })
    }
}

/// Immutable search criteria, constructed per-query.
///
/// Blank category/text filters normalize to `None` at construction, so stores
/// only ever see predicates worth applying. Absent filters match everything
/// (subject to deletion visibility); present filters combine with AND.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCriteria {
    page: u32,
    size: u32,
    sort: SortSpec,
    category: Option<String>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    text: Option<String>,
    include_deleted: bool,
}

impl SearchCriteria {
    /// Criteria matching every active product, default sort.
    ///
    /// `page` is 0-based; `size` must be positive.
    pub fn new(page: u32, size: u32) -> DomainResult<Self> {
        if size == 0 {
            return Err(DomainError::validation("page size must be > 0"));
        }
        Ok(Self {
            page,
            size,
            sort: SortSpec::default(),
            category: None,
            min_price: None,
            max_price: None,
            text: None,
            include_deleted: false,
        })
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    /// Case-insensitive category equality filter; blank input clears it.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(category.into());
        self
    }

    pub fn with_min_price(mut self, min_price: Decimal) -> Self {
        self.min_price = Some(min_price);
        self
    }

    pub fn with_max_price(mut self, max_price: Decimal) -> Self {
        self.max_price = Some(max_price);
        self
    }

    /// Case-insensitive substring filter over name and description; blank
    /// input clears it.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = non_blank(text.into());
        self
    }

    pub fn with_include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn min_price(&self) -> Option<Decimal> {
        self.min_price
    }

    pub fn max_price(&self) -> Option<Decimal> {
        self.max_price
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn include_deleted(&self) -> bool {
        self.include_deleted
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
