use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized page/page-size pair taken from query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Page numbers start at 1; page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn total_pages(&self, total_items: i64) -> u32 {
        if total_items <= 0 {
            return 0;
        }
        ((total_items + self.page_size as i64 - 1) / self.page_size as i64) as u32
    }
}

/// One page of results plus the counters the frontend paginates with.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_items: i64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total_items: i64, page: PageRequest) -> Self {
        Self {
            items,
            total_items,
            current_page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages(total_items),
        }
    }
}

/// Turn a free-text search term into an `ILIKE` pattern matching it anywhere,
/// with the LIKE wildcards in the term escaped.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
