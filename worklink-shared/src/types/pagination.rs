use serde::{Deserialize, Serialize};

const MAX_PER_PAGE: u64 = 100;

/// 1-based page parameters as they arrive in a query string.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl PaginationParams {
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)) * self.limit()
    }

    pub fn limit(&self) -> u64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: default_per_page() }
    }
}

/// One page of results plus enough totals for the caller to page through.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let per_page = params.limit();
        let total_pages = total.div_ceil(per_page);
        Self {
            items,
            total,
            page: params.page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: u64, per_page: u64) -> PaginationParams {
        PaginationParams { page, per_page }
    }

    #[test]
    fn offset_is_zero_based_from_one_based_pages() {
        assert_eq!(params(1, 20).offset(), 0);
        assert_eq!(params(2, 20).offset(), 20);
        assert_eq!(params(3, 50).offset(), 100);
    }

    #[test]
    fn page_zero_clamps_to_first_page() {
        assert_eq!(params(0, 20).offset(), 0);
    }

    #[test]
    fn per_page_is_capped() {
        assert_eq!(params(1, 5000).limit(), 100);
        assert_eq!(params(1, 0).limit(), 1);
    }

    #[test]
    fn total_pages_arithmetic() {
        // 25 messages at 20 per page: page 1 holds 20, page 2 holds 5
        let page = Paginated::new(vec![0u8; 20], 25, &params(1, 20));
        assert_eq!(page.total_pages, 2);

        let empty = Paginated::<u8>::new(vec![], 0, &params(1, 20));
        assert_eq!(empty.total_pages, 0);

        let exact = Paginated::new(vec![0u8; 20], 40, &params(2, 20));
        assert_eq!(exact.total_pages, 2);
    }
}
