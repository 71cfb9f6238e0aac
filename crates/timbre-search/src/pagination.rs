//! Page normalization for recommendation queries.

/// Smallest page size a caller can ask for.
pub const MIN_PAGE_SIZE: usize = 10;

/// Largest page size a caller can ask for.
pub const MAX_PAGE_SIZE: usize = 100;

/// A normalized page request.
///
/// Pages are 1-based. Requests for a page below 1 are treated as page 1 and
/// the page size is clamped to [`MIN_PAGE_SIZE`]..=[`MAX_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    #[must_use]
    pub fn normalize(page: i64, page_size: i64) -> Self {
        let page = usize::try_from(page.max(1)).unwrap_or(usize::MAX);
        let page_size = usize::try_from(page_size.clamp(MIN_PAGE_SIZE as i64, MAX_PAGE_SIZE as i64))
            .unwrap_or(MIN_PAGE_SIZE);
        Self { page, page_size }
    }

    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Index of the first result on this page.
    #[must_use]
    pub const fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_below_one_becomes_first_page() {
        assert_eq!(PageRequest::normalize(0, 20).page(), 1);
        assert_eq!(PageRequest::normalize(-5, 20).page(), 1);
        assert_eq!(PageRequest::normalize(0, 20).offset(), 0);
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(PageRequest::normalize(1, 2).page_size(), MIN_PAGE_SIZE);
        assert_eq!(PageRequest::normalize(1, -1).page_size(), MIN_PAGE_SIZE);
        assert_eq!(PageRequest::normalize(1, 1000).page_size(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::normalize(1, 25).page_size(), 25);
    }

    #[test]
    fn test_offset() {
        let request = PageRequest::normalize(3, 10);
        assert_eq!(request.offset(), 20);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let request = PageRequest::normalize(i64::MAX, 100);
        assert!(request.offset() > 0);
    }
}
