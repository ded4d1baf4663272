use crate::prelude::*;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 500;

/// `max(1, ceil(total / page_size))`. A zero page size counts as one page.
pub fn compute_total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(u64::from(page_size)).max(1)
}

/// Page cursor for a server-paginated listing. `total` is whatever the
/// server last reported; the client never guesses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    page_size: u32,
    total: u64,
}

impl Pagination {
    pub fn new(page_size: u32) -> Result<Self> {
        validate_page_size(page_size)?;
        Ok(Self {
            page: 1,
            page_size,
            total: 0,
        })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_pages(&self) -> u64 {
        compute_total_pages(self.total, self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn can_prev(&self) -> bool {
        self.page > 1
    }

    pub fn can_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Moves by `delta` pages. Out-of-range moves leave the page untouched
    /// and return `false`.
    pub fn advance(&mut self, delta: i64) -> bool {
        let Some(target) = self.page.checked_add_signed(delta) else {
            return false;
        };
        if target < 1 || target > self.total_pages() {
            return false;
        }
        self.page = target;
        true
    }

    pub fn next(&mut self) -> bool {
        self.advance(1)
    }

    pub fn prev(&mut self) -> bool {
        self.advance(-1)
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<()> {
        validate_page_size(page_size)?;
        self.page_size = page_size;
        self.page = 1;
        Ok(())
    }

    /// Adopts the server's view of the listing. A zero `page_size` in the
    /// response keeps the current one. Returns `true` when the page had to
    /// be clamped back into range.
    pub fn sync_from_server(&mut self, page: u64, page_size: u32, total: u64) -> bool {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self.total = total;
        self.page = page.max(1);
        self.clamp()
    }

    /// Brings `page` back into `1..=total_pages`. Returns `true` if it moved.
    pub fn clamp(&mut self) -> bool {
        let clamped = self.page.clamp(1, self.total_pages());
        let moved = clamped != self.page;
        self.page = clamped;
        moved
    }

    pub fn page_label(&self) -> String {
        format!("Page {} / {}", self.page, self.total_pages())
    }

    pub fn range_label(&self) -> String {
        if self.total == 0 {
            return "No rows".to_string();
        }
        let size = u64::from(self.page_size);
        let first = (self.page - 1) * size + 1;
        let last = (self.page * size).min(self.total);
        format!("Showing {first}–{last} of {}", self.total)
    }
}

fn validate_page_size(page_size: u32) -> Result<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(QuarryError::invalid_input(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(page: u64, page_size: u32, total: u64) -> Pagination {
        let mut pagination = Pagination::new(page_size).unwrap();
        pagination.sync_from_server(page, page_size, total);
        pagination
    }

    #[test]
    fn total_pages_matches_ceiling_with_floor_of_one() {
        for page_size in 1..=7u32 {
            for total in 0..=50u64 {
                let expected = ((total as f64) / (page_size as f64)).ceil().max(1.0) as u64;
                assert_eq!(
                    compute_total_pages(total, page_size),
                    expected,
                    "total={total} page_size={page_size}"
                );
            }
        }
    }

    #[test]
    fn empty_listing_has_one_page_and_no_navigation() {
        let mut pagination = synced(1, 25, 0);
        assert_eq!(pagination.total_pages(), 1);
        assert!(!pagination.can_prev());
        assert!(!pagination.can_next());
        assert!(!pagination.next());
        assert!(!pagination.prev());
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.range_label(), "No rows");
    }

    #[test]
    fn next_on_last_page_is_noop() {
        let mut pagination = synced(3, 10, 30);
        assert!(!pagination.can_next());
        assert!(!pagination.next());
        assert_eq!(pagination.page(), 3);
    }

    #[test]
    fn prev_on_first_page_is_noop() {
        let mut pagination = synced(1, 10, 30);
        assert!(!pagination.prev());
        assert_eq!(pagination.page(), 1);
        assert!(pagination.next());
        assert_eq!(pagination.page(), 2);
    }

    #[test]
    fn advance_rejects_jumps_past_either_end() {
        let mut pagination = synced(2, 10, 45);
        assert!(!pagination.advance(4));
        assert!(!pagination.advance(-2));
        assert!(pagination.advance(3));
        assert_eq!(pagination.page(), 5);
    }

    #[test]
    fn server_response_is_authoritative() {
        let mut pagination = Pagination::new(25).unwrap();
        let clamped = pagination.sync_from_server(1, 50, 120);
        assert!(!clamped);
        assert_eq!(pagination.page_size(), 50);
        assert_eq!(pagination.total(), 120);
        assert_eq!(pagination.total_pages(), 3);
    }

    #[test]
    fn sync_clamps_page_beyond_shrunken_total() {
        let mut pagination = Pagination::new(10).unwrap();
        assert!(pagination.sync_from_server(7, 10, 12));
        assert_eq!(pagination.page(), 2);
    }

    #[test]
    fn zero_page_size_from_server_keeps_previous() {
        let mut pagination = Pagination::new(20).unwrap();
        pagination.sync_from_server(1, 0, 5);
        assert_eq!(pagination.page_size(), 20);
    }

    #[test]
    fn page_size_is_validated() {
        assert!(Pagination::new(0).is_err());
        assert!(Pagination::new(MAX_PAGE_SIZE + 1).is_err());
        let mut pagination = synced(3, 10, 100);
        pagination.set_page_size(50).unwrap();
        assert_eq!(pagination.page(), 1);
        assert!(pagination.set_page_size(0).is_err());
        assert_eq!(pagination.page_size(), 50);
    }

    #[test]
    fn range_label_covers_partial_last_page() {
        let pagination = synced(3, 10, 25);
        assert_eq!(pagination.range_label(), "Showing 21–25 of 25");
        assert_eq!(pagination.page_label(), "Page 3 / 3");
    }
}
