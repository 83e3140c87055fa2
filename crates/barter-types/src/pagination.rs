//! Page-number pagination with forgiving page parsing.

use std::num::IntErrorKind;

pub const PAGE_SIZE: u32 = 10;

/// A resolved page: always within `1..=num_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total: u64,
}

impl PageWindow {
    /// Resolve a raw `page` parameter against a result count.
    ///
    /// Missing or non-integer input yields the first page. Any integer
    /// outside `1..=num_pages`, including zero, negatives, and values too
    /// large to represent, yields the last page. An empty result set still
    /// has one page.
    pub fn resolve(raw: Option<&str>, total: u64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(u64::from(per_page)).max(1);
        let num_pages = u32::try_from(num_pages).unwrap_or(u32::MAX);

        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None => 1,
            Some(Ok(n)) if (1..=i64::from(num_pages)).contains(&n) => n as u32,
            Some(Ok(_)) => num_pages,
            Some(Err(e)) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                num_pages
            }
            Some(Err(_)) => 1,
        };

        Self {
            number,
            num_pages,
            per_page,
            total,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_of_fifteen() {
        let w = PageWindow::resolve(Some("2"), 15, PAGE_SIZE);
        assert_eq!(w.number, 2);
        assert_eq!(w.num_pages, 2);
        assert_eq!(w.offset(), 10);
        assert!(!w.has_next());
        assert!(w.has_previous());
    }

    #[test]
    fn non_integer_page_falls_back_to_first() {
        for raw in [None, Some("abc"), Some(""), Some("2.5"), Some("1e3")] {
            assert_eq!(PageWindow::resolve(raw, 42, PAGE_SIZE).number, 1, "{raw:?}");
        }
    }

    #[test]
    fn out_of_range_integer_goes_to_last_page() {
        for raw in ["0", "-3", "99999999999", "-99999999999999999999", "99999999999999999999"] {
            assert_eq!(PageWindow::resolve(Some(raw), 25, PAGE_SIZE).number, 3, "{raw}");
        }
    }

    #[test]
    fn padded_page_number_is_accepted() {
        assert_eq!(PageWindow::resolve(Some(" 2 "), 25, PAGE_SIZE).number, 2);
    }

    #[test]
    fn page_past_the_end_is_clamped() {
        let w = PageWindow::resolve(Some("99"), 25, PAGE_SIZE);
        assert_eq!(w.number, 3);
        assert_eq!(w.offset(), 20);
    }

    #[test]
    fn empty_result_has_one_page() {
        let w = PageWindow::resolve(Some("5"), 0, PAGE_SIZE);
        assert_eq!(w.number, 1);
        assert_eq!(w.num_pages, 1);
        assert!(!w.has_next());
        assert!(!w.has_previous());
    }
}
