//! Search cursors: stable current/next/previous paging.
//!
//! A cursor holds just enough state (filter, page size, page index) to
//! recompute any page deterministically; the count and select are re-run
//! against the transaction on every page call, so results always reflect
//! committed data. Page indices are 1-based and clamped: stepping past
//! either end returns the boundary page unchanged rather than an error.

use std::collections::HashMap;

use eigion_proto::model::{AuditFilter, Page};

use crate::store::{GroupRequestFilter, GroupSearchFilter};

/// The direction of one page call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    /// Recompute the current page.
    Current,
    /// Advance one page, clamped at the last page.
    Next,
    /// Go back one page, clamped at the first page.
    Previous,
}

/// The search kinds a session may have a cursor for, at most one each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    /// Group search by name.
    GroupsByName,
    /// The caller's group creation requests.
    GroupRequests,
    /// The audit log.
    Audit,
}

/// The offsets and metadata for one page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    /// Row offset of the first item.
    pub offset: u64,
    /// Maximum number of items.
    pub limit: u32,
    /// The 1-based page index after clamping.
    pub page_index: u64,
    /// The total number of pages.
    pub page_count: u64,
    /// The total number of matching items.
    pub total_count: u64,
}

impl PagePlan {
    /// Assemble a page from fetched items.
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            page_index: self.page_index,
            page_count: self.page_count,
            total_count: self.total_count,
        }
    }
}

/// A cursor over one filtered search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCursor<F> {
    /// The filter fixed at search begin.
    pub filter: F,
    page_size: u32,
    page_index: u64,
}

impl<F> SearchCursor<F> {
    /// Open a cursor at the first page.
    ///
    /// `page_size` has already been range-validated by the codec.
    pub fn new(filter: F, page_size: u32) -> Self {
        Self { filter, page_size: page_size.max(1), page_index: 1 }
    }

    /// The current 1-based page index.
    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    /// Step the cursor and compute the fetch plan for the resulting page.
    ///
    /// `total_count` is the fresh count for the cursor's filter. The index
    /// is clamped to `1..=max(1, page_count)`, which makes `next` at the
    /// last page and `previous` at the first page no-ops.
    pub fn step(&mut self, nav: PageNav, total_count: u64) -> PagePlan {
        let page_count = total_count.div_ceil(u64::from(self.page_size));
        let proposed = match nav {
            PageNav::Current => self.page_index,
            PageNav::Next => self.page_index.saturating_add(1),
            PageNav::Previous => self.page_index.saturating_sub(1),
        };
        self.page_index = proposed.clamp(1, page_count.max(1));
        PagePlan {
            offset: (self.page_index - 1) * u64::from(self.page_size),
            limit: self.page_size,
            page_index: self.page_index,
            page_count,
            total_count,
        }
    }
}

/// The cursor stored on a session, tagged by search kind.
#[derive(Debug, Clone)]
pub enum SessionCursor {
    /// A group-by-name search.
    GroupsByName(SearchCursor<GroupSearchFilter>),
    /// A group-creation-request search.
    GroupRequests(SearchCursor<GroupRequestFilter>),
    /// An audit search.
    Audit(SearchCursor<AuditFilter>),
}

/// The per-session cursor table: at most one live cursor per kind.
pub type CursorMap = HashMap<SearchKind, SessionCursor>;

#[cfg(test)]
mod tests {
    use proptest::prelude::{any, prop, proptest};

    use super::*;

    fn cursor(page_size: u32) -> SearchCursor<()> {
        SearchCursor::new((), page_size)
    }

    #[test]
    fn begin_lands_on_first_page() {
        let mut c = cursor(2);
        let plan = c.step(PageNav::Current, 3);
        assert_eq!(plan.page_index, 1);
        assert_eq!(plan.page_count, 2);
        assert_eq!(plan.offset, 0);
        assert_eq!(plan.limit, 2);
        assert_eq!(plan.total_count, 3);
    }

    #[test]
    fn next_at_last_page_is_a_no_op() {
        let mut c = cursor(2);
        c.step(PageNav::Current, 3);
        c.step(PageNav::Next, 3);
        assert_eq!(c.page_index(), 2);
        let plan = c.step(PageNav::Next, 3);
        assert_eq!(plan.page_index, 2);
        assert_eq!(plan.offset, 2);
    }

    #[test]
    fn previous_at_first_page_is_a_no_op() {
        let mut c = cursor(2);
        c.step(PageNav::Current, 3);
        let plan = c.step(PageNav::Previous, 3);
        assert_eq!(plan.page_index, 1);
        assert_eq!(plan.offset, 0);
    }

    #[test]
    fn next_then_previous_returns_to_interior_page() {
        let mut c = cursor(10);
        c.step(PageNav::Current, 100);
        c.step(PageNav::Next, 100);
        c.step(PageNav::Next, 100);
        assert_eq!(c.page_index(), 3);
        c.step(PageNav::Next, 100);
        let plan = c.step(PageNav::Previous, 100);
        assert_eq!(plan.page_index, 3);
        assert_eq!(plan.offset, 20);
    }

    #[test]
    fn empty_result_set_has_zero_pages_but_index_one() {
        let mut c = cursor(5);
        let plan = c.step(PageNav::Current, 0);
        assert_eq!(plan.page_index, 1);
        assert_eq!(plan.page_count, 0);
        assert_eq!(plan.offset, 0);
    }

    #[test]
    fn shrinking_results_clamp_the_index_down() {
        let mut c = cursor(2);
        c.step(PageNav::Current, 10);
        c.step(PageNav::Next, 10);
        c.step(PageNav::Next, 10);
        assert_eq!(c.page_index(), 3);
        // Rows were deleted between calls; the cursor clamps to the new end.
        let plan = c.step(PageNav::Current, 3);
        assert_eq!(plan.page_index, 2);
        assert_eq!(plan.page_count, 2);
    }

    proptest! {
        #[test]
        fn index_stays_in_bounds_under_any_navigation(
            page_size in 1u32..=1000,
            total in any::<u16>(),
            navs in prop::collection::vec(0u8..3, 0..32),
        ) {
            let mut c = cursor(page_size);
            for nav in navs {
                let nav = match nav {
                    0 => PageNav::Current,
                    1 => PageNav::Next,
                    _ => PageNav::Previous,
                };
                let plan = c.step(nav, u64::from(total));
                assert!(plan.page_index >= 1);
                assert!(plan.page_index <= plan.page_count.max(1));
                assert_eq!(plan.offset, (plan.page_index - 1) * u64::from(page_size));
            }
        }
    }
}
