//! Page request validation.
//!
//! # Invariants
//! - `page_number >= 1` and `page_size >= 1`; nothing is clamped.
//! - `offset = (page_number - 1) * page_size`, `limit = page_size`.

use crate::error::{RepoError, RepoResult};
use crate::spec::sort::{SortBy, SortKey, SortOrder};
use log::debug;

/// Validated `(offset, limit)` pair derived from a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingWindow {
    offset: i64,
    limit: i64,
}

impl PagingWindow {
    /// Translates a 1-based page number and page size into a window.
    ///
    /// # Errors
    /// - `ArgumentRange` when either argument is `<= 0` or the offset
    ///   overflows.
    pub fn from_page(page_number: i64, page_size: i64) -> RepoResult<Self> {
        if page_number <= 0 {
            return Err(RepoError::ArgumentRange {
                argument: "page_number",
                value: page_number,
                reason: "must be greater than 0",
            });
        }
        if page_size <= 0 {
            return Err(RepoError::ArgumentRange {
                argument: "page_size",
                value: page_size,
                reason: "must be greater than 0",
            });
        }

        let offset = (page_number - 1)
            .checked_mul(page_size)
            .ok_or(RepoError::ArgumentRange {
                argument: "page_number",
                value: page_number,
                reason: "page offset overflows",
            })?;

        Ok(Self {
            offset,
            limit: page_size,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Applies this window to an in-memory sequence.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(take).collect()
    }
}

/// Paged query options.
///
/// `sort_order` only takes effect together with `sort_key`; an order without
/// a key pages in the backend's default order.
#[derive(Debug, Clone)]
pub struct PageQuery<T> {
    pub page_number: i64,
    pub page_size: i64,
    pub sort_key: Option<SortKey<T>>,
    pub sort_order: SortOrder,
}

impl<T> PageQuery<T> {
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number,
            page_size,
            sort_key: None,
            sort_order: SortOrder::default(),
        }
    }

    pub fn sorted_by(mut self, key: SortKey<T>, order: SortOrder) -> Self {
        self.sort_key = Some(key);
        self.sort_order = order;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    /// Validates paging and resolves the effective ordering.
    pub fn resolve(&self) -> RepoResult<(PagingWindow, Option<SortBy<'_, T>>)> {
        let window = PagingWindow::from_page(self.page_number, self.page_size)?;
        let sort = match &self.sort_key {
            Some(key) => Some(SortBy {
                key,
                order: self.sort_order,
            }),
            None => {
                if self.sort_order != SortOrder::default() {
                    debug!(
                        "event=sort_order_ignored module=repo status=ok order={:?}",
                        self.sort_order
                    );
                }
                None
            }
        };
        Ok((window, sort))
    }
}

#[cfg(test)]
mod tests {
    use super::{PageQuery, PagingWindow};
    use crate::error::RepoError;
    use crate::spec::sort::SortOrder;

    #[test]
    fn window_translates_one_based_pages() {
        let first = PagingWindow::from_page(1, 3).unwrap();
        assert_eq!((first.offset(), first.limit()), (0, 3));

        let third = PagingWindow::from_page(3, 3).unwrap();
        assert_eq!((third.offset(), third.limit()), (6, 3));
    }

    #[test]
    fn window_rejects_non_positive_arguments() {
        for (page_number, page_size, argument) in [
            (0, 3, "page_number"),
            (-1, 3, "page_number"),
            (1, 0, "page_size"),
            (1, -5, "page_size"),
        ] {
            let err = PagingWindow::from_page(page_number, page_size).unwrap_err();
            assert!(
                matches!(err, RepoError::ArgumentRange { argument: actual, .. } if actual == argument)
            );
        }
    }

    #[test]
    fn window_rejects_offset_overflow() {
        let err = PagingWindow::from_page(i64::MAX, 2).unwrap_err();
        assert!(err.is_argument_range());
    }

    #[test]
    fn slice_skips_and_takes() {
        let window = PagingWindow::from_page(3, 3).unwrap();
        assert_eq!(window.slice((1..=7).collect::<Vec<_>>()), vec![7]);
    }

    #[test]
    fn order_without_key_resolves_to_no_sort() {
        let query = PageQuery::<()>::new(1, 3).with_order(SortOrder::Descending);
        let (_, sort) = query.resolve().unwrap();
        assert!(sort.is_none());
    }
}
