use serde::{Deserialize, Serialize};

/// Position in a paginated listing. Pages are 1-indexed; `{0, 0}` means
/// nothing has been loaded yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub current: u32,
    pub total: u32,
}

impl PageCursor {
    pub fn new(current: u32, total: u32) -> Self {
        Self { current, total }
    }

    pub fn has_more(&self) -> bool {
        self.current < self.total
    }

    pub fn next(&self) -> u32 {
        self.current + 1
    }

    pub fn is_empty(&self) -> bool {
        self.current == 0
    }
}

/// A page handed out by the store, tagged with the generation of the state
/// it was claimed from. Results carry it back so that a response to a
/// request made before a reset is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub page: u32,
    pub generation: u64,
}

/// A list fed page by page, with the single-flight flag that keeps two
/// fetches of the next page from running at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: PageCursor,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: PageCursor::default(),
            is_loading: false,
            error: None,
        }
    }
}

impl<T> Paginated<T> {
    /// Claim the next page. Returns the page number to fetch, or `None`
    /// when a fetch is already running, the last page has been reached or
    /// a previous fetch failed.
    pub fn begin(&mut self) -> Option<u32> {
        if self.is_loading || self.error.is_some() {
            return None;
        }
        if !self.page.is_empty() && !self.page.has_more() {
            return None;
        }
        self.is_loading = true;
        Some(self.page.next())
    }

    /// Store a fetched page. Page 1 replaces the list, the page right after
    /// the current one is appended. Anything else is stale and dropped
    /// without touching the in-flight claim; returns whether the page was
    /// taken.
    pub fn accept(&mut self, page: PageCursor, items: Vec<T>) -> bool {
        if page.current == 1 {
            self.items = items;
        } else if page.current == self.page.next() {
            self.items.extend(items);
        } else {
            return false;
        }
        self.page = page;
        self.is_loading = false;
        self.error = None;
        true
    }

    pub fn fail(&mut self, error: String) {
        self.is_loading = false;
        self.error = Some(error);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_single_flight() {
        let mut list: Paginated<u8> = Paginated::default();
        assert_eq!(list.begin(), Some(1));
        assert_eq!(list.begin(), None);
        assert!(list.accept(PageCursor::new(1, 2), vec![1, 2]));
        assert_eq!(list.begin(), Some(2));
        assert!(list.accept(PageCursor::new(2, 2), vec![3]));
        assert_eq!(list.items, vec![1, 2, 3]);
        // last page reached
        assert_eq!(list.begin(), None);
    }

    #[test]
    fn stale_page_is_dropped() {
        let mut list: Paginated<u8> = Paginated::default();
        list.accept(PageCursor::new(1, 5), vec![1]);
        list.accept(PageCursor::new(2, 5), vec![2]);
        assert!(!list.accept(PageCursor::new(2, 5), vec![9]));
        assert!(!list.accept(PageCursor::new(4, 5), vec![9]));
        assert_eq!(list.items, vec![1, 2]);
        assert_eq!(list.page.current, 2);
    }

    #[test]
    fn stale_page_keeps_the_running_claim() {
        let mut list: Paginated<u8> = Paginated::default();
        list.accept(PageCursor::new(1, 3), vec![1]);
        list.accept(PageCursor::new(2, 3), vec![2]);
        assert_eq!(list.begin(), Some(3));
        assert!(!list.accept(PageCursor::new(2, 3), vec![9]));
        assert!(list.is_loading);
        assert_eq!(list.begin(), None);
        assert!(list.accept(PageCursor::new(3, 3), vec![3]));
        assert!(!list.is_loading);
    }

    #[test]
    fn failure_closes_the_gate() {
        let mut list: Paginated<u8> = Paginated::default();
        list.accept(PageCursor::new(1, 3), vec![1]);
        assert_eq!(list.begin(), Some(2));
        list.fail("boom".into());
        assert!(!list.is_loading);
        assert_eq!(list.begin(), None);
    }
}
