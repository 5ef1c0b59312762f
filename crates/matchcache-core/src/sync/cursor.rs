/// Pagination and fetch-state for one process lifetime.
///
/// `page` only advances after a successful non-empty page; `has_more` drops
/// to false on the first empty page and never comes back; `is_fetching`
/// guards against issuing a second fetch while one is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    page: u32,
    has_more: bool,
    is_fetching: bool,
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self {
            page: 1,
            has_more: true,
            is_fetching: false,
        }
    }
}

impl SyncCursor {
    /// Next page to request (1-based).
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    /// Whether a new fetch may be issued.
    pub fn can_fetch(&self) -> bool {
        !self.is_fetching && self.has_more
    }

    pub(crate) fn begin_fetch(&mut self) {
        self.is_fetching = true;
    }

    /// A non-empty page was merged.
    pub(crate) fn advance(&mut self) {
        self.page += 1;
        self.is_fetching = false;
    }

    /// An empty page came back: pagination is over.
    pub(crate) fn exhaust(&mut self) {
        self.has_more = false;
        self.is_fetching = false;
    }

    /// The fetch failed; stay on the same page.
    pub(crate) fn abort(&mut self) {
        self.is_fetching = false;
    }
}
