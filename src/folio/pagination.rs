//! Pagination state normalization for CMS listing pages.
//!
//! Listing handlers count the matches of the current filter first, then ask
//! [`normalize`] whether the requested `page`/`total` pair can be rendered as
//! is. An unknown page size or an out-of-range page is answered with a
//! redirect to the canonical URL. Canonical URLs always use the default page
//! size, which is the smallest allowed one, so a redirect target never
//! redirects again.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Page sizes a listing can be rendered with.
pub const PAGE_SIZES: [u32; 4] = [10, 20, 30, 50];

/// Page size used when none (or an invalid one) is requested.
pub const DEFAULT_PAGE_SIZE: u32 = PAGE_SIZES[0];

/// Raw listing query parameters as they arrive on the URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub q: Option<String>,
    pub page: Option<String>,
    pub total: Option<String>,
}

/// Parsed listing request.
///
/// `None` means "not supplied"; non-numeric and zero values are parsed as
/// `None` as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageRequest {
    #[must_use]
    pub fn from_params(query: Option<&str>, page: Option<&str>, total: Option<&str>) -> Self {
        Self {
            query: query.unwrap_or_default().to_string(),
            page: parse_non_zero(page),
            page_size: parse_non_zero(total),
        }
    }
}

impl From<PageQuery> for PageRequest {
    fn from(query: PageQuery) -> Self {
        Self::from_params(
            query.q.as_deref(),
            query.page.as_deref(),
            query.total.as_deref(),
        )
    }
}

fn parse_non_zero(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|parsed| *parsed != 0)
}

/// Canonical state of a listing page that can be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub query: String,
    pub page: u64,
    pub page_size: u32,
    pub total_matches: u64,
    pub page_count: u64,
    /// URL prefix templates append `page=N&total=M` to.
    pub pagination_url: String,
}

impl PageState {
    /// Filter to hand to the store; empty matches every record.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * u64::from(self.page_size)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn url_for(&self, page: u64) -> String {
        format!("{}page={page}&total={}", self.pagination_url, self.page_size)
    }
}

/// Outcome of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    Render(PageState),
    Redirect(String),
}

#[must_use]
pub fn is_allowed_page_size(page_size: i64) -> bool {
    PAGE_SIZES.iter().any(|allowed| i64::from(*allowed) == page_size)
}

#[must_use]
pub fn page_count(total_matches: u64, page_size: u32) -> u64 {
    total_matches.div_ceil(u64::from(page_size.max(1)))
}

/// Decide whether `request` can be rendered or must be redirected.
///
/// The page count is computed from the effective page size (the default when
/// the requested one is not allowed). Redirect targets keep the filter, clamp
/// the page into `[1, max(page_count, 1)]` and carry the default page size.
#[must_use]
pub fn normalize(base_path: &str, request: &PageRequest, total_matches: u64) -> Pagination {
    let size_allowed = request.page_size.map_or(true, is_allowed_page_size);
    let page_size = match request.page_size {
        Some(size) if size_allowed => u32::try_from(size).unwrap_or(DEFAULT_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    };

    let page_count = page_count(total_matches, page_size);
    let last_page = page_count.max(1);
    let requested_page = request.page.unwrap_or(1);
    let page = u64::try_from(requested_page)
        .ok()
        .filter(|page| (1..=last_page).contains(page));

    match page {
        Some(page) if size_allowed => Pagination::Render(PageState {
            query: request.query.clone(),
            page,
            page_size,
            total_matches,
            page_count,
            pagination_url: pagination_url(base_path, &request.query),
        }),
        _ => {
            let clamped = u64::try_from(requested_page)
                .map_or(1, |page| page.clamp(1, last_page));
            Pagination::Redirect(page_url(
                base_path,
                &request.query,
                clamped,
                DEFAULT_PAGE_SIZE,
            ))
        }
    }
}

/// URL of a listing page with the given filter, page and page size.
#[must_use]
pub fn page_url(base_path: &str, query: &str, page: u64, page_size: u32) -> String {
    format!(
        "{}page={page}&total={page_size}",
        pagination_url(base_path, query)
    )
}

fn pagination_url(base_path: &str, query: &str) -> String {
    if query.is_empty() {
        format!("{base_path}?")
    } else {
        let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        format!("{base_path}?q={encoded}&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/cms/projects";

    fn request(query: &str, page: Option<i64>, page_size: Option<i64>) -> PageRequest {
        PageRequest {
            query: query.to_string(),
            page,
            page_size,
        }
    }

    /// Parse a redirect target back into a request, the way the next hit would.
    fn follow(url: &str) -> PageRequest {
        let (_, raw_query) = url.split_once('?').unwrap_or((url, ""));
        let mut query = None;
        let mut page = None;
        let mut total = None;
        for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
            match key.as_ref() {
                "q" => query = Some(value.into_owned()),
                "page" => page = Some(value.into_owned()),
                "total" => total = Some(value.into_owned()),
                _ => {}
            }
        }
        PageRequest::from_params(query.as_deref(), page.as_deref(), total.as_deref())
    }

    #[test]
    fn renders_first_page_by_default() {
        let outcome = normalize(BASE, &PageRequest::default(), 35);
        let Pagination::Render(state) = outcome else {
            panic!("expected render, got {outcome:?}");
        };
        assert_eq!(state.page, 1);
        assert_eq!(state.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(state.page_count, 4);
        assert_eq!(state.offset(), 0);
        assert_eq!(state.pagination_url, "/cms/projects?");
    }

    #[test]
    fn renders_valid_page_with_allowed_size() {
        let outcome = normalize(BASE, &request("", Some(2), Some(20)), 35);
        let Pagination::Render(state) = outcome else {
            panic!("expected render, got {outcome:?}");
        };
        assert_eq!(state.page, 2);
        assert_eq!(state.page_size, 20);
        assert_eq!(state.page_count, 2);
        assert_eq!(state.offset(), 20);
        assert_eq!(state.limit(), 20);
        assert_eq!(state.url_for(1), "/cms/projects?page=1&total=20");
    }

    #[test]
    fn unknown_page_size_redirects_to_default_size() {
        for size in [1, 7, 15, 25, 100, -10] {
            let outcome = normalize(BASE, &request("", Some(1), Some(size)), 42);
            assert_eq!(
                outcome,
                Pagination::Redirect("/cms/projects?page=1&total=10".to_string()),
                "page size {size}"
            );
        }
    }

    #[test]
    fn page_past_the_end_is_clamped_to_last_page() {
        let outcome = normalize(BASE, &request("rust", Some(9), None), 25);
        assert_eq!(
            outcome,
            Pagination::Redirect("/cms/projects?q=rust&page=3&total=10".to_string())
        );
    }

    #[test]
    fn negative_page_is_clamped_to_first_page() {
        let outcome = normalize(BASE, &request("", Some(-4), Some(20)), 25);
        assert_eq!(
            outcome,
            Pagination::Redirect("/cms/projects?page=1&total=10".to_string())
        );
    }

    #[test]
    fn zero_matches_render_first_page() {
        let outcome = normalize(BASE, &request("", Some(1), None), 0);
        let Pagination::Render(state) = outcome else {
            panic!("expected render, got {outcome:?}");
        };
        assert_eq!(state.page, 1);
        assert_eq!(state.page_count, 0);
    }

    #[test]
    fn zero_matches_redirect_any_page_to_first_and_settle() {
        for page in [2, 5, 40, -1] {
            let outcome = normalize(BASE, &request("go lang", Some(page), None), 0);
            let Pagination::Redirect(url) = outcome else {
                panic!("expected redirect for page {page}");
            };
            assert_eq!(url, "/cms/projects?q=go+lang&page=1&total=10");

            let second = normalize(BASE, &follow(&url), 0);
            assert!(matches!(second, Pagination::Render(ref state) if state.page == 1));
        }
    }

    #[test]
    fn redirect_targets_never_redirect_again() {
        for total_matches in [0, 1, 9, 10, 11, 99, 100, 1001] {
            for page in [-3, 1, 2, 7, 500] {
                for size in [None, Some(3), Some(20), Some(50), Some(64)] {
                    let outcome = normalize(BASE, &request("x", Some(page), size), total_matches);
                    if let Pagination::Redirect(url) = outcome {
                        let again = normalize(BASE, &follow(&url), total_matches);
                        assert!(
                            matches!(again, Pagination::Render(_)),
                            "{url} redirected again for {total_matches} matches"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn lenient_parsing_treats_garbage_as_absent() {
        let parsed = PageRequest::from_params(Some("q"), Some("abc"), Some("0"));
        assert_eq!(parsed, request("q", None, None));

        let parsed = PageRequest::from_params(None, Some(" 3 "), Some("2.5"));
        assert_eq!(parsed, request("", Some(3), None));
    }

    #[test]
    fn query_is_percent_encoded() {
        assert_eq!(
            page_url(BASE, "c++ & rust", 2, 20),
            "/cms/projects?q=c%2B%2B+%26+rust&page=2&total=20"
        );
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }
}
