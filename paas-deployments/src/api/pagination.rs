use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

const PAGE_PARAM: &str = "page";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PaginationMetadata {
    /// The page being returned. Pages start at 1.
    pub current: u64,

    /// Maximum amount of entries per page.
    pub limit: u64,

    /// Link to the following page; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Total amount of pages available for this query.
    pub pages: u64,

    /// Link to the preceding page; absent on the first page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,

    /// Total amount of entries matching the query across all pages.
    pub results: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PaginatedData<T> {
    pub pagination: PaginationMetadata,
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCounts {
    pub current: u64,
    pub limit: u64,
    pub pages: u64,
    pub results: u64,
}

/// Builds links back to a listing route. Every query parameter of the original request is kept as is apart
/// from the page parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLink {
    path: String,
    query: Vec<(String, String)>,
}

impl ListLink {
    pub fn new(path: &str, raw_query: Option<&str>) -> Self {
        let query = raw_query
            .map(|raw| {
                form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .filter(|(key, _)| key != PAGE_PARAM)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            path: path.into(),
            query,
        }
    }

    /// Link to the given page. `None` drops the page parameter altogether.
    pub fn page(&self, page: Option<u64>) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(self.query.iter());

        if let Some(page) = page {
            serializer.append_pair(PAGE_PARAM, &page.to_string());
        }

        let query = serializer.finish();

        if query.is_empty() {
            return self.path.clone();
        }

        format!("{}?{}", self.path, query)
    }
}

/// The first page is linked without an explicit page parameter.
pub fn generate_metadata(link: &ListLink, counts: PageCounts) -> PaginationMetadata {
    let PageCounts {
        current,
        limit,
        pages,
        results,
    } = counts;

    let previous = match current {
        0 | 1 => None,
        2 => Some(link.page(None)),
        _ => Some(link.page(Some(current - 1))),
    };

    let next = current
        .checked_add(1)
        .filter(|next| *next <= pages)
        .map(|next| link.page(Some(next)));

    PaginationMetadata {
        current,
        limit,
        next,
        pages,
        previous,
        results,
    }
}
