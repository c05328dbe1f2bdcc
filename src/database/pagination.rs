use serde::Serialize;

use crate::{
    constants::MAX_PAGE_SIZE,
    error::{Error, HtmlError},
    filters::QueryPairs,
};

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Page position requested through `?page=<n>&limit=<n>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn from_query(query: &QueryPairs, default_limit: i64) -> Result<Self, Error> {
        let page = match query.get("page") {
            Some(value) => match value.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(HtmlError::NotFound.new("Invalid page.")),
            },
            None => 1,
        };
        let limit = query
            .get("limit")
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .map(|limit| limit.min(MAX_PAGE_SIZE))
            .unwrap_or(default_limit);

        if (page - 1).checked_mul(limit).is_none() {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }
        Ok(Self { page, limit })
    }

    /// Saturates for hand-built requests; `from_query` rejects pages whose offset overflows.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Only the first page may be empty.
    pub fn check_rows(&self, found: usize) -> Result<(), Error> {
        if found == 0 && self.page > 1 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }
        Ok(())
    }
}

impl<T> PageContext<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        request: PageRequest,
        path: &str,
        query: &QueryPairs,
    ) -> Self {
        let has_next = request.offset() + (rows.len() as i64) < total_rows;
        let next = has_next.then(|| query.link(path, request.page + 1, request.limit));
        let previous = (request.page > 1).then(|| query.link(path, request.page - 1, request.limit));

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> QueryPairs {
        QueryPairs::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_to_first_page() {
        let request = PageRequest::from_query(&query(&[]), 6).unwrap();
        assert_eq!(request, PageRequest { page: 1, limit: 6 });
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn rejects_non_positive_page() {
        let error = PageRequest::from_query(&query(&[("page", "0")]), 6).unwrap_err();
        assert_eq!(error.code, warp::http::StatusCode::NOT_FOUND);
        assert!(PageRequest::from_query(&query(&[("page", "abc")]), 6).is_err());
    }

    #[test]
    fn huge_page_is_not_found() {
        let page = i64::MAX.to_string();
        let error = PageRequest::from_query(&query(&[("page", page.as_str())]), 6).unwrap_err();
        assert_eq!(error.code, warp::http::StatusCode::NOT_FOUND);
        assert_eq!(error.info.as_deref(), Some("Invalid page."));

        let request = PageRequest::from_query(&query(&[("page", "1000000")]), 6).unwrap();
        assert_eq!(request.offset(), 5_999_994);
    }

    #[test]
    fn pages_past_the_end_are_not_found() {
        let request = PageRequest::from_query(&query(&[("page", "4")]), 6).unwrap();
        assert!(request.check_rows(0).is_err());
        assert!(request.check_rows(1).is_ok());
        assert!(PageRequest { page: 1, limit: 6 }.check_rows(0).is_ok());
    }

    #[test]
    fn clamps_limit() {
        let request = PageRequest::from_query(&query(&[("limit", "1000")]), 6).unwrap();
        assert_eq!(request.limit, MAX_PAGE_SIZE);
        let request = PageRequest::from_query(&query(&[("limit", "-3")]), 6).unwrap();
        assert_eq!(request.limit, 6);
    }

    #[test]
    fn links_keep_other_parameters() {
        let q = query(&[("tags", "breakfast"), ("page", "2"), ("limit", "2")]);
        let request = PageRequest::from_query(&q, 6).unwrap();
        let page = PageContext::from_rows(vec![3, 4], 5, request, "/api/recipes/", &q);

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?tags=breakfast&page=3&limit=2")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?tags=breakfast&page=1&limit=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let q = query(&[("page", "3"), ("limit", "2")]);
        let request = PageRequest::from_query(&q, 6).unwrap();
        let page = PageContext::from_rows(vec![5], 5, request, "/api/users/", &q);
        assert!(page.next.is_none());
        assert!(page.previous.is_some());
    }
}
