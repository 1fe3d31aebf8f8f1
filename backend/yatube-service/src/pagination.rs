/// Page-number pagination for post listings
///
/// Out-of-range and malformed page numbers never fail: they fall back to the
/// first or last page, so every listing URL renders something.
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginator {
    pub count: i64,
    pub per_page: i64,
    pub num_pages: i64,
}

/// One page of a listing, without its objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let count = count.max(0);
        let num_pages = if count == 0 {
            1
        } else {
            (count + per_page - 1) / per_page
        };
        Self {
            count,
            per_page,
            num_pages,
        }
    }

    /// Resolve a raw `?page=` value to a valid page.
    pub fn page(&self, raw_number: Option<&str>) -> Page {
        let number = match raw_number.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) if n > self.num_pages => self.num_pages,
            Some(Ok(n)) if n >= 1 => n,
            Some(Ok(_)) => self.num_pages,
            Some(Err(_)) | None => 1,
        };
        Page {
            number,
            num_pages: self.num_pages,
            per_page: self.per_page,
        }
    }
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<i64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<i64> {
        self.has_previous().then_some(self.number - 1)
    }

    /// Template context for `page_obj`, holding `objects` as `object_list`.
    pub fn to_context<T: Serialize>(&self, objects: &[T]) -> serde_json::Value {
        json!({
            "object_list": objects,
            "number": self.number,
            "has_next": self.has_next(),
            "has_previous": self.has_previous(),
            "has_other_pages": self.has_next() || self.has_previous(),
            "next_page_number": self.next_page_number(),
            "previous_page_number": self.previous_page_number(),
            "page_range": (1..=self.num_pages).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_counts() {
        assert_eq!(Paginator::new(13, 10).num_pages, 2);
        assert_eq!(Paginator::new(10, 10).num_pages, 1);
        assert_eq!(Paginator::new(0, 10).num_pages, 1);
    }

    #[test]
    fn test_page_number_fallbacks() {
        let paginator = Paginator::new(13, 10);
        assert_eq!(paginator.page(None).number, 1);
        assert_eq!(paginator.page(Some("abc")).number, 1);
        assert_eq!(paginator.page(Some("2")).number, 2);
        assert_eq!(paginator.page(Some("99")).number, 2);
        assert_eq!(paginator.page(Some("0")).number, 2);
    }

    #[test]
    fn test_navigation() {
        let paginator = Paginator::new(25, 10);
        let first = paginator.page(Some("1"));
        assert_eq!(first.offset(), 0);
        assert!(!first.has_previous());
        assert_eq!(first.next_page_number(), Some(2));

        let last = paginator.page(Some("3"));
        assert_eq!(last.offset(), 20);
        assert!(!last.has_next());
        assert_eq!(last.previous_page_number(), Some(2));
    }

    #[test]
    fn test_context_shape() {
        let page = Paginator::new(0, 10).page(None);
        let ctx = page.to_context::<i64>(&[]);
        assert_eq!(ctx["number"], 1);
        assert_eq!(ctx["object_list"].as_array().unwrap().len(), 0);
        assert_eq!(ctx["has_next"], false);
    }
}
