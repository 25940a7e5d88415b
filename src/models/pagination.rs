//! Page/sort parameters shared by list endpoints

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page whose offset still fits in an i64 at any page size
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    /// Clamp raw query values: page within 1..=MAX_PAGE, per_page within 1..=MAX_PER_PAGE
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Translate a `sort` query value (`"-created_at,title"`) into an ORDER BY list.
///
/// Only fields present in `allowed` (public name, column expression) are kept;
/// unknown fields are ignored. Falls back to `default` when nothing remains.
pub fn order_by(sort: Option<&str>, allowed: &[(&str, &str)], default: &str) -> String {
    let clauses: Vec<String> = sort
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|field| {
            let (name, direction) = match field.strip_prefix('-') {
                Some(name) => (name, "DESC"),
                None => (field.trim_start_matches('+'), "ASC"),
            };
            allowed
                .iter()
                .find(|(public, _)| *public == name)
                .map(|(_, column)| format!("{} {}", column, direction))
        })
        .collect();

    if clauses.is_empty() {
        default.to_string()
    } else {
        clauses.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[(&str, &str)] = &[("title", "b.title"), ("created_at", "b.created_at")];

    #[test]
    fn test_page_defaults_and_clamping() {
        assert_eq!(Page::new(None, None), Page { page: 1, per_page: 20 });
        assert_eq!(Page::new(Some(0), Some(1000)), Page { page: 1, per_page: 100 });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_huge_page_keeps_offset_in_range() {
        let page = Page::new(Some(i64::MAX), Some(100));
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() >= 0);
        assert!(Page::new(Some(i64::MAX), None).offset() >= 0);
    }

    #[test]
    fn test_order_by_parses_directions() {
        assert_eq!(
            order_by(Some("-created_at,title"), FIELDS, "b.id"),
            "b.created_at DESC, b.title ASC"
        );
    }

    #[test]
    fn test_order_by_ignores_unknown_fields() {
        assert_eq!(order_by(Some("password; DROP TABLE"), FIELDS, "b.id"), "b.id");
        assert_eq!(order_by(None, FIELDS, "b.id"), "b.id");
        assert_eq!(order_by(Some("password,title"), FIELDS, "b.id"), "b.title ASC");
    }
}
