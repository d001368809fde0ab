//! Shopify cursor pagination via the `Link` response header.
//!
//! Each page response may carry links to its neighbours, with the cursor
//! encoded as the `page_info` query parameter:
//!
//! ```text
//! <https://shop.com/products.json?limit=250&page_info=PREV>; rel="previous",
//! <https://shop.com/products.json?limit=250&page_info=NEXT>; rel="next"
//! ```

use reqwest::Url;

/// Returns the `page_info` cursor of the `rel="next"` link, if any.
///
/// `None` means the last page was reached: no header, no `next` relation, or
/// a `next` URL without a usable `page_info` parameter.
#[must_use]
pub fn next_page_cursor(link_header: Option<&str>) -> Option<String> {
    link_header?
        .split(',')
        .map(str::trim)
        .find(|segment| has_next_relation(segment))
        .and_then(link_target)
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page_info")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|cursor| !cursor.is_empty())
}

fn has_next_relation(segment: &str) -> bool {
    segment.split(';').skip(1).any(|param| {
        param
            .trim()
            .strip_prefix("rel=")
            .map(|rel| rel.trim_matches('"'))
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")))
    })
}

fn link_target(segment: &str) -> Option<Url> {
    let start = segment.find('<')? + 1;
    let end = segment.find('>')?;
    if start >= end {
        return None;
    }
    Url::parse(&segment[start..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_without_header() {
        assert!(next_page_cursor(None).is_none());
        assert!(next_page_cursor(Some("")).is_none());
    }

    #[test]
    fn single_next_link() {
        let header = r#"<https://shop.test/products.json?limit=250&page_info=eyJsYXN0X2lkIjo2fQ>; rel="next""#;
        assert_eq!(
            next_page_cursor(Some(header)).as_deref(),
            Some("eyJsYXN0X2lkIjo2fQ")
        );
    }

    #[test]
    fn picks_next_out_of_previous_and_next() {
        let header = concat!(
            r#"<https://shop.test/products.json?limit=250&page_info=PREV>; rel="previous",  "#,
            r#"<https://shop.test/products.json?limit=250&page_info=NEXT>; rel="next""#
        );
        assert_eq!(next_page_cursor(Some(header)).as_deref(), Some("NEXT"));
    }

    #[test]
    fn previous_only_means_last_page() {
        let header = r#"<https://shop.test/products.json?page_info=PREV>; rel="previous""#;
        assert!(next_page_cursor(Some(header)).is_none());
    }

    #[test]
    fn next_without_page_info_means_last_page() {
        let header = r#"<https://shop.test/products.json?limit=250>; rel="next""#;
        assert!(next_page_cursor(Some(header)).is_none());
    }

    #[test]
    fn unquoted_relation_is_accepted() {
        let header = "<https://shop.test/products.json?page_info=abc>; rel=next";
        assert_eq!(next_page_cursor(Some(header)).as_deref(), Some("abc"));
    }

    #[test]
    fn cursor_is_percent_decoded() {
        let header = r#"<https://shop.test/products.json?page_info=a%3Db>; rel="next""#;
        assert_eq!(next_page_cursor(Some(header)).as_deref(), Some("a=b"));
    }
}
