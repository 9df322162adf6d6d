//! Response header parsing: `Link` cursors and the call-limit budget.

use url::Url;

/// Header carrying the `current/max` call budget.
pub const CALL_LIMIT_HEADER: &str = "x-shopify-shop-api-call-limit";

/// Consumption ratio (as a fraction of `max`) at which the client cools down.
const THROTTLE_NUMERATOR: u32 = 4;
const THROTTLE_DENOMINATOR: u32 = 5;

/// Extract the `page_info` cursor of the `rel="next"` entry of a `Link` header.
///
/// ```text
/// <https://shop/admin/api/2023-10/customers.json?limit=250&page_info=abc>; rel="next"
/// ```
///
/// Entries are delimited by their `<...>` targets, so commas inside a target
/// URL (such as a `fields` list) do not split it.
#[must_use]
pub fn next_page_info(link_header: &str) -> Option<String> {
    let mut rest = link_header;
    loop {
        let (_, after_open) = rest.split_once('<')?;
        let (target, tail) = after_open.split_once('>')?;
        let params = tail.split_once('<').map_or(tail, |(params, _)| params);

        if params.split([';', ',']).any(is_rel_next) {
            return page_info(target);
        }
        rest = tail;
    }
}

fn is_rel_next(param: &str) -> bool {
    param
        .trim()
        .strip_prefix("rel=")
        .map(|rel| rel.trim_matches('"'))
        .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")))
}

fn page_info(target: &str) -> Option<String> {
    let url = Url::parse(target.trim()).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "page_info")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Parsed `current/max` call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimit {
    pub current: u32,
    pub max: u32,
}

impl CallLimit {
    /// Parse a `current/max` header value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (current, max) = value.trim().split_once('/')?;
        let current = current.trim().parse().ok()?;
        let max = max.trim().parse().ok()?;
        if max == 0 {
            return None;
        }
        Some(Self { current, max })
    }

    /// Whether consumption has reached 80% of the budget.
    #[must_use]
    pub const fn is_near_limit(self) -> bool {
        self.current.saturating_mul(THROTTLE_DENOMINATOR)
            >= self.max.saturating_mul(THROTTLE_NUMERATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_info_picks_next_entry() {
        let header = "<https://demo.myshopify.com/admin/api/2023-10/orders.json?limit=250&page_info=prev123>; rel=\"previous\", \
                      <https://demo.myshopify.com/admin/api/2023-10/orders.json?limit=250&page_info=next456>; rel=\"next\"";
        assert_eq!(next_page_info(header), Some("next456".to_string()));
    }

    #[test]
    fn test_next_page_info_absent_on_last_page() {
        let header = "<https://demo.myshopify.com/admin/api/2023-10/orders.json?limit=250&page_info=prev123>; rel=\"previous\"";
        assert_eq!(next_page_info(header), None);
        assert_eq!(next_page_info(""), None);
        assert_eq!(next_page_info("garbage"), None);
    }

    #[test]
    fn test_next_page_info_keeps_commas_inside_target() {
        let header = "<https://demo.myshopify.com/admin/api/2023-10/customers.json?limit=250&fields=id,email&page_info=abc>; rel=\"next\"";
        assert_eq!(next_page_info(header), Some("abc".to_string()));

        let header = "<https://demo.myshopify.com/admin/api/2023-10/orders.json?fields=id,name&page_info=prev1>; rel=\"previous\", \
                      <https://demo.myshopify.com/admin/api/2023-10/orders.json?fields=id,name&page_info=next2>; rel=\"next\"";
        assert_eq!(next_page_info(header), Some("next2".to_string()));
    }

    #[test]
    fn test_call_limit_threshold() {
        let under = CallLimit::parse("31/40").expect("parse");
        assert!(!under.is_near_limit());

        let at = CallLimit::parse("32/40").expect("parse");
        assert!(at.is_near_limit());

        let over = CallLimit::parse(" 40 / 40 ").expect("parse");
        assert!(over.is_near_limit());
    }

    #[test]
    fn test_call_limit_rejects_malformed() {
        assert_eq!(CallLimit::parse("40"), None);
        assert_eq!(CallLimit::parse("a/b"), None);
        assert_eq!(CallLimit::parse("1/0"), None);
    }
}
