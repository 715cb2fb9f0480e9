//! Query string redaction.
//!
//! Values of configured parameter names are replaced with [`REDACTED`]
//! before the query reaches a log record. Matching is exact and
//! case-sensitive. Pairs keep their original order, repeated keys included.
//!
//! ```
//! use httplog_middleware::redact_query;
//! use std::collections::HashSet;
//!
//! let targets = HashSet::from(["token".to_string()]);
//! assert_eq!(
//!     redact_query("token=secret&q=search", &targets),
//!     "token=REDACTED&q=search"
//! );
//! ```

use std::collections::HashSet;

/// Marker written in place of a redacted value.
pub const REDACTED: &str = "REDACTED";

type Pairs = Vec<(String, String)>;

fn decode(query: &str) -> Option<Pairs> {
    match serde_urlencoded::from_str::<Pairs>(query) {
        Ok(pairs) => Some(pairs),
        Err(e) => {
            tracing::debug!(error = %e, "failed to decode query string");
            None
        }
    }
}

fn encode(pairs: &Pairs) -> Option<String> {
    match serde_urlencoded::to_string(pairs) {
        Ok(query) => Some(query),
        Err(e) => {
            tracing::debug!(error = %e, "failed to encode query string");
            None
        }
    }
}

/// Re-encodes `query` in canonical form without changing any value.
///
/// Returns `query` unchanged if it cannot be decoded.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    decode(query)
        .and_then(|pairs| encode(&pairs))
        .unwrap_or_else(|| query.to_string())
}

/// Replaces the value of every pair whose key is in `targets`.
///
/// The result is canonically encoded. Redacting an already redacted query
/// with the same targets returns it unchanged. When `targets` is non-empty
/// and the query cannot be decoded, an empty string is returned so that no
/// value can leak.
#[must_use]
pub fn redact_query(query: &str, targets: &HashSet<String>) -> String {
    if targets.is_empty() {
        return normalize_query(query);
    }

    let Some(mut pairs) = decode(query) else {
        tracing::warn!("dropping undecodable query string from access record");
        return String::new();
    };

    for (key, value) in &mut pairs {
        if targets.contains(key.as_str()) {
            REDACTED.clone_into(value);
        }
    }

    encode(&pairs).unwrap_or_else(|| {
        tracing::warn!("dropping unencodable query string from access record");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn targets(names: &[&str]) -> HashSet<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_repeated_keys_keep_positions() {
        assert_eq!(
            redact_query("a=1&b=2&a=3", &targets(&["a"])),
            "a=REDACTED&b=2&a=REDACTED"
        );
    }

    #[test]
    fn test_decode_order_is_preserved() {
        assert_eq!(
            redact_query("token=secret&q=search", &targets(&["token"])),
            "token=REDACTED&q=search"
        );
    }

    #[test]
    fn test_only_exact_names_match() {
        assert_eq!(
            redact_query("test=something&test2=something", &targets(&["test"])),
            "test=REDACTED&test2=something"
        );
        assert_eq!(
            redact_query("Token=x&token=y", &targets(&["token"])),
            "Token=x&token=REDACTED"
        );
    }

    #[test]
    fn test_empty_targets_only_normalize() {
        assert_eq!(redact_query("a=1&b=two+words", &HashSet::new()), "a=1&b=two+words");
        assert_eq!(redact_query("", &HashSet::new()), "");
    }

    #[test]
    fn test_encoded_values_round_trip() {
        assert_eq!(
            redact_query("q=a%26b&secret=p%3Dw", &targets(&["secret"])),
            "q=a%26b&secret=REDACTED"
        );
    }

    #[test]
    fn test_key_without_value() {
        assert_eq!(redact_query("flag&token=x", &targets(&["token"])), "flag=&token=REDACTED");
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("a=1&b=%7E"), "a=1&b=%7E");
        assert_eq!(normalize_query("x=hello world"), "x=hello+world");
    }

    proptest! {
        #[test]
        fn redaction_is_idempotent(
            pairs in prop::collection::vec(("[a-c]{1,2}", "[ -~]{0,8}"), 0..8),
            names in prop::collection::hash_set("[a-c]{1,2}", 0..3),
        ) {
            let query = serde_urlencoded::to_string(&pairs).unwrap();
            let once = redact_query(&query, &names);
            let twice = redact_query(&once, &names);
            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn untargeted_pairs_survive(
            pairs in prop::collection::vec(("[d-f]{1,2}", "[a-z0-9]{0,8}"), 0..8),
        ) {
            let query = serde_urlencoded::to_string(&pairs).unwrap();
            prop_assert_eq!(redact_query(&query, &targets(&["token"])), query);
        }
    }
}
