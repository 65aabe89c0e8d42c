//! CloudFront header map and header injection
//!
//! CloudFront hands edge functions headers keyed by the lower-cased name,
//! each holding a list of `{key, value}` entries that keep the original
//! casing. Injection must leave exactly one entry under the lower-cased key
//! and never touch unrelated headers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One header entry as CloudFront represents it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name in its original casing (CloudFront may omit it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
}

/// Header map keyed by lower-cased header name
pub type Headers = BTreeMap<String, Vec<HeaderEntry>>;

/// Set header `name` to `value`, replacing any previous entries for it.
pub fn inject_header(headers: &mut Headers, name: &str, value: &str) {
    headers.insert(
        name.to_ascii_lowercase(),
        vec![HeaderEntry {
            key: Some(name.to_string()),
            value: value.to_string(),
        }],
    );
}

/// First value of header `name`, looked up case-insensitively
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .get(&name.to_ascii_lowercase())
        .and_then(|entries| entries.first())
        .map(|entry| entry.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(key: &str, value: &str) -> Vec<HeaderEntry> {
        vec![HeaderEntry {
            key: Some(key.to_string()),
            value: value.to_string(),
        }]
    }

    #[test]
    fn test_inject_replaces_existing_entries() {
        let mut headers = Headers::new();
        headers.insert(
            "x-origin-verify".to_string(),
            vec![
                HeaderEntry {
                    key: Some("X-Origin-Verify".to_string()),
                    value: "spoofed".to_string(),
                },
                HeaderEntry {
                    key: None,
                    value: "second".to_string(),
                },
            ],
        );

        inject_header(&mut headers, "X-Origin-Verify", "real");

        let entries = &headers["x-origin-verify"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key.as_deref(), Some("X-Origin-Verify"));
        assert_eq!(entries[0].value, "real");
    }

    #[test]
    fn test_header_value_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("host".to_string(), entry("Host", "example.com"));
        assert_eq!(header_value(&headers, "HOST"), Some("example.com"));
        assert_eq!(header_value(&headers, "missing"), None);
    }

    proptest! {
        #[test]
        fn injection_yields_single_entry_and_keeps_others(
            name in "[A-Za-z][A-Za-z0-9-]{0,20}",
            value in ".*",
            others in prop::collection::btree_map("[a-z][a-z0-9-]{0,10}", ".*", 0..5),
        ) {
            let mut headers = Headers::new();
            for (k, v) in &others {
                headers.insert(k.clone(), entry(k, v));
            }

            inject_header(&mut headers, &name, &value);

            let lower = name.to_ascii_lowercase();
            let entries = &headers[&lower];
            prop_assert_eq!(entries.len(), 1);
            prop_assert_eq!(entries[0].key.as_deref(), Some(name.as_str()));
            prop_assert_eq!(&entries[0].value, &value);

            for (k, v) in &others {
                if *k != lower {
                    prop_assert_eq!(&headers[k], &entry(k, v));
                }
            }
        }
    }
}
