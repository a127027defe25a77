//! RPC-style request signing (signature version 1.0, HMAC-SHA1).
//!
//! The string to sign is `METHOD&%2F&<encoded canonical query>`. The key is
//! the access key secret with a trailing `&`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay literal, everything else is escaped
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, RFC3986).to_string()
}

/// Sorted `k=v` pairs joined by `&`, both sides percent-encoded
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn string_to_sign(method: &str, params: &BTreeMap<String, String>) -> String {
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(&canonical_query(params))
    )
}

/// Base64 HMAC-SHA1 signature over the request parameters
pub fn sign(method: &str, params: &BTreeMap<String, String>, access_key_secret: &str) -> String {
    let key = format!("{}&", access_key_secret);
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(string_to_sign(method, params).as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Query string including the trailing `Signature` parameter
pub fn signed_query(
    method: &str,
    params: &BTreeMap<String, String>,
    access_key_secret: &str,
) -> String {
    let signature = sign(method, params, access_key_secret);
    format!(
        "{}&Signature={}",
        canonical_query(params),
        percent_encode(&signature)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        [
            ("AccessKeyId", "testid"),
            ("Action", "DescribeDomainRecords"),
            ("DomainName", "example.com"),
            ("Format", "JSON"),
            ("SignatureMethod", "HMAC-SHA1"),
            ("SignatureNonce", "f59ed6a9-83fc-473b-9cc6-99c95df3856e"),
            ("SignatureVersion", "1.0"),
            ("Timestamp", "2016-03-24T16:41:54Z"),
            ("Version", "2015-01-09"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_percent_encode_rfc3986() {
        assert_eq!(percent_encode("a b*c~d"), "a%20b%2Ac~d");
        assert_eq!(percent_encode("2016-03-24T16:41:54Z"), "2016-03-24T16%3A41%3A54Z");
        assert_eq!(percent_encode("/"), "%2F");
    }

    #[test]
    fn test_canonical_query_is_sorted() {
        let mut p = BTreeMap::new();
        p.insert("b".to_string(), "2".to_string());
        p.insert("a".to_string(), "x y".to_string());
        assert_eq!(canonical_query(&p), "a=x%20y&b=2");
    }

    #[test]
    fn test_string_to_sign() {
        let s = string_to_sign("GET", &params());
        assert!(s.starts_with("GET&%2F&AccessKeyId%3Dtestid%26Action%3DDescribeDomainRecords"));
        assert!(s.contains("Timestamp%3D2016-03-24T16%253A41%253A54Z"));
    }

    #[test]
    fn test_known_signature() {
        assert_eq!(
            sign("GET", &params(), "testsecret"),
            "eYAFkzK0tNR530Xcpf/zrBxQTXs="
        );
    }

    #[test]
    fn test_signed_query_appends_encoded_signature() {
        let query = signed_query("GET", &params(), "testsecret");
        let signature = sign("GET", &params(), "testsecret");
        assert!(query.ends_with(&format!("&Signature={}", percent_encode(&signature))));
        assert!(query.starts_with("AccessKeyId=testid&Action="));
    }
}
