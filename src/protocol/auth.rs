//! HTTP authorization headers
//!
//! Builds `Authorization` values for the two schemes the capture process can
//! challenge with, and parses the `WWW-Authenticate` value of a 401 response.
//!
//! Digest follows RFC 2617 without `qop`: the capture process issues a single
//! challenge per connection and only one authenticated request follows it, so
//! there is no nonce-count to track.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use bytes::Bytes;
use md5::{Digest, Md5};
use regex::Regex;

use super::constants::REQUEST;

/// Realm/nonce state captured from a digest challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
}

impl DigestChallenge {
    /// Create from a known realm and nonce
    pub fn new(realm: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            nonce: nonce.into(),
        }
    }
}

/// A parsed `WWW-Authenticate` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic { realm: String },
    Digest(DigestChallenge),
}

impl Challenge {
    /// Parse the value following `WWW-Authenticate:`
    ///
    /// Returns `None` for anything other than `Basic realm="..."` or
    /// `Digest realm="...", nonce="..."`.
    pub fn parse(value: &str) -> Option<Self> {
        static BASIC: OnceLock<Regex> = OnceLock::new();
        static DIGEST: OnceLock<Regex> = OnceLock::new();

        let value = value.trim();

        let basic = BASIC.get_or_init(|| {
            Regex::new(r#"^Basic\s*realm="([^"]+)""#).expect("valid basic challenge regex")
        });
        if let Some(caps) = basic.captures(value) {
            return Some(Challenge::Basic {
                realm: caps[1].to_string(),
            });
        }

        let digest = DIGEST.get_or_init(|| {
            Regex::new(r#"^Digest\s*realm="([^"]+)",\s*nonce="([^"]+)""#)
                .expect("valid digest challenge regex")
        });
        digest.captures(value).map(|caps| {
            Challenge::Digest(DigestChallenge::new(&caps[1], &caps[2]))
        })
    }
}

/// Build a basic `Authorization` value: `Basic base64(user:pass)`
pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", B64.encode(format!("{}:{}", username, password)))
}

/// Build a digest `Authorization` value for `method` on `path`
pub fn digest_header(
    method: &str,
    path: &str,
    username: &str,
    password: &str,
    challenge: &DigestChallenge,
) -> String {
    let ha1 = hex_md5(&[username, &challenge.realm, password]);
    let ha2 = hex_md5(&[method, path]);
    let response = hex_md5(&[&ha1, &challenge.nonce, &ha2]);

    format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
        username, challenge.realm, challenge.nonce, path, response
    )
}

/// The request carrying an `Authorization` value
///
/// The header goes after the blank line of the bare request; the capture
/// process reads the whole buffer and accepts it there.
pub fn authorized_request(header: &str) -> Bytes {
    let mut request = Vec::with_capacity(REQUEST.len() + header.len() + 20);
    request.extend_from_slice(REQUEST);
    request.extend_from_slice(b"Authorization: ");
    request.extend_from_slice(header.as_bytes());
    request.extend_from_slice(b"\r\n\r\n");
    Bytes::from(request)
}

/// Lowercase hex MD5 of `parts` joined with `:`
pub(crate) fn hex_md5(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr<'a>(header: &'a str, name: &str) -> &'a str {
        let open = format!("{}=\"", name);
        let start = header.find(&open).map(|i| i + open.len()).unwrap();
        let end = header[start..].find('"').unwrap() + start;
        &header[start..end]
    }

    #[test]
    fn test_hex_md5_empty() {
        assert_eq!(hex_md5(&[""]), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_basic_header() {
        assert_eq!(basic_header("user", "pass"), "Basic dXNlcjpwYXNz");
        // Empty credentials still encode the separator
        assert_eq!(basic_header("", ""), "Basic Og==");
    }

    #[test]
    fn test_digest_header_recomputable() {
        let challenge = DigestChallenge::new("Motion Camera", "a1b2c3d4");
        let header = digest_header("GET", "/", "admin", "secret", &challenge);

        assert!(header.starts_with("Digest "));
        assert_eq!(attr(&header, "username"), "admin");
        assert_eq!(attr(&header, "realm"), "Motion Camera");
        assert_eq!(attr(&header, "nonce"), "a1b2c3d4");
        assert_eq!(attr(&header, "uri"), "/");

        let ha1 = hex_md5(&["admin", "Motion Camera", "secret"]);
        let ha2 = hex_md5(&["GET", "/"]);
        let expected = hex_md5(&[&ha1, "a1b2c3d4", &ha2]);
        assert_eq!(attr(&header, "response"), expected);
        assert_eq!(expected.len(), 32);
    }

    #[test]
    fn test_digest_header_depends_on_nonce() {
        let a = digest_header("GET", "/", "u", "p", &DigestChallenge::new("r", "n1"));
        let b = digest_header("GET", "/", "u", "p", &DigestChallenge::new("r", "n2"));
        assert_ne!(attr(&a, "response"), attr(&b, "response"));
    }

    #[test]
    fn test_parse_basic_challenge() {
        assert_eq!(
            Challenge::parse(" Basic realm=\"cam\""),
            Some(Challenge::Basic {
                realm: "cam".into()
            })
        );
    }

    #[test]
    fn test_parse_digest_challenge() {
        let parsed = Challenge::parse("Digest realm=\"Motion\", nonce=\"0123abcd\"\r\n");
        assert_eq!(
            parsed,
            Some(Challenge::Digest(DigestChallenge::new("Motion", "0123abcd")))
        );
    }

    #[test]
    fn test_parse_unknown_challenge() {
        assert_eq!(Challenge::parse("Bearer realm=\"x\""), None);
        assert_eq!(Challenge::parse("Digest nonce=\"abc\""), None);
        assert_eq!(Challenge::parse(""), None);
    }

    #[test]
    fn test_authorized_request() {
        let request = authorized_request("Basic Og==");
        assert_eq!(
            &request[..],
            b"GET / HTTP/1.0\r\n\r\nAuthorization: Basic Og==\r\n\r\n"
        );
    }
}
