//! 🔐 Signing: AWS Signature Version 4, hand-rolled, no SDK, no credential refresh, no mercy.
//!
//! 🎬 COLD OPEN: INT. OPENSEARCH FRONT DOOR. 2:14 AM.
//!
//! A request walks up to the bouncer. "Name?" "POST /_bulk." "ID?" The request hands
//! over a folded napkin with sixty-four hex characters on it. The bouncer computes the
//! same sixty-four characters on his own napkin. They match. The velvet rope lifts.
//! If a single byte of the body had changed on the way over, the napkins would disagree
//! and the request would be spending the night in 403 jail.
//!
//! This module is the napkin factory. It is pure: you hand it the clock, it hands you
//! headers. No env vars, no I/O, no global state. Testable with the published vectors.
//!
//! ```text
//!   secret ──HMAC(date)──HMAC(region)──HMAC(service)──HMAC("aws4_request")──▶ signing key
//!   request ──canonicalize──SHA256──▶ string to sign ──HMAC(signing key)──▶ signature
//! ```
//!
//! 🦆 (the duck signs nothing. the duck has no credentials.)

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// 🏷️ The algorithm tag. It goes on the first line of the string to sign and the front of the
/// Authorization header. Spelled exactly like this or the service pretends not to know you.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// 🔚 The fixed last element of every credential scope.
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// 📡 The one and only path this crate ever POSTs to.
pub const BULK_PATH: &str = "/_bulk";

type HmacSha256 = Hmac<Sha256>;

// -- 🧩 host label, region, service, fixed suffix. e.g. search-logs-abc.us-east-1.es.amazonaws.com
static ENDPOINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^.]+)\.?([^.]*)\.?([^.]*)\.amazonaws\.com$")
        .expect("💀 the endpoint pattern is a string literal and it still failed to compile. impressive.")
});

/// 💀 The ways signing can go sideways. The scope ones happen at startup, never mid-run.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SigningError {
    #[error(
        "💀 couldn't work out the signing region for '{host}'. The hostname doesn't encode one \
         and no `region` was configured. Set sink.region (or AWS_REGION) and try again."
    )]
    MissingRegion { host: String },
    #[error(
        "💀 couldn't work out the signing service for '{host}'. The hostname doesn't encode one \
         and no `service` was configured. For OpenSearch it's usually \"es\"."
    )]
    MissingService { host: String },
    #[error("💀 HMAC-SHA256 refused its key: {0}")]
    InvalidKey(String),
}

/// 🔒 Static credentials. The access key is a username, the secret is a password, the session
/// token is the wristband you got at the door that expires at midnight.
#[derive(Clone, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

// 🙈 hand-rolled Debug so the secret never ends up in a log line at 3am
impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// 🗺️ Which region and which service a signature is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScope {
    pub region: String,
    pub service: String,
}

impl SigningScope {
    /// 🧩 Pull region and service out of an `*.amazonaws.com` hostname.
    ///
    /// Returns `None` when the host doesn't follow the pattern at all (localhost, a proxy,
    /// a wiremock server pretending to be AWS). Either field may come back empty when the
    /// hostname has fewer labels than expected.
    pub fn from_host(host: &str) -> Option<Self> {
        let captures = ENDPOINT_PATTERN.captures(strip_port(host))?;
        let group = |i: usize| captures.get(i).map_or("", |m| m.as_str()).to_string();
        Some(Self {
            region: group(2),
            service: group(3),
        })
    }

    /// 🎯 The hostname wins when it encodes a value; the configured fallbacks fill the gaps.
    pub fn resolve(
        host: &str,
        configured_region: Option<&str>,
        configured_service: Option<&str>,
    ) -> Result<Self, SigningError> {
        let parsed = Self::from_host(host);

        let region = pick(parsed.as_ref().map(|s| s.region.as_str()), configured_region)
            .ok_or_else(|| SigningError::MissingRegion {
                host: host.to_string(),
            })?;
        let service = pick(parsed.as_ref().map(|s| s.service.as_str()), configured_service)
            .ok_or_else(|| SigningError::MissingService {
                host: host.to_string(),
            })?;

        Ok(Self { region, service })
    }

    /// 📜 `date/region/service/aws4_request`
    pub fn credential_scope(&self, date: &str) -> String {
        [date, &self.region, &self.service, SCOPE_TERMINATOR].join("/")
    }
}

/// 📮 A request before the napkin factory gets to it.
#[derive(Debug, Clone)]
pub struct UnsignedRequest {
    pub host: String,
    pub method: String,
    pub path: String,
    /// Extra headers to sign. `Host`, `X-Amz-Date` and the security token are added by
    /// [`sign_request`], don't pass them in.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// ✉️ A request with its napkin stapled on. Ready for the bouncer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub host: String,
    pub method: String,
    pub path: String,
    /// Every header that goes on the wire, `Authorization` last.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SignedRequest {
    /// 🔎 Case-insensitive header lookup, because HTTP said so.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn authorization(&self) -> Option<&str> {
        self.header("Authorization")
    }
}

/// 🕰️ `20150830T123600Z`: ISO-8601 with the punctuation surgically removed.
pub fn amz_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// 🔑 The four-step keyed-hash chain. One key per day, region and service.
pub fn signing_key(
    secret_access_key: &str,
    date: &str,
    scope: &SigningScope,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac_sha256(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, scope.region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, scope.service.as_bytes())?;
    hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
}

// -- lowercase name → value, sorted for free by the BTreeMap
fn canonical_header_map(headers: &[(String, String)]) -> BTreeMap<String, &str> {
    headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
        .collect()
}

/// 🏷️ `content-length;content-type;host;x-amz-date`
pub fn signed_header_names(headers: &[(String, String)]) -> String {
    canonical_header_map(headers)
        .into_keys()
        .collect::<Vec<_>>()
        .join(";")
}

/// 📐 The canonical request. No query string ever shows up on `/_bulk`, so that line is
/// always empty.
pub fn canonical_request(
    method: &str,
    path: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> String {
    let canonical_headers = canonical_header_map(headers)
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("\n");

    [
        method,
        path,
        "",
        &canonical_headers,
        "",
        &signed_header_names(headers),
        &hex_sha256(body),
    ]
    .join("\n")
}

pub fn string_to_sign(amz_date: &str, credential_scope: &str, canonical_request: &str) -> String {
    [
        ALGORITHM,
        amz_date,
        credential_scope,
        &hex_sha256(canonical_request.as_bytes()),
    ]
    .join("\n")
}

/// ✍️ Sign a request. Pure function of its inputs: same inputs, same napkin, every time.
///
/// Adds `Host`, `X-Amz-Security-Token` (when the credentials carry one) and `X-Amz-Date`
/// to the caller's headers, signs all of them, and appends `Authorization`.
pub fn sign_request(
    credentials: &AwsCredentials,
    scope: &SigningScope,
    timestamp: &DateTime<Utc>,
    request: UnsignedRequest,
) -> Result<SignedRequest, SigningError> {
    let datetime = amz_date(timestamp);
    let date = &datetime[..8];

    let mut headers = request.headers;
    headers.push(("Host".to_string(), request.host.clone()));
    if let Some(token) = &credentials.session_token {
        headers.push(("X-Amz-Security-Token".to_string(), token.clone()));
    }
    headers.push(("X-Amz-Date".to_string(), datetime.clone()));

    let canonical = canonical_request(&request.method, &request.path, &headers, &request.body);
    let credential_scope = scope.credential_scope(date);
    let to_sign = string_to_sign(&datetime, &credential_scope, &canonical);
    let key = signing_key(&credentials.secret_access_key, date, scope)?;
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={}, Signature={signature}",
        credentials.access_key_id,
        signed_header_names(&headers),
    );
    headers.push(("Authorization".to_string(), authorization));

    Ok(SignedRequest {
        host: request.host,
        method: request.method,
        path: request.path,
        headers,
        body: request.body,
    })
}

/// 🖋️ A signer bound to one endpoint and one set of credentials. The pipeline builds one at
/// startup and asks it for a fresh napkin per line.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    host: String,
    scope: SigningScope,
    credentials: AwsCredentials,
}

impl RequestSigner {
    pub fn new(host: impl Into<String>, scope: SigningScope, credentials: AwsCredentials) -> Self {
        Self {
            host: host.into(),
            scope,
            credentials,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// 📦 Wrap a bulk body into a signed `POST /_bulk`.
    pub fn sign_bulk(
        &self,
        body: String,
        timestamp: &DateTime<Utc>,
    ) -> Result<SignedRequest, SigningError> {
        let body = body.into_bytes();
        let request = UnsignedRequest {
            host: self.host.clone(),
            method: "POST".to_string(),
            path: BULK_PATH.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            body,
        };
        sign_request(&self.credentials, &self.scope, timestamp, request)
    }
}

// -- first non-empty of (what the hostname said, what the config said)
fn pick(from_host: Option<&str>, configured: Option<&str>) -> Option<String> {
    from_host
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| configured.filter(|v| !v.is_empty()).map(str::to_string))
}

// -- "127.0.0.1:9200" → "127.0.0.1". bare hosts pass through untouched.
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 🧪 the example credentials AWS publishes in its docs and test suite. not real. please don't try.
    fn example_credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }
    }

    fn test_suite_scope() -> SigningScope {
        SigningScope {
            region: "us-east-1".to_string(),
            service: "service".to_string(),
        }
    }

    fn test_suite_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    fn vanilla(method: &str) -> UnsignedRequest {
        UnsignedRequest {
            host: "example.amazonaws.com".to_string(),
            method: method.to_string(),
            path: "/".to_string(),
            headers: vec![],
            body: vec![],
        }
    }

    #[test]
    fn the_one_where_the_signing_key_matches_the_aws_docs_example() {
        let scope = SigningScope {
            region: "us-east-1".to_string(),
            service: "iam".to_string(),
        };
        let key = signing_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "20120215", &scope).unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn the_one_where_get_vanilla_from_the_test_suite_signs_bit_exact() {
        let signed = sign_request(
            &example_credentials(),
            &test_suite_scope(),
            &test_suite_time(),
            vanilla("GET"),
        )
        .unwrap();

        assert_eq!(
            signed.authorization(),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;x-amz-date, \
                 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
            )
        );
    }

    #[test]
    fn the_one_where_post_vanilla_from_the_test_suite_signs_bit_exact() {
        let signed = sign_request(
            &example_credentials(),
            &test_suite_scope(),
            &test_suite_time(),
            vanilla("POST"),
        )
        .unwrap();

        assert_eq!(
            signed.authorization(),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;x-amz-date, \
                 Signature=5da7c1a2acd57cee7505fc6676e4e544621c30862966e37dddb68e92efbe5d6b"
            )
        );
    }

    #[test]
    fn the_one_where_the_canonical_request_is_laid_out_line_by_line() {
        let headers = vec![
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
            ("Host".to_string(), "example.amazonaws.com".to_string()),
        ];
        let canonical = canonical_request("GET", "/", &headers, b"");

        assert_eq!(
            canonical,
            "GET\n/\n\nhost:example.amazonaws.com\nx-amz-date:20150830T123600Z\n\nhost;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn the_one_where_same_inputs_mean_same_napkin_and_one_byte_changes_everything() {
        let signer = RequestSigner::new(
            "search-logs-abc.us-east-1.es.amazonaws.com",
            SigningScope {
                region: "us-east-1".to_string(),
                service: "es".to_string(),
            },
            AwsCredentials {
                session_token: Some("wristband".to_string()),
                ..example_credentials()
            },
        );
        let now = Utc.with_ymd_and_hms(2023, 5, 1, 8, 30, 0).unwrap();
        let body = "{\"index\":{\"_index\":\"cwl-prod-acme-s1-2023.05.01\"}}\n{\"a\":1}\n";

        let first = signer.sign_bulk(body.to_string(), &now).unwrap();
        let second = signer.sign_bulk(body.to_string(), &now).unwrap();
        let tampered = signer.sign_bulk(body.replace("\"a\":1", "\"a\":2"), &now).unwrap();

        assert_eq!(first, second);
        assert_ne!(first.authorization(), tampered.authorization());
    }

    #[test]
    fn the_one_where_the_bulk_request_carries_every_header_it_signed() {
        let signer = RequestSigner::new(
            "search-logs-abc.us-east-1.es.amazonaws.com",
            SigningScope {
                region: "us-east-1".to_string(),
                service: "es".to_string(),
            },
            AwsCredentials {
                session_token: Some("wristband".to_string()),
                ..example_credentials()
            },
        );
        let now = Utc.with_ymd_and_hms(2023, 5, 1, 8, 30, 0).unwrap();
        let signed = signer.sign_bulk("{}\n{}\n".to_string(), &now).unwrap();

        assert_eq!(signed.method, "POST");
        assert_eq!(signed.path, "/_bulk");
        assert_eq!(signed.header("content-type"), Some("application/json"));
        assert_eq!(signed.header("content-length"), Some("6"));
        assert_eq!(
            signed.header("host"),
            Some("search-logs-abc.us-east-1.es.amazonaws.com")
        );
        assert_eq!(signed.header("x-amz-security-token"), Some("wristband"));
        assert_eq!(signed.header("x-amz-date"), Some("20230501T083000Z"));

        let authorization = signed.authorization().unwrap();
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20230501/us-east-1/es/aws4_request, "
        ));
        assert!(authorization.contains(
            "SignedHeaders=content-length;content-type;host;x-amz-date;x-amz-security-token, "
        ));
    }

    #[test]
    fn the_one_where_odd_key_lengths_still_sign_instead_of_panicking() {
        // -- HMAC pads short keys and hashes long ones, so neither extreme is an error
        let scope = test_suite_scope();
        let long_secret = "k".repeat(512);
        for secret in ["", "x", long_secret.as_str()] {
            let key = signing_key(secret, "20150830", &scope).unwrap();
            assert_eq!(key.len(), 32, "a SHA-256 sized key, whatever went in");
        }

        let signed = sign_request(
            &AwsCredentials {
                secret_access_key: String::new(),
                ..example_credentials()
            },
            &scope,
            &test_suite_time(),
            vanilla("GET"),
        )
        .unwrap();
        assert!(signed.authorization().is_some_and(|a| a.contains("Signature=")));
    }

    #[test]
    fn the_one_where_the_hostname_spills_its_region_and_service() {
        let scope = SigningScope::from_host("search-logs-abc.us-east-1.es.amazonaws.com").unwrap();
        assert_eq!(scope.region, "us-east-1");
        assert_eq!(scope.service, "es");

        assert_eq!(SigningScope::from_host("localhost:9200"), None);
    }

    #[test]
    fn the_one_where_config_fills_in_what_the_hostname_cannot() {
        let scope = SigningScope::resolve("127.0.0.1:9200", Some("eu-west-1"), Some("es")).unwrap();
        assert_eq!(scope.region, "eu-west-1");
        assert_eq!(scope.service, "es");

        // -- the hostname outranks the config when it actually says something
        let scope = SigningScope::resolve(
            "search-x.us-east-1.es.amazonaws.com",
            Some("eu-west-1"),
            None,
        )
        .unwrap();
        assert_eq!(scope.region, "us-east-1");

        assert_eq!(
            SigningScope::resolve("127.0.0.1:9200", None, Some("es")),
            Err(SigningError::MissingRegion {
                host: "127.0.0.1:9200".to_string()
            })
        );
    }

    #[test]
    fn the_one_where_secrets_stay_out_of_debug_output() {
        let rendered = format!(
            "{:?}",
            AwsCredentials {
                session_token: Some("wristband".to_string()),
                ..example_credentials()
            }
        );
        assert!(!rendered.contains("EXAMPLEKEY"));
        assert!(!rendered.contains("wristband"));
        assert!(rendered.contains("AKIDEXAMPLE"));
    }
}
