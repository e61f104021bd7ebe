//! Amazon S3 source.
//!
//! Lists and downloads `.json` objects through the S3 REST API with AWS
//! Signature V4 authentication. Listing follows `ListObjectsV2`
//! continuation tokens page by page and stops as soon as the requested
//! number of JSON keys has been collected.
//!
//! Signing uses only pure-Rust dependencies (`hmac`, `sha2`), and listing
//! responses are decoded with `quick-xml`'s serde support.
//!
//! # Configuration
//!
//! ```toml
//! [sources.s3]
//! region = "us-east-1"
//! page_size = 1000
//! # endpoint_url = "http://localhost:9000"   # MinIO, path-style requests
//! ```
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional (temporary credentials / IAM roles)
//! - `AWS_REGION`: optional, overrides `sources.s3.region`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use crate::config::S3SourceConfig;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::FileHandle;
use crate::traits::FileSource;

type HmacSha256 = Hmac<Sha256>;

/// A bucket (and optional key prefix) exposed as a [`FileSource`].
pub struct S3Source {
    bucket: String,
    prefix: String,
    region: String,
    endpoint: Endpoint,
    page_size: usize,
    client: reqwest::Client,
}

/// Where requests go. AWS uses virtual-hosted addressing; custom endpoints
/// use path-style addressing (`/<bucket>/<key>`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Aws,
    Custom { scheme: String, host: String },
}

impl S3Source {
    pub fn new(config: &S3SourceConfig, bucket: &str, prefix: &str) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::source_unavailable(e.to_string()))?;

        let endpoint = match config.endpoint_url.as_deref() {
            Some(url) => {
                let (scheme, rest) = match url.split_once("://") {
                    Some((scheme, rest)) => (scheme.to_string(), rest),
                    None => ("https".to_string(), url),
                };
                Endpoint::Custom {
                    scheme,
                    host: rest.trim_end_matches('/').to_string(),
                }
            }
            None => Endpoint::Aws,
        };

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            region: config.effective_region(),
            endpoint,
            page_size: config.page_size.clamp(1, 1000),
            client,
        })
    }

    fn host(&self) -> String {
        match &self.endpoint {
            Endpoint::Aws => format!("{}.s3.{}.amazonaws.com", self.bucket, self.region),
            Endpoint::Custom { host, .. } => host.clone(),
        }
    }

    fn scheme(&self) -> &str {
        match &self.endpoint {
            Endpoint::Aws => "https",
            Endpoint::Custom { scheme, .. } => scheme,
        }
    }

    /// Canonical URI for an (already encoded) key; empty key means the
    /// bucket root used by `ListObjectsV2`.
    fn canonical_uri(&self, encoded_key: &str) -> String {
        match &self.endpoint {
            Endpoint::Aws => format!("/{}", encoded_key),
            Endpoint::Custom { .. } if encoded_key.is_empty() => {
                format!("/{}/", uri_encode(&self.bucket))
            }
            Endpoint::Custom { .. } => format!("/{}/{}", uri_encode(&self.bucket), encoded_key),
        }
    }

    /// Issue a signed GET and return the successful response.
    async fn signed_get(
        &self,
        creds: &AwsCredentials,
        canonical_uri: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response, SignedGetError> {
        let host = self.host();
        let signed = sign_get(creds, &self.region, &host, canonical_uri, query, Utc::now());

        let mut url = format!("{}://{}{}", self.scheme(), host, canonical_uri);
        if !signed.canonical_query.is_empty() {
            url.push('?');
            url.push_str(&signed.canonical_query);
        }

        let mut req = self.client.get(&url);
        for (name, value) in &signed.headers {
            if name != "host" {
                req = req.header(name.as_str(), value.as_str());
            }
        }

        let resp = req.send().await.map_err(SignedGetError::Transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SignedGetError::Status {
                status,
                body: body.chars().take(500).collect(),
            });
        }
        Ok(resp)
    }
}

enum SignedGetError {
    Transport(reqwest::Error),
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl std::fmt::Display for SignedGetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignedGetError::Transport(e) => write!(f, "{}", e),
            SignedGetError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
        }
    }
}

#[async_trait]
impl FileSource for S3Source {
    fn source_type(&self) -> &str {
        "s3"
    }

    async fn list_files(&self, max_files: usize) -> PipelineResult<Vec<FileHandle>> {
        let creds = AwsCredentials::from_env()?;
        let canonical_uri = self.canonical_uri("");
        let mut files = Vec::new();
        let mut continuation_token: Option<String> = None;

        while files.len() < max_files {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), self.page_size.to_string()),
            ];
            if !self.prefix.is_empty() {
                query.push(("prefix".to_string(), self.prefix.clone()));
            }
            if let Some(ref token) = continuation_token {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let resp = self
                .signed_get(&creds, &canonical_uri, &query)
                .await
                .map_err(|e| {
                    AnalysisError::source_unavailable(format!(
                        "Failed to list s3://{}/{}: {}",
                        self.bucket, self.prefix, e
                    ))
                })?;
            let xml = resp.text().await.map_err(|e| {
                AnalysisError::source_unavailable(format!(
                    "Failed to read S3 listing for s3://{}: {}",
                    self.bucket, e
                ))
            })?;

            let page = parse_list_objects(&xml)?;
            let remaining = max_files - files.len();
            files.extend(page.files.into_iter().take(remaining));

            match page.next_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, prefix = %self.prefix, count = files.len(), "listed s3 objects");
        Ok(files)
    }

    async fn read_file(&self, handle: &FileHandle) -> PipelineResult<Vec<u8>> {
        let read_err = |reason: String| AnalysisError::Read {
            key: handle.key.clone(),
            reason,
        };

        let creds = AwsCredentials::from_env()?;
        let encoded_key = handle
            .key
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");
        let canonical_uri = self.canonical_uri(&encoded_key);

        let resp = self
            .signed_get(&creds, &canonical_uri, &[])
            .await
            .map_err(|e| read_err(format!("S3 GetObject failed: {}", e)))?;
        let bytes = resp.bytes().await.map_err(|e| read_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ============ AWS Credentials ============

struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> PipelineResult<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| {
                AnalysisError::source_unavailable(format!(
                    "{} environment variable not set",
                    name
                ))
            })
        };
        Ok(Self {
            access_key_id: var("AWS_ACCESS_KEY_ID")?,
            secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

// ============ Listing ============

/// `ListObjectsV2` response body; unlisted elements are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
    #[serde(default)]
    contents: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectEntry {
    key: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    last_modified: Option<String>,
}

struct ListPage {
    files: Vec<FileHandle>,
    is_truncated: bool,
    next_token: Option<String>,
}

fn parse_list_objects(xml: &str) -> PipelineResult<ListPage> {
    let result: ListBucketResult = quick_xml::de::from_str(xml).map_err(|e| {
        AnalysisError::source_unavailable(format!("Malformed S3 listing response: {}", e))
    })?;

    let files = result
        .contents
        .into_iter()
        .filter(|obj| is_json_key(&obj.key))
        .map(|obj| FileHandle {
            key: obj.key,
            size: obj.size,
            last_modified: obj.last_modified,
        })
        .collect();

    Ok(ListPage {
        files,
        is_truncated: result.is_truncated,
        next_token: result.next_continuation_token,
    })
}

/// JSON object keys; directory placeholders (trailing `/`) never match.
fn is_json_key(key: &str) -> bool {
    !key.ends_with('/') && key.to_ascii_lowercase().ends_with(".json")
}

// ============ AWS SigV4 ============

struct SignedHeaders {
    canonical_query: String,
    /// Lowercase header names and values, sorted by name, including `host`.
    headers: Vec<(String, String)>,
}

/// Sign an empty-body GET request with SigV4.
fn sign_get(
    creds: &AwsCredentials,
    region: &str,
    host: &str,
    canonical_uri: &str,
    query: &[(String, String)],
    now: DateTime<Utc>,
) -> SignedHeaders {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut sorted_query = query.to_vec();
    sorted_query.sort();
    let canonical_query = sorted_query
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let payload_hash = hex_sha256(b"");

    let mut headers = vec![
        ("host".to_string(), host.to_string()),
        ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort();

    let signed_header_names = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "GET\n{}\n{}\n{}\n{}\n{}",
        canonical_uri, canonical_query, canonical_headers, signed_header_names, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3");
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    headers.push((
        "authorization".to_string(),
        format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_header_names, signature
        ),
    ));

    SignedHeaders {
        canonical_query,
        headers,
    }
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding; only `A-Z a-z 0-9 - _ . ~` pass through.
fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}
