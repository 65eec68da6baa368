use crate::constants::{CORS_ALLOWED_METHODS, CORS_MAX_AGE_SECS};
use quick_xml::escape::escape;
use serde::Deserialize;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// A Space as returned by the account level bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<OffsetDateTime>,
}

/// An object as returned by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub key: String,
    pub last_modified: Option<OffsetDateTime>,
    /// Size in bytes of the object.
    pub size: Option<u64>,
    /// Presigned GET URL. Only valid for a limited time, do not store it.
    pub access_url: Option<String>,
}

/// Cross-origin rules of a bucket.
///
/// Renders as the `CORSConfiguration` document S3 expects for `PUT ?cors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfiguration {
    pub rules: Vec<CorsRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_seconds: Option<u32>,
}

impl CorsConfiguration {
    /// The one rule set `set_access_policy` applies: all browse and write
    /// methods for the given origins, cached for 3000 seconds.
    pub fn for_origins<S: AsRef<str>>(origins: &[S]) -> Self {
        Self {
            rules: vec![CorsRule {
                allowed_origins: origins.iter().map(|o| o.as_ref().to_string()).collect(),
                allowed_methods: CORS_ALLOWED_METHODS.iter().map(|m| m.to_string()).collect(),
                allowed_headers: vec!["*".to_string()],
                max_age_seconds: Some(CORS_MAX_AGE_SECS),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.to_string().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Display for CorsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<CORSRule>")?;
        for header in &self.allowed_headers {
            write!(f, "<AllowedHeader>{}</AllowedHeader>", escape(header.as_str()))?;
        }
        for method in &self.allowed_methods {
            write!(f, "<AllowedMethod>{}</AllowedMethod>", escape(method.as_str()))?;
        }
        for origin in &self.allowed_origins {
            write!(f, "<AllowedOrigin>{}</AllowedOrigin>", escape(origin.as_str()))?;
        }
        if let Some(max_age) = self.max_age_seconds {
            write!(f, "<MaxAgeSeconds>{}</MaxAgeSeconds>", max_age)?;
        }
        write!(f, "</CORSRule>")
    }
}

impl fmt::Display for CorsConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<CORSConfiguration>")?;
        for rule in &self.rules {
            write!(f, "{}", rule)?;
        }
        write!(f, "</CORSConfiguration>")
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value?, &Rfc3339).ok()
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ListAllMyBucketsResult {
    #[serde(rename = "Buckets", default)]
    pub buckets: BucketList,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct BucketList {
    #[serde(rename = "Bucket", default)]
    pub bucket: Vec<BucketEntry>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct BucketEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CreationDate")]
    pub creation_date: Option<String>,
}

impl From<BucketEntry> for Bucket {
    fn from(entry: BucketEntry) -> Self {
        Self {
            creation_date: parse_timestamp(entry.creation_date.as_deref()),
            name: entry.name,
        }
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ListBucketResult {
    #[serde(rename = "Name")]
    /// Name of the bucket.
    pub name: String,
    #[serde(rename = "Prefix")]
    /// Limits the response to keys that begin with the specified prefix.
    pub prefix: Option<String>,
    #[serde(default, rename = "IsTruncated")]
    ///  Specifies whether (true) or not (false) all of the results were returned.
    pub is_truncated: bool,
    #[serde(rename = "Contents", default)]
    /// Metadata about each object returned.
    pub contents: Vec<ObjectEntry>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ObjectEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "LastModified")]
    pub last_modified: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<u64>,
}

impl From<ObjectEntry> for StorageObject {
    fn from(entry: ObjectEntry) -> Self {
        Self {
            last_modified: parse_timestamp(entry.last_modified.as_deref()),
            key: entry.key,
            size: entry.size,
            access_url: None,
        }
    }
}

/// S3 `<Error>` body of a failed request
#[derive(Deserialize, Debug)]
pub(crate) struct ErrorResponse {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}
