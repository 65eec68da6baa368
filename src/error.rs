use crate::region::Region;
use std::fmt;
use thiserror::Error;

/// Errors surfaced to the caller of [`Spaces`](crate::Spaces).
///
/// `Cors`, `Auth` and `Unknown` are the stable, user-facing classification of
/// remote failures. Their `Display` never contains raw transport details, which
/// are still reachable through `std::error::Error::source`.
#[derive(Error, Debug)]
pub enum SpacesError {
    #[error("client not initialized: call `initialize` first")]
    NotInitialized,
    #[error("bucket name must not be empty")]
    EmptyBucketName,
    #[error("unknown region: '{0}'")]
    UnknownRegion(String),
    #[error("region '{0}' has no signing region mapping")]
    UnmappedRegion(Region),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("env var missing: {0}")]
    EnvVarMissing(#[from] std::env::VarError),
    #[error("CORS error: please check the CORS configuration of your Space")]
    Cors {
        #[source]
        source: TransportError,
    },
    #[error("authentication failed: please check your access key and secret")]
    Auth {
        #[source]
        source: TransportError,
    },
    #[error("failed to {operation}, please try again")]
    Unknown {
        operation: Operation,
        #[source]
        source: TransportError,
    },
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

/// Raw failures of a [`Transport`](crate::Transport)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("fmt error: {0}")]
    FmtError(#[from] std::fmt::Error),
    #[error("header to string: {0}")]
    HeaderToStr(#[from] http::header::ToStrError),
    #[error("sha2 invalid length: {0}")]
    HmacInvalidLength(#[from] sha2::digest::InvalidLength),
    #[error("endpoint must contain a host: '{0}'")]
    HostMissing(String),
    #[error("Got HTTP {0} with content '{1}'")]
    HttpFailWithBody(u16, String),
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("{0}")]
    Message(String),
    #[error("request: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("serde xml: {0}")]
    SerdeXml(#[from] quick_xml::de::DeError),
    #[error("HTTP {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Time format error: {0}")]
    TimeFormatError(#[from] time::error::Format),
    #[error("url parse: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl TransportError {
    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpFailWithBody(status, _) | Self::Service { status, .. } => Some(*status),
            Self::Reqwest(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// S3 error code from the response body, if it could be parsed
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// What went wrong, without request URLs or raw response bodies.
    ///
    /// Bucket names, prefixes and error pages are not under the control of
    /// this crate and must not influence classification.
    pub(crate) fn reason(&self) -> String {
        match self {
            Self::Reqwest(err) => {
                let mut reason = err.to_string();
                if let Some(url) = err.url() {
                    let suffix = format!(" for url ({})", url);
                    if reason.ends_with(&suffix) {
                        reason.truncate(reason.len() - suffix.len());
                    }
                }
                let mut source = std::error::Error::source(err);
                while let Some(err) = source {
                    reason.push_str(": ");
                    reason.push_str(&err.to_string());
                    source = std::error::Error::source(err);
                }
                reason
            }
            Self::HttpFailWithBody(status, _) => format!("HTTP {}", status),
            Self::Service { code, message, .. } => format!("{}: {}", code, message),
            Self::HostMissing(_) => "endpoint must contain a host".to_string(),
            _ => self.to_string(),
        }
    }
}

/// The remote operation a classified error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListBuckets,
    ListObjects,
    SignUrls,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ListBuckets => f.write_str("list buckets"),
            Operation::ListObjects => f.write_str("list objects"),
            Operation::SignUrls => f.write_str("sign object URLs"),
        }
    }
}

const AUTH_ERROR_CODES: [&str; 5] = [
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "InvalidToken",
    "ExpiredToken",
    "AuthorizationHeaderMalformed",
];

/// Maps a transport failure onto the `Cors` / `Auth` / `Unknown` taxonomy.
///
/// Message matching on [`TransportError::reason`] comes first, "cors" before
/// "credential". Status codes and S3 error codes are only consulted when
/// neither substring matches.
pub(crate) fn classify(operation: Operation, source: TransportError) -> SpacesError {
    let reason = source.reason().to_lowercase();

    if reason.contains("cors") {
        return SpacesError::Cors { source };
    }
    if reason.contains("credential") {
        return SpacesError::Auth { source };
    }

    let auth_code = source
        .code()
        .map(|code| AUTH_ERROR_CODES.contains(&code))
        .unwrap_or(false);
    if auth_code || matches!(source.status(), Some(401 | 403)) {
        return SpacesError::Auth { source };
    }

    SpacesError::Unknown { operation, source }
}
