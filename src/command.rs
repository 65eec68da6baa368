use crate::constants::{EMPTY_PAYLOAD_SHA, UNSIGNED_PAYLOAD};
use crate::types::CorsConfiguration;
use sha2::{Digest, Sha256};

#[derive(Debug)]
pub(crate) enum Command<'a> {
    ListBuckets,
    ListObjectsV2 {
        prefix: &'a str,
    },
    /// Only ever presigned, never sent by this crate
    GetObject,
    PutBucketCors {
        configuration: &'a CorsConfiguration,
    },
}

impl<'a> Command<'a> {
    pub(crate) fn http_method(&self) -> http::Method {
        match *self {
            Command::ListBuckets | Command::ListObjectsV2 { .. } | Command::GetObject => {
                http::Method::GET
            }
            Command::PutBucketCors { .. } => http::Method::PUT,
        }
    }

    pub(crate) fn content_length(&self) -> usize {
        match &self {
            Command::PutBucketCors { configuration } => configuration.len(),
            _ => 0,
        }
    }

    pub(crate) fn content_type(&self) -> &str {
        match self {
            Command::PutBucketCors { .. } => "application/xml",
            _ => "text/plain",
        }
    }

    pub(crate) fn body(&self) -> Vec<u8> {
        match self {
            Command::PutBucketCors { configuration } => configuration.to_string().into_bytes(),
            _ => Vec::default(),
        }
    }

    pub(crate) fn sha256(&self) -> String {
        match &self {
            Command::PutBucketCors { configuration } => {
                let mut sha = Sha256::default();
                sha.update(configuration.to_string().as_bytes());
                hex::encode(sha.finalize().as_slice())
            }
            Command::GetObject => UNSIGNED_PAYLOAD.into(),
            _ => EMPTY_PAYLOAD_SHA.into(),
        }
    }
}
