use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::region::Endpoint;
use crate::types::{Bucket, CorsConfiguration, StorageObject};
use std::fmt::Debug;
use std::future::Future;

/// How bucket names end up in request URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `https://{endpoint}/{bucket}/{key}`
    Path,
    /// `https://{bucket}.{endpoint}/{key}`
    VirtualHosted,
}

/// Everything a connector needs to build one client handle
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub credentials: Credentials,
    pub endpoint: Endpoint,
    pub addressing: Addressing,
}

/// One authenticated client handle, bound to a single set of credentials and
/// a single endpoint for its whole lifetime.
pub trait Transport: Debug + Send + Sync + 'static {
    fn list_buckets(&self) -> impl Future<Output = Result<Vec<Bucket>, TransportError>> + Send;

    /// First page of the bucket listing, filtered server side by `prefix`
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<StorageObject>, TransportError>> + Send;

    /// URL granting GET access to `key` for `expires_secs` seconds
    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u32,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    fn put_bucket_cors(
        &self,
        bucket: &str,
        configuration: &CorsConfiguration,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Builds [`Transport`] handles. Must not do any network I/O.
pub trait Connect: Send + Sync {
    type Transport: Transport;

    fn connect(&self, settings: ClientSettings) -> Result<Self::Transport, TransportError>;
}
