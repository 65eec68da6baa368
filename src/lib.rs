// Copyright 2024 Sebastian Dobe <sebastiandobe@mailbox.org>

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

use base64::engine::general_purpose;
use base64::Engine;

/// The Spaces adapter, your main entrypoint
pub use crate::spaces::{Spaces, SpacesOptions};
/// Spaces Credentials
pub use crate::credentials::{AccessKeyId, AccessKeySecret, Credentials};
/// Error taxonomy and raw transport failures
pub use crate::error::{Operation, SpacesError, TransportError};
/// Regions and their resolved endpoints
pub use crate::region::{Endpoint, Region, SigningRegion};
/// Production reqwest based transport
pub use crate::client::{HttpConnector, HttpTransport};
/// Seam for custom or stub transports
pub use crate::transport::{Addressing, ClientSettings, Connect, Transport};
/// Listing results
pub use crate::types::{Bucket, CorsConfiguration, CorsRule, StorageObject};
pub use crate::constants::PRESIGNED_URL_EXPIRY_SECS;

mod client;
mod command;
mod constants;
mod credentials;
mod error;
pub mod prelude;
mod region;
mod signature;
mod spaces;
mod transport;
mod types;

fn md5_url_encode(s: &[u8]) -> String {
    general_purpose::STANDARD.encode(md5::compute(s).as_ref())
}
