pub const LONG_DATE_TIME: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year][month][day]T[hour][minute][second]Z");
pub const EMPTY_PAYLOAD_SHA: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub const DEFAULT_DOMAIN: &str = "digitaloceanspaces.com";

/// Validity of the URLs handed out by `list_objects_with_signed_urls`
pub const PRESIGNED_URL_EXPIRY_SECS: u32 = 3600;

pub const CORS_ALLOWED_METHODS: [&str; 5] = ["GET", "PUT", "DELETE", "POST", "HEAD"];
pub const CORS_MAX_AGE_SECS: u32 = 3000;
