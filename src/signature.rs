use crate::constants::LONG_DATE_TIME;
use crate::credentials::{AccessKeyId, AccessKeySecret};
use crate::error::TransportError;
use crate::region::SigningRegion;
use bytes::BytesMut;
use hmac::Hmac;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::HeaderMap;
use reqwest::Url;
use sha2::digest::Mac;
use sha2::{Digest, Sha256};
use time::macros::format_description;
use time::OffsetDateTime;

const SHORT_DATE: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]");

const FRAGMENT: &AsciiSet = &CONTROLS
    // URL_RESERVED
    .add(b':')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b'@')
    .add(b'!')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b';')
    .add(b'=')
    // URL_UNSAFE
    .add(b'"')
    .add(b' ')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'`');

pub const FRAGMENT_SLASH: &AsciiSet = &FRAGMENT.add(b'/');

pub fn uri_encode(string: &str, encode_slash: bool) -> String {
    if encode_slash {
        utf8_percent_encode(string, FRAGMENT_SLASH).to_string()
    } else {
        utf8_percent_encode(string, FRAGMENT).to_string()
    }
}

fn canonical_uri_string(uri: &Url) -> String {
    // decode `Url`'s percent-encoding and then reencode it
    // according to AWS's rules
    let decoded = percent_encoding::percent_decode_str(uri.path()).decode_utf8_lossy();
    uri_encode(&decoded, false)
}

fn canonical_header_string(headers: &HeaderMap) -> Result<String, TransportError> {
    let mut keyvalues = Vec::with_capacity(12);
    for (key, value) in headers.iter() {
        keyvalues.push(format!(
            "{}:{}",
            key.as_str().to_lowercase(),
            value.to_str()?.trim()
        ))
    }
    keyvalues.sort();
    Ok(keyvalues.join("\n"))
}

fn canonical_query_string(uri: &Url) -> String {
    let mut keyvalues: Vec<(String, String)> = uri
        .query_pairs()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    keyvalues.sort();
    let keyvalues: Vec<String> = keyvalues
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, FRAGMENT_SLASH),
                utf8_percent_encode(v, FRAGMENT_SLASH)
            )
        })
        .collect();
    keyvalues.join("&")
}

pub fn signed_header_string(headers: &HeaderMap) -> String {
    let mut keys = headers
        .keys()
        .map(|key| key.as_str().to_lowercase())
        .collect::<Vec<String>>();
    keys.sort();
    keys.join(";")
}

pub fn canonical_request(
    method: &http::Method,
    host: &Url,
    headers: &HeaderMap,
    sha256: &str,
) -> Result<String, TransportError> {
    Ok(format!(
        "{}\n{}\n{}\n{}\n\n{}\n{}",
        method.as_str(),
        canonical_uri_string(host),
        canonical_query_string(host),
        canonical_header_string(headers)?,
        signed_header_string(headers),
        sha256
    ))
}

fn scope_string(
    datetime: &OffsetDateTime,
    region: &SigningRegion,
) -> Result<String, TransportError> {
    Ok(format!(
        "{}/{}/s3/aws4_request",
        datetime.format(SHORT_DATE)?,
        region.as_str(),
    ))
}

pub fn string_to_sign(
    datetime: &OffsetDateTime,
    region: &SigningRegion,
    canonical_req: &[u8],
) -> Result<String, TransportError> {
    let mut hasher = Sha256::default();
    hasher.update(canonical_req);
    let string_to = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        datetime.format(LONG_DATE_TIME)?,
        scope_string(datetime, region)?,
        hex::encode(hasher.finalize().as_slice())
    );
    Ok(string_to)
}

pub fn signing_key(
    datetime: &OffsetDateTime,
    secret_key: &AccessKeySecret,
    region: &SigningRegion,
) -> Result<Vec<u8>, TransportError> {
    let mut secret = BytesMut::with_capacity(72);
    secret.extend(b"AWS4");
    secret.extend(secret_key.as_ref().as_bytes());

    let mut date_hmac = Hmac::<Sha256>::new_from_slice(secret.as_ref())?;
    date_hmac.update(datetime.format(SHORT_DATE)?.as_bytes());

    let mut region_hmac = Hmac::<Sha256>::new_from_slice(&date_hmac.finalize().into_bytes())?;
    region_hmac.update(region.as_str().as_bytes());

    let mut service_hmac = Hmac::<Sha256>::new_from_slice(&region_hmac.finalize().into_bytes())?;
    service_hmac.update(b"s3");

    let mut signing_hmac = Hmac::<Sha256>::new_from_slice(&service_hmac.finalize().into_bytes())?;
    signing_hmac.update(b"aws4_request");

    Ok(signing_hmac.finalize().into_bytes().to_vec())
}

pub fn authorization_header(
    access_key: &AccessKeyId,
    datetime: &OffsetDateTime,
    region: &SigningRegion,
    signed_headers: &str,
    signature: &str,
) -> Result<String, TransportError> {
    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={}/{},\
            SignedHeaders={},Signature={}",
        access_key.as_ref(),
        scope_string(datetime, region)?,
        signed_headers,
        signature,
    ))
}

/// Query parameters of a presigned request, without the signature itself.
///
/// Only the `host` header is signed.
pub fn authorization_query_params_no_sig(
    access_key: &AccessKeyId,
    datetime: &OffsetDateTime,
    region: &SigningRegion,
    expires: u32,
) -> Result<Vec<(&'static str, String)>, TransportError> {
    let credentials = format!(
        "{}/{}",
        access_key.as_ref(),
        scope_string(datetime, region)?
    );

    Ok(vec![
        ("X-Amz-Algorithm", "AWS4-HMAC-SHA256".to_string()),
        ("X-Amz-Credential", credentials),
        ("X-Amz-Date", datetime.format(LONG_DATE_TIME)?),
        ("X-Amz-Expires", expires.to_string()),
        ("X-Amz-SignedHeaders", "host".to_string()),
    ])
}

/// Hex encoded HMAC of the string to sign
pub fn signature(signing_key: &[u8], string_to_sign: &str) -> Result<String, TransportError> {
    let mut hmac = Hmac::<Sha256>::new_from_slice(signing_key)?;
    hmac.update(string_to_sign.as_bytes());
    Ok(hex::encode(hmac.finalize().into_bytes()))
}
