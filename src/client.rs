use crate::command::Command;
use crate::constants::LONG_DATE_TIME;
use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::region::SigningRegion;
use crate::transport::{Addressing, ClientSettings, Connect, Transport};
use crate::types::{
    Bucket, CorsConfiguration, ErrorResponse, ListAllMyBucketsResult, ListBucketResult,
    StorageObject,
};
use crate::{md5_url_encode, signature};
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HOST};
use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Response;
use std::env;
use std::time::Duration;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;
use tracing::{debug, error};
use url::Url;

/// Production [`Connect`] implementation.
///
/// Holds one `reqwest::Client`, shared by every handle it creates, so the
/// connection pool survives re-initialization.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// `SPACES_DANGER_ALLOW_INSECURE=true` disables certificate validation.
    pub fn new() -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .brotli(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(600));
        #[cfg(feature = "rustls-tls")]
        {
            builder = builder.use_rustls_tls();
        }
        if env::var("SPACES_DANGER_ALLOW_INSECURE").as_deref() == Ok("true") {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Connect for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self, settings: ClientSettings) -> Result<HttpTransport, TransportError> {
        HttpTransport::new(self.client.clone(), settings)
    }
}

/// SigV4 signing S3 client bound to one endpoint and one set of credentials
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: Url,
    signing_region: SigningRegion,
    credentials: Credentials,
    addressing: Addressing,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, settings: ClientSettings) -> Result<Self, TransportError> {
        let host = settings.endpoint.url;
        if host.host_str().is_none() {
            return Err(TransportError::HostMissing(host.to_string()));
        }
        Ok(Self {
            client,
            host,
            signing_region: settings.endpoint.signing_region,
            credentials: settings.credentials,
            addressing: settings.addressing,
        })
    }

    fn host_domain(&self) -> String {
        let host_str = self.host.host_str().unwrap_or_default();
        if let Some(port) = self.host.port() {
            format!("{}:{}", host_str, port)
        } else {
            host_str.to_string()
        }
    }

    async fn send_request(
        &self,
        command: Command<'_>,
        bucket: Option<&str>,
        path: &str,
    ) -> Result<Response, TransportError> {
        let url = self.build_url(&command, bucket, path)?;
        let headers = self.build_headers(&command, &url, OffsetDateTime::now_utc())?;

        let res = self
            .client
            .request(command.http_method(), url)
            .headers(headers)
            .body(command.body())
            .send()
            .await?;

        if res.status().is_success() {
            Ok(res)
        } else {
            Err(Self::error_from_response(res).await)
        }
    }

    async fn error_from_response(res: Response) -> TransportError {
        let status = res.status().as_u16();
        match res.text().await {
            Ok(body) => error_from_body(status, &body),
            Err(err) => err.into(),
        }
    }

    fn build_headers(
        &self,
        command: &Command<'_>,
        url: &Url,
        now: OffsetDateTime,
    ) -> Result<HeaderMap, TransportError> {
        let cmd_hash = command.sha256();

        let mut headers = HeaderMap::with_capacity(6);
        headers.insert(HOST, host_header(url)?);

        if let Command::PutBucketCors { configuration } = command {
            headers.insert(
                CONTENT_LENGTH,
                HeaderValue::try_from(command.content_length().to_string())?,
            );
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(command.content_type())?);
            // S3 rejects PutBucketCors without it
            headers.insert(
                HeaderName::from_static("content-md5"),
                HeaderValue::try_from(md5_url_encode(configuration.to_string().as_bytes()))?,
            );
        }

        // hash and date
        headers.insert(
            HeaderName::from_static("x-amz-content-sha256"),
            HeaderValue::from_str(&cmd_hash)?,
        );
        headers.insert(
            HeaderName::from_static("x-amz-date"),
            HeaderValue::try_from(now.format(LONG_DATE_TIME)?)?,
        );

        // sign all the above headers with the secret
        let canonical_request =
            signature::canonical_request(&command.http_method(), url, &headers, &cmd_hash)?;
        let string_to_sign =
            signature::string_to_sign(&now, &self.signing_region, canonical_request.as_bytes())?;
        let signing_key =
            signature::signing_key(&now, &self.credentials.access_key_secret, &self.signing_region)?;
        let signature = signature::signature(&signing_key, &string_to_sign)?;
        let signed_header = signature::signed_header_string(&headers);
        let authorization = signature::authorization_header(
            &self.credentials.access_key_id,
            &now,
            &self.signing_region,
            &signed_header,
            &signature,
        )?;
        headers.insert(AUTHORIZATION, HeaderValue::try_from(authorization)?);

        // The format of RFC2822 is somewhat malleable, so including it in
        // signed headers can cause signature mismatches. X-Amz-Date is signed
        // instead, this one is added after the Authorization header on purpose.
        headers.insert(DATE, HeaderValue::try_from(now.format(&Rfc2822)?)?);

        Ok(headers)
    }

    fn build_url(
        &self,
        command: &Command<'_>,
        bucket: Option<&str>,
        path: &str,
    ) -> Result<Url, TransportError> {
        let mut url = match (bucket, self.addressing) {
            (None, _) => format!("{}://{}", self.host.scheme(), self.host_domain()),
            (Some(bucket), Addressing::Path) => format!(
                "{}://{}/{}",
                self.host.scheme(),
                self.host_domain(),
                bucket
            ),
            (Some(bucket), Addressing::VirtualHosted) => format!(
                "{}://{}.{}",
                self.host.scheme(),
                bucket,
                self.host_domain()
            ),
        };

        let path = path.strip_prefix('/').unwrap_or(path);
        url.push('/');
        url.push_str(&signature::uri_encode(path, false));

        let mut url = Url::parse(&url)?;

        match command {
            Command::ListObjectsV2 { prefix } => {
                let mut query_pairs = url.query_pairs_mut();
                query_pairs.append_pair("list-type", "2");
                query_pairs.append_pair("prefix", prefix);
            }
            Command::PutBucketCors { .. } => {
                url.query_pairs_mut().append_pair("cors", "");
            }
            Command::ListBuckets | Command::GetObject => {}
        }

        Ok(url)
    }

    /// Query string signed GET URL for `key`, valid `expires_secs` from `now`
    pub(crate) fn presign_url(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u32,
        now: OffsetDateTime,
    ) -> Result<Url, TransportError> {
        let command = Command::GetObject;
        let mut url = self.build_url(&command, Some(bucket), key)?;

        let params = signature::authorization_query_params_no_sig(
            &self.credentials.access_key_id,
            &now,
            &self.signing_region,
            expires_secs,
        )?;
        url.query_pairs_mut().extend_pairs(params.iter());

        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(HOST, host_header(&url)?);

        let canonical_request = signature::canonical_request(
            &command.http_method(),
            &url,
            &headers,
            &command.sha256(),
        )?;
        let string_to_sign =
            signature::string_to_sign(&now, &self.signing_region, canonical_request.as_bytes())?;
        let signing_key =
            signature::signing_key(&now, &self.credentials.access_key_secret, &self.signing_region)?;
        let signature = signature::signature(&signing_key, &string_to_sign)?;

        url.query_pairs_mut().append_pair("X-Amz-Signature", &signature);
        Ok(url)
    }
}

/// S3 `<Error>` documents become [`TransportError::Service`], anything else
/// is kept verbatim.
fn error_from_body(status: u16, body: &str) -> TransportError {
    match quick_xml::de::from_str::<ErrorResponse>(body) {
        Ok(err) => TransportError::Service {
            status,
            code: err.code,
            message: err.message,
        },
        Err(_) => TransportError::HttpFailWithBody(status, body.to_string()),
    }
}

fn host_header(url: &Url) -> Result<HeaderValue, TransportError> {
    let host = url
        .host_str()
        .ok_or_else(|| TransportError::HostMissing(url.to_string()))?;
    let value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok(HeaderValue::try_from(value)?)
}

impl Transport for HttpTransport {
    #[tracing::instrument(level = "debug", skip_all)]
    async fn list_buckets(&self) -> Result<Vec<Bucket>, TransportError> {
        let res = self.send_request(Command::ListBuckets, None, "/").await?;
        let result: ListAllMyBucketsResult =
            quick_xml::de::from_reader(res.bytes().await?.as_ref())?;
        debug!("received {} buckets", result.buckets.bucket.len());

        Ok(result.buckets.bucket.into_iter().map(Bucket::from).collect())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(bucket = bucket, prefix = prefix))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObject>, TransportError> {
        let res = self
            .send_request(Command::ListObjectsV2 { prefix }, Some(bucket), "/")
            .await?;
        let result: ListBucketResult = quick_xml::de::from_reader(res.bytes().await?.as_ref())?;
        if result.is_truncated {
            debug!(
                "listing of '{}' is truncated, only the first {} objects are returned",
                result.name,
                result.contents.len()
            );
        }

        Ok(result.contents.into_iter().map(StorageObject::from).collect())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u32,
    ) -> Result<String, TransportError> {
        let url = self.presign_url(bucket, key, expires_secs, OffsetDateTime::now_utc())?;
        Ok(url.into())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(bucket = bucket))]
    async fn put_bucket_cors(
        &self,
        bucket: &str,
        configuration: &CorsConfiguration,
    ) -> Result<(), TransportError> {
        if let Err(err) = self
            .send_request(Command::PutBucketCors { configuration }, Some(bucket), "/")
            .await
        {
            error!("updating the CORS configuration failed: {}", err);
            return Err(err);
        }
        Ok(())
    }
}
