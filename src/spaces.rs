use crate::client::HttpConnector;
use crate::constants::{DEFAULT_DOMAIN, PRESIGNED_URL_EXPIRY_SECS};
use crate::credentials::Credentials;
use crate::error::{classify, Operation, SpacesError};
use crate::region::{Endpoint, Region};
use crate::transport::{Addressing, ClientSettings, Connect, Transport};
use crate::types::{Bucket, CorsConfiguration, StorageObject};
use futures_util::future::try_join_all;
use parking_lot::RwLock;
use std::env;
use std::sync::Arc;
use tracing::debug;

/// Adapter wide settings
#[derive(Debug, Clone)]
pub struct SpacesOptions {
    /// Provider domain the region is prefixed with, `digitaloceanspaces.com`
    /// unless `SPACES_DOMAIN` says otherwise
    pub domain: String,
}

impl Default for SpacesOptions {
    fn default() -> Self {
        Self {
            domain: env::var("SPACES_DOMAIN").unwrap_or_else(|_| DEFAULT_DOMAIN.to_string()),
        }
    }
}

/// Handles created by one `initialize` call. Never mutated, only replaced.
#[derive(Debug)]
struct Session<T> {
    endpoint: Endpoint,
    /// account level requests like the bucket listing
    account: T,
    /// requests scoped to a single bucket
    bucket: T,
}

/// Browsing access to DigitalOcean Spaces, your main entrypoint.
///
/// Starts out uninitialized. [`Spaces::initialize`] binds credentials and a
/// region. It can be called again at any time and replaces the whole session
/// at once: calls already in flight finish with the session they started
/// with, every later call uses the new one.
#[derive(Debug)]
pub struct Spaces<C: Connect = HttpConnector> {
    connector: C,
    options: SpacesOptions,
    session: RwLock<Option<Arc<Session<C::Transport>>>>,
}

impl Spaces<HttpConnector> {
    pub fn new() -> Result<Self, SpacesError> {
        Self::with_options(SpacesOptions::default())
    }

    pub fn with_options(options: SpacesOptions) -> Result<Self, SpacesError> {
        Ok(Self::with_connector(HttpConnector::new()?, options))
    }

    /// Reads credentials and region from the environment and initializes
    /// right away. See [`Credentials::try_from_env`] and
    /// [`Region::try_from_env`].
    pub fn try_from_env() -> Result<Self, SpacesError> {
        let slf = Self::new()?;
        slf.initialize(Credentials::try_from_env()?, Some(Region::try_from_env()?))?;
        Ok(slf)
    }
}

impl<C: Connect> Spaces<C> {
    pub fn with_connector(connector: C, options: SpacesOptions) -> Self {
        Self {
            connector,
            options,
            session: RwLock::new(None),
        }
    }

    /// Binds `credentials` to `region` (default: nyc3).
    ///
    /// Does not talk to the remote side, invalid credentials only show up on
    /// the first listing. On error, the previous session is kept.
    pub fn initialize(
        &self,
        credentials: Credentials,
        region: Option<Region>,
    ) -> Result<(), SpacesError> {
        let region = region.unwrap_or_default();
        let endpoint = Endpoint::resolve(region, &self.options.domain)?;

        let account = self.connector.connect(ClientSettings {
            credentials: credentials.clone(),
            endpoint: endpoint.clone(),
            addressing: Addressing::Path,
        })?;
        let bucket = self.connector.connect(ClientSettings {
            credentials,
            endpoint: endpoint.clone(),
            addressing: Addressing::VirtualHosted,
        })?;

        debug!(
            "initialized session for {} at {} signing for {}",
            region,
            endpoint.url,
            endpoint.signing_region.as_str()
        );
        *self.session.write() = Some(Arc::new(Session {
            endpoint,
            account,
            bucket,
        }));

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn region(&self) -> Option<Region> {
        self.endpoint().map(|e| e.region)
    }

    /// Endpoint of the current session
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.session.read().as_ref().map(|s| s.endpoint.clone())
    }

    fn session(&self) -> Result<Arc<Session<C::Transport>>, SpacesError> {
        self.session
            .read()
            .as_ref()
            .cloned()
            .ok_or(SpacesError::NotInitialized)
    }

    /// All buckets of the account, in the order the service returns them
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, SpacesError> {
        let session = self.session()?;
        session.account.list_buckets().await.map_err(|err| {
            debug!("list buckets: {}", err);
            classify(Operation::ListBuckets, err)
        })
    }

    /// Objects in `bucket` whose key starts with `prefix`.
    ///
    /// An empty prefix lists the whole bucket. Only the first result page is
    /// returned.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObject>, SpacesError> {
        let session = self.session()?;
        Self::objects(&session, bucket, prefix).await
    }

    async fn objects(
        session: &Session<C::Transport>,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObject>, SpacesError> {
        if bucket.is_empty() {
            return Err(SpacesError::EmptyBucketName);
        }

        session
            .bucket
            .list_objects(bucket, prefix)
            .await
            .map_err(|err| {
                debug!("list objects in '{}': {}", bucket, err);
                classify(Operation::ListObjects, err)
            })
    }

    /// Same as [`Spaces::list_objects`], with an `access_url` valid for one
    /// hour on every object.
    ///
    /// URLs are signed concurrently. If signing fails for any object, the
    /// whole call fails and no objects are returned.
    #[tracing::instrument(level = "debug", skip_all, fields(bucket = bucket, prefix = prefix))]
    pub async fn list_objects_with_signed_urls(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObject>, SpacesError> {
        // listing and signing must use the same session
        let session = self.session()?;
        let mut objects = Self::objects(&session, bucket, prefix).await?;

        let urls = try_join_all(objects.iter().map(|object| {
            session
                .bucket
                .presign_get(bucket, &object.key, PRESIGNED_URL_EXPIRY_SECS)
        }))
        .await
        .map_err(|err| {
            debug!("sign object URLs in '{}': {}", bucket, err);
            classify(Operation::SignUrls, err)
        })?;

        for (object, url) in objects.iter_mut().zip(urls) {
            object.access_url = Some(url);
        }
        Ok(objects)
    }

    /// Replaces the CORS configuration of `bucket` with a single rule for
    /// `allowed_origins`. Remote errors are passed through as
    /// [`SpacesError::Transport`].
    pub async fn set_access_policy<S: AsRef<str>>(
        &self,
        bucket: &str,
        allowed_origins: &[S],
    ) -> Result<(), SpacesError> {
        let session = self.session()?;
        if bucket.is_empty() {
            return Err(SpacesError::EmptyBucketName);
        }

        let configuration = CorsConfiguration::for_origins(allowed_origins);
        session
            .bucket
            .put_bucket_cors(bucket, &configuration)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Connect {
            key_id: String,
            host: String,
            signing_region: String,
            addressing: Addressing,
        },
        ListBuckets {
            key_id: String,
        },
        ListObjects {
            key_id: String,
            bucket: String,
            prefix: String,
        },
        Presign {
            key_id: String,
            bucket: String,
            key: String,
            expires_secs: u32,
        },
        PutCors {
            bucket: String,
            origins: Vec<String>,
        },
    }

    #[derive(Debug, Default)]
    struct Script {
        buckets: Vec<Bucket>,
        objects: Vec<StorageObject>,
        fail_with: Option<String>,
        fail_signing_for: Option<String>,
    }

    #[derive(Debug, Default, Clone)]
    struct StubConnector {
        script: Arc<Mutex<Script>>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl StubConnector {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[derive(Debug)]
    struct StubTransport {
        key_id: String,
        script: Arc<Mutex<Script>>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl StubTransport {
        fn record(&self, call: Call) {
            self.calls.lock().push(call);
        }

        fn failure(&self) -> Result<(), TransportError> {
            match &self.script.lock().fail_with {
                Some(msg) => Err(TransportError::Message(msg.clone())),
                None => Ok(()),
            }
        }
    }

    impl Connect for StubConnector {
        type Transport = StubTransport;

        fn connect(&self, settings: ClientSettings) -> Result<StubTransport, TransportError> {
            let key_id = settings.credentials.access_key_id.0.clone();
            self.calls.lock().push(Call::Connect {
                key_id: key_id.clone(),
                host: settings.endpoint.host().to_string(),
                signing_region: settings.endpoint.signing_region.as_str().to_string(),
                addressing: settings.addressing,
            });
            Ok(StubTransport {
                key_id,
                script: self.script.clone(),
                calls: self.calls.clone(),
            })
        }
    }

    impl Transport for StubTransport {
        async fn list_buckets(&self) -> Result<Vec<Bucket>, TransportError> {
            self.record(Call::ListBuckets {
                key_id: self.key_id.clone(),
            });
            self.failure()?;
            Ok(self.script.lock().buckets.clone())
        }

        async fn list_objects(
            &self,
            bucket: &str,
            prefix: &str,
        ) -> Result<Vec<StorageObject>, TransportError> {
            self.record(Call::ListObjects {
                key_id: self.key_id.clone(),
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            });
            self.failure()?;
            Ok(self
                .script
                .lock()
                .objects
                .iter()
                .filter(|o| o.key.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn presign_get(
            &self,
            bucket: &str,
            key: &str,
            expires_secs: u32,
        ) -> Result<String, TransportError> {
            self.record(Call::Presign {
                key_id: self.key_id.clone(),
                bucket: bucket.to_string(),
                key: key.to_string(),
                expires_secs,
            });
            if self.script.lock().fail_signing_for.as_deref() == Some(key) {
                return Err(TransportError::Message(format!("cannot sign {}", key)));
            }
            Ok(format!(
                "https://{}.nyc3.digitaloceanspaces.com/{}?X-Amz-Expires={}",
                bucket, key, expires_secs
            ))
        }

        async fn put_bucket_cors(
            &self,
            bucket: &str,
            configuration: &CorsConfiguration,
        ) -> Result<(), TransportError> {
            self.record(Call::PutCors {
                bucket: bucket.to_string(),
                origins: configuration.rules[0].allowed_origins.clone(),
            });
            self.failure()
        }
    }

    fn object(key: &str) -> StorageObject {
        StorageObject {
            key: key.to_string(),
            last_modified: Some(datetime!(2024-03-01 10:15:30 UTC)),
            size: Some(1024),
            access_url: None,
        }
    }

    fn spaces() -> (Spaces<StubConnector>, StubConnector) {
        let connector = StubConnector::default();
        connector.script.lock().objects = vec![object("a.txt"), object("b.txt")];
        let options = SpacesOptions {
            domain: DEFAULT_DOMAIN.to_string(),
        };
        (Spaces::with_connector(connector.clone(), options), connector)
    }

    fn creds(key: &str) -> Credentials {
        Credentials::new(key, "secret-value-that-must-not-leak")
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let (spaces, connector) = spaces();
        assert!(!spaces.is_initialized());
        assert_eq!(spaces.region(), None);

        assert!(matches!(
            spaces.list_buckets().await,
            Err(SpacesError::NotInitialized)
        ));
        assert!(matches!(
            spaces.list_objects("demo", "").await,
            Err(SpacesError::NotInitialized)
        ));
        assert!(matches!(
            spaces.list_objects_with_signed_urls("demo", "").await,
            Err(SpacesError::NotInitialized)
        ));
        assert!(matches!(
            spaces.set_access_policy("demo", &["*"]).await,
            Err(SpacesError::NotInitialized)
        ));

        // nothing must have reached the transport layer
        assert_eq!(connector.calls(), Vec::new());
    }

    #[tokio::test]
    async fn test_initialize_resolves_endpoint() {
        let (spaces, connector) = spaces();
        spaces.initialize(creds("KEY1"), Some(Region::Tor1)).unwrap();

        assert!(spaces.is_initialized());
        assert_eq!(spaces.region(), Some(Region::Tor1));
        let endpoint = spaces.endpoint().unwrap();
        assert_eq!(endpoint.host(), "tor1.digitaloceanspaces.com");
        assert_eq!(endpoint.signing_region.as_str(), "ca-central-1");

        assert_eq!(
            connector.calls(),
            vec![
                Call::Connect {
                    key_id: "KEY1".to_string(),
                    host: "tor1.digitaloceanspaces.com".to_string(),
                    signing_region: "ca-central-1".to_string(),
                    addressing: Addressing::Path,
                },
                Call::Connect {
                    key_id: "KEY1".to_string(),
                    host: "tor1.digitaloceanspaces.com".to_string(),
                    signing_region: "ca-central-1".to_string(),
                    addressing: Addressing::VirtualHosted,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_initialize_default_region() {
        let (spaces, _) = spaces();
        spaces.initialize(creds("KEY1"), None).unwrap();
        assert_eq!(spaces.region(), Some(Region::Nyc3));
        assert_eq!(
            spaces.endpoint().unwrap().signing_region.as_str(),
            "us-east-1"
        );
    }

    #[tokio::test]
    async fn test_initialize_unmapped_region() {
        let (spaces, connector) = spaces();
        let res = spaces.initialize(creds("KEY1"), Some(Region::Fra1));
        assert!(matches!(res, Err(SpacesError::UnmappedRegion(Region::Fra1))));
        assert!(!spaces.is_initialized());
        assert_eq!(connector.calls(), Vec::new());

        // a failed re-initialization keeps the working session
        spaces.initialize(creds("KEY1"), Some(Region::Ams3)).unwrap();
        assert!(spaces.initialize(creds("KEY2"), Some(Region::Fra1)).is_err());
        assert_eq!(spaces.region(), Some(Region::Ams3));
    }

    #[tokio::test]
    async fn test_list_buckets_keeps_order() {
        let (spaces, connector) = spaces();
        let buckets = vec![
            Bucket {
                name: "zeta".to_string(),
                creation_date: Some(datetime!(2020-01-01 00:00:00 UTC)),
            },
            Bucket {
                name: "alpha".to_string(),
                creation_date: None,
            },
            Bucket {
                name: "mid".to_string(),
                creation_date: Some(datetime!(2023-06-30 12:00:00 UTC)),
            },
        ];
        connector.script.lock().buckets = buckets.clone();

        spaces.initialize(creds("KEY1"), None).unwrap();
        assert_eq!(spaces.list_buckets().await.unwrap(), buckets);
    }

    #[tokio::test]
    async fn test_list_objects_prefix_passthrough() {
        let (spaces, connector) = spaces();
        spaces.initialize(creds("KEY1"), None).unwrap();

        let all = spaces.list_objects("demo", "").await.unwrap();
        assert_eq!(all, vec![object("a.txt"), object("b.txt")]);

        let filtered = spaces.list_objects("demo", "a").await.unwrap();
        assert_eq!(filtered, vec![object("a.txt")]);

        let listings = connector
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::ListObjects { .. }))
            .collect::<Vec<_>>();
        assert_eq!(
            listings,
            vec![
                Call::ListObjects {
                    key_id: "KEY1".to_string(),
                    bucket: "demo".to_string(),
                    prefix: "".to_string(),
                },
                Call::ListObjects {
                    key_id: "KEY1".to_string(),
                    bucket: "demo".to_string(),
                    prefix: "a".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_objects_empty_bucket_name() {
        let (spaces, connector) = spaces();
        spaces.initialize(creds("KEY1"), None).unwrap();
        assert!(matches!(
            spaces.list_objects("", "").await,
            Err(SpacesError::EmptyBucketName)
        ));
        assert!(!connector
            .calls()
            .iter()
            .any(|c| matches!(c, Call::ListObjects { .. })));
    }

    #[tokio::test]
    async fn test_signed_urls() {
        let (spaces, connector) = spaces();
        spaces.initialize(creds("KEY1"), None).unwrap();

        let objects = spaces
            .list_objects_with_signed_urls("demo", "")
            .await
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(
            objects[0].access_url.as_deref(),
            Some("https://demo.nyc3.digitaloceanspaces.com/a.txt?X-Amz-Expires=3600")
        );
        assert_eq!(
            objects[1].access_url.as_deref(),
            Some("https://demo.nyc3.digitaloceanspaces.com/b.txt?X-Amz-Expires=3600")
        );

        let mut presigns = connector
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Presign { .. }))
            .collect::<Vec<_>>();
        presigns.sort_by_key(|c| format!("{:?}", c));
        assert_eq!(
            presigns,
            vec![
                Call::Presign {
                    key_id: "KEY1".to_string(),
                    bucket: "demo".to_string(),
                    key: "a.txt".to_string(),
                    expires_secs: 3600,
                },
                Call::Presign {
                    key_id: "KEY1".to_string(),
                    bucket: "demo".to_string(),
                    key: "b.txt".to_string(),
                    expires_secs: 3600,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_signed_urls_fail_as_a_whole() {
        let (spaces, connector) = spaces();
        connector.script.lock().fail_signing_for = Some("b.txt".to_string());
        spaces.initialize(creds("KEY1"), None).unwrap();

        let err = spaces
            .list_objects_with_signed_urls("demo", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SpacesError::Unknown {
                operation: Operation::SignUrls,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let cases = [
            ("Network failure: blocked by CORS policy", "cors"),
            ("The credential provided is not valid", "auth"),
            ("CORS check failed for credential header", "cors"),
            ("connection reset", "unknown"),
        ];

        for (msg, expected) in cases {
            let (spaces, connector) = spaces();
            connector.script.lock().fail_with = Some(msg.to_string());
            spaces.initialize(creds("KEY1"), None).unwrap();

            for err in [
                spaces.list_buckets().await.unwrap_err(),
                spaces.list_objects("demo", "").await.unwrap_err(),
            ] {
                let kind = match err {
                    SpacesError::Cors { .. } => "cors",
                    SpacesError::Auth { .. } => "auth",
                    SpacesError::Unknown { .. } => "unknown",
                    other => panic!("unexpected error: {:?}", other),
                };
                assert_eq!(kind, expected, "message: {}", msg);
            }
        }
    }

    #[tokio::test]
    async fn test_set_access_policy() {
        let (spaces, connector) = spaces();
        spaces.initialize(creds("KEY1"), None).unwrap();

        spaces
            .set_access_policy("demo", &["https://app.example.com"])
            .await
            .unwrap();
        assert_eq!(
            connector.calls().last(),
            Some(&Call::PutCors {
                bucket: "demo".to_string(),
                origins: vec!["https://app.example.com".to_string()],
            })
        );

        // administrative calls are not classified
        connector.script.lock().fail_with = Some("CORS request rejected".to_string());
        let err = spaces
            .set_access_policy("demo", &["https://app.example.com"])
            .await
            .unwrap_err();
        assert!(matches!(err, SpacesError::Transport(TransportError::Message(_))));
    }

    #[tokio::test]
    async fn test_reinitialize_replaces_credentials() {
        let (spaces, connector) = spaces();
        spaces.initialize(creds("OLD"), Some(Region::Nyc3)).unwrap();
        spaces.list_buckets().await.unwrap();

        spaces.initialize(creds("NEW"), Some(Region::Sgp1)).unwrap();
        connector.calls.lock().clear();

        spaces.list_buckets().await.unwrap();
        spaces.list_objects_with_signed_urls("demo", "").await.unwrap();

        let calls = connector.calls();
        assert_eq!(calls.len(), 4);
        for call in calls {
            let key_id = match call {
                Call::ListBuckets { key_id }
                | Call::ListObjects { key_id, .. }
                | Call::Presign { key_id, .. } => key_id,
                other => panic!("unexpected call: {:?}", other),
            };
            assert_eq!(key_id, "NEW");
        }
        assert_eq!(spaces.region(), Some(Region::Sgp1));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_secret_never_logged() {
        let (spaces, connector) = spaces();
        connector.script.lock().fail_with = Some("credential mismatch".to_string());
        spaces.initialize(creds("KEY1"), Some(Region::Sfo3)).unwrap();
        let _ = spaces.list_buckets().await;

        assert!(logs_contain("sfo3"));
        assert!(!logs_contain("secret-value-that-must-not-leak"));
    }

    #[traced_test]
    #[tokio::test]
    #[ignore = "needs SPACES_* credentials in .env"]
    async fn test_live_browse() -> Result<(), SpacesError> {
        dotenvy::dotenv().ok();
        let spaces = Spaces::try_from_env()?;

        let buckets = spaces.list_buckets().await?;
        if let Some(bucket) = buckets.first() {
            let objects = spaces
                .list_objects_with_signed_urls(&bucket.name, "")
                .await?;
            for object in objects {
                let url = object.access_url.unwrap();
                assert!(url.contains("X-Amz-Signature="));
                assert!(url.contains("X-Amz-Expires=3600"));
            }
        }

        Ok(())
    }
}
