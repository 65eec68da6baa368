use crate::error::SpacesError;
use std::env;
use std::fmt::{Debug, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyId(pub String);

impl AsRef<str> for AccessKeyId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl AccessKeyId {
    pub fn new(access_key_id: String) -> Self {
        Self(access_key_id)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeySecret(pub String);

impl Debug for AccessKeySecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessKeySecret(<hidden>)")
    }
}

impl AsRef<str> for AccessKeySecret {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl AccessKeySecret {
    pub fn new(access_key_secret: String) -> Self {
        Self(access_key_secret)
    }
}

/// Static Spaces access key pair.
///
/// Only ever held in memory for the lifetime of a session. The secret is
/// masked in `Debug` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: AccessKeyId,
    pub access_key_secret: AccessKeySecret,
}

impl Credentials {
    pub fn new<S>(key: S, secret: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            access_key_id: AccessKeyId(key.into()),
            access_key_secret: AccessKeySecret(secret.into()),
        }
    }

    /// Reads `SPACES_ACCESS_KEY_ID` and `SPACES_SECRET_ACCESS_KEY`
    pub fn try_from_env() -> Result<Self, SpacesError> {
        let access_key_id = env::var("SPACES_ACCESS_KEY_ID")?;
        let access_key_secret = env::var("SPACES_SECRET_ACCESS_KEY")?;

        Ok(Self {
            access_key_id: AccessKeyId(access_key_id),
            access_key_secret: AccessKeySecret(access_key_secret),
        })
    }
}
