use crate::error::SpacesError;
use std::env;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// DigitalOcean Spaces region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Region {
    Tor1,
    #[default]
    Nyc3,
    Sfo2,
    Sfo3,
    Ams3,
    Sgp1,
    Fra1,
    Syd1,
    Blr1,
}

// Spaces region codes are not valid SigV4 regions. Anything missing here must
// fail instead of falling back, otherwise every request dies with a signature
// mismatch.
const SIGNING_REGIONS: [(Region, &str); 5] = [
    (Region::Tor1, "ca-central-1"),
    (Region::Nyc3, "us-east-1"),
    (Region::Sfo3, "us-west-1"),
    (Region::Ams3, "eu-west-1"),
    (Region::Sgp1, "ap-southeast-1"),
];

impl Region {
    pub const ALL: [Region; 9] = [
        Region::Tor1,
        Region::Nyc3,
        Region::Sfo2,
        Region::Sfo3,
        Region::Ams3,
        Region::Sgp1,
        Region::Fra1,
        Region::Syd1,
        Region::Blr1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Tor1 => "tor1",
            Region::Nyc3 => "nyc3",
            Region::Sfo2 => "sfo2",
            Region::Sfo3 => "sfo3",
            Region::Ams3 => "ams3",
            Region::Sgp1 => "sgp1",
            Region::Fra1 => "fra1",
            Region::Syd1 => "syd1",
            Region::Blr1 => "blr1",
        }
    }

    /// The region the request signature has to be scoped to
    pub fn signing_region(&self) -> Result<SigningRegion, SpacesError> {
        SIGNING_REGIONS
            .iter()
            .find(|(region, _)| region == self)
            .map(|(_, signing)| SigningRegion::new(*signing))
            .ok_or(SpacesError::UnmappedRegion(*self))
    }

    /// Reads `SPACES_REGION`, falling back to the default region when unset
    pub fn try_from_env() -> Result<Self, SpacesError> {
        match env::var("SPACES_REGION") {
            Ok(value) => value.parse(),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = SpacesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|region| region.as_str() == needle)
            .ok_or_else(|| SpacesError::UnknownRegion(s.to_string()))
    }
}

/// SigV4 region wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRegion(pub String);

impl SigningRegion {
    pub fn new<S>(region: S) -> Self
    where
        S: Into<String>,
    {
        Self(region.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Fully resolved connection target of a region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub region: Region,
    pub signing_region: SigningRegion,
    pub url: Url,
}

impl Endpoint {
    /// `https://{region}.{domain}` plus the signing region from the fixed table
    pub fn resolve(region: Region, domain: &str) -> Result<Self, SpacesError> {
        let signing_region = region.signing_region()?;
        let url = Url::parse(&format!("https://{}.{}", region.as_str(), domain))?;
        Ok(Self {
            region,
            signing_region,
            url,
        })
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}
