//! Signed, expiring download links.
//!
//! A link carries `expires` (unix seconds) and `token`, the hex HMAC-SHA256 of
//! `"{artifact}:{expires}"` under the signing secret. Nothing is stored server
//! side: validity is recomputed from the secret, so rotating the secret is the
//! only way to revoke outstanding links.
//!
//! Without a secret the signer runs in *open* mode: it issues plain, unsigned
//! links (handy for local development) but rejects every token it is asked to
//! verify. Callers then need a different authorization path.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Route prefix download links point at.
pub const DEFAULT_DOWNLOAD_PATH: &str = "/download";

/// Upper bound on link lifetime (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkVerificationError {
    #[error("download signing is not configured")]
    NoSecret,

    #[error("token or expiry missing")]
    MissingToken,

    #[error("expiry is not a valid timestamp")]
    MalformedExpiry,

    #[error("link has expired")]
    Expired,

    #[error("token is not valid hex")]
    MalformedToken,

    #[error("token signature mismatch")]
    BadSignature,
}

/// The parameters of a signed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    pub artifact: String,
    pub expires: i64,
    pub token: String,
}

/// Issues and verifies download links for named artifacts.
#[derive(Clone)]
pub struct LinkSigner {
    keyed: Option<HmacSha256>,
    base_path: String,
}

impl core::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinkSigner")
            .field("signing", &self.is_signing())
            .field("base_path", &self.base_path)
            .finish()
    }
}

impl LinkSigner {
    /// Signer keyed with `secret`. An empty secret means open mode.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        // HMAC takes keys of any length, so only an empty secret yields `None`.
        let keyed = (!secret.is_empty())
            .then_some(secret)
            .and_then(|key| HmacSha256::new_from_slice(key).ok());
        Self {
            keyed,
            base_path: DEFAULT_DOWNLOAD_PATH.to_string(),
        }
    }

    /// Signer in open mode: unsigned links, every verification rejected.
    pub fn unsigned() -> Self {
        Self::new(b"")
    }

    /// Build from an optional configured secret (`None` or empty ⇒ open mode).
    pub fn from_secret(secret: Option<&str>) -> Self {
        Self::new(secret.unwrap_or_default())
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_signing(&self) -> bool {
        self.keyed.is_some()
    }

    /// Issue a link to `artifact` valid for `ttl_secs` from now.
    pub fn issue(&self, artifact: &str, ttl_secs: u64) -> String {
        self.issue_at(artifact, ttl_secs, Utc::now())
    }

    pub fn issue_at(&self, artifact: &str, ttl_secs: u64, now: DateTime<Utc>) -> String {
        let path = format!("{}/{}", self.base_path, urlencoding::encode(artifact));
        match self.sign_at(artifact, ttl_secs, now) {
            Some(link) => format!("{path}?expires={}&token={}", link.expires, link.token),
            None => path,
        }
    }

    /// Compute the link parameters, or `None` in open mode.
    pub fn sign_at(&self, artifact: &str, ttl_secs: u64, now: DateTime<Utc>) -> Option<SignedLink> {
        let keyed = self.keyed.as_ref()?;
        let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        let expires = (now + ttl).timestamp();

        let mut mac = keyed.clone();
        mac.update(canonical(artifact, expires).as_bytes());
        Some(SignedLink {
            artifact: artifact.to_string(),
            expires,
            token: hex::encode(mac.finalize().into_bytes()),
        })
    }

    /// Whether `token`/`expires` authorize access to `artifact` right now.
    pub fn verify(&self, artifact: &str, token: Option<&str>, expires: Option<&str>) -> bool {
        self.check_at(artifact, token, expires, Utc::now()).is_ok()
    }

    /// Same as [`verify`](Self::verify) but reports why a link was rejected.
    pub fn check_at(
        &self,
        artifact: &str,
        token: Option<&str>,
        expires: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LinkVerificationError> {
        let keyed = self.keyed.as_ref().ok_or(LinkVerificationError::NoSecret)?;

        let (Some(token), Some(expires)) = (token, expires) else {
            return Err(LinkVerificationError::MissingToken);
        };
        if token.is_empty() || expires.is_empty() {
            return Err(LinkVerificationError::MissingToken);
        }

        let expires: i64 = expires
            .trim()
            .parse()
            .map_err(|_| LinkVerificationError::MalformedExpiry)?;
        if expires <= 0 {
            return Err(LinkVerificationError::MalformedExpiry);
        }
        if now.timestamp() > expires {
            return Err(LinkVerificationError::Expired);
        }

        let provided = hex::decode(token).map_err(|_| LinkVerificationError::MalformedToken)?;

        let mut mac = keyed.clone();
        mac.update(canonical(artifact, expires).as_bytes());
        // `verify_slice` compares in constant time.
        mac.verify_slice(&provided)
            .map_err(|_| LinkVerificationError::BadSignature)
    }
}

fn canonical(artifact: &str, expires: i64) -> String {
    format!("{artifact}:{expires}")
}
