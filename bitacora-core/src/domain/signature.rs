//! Signature domain model
//!
//! A signature is either captured in person (created already used, image
//! attached) or requested remotely through a single-use, token-addressed link.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use image::ImageFormat;
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Number of random bytes behind a link token
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub id: Uuid,
    pub token: String,
    /// Base64 PNG, None until the signature is drawn
    pub image: Option<String>,
    pub used: bool,
    pub url: Option<String>,
    /// Service log this signature belongs to, if any
    pub service_log_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Signature {
    /// Signature drawn on site; complete from the start
    pub fn in_person(image: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            token: generate_token(),
            image: Some(image),
            used: true,
            url: None,
            service_log_id: None,
            created_at: now,
            completed_at: Some(now),
        }
    }

    /// Draft waiting for a remote client to sign
    pub fn remote(links: &SignatureLinks, service_log_id: Option<Uuid>) -> Self {
        let token = generate_token();
        Self {
            id: Uuid::new_v4(),
            url: Some(links.link_for(&token)),
            token,
            image: None,
            used: false,
            service_log_id,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Fresh draft replacing an expired one, keeping the owner
    pub fn replacement(&self, links: &SignatureLinks) -> Self {
        Self::remote(links, self.service_log_id)
    }

    pub fn is_draft(&self) -> bool {
        !self.used && self.image.is_none()
    }

    /// A link is expired once its age reaches the validity window
    ///
    /// Inclusive: a link exactly `window` old is already expired.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.created_at) >= window
    }
}

/// Cryptographically random, URL-safe token
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Builds shareable `{base}/firmar/{token}` links
#[derive(Debug, Clone)]
pub struct SignatureLinks {
    base: Url,
}

impl SignatureLinks {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let base = Url::parse(base_url).map_err(|e| format!("invalid base url '{}': {}", base_url, e))?;
        if base.cannot_be_a_base() {
            return Err(format!("base url '{}' cannot carry a path", base_url));
        }
        Ok(Self { base })
    }

    pub fn link_for(&self, token: &str) -> String {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("firmar").push(token);
        }
        url.to_string()
    }
}

/// Why a submitted signature image was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRejection {
    Empty,
    NotBase64,
    NotPng,
    Undecodable,
    Blank,
}

impl ImageRejection {
    pub fn message(&self) -> &'static str {
        match self {
            ImageRejection::Empty => "signature image is empty",
            ImageRejection::NotBase64 => "signature image is not valid base64",
            ImageRejection::NotPng => "signature image must be a PNG",
            ImageRejection::Undecodable => "signature image could not be decoded",
            ImageRejection::Blank => "signature canvas is blank",
        }
    }
}

/// Submission gate for signature images
///
/// Accepts plain base64 or a `data:image/png;base64,` URL and returns the
/// bare base64 payload that gets stored.
pub fn check_signature_image(payload: &str) -> Result<String, ImageRejection> {
    let trimmed = payload.trim();
    let encoded = trimmed.strip_prefix(DATA_URL_PREFIX).unwrap_or(trimmed).trim();
    if encoded.is_empty() {
        return Err(ImageRejection::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| ImageRejection::NotBase64)?;
    if !bytes.starts_with(PNG_MAGIC) {
        return Err(ImageRejection::NotPng);
    }

    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|_| ImageRejection::Undecodable)?
        .to_rgba8();

    let mut pixels = decoded.pixels();
    let blank = match pixels.next() {
        None => true,
        Some(first) => {
            let all_transparent = first[3] == 0 && decoded.pixels().all(|p| p[3] == 0);
            all_transparent || pixels.all(|p| p == first)
        }
    };
    if blank {
        return Err(ImageRejection::Blank);
    }

    Ok(encoded.to_string())
}
