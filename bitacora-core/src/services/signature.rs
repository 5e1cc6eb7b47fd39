//! Signature workflow - remote links, token validation and finalization
//!
//! A remote signature starts as a draft addressed by a random token. When
//! the link is opened after the validity window, the draft is burned and
//! exactly one replacement is issued. Finalizing attaches the image once.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::signature::check_signature_image;
use crate::domain::{Signature, SignatureLinks};
use crate::ports::Repository;

use super::boundary::AtBoundary;
use super::logging::{LogEvent, LoggingService};

const INVALID_LINK: &str = "invalid or already-used link";

/// A freshly issued remote signature link
#[derive(Debug, Clone, Serialize)]
pub struct RemoteLink {
    pub id: Uuid,
    pub url: String,
}

/// Outcome of opening a signature link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenValidation {
    pub valid: bool,
    pub regenerated: bool,
    pub signature_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_url: Option<String>,
}

pub struct SignatureService {
    repository: Arc<dyn Repository>,
    links: SignatureLinks,
    validity: Duration,
    logger: Arc<LoggingService>,
}

impl SignatureService {
    pub fn new(
        repository: Arc<dyn Repository>,
        links: SignatureLinks,
        validity: Duration,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            links,
            validity,
            logger,
        }
    }

    /// Issue a draft signature and its link, optionally owned by a service log
    pub fn create_remote_link(&self, service_log_id: Option<Uuid>) -> Result<RemoteLink> {
        self.create_remote_link_checked(service_log_id)
            .at_boundary(&self.logger, "signature_link_failed")
    }

    fn create_remote_link_checked(&self, service_log_id: Option<Uuid>) -> Result<RemoteLink> {
        if let Some(log_id) = service_log_id {
            if self.repository.get_service_log(log_id)?.is_none() {
                return Err(Error::not_found(format!("service log {}", log_id)));
            }
        }

        let draft = Signature::remote(&self.links, service_log_id);
        self.repository.insert_signature(&draft)?;

        self.logger
            .record(LogEvent::new("signature_link_created").with_entity("signature", draft.id));
        Ok(RemoteLink {
            id: draft.id,
            url: draft.url.unwrap_or_else(|| self.links.link_for(&draft.token)),
        })
    }

    /// Check a token from an opened link
    ///
    /// An expired draft is burned and replaced; the caller gets the new
    /// link. Of several concurrent validations of the same expired token,
    /// only one produces a replacement and the others get `NotFound`.
    pub fn validate_token(&self, token: &str) -> Result<TokenValidation> {
        self.validate_token_checked(token)
            .at_boundary(&self.logger, "signature_validate_failed")
    }

    fn validate_token_checked(&self, token: &str) -> Result<TokenValidation> {
        let draft = self
            .repository
            .get_draft_by_token(token.trim())?
            .ok_or_else(|| Error::not_found(INVALID_LINK))?;

        if !draft.is_expired(Utc::now(), self.validity) {
            return Ok(TokenValidation {
                valid: true,
                regenerated: false,
                signature_id: draft.id,
                new_url: None,
            });
        }

        let replacement = draft.replacement(&self.links);
        if !self.repository.regenerate_signature(draft.id, &replacement)? {
            return Err(Error::not_found(INVALID_LINK));
        }

        self.logger.record(
            LogEvent::new("signature_regenerated").with_entity("signature", replacement.id),
        );
        Ok(TokenValidation {
            valid: false,
            regenerated: true,
            signature_id: replacement.id,
            new_url: replacement.url,
        })
    }

    /// Attach the client's image to a draft and link it to its service log
    pub fn finalize(&self, id: Uuid, image_base64: &str) -> Result<Signature> {
        self.finalize_checked(id, image_base64)
            .at_boundary(&self.logger, "signature_finalize_failed")
    }

    fn finalize_checked(&self, id: Uuid, image_base64: &str) -> Result<Signature> {
        let image = check_signature_image(image_base64)
            .map_err(|rejection| Error::invalid(rejection.message()))?;

        let signature = self
            .repository
            .get_signature(id)?
            .ok_or_else(|| Error::not_found(format!("signature {}", id)))?;
        if !signature.is_draft() {
            return Err(Error::conflict("signature has already been used"));
        }

        // A concurrent finalize may have won since the read above
        if !self.repository.complete_signature(id, &image, Utc::now())? {
            return Err(Error::conflict("signature has already been used"));
        }

        self.logger
            .record(LogEvent::new("signature_finalized").with_entity("signature", id));
        self.repository
            .get_signature(id)?
            .ok_or_else(|| Error::Internal(format!("signature {} vanished after completion", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signature::test_images;
    use crate::services::test_support::Fixture;

    fn service(fx: &Fixture) -> SignatureService {
        SignatureService::new(
            fx.repository(),
            SignatureLinks::new("https://service.example.com/app").unwrap(),
            fx.link_validity(),
            fx.logger.clone(),
        )
    }

    fn token_of(url: &str) -> &str {
        url.rsplit('/').next().unwrap()
    }

    #[test]
    fn test_link_shape() {
        let fx = Fixture::new();
        let link = service(&fx).create_remote_link(None).unwrap();

        assert!(link.url.starts_with("https://service.example.com/app/firmar/"));
        assert_eq!(token_of(&link.url).len(), 43);
    }

    #[test]
    fn test_link_for_unknown_log_is_not_found() {
        let fx = Fixture::new();
        let result = service(&fx).create_remote_link(Some(Uuid::new_v4()));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_validate_fresh_token_is_idempotent() {
        let fx = Fixture::new();
        let signatures = service(&fx);
        let link = signatures.create_remote_link(None).unwrap();

        let first = signatures.validate_token(token_of(&link.url)).unwrap();
        let second = signatures.validate_token(token_of(&link.url)).unwrap();

        assert!(first.valid && !first.regenerated);
        assert_eq!(first, second);
        assert_eq!(first.signature_id, link.id);
        assert_eq!(fx.repo.count_drafts(None).unwrap(), 1);
    }

    #[test]
    fn test_expired_token_is_replaced_once() {
        let fx = Fixture::new();
        let signatures = service(&fx);
        let links = SignatureLinks::new("https://service.example.com/app").unwrap();
        let mut stale = Signature::remote(&links, None);
        stale.created_at = Utc::now() - Duration::hours(3);
        fx.repo.insert_signature(&stale).unwrap();

        let outcome = signatures.validate_token(&stale.token).unwrap();
        assert!(!outcome.valid);
        assert!(outcome.regenerated);
        assert_ne!(outcome.signature_id, stale.id);

        // Old token is burned, new one is a live draft
        assert!(matches!(signatures.validate_token(&stale.token), Err(Error::NotFound(_))));
        let new_url = outcome.new_url.unwrap();
        assert!(signatures.validate_token(token_of(&new_url)).unwrap().valid);
        assert!(fx.repo.get_signature(stale.id).unwrap().unwrap().used);
    }

    #[test]
    fn test_finalize_once() {
        let fx = Fixture::new();
        let signatures = service(&fx);
        let link = signatures.create_remote_link(None).unwrap();

        let blank = signatures.finalize(link.id, &test_images::blank_png());
        assert!(matches!(blank, Err(Error::InvalidArgument(_))));

        let data_url = format!("data:image/png;base64,{}", test_images::stroke_png());
        let signed = signatures.finalize(link.id, &data_url).unwrap();
        assert!(signed.used);
        assert_eq!(signed.image.as_deref(), Some(test_images::stroke_png().as_str()));

        let again = signatures.finalize(link.id, &test_images::stroke_png());
        assert!(matches!(again, Err(Error::Conflict(_))));
        let unknown = signatures.finalize(Uuid::new_v4(), &test_images::stroke_png());
        assert!(matches!(unknown, Err(Error::NotFound(_))));
    }
}
