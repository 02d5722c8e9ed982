//! HTTP Basic provider.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AuthProvider, UserDirectory};
use crate::config::{BasicConfig, CredentialKind};
use crate::credential::Credential;
use crate::crypto;
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Verifies `Authorization: Basic` credentials against a [`UserDirectory`].
pub struct BasicProvider {
    directory: Arc<dyn UserDirectory>,
    config: BasicConfig,
}

impl BasicProvider {
    /// Build a provider backed by `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, config: BasicConfig) -> Self {
        Self { directory, config }
    }
}

#[async_trait]
impl AuthProvider for BasicProvider {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Basic
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let Credential::Basic { user, password } = credential else {
            return Err(Error::Internal(
                "BasicProvider received a non-Basic credential".to_string(),
            ));
        };

        if password.len() < self.config.min_password_length {
            return Err(Error::Unauthorized("credential rejected".to_string()));
        }

        let lookup_password = if self.config.hashing {
            crypto::digest_hex(password.as_bytes())
        } else {
            password.clone()
        };

        self.directory
            .verify_password(user, &lookup_password)
            .ok_or_else(|| Error::Unauthorized("invalid username or password".to_string()))
    }
}
