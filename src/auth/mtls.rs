//! Mutual-TLS client-certificate provider: identity fields are extracted
//! from an already-terminated client certificate, never from raw TLS
//! handshake bytes (certificate parsing and file I/O live with the
//! transport, not here).

use async_trait::async_trait;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

use super::AuthProvider;
use crate::config::{CredentialKind, MtlsProviderConfig};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::principal::Principal;

/// Identity fields extracted from a verified client certificate.
#[derive(Debug, Clone, Default)]
struct CertIdentity {
    common_name: Option<String>,
    spiffe_uri: Option<String>,
}

impl CertIdentity {
    fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Unauthorized(format!("failed to parse client certificate: {e}")))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let mut spiffe_uri = None;
        if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
            for name in &san_ext.value.general_names {
                if let GeneralName::URI(uri) = name {
                    if uri.starts_with("spiffe://") {
                        spiffe_uri = Some((*uri).to_owned());
                    }
                }
            }
        }

        Ok(Self { common_name, spiffe_uri })
    }

    fn subject_for(&self, field: &str) -> Option<String> {
        match field {
            "spiffe_uri" => self.spiffe_uri.clone().or_else(|| self.common_name.clone()),
            _ => self.common_name.clone(),
        }
    }
}

/// Authenticates via the TLS peer certificate chain established by the
/// transport layer (assumed already verified against a trust anchor before
/// this core ever sees the chain — certificate *chain validation* is a
/// transport concern, not this provider's).
pub struct MtlsProvider {
    config: MtlsProviderConfig,
}

impl MtlsProvider {
    /// Build a provider from configuration.
    #[must_use]
    pub fn new(config: MtlsProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AuthProvider for MtlsProvider {
    fn kind(&self) -> CredentialKind {
        CredentialKind::MutualTls
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Principal> {
        let Credential::PeerCertificate { chain } = credential else {
            return Err(Error::Internal(
                "MtlsProvider received a non-PeerCertificate credential".to_string(),
            ));
        };

        let leaf = chain
            .first()
            .ok_or_else(|| Error::Unauthorized("empty certificate chain".to_string()))?;
        let identity = CertIdentity::from_der(leaf)?;

        let subject = identity
            .subject_for(&self.config.subject_field)
            .ok_or_else(|| Error::Unauthorized("certificate carries no usable subject identity".to_string()))?;

        Ok(Principal::new(subject))
    }
}
