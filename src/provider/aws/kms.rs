//! # AWS KMS Decryptor
//!
//! `Decryptor` implementation backed by AWS KMS `Decrypt`.

use crate::observability::metrics;
use crate::provider::{DecryptError, Decryptor};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client as KmsClient;
use std::time::Instant;
use zeroize::Zeroizing;

const SERVICE: &str = "kms";

/// AWS KMS provider implementation
#[derive(Clone)]
pub struct KmsDecryptor {
    client: KmsClient,
}

impl std::fmt::Debug for KmsDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsDecryptor").finish_non_exhaustive()
    }
}

impl KmsDecryptor {
    #[must_use]
    pub fn new(sdk_config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_kms::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: KmsClient::from_conf(builder.build()),
        }
    }
}

/// Sort KMS error codes into "wrong ciphertext for this key" and operational failures
fn classify_code(code: Option<&str>, detail: String) -> DecryptError {
    match code {
        Some("InvalidCiphertextException") => DecryptError::InvalidCiphertext(detail),
        Some("IncorrectKeyException") => DecryptError::IncorrectKey(detail),
        Some(
            "NotFoundException"
            | "DisabledException"
            | "KeyUnavailableException"
            | "KMSInvalidStateException"
            | "AccessDeniedException",
        ) => DecryptError::KeyUnavailable(detail),
        _ => DecryptError::Service(detail),
    }
}

fn classify<E>(err: &SdkError<E>) -> DecryptError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    metrics::increment_remote_call_errors(SERVICE);
    classify_code(err.code(), DisplayErrorContext(err).to_string())
}

#[async_trait]
impl Decryptor for KmsDecryptor {
    async fn decrypt(
        &self,
        key_id: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
        let start = Instant::now();
        let result = self
            .client
            .decrypt()
            .key_id(key_id)
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await;
        metrics::record_remote_call(SERVICE, "decrypt", start.elapsed().as_secs_f64());

        let output = result.map_err(|e| classify(&e))?;
        output
            .plaintext()
            .map(|blob| Zeroizing::new(blob.as_ref().to_vec()))
            .ok_or(DecryptError::EmptyPlaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_code_wrong_key_is_undecryptable() {
        assert!(classify_code(Some("IncorrectKeyException"), String::new()).is_undecryptable());
        assert!(
            classify_code(Some("InvalidCiphertextException"), String::new()).is_undecryptable()
        );
    }

    #[test]
    fn test_classify_code_operational_failures() {
        for code in ["AccessDeniedException", "DisabledException", "NotFoundException"] {
            let err = classify_code(Some(code), code.to_string());
            assert!(matches!(err, DecryptError::KeyUnavailable(_)), "{code}");
            assert!(!err.is_undecryptable());
        }
        assert!(matches!(
            classify_code(None, "dispatch failure".to_string()),
            DecryptError::Service(_)
        ));
    }
}
