//! Common test utilities for reconciler integration tests
//!
//! Provides in-memory fakes for Parameter Store and KMS, plus helpers to
//! build ciphertexts and declarations.
//!
//! Fake ciphertexts are `kms|<key>|<plaintext>`, base64 encoded. The fake KMS
//! rejects them when decrypted under any other key.

#![allow(dead_code, reason = "Each test crate uses a different subset of helpers")]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use encrypted_ssm::config::ReconcilerConfig;
use encrypted_ssm::controller::reconciler::Reconciler;
use encrypted_ssm::provider::{
    Clients, DecryptError, Decryptor, Parameter, ParameterMetadata, ParameterStore,
    PutParameterInput, StoreError,
};
use encrypted_ssm::tags::{IgnoreConfig, KeyValueTags};
use encrypted_ssm::{DataType, ParameterSpec, ParameterType, Tier};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use zeroize::Zeroizing;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Base64 ciphertext the fake KMS decrypts to `plaintext` under `key`
pub fn encrypt(key: &str, plaintext: &str) -> String {
    STANDARD.encode(format!("kms|{key}|{plaintext}"))
}

pub fn spec(name: &str, key: &str, plaintext: &str) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        description: None,
        tier: Tier::Standard,
        r#type: ParameterType::SecureString,
        encrypted_value: encrypt(key, plaintext),
        encryption_key: key.to_string(),
        data_type: None,
        overwrite: None,
        allowed_pattern: None,
        tags: BTreeMap::new(),
    }
}

pub fn tag_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Production timings; tests that poll run on a paused clock
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        creation_validation_timeout: Duration::from_secs(120),
        poll_min: Duration::from_millis(500),
        poll_max: Duration::from_secs(10),
    }
}

pub fn reconciler(store: &Arc<FakeStore>, kms: &Arc<FakeKms>) -> Reconciler {
    reconciler_with_ignore(store, kms, None)
}

pub fn reconciler_with_ignore(
    store: &Arc<FakeStore>,
    kms: &Arc<FakeKms>,
    ignore: Option<IgnoreConfig>,
) -> Reconciler {
    let clients = Clients::new(Arc::clone(store) as _, Arc::clone(kms) as _);
    Reconciler::new(clients, test_config(), ignore)
}

/// A parameter as the fake store holds it
#[derive(Debug, Clone)]
pub struct StoredParameter {
    pub value: String,
    pub tier: Tier,
    pub version: i64,
    pub key_id: String,
    pub description: Option<String>,
    pub allowed_pattern: Option<String>,
    pub data_type: String,
}

/// Put call as observed by the fake store, minus the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub name: String,
    pub tier: Option<Tier>,
    pub overwrite: bool,
    pub description: Option<String>,
    pub key_id: String,
    pub data_type: Option<DataType>,
    pub allowed_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Put(PutRecord),
    Get(String),
    Describe(String),
    Delete(String),
    ListTags(String),
    AddTags(String, BTreeMap<String, String>),
    RemoveTags(String, Vec<String>),
}

#[derive(Debug, Default)]
struct StoreInner {
    parameters: BTreeMap<String, StoredParameter>,
    tags: BTreeMap<String, BTreeMap<String, String>>,
    calls: Vec<Call>,
    advanced_unsupported: bool,
    /// Gets that report not-found before the parameter becomes visible
    hidden_gets: u32,
    describe_empty: bool,
    failures: HashMap<&'static str, StoreError>,
}

/// In-memory Parameter Store
#[derive(Debug, Default)]
pub struct FakeStore {
    inner: Mutex<StoreInner>,
}

fn service_error(operation: &'static str, code: &str, message: &str) -> StoreError {
    StoreError::Service {
        operation,
        code: Some(code.to_string()),
        message: message.to_string(),
    }
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("fake store lock poisoned")
    }

    /// Seed a parameter that exists before any reconciler call
    pub fn seed(&self, name: &str, value: &str, tier: Tier, tags: &[(&str, &str)]) {
        let mut inner = self.lock();
        inner.parameters.insert(
            name.to_string(),
            StoredParameter {
                value: value.to_string(),
                tier,
                version: 1,
                key_id: "alias/aws/ssm".to_string(),
                description: None,
                allowed_pattern: None,
                data_type: "text".to_string(),
            },
        );
        inner.tags.insert(name.to_string(), tag_map(tags));
    }

    /// Change a stored value behind the reconciler's back
    pub fn set_value(&self, name: &str, value: &str) {
        if let Some(parameter) = self.lock().parameters.get_mut(name) {
            parameter.value = value.to_string();
        }
    }

    pub fn remove(&self, name: &str) {
        let mut inner = self.lock();
        inner.parameters.remove(name);
        inner.tags.remove(name);
    }

    pub fn reject_advanced_tier(&self) {
        self.lock().advanced_unsupported = true;
    }

    /// Report not-found for the next `count` gets
    pub fn hide_for_gets(&self, count: u32) {
        self.lock().hidden_gets = count;
    }

    pub fn describe_returns_nothing(&self) {
        self.lock().describe_empty = true;
    }

    /// Fail every call of `operation` (e.g. "put", "add_tags") with `error`
    pub fn fail(&self, operation: &'static str, error: StoreError) {
        self.lock().failures.insert(operation, error);
    }

    pub fn clear_failure(&self, operation: &'static str) {
        self.lock().failures.remove(operation);
    }

    pub fn parameter(&self, name: &str) -> Option<StoredParameter> {
        self.lock().parameters.get(name).cloned()
    }

    pub fn tags_of(&self, name: &str) -> BTreeMap<String, String> {
        self.lock().tags.get(name).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Put(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn injected(inner: &StoreInner, operation: &'static str) -> Result<(), StoreError> {
        match inner.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ParameterStore for FakeStore {
    async fn put_parameter(&self, input: &PutParameterInput) -> Result<i64, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Put(PutRecord {
            name: input.name.clone(),
            tier: input.tier,
            overwrite: input.overwrite,
            description: input.description.clone(),
            key_id: input.key_id.clone(),
            data_type: input.data_type,
            allowed_pattern: input.allowed_pattern.clone(),
        }));
        Self::injected(&inner, "put")?;

        if inner.advanced_unsupported && input.tier == Some(Tier::Advanced) {
            return Err(StoreError::TierNotSupported {
                message: "Tier is not supported for this account".to_string(),
            });
        }

        let existing = inner.parameters.get(&input.name).cloned();
        if existing.is_some() && !input.overwrite {
            return Err(service_error(
                "PutParameter",
                "ParameterAlreadyExists",
                "The parameter already exists. To overwrite this value, set the overwrite option in the request to true.",
            ));
        }

        let previous_tier = existing.as_ref().map_or(Tier::Standard, |p| p.tier);
        let tier = input.tier.unwrap_or(previous_tier);
        if previous_tier == Tier::Advanced && tier == Tier::Standard {
            return Err(service_error(
                "PutParameter",
                "ValidationException",
                "This parameter uses the advanced-parameter tier. You can't downgrade a parameter from the advanced-parameter tier to the standard-parameter tier.",
            ));
        }

        let version = existing.as_ref().map_or(1, |p| p.version + 1);
        let description = input
            .description
            .clone()
            .or_else(|| existing.as_ref().and_then(|p| p.description.clone()));
        let data_type = input
            .data_type
            .map(|d| d.as_str().to_string())
            .unwrap_or_else(|| "text".to_string());

        inner.parameters.insert(
            input.name.clone(),
            StoredParameter {
                value: input.value.to_string(),
                tier,
                version,
                key_id: input.key_id.clone(),
                description,
                allowed_pattern: Some(input.allowed_pattern.clone()),
                data_type,
            },
        );
        inner.tags.entry(input.name.clone()).or_default();
        Ok(version)
    }

    async fn get_parameter(
        &self,
        name: &str,
        _with_decryption: bool,
    ) -> Result<Parameter, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Get(name.to_string()));
        Self::injected(&inner, "get")?;

        if inner.hidden_gets > 0 {
            inner.hidden_gets -= 1;
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }

        let parameter = inner
            .parameters
            .get(name)
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })?;
        Ok(Parameter {
            name: name.to_string(),
            r#type: "SecureString".to_string(),
            value: Zeroizing::new(parameter.value.clone()),
            version: parameter.version,
            arn: Some(format!("arn:aws:ssm:eu-west-1:123456789012:parameter{name}")),
        })
    }

    async fn describe_parameter(
        &self,
        name: &str,
    ) -> Result<Option<ParameterMetadata>, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Describe(name.to_string()));
        Self::injected(&inner, "describe")?;

        if inner.describe_empty {
            return Ok(None);
        }
        Ok(inner.parameters.get(name).map(|p| ParameterMetadata {
            key_id: Some(p.key_id.clone()),
            description: p.description.clone(),
            tier: Some(p.tier),
            allowed_pattern: p.allowed_pattern.clone(),
            data_type: Some(p.data_type.clone()),
        }))
    }

    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Delete(name.to_string()));
        Self::injected(&inner, "delete")?;

        if inner.parameters.remove(name).is_none() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        inner.tags.remove(name);
        Ok(())
    }

    async fn list_tags(
        &self,
        identifier: &str,
        _resource_type: &str,
    ) -> Result<KeyValueTags, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(Call::ListTags(identifier.to_string()));
        Self::injected(&inner, "list_tags")?;
        Ok(KeyValueTags::from(
            &inner.tags.get(identifier).cloned().unwrap_or_default(),
        ))
    }

    async fn add_tags(
        &self,
        identifier: &str,
        _resource_type: &str,
        tags: &KeyValueTags,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .calls
            .push(Call::AddTags(identifier.to_string(), tags.map()));
        Self::injected(&inner, "add_tags")?;
        inner
            .tags
            .entry(identifier.to_string())
            .or_default()
            .extend(tags.map());
        Ok(())
    }

    async fn remove_tags(
        &self,
        identifier: &str,
        _resource_type: &str,
        keys: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .calls
            .push(Call::RemoveTags(identifier.to_string(), keys.to_vec()));
        Self::injected(&inner, "remove_tags")?;
        if let Some(tags) = inner.tags.get_mut(identifier) {
            for key in keys {
                tags.remove(key);
            }
        }
        Ok(())
    }
}

/// In-memory KMS for `kms|<key>|<plaintext>` blobs
#[derive(Debug, Default)]
pub struct FakeKms {
    disabled_keys: Mutex<BTreeSet<String>>,
    decrypts: Mutex<u32>,
}

impl FakeKms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn disable_key(&self, key: &str) {
        self.disabled_keys
            .lock()
            .expect("fake kms lock poisoned")
            .insert(key.to_string());
    }

    pub fn decrypt_count(&self) -> u32 {
        *self.decrypts.lock().expect("fake kms lock poisoned")
    }
}

#[async_trait]
impl Decryptor for FakeKms {
    async fn decrypt(
        &self,
        key_id: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
        *self.decrypts.lock().expect("fake kms lock poisoned") += 1;

        if self
            .disabled_keys
            .lock()
            .expect("fake kms lock poisoned")
            .contains(key_id)
        {
            return Err(DecryptError::KeyUnavailable(format!("{key_id} is disabled")));
        }

        let Some(rest) = ciphertext.strip_prefix(b"kms|") else {
            return Err(DecryptError::InvalidCiphertext(
                "ciphertext was not produced by KMS".to_string(),
            ));
        };
        let Some(split) = rest.iter().position(|b| *b == b'|') else {
            return Err(DecryptError::InvalidCiphertext("truncated ciphertext".to_string()));
        };
        let (key, plaintext) = (&rest[..split], &rest[split + 1..]);
        if key != key_id.as_bytes() {
            return Err(DecryptError::IncorrectKey(format!(
                "ciphertext was not encrypted under {key_id}"
            )));
        }
        Ok(Zeroizing::new(plaintext.to_vec()))
    }
}
