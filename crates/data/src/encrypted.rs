// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symmetric encryption for key/value payloads.
//!
//! AES-256-GCM with a random 96-bit nonce prepended to each ciphertext.
//! SQL values pass through untouched; encrypting query parameters is the
//! caller's responsibility.

use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

const NONCE_LEN: usize = 12;

pub struct EncryptedData {
    inner: Arc<dyn DataClient>,
    cipher: Aes256Gcm,
}

impl EncryptedData {
    /// Key material: base64 of exactly 32 bytes, or any passphrase
    /// (hashed to 32 bytes).
    pub fn new(inner: Arc<dyn DataClient>, key_material: &str) -> Result<Self, DataError> {
        if key_material.is_empty() {
            return Err(DataError::Validation("encryption key must not be empty".into()));
        }
        let key_bytes: [u8; 32] = match BASE64.decode(key_material) {
            Ok(decoded) if decoded.len() == 32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(&decoded);
                key
            }
            _ => Sha256::digest(key_material.as_bytes()).into(),
        };
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        Ok(Self { inner, cipher })
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, DataError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| DataError::OperationFailed("encryption failed".into()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, DataError> {
        if payload.len() < NONCE_LEN {
            return Err(DataError::Validation("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| DataError::Validation("decryption failed (wrong key?)".into()))
    }
}

#[async_trait]
impl DataClient for EncryptedData {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        match self.inner.kv_get(key).await? {
            Some(payload) => Ok(Some(self.decrypt(&payload)?)),
            None => Ok(None),
        }
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let sealed = self.encrypt(&value)?;
        self.inner.kv_set(key, sealed, ttl).await
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        self.inner.kv_delete(key).await
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        self.inner.kv_exists(key).await
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        let sealed = self.inner.kv_get_many(keys).await?;
        sealed
            .into_iter()
            .map(|entry| entry.map(|payload| self.decrypt(&payload)).transpose())
            .collect()
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let sealed = pairs
            .into_iter()
            .map(|(k, v)| Ok((k, self.encrypt(&v)?)))
            .collect::<Result<Vec<_>, DataError>>()?;
        self.inner.kv_set_many(sealed, ttl).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
        self.inner.query(sql, params).await
    }

    async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        self.inner.query_single(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.inner.execute(sql, params).await
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        self.inner.execute_batch(statements).await
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        self.inner.begin().await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DataError> {
        self.inner.table_exists(table).await
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.inner.table_names().await
    }

    fn layer_names(&self) -> Vec<&'static str> {
        let mut names = vec!["encrypted"];
        names.extend(self.inner.layer_names());
        names
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
#[path = "encrypted_tests.rs"]
mod tests;
