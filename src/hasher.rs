//! Reference-id hashing.
//!
//! A record's reference id is a keyed digest over the values of its `hash`
//! group fields, concatenated in group order with empty fields skipped. The id
//! links an Audit row to its Result row and must be identical for identical
//! inputs across runs and processes.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;

use crate::workbook::CellValue;

/// Digest used for the keyed reference id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    #[default]
    Sha1,
    Sha256,
}

/// Keyed digest over a record's identity fields.
#[derive(Debug, Clone)]
pub struct ReferenceHasher {
    secret: Vec<u8>,
    digest: DigestKind,
}

impl ReferenceHasher {
    pub fn new(secret: &str, digest: DigestKind) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            digest,
        }
    }

    /// Id for a record given the values of its hash fields, in group order.
    pub fn hash_values<'a, I>(&self, values: I) -> String
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let raw: String = values
            .into_iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect();
        self.hash_str(&raw)
    }

    /// Id for an already-concatenated identity string.
    pub fn hash_str(&self, raw: &str) -> String {
        let digest = match self.digest {
            DigestKind::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(&self.secret)
                    .expect("HMAC accepts keys of any length");
                mac.update(raw.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            DigestKind::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
                    .expect("HMAC accepts keys of any length");
                mac.update(raw.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        base64::engine::general_purpose::STANDARD
            .encode(digest)
            .trim_end_matches('=')
            .to_string()
    }
}
