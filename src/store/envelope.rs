use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::asset::AssetKind;
use crate::errors::{Result, ThothError};

/// Wrapper stored in the ledger around every asset payload.
///
/// The payload is kept as raw JSON so that the bytes read back are exactly
/// the bytes written. JSON parsers drop the whitespace around a document, so
/// that whitespace is stored next to it.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredEnvelope {
    pub doc_type: String,
    pub asset: Box<RawValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub leading: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trailing: String,
}

fn is_json_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

impl StoredEnvelope {
    /// Wraps a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::BadRequest`] if `payload` is not a JSON document.
    pub fn wrap(kind: AssetKind, payload: Vec<u8>) -> Result<Self> {
        let text = String::from_utf8(payload)
            .map_err(|_| ThothError::BadRequest(format!("{} payload is not UTF-8", kind)))?;
        let document = text.trim_matches(is_json_whitespace);
        let start = text.len() - text.trim_start_matches(is_json_whitespace).len();
        let end = start + document.len();

        let asset = RawValue::from_string(document.to_string())
            .map_err(|e| ThothError::BadRequest(format!("{} payload is not JSON: {}", kind, e)))?;
        Ok(Self {
            doc_type: kind.as_str().to_string(),
            asset,
            leading: text[..start].to_string(),
            trailing: text[end..].to_string(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns `true` when the envelope holds an asset of `kind`.
    pub fn is_kind(&self, kind: AssetKind) -> bool {
        self.doc_type == kind.as_str()
    }

    /// The payload bytes, as given to [`StoredEnvelope::wrap`].
    pub fn payload(&self) -> Vec<u8> {
        let asset = self.asset.get();
        let mut payload = Vec::with_capacity(self.leading.len() + asset.len() + self.trailing.len());
        payload.extend_from_slice(self.leading.as_bytes());
        payload.extend_from_slice(asset.as_bytes());
        payload.extend_from_slice(self.trailing.as_bytes());
        payload
    }
}
