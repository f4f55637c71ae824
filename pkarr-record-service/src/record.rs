//!
//! The pkarr record in its three shapes: the inbound publish request, the
//! durable at-rest form, and the resolved response handed back to callers.
//!

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::Signature;
use pkarr::PublicKey;
use serde::{Deserialize, Serialize};

/// Maximum payload size in bytes a record may carry.
pub const MAX_PAYLOAD_SIZE: usize = 1000;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("signature is invalid")]
    InvalidSignature,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordDecodeError {
    #[error("invalid base64 field: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("field has the wrong length: {0}")]
    WrongLength(&'static str),
    #[error("invalid public key: {0}")]
    PublicKey(String),
    #[error("invalid cache entry: {0}")]
    Json(#[from] serde_json::Error),
}

/// The canonical BEP44 signable encoding of `(seq, value)` with an optional
/// salt: `[4:salt{n}:{salt}]3:seqi{seq}e1:v{n}:{value}`.
pub fn signable(seq: i64, payload: &[u8], salt: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 32);
    if let Some(salt) = salt {
        out.extend_from_slice(format!("4:salt{}:", salt.len()).as_bytes());
        out.extend_from_slice(salt);
    }
    out.extend_from_slice(format!("3:seqi{}e1:v{}:", seq, payload.len()).as_bytes());
    out.extend_from_slice(payload);
    out
}

/// A request to publish a pkarr record.
///
/// The record's external ID is the z-base-32 encoding of `public_key`,
/// which [PublicKey] renders via `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecordRequest {
    pub public_key: PublicKey,
    pub payload: Vec<u8>,
    pub signature: [u8; 64],
    pub seq: i64,
}

impl PublishRecordRequest {
    /// Checks the request for missing fields and verifies the signature
    /// against the canonical `(seq, payload)` encoding.
    ///
    /// This is the only admission gate: a request that fails here must
    /// never reach the store, the cache, or the DHT.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.payload.is_empty() {
            return Err(ValidationError::InvalidRequest("payload is required"));
        }
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ValidationError::InvalidRequest(
                "payload exceeds the record size limit",
            ));
        }
        if self.signature == [0u8; 64] {
            return Err(ValidationError::InvalidRequest("signature is required"));
        }
        if self.seq == 0 {
            return Err(ValidationError::InvalidRequest(
                "sequence number is required",
            ));
        }

        let signature = Signature::from_bytes(&self.signature);
        self.public_key
            .verify(&signable(self.seq, &self.payload, None), &signature)
            .map_err(|_| ValidationError::InvalidSignature)
    }

    /// The at-rest form of this request.
    pub fn to_record(&self, last_published_at: u64) -> PkarrRecord {
        PkarrRecord {
            k: URL_SAFE_NO_PAD.encode(self.public_key.as_bytes()),
            v: URL_SAFE_NO_PAD.encode(&self.payload),
            sig: URL_SAFE_NO_PAD.encode(self.signature),
            seq: self.seq,
            last_published_at,
        }
    }

    pub fn to_resolved(&self) -> ResolvedRecord {
        ResolvedRecord {
            payload: self.payload.clone(),
            seq: self.seq,
            signature: self.signature,
        }
    }
}

/// The durable, canonical form of a record.
///
/// `v`, `k` and `sig` are unpadded URL-safe base64; `last_published_at` is
/// the microsecond timestamp of the most recent DHT announcement and is the
/// only field a republish tick may touch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PkarrRecord {
    pub v: String,
    pub k: String,
    pub sig: String,
    pub seq: i64,
    pub last_published_at: u64,
}

impl PkarrRecord {
    pub fn public_key(&self) -> Result<PublicKey, RecordDecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(&self.k)?;
        PublicKey::try_from(bytes.as_slice())
            .map_err(|e| RecordDecodeError::PublicKey(e.to_string()))
    }

    pub fn payload(&self) -> Result<Vec<u8>, RecordDecodeError> {
        Ok(URL_SAFE_NO_PAD.decode(&self.v)?)
    }

    pub fn signature(&self) -> Result<[u8; 64], RecordDecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(&self.sig)?;
        bytes
            .try_into()
            .map_err(|_| RecordDecodeError::WrongLength("signature must be 64 bytes"))
    }

    pub fn to_resolved(&self) -> Result<ResolvedRecord, RecordDecodeError> {
        Ok(ResolvedRecord {
            payload: self.payload()?,
            seq: self.seq,
            signature: self.signature()?,
        })
    }
}

/// What a successful resolution returns: the payload plus the signature
/// material a client needs to verify it independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub payload: Vec<u8>,
    pub seq: i64,
    pub signature: [u8; 64],
}

/// JSON shape shared by cache entries and the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordJson {
    pub v: String,
    pub seq: i64,
    pub sig: String,
}

impl ResolvedRecord {
    pub fn to_json(&self) -> RecordJson {
        RecordJson {
            v: URL_SAFE_NO_PAD.encode(&self.payload),
            seq: self.seq,
            sig: URL_SAFE_NO_PAD.encode(self.signature),
        }
    }

    pub fn from_json(json: &RecordJson) -> Result<Self, RecordDecodeError> {
        let payload = URL_SAFE_NO_PAD.decode(&json.v)?;
        let signature: [u8; 64] = URL_SAFE_NO_PAD
            .decode(&json.sig)?
            .try_into()
            .map_err(|_| RecordDecodeError::WrongLength("signature must be 64 bytes"))?;
        Ok(Self {
            payload,
            seq: json.seq,
            signature,
        })
    }

    pub fn to_cache_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.to_json())
    }

    pub fn from_cache_bytes(bytes: &[u8]) -> Result<Self, RecordDecodeError> {
        let json: RecordJson = serde_json::from_slice(bytes)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use pkarr::Keypair;

    /// Builds a correctly signed request over `payload` with a fresh random key.
    pub(crate) fn signed_request(payload: &[u8], seq: i64) -> PublishRecordRequest {
        signed_request_with_key(&Keypair::random(), payload, seq)
    }

    pub(crate) fn signed_request_with_key(
        keypair: &Keypair,
        payload: &[u8],
        seq: i64,
    ) -> PublishRecordRequest {
        let signature = keypair.sign(&signable(seq, payload, None));
        PublishRecordRequest {
            public_key: keypair.public_key(),
            payload: payload.to_vec(),
            signature: signature.to_bytes(),
            seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::signed_request;
    use super::*;

    #[test]
    fn signable_encoding() {
        assert_eq!(signable(1, b"hello", None), b"3:seqi1e1:v5:hello".to_vec());
        assert_eq!(
            signable(-3, b"", Some(b"ss")),
            b"4:salt2:ss3:seqi-3e1:v0:".to_vec()
        );
    }

    #[test]
    fn valid_request_passes() {
        let request = signed_request(b"hello world", 1);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let mut request = signed_request(b"hello world", 1);
        request.payload = b"hello forged".to_vec();
        assert_eq!(request.validate(), Err(ValidationError::InvalidSignature));
    }

    #[test]
    fn tampered_seq_fails_verification() {
        let mut request = signed_request(b"hello world", 7);
        request.seq = 8;
        assert_eq!(request.validate(), Err(ValidationError::InvalidSignature));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let mut request = signed_request(b"hello", 1);
        request.payload = Vec::new();
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let request = signed_request(&vec![7u8; MAX_PAYLOAD_SIZE + 1], 1);
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn zeroed_signature_is_a_missing_field() {
        let mut request = signed_request(b"hello", 1);
        request.signature = [0u8; 64];
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn record_round_trip() {
        let request = signed_request(b"hello world", 42);
        let record = request.to_record(0);
        assert_eq!(record.public_key().unwrap(), request.public_key);
        assert_eq!(record.payload().unwrap(), request.payload);
        assert_eq!(record.signature().unwrap(), request.signature);
        assert_eq!(record.seq, 42);

        let resolved = record.to_resolved().unwrap();
        assert_eq!(resolved, request.to_resolved());
    }

    #[test]
    fn cache_bytes_round_trip() {
        let resolved = signed_request(b"cache me", 3).to_resolved();
        let bytes = resolved.to_cache_bytes().unwrap();
        assert_eq!(ResolvedRecord::from_cache_bytes(&bytes).unwrap(), resolved);
    }

    #[test]
    fn corrupt_record_fields_error() {
        let mut record = signed_request(b"hello", 1).to_record(0);
        record.sig = "AAAA".to_string();
        assert!(matches!(
            record.to_resolved(),
            Err(RecordDecodeError::WrongLength(_))
        ));
    }
}
