//! Request signing and verification for the payment gateway.
//!
//! The gateway uses two trust models side by side:
//! * **Symmetric**: parameters are sorted, joined as `k=v&k=v`, suffixed with `&key=<secret>` and hashed with MD5. The
//!   upper-case hex digest goes in the `sign` field. Outbound API calls use a variant of this where the whole JSON body
//!   is hashed together with the secret.
//! * **Asymmetric**: newer callback deliveries carry an RSA (PKCS#1 v1.5, SHA-256) signature over the raw request body
//!   in the `Authorization` header, base64 encoded.
use std::collections::BTreeMap;

use log::*;
use md5::{Digest, Md5};
use rsa::{
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    signature::{SignatureEncoding, Signer, Verifier},
    RsaPrivateKey,
    RsaPublicKey,
};
use sha2::Sha256;
use thiserror::Error;

/// Fields that never take part in a signature.
pub const META_FIELDS: [&str; 5] = ["sign", "sign_type", "flowT", "flowSign", "flow"];

#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("Invalid RSA key: {0}")]
    InvalidKey(String),
    #[error("Signature is not valid base64: {0}")]
    InvalidEncoding(String),
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),
    #[error("Signature verification failed")]
    VerificationFailed,
    #[error("No signature was provided")]
    MissingSignature,
}

/// Builds the string that gets signed: non-empty, non-meta parameters sorted by key (byte order) and joined as
/// `k=v` pairs separated by `&`.
pub fn canonical_string<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted = params
        .into_iter()
        .filter(|(k, v)| !v.as_ref().is_empty() && !META_FIELDS.contains(&k.as_ref()))
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect::<BTreeMap<String, String>>();
    sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
}

/// Symmetric parameter signature. Deterministic for a given set of parameters, regardless of their iteration order.
pub fn sign_params_md5<I, K, V>(params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let payload = format!("{}&key={secret}", canonical_string(params));
    hex::encode_upper(Md5::digest(payload.as_bytes()))
}

/// Checks a symmetric signature. The comparison ignores case, since some callers send lower-case digests.
pub fn verify_params_md5<I, K, V>(params: I, signature: &str, secret: &str) -> bool
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let expected = sign_params_md5(params, secret);
    let valid = !signature.is_empty() && expected.eq_ignore_ascii_case(signature.trim());
    if !valid {
        debug!("🔏️ Symmetric signature mismatch");
    }
    valid
}

/// Signs a serialized JSON request body for the `Authorization` header of outbound API calls.
pub fn sign_body_md5(body: &str, secret: &str) -> String {
    hex::encode(Md5::digest(format!("{body}{secret}").as_bytes()))
}

//--------------------------------------     RsaSigner       ---------------------------------------------------------
#[derive(Clone)]
pub struct RsaSigner {
    key: SigningKey<Sha256>,
}

impl RsaSigner {
    /// Loads a PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, SignatureError> {
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(pem.trim()).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        Ok(Self { key: SigningKey::<Sha256>::new(private_key) })
    }

    /// Signs arbitrary bytes, returning the base64 encoded signature.
    pub fn sign_bytes(&self, data: &[u8]) -> String {
        let signature = self.key.sign(data);
        base64::encode(signature.to_bytes())
    }

    /// Asymmetric parameter signature: the canonical string (without a secret suffix) signed with RSA/SHA-256.
    pub fn sign_params<I, K, V>(&self, params: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.sign_bytes(canonical_string(params).as_bytes())
    }
}

//--------------------------------------    RsaVerifier      ---------------------------------------------------------
#[derive(Clone)]
pub struct RsaVerifier {
    key: VerifyingKey<Sha256>,
}

impl RsaVerifier {
    /// Loads an SPKI (`BEGIN PUBLIC KEY`) PEM public key.
    pub fn from_pem(pem: &str) -> Result<Self, SignatureError> {
        let public_key =
            RsaPublicKey::from_public_key_pem(pem.trim()).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        Ok(Self { key: VerifyingKey::<Sha256>::new(public_key) })
    }

    /// Verifies a base64 signature over the exact bytes given. Callers must pass the raw request body, never a
    /// re-serialized form of it.
    pub fn verify(&self, raw: &[u8], signature_b64: &str) -> Result<(), SignatureError> {
        let signature_b64 = signature_b64.trim();
        if signature_b64.is_empty() {
            return Err(SignatureError::MissingSignature);
        }
        let bytes = base64::decode(signature_b64).map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
        let signature =
            Signature::try_from(bytes.as_slice()).map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        self.key.verify(raw, &signature).map_err(|e| {
            debug!("🔏️ RSA signature rejected: {e}");
            SignatureError::VerificationFailed
        })
    }
}
