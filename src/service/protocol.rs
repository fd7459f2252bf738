//! Wire format of the local credential service.
//!
//! JSON bodies with PascalCase field names. Requests are authenticated with
//! a verifier: `base64(HMAC-SHA256(association_key, nonce))`. Entry fields
//! travel sealed under the association key as `base64(nonce || ciphertext)`.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::crypto::{AEAD_NONCE_LEN, aead};
use crate::error::RequestError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a client association key.
pub const ASSOCIATION_KEY_LEN: usize = 32;
/// Length of the random nonce attached to every response.
pub const NONCE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Associate,
    TestAssociate,
    GetLogins,
    GetLoginsCount,
    GetAllLogins,
}

impl RequestType {
    pub fn parse(s: &str) -> Result<Self, RequestError> {
        match s {
            "associate" => Ok(RequestType::Associate),
            "test-associate" => Ok(RequestType::TestAssociate),
            "get-logins" => Ok(RequestType::GetLogins),
            "get-logins-count" => Ok(RequestType::GetLoginsCount),
            "get-all-logins" => Ok(RequestType::GetAllLogins),
            other => Err(RequestError::UnsupportedRequestType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Associate => "associate",
            RequestType::TestAssociate => "test-associate",
            RequestType::GetLogins => "get-logins",
            RequestType::GetLoginsCount => "get-logins-count",
            RequestType::GetAllLogins => "get-all-logins",
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    pub request_type: String,
    pub id: Option<String>,
    pub key: Option<String>,
    pub nonce: Option<String>,
    pub verifier: Option<String>,
    pub url: Option<String>,
    pub submit_url: Option<String>,
}

impl Request {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            request_type: request_type.as_str().to_string(),
            ..Default::default()
        }
    }

    /// Attaches a fresh nonce and its verifier under `key`.
    pub fn sign(mut self, key: &[u8]) -> Result<Self, RequestError> {
        let (nonce, verifier) = signed_nonce(key)?;
        self.nonce = Some(nonce);
        self.verifier = Some(verifier);
        Ok(self)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginEntry {
    pub login: String,
    pub password: String,
    pub uuid: String,
    pub name: String,
}

impl LoginEntry {
    /// Encrypts every field under `key`, each with its own nonce.
    pub fn seal(&self, key: &[u8; ASSOCIATION_KEY_LEN]) -> Result<Self, RequestError> {
        Ok(Self {
            login: seal_field(key, &self.login)?,
            password: seal_field(key, &self.password)?,
            uuid: seal_field(key, &self.uuid)?,
            name: seal_field(key, &self.name)?,
        })
    }

    /// Reverses [`LoginEntry::seal`].
    pub fn open(&self, key: &[u8; ASSOCIATION_KEY_LEN]) -> Result<Self, RequestError> {
        Ok(Self {
            login: open_field(key, &self.login)?,
            password: open_field(key, &self.password)?,
            uuid: open_field(key, &self.uuid)?,
            name: open_field(key, &self.name)?,
        })
    }
}

fn seal_field(key: &[u8; ASSOCIATION_KEY_LEN], value: &str) -> Result<String, RequestError> {
    let (ciphertext, nonce) =
        aead::encrypt(key, value.as_bytes()).map_err(|_| RequestError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(AEAD_NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed))
}

fn open_field(key: &[u8; ASSOCIATION_KEY_LEN], value: &str) -> Result<String, RequestError> {
    let sealed = STANDARD
        .decode(value)
        .map_err(|_| RequestError::DecryptionFailed)?;
    if sealed.len() < AEAD_NONCE_LEN {
        return Err(RequestError::DecryptionFailed);
    }
    let (nonce, ciphertext) = sealed.split_at(AEAD_NONCE_LEN);

    let plaintext =
        aead::decrypt(key, nonce, ciphertext).map_err(|_| RequestError::DecryptionFailed)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| RequestError::DecryptionFailed)
}

impl fmt::Debug for LoginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginEntry")
            .field("login", &self.login)
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub request_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<LoginEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
}

impl Response {
    pub fn new(request_type: &str, success: bool) -> Self {
        Self {
            request_type: request_type.to_string(),
            success,
            error: None,
            id: None,
            count: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            entries: None,
            nonce: None,
            verifier: None,
        }
    }

    pub fn failure(request_type: &str, error: &RequestError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(request_type, false)
        }
    }

    pub fn sign(mut self, key: &[u8]) -> Result<Self, RequestError> {
        let (nonce, verifier) = signed_nonce(key)?;
        self.nonce = Some(nonce);
        self.verifier = Some(verifier);
        Ok(self)
    }

    /// Checks that the response was signed with `key`.
    pub fn is_signed_by(&self, key: &[u8]) -> bool {
        match (&self.nonce, &self.verifier) {
            (Some(nonce), Some(verifier)) => check_verifier(key, nonce, verifier).is_ok(),
            _ => false,
        }
    }
}

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> Result<(), RequestError> {
    getrandom::fill(buf).map_err(|_| RequestError::RandomUnavailable)
}

/// Decodes a base64 association key.
pub fn decode_key(key: &str) -> Result<[u8; ASSOCIATION_KEY_LEN], RequestError> {
    let bytes = STANDARD.decode(key).map_err(|_| RequestError::InvalidKey)?;
    bytes.try_into().map_err(|_| RequestError::InvalidKey)
}

/// `base64(HMAC-SHA256(key, nonce))` for a base64 nonce.
pub fn compute_verifier(key: &[u8], nonce: &str) -> Result<String, RequestError> {
    let nonce = STANDARD
        .decode(nonce)
        .map_err(|_| RequestError::VerificationFailed)?;
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| RequestError::VerificationFailed)?;
    mac.update(&nonce);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verifies `verifier` against `nonce` in constant time.
pub fn check_verifier(key: &[u8], nonce: &str, verifier: &str) -> Result<(), RequestError> {
    let nonce = STANDARD
        .decode(nonce)
        .map_err(|_| RequestError::VerificationFailed)?;
    let tag = STANDARD
        .decode(verifier)
        .map_err(|_| RequestError::VerificationFailed)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| RequestError::VerificationFailed)?;
    mac.update(&nonce);
    mac.verify_slice(&tag)
        .map_err(|_| RequestError::VerificationFailed)
}

fn signed_nonce(key: &[u8]) -> Result<(String, String), RequestError> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    let nonce = STANDARD.encode(nonce);
    let verifier = compute_verifier(key, &nonce)?;
    Ok((nonce, verifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; ASSOCIATION_KEY_LEN] = [9u8; ASSOCIATION_KEY_LEN];

    #[test]
    fn request_uses_pascal_case_fields() {
        let json = r#"{
            "RequestType": "get-logins",
            "Id": "abc",
            "Url": "https://example.com",
            "SubmitUrl": "https://example.com/login",
            "TriggerUnlock": "false"
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();

        assert_eq!(request.request_type, "get-logins");
        assert_eq!(request.id.as_deref(), Some("abc"));
        assert_eq!(request.submit_url.as_deref(), Some("https://example.com/login"));
        assert!(request.nonce.is_none());
    }

    #[test]
    fn response_omits_empty_fields() {
        let json = serde_json::to_value(Response::new("test-associate", false)).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object["RequestType"], "test-associate");
        assert_eq!(object["Success"], false);
        assert!(object.contains_key("Version"));
        assert!(!object.contains_key("Error"));
        assert!(!object.contains_key("Entries"));
    }

    #[test]
    fn request_types_parse() {
        for t in [
            RequestType::Associate,
            RequestType::TestAssociate,
            RequestType::GetLogins,
            RequestType::GetLoginsCount,
            RequestType::GetAllLogins,
        ] {
            assert_eq!(RequestType::parse(t.as_str()).unwrap(), t);
        }
        assert_eq!(
            RequestType::parse("set-login").unwrap_err(),
            RequestError::UnsupportedRequestType("set-login".into())
        );
    }

    #[test]
    fn signed_request_verifies() {
        let request = Request::new(RequestType::TestAssociate).sign(&KEY).unwrap();
        let nonce = request.nonce.unwrap();
        let verifier = request.verifier.unwrap();

        assert!(check_verifier(&KEY, &nonce, &verifier).is_ok());
        assert_eq!(
            check_verifier(&[1u8; ASSOCIATION_KEY_LEN], &nonce, &verifier),
            Err(RequestError::VerificationFailed)
        );
    }

    #[test]
    fn garbage_verifier_fails() {
        assert!(check_verifier(&KEY, "AAAA", "not base64!").is_err());
        assert!(check_verifier(&KEY, "not base64!", "AAAA").is_err());
    }

    #[test]
    fn nonces_are_fresh() {
        let a = Response::new("x", true).sign(&KEY).unwrap();
        let b = Response::new("x", true).sign(&KEY).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert!(a.is_signed_by(&KEY));
    }

    #[test]
    fn association_key_must_be_32_bytes() {
        assert_eq!(decode_key(&STANDARD.encode(KEY)).unwrap(), KEY);
        assert_eq!(decode_key(&STANDARD.encode([0u8; 16])), Err(RequestError::InvalidKey));
        assert_eq!(decode_key("%%%"), Err(RequestError::InvalidKey));
    }

    fn entry() -> LoginEntry {
        LoginEntry {
            login: "alice".into(),
            password: "hunter2".into(),
            uuid: "u".into(),
            name: "n".into(),
        }
    }

    #[test]
    fn entry_debug_hides_password() {
        assert!(!format!("{:?}", entry()).contains("hunter2"));
    }

    #[test]
    fn sealed_entry_hides_every_field() {
        let sealed = entry().seal(&KEY).unwrap();
        let json = serde_json::to_string(&sealed).unwrap();

        assert!(!json.contains("hunter2"));
        assert!(!json.contains("alice"));
        assert_ne!(sealed.login, sealed.uuid);
        assert_eq!(sealed.open(&KEY).unwrap(), entry());
    }

    #[test]
    fn sealed_entry_needs_the_association_key() {
        let sealed = entry().seal(&KEY).unwrap();
        assert_eq!(
            sealed.open(&[1u8; ASSOCIATION_KEY_LEN]),
            Err(RequestError::DecryptionFailed)
        );

        let mut truncated = sealed.clone();
        truncated.password = STANDARD.encode([0u8; 8]);
        assert_eq!(truncated.open(&KEY), Err(RequestError::DecryptionFailed));
    }
}
