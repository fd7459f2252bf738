use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use zeroize::Zeroizing;

use super::association::AssociationStore;
use super::protocol::{
    ASSOCIATION_KEY_LEN, LoginEntry, Request, RequestType, Response, check_verifier, decode_key,
    secure_random,
};
use super::{AssociationApprover, Database};
use crate::error::{AssociationError, RequestError};

const ID_LEN: usize = 8;

/// Answers credential requests from a single unlocked database.
///
/// Requests are validated and authenticated before the database is consulted.
/// New associations only take effect once `approver` accepts them.
pub struct Service {
    database: Arc<dyn Database>,
    approver: Arc<dyn AssociationApprover>,
    associations: Mutex<AssociationStore>,
}

impl Service {
    pub fn new(database: Arc<dyn Database>, approver: Arc<dyn AssociationApprover>) -> Self {
        Self {
            database,
            approver,
            associations: Mutex::new(AssociationStore::new()),
        }
    }

    /// Handles a raw request body.
    pub fn handle_bytes(&self, body: &[u8]) -> Response {
        match serde_json::from_slice::<Request>(body) {
            Ok(request) => self.handle(&request),
            Err(e) => {
                tracing::debug!(error = %e, "malformed request body");
                Response::failure("", &RequestError::Malformed(e.to_string()))
            }
        }
    }

    pub fn handle(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                let request_type = &request.request_type;
                tracing::debug!(%request_type, error = %e, "request refused");
                Response::failure(&request.request_type, &e)
            }
        }
    }

    pub fn association_count(&self) -> usize {
        self.associations().len()
    }

    fn dispatch(&self, request: &Request) -> Result<Response, RequestError> {
        let request_type = RequestType::parse(&request.request_type)?;
        tracing::debug!(request_type = request_type.as_str(), "handling request");

        match request_type {
            RequestType::Associate => self.associate(request),
            RequestType::TestAssociate => self.test_associate(request),
            RequestType::GetLogins => {
                let key = self.authenticate(request)?;
                let url = required(&request.url, "Url")?;
                let entries = self
                    .database
                    .find_logins(url, request.submit_url.as_deref());
                let mut response = Response::new(request_type.as_str(), true);
                response.id = request.id.clone();
                response.count = Some(entries.len());
                response.entries = Some(seal_all(&entries, &key)?);
                response.sign(&key[..])
            }
            RequestType::GetLoginsCount => {
                let key = self.authenticate(request)?;
                let url = required(&request.url, "Url")?;
                let count = self
                    .database
                    .find_logins(url, request.submit_url.as_deref())
                    .len();
                let mut response = Response::new(request_type.as_str(), true);
                response.id = request.id.clone();
                response.count = Some(count);
                response.sign(&key[..])
            }
            RequestType::GetAllLogins => {
                let key = self.authenticate(request)?;
                let entries = self.database.all_logins();
                let mut response = Response::new(request_type.as_str(), true);
                response.id = request.id.clone();
                response.count = Some(entries.len());
                response.entries = Some(seal_all(&entries, &key)?);
                response.sign(&key[..])
            }
        }
    }

    fn associate(&self, request: &Request) -> Result<Response, RequestError> {
        let key = Zeroizing::new(decode_key(required(&request.key, "Key")?)?);
        check_verifier(
            &key[..],
            required(&request.nonce, "Nonce")?,
            required(&request.verifier, "Verifier")?,
        )?;

        let id = {
            let associations = self.associations();
            if associations.is_full() {
                return Err(RequestError::TooManyAssociations);
            }
            loop {
                let id = new_id()?;
                if associations.get(&id).is_none() {
                    break id;
                }
            }
        };

        // the lock is not held while the user decides
        if !self.approver.approve(&id) {
            tracing::info!(id = %id, "association denied");
            return Err(RequestError::AssociationDenied);
        }

        match self.associations().insert(&id, *key) {
            Ok(()) => {}
            Err(AssociationError::Full(_)) => return Err(RequestError::TooManyAssociations),
            Err(e @ AssociationError::AlreadyExists(_)) => {
                // the approved id was taken while the user decided
                tracing::warn!(error = %e, "association raced");
                return Err(RequestError::AssociationDenied);
            }
        }
        tracing::info!(id = %id, "client associated");

        let mut response = Response::new(RequestType::Associate.as_str(), true);
        response.id = Some(id);
        response.sign(&key[..])
    }

    fn test_associate(&self, request: &Request) -> Result<Response, RequestError> {
        if request.id.is_none() {
            return Ok(Response::new(RequestType::TestAssociate.as_str(), false));
        }
        let key = self.authenticate(request)?;

        let mut response = Response::new(RequestType::TestAssociate.as_str(), true);
        response.id = request.id.clone();
        response.sign(&key[..])
    }

    /// Resolves the request's association and checks its verifier.
    fn authenticate(
        &self,
        request: &Request,
    ) -> Result<Zeroizing<[u8; ASSOCIATION_KEY_LEN]>, RequestError> {
        let id = required(&request.id, "Id")?;
        let nonce = required(&request.nonce, "Nonce")?;
        let verifier = required(&request.verifier, "Verifier")?;

        let key = {
            let associations = self.associations();
            let association = associations.get(id).ok_or(RequestError::NotAssociated)?;
            Zeroizing::new(*association.key())
        };

        check_verifier(&key[..], nonce, verifier)?;
        Ok(key)
    }

    fn associations(&self) -> MutexGuard<'_, AssociationStore> {
        self.associations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, RequestError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RequestError::MissingField(name)),
    }
}

fn seal_all(
    entries: &[LoginEntry],
    key: &[u8; ASSOCIATION_KEY_LEN],
) -> Result<Vec<LoginEntry>, RequestError> {
    entries.iter().map(|entry| entry.seal(key)).collect()
}

fn new_id() -> Result<String, RequestError> {
    let mut buf = [0u8; ID_LEN];
    secure_random(&mut buf)?;
    Ok(hex::encode(buf))
}
