use std::collections::HashMap;

use chrono::{DateTime, Local};
use zeroize::Zeroizing;

use super::protocol::ASSOCIATION_KEY_LEN;
use crate::error::AssociationError;

/// A client that shared a key with the service.
pub struct Association {
    key: Zeroizing<[u8; ASSOCIATION_KEY_LEN]>,
    created: DateTime<Local>,
}

impl Association {
    pub(crate) fn new(key: [u8; ASSOCIATION_KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
            created: Local::now(),
        }
    }

    pub fn key(&self) -> &[u8; ASSOCIATION_KEY_LEN] {
        &self.key
    }

    pub fn created(&self) -> DateTime<Local> {
        self.created
    }
}

/// Upper bound on associated clients kept in memory.
pub const MAX_ASSOCIATIONS: usize = 64;

/// In-memory registry of associated clients, keyed by association id.
#[derive(Default)]
pub struct AssociationStore {
    associations: HashMap<String, Association>,
}

impl AssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        id: &str,
        key: [u8; ASSOCIATION_KEY_LEN],
    ) -> Result<(), AssociationError> {
        if self.associations.contains_key(id) {
            Err(AssociationError::AlreadyExists(id.to_string()))
        } else if self.is_full() {
            Err(AssociationError::Full(MAX_ASSOCIATIONS))
        } else {
            self.associations.insert(id.to_string(), Association::new(key));
            Ok(())
        }
    }

    pub fn get(&self, id: &str) -> Option<&Association> {
        self.associations.get(id)
    }

    pub fn is_full(&self) -> bool {
        self.associations.len() >= MAX_ASSOCIATIONS
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.associations.keys()
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }
}
