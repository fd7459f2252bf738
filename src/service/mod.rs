//! Local credential service.
//!
//! Listens on a fixed local port and answers credential requests from other
//! applications out of an already unlocked database.

pub mod association;
pub mod config;
pub mod handler;
pub mod protocol;
pub mod server;

pub use config::ServiceConfig;
pub use handler::Service;
pub use protocol::{LoginEntry, Request, RequestType, Response};
pub use server::Server;

/// Read access to an unlocked database.
pub trait Database: Send + Sync {
    /// Entries whose URL matches `url` (and `submit_url`, when given).
    fn find_logins(&self, url: &str, submit_url: Option<&str>) -> Vec<LoginEntry>;

    fn all_logins(&self) -> Vec<LoginEntry>;
}

/// Decides whether a client may associate, typically by asking the user.
pub trait AssociationApprover: Send + Sync {
    fn approve(&self, id: &str) -> bool;
}

impl<F> AssociationApprover for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn approve(&self, id: &str) -> bool {
        self(id)
    }
}
