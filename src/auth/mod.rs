pub mod handlers;
pub mod password;
pub mod policy;
pub mod session;
pub mod signing;

pub use password::{hash_password, verify_password, BcryptHasher, CredentialHasher};
pub use session::{Flash, FlashCategory, Session, SessionStore};
pub use signing::SessionSigner;
