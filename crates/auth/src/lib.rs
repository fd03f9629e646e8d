//! `tally-auth`: retrieval authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it mints and
//! checks signed download links and compares shared secrets, nothing more.

pub mod shared_secret;
pub mod signed_link;

pub use shared_secret::SharedSecret;
pub use signed_link::{LinkSigner, LinkVerificationError, SignedLink, DEFAULT_DOWNLOAD_PATH};
