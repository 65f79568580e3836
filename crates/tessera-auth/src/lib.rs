//! `tessera` Token Engine
//!
//! Stateless bearer-token lifecycle:
//! - Access, refresh and sliding tokens over a signed JWT codec
//! - A fixed-order verification pipeline with an optional blacklist
//! - Pair refresh (with optional rotation) and sliding refresh
//! - Credential exchange against a pluggable credential store
//! - `Authorization` header checks for resource access

pub mod bearer;
pub mod blacklist;
pub mod claims;
pub mod codec;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod obtain;
pub mod password;
pub mod refresh;
pub mod token;
pub mod verify;

pub use blacklist::{Blacklist, InMemoryBlacklist, StorageError};
pub use claims::{ClaimNames, ClaimSet};
pub use codec::TokenCodec;
pub use credentials::{AuthFailure, CredentialStore, InMemoryCredentialStore, Principal};
pub use error::{AuthError, ErrorKind, Result};
pub use jwt::{JwtManager, JwtManagerBuilder};
pub use obtain::{AuthService, ObtainedTokens, TokenFamily};
pub use refresh::{RefreshedPair, RefreshedSliding};
pub use token::{Token, TokenKind, VerifiedToken};
