/// Nacos administrative API integration module
///
/// This module covers everything that talks to, or impersonates, the
/// configuration service: token forging, the HTTP client, wire types and
/// errors.
///
/// ## Token Flow
///
/// 1. The secret is base64-decoded exactly as the server decodes its own
///    `token.secret.key`
/// 2. An HS256 token with `sub` and `exp` claims is signed with it
/// 3. The token is passed as the `accessToken` query parameter on every call
/// 4. A response without a `data` field (or a 401/403) means the server did
///    not accept the signature
pub mod client;
pub mod resources;
pub mod token;
pub mod types;

pub use client::{ConfigApi, NacosClient};
pub use resources::{ConfigEntry, Namespace};
pub use token::{decode_token, forge, forge_at, ForgedClaims, SigningCredential, Token};
pub use types::{ApiError, ApiOutcome, HarvestError};
