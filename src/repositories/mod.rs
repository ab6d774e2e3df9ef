//! # Repositories
//!
//! Database access layers wrapping SeaORM operations per entity.

pub mod credential;
pub mod device_token;
pub mod oauth_state;

pub use credential::CredentialRepository;
pub use device_token::DeviceTokenRepository;
pub use oauth_state::OAuthStateRepository;
