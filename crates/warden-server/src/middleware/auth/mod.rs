//! Principal extraction.
//!
//! Credentials are verified upstream; this layer only reads the identity the
//! proxy forwards in a trusted header.

pub mod extractor;
pub mod layer;
pub mod types;

pub use extractor::Auth;
pub use layer::{PrincipalLayer, PrincipalMiddleware};
pub use types::AuthUser;
