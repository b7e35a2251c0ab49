pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};

pub use extractors::Identity;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenKeys};

/// Response body of `POST /token/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The bearer token for subsequent requests.
    pub access: String,
    /// The unique identifier of the authenticated user.
    pub user_id: i64,
}
