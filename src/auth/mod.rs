pub mod config;
pub mod jwt;
pub mod middleware;

pub use jwt::{IdentityClaims, JwtService, JwtServiceImpl};
pub use middleware::{AuthUser, auth_middleware};
