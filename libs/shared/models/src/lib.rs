pub mod auth;
pub mod error;

pub use auth::{AuthContext, Role, User};
pub use error::AppError;
