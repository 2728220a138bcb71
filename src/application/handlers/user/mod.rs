//! Account query handlers.

mod check_promotion;
mod find_user_by_principal;
mod get_current_user;

pub use check_promotion::{CheckPromotionHandler, CheckPromotionQuery};
pub use find_user_by_principal::{FindUserByPrincipalHandler, FindUserByPrincipalQuery};
pub use get_current_user::{GetCurrentUserHandler, GetCurrentUserQuery};
