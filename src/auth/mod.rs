pub mod authorizor;
pub mod policy;
mod user;

pub use policy::RequestView;
pub use user::{Role, User, USER_ID_HEADER, USER_ROLE_HEADER};
