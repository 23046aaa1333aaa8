//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    email_code::{EmailCode, EmailCodePurpose, NewEmailCode},
    login_record::LoginRecord,
    user::{NewUser, User, UserPatch},
};
pub use repository::{AuthStore, EmailCodeRepository, LoginRecordRepository, UserRepository};
