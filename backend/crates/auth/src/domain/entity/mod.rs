//! Entity Module

pub mod email_code;
pub mod login_record;
pub mod user;
