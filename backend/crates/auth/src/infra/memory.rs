//! In-Memory Repository Implementation
//!
//! Backs the service when no database is configured, and the tests.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    email_code::{EmailCode, EmailCodePurpose, NewEmailCode},
    login_record::LoginRecord,
    user::{NewUser, User, UserPatch},
};
use crate::domain::repository::{EmailCodeRepository, LoginRecordRepository, UserRepository};
use crate::domain::value_object::{email::Email, user_id::UserId, user_name::UserName};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct State {
    users: Vec<User>,
    email_codes: Vec<EmailCode>,
    login_records: Vec<LoginRecord>,
    next_user_id: i64,
    next_code_id: i64,
}

/// Mutex-guarded in-memory auth repository
#[derive(Clone, Default)]
pub struct InMemoryAuthRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of persisted login records, oldest first
    pub fn login_records(&self) -> Vec<LoginRecord> {
        self.lock().login_records.clone()
    }
}

impl UserRepository for InMemoryAuthRepository {
    async fn create_user(&self, user: NewUser) -> AuthResult<User> {
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|u| u.user_name == user.user_name || u.email == user.email)
        {
            return Err(AuthError::UserExists);
        }

        state.next_user_id += 1;
        let user = user.into_user(UserId::from_raw(state.next_user_id));
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_name(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| &u.user_name == user_name)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| &u.email == email).cloned())
    }

    async fn user_name_exists(&self, user_name: &UserName) -> AuthResult<bool> {
        Ok(self.lock().users.iter().any(|u| &u.user_name == user_name))
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        Ok(self.lock().users.iter().any(|u| &u.email == email))
    }

    async fn update_user(
        &self,
        user_id: UserId,
        patch: &UserPatch,
        at: DateTime<Utc>,
    ) -> AuthResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == user_id) {
            user.apply(patch, at);
        }
        Ok(())
    }
}

impl EmailCodeRepository for InMemoryAuthRepository {
    async fn replace_email_code(&self, code: NewEmailCode) -> AuthResult<EmailCode> {
        let mut state = self.lock();
        state.email_codes.retain(|c| c.email != code.email);
        state.next_code_id += 1;
        let code = code.into_code(state.next_code_id);
        state.email_codes.push(code.clone());
        Ok(code)
    }

    async fn latest_email_code(
        &self,
        email: &Email,
        purpose: EmailCodePurpose,
    ) -> AuthResult<Option<EmailCode>> {
        Ok(self
            .lock()
            .email_codes
            .iter()
            .filter(|c| &c.email == email && c.purpose == purpose)
            .max_by_key(|c| c.id)
            .cloned())
    }

    async fn consume_email_code(&self, code_id: i64, at: DateTime<Utc>) -> AuthResult<bool> {
        let mut state = self.lock();
        match state
            .email_codes
            .iter_mut()
            .find(|c| c.id == code_id && !c.used)
        {
            Some(code) => {
                code.used = true;
                code.used_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl LoginRecordRepository for InMemoryAuthRepository {
    async fn insert_login_record(&self, record: &LoginRecord) -> AuthResult<()> {
        self.lock().login_records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::{user_role::UserRole, user_status::UserStatus};
    use platform::password::HashedPassword;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            user_name: UserName::new(name).unwrap(),
            email: Email::new(email).unwrap(),
            real_name: String::new(),
            major: String::new(),
            class: String::new(),
            role: UserRole::Student,
            status: UserStatus::Active,
            email_verified: false,
            password_hash: HashedPassword::from_db("$argon2id$stub"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = InMemoryAuthRepository::new();
        let a = repo.create_user(new_user("alice", "a@example.com")).await.unwrap();
        let b = repo.create_user(new_user("bob", "b@example.com")).await.unwrap();
        assert_eq!(a.id.get(), 1);
        assert_eq!(b.id.get(), 2);

        let found = repo.find_user_by_email(&b.email).await.unwrap().unwrap();
        assert_eq!(found.user_name.as_str(), "bob");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let repo = InMemoryAuthRepository::new();
        repo.create_user(new_user("alice", "a@example.com")).await.unwrap();

        let same_name = repo.create_user(new_user("alice", "x@example.com")).await;
        assert!(matches!(same_name, Err(AuthError::UserExists)));
        let same_email = repo.create_user(new_user("carol", "a@example.com")).await;
        assert!(matches!(same_email, Err(AuthError::UserExists)));
    }

    #[tokio::test]
    async fn test_update_applies_patch() {
        let repo = InMemoryAuthRepository::new();
        let user = repo.create_user(new_user("alice", "a@example.com")).await.unwrap();
        let at = Utc::now();

        repo.update_user(user.id, &UserPatch::last_login(at), at)
            .await
            .unwrap();

        let user = repo.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.last_login_at, Some(at));
    }

    #[tokio::test]
    async fn test_consume_is_compare_and_set() {
        let repo = InMemoryAuthRepository::new();
        let now = Utc::now();
        let code = repo
            .replace_email_code(NewEmailCode {
                email: Email::new("a@example.com").unwrap(),
                code: "123456".to_string(),
                purpose: EmailCodePurpose::Login,
                expires_at: now,
                created_at: now,
            })
            .await
            .unwrap();

        assert!(repo.consume_email_code(code.id, now).await.unwrap());
        assert!(!repo.consume_email_code(code.id, now).await.unwrap());
    }
}
