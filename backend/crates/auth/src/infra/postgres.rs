//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;
use sqlx::PgPool;

use crate::domain::entity::{
    email_code::{EmailCode, EmailCodePurpose, NewEmailCode},
    login_record::LoginRecord,
    user::{NewUser, User, UserPatch},
};
use crate::domain::repository::{EmailCodeRepository, LoginRecordRepository, UserRepository};
use crate::domain::value_object::{
    email::Email, user_id::UserId, user_name::UserName, user_role::UserRole,
    user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = r#"
    id,
    username,
    email,
    real_name,
    major,
    class,
    avatar,
    phone,
    role,
    status,
    email_verified,
    password_hash,
    last_login_at,
    created_at,
    updated_at
"#;

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired email codes
    pub async fn cleanup_expired_codes(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM email_verification_codes WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(codes_deleted = deleted, "Cleaned up expired email codes");

        Ok(deleted)
    }

    async fn find_user_where(&self, column: &str, value: &str) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create_user(&self, user: NewUser) -> AuthResult<User> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (
                username,
                email,
                real_name,
                major,
                class,
                role,
                status,
                email_verified,
                password_hash,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING id
            "#,
        )
        .bind(user.user_name.as_str())
        .bind(user.email.as_str())
        .bind(&user.real_name)
        .bind(&user.major)
        .bind(&user.class)
        .bind(user.role.code())
        .bind(user.status.code())
        .bind(user.email_verified)
        .bind(user.password_hash.as_phc_string())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::UserExists
            } else {
                AuthError::Database(e)
            }
        })?;

        Ok(user.into_user(UserId::from_raw(id)))
    }

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_name(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        self.find_user_where("username", user_name.as_str()).await
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.find_user_where("email", email.as_str()).await
    }

    async fn user_name_exists(&self, user_name: &UserName) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(user_name.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn update_user(
        &self,
        user_id: UserId,
        patch: &UserPatch,
        at: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                status = COALESCE($3, status),
                role = COALESCE($4, role),
                email_verified = COALESCE($5, email_verified),
                last_login_at = COALESCE($6, last_login_at),
                avatar = COALESCE($7, avatar),
                phone = COALESCE($8, phone),
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(user_id.get())
        .bind(patch.password_hash.as_ref().map(|h| h.as_phc_string()))
        .bind(patch.status.map(|s| s.code()))
        .bind(patch.role.map(|r| r.code()))
        .bind(patch.email_verified)
        .bind(patch.last_login_at)
        .bind(patch.avatar.as_deref())
        .bind(patch.phone.as_deref())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Email Code Repository Implementation
// ============================================================================

impl EmailCodeRepository for PgAuthRepository {
    async fn replace_email_code(&self, code: NewEmailCode) -> AuthResult<EmailCode> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM email_verification_codes WHERE email = $1")
            .bind(code.email.as_str())
            .execute(&mut *tx)
            .await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO email_verification_codes (
                email,
                code,
                purpose,
                expires_at,
                is_used,
                created_at
            ) VALUES ($1, $2, $3, $4, FALSE, $5)
            RETURNING id
            "#,
        )
        .bind(code.email.as_str())
        .bind(&code.code)
        .bind(code.purpose.code())
        .bind(code.expires_at)
        .bind(code.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(code.into_code(id))
    }

    async fn latest_email_code(
        &self,
        email: &Email,
        purpose: EmailCodePurpose,
    ) -> AuthResult<Option<EmailCode>> {
        let row = sqlx::query_as::<_, EmailCodeRow>(
            r#"
            SELECT
                id,
                email,
                code,
                purpose,
                expires_at,
                is_used,
                used_at,
                created_at
            FROM email_verification_codes
            WHERE email = $1 AND purpose = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(email.as_str())
        .bind(purpose.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_code()).transpose()
    }

    async fn consume_email_code(&self, code_id: i64, at: DateTime<Utc>) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE email_verification_codes
            SET is_used = TRUE, used_at = $2
            WHERE id = $1 AND is_used = FALSE
            "#,
        )
        .bind(code_id)
        .bind(at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }
}

// ============================================================================
// Login Record Repository Implementation
// ============================================================================

impl LoginRecordRepository for PgAuthRepository {
    async fn insert_login_record(&self, record: &LoginRecord) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO login_logs (
                user_id,
                identifier,
                ip,
                user_agent,
                success,
                failure_reason,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.user_id.map(|id| id.get()))
        .bind(&record.identifier)
        .bind(&record.ip)
        .bind(record.user_agent.as_deref())
        .bind(record.success)
        .bind(record.failure_reason.as_deref())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    real_name: String,
    major: String,
    class: String,
    avatar: String,
    phone: String,
    role: String,
    status: String,
    email_verified: bool,
    password_hash: String,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let role = UserRole::from_code(&self.role)
            .ok_or_else(|| AuthError::Internal(format!("Invalid role: {}", self.role)))?;
        let status = UserStatus::from_code(&self.status)
            .ok_or_else(|| AuthError::Internal(format!("Invalid status: {}", self.status)))?;

        Ok(User {
            id: UserId::from_raw(self.id),
            user_name: UserName::from_db(self.username),
            email: Email::from_db(self.email),
            real_name: self.real_name,
            major: self.major,
            class: self.class,
            avatar: self.avatar,
            phone: self.phone,
            role,
            status,
            email_verified: self.email_verified,
            password_hash: HashedPassword::from_db(self.password_hash),
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EmailCodeRow {
    id: i64,
    email: String,
    code: String,
    purpose: String,
    expires_at: DateTime<Utc>,
    is_used: bool,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl EmailCodeRow {
    fn into_code(self) -> AuthResult<EmailCode> {
        let purpose = EmailCodePurpose::from_code(&self.purpose)
            .ok_or_else(|| AuthError::Internal(format!("Invalid code purpose: {}", self.purpose)))?;

        Ok(EmailCode {
            id: self.id,
            email: Email::from_db(self.email),
            code: self.code,
            purpose,
            expires_at: self.expires_at,
            used: self.is_used,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}
