//! Email One-Time Codes
//!
//! Issuing codes (`SendEmailCodeUseCase`) and redeeming them
//! ([`redeem_email_code`], used by registration and email-code login).

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::domain::entity::email_code::{
    EMAIL_CODE_LENGTH, EmailCode, EmailCodePurpose, NewEmailCode,
};
use crate::domain::repository::EmailCodeRepository;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult, EmailCodeRejection};

/// Delivery sink for one-time codes.
///
/// Implementations hand the code off (queue, SMTP relay) and return
/// immediately.
pub trait EmailCodeSender: Send + Sync {
    fn send_code(&self, email: &Email, code: &str, purpose: EmailCodePurpose);
}

/// Sender that only logs that a code was issued. The code itself is never
/// logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailCodeSender;

impl EmailCodeSender for LogEmailCodeSender {
    fn send_code(&self, email: &Email, _code: &str, purpose: EmailCodePurpose) {
        tracing::info!(
            email = %email,
            purpose = %purpose,
            "Email code issued (no mail transport configured)"
        );
    }
}

/// Send email code input
pub struct SendEmailCodeInput {
    pub email: String,
    pub purpose: EmailCodePurpose,
}

/// Send email code use case
pub struct SendEmailCodeUseCase<R>
where
    R: EmailCodeRepository,
{
    repo: Arc<R>,
    sender: Arc<dyn EmailCodeSender>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
}

impl<R> SendEmailCodeUseCase<R>
where
    R: EmailCodeRepository,
{
    pub fn new(
        repo: Arc<R>,
        sender: Arc<dyn EmailCodeSender>,
        clock: Arc<dyn Clock>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            repo,
            sender,
            clock,
            config,
        }
    }

    pub async fn execute(&self, input: SendEmailCodeInput) -> AuthResult<()> {
        let email = Email::new(input.email)?;
        let now = self.clock.now();
        let ttl = ChronoDuration::from_std(self.config.email_code_ttl)
            .map_err(|e| AuthError::Internal(format!("email code ttl out of range: {e}")))?;

        let code = self
            .repo
            .replace_email_code(NewEmailCode {
                email: email.clone(),
                code: platform::crypto::random_digits(EMAIL_CODE_LENGTH),
                purpose: input.purpose,
                expires_at: now + ttl,
                created_at: now,
            })
            .await?;

        self.sender.send_code(&email, &code.code, code.purpose);

        tracing::info!(email = %email, purpose = %code.purpose, "Email code sent");
        Ok(())
    }
}

/// Check `submitted` against the latest code for `email` and mark it used.
///
/// Checks run in order: exists, matches, unused, unexpired. Marking is a
/// compare-and-set, so of two concurrent redemptions only one succeeds.
pub async fn redeem_email_code<R>(
    repo: &R,
    clock: &dyn Clock,
    email: &Email,
    submitted: &str,
    purpose: EmailCodePurpose,
) -> AuthResult<EmailCode>
where
    R: EmailCodeRepository,
{
    let code = repo
        .latest_email_code(email, purpose)
        .await?
        .ok_or(AuthError::InvalidEmailCode(EmailCodeRejection::NotFound))?;

    if !platform::crypto::constant_time_eq(code.code.as_bytes(), submitted.trim().as_bytes()) {
        return Err(AuthError::InvalidEmailCode(EmailCodeRejection::Mismatch));
    }
    if code.used {
        return Err(AuthError::InvalidEmailCode(EmailCodeRejection::Used));
    }

    let now = clock.now();
    if code.is_expired(now) {
        return Err(AuthError::InvalidEmailCode(EmailCodeRejection::Expired));
    }

    if !repo.consume_email_code(code.id, now).await? {
        return Err(AuthError::InvalidEmailCode(EmailCodeRejection::Used));
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryAuthRepository;
    use platform::clock::ManualClock;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl EmailCodeSender for CapturingSender {
        fn send_code(&self, email: &Email, code: &str, _purpose: EmailCodePurpose) {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string()));
        }
    }

    struct Fixture {
        repo: Arc<InMemoryAuthRepository>,
        clock: Arc<ManualClock>,
        sender: Arc<CapturingSender>,
        use_case: SendEmailCodeUseCase<InMemoryAuthRepository>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let clock = Arc::new(ManualClock::starting_now());
        let sender = Arc::new(CapturingSender::default());
        let use_case = SendEmailCodeUseCase::new(
            repo.clone(),
            sender.clone(),
            clock.clone(),
            Arc::new(AuthConfig::default()),
        );
        Fixture {
            repo,
            clock,
            sender,
            use_case,
        }
    }

    async fn send(f: &Fixture, purpose: EmailCodePurpose) -> String {
        f.use_case
            .execute(SendEmailCodeInput {
                email: " bob@example.com ".to_string(),
                purpose,
            })
            .await
            .unwrap();
        f.sender.sent.lock().unwrap().last().unwrap().1.clone()
    }

    fn bob() -> Email {
        Email::new("bob@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_sends_six_digits_to_trimmed_address() {
        let f = fixture();
        let code = send(&f, EmailCodePurpose::Login).await;

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(f.sender.sent.lock().unwrap()[0].0, "bob@example.com");
    }

    #[tokio::test]
    async fn test_rejects_invalid_email() {
        let f = fixture();
        let result = f
            .use_case
            .execute(SendEmailCodeInput {
                email: "not-an-email".to_string(),
                purpose: EmailCodePurpose::Login,
            })
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let f = fixture();
        let code = send(&f, EmailCodePurpose::Login).await;

        redeem_email_code(&*f.repo, &*f.clock, &bob(), &code, EmailCodePurpose::Login)
            .await
            .unwrap();

        let again =
            redeem_email_code(&*f.repo, &*f.clock, &bob(), &code, EmailCodePurpose::Login).await;
        assert!(matches!(
            again,
            Err(AuthError::InvalidEmailCode(EmailCodeRejection::Used))
        ));
    }

    #[tokio::test]
    async fn test_rejections() {
        let f = fixture();

        let missing =
            redeem_email_code(&*f.repo, &*f.clock, &bob(), "000000", EmailCodePurpose::Login).await;
        assert!(matches!(
            missing,
            Err(AuthError::InvalidEmailCode(EmailCodeRejection::NotFound))
        ));

        let code = send(&f, EmailCodePurpose::Login).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };
        let mismatch =
            redeem_email_code(&*f.repo, &*f.clock, &bob(), wrong, EmailCodePurpose::Login).await;
        assert!(matches!(
            mismatch,
            Err(AuthError::InvalidEmailCode(EmailCodeRejection::Mismatch))
        ));

        // A login code is not a register code
        let other_purpose =
            redeem_email_code(&*f.repo, &*f.clock, &bob(), &code, EmailCodePurpose::Register).await;
        assert!(matches!(
            other_purpose,
            Err(AuthError::InvalidEmailCode(EmailCodeRejection::NotFound))
        ));

        f.clock.advance(chrono::Duration::minutes(10));
        let expired =
            redeem_email_code(&*f.repo, &*f.clock, &bob(), &code, EmailCodePurpose::Login).await;
        assert!(matches!(
            expired,
            Err(AuthError::InvalidEmailCode(EmailCodeRejection::Expired))
        ));
    }

    #[tokio::test]
    async fn test_new_code_replaces_old() {
        let f = fixture();
        let first = send(&f, EmailCodePurpose::Login).await;
        let second = send(&f, EmailCodePurpose::Login).await;

        if first != second {
            let old =
                redeem_email_code(&*f.repo, &*f.clock, &bob(), &first, EmailCodePurpose::Login)
                    .await;
            assert!(old.is_err());
        }
        redeem_email_code(&*f.repo, &*f.clock, &bob(), &second, EmailCodePurpose::Login)
            .await
            .unwrap();
    }
}
