//! User account model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clementine_core::{Email, UserId, UserRole};

/// A registered account.
///
/// The password hash lives in the same row but is deliberately not part of
/// this struct; repository methods that need it return it separately.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub is_active: bool,
    pub email_verified: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is currently locked out of password login.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Whether this account may use the back office.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// The client-facing slice of a [`User`].
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
            last_login: user.last_login,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(locked_until: Option<DateTime<Utc>>) -> User {
        User {
            id: UserId::new(1),
            name: "Shopper".to_string(),
            email: Email::parse("shopper@example.com").unwrap(),
            role: UserRole::Customer,
            is_active: true,
            email_verified: false,
            failed_login_attempts: 0,
            locked_until,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_lockout_window() {
        let now = Utc::now();
        assert!(user(Some(now + Duration::minutes(5))).is_locked(now));
        assert!(!user(Some(now - Duration::minutes(5))).is_locked(now));
        assert!(!user(None).is_locked(now));
    }
}
