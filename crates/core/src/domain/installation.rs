use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::domain::user::{TenantId, UserId};

/// Stored user authorization for one (tenant, user) pair.
///
/// Tokens are kept as secrets so that `Debug` output and logs never carry them.
#[derive(Clone, Debug)]
pub struct Installation {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub display_name: String,
}

/// Result of a successful refresh-token exchange.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_in_secs: i64,
}

/// The authorizing user's grant from a completed install.
#[derive(Clone, Debug)]
pub struct UserAuthorization {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub team_name: String,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_in_secs: Option<i64>,
}

impl Installation {
    pub fn from_authorization(authorization: UserAuthorization, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: authorization.tenant_id,
            user_id: authorization.user_id,
            access_token: Some(authorization.access_token),
            refresh_token: authorization.refresh_token,
            token_expires_at: authorization.expires_in_secs.map(|secs| expiry_after(now, secs)),
            display_name: authorization.team_name,
        }
    }

    /// True when the token is unset, empty, or blank.
    pub fn has_usable_token(&self) -> bool {
        self.access_token.as_ref().is_some_and(|token| !token.expose_secret().trim().is_empty())
    }

    /// Tokens without an expiry never rotate. Others refresh once `now + margin`
    /// reaches the expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now + margin >= expires_at,
            None => false,
        }
    }

    pub fn apply_grant(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        self.access_token = Some(grant.access_token);
        self.refresh_token = Some(grant.refresh_token);
        self.token_expires_at = Some(expiry_after(now, grant.expires_in_secs));
    }
}

/// A lifetime that does not fit the calendar expires at once, so the next pass
/// refreshes instead of trusting it.
fn expiry_after(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    Duration::try_seconds(secs).and_then(|lifetime| now.checked_add_signed(lifetime)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use secrecy::ExposeSecret;

    use super::{Installation, TokenGrant, UserAuthorization};
    use crate::domain::user::{TenantId, UserId};

    fn installation(expires_in: Option<i64>) -> Installation {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Installation {
            tenant_id: TenantId("T1".to_string()),
            user_id: UserId("U1".to_string()),
            access_token: Some("xoxp-old".to_string().into()),
            refresh_token: Some("xoxe-old".to_string().into()),
            token_expires_at: expires_in.map(|secs| now + Duration::seconds(secs)),
            display_name: "Acme".to_string(),
        }
    }

    #[test]
    fn refresh_triggers_inside_safety_margin() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let margin = Duration::seconds(300);

        assert!(!installation(Some(301)).needs_refresh(now, margin));
        assert!(installation(Some(300)).needs_refresh(now, margin));
        assert!(installation(Some(-10)).needs_refresh(now, margin));
        assert!(!installation(None).needs_refresh(now, margin));
    }

    #[test]
    fn grant_rotates_both_tokens_and_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut installation = installation(Some(10));
        installation.apply_grant(
            TokenGrant {
                access_token: "xoxp-new".to_string().into(),
                refresh_token: "xoxe-new".to_string().into(),
                expires_in_secs: 43_200,
            },
            now,
        );

        assert_eq!(
            installation.access_token.as_ref().map(|token| token.expose_secret().to_string()),
            Some("xoxp-new".to_string())
        );
        assert_eq!(
            installation.refresh_token.as_ref().map(|token| token.expose_secret().to_string()),
            Some("xoxe-new".to_string())
        );
        assert_eq!(installation.token_expires_at, Some(now + Duration::hours(12)));
    }

    #[test]
    fn unrepresentable_lifetime_expires_immediately() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut installation = installation(Some(10));
        installation.apply_grant(
            TokenGrant {
                access_token: "xoxp-new".to_string().into(),
                refresh_token: "xoxe-new".to_string().into(),
                expires_in_secs: i64::MAX,
            },
            now,
        );

        assert_eq!(installation.token_expires_at, Some(now));
        assert!(installation.needs_refresh(now, Duration::zero()));
    }

    #[test]
    fn authorization_becomes_installation_named_after_team() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let installation = Installation::from_authorization(
            UserAuthorization {
                tenant_id: TenantId("T1".to_string()),
                user_id: UserId("U1".to_string()),
                team_name: "Acme".to_string(),
                access_token: "xoxp-1".to_string().into(),
                refresh_token: None,
                expires_in_secs: None,
            },
            now,
        );

        assert!(installation.has_usable_token());
        assert_eq!(installation.display_name, "Acme");
        assert_eq!(installation.token_expires_at, None);
    }

    #[test]
    fn blank_tokens_are_not_usable() {
        let mut installation = installation(None);
        assert!(installation.has_usable_token());
        installation.access_token = Some("  ".to_string().into());
        assert!(!installation.has_usable_token());
        installation.access_token = None;
        assert!(!installation.has_usable_token());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let debug = format!("{:?}", installation(Some(10)));
        assert!(!debug.contains("xoxp-old"));
        assert!(!debug.contains("xoxe-old"));
    }
}
