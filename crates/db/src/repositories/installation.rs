use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::Row;

use statusquo_core::domain::installation::Installation;
use statusquo_core::domain::user::{TenantId, UserId};

use super::{InstallationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInstallationRepository {
    pool: DbPool,
}

impl SqlInstallationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT tenant_id, user_id, access_token, refresh_token, \
                              token_expires_at, display_name FROM installations";

fn row_to_installation(row: &sqlx::sqlite::SqliteRow) -> Result<Installation, RepositoryError> {
    let tenant_id: String =
        row.try_get("tenant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let access_token: Option<String> =
        row.try_get("access_token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let refresh_token: Option<String> =
        row.try_get("refresh_token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expires_at_str: Option<String> =
        row.try_get("token_expires_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let display_name: String =
        row.try_get("display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let token_expires_at = expires_at_str
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RepositoryError::Decode(format!("token_expires_at: {e}")))
        })
        .transpose()?;

    Ok(Installation {
        tenant_id: TenantId(tenant_id),
        user_id: UserId(user_id),
        access_token: access_token.map(SecretString::from),
        refresh_token: refresh_token.map(SecretString::from),
        token_expires_at,
        display_name,
    })
}

#[async_trait::async_trait]
impl InstallationRepository for SqlInstallationRepository {
    async fn save(&self, installation: Installation) -> Result<(), RepositoryError> {
        let access_token =
            installation.access_token.as_ref().map(|t| t.expose_secret().to_string());
        let refresh_token =
            installation.refresh_token.as_ref().map(|t| t.expose_secret().to_string());
        let expires_at = installation.token_expires_at.map(|dt| dt.to_rfc3339());
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "INSERT INTO installations (tenant_id, user_id, access_token, refresh_token,
                                        token_expires_at, display_name, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, user_id) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = excluded.refresh_token,
                 token_expires_at = excluded.token_expires_at,
                 display_name = excluded.display_name,
                 updated_at = excluded.updated_at",
        )
        .bind(&installation.tenant_id.0)
        .bind(&installation.user_id.0)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(&installation.display_name)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(
        &self,
        tenant_id: &TenantId,
        user_id: Option<&UserId>,
    ) -> Result<Option<Installation>, RepositoryError> {
        let row = match user_id {
            Some(user_id) => {
                sqlx::query(&format!("{SELECT_COLUMNS} WHERE tenant_id = ? AND user_id = ?"))
                    .bind(&tenant_id.0)
                    .bind(&user_id.0)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!(
                    "{SELECT_COLUMNS} WHERE tenant_id = ?
                     ORDER BY updated_at DESC, rowid DESC LIMIT 1"
                ))
                .bind(&tenant_id.0)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.as_ref().map(row_to_installation).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Installation>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY tenant_id, user_id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_installation).collect()
    }
}
