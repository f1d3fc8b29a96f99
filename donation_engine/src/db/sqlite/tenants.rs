use chrono::{DateTime, Utc};
use dpg_common::Secret;
use log::debug;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{TenantConfig, TerminalCredentials},
    traits::DonationDbError,
};

#[derive(FromRow)]
struct TenantConfigRow {
    id: String,
    vendor_sn: String,
    vendor_key: String,
    app_id: String,
    terminal_sn: String,
    terminal_key: String,
    merchant_name: String,
    store_name: String,
    device_id: String,
    api_url: String,
    gateway_url: String,
    is_active: bool,
    last_sign_in_at: Option<DateTime<Utc>>,
}

impl From<TenantConfigRow> for TenantConfig {
    fn from(row: TenantConfigRow) -> Self {
        Self {
            id: row.id,
            vendor_sn: row.vendor_sn,
            vendor_key: Secret::new(row.vendor_key),
            app_id: row.app_id,
            terminal_sn: row.terminal_sn,
            terminal_key: Secret::new(row.terminal_key),
            merchant_name: row.merchant_name,
            store_name: row.store_name,
            device_id: row.device_id,
            api_url: row.api_url,
            gateway_url: row.gateway_url,
            is_active: row.is_active,
            last_sign_in_at: row.last_sign_in_at,
        }
    }
}

pub async fn fetch_tenant_config(id: &str, conn: &mut SqliteConnection) -> Result<Option<TenantConfig>, DonationDbError> {
    let row = sqlx::query_as::<_, TenantConfigRow>(
        r#"
            SELECT id, vendor_sn, vendor_key, app_id, terminal_sn, terminal_key, merchant_name, store_name, device_id,
                api_url, gateway_url, is_active, last_sign_in_at
            FROM tenant_configs
            WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(TenantConfig::from))
}

pub async fn upsert_tenant_config(config: &TenantConfig, conn: &mut SqliteConnection) -> Result<(), DonationDbError> {
    sqlx::query(
        r#"
            INSERT INTO tenant_configs (
                id, vendor_sn, vendor_key, app_id, terminal_sn, terminal_key, merchant_name, store_name, device_id,
                api_url, gateway_url, is_active, last_sign_in_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT (id) DO UPDATE SET
                vendor_sn = excluded.vendor_sn,
                vendor_key = excluded.vendor_key,
                app_id = excluded.app_id,
                terminal_sn = excluded.terminal_sn,
                terminal_key = excluded.terminal_key,
                merchant_name = excluded.merchant_name,
                store_name = excluded.store_name,
                device_id = excluded.device_id,
                api_url = excluded.api_url,
                gateway_url = excluded.gateway_url,
                is_active = excluded.is_active,
                last_sign_in_at = excluded.last_sign_in_at,
                updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&config.id)
    .bind(&config.vendor_sn)
    .bind(config.vendor_key.reveal())
    .bind(&config.app_id)
    .bind(&config.terminal_sn)
    .bind(config.terminal_key.reveal())
    .bind(&config.merchant_name)
    .bind(&config.store_name)
    .bind(&config.device_id)
    .bind(&config.api_url)
    .bind(&config.gateway_url)
    .bind(config.is_active)
    .bind(config.last_sign_in_at)
    .execute(conn)
    .await?;
    debug!("🗃️ Tenant configuration '{}' saved", config.id);
    Ok(())
}

pub async fn update_terminal_credentials(
    id: &str,
    credentials: &TerminalCredentials,
    signed_in_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<(), DonationDbError> {
    let result = sqlx::query(
        r#"
            UPDATE tenant_configs SET
                terminal_sn = ?1,
                terminal_key = ?2,
                merchant_name = COALESCE(?3, merchant_name),
                store_name = COALESCE(?4, store_name),
                last_sign_in_at = COALESCE(?5, last_sign_in_at),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?6
        "#,
    )
    .bind(&credentials.terminal_sn)
    .bind(credentials.terminal_key.reveal())
    .bind(credentials.merchant_name.as_deref())
    .bind(credentials.store_name.as_deref())
    .bind(signed_in_at)
    .bind(id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DonationDbError::TenantConfigNotFound(id.to_string()));
    }
    debug!("🗃️ Terminal credentials for tenant '{id}' rotated");
    Ok(())
}
