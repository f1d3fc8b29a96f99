use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{PayerIdentity, PaymentMethod, ANONYMOUS_PAYER},
    traits::{DonationDbError, DonationRecord, RankingQuery},
};

pub async fn fetch_payer_identity(
    method: PaymentMethod,
    payer_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayerIdentity>, DonationDbError> {
    let identity = sqlx::query_as::<_, PayerIdentity>(
        r#"
            SELECT payer_ref, payment_method, nickname, avatar_url
            FROM payer_identities
            WHERE payer_ref = ?1 AND payment_method = ?2
        "#,
    )
    .bind(payer_ref)
    .bind(method)
    .fetch_optional(conn)
    .await?;
    Ok(identity)
}

pub async fn upsert_payer_identity(identity: &PayerIdentity, conn: &mut SqliteConnection) -> Result<(), DonationDbError> {
    sqlx::query(
        r#"
            INSERT INTO payer_identities (payer_ref, payment_method, nickname, avatar_url) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (payer_ref, payment_method) DO UPDATE SET
                nickname = excluded.nickname,
                avatar_url = excluded.avatar_url,
                updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&identity.payer_ref)
    .bind(identity.payment_method)
    .bind(&identity.nickname)
    .bind(&identity.avatar_url)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fetches completed donations according to the criteria in the `RankingQuery`, joined with category names and payer
/// identities. Anonymous payers never match an identity record.
///
/// Results are ordered by `created_at` in descending order.
pub async fn fetch_completed_donations(
    query: &RankingQuery,
    conn: &mut SqliteConnection,
) -> Result<Vec<DonationRecord>, DonationDbError> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT o.id, o.order_id, o.amount, o.payment_method, o.tenant_config_id, o.category_id, o.payer_ref, o.payer_uid,
        o.blessing, o.status, o.created_at, o.updated_at,
        COALESCE(c.name, '') AS category_name,
        COALESCE(p.nickname, '') AS nickname,
        COALESCE(p.avatar_url, '') AS avatar_url
    FROM orders o
    LEFT JOIN categories c ON c.id = o.category_id
    LEFT JOIN payer_identities p ON p.payer_ref = o.payer_ref AND p.payment_method = o.payment_method AND o.payer_ref <> "#,
    );
    builder.push_bind(ANONYMOUS_PAYER);
    builder.push(" WHERE o.status = 'Completed'");
    if let Some(tenant) = &query.tenant_config_id {
        builder.push(" AND o.tenant_config_id = ");
        builder.push_bind(tenant.clone());
    }
    if let Some(category) = &query.category_id {
        builder.push(" AND o.category_id = ");
        builder.push_bind(category.clone());
    }
    builder.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ");
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset());

    trace!("🗃️ Executing query: {}", builder.sql());
    let donations = builder.build_query_as::<DonationRecord>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_completed_donations: {}", donations.len());
    Ok(donations)
}
