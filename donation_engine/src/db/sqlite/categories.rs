use sqlx::SqliteConnection;

use crate::{db_types::Category, traits::DonationDbError};

pub async fn fetch_category(id: &str, conn: &mut SqliteConnection) -> Result<Option<Category>, DonationDbError> {
    let category = sqlx::query_as::<_, Category>("SELECT id, name, tenant_config_id FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(category)
}

pub async fn fetch_categories(conn: &mut SqliteConnection) -> Result<Vec<Category>, DonationDbError> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT id, name, tenant_config_id FROM categories ORDER BY created_at, id")
            .fetch_all(conn)
            .await?;
    Ok(categories)
}

pub async fn upsert_category(category: &Category, conn: &mut SqliteConnection) -> Result<(), DonationDbError> {
    sqlx::query(
        r#"
            INSERT INTO categories (id, name, tenant_config_id) VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET name = excluded.name, tenant_config_id = excluded.tenant_config_id
        "#,
    )
    .bind(&category.id)
    .bind(&category.name)
    .bind(&category.tenant_config_id)
    .execute(conn)
    .await?;
    Ok(())
}
