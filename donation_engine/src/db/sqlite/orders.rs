use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    traits::{DonationDbError, InsertOrderResult},
};

pub(crate) const ORDER_COLUMNS: &str = "id, order_id, amount, payment_method, tenant_config_id, category_id, \
                                        payer_ref, payer_uid, blessing, status, created_at, updated_at";

pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, DonationDbError> {
    let result = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(existing) => InsertOrderResult::AlreadyExists(existing),
        None => InsertOrderResult::Inserted(insert_order(order, conn).await?),
    };
    Ok(result)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, DonationDbError> {
    let sql = format!(
        r#"
            INSERT INTO orders (
                order_id,
                amount,
                payment_method,
                tenant_config_id,
                category_id,
                payer_ref,
                blessing
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING {ORDER_COLUMNS};
        "#
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(order.order_id)
        .bind(order.amount)
        .bind(order.payment_method)
        .bind(order.tenant_config_id)
        .bind(order.category_id)
        .bind(order.payer_ref)
        .bind(order.blessing)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next()
        .ok_or(sqlx::Error::RowNotFound)?;
    trace!("🗃️ Order {} inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, DonationDbError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1 LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Sets the order status, unless the order already has that status or has reached a terminal state (Completed or
/// Failed). The guard lives in the `WHERE` clause, so the check and the write happen in one statement.
///
/// Returns the updated order if a row changed, otherwise `None`. The statement is always stepped to completion, so the
/// caller can commit straight afterwards.
pub async fn update_status_if_open(
    order_id: &OrderId,
    status: OrderStatusType,
    payer_uid: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, DonationDbError> {
    let sql = format!(
        r#"
            UPDATE orders
            SET status = ?1, payer_uid = COALESCE(?2, payer_uid), updated_at = CURRENT_TIMESTAMP
            WHERE order_id = ?3 AND status NOT IN ('Completed', 'Failed') AND status <> ?1
            RETURNING {ORDER_COLUMNS};
        "#
    );
    let updated = sqlx::query_as::<_, Order>(&sql)
        .bind(status)
        .bind(payer_uid)
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    match &updated {
        Some(o) => debug!("🗃️ Order {order_id} is now {}", o.status),
        None => trace!("🗃️ Order {order_id} was not moved to {status}"),
    }
    Ok(updated)
}
