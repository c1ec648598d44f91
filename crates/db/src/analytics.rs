//! Analytics ingestion and back-office reports.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use dewy_core::{Money, OrderStatus, ProductId, UserId};

use crate::RepositoryError;

/// Event names the storefront accepts.
pub const EVENT_TYPES: &[&str] = &[
    "page_view",
    "product_view",
    "add_to_cart",
    "remove_from_cart",
    "checkout_started",
    "purchase",
    "search",
    "wishlist_add",
];

#[must_use]
pub fn is_known_event(event_type: &str) -> bool {
    EVENT_TYPES.contains(&event_type)
}

/// An event to record.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub session_id: Option<String>,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub page_path: Option<String>,
    pub metadata: serde_json::Value,
}

/// Headline numbers for a period. Cancelled orders are excluded.
#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    pub revenue: Money,
    pub orders: i64,
    pub average_order_value: Money,
    pub new_customers: i64,
    pub pending_orders: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventCount {
    pub event_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Option<ProductId>,
    pub name: String,
    pub units: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    revenue: Decimal,
    orders: i64,
    new_customers: i64,
    pending_orders: i64,
}

pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_event(&self, event: &NewEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.analytics_event
                (event_type, session_id, user_id, product_id, page_path, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&event.event_type)
        .bind(event.session_id.as_deref())
        .bind(event.user_id)
        .bind(event.product_id)
        .bind(event.page_path.as_deref())
        .bind(&event.metadata)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, since: DateTime<Utc>) -> Result<SalesSummary, RepositoryError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r"
            SELECT
                COALESCE((SELECT SUM(total) FROM shop.orders
                          WHERE created_at >= $1 AND status <> 'cancelled'), 0) AS revenue,
                (SELECT COUNT(*) FROM shop.orders
                  WHERE created_at >= $1 AND status <> 'cancelled') AS orders,
                (SELECT COUNT(*) FROM shop.user_profile
                  WHERE created_at >= $1 AND role = 'customer') AS new_customers,
                (SELECT COUNT(*) FROM shop.orders WHERE status = 'pending') AS pending_orders
            ",
        )
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        let revenue = Money::new(row.revenue);
        let average_order_value = if row.orders > 0 {
            Money::new(row.revenue / Decimal::from(row.orders))
        } else {
            Money::ZERO
        };

        Ok(SalesSummary {
            revenue,
            orders: row.orders,
            average_order_value,
            new_customers: row.new_customers,
            pending_orders: row.pending_orders,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn events_by_type(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, EventCount>(
            r"
            SELECT event_type, COUNT(*) AS count
            FROM shop.analytics_event
            WHERE created_at >= $1
            GROUP BY event_type
            ORDER BY count DESC
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Best sellers by revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT oi.product_id, MAX(oi.product_name) AS name,
                   SUM(oi.quantity)::bigint AS units, SUM(oi.line_total) AS revenue
            FROM shop.order_item oi
            JOIN shop.orders o ON o.id = oi.order_id
            WHERE o.created_at >= $1 AND o.status <> 'cancelled'
            GROUP BY oi.product_id
            ORDER BY revenue DESC
            LIMIT $2
            ",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// One row per UTC day for the last `days` days, including empty days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_sales(&self, days: i32) -> Result<Vec<DailySales>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailySales>(
            r"
            SELECT d::date AS day,
                   COUNT(o.id) AS orders,
                   COALESCE(SUM(o.total), 0) AS revenue
            FROM generate_series(
                (now() AT TIME ZONE 'UTC')::date - ($1 - 1),
                (now() AT TIME ZONE 'UTC')::date,
                interval '1 day'
            ) AS d
            LEFT JOIN shop.orders o
              ON (o.created_at AT TIME ZONE 'UTC')::date = d::date AND o.status <> 'cancelled'
            GROUP BY d
            ORDER BY d
            ",
        )
        .bind(days.max(1))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM shop.orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_events() {
        assert!(is_known_event("add_to_cart"));
        assert!(is_known_event("purchase"));
        assert!(!is_known_event("drop table"));
        assert!(!is_known_event(""));
    }
}
