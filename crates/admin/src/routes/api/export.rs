//! Order CSV export.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use dewy_db::OrderRepository;
use dewy_db::orders::ExportRow;

use crate::error::{AppError, JsonError};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Calendar days covered, `to` included, when `from` is omitted.
const DEFAULT_RANGE_DAYS: i64 = 30;

const HEADER: [&str; 14] = [
    "order_number",
    "created_at",
    "customer_email",
    "status",
    "items",
    "subtotal",
    "discount",
    "shipping",
    "total",
    "coupon_code",
    "payment_method",
    "payment_status",
    "city",
    "postal_code",
];

/// Inclusive date range, `YYYY-MM-DD`.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Resolve the query into a half-open `[from, to)` timestamp range.
fn range(
    query: &ExportQuery,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate, DateTime<Utc>, DateTime<Utc>), AppError> {
    let to = query.to.unwrap_or(today);
    let from = query
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_RANGE_DAYS - 1));
    if from > to {
        return Err(AppError::BadRequest(
            "from must be on or before to".to_string(),
        ));
    }
    let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = (to + Duration::days(1))
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    Ok((from, to, start, end))
}

/// Render rows as CSV with a header line.
///
/// # Errors
///
/// Returns `AppError::Internal` if the writer fails.
pub fn write_csv(rows: &[ExportRow]) -> Result<Vec<u8>, AppError> {
    let csv_error = |e: csv::Error| AppError::Internal(format!("csv: {e}"));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(csv_error)?;

    for row in rows {
        writer
            .write_record([
                row.order_number.clone(),
                row.created_at.to_rfc3339(),
                row.customer_email.clone(),
                row.status.as_str().to_string(),
                row.items.clone(),
                row.subtotal.plain(),
                row.discount_amount.plain(),
                row.shipping_fee.plain(),
                row.total.plain(),
                row.coupon_code.clone().unwrap_or_default(),
                row.payment_method.map(|m| m.to_string()).unwrap_or_default(),
                row.payment_status.map(|s| s.to_string()).unwrap_or_default(),
                row.ship_city.clone(),
                row.ship_postal_code.clone(),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv flush: {}", e.error())))
}

/// Download orders placed in the range as CSV.
#[instrument(skip(state, admin))]
pub async fn orders_csv(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, JsonError> {
    let (from, to, start, end) = range(&query, Utc::now().date_naive())?;

    let rows = OrderRepository::new(state.pool())
        .export_rows(start, end)
        .await?;
    let body = write_csv(&rows)?;

    tracing::info!(admin = %admin.id, %from, %to, rows = rows.len(), "orders exported");

    let disposition = format!("attachment; filename=\"orders-{from}-to-{to}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use dewy_core::{Money, OrderStatus, PaymentMethod, PaymentStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn csv_has_header_and_quoted_items() {
        let row = ExportRow {
            order_number: "DW-20260314-8HJ2KQ".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            customer_email: "asha@example.com".to_string(),
            status: OrderStatus::Shipped,
            items: "Barrier Serum x2; Gel Cleanser, 150ml x1".to_string(),
            subtotal: Money::from_cents(210_000),
            discount_amount: Money::from_cents(31_500),
            shipping_fee: Money::ZERO,
            total: Money::from_cents(178_500),
            coupon_code: Some("GLOW15".to_string()),
            payment_method: Some(PaymentMethod::Cod),
            payment_status: Some(PaymentStatus::Pending),
            ship_city: "Pune".to_string(),
            ship_postal_code: "411001".to_string(),
        };

        let csv = String::from_utf8(write_csv(&[row]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "order_number,created_at,customer_email,status,items,subtotal,discount,\
             shipping,total,coupon_code,payment_method,payment_status,city,postal_code"
        );
        assert_eq!(
            lines.next().unwrap(),
            "DW-20260314-8HJ2KQ,2026-03-14T09:30:00+00:00,asha@example.com,shipped,\
             \"Barrier Serum x2; Gel Cleanser, 150ml x1\",2100.00,315.00,0.00,1785.00,\
             GLOW15,cod,pending,Pune,411001"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_export_is_just_the_header() {
        let csv = String::from_utf8(write_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn default_range_is_last_30_days() {
        let query = ExportQuery {
            from: None,
            to: None,
        };
        let (from, to, start, end) = range(&query, date(2026, 3, 31)).unwrap();
        assert_eq!(from, date(2026, 3, 2));
        assert_eq!(to, date(2026, 3, 31));
        assert_eq!((to - from).num_days() + 1, DEFAULT_RANGE_DAYS);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let query = ExportQuery {
            from: Some(date(2026, 4, 2)),
            to: Some(date(2026, 4, 1)),
        };
        let err = range(&query, date(2026, 4, 30)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
