//! Sales and storefront event reports.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use tracing::instrument;

use dewy_core::Money;
use dewy_db::AnalyticsRepository;
use dewy_db::analytics::{DailySales, EventCount, SalesSummary, StatusCount, TopProduct};

use crate::error::Result;
use crate::filters;
use crate::middleware::AdminPage;
use crate::state::AppState;

const DEFAULT_DAYS: i32 = 30;
const MAX_DAYS: i32 = 365;
const TOP_PRODUCTS: i64 = 10;

/// Period choices offered in the page header.
const PERIODS: [i32; 4] = [7, 30, 90, 365];

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i32>,
}

/// A period choice in the page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodLink {
    pub days: i32,
    pub selected: bool,
}

fn period_links(days: i32) -> Vec<PeriodLink> {
    PERIODS
        .iter()
        .map(|&d| PeriodLink {
            days: d,
            selected: d == days,
        })
        .collect()
}

/// One bar of the daily revenue chart.
#[derive(Debug, Clone)]
pub struct DayBar {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Money,
    /// Bar width, 0 to 100, relative to the best day in the period.
    pub percent: u8,
}

#[derive(Template, WebTemplate)]
#[template(path = "analytics.html")]
pub struct AnalyticsTemplate {
    pub page: AdminPage,
    pub days: i32,
    pub periods: Vec<PeriodLink>,
    pub summary: SalesSummary,
    pub daily: Vec<DayBar>,
    pub top_products: Vec<TopProduct>,
    pub events: Vec<EventCount>,
    pub statuses: Vec<StatusCount>,
}

/// Requested period, clamped to a year.
fn period(days: Option<i32>) -> i32 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

fn bars(daily: Vec<DailySales>) -> Vec<DayBar> {
    let best = daily
        .iter()
        .map(|d| d.revenue.amount())
        .max()
        .unwrap_or(Decimal::ZERO);

    daily
        .into_iter()
        .map(|d| {
            let percent = if best.is_zero() {
                0
            } else {
                (d.revenue.amount() * Decimal::ONE_HUNDRED / best)
                    .round()
                    .to_u8()
                    .unwrap_or(100)
            };
            DayBar {
                day: d.day,
                orders: d.orders,
                revenue: d.revenue,
                percent,
            }
        })
        .collect()
}

/// Analytics overview for the last `?days=` days.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse> {
    let days = period(query.days);
    let since = Utc::now() - Duration::days(i64::from(days));

    let analytics = AnalyticsRepository::new(state.pool());
    let summary = analytics.summary(since).await?;
    let daily = analytics.daily_sales(days).await?;
    let top_products = analytics.top_products(since, TOP_PRODUCTS).await?;
    let events = analytics.events_by_type(since).await?;
    let statuses = analytics.orders_by_status().await?;

    Ok(AnalyticsTemplate {
        page,
        days,
        periods: period_links(days),
        summary,
        daily: bars(daily),
        top_products,
        events,
        statuses,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day(d: u32, cents: i64) -> DailySales {
        DailySales {
            day: NaiveDate::from_ymd_opt(2026, 3, d).unwrap_or_default(),
            orders: 1,
            revenue: Money::from_cents(cents),
        }
    }

    #[test]
    fn period_is_clamped() {
        assert_eq!(period(None), 30);
        assert_eq!(period(Some(0)), 1);
        assert_eq!(period(Some(7)), 7);
        assert_eq!(period(Some(10_000)), 365);
    }

    #[test]
    fn current_period_is_selected() {
        let links = period_links(90);
        assert_eq!(links.len(), PERIODS.len());
        assert!(links.iter().filter(|l| l.selected).all(|l| l.days == 90));
        assert!(!period_links(12).iter().any(|l| l.selected));
    }

    #[test]
    fn bars_scale_to_best_day() {
        let bars = bars(vec![day(1, 50_000), day(2, 100_000), day(3, 0)]);
        let percents: Vec<u8> = bars.iter().map(|b| b.percent).collect();
        assert_eq!(percents, vec![50, 100, 0]);
    }

    #[test]
    fn empty_period_has_flat_bars() {
        let bars = bars(vec![day(1, 0), day(2, 0)]);
        assert!(bars.iter().all(|b| b.percent == 0));
    }
}
