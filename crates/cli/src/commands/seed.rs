//! Demo data for local development.
//!
//! ```bash
//! dewy seed demo
//! ```
//!
//! Safe to run repeatedly: rows whose slug, code or pattern already exist
//! are left alone.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use dewy_core::{CategoryId, Money};
use dewy_db::categories::CategoryInput;
use dewy_db::coupons::CouponInput;
use dewy_db::products::ProductInput;
use dewy_db::{
    CategoryRepository, CouponRepository, DeliveryRepository, ProductRepository,
    RepositoryError,
};

use super::ConnectError;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

struct DemoCategory {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
}

const CATEGORIES: &[DemoCategory] = &[
    DemoCategory {
        name: "Cleansers",
        slug: "cleansers",
        description: "Gentle daily face washes",
    },
    DemoCategory {
        name: "Serums",
        slug: "serums",
        description: "Concentrated actives",
    },
    DemoCategory {
        name: "Moisturizers",
        slug: "moisturizers",
        description: "Creams and gels for every skin type",
    },
    DemoCategory {
        name: "Sunscreens",
        slug: "sunscreens",
        description: "Broad-spectrum daily protection",
    },
];

struct DemoProduct {
    category: &'static str,
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    ingredients: &'static str,
    /// Whole currency units.
    price: i64,
    compare_at: Option<i64>,
    stock: i32,
}

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        category: "cleansers",
        name: "Oat Milk Gel Cleanser",
        slug: "oat-milk-gel-cleanser",
        description: "A low-foam gel that clears sunscreen without tightness.",
        ingredients: "Aqua, Avena Sativa Kernel Extract, Coco-Glucoside, Glycerin, Panthenol",
        price: 349,
        compare_at: None,
        stock: 120,
    },
    DemoProduct {
        category: "serums",
        name: "10% Niacinamide Serum",
        slug: "niacinamide-serum",
        description: "Evens tone and calms visible oiliness.",
        ingredients: "Aqua, Niacinamide, Zinc PCA, Pentylene Glycol, Xanthan Gum",
        price: 599,
        compare_at: Some(699),
        stock: 80,
    },
    DemoProduct {
        category: "serums",
        name: "Vitamin C Brightening Drops",
        slug: "vitamin-c-drops",
        description: "Stabilised ascorbyl glucoside for daily glow.",
        ingredients: "Aqua, Ascorbyl Glucoside, Ferulic Acid, Sodium Hyaluronate",
        price: 749,
        compare_at: None,
        stock: 6,
    },
    DemoProduct {
        category: "moisturizers",
        name: "Ceramide Barrier Cream",
        slug: "ceramide-barrier-cream",
        description: "Rich cream that repairs a stressed barrier overnight.",
        ingredients: "Aqua, Ceramide NP, Cholesterol, Squalane, Shea Butter",
        price: 649,
        compare_at: None,
        stock: 45,
    },
    DemoProduct {
        category: "sunscreens",
        name: "Invisible Fluid SPF 50",
        slug: "invisible-fluid-spf-50",
        description: "Weightless, no white cast, PA++++.",
        ingredients: "Aqua, Diethylamino Hydroxybenzoyl Hexyl Benzoate, Ethylhexyl Triazone",
        price: 499,
        compare_at: Some(549),
        stock: 0,
    },
];

struct DemoCoupon {
    code: &'static str,
    description: &'static str,
    percent: i32,
    max_discount: Option<i64>,
    min_order: i64,
    usage_limit: Option<i32>,
    valid_days: Option<i64>,
}

const COUPONS: &[DemoCoupon] = &[
    DemoCoupon {
        code: "WELCOME10",
        description: "10% off a first order",
        percent: 10,
        max_discount: Some(200),
        min_order: 0,
        usage_limit: None,
        valid_days: None,
    },
    DemoCoupon {
        code: "GLOW25",
        description: "Seasonal sale",
        percent: 25,
        max_discount: Some(500),
        min_order: 999,
        usage_limit: Some(100),
        valid_days: Some(30),
    },
];

/// Postal prefix, min days, max days.
const DELIVERY: &[(&str, i32, i32)] = &[
    ("110", 1, 2),
    ("400", 1, 3),
    ("560", 2, 3),
    ("5600", 1, 2),
    ("7", 4, 7),
];

/// Load the demo data set.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset or an insert fails.
pub async fn demo() -> Result<(), SeedError> {
    let pool = super::connect().await?;

    let categories = seed_categories(&pool).await?;
    let products = seed_products(&pool).await?;
    let coupons = seed_coupons(&pool).await?;
    let mappings = seed_delivery(&pool).await?;

    tracing::info!(
        categories,
        products,
        coupons,
        delivery_mappings = mappings,
        "Demo data loaded"
    );
    Ok(())
}

async fn seed_categories(pool: &PgPool) -> Result<usize, RepositoryError> {
    let repo = CategoryRepository::new(pool);
    let mut created = 0;
    for category in CATEGORIES {
        if repo.get_by_slug(category.slug).await?.is_some() {
            continue;
        }
        repo.create(&CategoryInput {
            name: category.name.to_string(),
            slug: category.slug.to_string(),
            description: Some(category.description.to_string()),
        })
        .await?;
        created += 1;
    }
    Ok(created)
}

async fn seed_products(pool: &PgPool) -> Result<usize, RepositoryError> {
    let categories = CategoryRepository::new(pool);
    let repo = ProductRepository::new(pool);
    let mut created = 0;
    for product in PRODUCTS {
        if repo.get_by_slug(product.slug).await?.is_some() {
            continue;
        }
        let category_id: Option<CategoryId> = categories
            .get_by_slug(product.category)
            .await?
            .map(|c| c.id);
        let input = ProductInput {
            category_id,
            name: product.name.to_string(),
            slug: product.slug.to_string(),
            description: product.description.to_string(),
            ingredients: Some(product.ingredients.to_string()),
            price: whole(product.price),
            compare_at_price: product.compare_at.map(whole),
            stock: product.stock,
            image_url: None,
            is_active: true,
        };
        // get_by_slug only sees active products; a deactivated one still owns its slug.
        match repo.create(&input).await {
            Ok(_) => created += 1,
            Err(RepositoryError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

async fn seed_coupons(pool: &PgPool) -> Result<usize, RepositoryError> {
    let repo = CouponRepository::new(pool);
    let now = Utc::now();
    let mut created = 0;
    for coupon in COUPONS {
        if repo.get_by_code(coupon.code).await?.is_some() {
            continue;
        }
        repo.create(&CouponInput {
            code: coupon.code.to_string(),
            description: Some(coupon.description.to_string()),
            discount_percent: coupon.percent,
            max_discount_amount: coupon.max_discount.map(whole),
            min_order_amount: whole(coupon.min_order),
            usage_limit: coupon.usage_limit,
            valid_from: now,
            valid_until: coupon.valid_days.map(|days| now + Duration::days(days)),
            is_active: true,
        })
        .await?;
        created += 1;
    }
    Ok(created)
}

async fn seed_delivery(pool: &PgPool) -> Result<usize, RepositoryError> {
    let repo = DeliveryRepository::new(pool);
    let mut created = 0;
    for &(pattern, min_days, max_days) in DELIVERY {
        match repo.create(pattern, min_days, max_days, true).await {
            Ok(_) => created += 1,
            Err(RepositoryError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

fn whole(units: i64) -> Money {
    Money::new(Decimal::from(units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_products_reference_demo_categories() {
        for product in PRODUCTS {
            assert!(
                CATEGORIES.iter().any(|c| c.slug == product.category),
                "{} has unknown category {}",
                product.slug,
                product.category
            );
        }
    }

    #[test]
    fn demo_delivery_windows_are_ordered() {
        for &(pattern, min_days, max_days) in DELIVERY {
            assert!(min_days <= max_days, "{pattern}");
        }
    }

    #[test]
    fn compare_at_prices_exceed_price() {
        for product in PRODUCTS {
            if let Some(compare_at) = product.compare_at {
                assert!(compare_at > product.price, "{}", product.slug);
            }
        }
    }
}
