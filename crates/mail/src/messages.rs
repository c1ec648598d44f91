//! Email bodies, rendered from askama templates.

use askama::Template;

use dewy_core::pricing::OrderQuote;
use dewy_core::{Money, OrderStatus, PaymentMethod};
use dewy_db::orders::{Order, OrderItem};

use crate::MailError;
use crate::transport::OutgoingEmail;

/// One line of an order email.
#[derive(Debug, Clone)]
pub struct OrderEmailLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Order details shared by the confirmation and admin alert.
#[derive(Debug, Clone)]
pub struct OrderEmail {
    pub order_number: String,
    pub customer_name: String,
    pub lines: Vec<OrderEmailLine>,
    pub quote: OrderQuote,
    pub coupon_code: Option<String>,
    pub shipping_address: String,
    pub delivery_window: Option<String>,
    pub payment_method: &'static str,
    pub order_url: String,
}

impl OrderEmail {
    #[must_use]
    pub fn new(
        order: &Order,
        items: &[OrderItem],
        payment_method: PaymentMethod,
        order_url: String,
    ) -> Self {
        Self {
            order_number: order.order_number.clone(),
            customer_name: order.ship_name.clone(),
            lines: items
                .iter()
                .map(|item| OrderEmailLine {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total,
                })
                .collect(),
            quote: order.quote(),
            coupon_code: order.coupon_code.clone(),
            shipping_address: order.shipping_address(),
            delivery_window: order.delivery_estimate().map(|e| e.to_string()),
            payment_method: payment_method.label(),
            order_url,
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderEmail,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderEmail,
}

#[derive(Template)]
#[template(path = "email/admin_new_order.html")]
struct AdminNewOrderHtml<'a> {
    order: &'a OrderEmail,
    customer_email: &'a str,
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/admin_new_order.txt")]
struct AdminNewOrderText<'a> {
    order: &'a OrderEmail,
    customer_email: &'a str,
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/status_update.html")]
struct StatusUpdateHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    headline: &'a str,
    note: Option<&'a str>,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/status_update.txt")]
struct StatusUpdateText<'a> {
    name: &'a str,
    order_number: &'a str,
    headline: &'a str,
    note: Option<&'a str>,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

/// Customer-facing sentence for a status change.
#[must_use]
pub const fn status_headline(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "We've received your order.",
        OrderStatus::Confirmed => "Your order is confirmed.",
        OrderStatus::Processing => "We're packing your order.",
        OrderStatus::Shipped => "Your order is on its way.",
        OrderStatus::Delivered => "Your order has been delivered. Enjoy!",
        OrderStatus::Cancelled => "Your order has been cancelled.",
    }
}

pub(crate) fn order_confirmation(to: &str, order: &OrderEmail) -> Result<OutgoingEmail, MailError> {
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: format!("Your Dewy order {}", order.order_number),
        text: OrderConfirmationText { order }.render()?,
        html: OrderConfirmationHtml { order }.render()?,
    })
}

pub(crate) fn admin_new_order(
    to: &str,
    order: &OrderEmail,
    customer_email: &str,
    admin_url: &str,
) -> Result<OutgoingEmail, MailError> {
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: format!("New order {} ({})", order.order_number, order.quote.total),
        text: AdminNewOrderText {
            order,
            customer_email,
            admin_url,
        }
        .render()?,
        html: AdminNewOrderHtml {
            order,
            customer_email,
            admin_url,
        }
        .render()?,
    })
}

pub(crate) fn status_update(
    to: &str,
    name: &str,
    order_number: &str,
    status: OrderStatus,
    note: Option<&str>,
    order_url: &str,
) -> Result<OutgoingEmail, MailError> {
    let headline = status_headline(status);
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: format!("Order {order_number}: {}", status.label()),
        text: StatusUpdateText {
            name,
            order_number,
            headline,
            note,
            order_url,
        }
        .render()?,
        html: StatusUpdateHtml {
            name,
            order_number,
            headline,
            note,
            order_url,
        }
        .render()?,
    })
}

pub(crate) fn welcome(to: &str, name: &str, shop_url: &str) -> Result<OutgoingEmail, MailError> {
    Ok(OutgoingEmail {
        to: to.to_string(),
        subject: "Welcome to Dewy".to_string(),
        text: WelcomeText { name, shop_url }.render()?,
        html: WelcomeHtml { name, shop_url }.render()?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> OrderEmail {
        OrderEmail {
            order_number: "DW-20261018-7KQ2MX".to_string(),
            customer_name: "Mira <Admin>".to_string(),
            lines: vec![OrderEmailLine {
                name: "Barrier Repair Serum".to_string(),
                quantity: 2,
                unit_price: Money::const_cents(89_900),
                line_total: Money::const_cents(179_800),
            }],
            quote: OrderQuote {
                subtotal: Money::const_cents(179_800),
                discount: Money::const_cents(17_980),
                shipping_fee: Money::ZERO,
                total: Money::const_cents(161_820),
            },
            coupon_code: Some("GLOW10".to_string()),
            shipping_address: "12 Lake Road, Pune, MH, 411001".to_string(),
            delivery_window: Some("3-5 business days".to_string()),
            payment_method: "Cash on delivery",
            order_url: "https://dewy.shop/orders/DW-20261018-7KQ2MX".to_string(),
        }
    }

    #[test]
    fn confirmation_lists_lines_and_totals() {
        let email = order_confirmation("mira@example.com", &sample()).unwrap();
        assert_eq!(email.subject, "Your Dewy order DW-20261018-7KQ2MX");
        assert!(email.text.contains("Barrier Repair Serum x2"));
        assert!(email.text.contains("$1618.20"));
        assert!(email.text.contains("GLOW10"));
        assert!(email.html.contains("3-5 business days"));
    }

    #[test]
    fn html_body_escapes_customer_input() {
        let email = order_confirmation("mira@example.com", &sample()).unwrap();
        assert!(!email.html.contains("<Admin>"));
        assert!(email.html.contains("&lt;Admin&gt;"));
        assert!(email.text.contains("Mira <Admin>"));
    }

    #[test]
    fn status_update_uses_headline_and_note() {
        let email = status_update(
            "mira@example.com",
            "Mira",
            "DW-20261018-7KQ2MX",
            OrderStatus::Shipped,
            Some("Tracking: BD123"),
            "https://dewy.shop/orders/DW-20261018-7KQ2MX",
        )
        .unwrap();
        assert_eq!(email.subject, "Order DW-20261018-7KQ2MX: Shipped");
        assert!(email.text.contains("on its way"));
        assert!(email.text.contains("Tracking: BD123"));
    }

    #[test]
    fn admin_alert_mentions_customer() {
        let email = admin_new_order(
            "ops@dewy.shop",
            &sample(),
            "mira@example.com",
            "https://admin.dewy.shop",
        )
        .unwrap();
        assert!(email.subject.starts_with("New order DW-20261018-7KQ2MX"));
        assert!(email.text.contains("mira@example.com"));
    }
}
