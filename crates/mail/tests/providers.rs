//! Provider wire formats, checked against a local `wiremock` server.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dewy_mail::{MailConfig, MailError, Mailer, OutgoingEmail, ProviderConfig};

fn message() -> OutgoingEmail {
    OutgoingEmail {
        to: "mira@example.com".to_string(),
        subject: "Welcome to Dewy".to_string(),
        text: "Hi Mira".to_string(),
        html: "<p>Hi Mira</p>".to_string(),
    }
}

fn mailer(provider: ProviderConfig) -> Mailer {
    Mailer::new(&MailConfig {
        provider,
        from_address: "Dewy <hello@dewy.shop>".to_string(),
        admin_notification: None,
    })
    .expect("mailer should build")
}

#[tokio::test]
async fn resend_posts_bearer_authenticated_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test_key"))
        .and(body_partial_json(json!({
            "from": "Dewy <hello@dewy.shop>",
            "to": ["mira@example.com"],
            "subject": "Welcome to Dewy",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "abc" })))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = mailer(ProviderConfig::Resend {
        api_key: SecretString::from("re_test_key"),
        endpoint: format!("{}/emails", server.uri()),
    });

    mailer.send(&message()).await.expect("send should succeed");
}

#[tokio::test]
async fn sendgrid_uses_personalizations_and_bare_from() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.test"))
        .and(body_partial_json(json!({
            "personalizations": [{ "to": [{ "email": "mira@example.com" }] }],
            "from": { "email": "hello@dewy.shop" },
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = mailer(ProviderConfig::SendGrid {
        api_key: SecretString::from("SG.test"),
        endpoint: format!("{}/v3/mail/send", server.uri()),
    });

    mailer.send(&message()).await.expect("send should succeed");
}

#[tokio::test]
async fn provider_rejection_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
        .mount(&server)
        .await;

    let mailer = mailer(ProviderConfig::Resend {
        api_key: SecretString::from("re_test_key"),
        endpoint: format!("{}/emails", server.uri()),
    });

    let err = mailer.send(&message()).await.expect_err("should fail");
    match err {
        MailError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "invalid from");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_mailer_skips_sends() {
    let mailer = Mailer::disabled();
    assert!(!mailer.is_enabled());
    mailer.send(&message()).await.expect("disabled send is a no-op");
    mailer
        .send_welcome("mira@example.com", "Mira", "https://dewy.shop")
        .await
        .expect("rendering and skipping should succeed");
}

#[tokio::test]
async fn admin_alert_without_recipient_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mailer = mailer(ProviderConfig::Resend {
        api_key: SecretString::from("re_test_key"),
        endpoint: format!("{}/emails", server.uri()),
    });

    let order = dewy_mail::OrderEmail {
        order_number: "DW-20261018-ABCDEF".to_string(),
        customer_name: "Mira".to_string(),
        lines: Vec::new(),
        quote: dewy_core::pricing::OrderQuote::default(),
        coupon_code: None,
        shipping_address: "12 Lake Road".to_string(),
        delivery_window: None,
        payment_method: "Cash on delivery",
        order_url: "https://dewy.shop/orders/DW-20261018-ABCDEF".to_string(),
    };
    mailer
        .send_admin_new_order(&order, "mira@example.com", "https://admin.dewy.shop")
        .await
        .expect("no recipient means nothing to do");
}
