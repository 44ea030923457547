use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use gstbook_api::app::AppServices;
use gstbook_auth::JwtClaims;
use gstbook_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let services = Arc::new(AppServices::in_memory());
        let app = gstbook_api::app::build_app(JWT_SECRET.to_string(), services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, user: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn send(req: reqwest::RequestBuilder, expected: StatusCode) -> Value {
    let res = req.send().await.unwrap();
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    assert_eq!(status, expected, "unexpected status, body={body}");
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap()
    }
}

/// Registers a Maharashtra client and returns its id.
async fn create_client(http: &reqwest::Client, srv: &TestServer, token: &str) -> String {
    let body = send(
        http.post(srv.url("/clients")).bearer_auth(token).json(&json!({
            "name": "Sharma Traders",
            "gstin": "27aapfu0939f1zv",
            "address": "12 FC Road, Pune, Maharashtra",
        })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(body["gstin"], "27AAPFU0939F1ZV");
    assert_eq!(body["invoice_prefix"], "INV-");
    body["id"].as_str().unwrap().to_string()
}

async fn create_customer(
    http: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    client_id: &str,
    body: Value,
) -> String {
    let created = send(
        http.post(srv.url(&format!("/clients/{client_id}/customers")))
            .bearer_auth(token)
            .json(&body),
        StatusCode::CREATED,
    )
    .await;
    created["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();

    let res = http.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = http.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = http
        .get(srv.url("/clients"))
        .bearer_auth(mint_jwt("wrong-secret", UserId::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let user = UserId::new();

    let body = send(
        http.get(srv.url("/whoami")).bearer_auth(mint_jwt(JWT_SECRET, user)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["user_id"].as_str().unwrap(), user.to_string());
}

#[tokio::test]
async fn invoice_totals_are_computed_server_side() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, UserId::new());
    let client_id = create_client(&http, &srv, &token).await;

    // Walk-in customer: no GSTIN, no place of supply, so intra-state.
    let local = create_customer(&http, &srv, &token, &client_id, json!({ "name": "Walk-in" })).await;
    let invoice = send(
        http.post(srv.url(&format!("/clients/{client_id}/invoices")))
            .bearer_auth(&token)
            .json(&json!({
                "customer_id": local,
                "date": "2026-04-01",
                "items": [
                    { "description": "Steel rods", "hsn": "7214", "quantity": 2, "rate": "500", "gst_rate": 18 }
                ],
                // Stale figures from the form are ignored.
                "subtotal": 1,
                "total": 1,
            })),
        StatusCode::CREATED,
    )
    .await;

    assert_eq!(invoice["number"], "INV-0001");
    assert_eq!(invoice["supply_type"], "intra_state");
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["is_b2c"], true);
    assert_eq!(invoice["due_date"], "2026-04-16");
    assert_eq!(invoice["items"][0]["line_no"], 1);
    assert_eq!(invoice["items"][0]["amount"], "1000.00");
    assert_eq!(invoice["items"][0]["cgst"], "90.00");
    assert_eq!(invoice["items"][0]["sgst"], "90.00");
    assert_eq!(invoice["items"][0]["igst"], "0.00");
    assert_eq!(invoice["totals"]["subtotal"], "1000.00");
    assert_eq!(invoice["totals"]["tax_total"], "180.00");
    assert_eq!(invoice["totals"]["total"], "1180.00");

    // Karnataka customer: inter-state, IGST only.
    let karnataka = create_customer(
        &http,
        &srv,
        &token,
        &client_id,
        json!({ "name": "Bangalore Mills", "gstin": "29AAGCB7383J1Z4", "email": "accounts@blr-mills.in" }),
    )
    .await;
    let invoice = send(
        http.post(srv.url(&format!("/clients/{client_id}/invoices")))
            .bearer_auth(&token)
            .json(&json!({
                "customer_id": karnataka,
                "date": "2026-04-02",
                "items": [
                    { "description": "Cable", "quantity": 1, "rate": 100, "gst_rate": 5 },
                    { "description": "Clamp", "quantity": "3", "rate": "33.33", "gst_rate": "12" }
                ],
            })),
        StatusCode::CREATED,
    )
    .await;

    assert_eq!(invoice["number"], "INV-0002");
    assert_eq!(invoice["supply_type"], "inter_state");
    assert_eq!(invoice["is_b2c"], false);
    assert_eq!(invoice["items"][1]["igst"], "12.00");
    assert_eq!(invoice["totals"]["subtotal"], "199.99");
    assert_eq!(invoice["totals"]["tax_total"], "17.00");
    assert_eq!(invoice["totals"]["total"], "216.99");

    // Listing is newest first.
    let list = send(
        http.get(srv.url(&format!("/clients/{client_id}/invoices"))).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    let numbers: Vec<&str> = list["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["INV-0002", "INV-0001"]);
}

#[tokio::test]
async fn preview_matches_what_gets_saved() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, UserId::new());
    let client_id = create_client(&http, &srv, &token).await;
    let customer = create_customer(&http, &srv, &token, &client_id, json!({ "name": "Walk-in" })).await;

    let items = json!([
        { "description": "Widget", "quantity": 3, "rate": 33.33, "gst_rate": 12 },
        { "description": "Gadget", "quantity": 7, "rate": 0.99, "gst_rate": 28 }
    ]);

    let preview = send(
        http.post(srv.url(&format!("/clients/{client_id}/invoices/preview")))
            .bearer_auth(&token)
            .json(&json!({ "place_of_supply": "Bengaluru, Karnataka", "items": items })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(preview["supply_type"], "inter_state");
    assert_eq!(preview["lines"].as_array().unwrap().len(), 2);

    let saved = send(
        http.post(srv.url(&format!("/clients/{client_id}/invoices")))
            .bearer_auth(&token)
            .json(&json!({
                "customer_id": customer,
                "date": "2026-05-10",
                "place_of_supply": "29",
                "items": items,
            })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(saved["totals"], preview["totals"]);
    assert_eq!(saved["supply_type"], preview["supply_type"]);

    // Nothing was persisted by the preview.
    let list = send(
        http.get(srv.url(&format!("/clients/{client_id}/invoices"))).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_input_names_the_field() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, UserId::new());
    let client_id = create_client(&http, &srv, &token).await;
    let customer = create_customer(&http, &srv, &token, &client_id, json!({ "name": "Walk-in" })).await;
    let url = srv.url(&format!("/clients/{client_id}/invoices"));

    let cases = [
        (
            json!({ "customer_id": customer, "date": "2026-04-01",
                    "items": [{ "description": "x", "quantity": 0, "rate": 10, "gst_rate": 18 }] }),
            "items.0.quantity",
        ),
        (
            json!({ "customer_id": customer, "date": "2026-04-01",
                    "items": [{ "description": "x", "quantity": 1, "rate": "ten", "gst_rate": 18 }] }),
            "items.0.rate",
        ),
        (json!({ "customer_id": customer, "date": "2026-04-01", "items": [] }), "items"),
        (json!({ "date": "2026-04-01", "items": [] }), "customer_id"),
        (
            json!({ "customer_id": customer, "date": "2026-04-01", "place_of_supply": "Atlantis",
                    "items": [{ "description": "x", "quantity": 1, "rate": 10, "gst_rate": 18 }] }),
            "place_of_supply",
        ),
        (
            json!({ "customer_id": customer, "date": "2026-04-01",
                    "items": [{ "description": "x", "quantity": 1, "rate": "10000000000000", "gst_rate": 18 }] }),
            "items.0.amount",
        ),
        (
            json!({ "customer_id": customer, "date": "2026-04-01",
                    "items": [{ "description": "x", "quantity": 1, "rate": "600000000000", "gst_rate": 0 },
                              { "description": "y", "quantity": 1, "rate": "600000000000", "gst_rate": 0 }] }),
            "total",
        ),
    ];

    for (body, field) in cases {
        let err = send(http.post(&url).bearer_auth(&token).json(&body), StatusCode::BAD_REQUEST).await;
        assert_eq!(err["error"], "validation_error");
        assert_eq!(err["field"], field, "body={body}");
    }

    let err = send(
        http.post(srv.url("/clients")).bearer_auth(&token).json(&json!({
            "name": "Bad GSTIN Co",
            "gstin": "27AAPFU0939F1ZX",
            "address": "Pune",
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(err["field"], "gstin");
}

#[tokio::test]
async fn clients_are_private_to_their_owner() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let owner = mint_jwt(JWT_SECRET, UserId::new());
    let stranger = mint_jwt(JWT_SECRET, UserId::new());
    let client_id = create_client(&http, &srv, &owner).await;

    let list = send(http.get(srv.url("/clients")).bearer_auth(&stranger), StatusCode::OK).await;
    assert!(list["items"].as_array().unwrap().is_empty());

    for path in [
        format!("/clients/{client_id}"),
        format!("/clients/{client_id}/customers"),
        format!("/clients/{client_id}/invoices"),
    ] {
        let res = http.get(srv.url(&path)).bearer_auth(&stranger).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "path={path}");
    }

    let res = http
        .delete(srv.url(&format!("/clients/{client_id}")))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = http
        .get(srv.url("/clients/not-a-uuid"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invoice_lifecycle_locks_sent_invoices() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, UserId::new());
    let client_id = create_client(&http, &srv, &token).await;
    let customer = create_customer(&http, &srv, &token, &client_id, json!({ "name": "Walk-in" })).await;

    let created = send(
        http.post(srv.url(&format!("/clients/{client_id}/invoices")))
            .bearer_auth(&token)
            .json(&json!({
                "customer_id": customer,
                "date": "2026-04-01",
                "items": [{ "description": "Service", "quantity": 1, "rate": 100, "gst_rate": 18 }],
            })),
        StatusCode::CREATED,
    )
    .await;
    let invoice_url = srv.url(&format!(
        "/clients/{client_id}/invoices/{}",
        created["id"].as_str().unwrap()
    ));

    // Draft: items are replaced wholesale and totals recomputed.
    let updated = send(
        http.put(&invoice_url).bearer_auth(&token).json(&json!({
            "items": [{ "description": "Service", "quantity": 4, "rate": 25, "gst_rate": 12 }],
        })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);
    assert_eq!(updated["totals"]["total"], "112.00");

    // Changing the place of supply re-derives the split on existing items.
    let moved = send(
        http.put(&invoice_url)
            .bearer_auth(&token)
            .json(&json!({ "place_of_supply": "Tamil Nadu" })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(moved["supply_type"], "inter_state");
    assert_eq!(moved["items"][0]["igst"], "12.00");
    assert_eq!(moved["totals"]["total"], "112.00");

    send(
        http.put(&invoice_url).bearer_auth(&token).json(&json!({ "status": "sent" })),
        StatusCode::OK,
    )
    .await;

    let err = send(
        http.put(&invoice_url).bearer_auth(&token).json(&json!({
            "items": [{ "description": "Service", "quantity": 9, "rate": 25, "gst_rate": 12 }],
        })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(err["error"], "invariant_violation");

    let paid = send(
        http.put(&invoice_url).bearer_auth(&token).json(&json!({ "status": "paid" })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["totals"]["total"], "112.00");

    // The customer is still referenced.
    let res = http
        .delete(srv.url(&format!("/clients/{client_id}/customers/{customer}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = http.delete(&invoice_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = http.get(&invoice_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = http
        .delete(srv.url(&format!("/clients/{client_id}/customers/{customer}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn duplicate_invoice_numbers_conflict() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, UserId::new());
    let client_id = create_client(&http, &srv, &token).await;
    let customer = create_customer(&http, &srv, &token, &client_id, json!({ "name": "Walk-in" })).await;
    let url = srv.url(&format!("/clients/{client_id}/invoices"));
    let body = json!({
        "customer_id": customer,
        "number": "SH/2026/001",
        "date": "2026-04-01",
        "items": [{ "description": "Service", "quantity": 1, "rate": 100, "gst_rate": 18 }],
    });

    send(http.post(&url).bearer_auth(&token).json(&body), StatusCode::CREATED).await;
    let err = send(http.post(&url).bearer_auth(&token).json(&body), StatusCode::CONFLICT).await;
    assert_eq!(err["error"], "conflict");

    // A generated number skips ones already taken.
    let mut generated = body.clone();
    generated.as_object_mut().unwrap().remove("number");
    let created = send(http.post(&url).bearer_auth(&token).json(&generated), StatusCode::CREATED).await;
    assert_eq!(created["number"], "INV-0002");
}
