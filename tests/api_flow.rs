use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use discount_offer_service::config::UploadConfig;
use discount_offer_service::db::MemRepository;
use discount_offer_service::{build_router, AppState, DiscountingService};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 16).unwrap()
}

fn app_with_limit(max_bytes: usize) -> Router {
    let service = DiscountingService::new(Arc::new(MemRepository::new()), Default::default())
        .with_clock(fixed_today);
    build_router(AppState::new(service, UploadConfig { max_bytes }))
}

fn app() -> Router {
    app_with_limit(10 * 1024 * 1024)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

async fn upload_sample(app: &Router) {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/invoices/upload",
            json!({
                "supplierId": "supplier1",
                "invoices": [
                    {
                        "InvoiceID": "INV-001236",
                        "InvoiceAmount": "₹3,78,900",
                        "InvoiceDate": "05/06/2023",
                        "DueDate": "05/08/2023",
                        "BuyerName": "Acme Corp",
                        "Status": "Pending"
                    },
                    {
                        "InvoiceID": "INV-001237",
                        "InvoiceAmount": 50000,
                        "InvoiceDate": "06/06/2023",
                        "DueDate": "06/08/2023",
                        "BuyerName": "Globex"
                    }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn health_check_works() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn quote_submit_and_accept() {
    let app = app();
    upload_sample(&app).await;

    let (status, invoices) = send(&app, get("/api/invoices?supplierId=supplier1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoices[0]["invoiceId"], "INV-001236");
    assert_eq!(invoices[0]["dueDate"], "05/08/2023");
    let id = invoices[0]["id"].as_i64().unwrap();

    let (status, quote) = send(&app, get(&format!("/api/invoices/{id}/quote?rate=2.5"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["discountValue"], 9472.5);
    assert_eq!(quote["discountedAmount"], 369427.5);
    assert_eq!(quote["earlyPaymentDate"], "19/06/2023");
    assert_eq!(quote["daysRemaining"], 47);
    assert_eq!(quote["display"]["discountedAmount"], "₹3,69,427.50");
    assert_eq!(quote["display"]["discountRate"], "2.50%");

    let (status, offer) = send(
        &app,
        json_request(
            Method::POST,
            "/api/discount-offers",
            json!({
                "invoiceId": id,
                "discountRate": 2.5,
                "supplierId": "supplier1",
                "supplierName": "Supplier Company",
                "discountValue": quote["discountValue"],
                "dcfValue": quote["dcfValue"],
                "earlyPaymentDate": quote["earlyPaymentDate"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(offer["status"], "pending");
    let offer_id = offer["id"].as_i64().unwrap();

    let (_, pending) = send(&app, get("/api/discount-offers/pending")).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["invoice"]["status"], "pending_approval");

    let (status, decided) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/discount-offers/{offer_id}"),
            json!({"status": "accepted"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "accepted");

    let (_, invoices) = send(&app, get("/api/invoices?supplierId=supplier1")).await;
    assert_eq!(invoices[0]["status"], "completed");

    let (_, kpi) = send(&app, get("/api/kpi/supplier?userId=supplier1")).await;
    assert_eq!(kpi["invoiceCount"], 2);
    assert_eq!(kpi["discountValue"], 9472.5);
    assert_eq!(kpi["avgDiscountRate"], 2.5);

    let (_, suppliers) = send(&app, get("/api/suppliers")).await;
    assert_eq!(suppliers, json!(["Supplier Company"]));
    let (_, buyers) = send(&app, get("/api/buyers")).await;
    assert_eq!(buyers, json!(["Acme Corp", "Globex"]));
}

#[tokio::test]
async fn error_responses_carry_a_message() {
    let app = app();
    upload_sample(&app).await;

    let (status, body) = send(&app, get("/api/invoices")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Supplier ID is required");

    let (status, body) = send(&app, get("/api/kpi/admin?userId=u1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid role");

    let (status, body) = send(
        &app,
        json_request(Method::PATCH, "/api/discount-offers/1", json!({"status": "pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status");

    let (status, body) = send(
        &app,
        json_request(Method::PATCH, "/api/discount-offers/99", json!({"status": "accepted"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("99"));

    let (status, _) = send(&app, get("/api/invoices/1/quote?rate=9")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(Method::PATCH, "/api/invoices/1", json!({"unknownField": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn malformed_query_and_path_values_are_json_errors() {
    let app = app();
    upload_sample(&app).await;

    let (status, body) = send(&app, get("/api/invoices/1/quote?rate=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        json_request(Method::PATCH, "/api/discount-offers/xyz", json!({"status": "accepted"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = send(&app, get("/api/invoices/abc/quote?rate=2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn invoice_patch_cannot_bypass_offer_decision() {
    let app = app();
    upload_sample(&app).await;

    let (status, offer) = send(
        &app,
        json_request(
            Method::POST,
            "/api/discount-offers",
            json!({
                "invoiceId": 1,
                "discountRate": 2.5,
                "supplierId": "supplier1",
                "supplierName": "Supplier Company"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let offer_id = offer["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        json_request(Method::PATCH, "/api/invoices/1", json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        json_request(Method::PATCH, "/api/invoices/1", json!({"invoiceAmount": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].is_string());

    let (status, decided) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/discount-offers/{offer_id}"),
            json!({"status": "accepted"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "accepted");

    let (_, invoices) = send(&app, get("/api/invoices?supplierId=supplier1")).await;
    assert_eq!(invoices[0]["status"], "completed");
    assert_eq!(invoices[0]["invoiceAmount"], 378900.0);

    let (_, pending) = send(&app, get("/api/discount-offers/pending")).await;
    assert!(pending.as_array().unwrap().is_empty());

    let (status, updated) = send(
        &app,
        json_request(Method::PATCH, "/api/invoices/2", json!({"buyerName": "Globex Ltd"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["buyerName"], "Globex Ltd");
    assert_eq!(updated["status"], "pending");
}

#[tokio::test]
async fn stale_quote_and_duplicate_offer_are_refused() {
    let app = app();
    upload_sample(&app).await;

    let offer = |discount_value: f64| {
        json_request(
            Method::POST,
            "/api/discount-offers",
            json!({
                "invoiceId": 1,
                "discountRate": 2.5,
                "supplierId": "supplier1",
                "supplierName": "Supplier Company",
                "discountValue": discount_value
            }),
        )
    };

    let (status, body) = send(&app, offer(9000.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Stale quote"));

    let (status, _) = send(&app, offer(9472.5)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, offer(9472.5)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejection_keeps_invoice_pending_approval() {
    let app = app();
    upload_sample(&app).await;

    let (_, offer) = send(
        &app,
        json_request(
            Method::POST,
            "/api/discount-offers",
            json!({
                "invoiceId": 2,
                "discountRate": 1.0,
                "supplierId": "supplier1",
                "supplierName": "Supplier Company"
            }),
        ),
    )
    .await;
    let offer_id = offer["id"].as_i64().unwrap();

    let (status, decided) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/discount-offers/{offer_id}"),
            json!({"status": "rejected"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["status"], "rejected");

    let (_, invoices) = send(&app, get("/api/invoices?supplierId=supplier1")).await;
    assert_eq!(invoices[1]["status"], "pending_approval");

    let (status, _) = send(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/discount-offers/{offer_id}"),
            json!({"status": "accepted"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn csv_upload_checks_type_size_and_columns() {
    let csv = "InvoiceID,InvoiceAmount,InvoiceDate,DueDate,BuyerName,Status\n\
               INV-1,\"₹1,000.50\",01/06/2023,01/08/2023,Acme Corp,pending\n";
    let csv_request = |content_type: &str, body: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/invoices/upload/csv?supplierId=supplier1")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let app = app();
    let (status, body) = send(&app, csv_request("text/csv", csv)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 1);

    let (_, invoices) = send(&app, get("/api/invoices?supplierId=supplier1")).await;
    assert_eq!(invoices[0]["invoiceAmount"], 1000.5);

    let (status, _) = send(&app, csv_request("application/pdf", csv)).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, body) = send(
        &app,
        csv_request("text/csv", "InvoiceID,InvoiceAmount\nINV-2,10\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("DueDate"));

    let small = app_with_limit(32);
    let (status, _) = send(&small, csv_request("text/csv", csv)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn auto_approval_settings_round_trip() {
    let app = app();

    let (status, defaults) = send(&app, get("/api/auto-approval-settings?userId=buyer1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults, json!({"enabled": false, "maxDiscountRate": 2.5, "maxAmount": 100000.0}));

    let (status, saved) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auto-approval-settings",
            json!({"userId": "buyer1", "enabled": true, "maxDiscountRate": 3.0, "maxAmount": 50000}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved["enabled"], true);

    let (_, stored) = send(&app, get("/api/auto-approval-settings?userId=buyer1")).await;
    assert_eq!(stored["maxAmount"], 50000.0);
    assert_eq!(stored["userId"], "buyer1");

    let (status, _) = send(&app, get("/api/auto-approval-settings")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
