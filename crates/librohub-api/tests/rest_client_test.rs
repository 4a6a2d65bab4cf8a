#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use librohub_api::{Embed, Error, Filter, Query, RestClient, Table, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let key = SecretString::from("anon-key".to_string());
    let client =
        RestClient::from_api_key(&server.uri(), &key, &TransportConfig::default()).unwrap();
    (server, client)
}

// ── Select ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_books_with_category_embed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/books"))
        .and(query_param("select", "*,categories(category_name)"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "book_id": "b-1",
            "title": "Dune",
            "author": "Frank Herbert",
            "category": "c-1",
            "availability_status": true,
            "categories": { "category_name": "Science Fiction" }
        }])))
        .mount(&server)
        .await;

    let rows = client
        .select(&Query::table(Table::Books).embed(Embed::Category))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "Dune");
    assert_eq!(rows[0]["categories"]["category_name"], "Science Fiction");
}

#[tokio::test]
async fn test_select_open_loans_for_book() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/borrow_records"))
        .and(query_param("book_id", "eq.b-1"))
        .and(query_param("return_date", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let rows = client
        .select(
            &Query::table(Table::BorrowRecords)
                .filter(Filter::eq("book_id", "b-1"))
                .filter(Filter::is_null("return_date")),
        )
        .await
        .unwrap();

    assert!(rows.is_empty());
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_insert_requests_representation() {
    let (server, client) = setup().await;
    let row = json!({ "name": "Ada", "email": "ada@example.com" });

    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(header("prefer", "return=representation"))
        .and(body_json(&row))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "member_id": "m-1", "name": "Ada", "email": "ada@example.com", "phone": null
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = client.insert(Table::Members, &row).await.unwrap();
    assert_eq!(stored[0]["member_id"], "m-1");
}

#[tokio::test]
async fn test_update_sends_patch_with_filters() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/books"))
        .and(query_param("book_id", "eq.b-1"))
        .and(body_json(json!({ "availability_status": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "book_id": "b-1", "availability_status": false
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client
        .update(
            Table::Books,
            &json!({ "availability_status": false }),
            &[Filter::eq("book_id", "b-1")],
        )
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/books"))
        .and(query_param("book_id", "eq.b-9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete(Table::Books, &[Filter::eq("book_id", "b-9")])
        .await
        .unwrap();
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_structured_error_is_parsed() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/books"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23503",
            "message": "update or delete on table \"books\" violates foreign key constraint",
            "details": "Key is still referenced from table \"borrow_records\".",
            "hint": null
        })))
        .mount(&server)
        .await;

    let result = client
        .delete(Table::Books, &[Filter::eq("book_id", "b-1")])
        .await;

    match result {
        Err(Error::Rest {
            status,
            code,
            details,
            ..
        }) => {
            assert_eq!(status, 409);
            assert_eq!(code.as_deref(), Some("23503"));
            assert!(details.unwrap().contains("borrow_records"));
        }
        other => panic!("expected Rest error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/members"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .mount(&server)
        .await;

    let result = client.select(&Query::table(Table::Members)).await;
    assert!(
        matches!(result, Err(Error::InvalidApiKey)),
        "expected InvalidApiKey, got: {result:?}"
    );
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/librarian_actions"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .mount(&server)
        .await;

    let result = client
        .insert(Table::LibrarianActions, &json!({ "action_type": "BOOK_DELETED" }))
        .await;
    match result {
        Err(Error::PermissionDenied { message }) => {
            assert!(message.contains("row-level security"));
        }
        other => panic!("expected PermissionDenied, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let result = client.select(&Query::table(Table::Categories)).await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}
