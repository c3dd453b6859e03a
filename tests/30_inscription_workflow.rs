mod common;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{registrant, TestServer};
use secourisme_api::testing::TEST_ADMIN_EMAIL;

async fn register(server: &TestServer, formation_id: &str, email: &str) -> Result<String> {
    let res = server
        .post("/api/inscriptions")
        .json(&registrant(formation_id, email))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    body["data"]["id"]
        .as_str()
        .map(str::to_string)
        .context("inscription id missing")
}

async fn set_status(server: &TestServer, id: &str, status: &str) -> Result<reqwest::Response> {
    Ok(server
        .admin(Method::PUT, &format!("/api/inscriptions/admin/{}/status", id))
        .json(&json!({ "status": status }))
        .send()
        .await?)
}

#[tokio::test]
async fn registration_takes_a_seat_and_notifies() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(3).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();

    let res = server
        .post("/api/inscriptions")
        .json(&registrant(formation_id, "lea.martin@example.org"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["notified"], false);

    assert_eq!(server.available_seats(formation_id).await?, 2);
    assert_eq!(server.mailer.sent().len(), 2);
    assert_eq!(server.mailer.sent_to("lea.martin@example.org").len(), 1);
    assert_eq!(server.mailer.sent_to(TEST_ADMIN_EMAIL).len(), 1);
    Ok(())
}

#[tokio::test]
async fn registration_validates_fields() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server
        .post("/api/inscriptions")
        .json(&json!({ "first_name": "Léa", "email": "not-an-email", "birth_date": "21/03/1998" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    for field in ["formation_id", "last_name", "email", "phone", "birth_date"] {
        assert!(body["field_errors"][field].is_string(), "missing error for {}", field);
    }

    let res = server
        .post("/api/inscriptions")
        .json(&registrant("00000000-0000-0000-0000-000000000000", "lea.martin@example.org"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(server.mailer.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn status_workflow_moves_seats() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(3).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();
    let id = register(&server, formation_id, "lea.martin@example.org").await?;
    assert_eq!(server.available_seats(formation_id).await?, 2);
    server.mailer.clear();

    let res = set_status(&server, &id, "ACCEPTED").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["status"], "ACCEPTED");
    assert_eq!(body["data"]["notified"], true);
    assert_eq!(server.available_seats(formation_id).await?, 1);
    assert_eq!(server.mailer.sent_to("lea.martin@example.org").len(), 1);

    // Same status again: nothing moves, nothing is sent.
    let res = set_status(&server, &id, "ACCEPTED").await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.available_seats(formation_id).await?, 1);
    assert_eq!(server.mailer.sent().len(), 1);

    let res = set_status(&server, &id, "PENDING").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = set_status(&server, &id, "REFUSED").await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.available_seats(formation_id).await?, 2);

    // REFUSED is terminal.
    let res = set_status(&server, &id, "ACCEPTED").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.available_seats(formation_id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn accepting_needs_a_free_seat() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(1).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();
    let id = register(&server, formation_id, "lea.martin@example.org").await?;
    assert_eq!(server.available_seats(formation_id).await?, 0);

    let res = set_status(&server, &id, "ACCEPTED").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = server
        .admin(Method::GET, &format!("/api/inscriptions/admin/{}", id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["formation"]["available_seats"], 0);
    Ok(())
}

#[tokio::test]
async fn full_formation_rejects_registration_without_side_effects() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(1).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();
    register(&server, formation_id, "first@example.org").await?;
    server.mailer.clear();

    let res = server
        .post("/api/inscriptions")
        .json(&registrant(formation_id, "second@example.org"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "INVALID_REQUEST");

    assert_eq!(server.available_seats(formation_id).await?, 0);
    assert!(server.mailer.sent().is_empty());
    let list: Value = server
        .admin(Method::GET, &format!("/api/inscriptions/admin?formation_id={}", formation_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(list["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn deleting_an_accepted_inscription_frees_its_seat() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(4).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();

    let accepted = register(&server, formation_id, "accepted@example.org").await?;
    let pending = register(&server, formation_id, "pending@example.org").await?;
    set_status(&server, &accepted, "ACCEPTED").await?;
    assert_eq!(server.available_seats(formation_id).await?, 1);
    server.mailer.clear();

    let res = server
        .admin(Method::DELETE, &format!("/api/inscriptions/admin/{}", accepted))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.available_seats(formation_id).await?, 2);
    assert_eq!(server.mailer.sent_to("accepted@example.org").len(), 1);

    // A PENDING inscription gives nothing back.
    let res = server
        .admin(Method::DELETE, &format!("/api/inscriptions/admin/{}", pending))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.available_seats(formation_id).await?, 2);

    let res = server
        .admin(Method::DELETE, &format!("/api/inscriptions/admin/{}", pending))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_for_the_last_seat() -> Result<()> {
    let server = Arc::new(TestServer::spawn().await?);
    let formation = server.create_formation(1).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default().to_string();

    let mut handles = Vec::new();
    for n in 0..2 {
        let server = server.clone();
        let formation_id = formation_id.clone();
        handles.push(tokio::spawn(async move {
            server
                .post("/api/inscriptions")
                .json(&registrant(&formation_id, &format!("racer{}@example.org", n)))
                .send()
                .await
                .map(|res| res.status())
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await??);
    }
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    assert_eq!(server.available_seats(&formation_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn mail_failure_does_not_fail_the_workflow() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(2).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();
    server.mailer.set_failing(true);

    let id = register(&server, formation_id, "lea.martin@example.org").await?;
    assert_eq!(server.available_seats(formation_id).await?, 1);

    let res = set_status(&server, &id, "ACCEPTED").await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.available_seats(formation_id).await?, 0);
    assert!(server.mailer.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn admin_edit_applies_status_through_the_workflow() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(3).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();
    let id = register(&server, formation_id, "lea.martin@example.org").await?;

    let res = server
        .admin(Method::PUT, &format!("/api/inscriptions/admin/{}", id))
        .json(&json!({ "phone": "0700000000", "message": null, "status": "ACCEPTED" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["phone"], "0700000000");
    assert_eq!(body["data"]["message"], Value::Null);
    assert_eq!(body["data"]["status"], "ACCEPTED");
    assert_eq!(server.available_seats(formation_id).await?, 1);

    let res = server
        .admin(Method::PUT, &format!("/api/inscriptions/admin/{}", id))
        .json(&json!({ "email": "broken" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn status_mail_goes_to_the_address_saved_in_the_same_edit() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(3).await?;
    let formation_id = formation["id"].as_str().unwrap_or_default();
    let id = register(&server, formation_id, "old@example.org").await?;
    server.mailer.clear();

    let res = server
        .admin(Method::PUT, &format!("/api/inscriptions/admin/{}", id))
        .json(&json!({ "email": "new@example.org", "status": "ACCEPTED" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["email"], "new@example.org");
    assert_eq!(body["data"]["status"], "ACCEPTED");

    assert_eq!(server.mailer.sent_to("new@example.org").len(), 1);
    assert!(server.mailer.sent_to("old@example.org").is_empty());

    // A refused transition keeps the old details too.
    let res = server
        .admin(Method::PUT, &format!("/api/inscriptions/admin/{}", id))
        .json(&json!({ "phone": "0700000000", "status": "PENDING" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = server
        .admin(Method::GET, &format!("/api/inscriptions/admin/{}", id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"]["phone"], "0612345678");
    Ok(())
}
