mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{registrant, TestServer};

#[tokio::test]
async fn create_then_read_publicly() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(12).await?;

    assert_eq!(formation["type"], "PSC1");
    assert_eq!(formation["status"], "PLANNED");
    assert_eq!(formation["total_seats"], 12);
    assert_eq!(formation["available_seats"], 12);

    let id = formation["id"].as_str().unwrap_or_default();
    let res = server.get(&format!("/api/formations/{}", id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["title"], "PSC1 - Prévention et secours civiques");

    let list: Value = server.get("/api/formations?type=PSC1").send().await?.json().await?;
    assert_eq!(list["data"].as_array().map(Vec::len), Some(1));

    let list: Value = server.get("/api/formations?type=PSE1").send().await?.json().await?;
    assert_eq!(list["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn create_requires_auth_and_valid_fields() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.post("/api/formations/admin").json(&json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .admin(Method::POST, "/api/formations/admin")
        .json(&json!({ "title": "PSE1", "type": "PSE1", "total_seats": 0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["total_seats"].is_string());
    assert!(body["field_errors"]["date"].is_string());
    assert!(body["field_errors"]["location"].is_string());

    let res = server
        .admin(Method::POST, "/api/formations/admin")
        .json(&json!({ "title": "PSE1", "type": "NOT_A_TYPE" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn total_seats_moves_available_seats() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(5).await?;
    let id = formation["id"].as_str().unwrap_or_default().to_string();

    for n in 0..2 {
        let res = server
            .post("/api/inscriptions")
            .json(&registrant(&id, &format!("stagiaire{}@example.org", n)))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }
    assert_eq!(server.available_seats(&id).await?, 3);

    let res = server
        .admin(Method::PUT, &format!("/api/formations/admin/{}", id))
        .json(&json!({ "total_seats": 8 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["total_seats"], 8);
    assert_eq!(body["data"]["available_seats"], 6);

    // Two seats are held, so the total cannot drop under 2.
    let res = server
        .admin(Method::PUT, &format!("/api/formations/admin/{}", id))
        .json(&json!({ "total_seats": 1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.available_seats(&id).await?, 6);
    Ok(())
}

#[tokio::test]
async fn status_update_and_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let formation = server.create_formation(10).await?;
    let id = formation["id"].as_str().unwrap_or_default().to_string();

    let res = server
        .admin(Method::PUT, &format!("/api/formations/admin/{}/status", id))
        .json(&json!({ "status": "CANCELLED" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["status"], "CANCELLED");

    let res = server
        .admin(Method::PUT, &format!("/api/formations/admin/{}/status", id))
        .json(&json!({ "status": "POSTPONED" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .post("/api/inscriptions")
        .json(&registrant(&id, "lea.martin@example.org"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server
        .admin(Method::DELETE, &format!("/api/formations/admin/{}", id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.get(&format!("/api/formations/{}", id)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Inscriptions go with their formation.
    let list: Value = server
        .admin(Method::GET, "/api/inscriptions/admin")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(list["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn malformed_ids_are_client_errors() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.get("/api/formations/not-a-uuid").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .get("/api/formations/00000000-0000-0000-0000-000000000000")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
