use anyhow::Result;
use axum::http::StatusCode;

mod common;

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let t = common::spawn_app().await?;

    let (status, body) = t.send("GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");

    let db_ok = body.get("db_ok").and_then(|b| b.as_bool()).unwrap_or(false);
    assert!(db_ok, "expected db_ok: true, got: {}", body);
    assert_eq!(body["status"], "ok");

    Ok(())
}
