use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn audit_list_filters_by_time_range_newest_first() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;

    for name in ["First Co", "Second Co", "Third Co"] {
        t.create_client(&owner, name).await?;
    }

    let (status, page) = t.send("GET", "/audit-logs?entity_type=client", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    let records = page["records"].as_array().cloned().unwrap_or_default();
    let names: Vec<_> = records
        .iter()
        .map(|r| r["new_state"]["name"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["Third Co", "Second Co", "First Co"]);

    let seqs: Vec<i64> = records.iter().map(|r| r["seq"].as_i64().unwrap_or_default()).collect();
    assert!(seqs.windows(2).all(|w| w[0] > w[1]), "not newest first: {seqs:?}");

    // Bounds are inclusive.
    let from = records[1]["occurred_at"].as_str().unwrap_or_default().to_string();
    let to = records[0]["occurred_at"].as_str().unwrap_or_default().to_string();
    let (status, page) = t
        .send(
            "GET",
            &format!("/audit-logs?entity_type=client&from={from}&to={to}"),
            Some(&owner),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "range query failed: {page}");
    assert_eq!(page["total"], 2);

    let (status, page) = t
        .send("GET", "/audit-logs?entity_type=client&limit=1&offset=1", Some(&owner), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["records"][0]["new_state"]["name"], "Second Co");

    let (status, body) = t
        .send("GET", &format!("/audit-logs?from={to}&to={from}"), Some(&owner), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "inverted range accepted: {body}");

    let (status, _) = t.send("GET", "/audit-logs?entity_type=Widget", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn audit_records_capture_actor_and_request_origin() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let (_, me) = t.send("GET", "/auth/me", Some(&owner), None).await?;

    let client_id = t.create_client(&owner, "Origin Co").await?;
    let (status, _) = t
        .send(
            "PUT",
            &format!("/clients/{client_id}"),
            Some(&owner),
            Some(json!({ "phone": "+63 2 8123 4567" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let trail = t.audit_trail(&owner, "client", &client_id).await?;
    assert_eq!(trail.len(), 2);
    let update = &trail[1];
    assert_eq!(update["actor_id"], me["id"]);
    assert!(update["prior_state"]["phone"].is_null());
    assert_eq!(update["new_state"]["phone"], "+63 2 8123 4567");
    assert_eq!(update["prev_hash"], trail[0]["hash"]);

    Ok(())
}

#[tokio::test]
async fn audit_chain_verifies_and_rejects_tampering() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let client_id = t.create_client(&owner, "Chain Co").await?;
    let (status, _) = t.send("DELETE", &format!("/clients/{client_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, report) = t.send("GET", "/audit-logs/verify", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);
    assert_eq!(report["checked"], 3);

    // The table itself refuses edits.
    let tampered = sqlx::query("UPDATE audit_logs SET new_state = '{}' WHERE seq = 1")
        .execute(&t.pool)
        .await;
    assert!(tampered.is_err(), "audit_logs accepted an UPDATE");

    let removed = sqlx::query("DELETE FROM audit_logs").execute(&t.pool).await;
    assert!(removed.is_err(), "audit_logs accepted a DELETE");

    Ok(())
}
