use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::actions;

#[tokio::test]
async fn delete_then_restore_appends_delete_and_restore_records() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let client_id = t.create_client(&owner, "Santos Bakery").await?;

    let (status, _) = t.send("DELETE", &format!("/clients/{client_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.send("GET", &format!("/clients/{client_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "deleted client should be hidden");

    let (status, body) = t.send("DELETE", &format!("/clients/{client_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already_deleted");

    let (status, restored) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "client", "entity_id": client_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "restore failed: {restored}");
    assert_eq!(restored["id"], client_id.as_str());
    assert!(restored["deleted_at"].is_null());
    assert!(restored["deleted_by"].is_null());

    let (status, _) = t.send("GET", &format!("/clients/{client_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);

    let trail = t.audit_trail(&owner, "client", &client_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE", "DELETE", "RESTORE"]);

    let delete = &trail[1];
    assert_eq!(delete["prior_state"]["name"], "Santos Bakery");
    assert!(delete["prior_state"]["deleted_at"].is_null());

    let restore = &trail[2];
    assert!(!restore["prior_state"]["deleted_at"].is_null());
    assert!(restore["new_state"]["deleted_at"].is_null());

    Ok(())
}

#[tokio::test]
async fn restoring_a_live_record_fails_without_writing_audit() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let client_id = t.create_client(&owner, "Live Co").await?;

    let (status, body) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "client", "entity_id": client_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_deleted");

    let trail = t.audit_trail(&owner, "client", &client_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE"]);

    Ok(())
}

#[tokio::test]
async fn only_owners_may_restore() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let (_, manager) = t
        .user_with_roles(&owner, "ops@example.com", &["OPERATIONS_MANAGER"])
        .await?;
    let (_, auditor) = t.user_with_roles(&owner, "audit@example.com", &["AUDITOR"]).await?;

    let client_id = t.create_client(&owner, "Rivera Clinic").await?;
    let (status, job) = t
        .send(
            "POST",
            "/job-orders",
            Some(&manager),
            Some(json!({ "client_id": client_id, "description": "Aircon cleaning" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create job failed: {job}");
    let job_id = job["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = t.send("DELETE", &format!("/job-orders/{job_id}"), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for token in [&manager, &auditor] {
        let (status, body) = t
            .send(
                "POST",
                "/records/restore",
                Some(token),
                Some(json!({ "entity_type": "job_order", "entity_id": job_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "non-owner restore allowed: {body}");
    }

    // Permission is checked before the payload is even looked at.
    for body in [
        Some(json!({ "entity_type": "Widget", "entity_id": job_id })),
        Some(json!({ "entity_type": 5 })),
        None,
    ] {
        let (status, response) = t.send("POST", "/records/restore", Some(&manager), body).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "non-owner got past the role check: {response}");
        assert_eq!(response["error"], "forbidden");
    }

    let (status, _) = t.send("GET", &format!("/job-orders/{job_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "job order must stay deleted");

    let trail = t.audit_trail(&owner, "job_order", &job_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE", "DELETE"]);

    let (status, restored) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "job_order", "entity_id": job_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["job_number"], job["job_number"]);

    Ok(())
}

#[tokio::test]
async fn restore_rejects_bad_targets() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let client_id = t.create_client(&owner, "Target Co").await?;

    let (status, body) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "Widget", "entity_id": client_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_entity_type");

    let (status, body) = t
        .send("POST", "/records/restore", Some(&owner), Some(json!({ "entity_id": client_id })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = t
        .send("POST", "/records/restore", Some(&owner), Some(json!({ "entity_type": "client" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "client", "entity_id": "not-a-uuid" })),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "client", "entity_id": "00000000-0000-0000-0000-000000000000" })),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn deleted_records_listing_hides_restored_by_default() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let kept_deleted = t.create_client(&owner, "Gone Co").await?;
    let restored = t.create_client(&owner, "Back Co").await?;

    for id in [&kept_deleted, &restored] {
        let (status, _) = t.send("DELETE", &format!("/clients/{id}"), Some(&owner), None).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let (status, _) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "client", "entity_id": restored })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = t.send("GET", "/records/deleted?entity_type=client", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["records"][0]["entity_id"], kept_deleted.as_str());
    assert_eq!(page["records"][0]["restored"], false);
    assert_eq!(page["records"][0]["snapshot"]["name"], "Gone Co");

    let (status, page) = t
        .send("GET", "/records/deleted?include_restored=true", Some(&owner), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    let restored_entry = page["records"]
        .as_array()
        .and_then(|records| records.iter().find(|r| r["entity_id"] == restored.as_str()))
        .cloned()
        .unwrap_or_default();
    assert_eq!(restored_entry["restored"], true);

    let (_, technician) = t.user_with_roles(&owner, "tech@example.com", &["TECHNICIAN"]).await?;
    let (status, _) = t.send("GET", "/records/deleted", Some(&technician), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn a_different_owner_can_restore() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let (second_owner_id, second_owner) = t.user_with_roles(&owner, "owner2@example.com", &["OWNER"]).await?;
    let client_id = t.create_client(&owner, "Handover Co").await?;

    let (status, _) = t.send("DELETE", &format!("/clients/{client_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, restored) = t
        .send(
            "POST",
            "/records/restore",
            Some(&second_owner),
            Some(json!({ "entity_type": "client", "entity_id": client_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "second owner restore failed: {restored}");

    let trail = t.audit_trail(&owner, "client", &client_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE", "DELETE", "RESTORE"]);
    assert_ne!(trail[1]["actor_id"], trail[2]["actor_id"]);
    assert_eq!(trail[2]["actor_id"], second_owner_id.as_str());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_transitions_yield_one_winner_and_a_state_error() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;

    for round in 0..5 {
        let client_id = t.create_client(&owner, &format!("Race Co {round}")).await?;
        let uri = format!("/clients/{client_id}");

        let (first, second) = tokio::join!(
            t.send("DELETE", &uri, Some(&owner), None),
            t.send("DELETE", &uri, Some(&owner), None)
        );
        let mut deletes = vec![first?, second?];
        deletes.sort_by_key(|(status, _)| status.as_u16());
        assert_eq!(deletes[0].0, StatusCode::NO_CONTENT, "round {round}: {deletes:?}");
        assert_eq!(deletes[1].0, StatusCode::BAD_REQUEST, "round {round}: {deletes:?}");
        assert_eq!(deletes[1].1["error"], "already_deleted");

        let body = json!({ "entity_type": "client", "entity_id": client_id });
        let (first, second) = tokio::join!(
            t.send("POST", "/records/restore", Some(&owner), Some(body.clone())),
            t.send("POST", "/records/restore", Some(&owner), Some(body.clone()))
        );
        let mut restores = vec![first?, second?];
        restores.sort_by_key(|(status, _)| status.as_u16());
        assert_eq!(restores[0].0, StatusCode::OK, "round {round}: {restores:?}");
        assert_eq!(restores[1].0, StatusCode::BAD_REQUEST, "round {round}: {restores:?}");
        assert_eq!(restores[1].1["error"], "not_deleted");

        let trail = t.audit_trail(&owner, "client", &client_id).await?;
        assert_eq!(actions(&trail), vec!["CREATE", "DELETE", "RESTORE"]);
    }

    let (status, report) = t.send("GET", "/audit-logs/verify", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);

    Ok(())
}

#[tokio::test]
async fn restoring_a_child_of_a_deleted_client_is_refused() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let client_id = t.create_client(&owner, "Parent Co").await?;

    let (status, job) = t
        .send("POST", "/job-orders", Some(&owner), Some(json!({ "client_id": client_id })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create job failed: {job}");
    let job_id = job["id"].as_str().unwrap_or_default().to_string();

    for uri in [format!("/job-orders/{job_id}"), format!("/clients/{client_id}")] {
        let (status, _) = t.send("DELETE", &uri, Some(&owner), None).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let restore_job = json!({ "entity_type": "job_order", "entity_id": job_id });
    let (status, body) = t
        .send("POST", "/records/restore", Some(&owner), Some(restore_job.clone()))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT, "child restored under a deleted client: {body}");

    let trail = t.audit_trail(&owner, "job_order", &job_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE", "DELETE"]);

    let (status, _) = t
        .send(
            "POST",
            "/records/restore",
            Some(&owner),
            Some(json!({ "entity_type": "client", "entity_id": client_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, restored) = t.send("POST", "/records/restore", Some(&owner), Some(restore_job)).await?;
    assert_eq!(status, StatusCode::OK, "restore after parent failed: {restored}");
    assert_eq!(restored["id"], job_id.as_str());

    Ok(())
}
