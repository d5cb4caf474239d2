use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use serde_json::json;

mod common;
use common::actions;

#[tokio::test]
async fn lead_conversion_is_idempotent_until_the_client_is_deleted() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let (_, sales) = t.user_with_roles(&owner, "sales@example.com", &["SALES_EXECUTIVE"]).await?;

    let (status, lead) = t
        .send(
            "POST",
            "/leads",
            Some(&sales),
            Some(json!({ "name": "Maria Santos", "company": "Santos Bakery", "phone": "+63 917 000 0000" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create lead failed: {lead}");
    assert_eq!(lead["status"], "NEW");
    let lead_id = lead["id"].as_str().unwrap_or_default().to_string();

    // CONVERTED is reserved for the convert endpoint.
    let (status, _) = t
        .send("PUT", &format!("/leads/{lead_id}"), Some(&sales), Some(json!({ "status": "CONVERTED" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, client) = t
        .send("POST", &format!("/leads/{lead_id}/convert"), Some(&sales), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "convert failed: {client}");
    assert_eq!(client["name"], "Santos Bakery");
    let client_id = client["id"].as_str().unwrap_or_default().to_string();

    let (status, again) = t
        .send("POST", &format!("/leads/{lead_id}/convert"), Some(&sales), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], client_id.as_str());

    let (_, lead) = t.send("GET", &format!("/leads/{lead_id}"), Some(&sales), None).await?;
    assert_eq!(lead["status"], "CONVERTED");
    assert_eq!(lead["converted_client_id"], client_id.as_str());

    let trail = t.audit_trail(&owner, "lead", &lead_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE", "UPDATE"]);

    let (status, _) = t.send("DELETE", &format!("/clients/{client_id}"), Some(&sales), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t
        .send("POST", &format!("/leads/{lead_id}/convert"), Some(&sales), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT, "expected conflict: {body}");

    Ok(())
}

#[tokio::test]
async fn document_numbers_are_sequential_and_never_reused() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let client_id = t.create_client(&owner, "Numbering Co").await?;
    let year = Utc::now().year();

    let mut job_numbers = Vec::new();
    let mut job_ids = Vec::new();
    for _ in 0..2 {
        let (status, job) = t
            .send("POST", "/job-orders", Some(&owner), Some(json!({ "client_id": client_id })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create job failed: {job}");
        job_numbers.push(job["job_number"].as_str().unwrap_or_default().to_string());
        job_ids.push(job["id"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(job_numbers, vec![format!("JO-{year}-0001"), format!("JO-{year}-0002")]);

    let (status, _) = t
        .send("DELETE", &format!("/job-orders/{}", job_ids[1]), Some(&owner), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, job) = t
        .send("POST", "/job-orders", Some(&owner), Some(json!({ "client_id": client_id })))
        .await?;
    assert_eq!(job["job_number"], format!("JO-{year}-0003"));
    assert_eq!(job["status"], "PENDING");

    let (status, invoice) = t
        .send(
            "POST",
            "/invoices",
            Some(&owner),
            Some(json!({ "client_id": client_id, "job_order_id": job_ids[0], "amount_cents": 1250000 })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create invoice failed: {invoice}");
    assert_eq!(invoice["invoice_number"], format!("INV-{year}-0001"));

    // A deleted job order cannot be invoiced.
    let (status, _) = t
        .send(
            "POST",
            "/invoices",
            Some(&owner),
            Some(json!({ "client_id": client_id, "job_order_id": job_ids[1], "amount_cents": 100 })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "POST",
            "/invoices",
            Some(&owner),
            Some(json!({ "client_id": client_id, "amount_cents": -5 })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn role_checks_guard_each_resource() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let (_, technician) = t.user_with_roles(&owner, "tech@example.com", &["TECHNICIAN"]).await?;
    let (_, accountant) = t.user_with_roles(&owner, "books@example.com", &["ACCOUNTANT"]).await?;
    let client_id = t.create_client(&owner, "Guarded Co").await?;

    let (status, _) = t
        .send("POST", "/job-orders", Some(&technician), Some(json!({ "client_id": client_id })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, jobs) = t.send("GET", "/job-orders", Some(&technician), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(jobs.as_array().is_some());

    let (status, _) = t.send("GET", "/invoices", Some(&technician), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.send("GET", "/invoices", Some(&accountant), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("GET", "/audit-logs", Some(&technician), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.send("GET", "/users", Some(&accountant), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Master data is readable by anyone signed in, writable by managers.
    let (status, _) = t.send("GET", "/masters/service-types", Some(&technician), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t
        .send(
            "POST",
            "/masters/service-types",
            Some(&technician),
            Some(json!({ "code": "ac-clean", "name": "Aircon cleaning" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, service_type) = t
        .send(
            "POST",
            "/masters/service-types",
            Some(&owner),
            Some(json!({ "code": "ac-clean", "name": "Aircon cleaning" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create service type failed: {service_type}");
    assert_eq!(service_type["code"], "AC-CLEAN");

    let (status, grants) = t.send("GET", "/roles", Some(&technician), None).await?;
    assert_eq!(status, StatusCode::OK);
    let owner_grant = grants
        .as_array()
        .and_then(|g| g.iter().find(|grant| grant["role"] == "OWNER"))
        .cloned()
        .unwrap_or_default();
    assert!(owner_grant["actions"]
        .as_array()
        .is_some_and(|a| a.iter().any(|action| action == "restore_records")));

    Ok(())
}

#[tokio::test]
async fn role_changes_are_audited_and_owners_keep_their_role() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register_owner().await?;
    let (user_id, _) = t.user_with_roles(&owner, "sup@example.com", &["TECHNICIAN"]).await?;

    let (status, updated) = t
        .send("PUT", &format!("/users/{user_id}"), Some(&owner), Some(json!({ "roles": ["SUPERVISOR"] })))
        .await?;
    assert_eq!(status, StatusCode::OK, "update failed: {updated}");
    assert_eq!(updated["roles"], json!(["SUPERVISOR"]));

    let trail = t.audit_trail(&owner, "user", &user_id).await?;
    assert_eq!(actions(&trail), vec!["CREATE", "UPDATE"]);
    assert_eq!(trail[1]["prior_state"]["roles"], json!(["TECHNICIAN"]));
    assert_eq!(trail[1]["new_state"]["roles"], json!(["SUPERVISOR"]));

    let (_, me) = t.send("GET", "/auth/me", Some(&owner), None).await?;
    let owner_id = me["id"].as_str().unwrap_or_default().to_string();
    let (status, _) = t
        .send("PUT", &format!("/users/{owner_id}"), Some(&owner), Some(json!({ "roles": ["AUDITOR"] })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.send("DELETE", &format!("/users/{owner_id}"), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}
