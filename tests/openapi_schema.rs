use anyhow::Result;
use serde_json::Value;

#[test]
fn openapi_lists_restore_and_document_numbers() -> Result<()> {
    let doc = servicehub::docs::build_openapi(8000)?;
    let v: Value = serde_json::to_value(&doc)?;

    let paths = v.get("paths").and_then(Value::as_object).cloned().unwrap_or_default();
    for path in ["/records/restore", "/records/deleted", "/audit-logs", "/job-orders/{id}", "/leads/{id}/convert"] {
        assert!(paths.contains_key(path), "missing path {path}");
    }

    let job_props = v
        .pointer("/components/schemas/JobOrder/properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    assert!(job_props.contains_key("job_number"), "JobOrder schema lacks job_number");
    assert!(job_props.contains_key("deleted_at"));

    let scheme = v.pointer("/components/securitySchemes/bearerAuth/scheme");
    assert_eq!(scheme, Some(&Value::String("bearer".to_string())));

    // Health opts out of the global bearer requirement.
    let health_security = v.pointer("/paths/~1api~1health/get/security").and_then(Value::as_array);
    assert!(health_security.is_some(), "health should declare its own security");

    Ok(())
}
