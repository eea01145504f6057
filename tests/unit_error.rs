use std::path::PathBuf;

use dayplan::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::TaskNotFound("t-1".to_string());
    assert_eq!(missing.exit_code(), exit_codes::USER_ERROR);

    let rejected = Error::PlanRejected("try again".to_string());
    assert_eq!(rejected.exit_code(), exit_codes::RETRYABLE);

    let unavailable = Error::ProposerUnavailable("down".to_string());
    assert_eq!(unavailable.exit_code(), exit_codes::OPERATION_FAILED);

    let op = Error::OperationFailed("boom".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::TaskNotFound("t-abc".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Task not found"));
    assert_eq!(json.details, Some(serde_json::json!({ "task_id": "t-abc" })));

    let lock = JsonError::from(&Error::LockFailed(PathBuf::from("tasks.jsonl.lock")));
    assert_eq!(lock.code, exit_codes::OPERATION_FAILED);
    assert!(lock.details.is_some());
}
