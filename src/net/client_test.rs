use super::*;
use crate::net::types::{AuthResponse, User};

// =============================================================================
// join_url
// =============================================================================

#[test]
fn join_url_single_slash() {
    assert_eq!(join_url("http://localhost:8000", "/api/tasks"), "http://localhost:8000/api/tasks");
}

#[test]
fn join_url_trims_both_sides() {
    assert_eq!(join_url("http://h/", "/api/auth/me"), "http://h/api/auth/me");
}

#[test]
fn join_url_path_without_leading_slash() {
    assert_eq!(join_url("http://h", "api/tasks/3"), "http://h/api/tasks/3");
}

// =============================================================================
// decode_body
// =============================================================================

#[test]
fn decode_body_parses_auth_response() {
    let body = r#"{"user":{"id":"u1","email":"a@b.com","created_at":"2024-01-01T00:00:00Z"},"token":"tok1"}"#;
    let resp: AuthResponse = decode_body(200, body).unwrap();
    assert_eq!(resp.token, "tok1");
    assert_eq!(resp.user.email, "a@b.com");
}

#[test]
fn decode_body_no_content_is_unit() {
    decode_body::<()>(204, "").unwrap();
}

#[test]
fn decode_body_empty_success_into_struct_is_unexpected() {
    let err = decode_body::<User>(200, "").unwrap_err();
    assert!(matches!(err, ApiError::Unexpected { status: Some(200), .. }));
}

#[test]
fn decode_body_malformed_json_is_unexpected() {
    let err = decode_body::<User>(200, "{not json").unwrap_err();
    assert_eq!(err.to_string(), "An unexpected error occurred.");
    assert!(err.detail().contains("decode"));
}

// =============================================================================
// ApiClient::new
// =============================================================================

#[test]
fn new_trims_trailing_slash_from_base_url() {
    let config = ClientConfig {
        api_url: "http://localhost:8000/".into(),
        token_path: None,
        timeouts: crate::config::HttpTimeouts::default(),
    };
    let client = ApiClient::new(&config, Arc::new(crate::state::token::MemoryTokenStore::new())).unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000");
}
