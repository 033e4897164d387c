use pathguard::http::request::{Method, Request, RequestBuilder};
use std::collections::HashMap;

fn request(method: Method, headers: HashMap<String, String>) -> Request {
    Request {
        method,
        path: "/".to_string(),
        query: None,
        version: "HTTP/1.1".to_string(),
        headers,
    }
}

#[test]
fn test_request_header_retrieval() {
    let mut headers = HashMap::new();
    headers.insert("Host".to_string(), "example.com".to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    let req = request(Method::GET, headers);

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let mut headers = HashMap::new();
    headers.insert("Content-Length".to_string(), "42".to_string());

    let req = request(Method::POST, headers);

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing() {
    let req = request(Method::GET, HashMap::new());
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_content_length_invalid() {
    let mut headers = HashMap::new();
    headers.insert("Content-Length".to_string(), "invalid".to_string());

    let req = request(Method::POST, headers);

    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_keep_alive_http11_default() {
    let req = request(Method::GET, HashMap::new());
    assert!(req.keep_alive());
}

#[test]
fn test_request_keep_alive_http10_default() {
    let mut req = request(Method::GET, HashMap::new());
    req.version = "HTTP/1.0".to_string();
    assert!(!req.keep_alive());

    req.headers.insert("Connection".to_string(), "keep-alive".to_string());
    assert!(req.keep_alive());
}

#[test]
fn test_request_keep_alive_close() {
    let mut headers = HashMap::new();
    headers.insert("Connection".to_string(), "close".to_string());

    let req = request(Method::GET, headers);

    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_case_insensitive() {
    let mut headers = HashMap::new();
    headers.insert("connection".to_string(), "CLOSE".to_string());

    let req = request(Method::GET, headers);

    assert!(!req.keep_alive());
}

#[test]
fn test_request_method_equality() {
    assert_eq!(Method::GET, Method::GET);
    assert_ne!(Method::GET, Method::POST);
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(Method::from_str("INVALID"), None);
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
}

#[test]
fn test_request_method_display() {
    assert_eq!(Method::PATCH.to_string(), "PATCH");
}

#[test]
fn test_request_builder() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api/echo")
        .query("verbose=1")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/api/echo");
    assert_eq!(req.query.as_deref(), Some("verbose=1"));
    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.header("content-type"), Some("application/json"));
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}
