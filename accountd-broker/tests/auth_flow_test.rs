//! End-to-end verification flows over the loopback provider

mod common;

use axum::http::StatusCode;
use common::{create_test_server, local_path};
use serde_json::Value;

use accountd_broker::store::LinkStore;

/// Follow the login redirect out and back through the loopback
/// provider, returning the final response.
async fn complete_login(server: &axum_test::TestServer, path: &str) -> axum_test::TestResponse {
    let res = server.get(path).await;
    res.assert_status(StatusCode::SEE_OTHER);
    let location = res.header("location");
    server.get(&local_path(location.to_str().unwrap())).await
}

#[tokio::test]
async fn test_register_verify_lookup() {
    let (server, state) = create_test_server();

    let res = complete_login(&server, "/login?user=banana&account=banana%40test").await;
    res.assert_status_ok();
    let assertion = res.text();
    assert_eq!(assertion.split('.').count(), 3);

    // the broker vouches for its own assertion
    let res = server.post(&format!("/verify/{assertion}")).await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["user"], "banana");

    // the link is publicly visible
    let res = server.get("/lookup/banana").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["id"], "banana");
    assert_eq!(
        body["accounts"],
        serde_json::json!([{ "account": "banana@test", "type": "test" }])
    );

    // and resolvable by identifier too
    let res = server.get("/lookup/banana%40test").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["id"], "banana");

    assert_eq!(
        state.links.link_for("banana@test").unwrap().unwrap().user,
        "banana"
    );
}

#[tokio::test]
async fn test_relogin_is_idempotent() {
    let (server, state) = create_test_server();

    complete_login(&server, "/login?user=banana&account=banana%40test")
        .await
        .assert_status_ok();
    complete_login(&server, "/login?user=banana&account=banana%40test")
        .await
        .assert_status_ok();

    assert_eq!(state.links.links_for_user("banana").unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_without_user_resolves_existing_link() {
    let (server, state) = create_test_server();
    state.links.insert("y@test", "zed").unwrap();

    let res = complete_login(&server, "/login?account=y%40test").await;
    res.assert_status_ok();
    let assertion = res.text();

    let res = server.post(&format!("/verify/{assertion}")).await;
    assert_eq!(res.json::<Value>()["user"], "zed");
}

#[tokio::test]
async fn test_login_without_user_prompts_for_username() {
    let (server, state) = create_test_server();

    let res = complete_login(&server, "/login?account=banana%40test").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["status"], "choose_username");
    assert_eq!(body["account"], "banana@test");
    assert!(state.links.link_for("banana@test").unwrap().is_none());

    // picking a handle in the same session finishes without another
    // external round trip being wasted
    let res = complete_login(&server, "/login?user=banana&account=banana%40test").await;
    res.assert_status_ok();
    assert_eq!(
        state.links.link_for("banana@test").unwrap().unwrap().user,
        "banana"
    );
}

#[tokio::test]
async fn test_lookup_normalizes_case_and_whitespace() {
    let (server, state) = create_test_server();
    state.links.insert("banana@test", "banana").unwrap();

    let res = server.get("/lookup/Banana").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["id"], "banana");

    // stray whitespace around a pasted identifier
    let res = server.get("/lookup/%20banana%40test%20").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["id"], "banana");
}

#[tokio::test]
async fn test_unknown_lookup_answers() {
    let (server, _) = create_test_server();

    // an unregistered but classifiable identifier reports its method
    let res = server.get("/lookup/stranger%40github").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["id"], Value::Null);
    assert_eq!(body["type"], "github");

    // a name that is neither a known handle nor an identifier is 404
    let res = server.get("/lookup/nobody").await;
    res.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>()["success"], false);
}

#[tokio::test]
async fn test_bad_login_requests_are_rejected() {
    let (server, _) = create_test_server();

    // unclassifiable identifier
    let res = server.get("/login?account=nodotnoat").await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // no identifier at all
    let res = server.get("/login").await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // handle syntax is lowercase alphanumerics and underscores
    let res = server.get("/login?user=Not%20Valid&account=a%40test").await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // unknown silo
    let res = server.get("/login?user=a&account=a%40myspace").await;
    res.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_callback_without_flow_is_rejected() {
    let (server, _) = create_test_server();
    let res = server.get("/callback/from/test").await;
    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_after_flow_completes_is_rejected() {
    let (server, _) = create_test_server();

    complete_login(&server, "/login?user=banana&account=banana%40test")
        .await
        .assert_status_ok();

    // the flow was consumed on delivery
    let res = server.get("/callback/from/test").await;
    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_from_wrong_provider_is_rejected() {
    let (server, _) = create_test_server();

    // flow goes out to github, callback claims to come from test
    let res = server.get("/login?user=alice&account=alice%40github").await;
    res.assert_status(StatusCode::SEE_OTHER);
    assert!(res
        .header("location")
        .to_str()
        .unwrap()
        .starts_with("https://github.com/"));

    let res = server.get("/callback/from/test").await;
    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_verify_rejects_garbage() {
    let (server, _) = create_test_server();

    let res = server.post("/verify/not-a-token").await;
    res.assert_status(StatusCode::BAD_REQUEST);

    // a token signed by a different broker
    let other = accountd_core::KeyPair::generate();
    let foreign = accountd_core::Assertion::issue("banana", &other).unwrap();
    let res = server.post(&format!("/verify/{}", foreign.encoded())).await;
    res.assert_status(StatusCode::BAD_REQUEST);
}
