//! OAuth 2.1 flow tests: DCR, authorize → upstream → callback, token
//! exchange with PKCE, refresh, and resource-server enforcement
//!
//! The upstream identity provider is a wiremock server; the authorization
//! server under test runs on an ephemeral port that doubles as its issuer.

use beacon_mcp::auth::jwt::EncryptedToken;
use beacon_mcp::auth::pkce::{CodeChallengeMethod, compute_challenge};
use beacon_mcp::auth::{OAuthConfig, OAuthServer, UpstreamProviderConfig, decrypt_upstream_token};
use beacon_mcp::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNING_SECRET: &str = "test-signing-secret";
const ENCRYPTION_KEY_HEX: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const CLIENT_REDIRECT: &str = "http://client.example/cb";

fn encryption_key() -> [u8; 32] {
    hex::decode(ENCRYPTION_KEY_HEX).unwrap().try_into().unwrap()
}

struct Harness {
    base: String,
    #[allow(dead_code)]
    upstream: MockServer,
    client: reqwest::Client,
}

async fn setup() -> Harness {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_stub_upstream",
            "refresh_token": "ghr_stub_refresh",
            "token_type": "bearer",
            "expires_in": 28800
        })))
        .mount(&upstream)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=ghr_stub_refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_stub_refreshed",
            "refresh_token": "ghr_stub_refresh",
            "token_type": "bearer"
        })))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "name": "Ada Lovelace",
            "email": "ada@example.com"
        })))
        .mount(&upstream)
        .await;

    // Bind first so the issuer matches the listening address
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let issuer = format!("http://{}", listener.local_addr().unwrap());

    let oauth_config = OAuthConfig::new(
        issuer.clone(),
        "test-session-secret",
        SIGNING_SECRET,
        ENCRYPTION_KEY_HEX,
        UpstreamProviderConfig {
            authorization_endpoint: format!("{}/authorize", upstream.uri()),
            token_endpoint: format!("{}/token", upstream.uri()),
            client_id: "upstream-client".to_string(),
            client_secret: "upstream-secret".to_string(),
            scopes: vec!["read:user".to_string()],
            user_info_endpoint: Some(format!("{}/user", upstream.uri())),
        },
    )
    .unwrap();
    let oauth = OAuthServer::new(oauth_config).unwrap();

    let service = ServiceDef::new("PingService").tool(ToolDef::new(
        "ping",
        FnToolHandler(|_, _| async { Ok(json!("pong")) }),
    ));

    let server = McpHttpServer::builder(ServerConfig::new("secured", "1.0.0"))
        .register_service(service)
        .oauth(oauth)
        .build()
        .unwrap();
    let router = server.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    Harness {
        base: issuer,
        upstream,
        client,
    }
}

async fn register_public_client(h: &Harness) -> String {
    let body: Value = h
        .client
        .post(format!("{}/oauth/register", h.base))
        .json(&json!({
            "redirect_uris": [CLIENT_REDIRECT],
            "token_endpoint_auth_method": "none",
            "client_name": "Test App"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body.get("client_secret").is_none(), "public clients get no secret");
    body["client_id"].as_str().unwrap().to_string()
}

fn location_of(response: &reqwest::Response) -> url::Url {
    assert_eq!(response.status(), 302, "expected a redirect");
    let location = response.headers().get("location").unwrap().to_str().unwrap();
    url::Url::parse(location).unwrap()
}

fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Drive authorize + callback, returning the authorization code minted for
/// the client
async fn authorize(h: &Harness, client_id: &str, challenge: &str) -> String {
    let response = h
        .client
        .get(format!("{}/oauth/authorize", h.base))
        .query(&[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", CLIENT_REDIRECT),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", "client-state-1"),
            ("scope", "openid profile"),
        ])
        .send()
        .await
        .unwrap();

    let upstream_url = location_of(&response);
    assert!(upstream_url.path().ends_with("/authorize"));
    assert_eq!(
        query_param(&upstream_url, "client_id").as_deref(),
        Some("upstream-client")
    );
    let state = query_param(&upstream_url, "state").unwrap();

    // Simulate the upstream provider returning to our callback
    let response = h
        .client
        .get(format!("{}/oauth/callback", h.base))
        .query(&[("code", "upstream-code"), ("state", state.as_str())])
        .send()
        .await
        .unwrap();

    let client_url = location_of(&response);
    assert!(client_url.as_str().starts_with(CLIENT_REDIRECT));
    assert_eq!(
        query_param(&client_url, "state").as_deref(),
        Some("client-state-1"),
        "the client's original state comes back"
    );
    query_param(&client_url, "code").expect("callback redirect carries a code")
}

#[tokio::test]
async fn metadata_documents_advertise_the_flow() {
    let h = setup().await;

    let metadata: Value = h
        .client
        .get(format!("{}/.well-known/oauth-authorization-server", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metadata["issuer"], h.base);
    assert_eq!(metadata["response_types_supported"], json!(["code"]));
    assert_eq!(
        metadata["grant_types_supported"],
        json!(["authorization_code", "refresh_token"])
    );
    assert_eq!(metadata["code_challenge_methods_supported"], json!(["S256"]));

    let resource: Value = h
        .client
        .get(format!("{}/.well-known/oauth-protected-resource", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resource["authorization_servers"], json!([h.base.clone()]));
}

#[tokio::test]
async fn happy_path_issues_verifiable_token_with_encrypted_upstream() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    let verifier = "correct-horse-battery-staple-correct-horse";
    let challenge = compute_challenge(verifier, CodeChallengeMethod::S256);
    let code = authorize(&h, &client_id, &challenge).await;

    let token_response: Value = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
            ("client_id", client_id.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(token_response["token_type"], "Bearer");
    assert_eq!(token_response["expires_in"], 3600);
    assert_eq!(token_response["scope"], "openid profile");
    assert_eq!(token_response["refresh_token"], "ghr_stub_refresh");

    // The JWT verifies under the signing secret and carries user context
    let access_token = token_response["access_token"].as_str().unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_aud = false;
    let claims = jsonwebtoken::decode::<Value>(
        access_token,
        &jsonwebtoken::DecodingKey::from_secret(SIGNING_SECRET.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims;

    assert_eq!(claims["iss"], h.base);
    assert_eq!(claims["sub"], "7");
    assert_eq!(claims["name"], "Ada Lovelace");
    assert_eq!(claims["client_id"], client_id);

    // The upstream credential decrypts under the encryption key only
    let encrypted: EncryptedToken =
        serde_json::from_value(claims["upstream_token"].clone()).unwrap();
    assert_eq!(
        decrypt_upstream_token(&encryption_key(), &encrypted).unwrap(),
        "gho_stub_upstream"
    );
    let mut wrong_key = encryption_key();
    wrong_key[0] ^= 0xff;
    assert!(decrypt_upstream_token(&wrong_key, &encrypted).is_err());

    // The token is accepted on the protected RPC path
    let response = h
        .client
        .post(format!("{}/mcp", h.base))
        .bearer_auth(access_token)
        .json(&json!({
            "jsonrpc": "2.0", "id": 0, "method": "initialize",
            "params": {"protocolVersion": "2025-06-18", "capabilities": {}, "clientInfo": {"name": "c", "version": "0"}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn pkce_mismatch_is_invalid_grant() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    let challenge = compute_challenge("the-real-verifier-the-real-verifier-12345", CodeChallengeMethod::S256);
    let code = authorize(&h, &client_id, &challenge).await;

    let response = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
            ("client_id", client_id.as_str()),
            ("code_verifier", "a-completely-different-verifier-987654321"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn authorization_codes_are_single_use() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    let verifier = "one-shot-verifier-one-shot-verifier-123456";
    let challenge = compute_challenge(verifier, CodeChallengeMethod::S256);
    let code = authorize(&h, &client_id, &challenge).await;

    let form = [
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", CLIENT_REDIRECT),
        ("client_id", client_id.as_str()),
        ("code_verifier", verifier),
    ];

    let first = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 400);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn mutated_state_rejected_at_callback() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    let challenge = compute_challenge("state-test-verifier-state-test-verifier-1", CodeChallengeMethod::S256);

    // Drive authorize only, capturing the proxy state
    let response = h
        .client
        .get(format!("{}/oauth/authorize", h.base))
        .query(&[
            ("response_type", "code"),
            ("client_id", client_id.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ])
        .send()
        .await
        .unwrap();
    let state = query_param(&location_of(&response), "state").unwrap();

    // Flip the signature suffix
    let mutated = format!("{}x", &state[..state.len() - 1]);
    let response = h
        .client
        .get(format!("{}/oauth/callback", h.base))
        .query(&[("code", "upstream-code"), ("state", mutated.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn invalid_authorize_requests_rejected() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    // Unknown client: no redirect, direct 400
    let response = h
        .client
        .get(format!("{}/oauth/authorize", h.base))
        .query(&[
            ("response_type", "code"),
            ("client_id", "mcp_not_registered"),
            ("redirect_uri", CLIENT_REDIRECT),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Redirect URI not matching the registration: direct 400
    let response = h
        .client
        .get(format!("{}/oauth/authorize", h.base))
        .query(&[
            ("response_type", "code"),
            ("client_id", client_id.as_str()),
            ("redirect_uri", "http://evil.example/cb"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Missing PKCE: error redirected to the registered URI
    let response = h
        .client
        .get(format!("{}/oauth/authorize", h.base))
        .query(&[
            ("response_type", "code"),
            ("client_id", client_id.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
        ])
        .send()
        .await
        .unwrap();
    let location = location_of(&response);
    assert_eq!(query_param(&location, "error").as_deref(), Some("invalid_request"));

    // Wrong response_type: redirected error
    let response = h
        .client
        .get(format!("{}/oauth/authorize", h.base))
        .query(&[
            ("response_type", "token"),
            ("client_id", client_id.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
            ("code_challenge", "x"),
            ("code_challenge_method", "S256"),
        ])
        .send()
        .await
        .unwrap();
    let location = location_of(&response);
    assert_eq!(
        query_param(&location, "error").as_deref(),
        Some("unsupported_response_type")
    );
}

#[tokio::test]
async fn refresh_grant_federates_upstream() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    let response = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", "ghr_stub_refresh"),
            ("client_id", client_id.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_aud = false;
    let claims = jsonwebtoken::decode::<Value>(
        body["access_token"].as_str().unwrap(),
        &jsonwebtoken::DecodingKey::from_secret(SIGNING_SECRET.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims;

    let encrypted: EncryptedToken =
        serde_json::from_value(claims["upstream_token"].clone()).unwrap();
    assert_eq!(
        decrypt_upstream_token(&encryption_key(), &encrypted).unwrap(),
        "gho_stub_refreshed"
    );
}

#[tokio::test]
async fn unsupported_grant_type_rejected() {
    let h = setup().await;
    let client_id = register_public_client(&h).await;

    let response = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&[
            ("grant_type", "password"),
            ("client_id", client_id.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn confidential_client_authenticates_via_basic_or_body() {
    let h = setup().await;

    let registration: Value = h
        .client
        .post(format!("{}/oauth/register", h.base))
        .json(&json!({
            "redirect_uris": [CLIENT_REDIRECT],
            "token_endpoint_auth_method": "client_secret_post"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let client_id = registration["client_id"].as_str().unwrap().to_string();
    let client_secret = registration["client_secret"].as_str().unwrap().to_string();
    assert_eq!(registration["client_secret_expires_at"], 0);

    let verifier = "confidential-verifier-confidential-verify1";
    let challenge = compute_challenge(verifier, CodeChallengeMethod::S256);
    let code = authorize(&h, &client_id, &challenge).await;

    // Basic authentication
    let response = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .basic_auth(&client_id, Some(&client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Body authentication with a wrong secret is invalid_client
    let code = authorize(&h, &client_id, &challenge).await;
    let response = h
        .client
        .post(format!("{}/oauth/token", h.base))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", CLIENT_REDIRECT),
            ("client_id", client_id.as_str()),
            ("client_secret", "wrong"),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn rpc_path_requires_bearer_token() {
    let h = setup().await;

    let response = h
        .client
        .post(format!("{}/mcp", h.base))
        .json(&json!({
            "jsonrpc": "2.0", "id": 0, "method": "initialize",
            "params": {"protocolVersion": "2025-06-18", "capabilities": {}, "clientInfo": {"name": "c", "version": "0"}}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.starts_with("Bearer resource_metadata="));
    assert!(challenge.contains("/.well-known/oauth-protected-resource"));

    // A token signed with the wrong secret is surfaced as invalid_token
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &json!({"iss": h.base, "sub": "x", "aud": h.base, "exp": 4102444800u64}),
        &jsonwebtoken::EncodingKey::from_secret(b"wrong-secret"),
    )
    .unwrap();
    let response = h
        .client
        .post(format!("{}/mcp", h.base))
        .bearer_auth(forged)
        .json(&json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert!(
        response
            .headers()
            .get("www-authenticate")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("error=\"invalid_token\"")
    );
}
