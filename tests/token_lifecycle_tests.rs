use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use shop_admin::{
    auth::{Claims, issue_token, refresh_token},
    config::AppConfig,
    errors::ApiError,
};
use uuid::Uuid;

// --- Helpers ---

const TEST_USER_ID: Uuid = Uuid::from_u128(42);

fn test_config() -> AppConfig {
    AppConfig::default()
}

/// Decodes a bundle's access token back into claims using the test secret.
fn decode_claims(token: &str, config: &AppConfig) -> Claims {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = false;
    decode::<Claims>(token, &key, &validation).unwrap().claims
}

/// Signs a token with arbitrary iat/exp, mirroring what the issuer would have
/// produced at another point in time.
fn forge_token(user_id: Uuid, iat: i64, exp: i64, secret: &str) -> String {
    let claims = Claims {
        sub: user_id,
        iat: iat as usize,
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

// --- Issuance ---

#[test]
fn issued_token_embeds_configured_ttl() {
    let config = test_config();
    let bundle = issue_token(TEST_USER_ID, &config).unwrap();

    assert_eq!(bundle.token_type, "bearer");
    assert_eq!(bundle.expires_in, config.token_ttl_minutes * 60);

    let claims = decode_claims(&bundle.access_token, &config);
    assert_eq!(claims.sub, TEST_USER_ID);
    // The expiry is exactly iat + TTL; both were stamped in the same call.
    assert_eq!(
        claims.exp as i64 - claims.iat as i64,
        config.token_ttl_minutes * 60
    );
}

#[test]
fn issued_token_expiry_is_in_the_future() {
    let config = test_config();
    let bundle = issue_token(TEST_USER_ID, &config).unwrap();
    let claims = decode_claims(&bundle.access_token, &config);

    assert!((claims.exp as i64) > Utc::now().timestamp());
}

// --- Refresh ---

#[test]
fn refreshing_a_valid_token_returns_a_fresh_bundle() {
    let config = test_config();
    let old = issue_token(TEST_USER_ID, &config).unwrap();

    let new = refresh_token(&old.access_token, &config).unwrap();

    assert_eq!(new.token_type, "bearer");
    assert_eq!(new.expires_in, config.token_ttl_minutes * 60);
    // The subject carries over; only the validity window moves.
    let claims = decode_claims(&new.access_token, &config);
    assert_eq!(claims.sub, TEST_USER_ID);
}

#[test]
fn refresh_accepts_a_token_expired_within_the_grace_window() {
    let config = test_config();
    let now = Utc::now().timestamp();

    // Expired an hour ago; the grace window is 14 days.
    let stale = forge_token(TEST_USER_ID, now - 7200, now - 3600, &config.jwt_secret);

    let bundle = refresh_token(&stale, &config).expect("grace-window token must refresh");
    let claims = decode_claims(&bundle.access_token, &config);
    assert_eq!(claims.sub, TEST_USER_ID);
    assert!((claims.exp as i64) > now);
}

#[test]
fn refresh_rejects_a_token_beyond_the_grace_window() {
    let config = test_config();
    let now = Utc::now().timestamp();
    let grace = config.refresh_grace_minutes * 60;

    // Expired one hour past the end of the grace window.
    let dead = forge_token(
        TEST_USER_ID,
        now - grace - 7200,
        now - grace - 3600,
        &config.jwt_secret,
    );

    let err = refresh_token(&dead, &config).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
fn refresh_rejects_a_malformed_token() {
    let config = test_config();
    let err = refresh_token("not.a.token", &config).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
fn refresh_rejects_a_token_signed_with_another_secret() {
    let config = test_config();
    let now = Utc::now().timestamp();
    let foreign = forge_token(TEST_USER_ID, now, now + 3600, "some-other-secret");

    let err = refresh_token(&foreign, &config).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}
