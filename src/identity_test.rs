use super::*;

fn is_lower_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[test]
fn generated_tokens_have_expected_hex_lengths() {
    let identity = Identity::generate();
    assert_eq!(identity.token.len(), 6);
    assert_eq!(identity.device_id.len(), 16);
    assert!(is_lower_hex(&identity.token));
    assert!(is_lower_hex(&identity.device_id));
}

#[test]
fn generated_identities_differ() {
    let a = Identity::generate();
    let b = Identity::generate();
    assert_ne!(a.frontend_uuid, b.frontend_uuid);
    assert_ne!(a.frontend_session_id, b.frontend_session_id);
    assert_ne!(a.device_id, b.device_id);
}

#[test]
fn default_user_agent_matches_android_client_format() {
    assert_eq!(
        DeviceProfile::default().user_agent(),
        "Ask/1.0.23/260023 (Android; Version 13; Xiaomi M2011K2G/TQ1A.230205.002) SDK 33"
    );
}

#[test]
fn hex_pads_single_digit_bytes() {
    assert_eq!(hex(&[0x00, 0x0a, 0xff]), "000aff");
}

#[test]
fn client_headers_carry_identity() {
    let identity = Identity::generate();
    let headers = identity.client_headers().expect("valid headers");

    assert_eq!(headers.get(ACCEPT).unwrap(), "*/*");
    assert_eq!(headers.get(ACCEPT_ENCODING).unwrap(), "gzip");
    assert_eq!(headers.get(USER_AGENT).unwrap(), identity.user_agent.as_str());
    assert_eq!(headers.get("x-app.version").unwrap(), APP_VERSION);
    assert_eq!(headers.get("x-client-version").unwrap(), CLIENT_VERSION);
    assert_eq!(headers.get("x-client-name").unwrap(), CLIENT_NAME);
    assert_eq!(headers.get("x-app-apiclient").unwrap(), API_CLIENT);
    assert_eq!(headers.get("x-app-apiversion").unwrap(), API_VERSION);
}

#[test]
fn client_headers_reject_control_characters_in_user_agent() {
    let mut identity = Identity::generate();
    identity.user_agent = "bad\nagent".to_owned();
    let err = identity.client_headers().expect_err("newline is not a header value");
    assert!(matches!(err, SessionError::Config(_)));
}
