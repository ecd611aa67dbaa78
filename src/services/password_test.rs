use super::*;

#[test]
fn hash_then_verify() {
    let stored = hash_password("hunter22", 10);
    assert!(stored.starts_with("pbkdf2-sha256$10$"));
    assert!(verify_password("hunter22", &stored));
    assert!(!verify_password("hunter23", &stored));
}

#[test]
fn same_password_gets_distinct_salts() {
    assert_ne!(hash_password("same", 5), hash_password("same", 5));
}

#[test]
fn malformed_hashes_never_match() {
    for stored in [
        "",
        "plaintext",
        "pbkdf2-sha256$10$zz$00",
        "pbkdf2-sha256$0$00$00",
        "pbkdf2-sha256$abc$00$00",
        "bcrypt$10$00$00",
        "pbkdf2-sha256$10$00$00$extra",
    ] {
        assert!(!verify_password("x", stored), "{stored:?}");
    }
}

#[test]
fn iteration_count_is_read_from_the_hash() {
    let stored = hash_password("pw", 3);
    let mut parts: Vec<&str> = stored.split('$').collect();
    parts[1] = "4";
    assert!(!verify_password("pw", &parts.join("$")));
}
