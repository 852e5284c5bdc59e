use super::*;
use std::collections::HashSet;

#[test]
fn test_generated_credentials() {
    let credentials = Credentials::generate();
    assert_eq!(credentials.ufrag.len(), UFRAG_LEN);
    assert_eq!(credentials.pwd.len(), PWD_LEN);
    assert!(credentials.ufrag.bytes().all(|b| b.is_ascii_alphabetic()));
    assert!(credentials.pwd.bytes().all(|b| b.is_ascii_alphabetic()));
}

#[test]
fn test_generated_values_do_not_repeat() {
    let mut seen = HashSet::new();
    for _ in 0..100 {
        let credentials = Credentials::generate();
        assert!(seen.insert(credentials.ufrag));
        assert!(seen.insert(credentials.pwd));
        assert!(seen.insert(candidate_id()));
    }
}

#[test]
fn test_candidate_id_charset() {
    let id = candidate_id();
    let foundation = id.strip_prefix("candidate:").expect("prefix");
    assert_eq!(foundation.len(), FOUNDATION_LEN);
    assert!(
        foundation
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
    );
}

#[test]
fn test_with_defaults() -> Result<()> {
    let kept = Credentials::with_defaults("abcd".to_owned(), "p".repeat(16))?;
    assert_eq!(kept.ufrag, "abcd");
    assert_eq!(kept.pwd, "p".repeat(16));

    let filled = Credentials::with_defaults(String::new(), String::new())?;
    assert_eq!(filled.ufrag.len(), UFRAG_LEN);
    assert_eq!(filled.pwd.len(), PWD_LEN);

    assert_eq!(
        Credentials::with_defaults("ab".to_owned(), String::new()),
        Err(Error::ErrLocalUfragInsufficientBits)
    );
    assert_eq!(
        Credentials::with_defaults(String::new(), "p".repeat(15)),
        Err(Error::ErrLocalPwdInsufficientBits)
    );
    Ok(())
}
