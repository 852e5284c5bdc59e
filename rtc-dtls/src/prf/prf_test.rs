use super::*;

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn test_prf_p_hash() -> Result<()> {
    let secret = hex("9bbe436ba940f017b17652849a71db35");
    let seed = [b"test label".as_slice(), &hex("a0ba9f936cda311827a6f796ffd5198c")].concat();
    let expected = hex(concat!(
        "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a",
        "6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab",
        "4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701",
        "87347b66",
    ));

    assert_eq!(prf_p_hash(&secret, &seed, 100)?, expected);
    assert_eq!(prf_p_hash(&secret, &seed, 7)?, expected[..7].to_vec());
    Ok(())
}

#[test]
fn test_prf_key_schedule() -> Result<()> {
    let pre_master_secret: Vec<u8> = (0u8..32).collect();
    let client_random = [1u8; 32];
    let server_random = [2u8; 32];

    let master_secret = prf_master_secret(&pre_master_secret, &client_random, &server_random)?;
    assert_eq!(
        master_secret,
        hex(concat!(
            "736bbd660032dbca6b2461a1488a84331d57e10b6edb8176",
            "b521be9dc3a065fe33d158efe3fd1b46881629e650130686",
        ))
    );

    let keys = prf_encryption_keys(&master_secret, &client_random, &server_random)?;
    assert_eq!(keys.client_write_key, hex("f088bbf83f53cebf3f5338d5cf5461b3"));
    assert_eq!(keys.server_write_key, hex("7ee922635f51ba041328b0c758001fbf"));
    assert_eq!(keys.client_write_iv, hex("c6dfd938"));
    assert_eq!(keys.server_write_iv, hex("97de7bf4"));

    let verify_data = prf_verify_data_client(&master_secret, b"hello")?;
    assert_eq!(verify_data, hex("9a93612a130031870b475bf8"));
    assert_ne!(
        prf_verify_data_server(&master_secret, b"hello")?,
        verify_data
    );
    Ok(())
}

#[test]
fn test_encryption_keys_debug_hides_material() -> Result<()> {
    let keys = prf_encryption_keys(&[9u8; 48], &[1u8; 32], &[2u8; 32])?;
    assert_eq!(format!("{keys:?}"), "EncryptionKeys { .. }");
    Ok(())
}
