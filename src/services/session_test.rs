use super::*;
use crate::models::UserRole;
use crate::store::memory::MemoryStore;

async fn seeded_user(store: &MemoryStore) -> User {
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        email: "ada@example.com".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        role: UserRole::Student,
        created_at: now,
        updated_at: now,
    };
    store.insert_user(&user, "hash").await.unwrap();
    user
}

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// tokens
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn hash_token_is_sha256_hex() {
    assert_eq!(hash_token("abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
}

// =============================================================================
// lifecycle
// =============================================================================

#[tokio::test]
async fn session_round_trip() {
    let store = MemoryStore::new();
    let user = seeded_user(&store).await;

    let token = create_session(&store, user.id, 1).await.unwrap();
    let found = validate_session(&store, &token).await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    delete_session(&store, &token).await.unwrap();
    assert!(validate_session(&store, &token).await.unwrap().is_none());
}

#[tokio::test]
async fn plaintext_token_is_not_a_key() {
    let store = MemoryStore::new();
    let user = seeded_user(&store).await;
    let token = create_session(&store, user.id, 1).await.unwrap();
    let direct = store.session_user(&token, OffsetDateTime::now_utc()).await.unwrap();
    assert!(direct.is_none());
}

#[tokio::test]
async fn expired_session_is_rejected() {
    let store = MemoryStore::new();
    let user = seeded_user(&store).await;
    let token = create_session(&store, user.id, -1).await.unwrap();
    assert!(validate_session(&store, &token).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_token_is_rejected() {
    let store = MemoryStore::new();
    assert!(validate_session(&store, "").await.unwrap().is_none());
}
