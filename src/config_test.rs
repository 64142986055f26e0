use super::*;

#[test]
fn parse_bool_accepts_common_spellings() {
    for raw in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(raw), Some(true), "{raw}");
    }
    for raw in ["0", "False", "no", "OFF"] {
        assert_eq!(parse_bool(raw), Some(false), "{raw}");
    }
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}

#[test]
fn env_parse_falls_back_on_missing_key() {
    assert_eq!(env_parse("LEARNFLOW_TEST_SURELY_UNSET_KEY", 42_u32), 42);
}

#[test]
fn env_parse_falls_back_on_garbage() {
    unsafe { std::env::set_var("LEARNFLOW_TEST_GARBAGE_PORT", "not-a-number") };
    assert_eq!(env_parse("LEARNFLOW_TEST_GARBAGE_PORT", 7_u16), 7);
    unsafe { std::env::remove_var("LEARNFLOW_TEST_GARBAGE_PORT") };
}

#[test]
fn env_string_treats_blank_as_missing() {
    unsafe { std::env::set_var("LEARNFLOW_TEST_BLANK", "   ") };
    assert_eq!(env_string("LEARNFLOW_TEST_BLANK"), None);
    unsafe { std::env::remove_var("LEARNFLOW_TEST_BLANK") };
}

#[test]
fn default_config_uses_memory_store() {
    let cfg = ServerConfig::default();
    assert_eq!(cfg.port, 8000);
    assert!(cfg.database_url.is_none());
    assert_eq!(cfg.session_ttl_hours, 168);
    assert!(cfg.seed_default_lessons);
}
