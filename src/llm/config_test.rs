use super::*;

// Env-mutating tests share one lock so parallel test threads do not race.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` while mutating the environment.
unsafe fn clear_llm_env() {
    unsafe {
        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("LLM_API_KEY_ENV");
        std::env::remove_var("LLM_OPENAI_MODE");
        std::env::remove_var("LLM_OPENAI_BASE_URL");
        std::env::remove_var("LLM_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("LLM_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("LEARNFLOW_TEST_KEY");
    }
}

#[test]
fn from_env_defaults_to_anthropic() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "LEARNFLOW_TEST_KEY");
        std::env::set_var("LEARNFLOW_TEST_KEY", "secret");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::Anthropic);
    assert_eq!(cfg.model, "claude-sonnet-4-5-20250929");
    assert_eq!(cfg.openai_mode, OpenAiApiMode::ChatCompletions);
    assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
    assert_eq!(
        cfg.timeouts,
        LlmTimeouts { request_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.api_key, "secret");

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_parses_openai_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "openai");
        std::env::set_var("LLM_API_KEY_ENV", "LEARNFLOW_TEST_KEY");
        std::env::set_var("LEARNFLOW_TEST_KEY", "sk-test");
        std::env::set_var("LLM_OPENAI_MODE", "responses");
        std::env::set_var("LLM_OPENAI_BASE_URL", "https://example.test/v1/");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("LLM_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::OpenAi);
    assert_eq!(cfg.model, "gpt-4o-mini");
    assert_eq!(cfg.openai_mode, OpenAiApiMode::Responses);
    assert_eq!(cfg.openai_base_url, "https://example.test/v1");
    assert_eq!(cfg.timeouts, LlmTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_requires_key_variable() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_llm_env() };

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { var } if var == "LLM_API_KEY_ENV"));
}

#[test]
fn from_env_reports_named_key_missing() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "LEARNFLOW_TEST_KEY");
    }

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { var } if var == "LEARNFLOW_TEST_KEY"));

    unsafe { clear_llm_env() };
}

#[test]
fn parse_provider_rejects_unknown() {
    assert!(matches!(parse_provider(Some("cohere")), Err(LlmError::ConfigParse(_))));
    assert_eq!(parse_provider(None).unwrap(), LlmProviderKind::Anthropic);
}

#[test]
fn parse_openai_mode_rejects_unknown() {
    assert!(parse_openai_mode(Some("assistants")).is_err());
    assert_eq!(parse_openai_mode(Some("responses")).unwrap(), OpenAiApiMode::Responses);
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "LEARNFLOW_TEST_KEY");
        std::env::set_var("LEARNFLOW_TEST_KEY", "secret");
        std::env::set_var("LLM_PROVIDER", "  ");
        std::env::set_var("LLM_MODEL", "");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "0");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::Anthropic);
    assert_eq!(cfg.model, "claude-sonnet-4-5-20250929");
    assert_eq!(cfg.timeouts.request_secs, 1);

    unsafe { clear_llm_env() };
}

#[test]
fn blank_key_counts_as_missing() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "LEARNFLOW_TEST_KEY");
        std::env::set_var("LEARNFLOW_TEST_KEY", " ");
    }

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { var } if var == "LEARNFLOW_TEST_KEY"));

    unsafe { clear_llm_env() };
}

#[test]
fn provider_and_mode_names_ignore_case() {
    assert_eq!(parse_provider(Some("OpenAI")).unwrap(), LlmProviderKind::OpenAi);
    assert_eq!(parse_provider(Some("Claude")).unwrap(), LlmProviderKind::Anthropic);
    assert_eq!(parse_openai_mode(Some("Responses")).unwrap(), OpenAiApiMode::Responses);
}
