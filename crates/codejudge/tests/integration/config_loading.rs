use codejudge::config::Config;
use codejudge::types::LanguageId;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_full_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.worker_count(), 2);
    assert!(config.queue_timeout().is_zero());
    assert_eq!(config.run_timeout_for(1000).as_millis(), 1500);
    assert_eq!(config.max_output_bytes(), 1024 * 1024);

    let cpp = config.get_language(LanguageId::Cpp).unwrap();
    assert_eq!(cpp.compile.output_name.as_str(), "solution");
    assert_eq!(cpp.default_signature.as_deref(), Some("int solution(int n)"));

    let java = config.get_language(LanguageId::Java).unwrap();
    assert_eq!(java.class_name(), "Main");
    assert!(config.get_language(LanguageId::C).is_err());
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    let c = config.get_language(LanguageId::C).unwrap();
    assert_eq!(c.compile.output_name.as_str(), "main");
    assert_eq!(config.cleanup_grace().as_secs(), 20);
    assert_eq!(config.compile_timeout().as_secs(), 10);
}

#[test]
fn test_load_invalid_unknown_language() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_unknown_language.toml");
    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("python"));
}

#[test]
fn test_load_invalid_empty_run_command() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_run_command.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_java_source_name() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_java_source_name.toml");
    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Solution.java"));
}

#[test]
fn test_load_invalid_source_path() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_source_path.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_missing_file() {
    assert!(Config::from_file(format!("{FIXTURES_PATH}/configs/nope.toml")).is_err());
}

#[test]
fn test_embedded_example_config() {
    let config = Config::default();
    for id in LanguageId::ALL {
        let language = config.get_language(id).unwrap();
        assert!(language.default_signature.is_some(), "{id} lacks a default signature");
    }
}
