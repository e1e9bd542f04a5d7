//! Engine configuration parsed from TOML.

use ctxperf_core::{EngineConfig, EvictionStrategy};

#[test]
fn test_partial_toml_overrides_sections() {
    let raw = r#"
        [cache]
        max_size = 250
        strategy = "lfu"
        compression_enabled = false

        [loader]
        max_concurrent = 8

        [monitor.thresholds]
        response_time_ms = 750.0

        [optimizer]
        history_size = 10
        enable_token_optimization = false
    "#;

    let config: EngineConfig = toml::from_str(raw).unwrap();
    config.validate().unwrap();

    assert_eq!(config.cache.max_size, 250);
    assert_eq!(config.cache.strategy, EvictionStrategy::Lfu);
    assert!(!config.cache.compression_enabled);
    assert_eq!(config.cache.ttl_ms, 3_600_000);
    assert_eq!(config.loader.max_concurrent, 8);
    assert_eq!(config.loader.timeout_ms, 30_000);
    assert_eq!(config.monitor.thresholds.response_time_ms, 750.0);
    assert_eq!(config.monitor.thresholds.cpu_usage, 80.0);
    assert_eq!(config.optimizer.history_size, 10);
    assert!(!config.optimizer.enable_token_optimization);
    assert!(config.optimizer.enable_cache_optimization);
}

#[test]
fn test_empty_document_is_default() {
    let config: EngineConfig = toml::from_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_invalid_values_rejected() {
    let config: EngineConfig = toml::from_str("[cache]\nmax_size = 0\n").unwrap();
    assert!(config.validate().is_err());
}
