use app_config::AppConfig;
use rust_decimal::Decimal;
use std::time::Duration;

#[test]
fn test_default_config() {
    let cfg = AppConfig::defaults().unwrap();
    assert_eq!(cfg.api_base_url, "http://localhost:5000/api");
    assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    assert_eq!(cfg.zone_cache_ttl, Duration::from_secs(600));
    assert!(cfg.auth_token.is_none());
}

#[test]
fn test_fallback_fees_from_defaults() {
    let fees = AppConfig::defaults().unwrap().fallback_fees();
    assert_eq!(fees.delivery_fee, Decimal::from(40));
    assert_eq!(fees.free_delivery_threshold, Decimal::from(500));
    assert_eq!(fees.gst_rate, Decimal::from(5));
}
