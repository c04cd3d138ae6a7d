//! Integration tests for multi-run quality gates
//!
//! Configs are parsed from TOML and JSON documents and evaluated against
//! several runs of two pages.

use auditgate::assertion::{
    AggregationMethod, AssertConfig, AssertionEngine, AssertionError, AssertionLevel,
    AssertionName, AssertionOptions, AssertionReport, RuleSetting,
};
use auditgate::report::{AuditReport, AuditResult, CategoryResult};

fn page_run(url: &str, fcp: f64, tti: f64, performance: f64) -> AuditReport {
    AuditReport::new(url)
        .with_category(
            "performance",
            CategoryResult::new("performance").with_score(performance),
        )
        .with_audit(
            AuditResult::new("first-contentful-paint")
                .with_score(0.9)
                .with_numeric_value(fcp),
        )
        .with_audit(
            AuditResult::new("interactive")
                .with_score(0.9)
                .with_numeric_value(tti),
        )
        .with_audit(AuditResult::new("viewport").with_score(1.0))
}

fn five_runs(url: &str) -> Vec<AuditReport> {
    vec![
        page_run(url, 1100.0, 3300.0, 0.91),
        page_run(url, 1500.0, 3900.0, 0.84),
        page_run(url, 1200.0, 3400.0, 0.90),
        page_run(url, 1000.0, 3100.0, 0.93),
        page_run(url, 1300.0, 3600.0, 0.88),
    ]
}

#[test]
fn test_toml_gate_over_two_pages() {
    let mut runs = five_runs("https://shop.example.com/");
    runs.extend(five_runs("https://shop.example.com/cart"));

    let config = AssertConfig::from_toml_str(
        r#"
        aggregationMethod = "pessimistic"

        [assertions]
        "categories:performance" = ["error", { minScore = 0.85 }]
        "first-contentful-paint" = ["warn", { maxNumericValue = 1400 }]
        "interactive" = ["error", { maxNumericValue = 4000 }]
        "viewport" = "error"
        "uses-http2" = "off"
        "#,
    )
    .unwrap();

    let engine = AssertionEngine::new();
    let results = engine.evaluate_all(&config, &runs).unwrap();

    // Per page: the worst performance score (0.84) and the worst FCP (1500)
    // fail; TTI stays under 4000 and viewport is perfect.
    assert_eq!(results.len(), 4);
    for url in ["https://shop.example.com/", "https://shop.example.com/cart"] {
        let page: Vec<_> = results.iter().filter(|r| r.url == url).collect();
        assert_eq!(page.len(), 2);
        assert!(page
            .iter()
            .any(|r| r.audit_id == "categories" && r.actual == 0.84));
        assert!(page.iter().any(|r| r.audit_id == "first-contentful-paint"
            && r.level == AssertionLevel::Warn
            && r.actual == 1500.0));
    }

    assert!(engine.has_failures(&results));
    let report = AssertionReport::new(results);
    assert_eq!(report.error_count(), 2);
    assert_eq!(report.warning_count(), 2);
}

#[test]
fn test_rule_method_overrides_config_method() {
    let runs = five_runs("https://x.com/");
    let config = AssertConfig::from_json_str(
        r#"{
            "aggregationMethod": "pessimistic",
            "assertions": {
                "first-contentful-paint": ["error", {"maxNumericValue": 1400, "aggregationMethod": "optimistic"}],
                "interactive": ["error", {"maxNumericValue": 3800}]
            }
        }"#,
    )
    .unwrap();

    let results = AssertionEngine::new().evaluate_all(&config, &runs).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].audit_id, "interactive");
    assert_eq!(results[0].actual, 3900.0);
}

#[test]
fn test_engine_default_method() {
    let runs = five_runs("https://x.com/");
    let config = AssertConfig::default().with_rule(
        "interactive",
        RuleSetting::error(AssertionOptions::max_numeric_value(3350.0)),
    );

    let optimistic = AssertionEngine::new().evaluate_all(&config, &runs).unwrap();
    assert!(optimistic.is_empty());

    let median = AssertionEngine::new()
        .with_aggregation_method(AggregationMethod::Median)
        .evaluate_all(&config, &runs)
        .unwrap();
    assert_eq!(median.len(), 1);
    assert_eq!(median[0].actual, 3400.0);
}

#[test]
fn test_median_run_uses_most_typical_run() {
    let runs = five_runs("https://x.com/");
    let config = AssertConfig::default()
        .with_aggregation_method(AggregationMethod::MedianRun)
        .with_rule(
            "categories:performance",
            RuleSetting::error(AssertionOptions::min_score(0.95)),
        );

    let results = AssertionEngine::new().evaluate_all(&config, &runs).unwrap();

    // Medians are (1200, 3400), matched exactly by the third run
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].values, vec![0.90]);
}

#[test]
fn test_missing_audit_reports_audit_ran() {
    let runs = five_runs("https://x.com/");
    let config = AssertConfig::default().with_rule(
        "largest-contentful-paint",
        RuleSetting::error(AssertionOptions::max_numeric_value(2500.0)),
    );

    let results = AssertionEngine::new().evaluate_all(&config, &runs).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, AssertionName::AuditRan);
    assert_eq!(results[0].values, vec![0.0; 5]);
}

#[test]
fn test_mixed_urls_rejected_on_single_url_entry_point() {
    let a = page_run("https://a.com/", 1.0, 1.0, 1.0);
    let b = page_run("https://b.com/", 1.0, 1.0, 1.0);

    let err = AssertionEngine::new()
        .evaluate(
            &[&a, &b],
            "viewport",
            &RuleSetting::error(AssertionOptions::default()),
        )
        .unwrap_err();

    assert!(matches!(err, AssertionError::MixedUrls { .. }));
    assert!(err.to_string().contains("https://a.com/"));
}

#[test]
fn test_invalid_pattern_surfaces_at_evaluation() {
    let runs = five_runs("https://x.com/");
    let config = AssertConfig::default()
        .with_url_pattern("(")
        .with_rule("viewport", RuleSetting::error(AssertionOptions::default()));

    let err = AssertionEngine::new().evaluate_all(&config, &runs).unwrap_err();
    assert!(matches!(err, AssertionError::InvalidUrlPattern { .. }));
}

#[test]
fn test_results_serialize_for_ci() {
    let runs = five_runs("https://x.com/");
    let config = AssertConfig::default().with_rule(
        "interactive",
        RuleSetting::warn(AssertionOptions::max_numeric_value(3000.0)),
    );

    let results = AssertionEngine::new().evaluate_all(&config, &runs).unwrap();
    let json = serde_json::to_value(&results).unwrap();

    assert_eq!(json[0]["name"], "maxNumericValue");
    assert_eq!(json[0]["operator"], "<=");
    assert_eq!(json[0]["level"], "warn");
    assert_eq!(json[0]["auditId"], "interactive");
    assert_eq!(json[0]["url"], "https://x.com/");
}
