//! Configuration loaded from disk drives planning

use std::fs;
use std::sync::{Mutex, MutexGuard};

use serde_json::json;
use subplanner::config::{ConfigError, SubplannerConfig};
use subplanner::expression::MatchExpression;
use subplanner::observability::{Logger, Severity};
use subplanner::subplan::{choose_plan, PlanOrigin};
use tempfile::TempDir;

use super::super::fixtures::*;

/// Loading a valid file sets the process-wide log level
static LOGGER_LEVEL: Mutex<()> = Mutex::new(());

fn lock_logger() -> MutexGuard<'static, ()> {
    LOGGER_LEVEL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("subplanner.json");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_loaded_config_disables_subplanning() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"enable_subplanning": false, "log_level": "warn"}"#);

    let _guard = lock_logger();
    let config = SubplannerConfig::load(&path).unwrap();
    Logger::set_min_severity(Severity::Info);
    assert!(!config.enable_subplanning);
    assert_eq!(config.trial.num_results, 101);

    let h = Harness::new(numbers()).with_config(config);
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("a", json!(1)),
        MatchExpression::eq("c", json!(3)),
    ]));
    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::WholeQuery);
    assert_eq!(h.metrics.snapshot().subplans_attempted, 0);
    assert!(outcome.solution.uses_index("a_1"));
    assert!(outcome.solution.uses_index("c_1"));
}

#[test]
fn test_loaded_trial_settings() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"trial": {"min_works": 50, "yield_iterations": 4}, "enumeration": {"enable_index_intersection": false}}"#,
    );

    let _guard = lock_logger();
    let config = SubplannerConfig::load(&path).unwrap();
    assert_eq!(config.trial.min_works, 50);
    assert_eq!(config.trial.yield_iterations, 4);
    assert_eq!(config.trial.collection_fraction, 0.29);
    assert!(!config.enumeration.enable_index_intersection);
    assert!(config.enable_subplanning);
}

#[test]
fn test_loaded_log_level_is_applied() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"log_level": "error"}"#);

    let _guard = lock_logger();
    let config = SubplannerConfig::load(&path).unwrap();
    assert_eq!(config.log_level, "error");
    assert_eq!(Logger::min_severity(), Severity::Error);
    assert!(!Logger::enabled(Severity::Warn));

    Logger::set_min_severity(Severity::Info);
}

#[test]
fn test_rejected_config_keeps_log_level() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"log_level": "trace", "trial": {"yield_iterations": 0}}"#);

    let _guard = lock_logger();
    assert!(SubplannerConfig::load(&path).is_err());
    assert_eq!(Logger::min_severity(), Severity::Info);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"trial": {"num_results": 0}}"#);

    assert!(matches!(
        SubplannerConfig::load(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let result = SubplannerConfig::load(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}
