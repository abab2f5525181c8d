//! Tests for the DeltaFetch middleware
//!
//! These tests verify:
//! - Construction from config (disabled → NotConfigured)
//! - Run lifecycle: absent, open, closed
//! - Static and per-run reset
//! - Counters with and without a stats sink

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deltafetch::config::{Config, OptOutFlag, RunConfig};
use deltafetch::filter::{Output, Request};
use deltafetch::middleware::DeltaFetch;
use deltafetch::stats::{MemoryStats, StatsSink, SKIPPED, STORED};
use deltafetch::store::{KeyStore, StoreState};
use deltafetch::DeltaError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const CRAWL: &str = "df_tests";

type Out = Output<Request, &'static str>;
type Fp = fn(&Request) -> Vec<u8>;

fn fingerprint(request: &Request) -> Vec<u8> {
    format!("{} {}", request.method, request.url).into_bytes()
}

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn create_test_db(dir: &Path) {
    let mut store = KeyStore::open(dir, CRAWL, true).unwrap();
    store.put(b"test_key_1", b"test_v_1").unwrap();
    store.put(b"test_key_2", b"test_v_2").unwrap();
    store.close().unwrap();
}

fn middleware(dir: &Path, reset: bool, stats: Option<Arc<dyn StatsSink>>) -> DeltaFetch<Fp> {
    DeltaFetch::new(dir, reset, fingerprint as Fp, stats)
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_new_does_not_touch_directory() {
    let (_temp, dir) = setup_temp_dir();
    let target = dir.join("any").join("dir");

    let mw = middleware(&target, true, None);

    assert_eq!(mw.directory(), target.as_path());
    assert!(mw.reset());
    assert!(!target.exists());
    assert_eq!(mw.store_state(), StoreState::Absent);
}

#[test]
fn test_from_config_disabled() {
    let config = Config::default();

    let result = DeltaFetch::from_config(&config, fingerprint as Fp, None);

    assert!(matches!(result, Err(DeltaError::NotConfigured(_))));
}

#[test]
fn test_from_config_defaults() {
    let config = Config::builder().enabled(true).build();

    let mw = DeltaFetch::from_config(&config, fingerprint as Fp, None).unwrap();

    assert_eq!(mw.directory(), Path::new(".deltafetch"));
    assert!(!mw.reset());
    assert_eq!(mw.opt_out(), OptOutFlag::DedupEnabledFalse);
}

#[test]
fn test_from_config_advanced_settings() {
    let config = Config::builder()
        .enabled(true)
        .directory("other")
        .reset(true)
        .opt_out(OptOutFlag::IgnoreTrue)
        .build();

    let mw = DeltaFetch::from_config(&config, fingerprint as Fp, None).unwrap();

    assert_eq!(mw.directory(), Path::new("other"));
    assert!(mw.reset());
    assert_eq!(mw.opt_out(), OptOutFlag::IgnoreTrue);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_run_creates_store() {
    let (_temp, dir) = setup_temp_dir();
    let mut mw = middleware(&dir, false, None);

    mw.open_run(&RunConfig::new(CRAWL)).unwrap();

    assert!(dir.join("df_tests.db").exists());
    assert_eq!(mw.store_state(), StoreState::Open);
    assert!(mw.store().unwrap().is_empty().unwrap());
}

#[test]
fn test_open_run_keeps_existing() {
    let (_temp, dir) = setup_temp_dir();
    create_test_db(&dir);
    let mut mw = middleware(&dir, false, None);

    mw.open_run(&RunConfig::new(CRAWL)).unwrap();

    assert_eq!(mw.store().unwrap().len().unwrap(), 2);
}

#[test]
fn test_static_reset() {
    let (_temp, dir) = setup_temp_dir();
    create_test_db(&dir);
    let mut mw = middleware(&dir, true, None);

    mw.open_run(&RunConfig::new(CRAWL)).unwrap();

    assert!(mw.store().unwrap().is_empty().unwrap());
}

#[test]
fn test_run_reset_overrides_static() {
    let (_temp, dir) = setup_temp_dir();
    create_test_db(&dir);
    let mut mw = middleware(&dir, false, None);

    mw.open_run(&RunConfig::new(CRAWL).with_reset(true)).unwrap();

    assert!(mw.store().unwrap().is_empty().unwrap());
}

#[test]
fn test_close_run() {
    let (_temp, dir) = setup_temp_dir();
    let mut mw = middleware(&dir, false, None);
    mw.open_run(&RunConfig::new(CRAWL)).unwrap();

    mw.close_run().unwrap();

    assert_eq!(mw.store_state(), StoreState::Closed);
    assert!(mw.store().is_none());
}

#[test]
fn test_process_output_requires_open_run() {
    let (_temp, dir) = setup_temp_dir();
    let mut mw = middleware(&dir, false, None);
    let origin = Request::get("http://url");

    let result = mw.process_output(&origin, Vec::<Out>::new());

    assert!(matches!(result, Err(DeltaError::StoreClosed)));
}

#[test]
fn test_reopen_sees_previous_run() {
    let (_temp, dir) = setup_temp_dir();
    let mut mw = middleware(&dir, false, None);
    let origin = Request::get("http://page");

    mw.open_run(&RunConfig::new(CRAWL)).unwrap();
    let stored: Vec<Out> = mw
        .process_output(&origin, vec![Out::Record("item")])
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(stored.len(), 1);
    mw.close_run().unwrap();

    // Second run: the page that produced data is skipped
    mw.open_run(&RunConfig::new(CRAWL)).unwrap();
    let result: Vec<Out> = mw
        .process_output(&origin, vec![Out::Request(Request::get("http://page"))])
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert!(result.is_empty());
    mw.close_run().unwrap();
}

// =============================================================================
// Stats Tests
// =============================================================================

#[test]
fn test_process_output_stats() {
    let (_temp, dir) = setup_temp_dir();
    create_test_db(&dir);
    let stats = Arc::new(MemoryStats::new());
    let sink: Arc<dyn StatsSink> = stats.clone();
    let mut mw = middleware(&dir, false, Some(sink));
    mw.open_run(&RunConfig::new(CRAWL)).unwrap();
    let origin = Request::get("http://url").with_key("key");

    let result: Vec<Out> = mw
        .process_output(&origin, Vec::<Out>::new())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert!(result.is_empty());
    assert!(stats.snapshot().is_empty());

    let outputs = vec![
        Out::Request(Request::get("http://url").with_key("key")),
        Out::Request(Request::get("http://url1").with_key("test_key_1")),
    ];
    let result: Vec<Out> = mw
        .process_output(&origin, outputs.clone())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(result, vec![outputs[0].clone()]);
    assert_eq!(stats.get_value(SKIPPED), Some(1));

    let outputs = vec![Out::Record("item"), Out::Other("not an item")];
    let result: Vec<Out> = mw
        .process_output(&origin, outputs.clone())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(result, outputs);
    assert_eq!(stats.get_value(STORED), Some(1));
}

#[test]
fn test_process_output_without_stats() {
    let (_temp, dir) = setup_temp_dir();
    create_test_db(&dir);
    let mut mw = middleware(&dir, false, None);
    mw.open_run(&RunConfig::new(CRAWL)).unwrap();
    let origin = Request::get("http://url").with_key("key");

    let outputs = vec![
        Out::Request(Request::get("http://url").with_key("key")),
        Out::Request(Request::get("http://url1").with_key("test_key_1")),
    ];
    let result: Vec<Out> = mw
        .process_output(&origin, outputs.clone())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(result, vec![outputs[0].clone()]);
}
