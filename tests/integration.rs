use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vsync");
    path
}

fn setup_test_env(csv_rows: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let input_dir = root.join("in");
    let contracts_dir = input_dir.join("contracts");
    fs::create_dir_all(&contracts_dir).unwrap();
    fs::write(
        input_dir.join("vendor_spend.csv"),
        format!(
            "vendor_id,vendor_name,total_spend_ytd,contract_filename,renewal_date,status\n{}",
            csv_rows
        ),
    )
    .unwrap();
    fs::write(contracts_dir.join("Apex_Logistics_MSA.pdf"), "%PDF apex").unwrap();
    fs::write(contracts_dir.join("Orphan_Co_{trap}.pdf"), "%PDF orphan").unwrap();

    // Nothing listens on port 1, so any remote call fails fast.
    let config_content = format!(
        r#"[remote]
resource_url = "http://127.0.0.1:1"
authority_host = "http://127.0.0.1:1"
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
timeout_secs = 5

[paths]
source_csv = "{root}/in/vendor_spend.csv"
documents_dir = "{root}/in/contracts"
output_csv = "{root}/out/vendor_spend.csv"
output_documents_dir = "{root}/out/contracts"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("vsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .env_remove("VSYNC_IT_UNSET_SECRET")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

const APEX_ROW: &str = "99,Apex Logistics,\"$150,000,000\",Apex_Logistics_MSA.pdf,2027-01-01,Active\n";

#[test]
fn test_backfill_dry_run() {
    let (_tmp, config_path) = setup_test_env(APEX_ROW);

    let (stdout, stderr, success) = run_vsync(&config_path, &["backfill", "--dry-run"]);
    assert!(success, "backfill failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("dry run"));
    assert!(stdout.contains("accounts created: 2"));
    assert!(stdout.contains("invoices created: 1"));
    assert!(stdout.contains("attachments uploaded: 2"));
    assert!(stdout.contains("accounts discovered from documents: 1"));
    assert!(stdout.contains("unique vendors: 2"));
}

#[test]
fn test_backfill_dry_run_reports_failed_rows() {
    let rows = format!("{}abc,Broken Vendor,10,,2026-01-01,Active\n", APEX_ROW);
    let (_tmp, config_path) = setup_test_env(&rows);

    let (stdout, stderr, success) = run_vsync(&config_path, &["backfill", "--dry-run"]);
    assert!(!success, "absorbed failures must fail the run");
    assert!(stdout.contains("failures: 1"));
    assert!(stdout.contains("accounts created: 2"));
    assert!(stderr.contains("1 item(s) failed"));
}

#[test]
fn test_backfill_dry_run_strict_stops() {
    let rows = format!("abc,Broken Vendor,10,,2026-01-01,Active\n{}", APEX_ROW);
    let (_tmp, config_path) = setup_test_env(&rows);

    let (stdout, stderr, success) =
        run_vsync(&config_path, &["--policy", "strict", "backfill", "--dry-run"]);
    assert!(!success);
    assert!(stdout.contains("accounts created: 0"));
    assert!(stdout.contains("attachments uploaded: 0"));
    assert!(stderr.contains("vendor_id 'abc' is not an integer"));
}

#[test]
fn test_backfill_dry_run_strict_prints_partial_summary() {
    let rows = format!("{}abc,Broken Vendor,10,,2026-01-01,Active\n", APEX_ROW);
    let (_tmp, config_path) = setup_test_env(&rows);

    let (stdout, stderr, success) =
        run_vsync(&config_path, &["--policy", "strict", "backfill", "--dry-run"]);
    assert!(!success);
    assert!(stdout.contains("accounts created: 1"));
    assert!(stdout.contains("invoices created: 1"));
    assert!(stdout.contains("attachments uploaded: 0"));
    assert!(stderr.contains("vendor_id 'abc' is not an integer"));
}

#[test]
fn test_backfill_dry_run_without_secret_env() {
    let (_tmp, config_path) = setup_test_env(APEX_ROW);
    let config = fs::read_to_string(&config_path).unwrap().replace(
        "client_secret = \"secret\"",
        "client_secret_env = \"VSYNC_IT_UNSET_SECRET\"",
    );
    fs::write(&config_path, config).unwrap();

    let (stdout, stderr, success) = run_vsync(&config_path, &["backfill", "--dry-run"]);
    assert!(success, "backfill failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("accounts created: 2"));

    let (_, stderr, success) = run_vsync(&config_path, &["cleanup"]);
    assert!(!success);
    assert!(stderr.contains("VSYNC_IT_UNSET_SECRET environment variable not set"));
}

#[test]
fn test_missing_config() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_vsync(&tmp.path().join("nope.toml"), &["check"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_cleanup_missing_csv_fails_before_auth() {
    let (tmp, config_path) = setup_test_env("");
    fs::remove_file(tmp.path().join("in").join("vendor_spend.csv")).unwrap();

    let (_, stderr, success) = run_vsync(&config_path, &["cleanup"]);
    assert!(!success);
    assert!(stderr.contains("vendor_spend.csv"));
    assert!(!stderr.contains("access token"));
}

#[test]
fn test_extract_prepares_output_then_fails_auth() {
    let (tmp, config_path) = setup_test_env(APEX_ROW);

    let (_, stderr, success) = run_vsync(&config_path, &["extract"]);
    assert!(!success);
    assert!(stderr.contains("Failed to acquire access token"));
    assert!(tmp.path().join("out").join("contracts").is_dir());
    assert!(!tmp.path().join("out").join("vendor_spend.csv").exists());
}

#[test]
fn test_check_reports_each_line() {
    let (_tmp, config_path) = setup_test_env(APEX_ROW);

    let (stdout, stderr, success) = run_vsync(&config_path, &["check"]);
    assert!(!success);
    assert!(stdout.contains("source csv"));
    assert!(stdout.contains("OK (1 rows)"));
    assert!(stdout.contains("OK (2 files)"));
    assert!(stdout.contains("auth"));
    assert!(stderr.contains("one or more checks failed"));
}
