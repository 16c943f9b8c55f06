use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

// Simulated kiln, fast enough that a 30 s profile finishes in well under a second
fn write_config(dir: &TempDir, extra: &str) -> PathBuf {
    let root = dir.path().display().to_string().replace('\\', "/");
    let toml = format!(
        r#"
temp_scale = "f"

[sensor]
time_step_s = 1.0
average_samples = 2

[schedule]
kiln_must_catch_up = false

[restart]
enabled = false
state_file = '{root}/state.json'
profiles_dir = '{root}/profiles'

[storage]
db_path = '{root}/kiln.sqlite3'

[simulation]
enabled = true
speedup = 200.0

{extra}
"#
    );
    fs::create_dir_all(dir.path().join("profiles")).unwrap();
    fs::write(
        dir.path().join("profiles").join("quick.json"),
        r#"{"name": "quick", "data": [[0, 65], [30, 100]]}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("profiles").join("long.json"),
        r#"{"name": "long", "data": [[0, 65], [36000, 2000]]}"#,
    )
    .unwrap();
    let path = dir.path().join("kiln.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn kiln(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--log-level").arg("error").arg("--config").arg(cfg);
    cmd
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8_lossy(&out);
    let line = text.lines().last().unwrap_or("");
    serde_json::from_str(line).unwrap_or_else(|e| panic!("bad JSON ({e}): {text}"))
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
#[case(&["sessions"], 0, "no sessions recorded", "stdout")]
#[case(&["run", "--profile", "nope"], 1, "profile", "stderr")]
#[case(&["notes", "missing-id", "hello"], 1, "not found", "stderr")]
#[case(&[], 2, "Usage", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let assert = kiln(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn completed_firing_is_recorded() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let summary = json_stdout(kiln(&cfg).args(["--json", "run", "--profile", "quick"]));
    assert_eq!(summary["outcome"], "COMPLETED");
    assert_eq!(summary["profile"], "quick");
    let id = summary["session_id"].as_str().expect("session id").to_string();

    let session = json_stdout(kiln(&cfg).args(["--json", "session", id.as_str()]));
    assert_eq!(session["outcome"], "COMPLETED");
    assert_eq!(session["profile_name"], "quick");
    assert!(session["ended_at"].is_i64());

    let out = kiln(&cfg)
        .args(["samples", id.as_str()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let samples: Vec<serde_json::Value> = String::from_utf8_lossy(&out)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(!samples.is_empty());
    assert!(samples.windows(2).all(|w| w[0]["t"].as_i64() < w[1]["t"].as_i64()));
    assert_eq!(samples[0]["state"]["profile"], "quick");

    kiln(&cfg)
        .args(["notes", id.as_str(), "even glaze"])
        .assert()
        .success();
    kiln(&cfg)
        .args(["session", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("even glaze"));
}

#[rstest]
fn cycle_limit_stops_the_run_as_aborted() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let summary = json_stdout(kiln(&cfg).args([
        "--json",
        "run",
        "--profile",
        "long",
        "--max-cycles",
        "3",
    ]));
    assert_eq!(summary["outcome"], "ABORTED");
    assert_eq!(summary["cycles"], 3);

    let sessions = json_stdout(kiln(&cfg).args(["--json", "sessions"]));
    let rows = sessions.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["outcome"], "ABORTED");
}

#[rstest]
fn emergency_shutoff_exits_with_its_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[safety]\nemergency_shutoff_temp = 50.0\n");

    kiln(&cfg)
        .args(["run", "--profile", "long"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Emergency shutoff"));

    let sessions = json_stdout(kiln(&cfg).args(["--json", "sessions"]));
    assert_eq!(sessions[0]["outcome"], "ERROR");
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[safety]\nemergency_shutoff_temp = 50.0\n");

    let out = kiln(&cfg)
        .args(["--json", "run", "--profile", "long"])
        .assert()
        .code(3)
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8_lossy(&out);
    // the error object is printed after any log lines
    let line = text
        .lines()
        .last()
        .unwrap_or_else(|| panic!("no error line in: {text}"));
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "TempTooHigh");
    assert_eq!(v["details"]["emergency_shutoff_temp"], 50.0);
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "temp,value").unwrap();
    writeln!(f, "0,0.0").unwrap();
    writeln!(f, "1000,4.5").unwrap();

    kiln(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn calibration_csv_shifts_self_check_reading() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let csv = dir.path().join("calib.csv");
    fs::write(&csv, "temp,offset\n0,5.0\n2000,5.0\n").unwrap();

    let v = json_stdout(
        kiln(&cfg)
            .arg("--json")
            .arg("--calibration")
            .arg(&csv)
            .arg("self-check"),
    );
    assert_eq!(v["backend"], "simulation");
    assert_eq!(v["temperature"], 65.0);
    assert_eq!(v["corrected"], 70.0);
}

#[rstest]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[pid]\nki = 0.0\n");

    kiln(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pid.ki"));
}
