use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Sim bench config with no settle waits so a full run takes milliseconds.
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[timing]
fill_settle_ms = 0
first_phase_settle_ms = 0
second_phase_settle_ms = 0

[simulation]
total_alkalinity_umol_kg = 2300.0
meter_temperature_c = 25.0

{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn titrator(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("titrator").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("error");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["titrate", "--mass-g", "100", "--salinity", "35", "--acid-conc", "0.1"], 0, "Total alkalinity: 2284.57", "stdout")]
#[case(&["titrate", "--mass-g", "100", "--acid-conc", "0.1"], 2, "required", "stderr")]
#[case(&["titrate", "--mass-g", "0", "--salinity", "35", "--acid-conc", "0.1"], 2, "sample mass must be > 0", "stderr")]
#[case(&["titrate", "--mass-g", "100", "--salinity", "60", "--acid-conc", "0.1"], 2, "salinity", "stderr")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["pump", "fill"], 0, "Syringe at 48000/48000 steps", "stdout")]
#[case(&["pump", "wash", "--cycles", "2"], 0, "Syringe at 0/48000 steps", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, &format!("[report]\ndir = {:?}\n", dir.path()));

    let mut cmd = titrator(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
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
fn titrate_writes_run_csv_that_fit_reproduces() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let csv = dir.path().join("run.csv");

    titrator(&cfg)
        .args(["titrate", "--mass-g", "100", "--salinity", "35", "--acid-conc", "0.1"])
        .arg("--out")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("doses 10"));

    let text = fs::read_to_string(&csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "total_volume_added_L,emf_mV,pH,sample_mass_g,temp_C,salinity,acid_conc_M,total_alk_umol_kg"
    );
    let first: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(first.len(), 8);
    assert!(first[7].starts_with("2284.5"), "{first:?}");
    assert_eq!(lines.count(), 10);

    // Mass and concentration come from the first row.
    titrator(&cfg)
        .arg("fit")
        .arg("--data")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total alkalinity: 2284.57"))
        .stdout(predicate::str::contains("recorded at run time"));
}

#[rstest]
fn large_sample_spans_several_syringes() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    // Twice the acid a normal sample needs; the coarse phase refills midway.
    let out = titrator(&cfg)
        .args(["titrate", "--mass-g", "200", "--salinity", "35", "--acid-conc", "0.1"])
        .arg("--out")
        .arg(dir.path().join("run.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("(refilled)"))
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let ta: f64 = text
        .lines()
        .find_map(|l| l.strip_prefix("Total alkalinity: "))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .parse()
        .unwrap();
    assert!((ta - 2300.0).abs() / 2300.0 < 0.015, "{ta}");
}

#[rstest]
fn fit_with_one_gran_point_exits_with_endpoint_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let data = dir.path().join("short.csv");
    let mut f = fs::File::create(&data).unwrap();
    writeln!(f, "total_volume_added_L,emf_mV,pH").unwrap();
    writeln!(f, "0.0,-72.5,7.95").unwrap();
    writeln!(f, "0.0025,181.0,3.70").unwrap();

    titrator(&cfg)
        .args(["fit", "--mass-g", "100", "--acid-conc", "0.1", "--data"])
        .arg(&data)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Only 1 reading(s) fell in the Gran region"));
}

#[rstest]
fn fit_reports_bad_run_csv_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let data = dir.path().join("bad.csv");
    let mut f = fs::File::create(&data).unwrap();
    writeln!(f, "volume,emf,pH").unwrap();
    writeln!(f, "0.0,-72.5,7.95").unwrap();

    titrator(&cfg)
        .args(["fit", "--mass-g", "100", "--acid-conc", "0.1", "--data"])
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn invalid_config_is_reported_with_field_name() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[titration]\nsecond_phase_step_ph = 0.0\n");
    titrator(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "titration.second_phase_step_ph must be > 0",
        ));
}

#[rstest]
fn missing_explicit_config_is_an_error() {
    let dir = tempdir().unwrap();
    titrator(&dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.toml"));
}
