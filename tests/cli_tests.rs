//! Command-line driver tests

use std::fs;
use std::process::Command;

fn pptree() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pptree"))
}

#[test]
fn test_writes_verilog_and_diagram() {
    let dir = tempfile::tempdir().unwrap();
    let status = pptree()
        .args(["--width", "8", "--transforms", "LF@6", "--top-module", "add8"])
        .arg("--hdl-root")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let verilog = fs::read_to_string(dir.path().join("add8.v")).unwrap();
    assert!(verilog.contains("module add8 ("));
    assert!(dir.path().join("add8.dot").exists());
    assert!(!dir.path().join("add8.json").exists());
}

#[test]
fn test_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let status = pptree()
        .args(["-w", "4", "--start", "kogge-stone", "--json"])
        .arg("--hdl-root")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("adder.json")).unwrap())
            .unwrap();
    assert_eq!(report["config"]["width"], 4);
    assert_eq!(report["netlist"]["module"], "adder");
}

#[test]
fn test_unknown_rule_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = pptree()
        .args(["--width", "8", "--transforms", "LF@6_XX@1"])
        .arg("--hdl-root")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown rule 'XX'"));
    assert!(!dir.path().join("adder.v").exists());
}

#[test]
fn test_config_file_with_override() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pptree.toml");
    fs::write(&config, "width = 16\nstart = \"han-carlson\"\ntop-module = \"hc\"\n").unwrap();

    let status = pptree()
        .arg("--config")
        .arg(&config)
        .args(["--mapping", "structural"])
        .arg("--hdl-root")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let verilog = fs::read_to_string(dir.path().join("hc.v")).unwrap();
    assert!(verilog.contains("input  [15:0] a"));
    assert!(verilog.contains("module ppa_black ("));
}

#[test]
fn test_unsupported_language_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = pptree()
        .args(["--width", "4", "--language", "vhdl"])
        .arg("--hdl-root")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown HDL language 'vhdl'"));
}
