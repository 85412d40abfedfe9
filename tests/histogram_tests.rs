use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::process::Command;
use tempfile::TempDir;

fn build_sample_db(dir: &TempDir) -> std::path::PathBuf {
    let input = dir.path().join("in.fa");
    let mut file = File::create(&input).unwrap();
    writeln!(file, ">r1\nACGTACGT").unwrap(); // -> ACGT:2, CGTA:2, GTAC:1
    let db = dir.path().join("out.meryl");
    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("count").arg("-k").arg("4").arg("-i").arg(&input).arg("-o").arg(&db).arg("--blocks-bits").arg("0");
    cmd.assert().success();
    db
}

#[test]
fn histogram_totals_match_expected_distribution() {
    let dir = TempDir::new().unwrap();
    let db = build_sample_db(&dir);

    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("histogram").arg(&db);
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("1\t1")); // one k-mer with count 1 (GTAC)
    assert!(text.contains("2\t2")); // two k-mers with count 2 (ACGT, CGTA)
    assert!(text.contains("distinct=3 unique=1 total=5"));
}

#[test]
fn recompute_matches_the_stored_index() {
    let dir = TempDir::new().unwrap();
    let db = build_sample_db(&dir);

    let stored = {
        let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
        cmd.arg("histogram").arg(&db);
        String::from_utf8(cmd.assert().success().get_output().stdout.clone()).unwrap()
    };
    let recomputed = {
        let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
        cmd.arg("histogram").arg(&db).arg("--recompute");
        String::from_utf8(cmd.assert().success().get_output().stdout.clone()).unwrap()
    };
    assert_eq!(stored, recomputed);
}

#[test]
fn json_report_mirrors_the_text_summary() {
    let dir = TempDir::new().unwrap();
    let db = build_sample_db(&dir);
    let json_path = dir.path().join("hist.json");

    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("histogram").arg(&db).arg("--json").arg(&json_path);
    cmd.assert().success();

    let report: Value = serde_json::from_reader(File::open(&json_path).unwrap()).unwrap();
    assert_eq!(report["num_distinct"], 3);
    assert_eq!(report["num_unique"], 1);
    assert_eq!(report["num_total"], 5);
    assert_eq!(report["k"], 4);
}
