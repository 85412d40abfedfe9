use assert_cmd::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::process::Command;
use tempfile::TempDir;

fn write_fasta(dir: &TempDir, name: &str, records: &[(&str, &str)]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    for (id, seq) in records {
        writeln!(file, ">{id}\n{seq}").unwrap();
    }
    path
}

fn run_count(k: u8, input: &std::path::Path, output: &std::path::Path, extra: &[&str]) {
    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("count")
        .arg("-k")
        .arg(k.to_string())
        .arg("-i")
        .arg(input)
        .arg("-o")
        .arg(output)
        .args(extra);
    cmd.assert().success();
}

fn dump_tsv(db: &std::path::Path) -> HashMap<String, u32> {
    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("dump").arg(db);
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    text.lines()
        .map(|line| {
            let mut parts = line.splitn(2, '\t');
            let kmer = parts.next().unwrap().to_string();
            let count: u32 = parts.next().unwrap().parse().unwrap();
            (kmer, count)
        })
        .collect()
}

#[test]
fn counting_a_tiny_input_produces_expected_kmer_counts() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "ACGTACGT")]);
    let db = dir.path().join("out.meryl");
    run_count(4, &input, &db, &["--blocks-bits", "0"]);

    let counts = dump_tsv(&db);
    assert_eq!(counts.get("ACGT"), Some(&2));
    assert_eq!(counts.get("CGTA"), Some(&2));
    assert_eq!(counts.get("GTAC"), Some(&1));
    assert_eq!(counts.len(), 3);
}

#[test]
fn an_n_base_breaks_the_kmer_window() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "ACGTNACGT")]);
    let db = dir.path().join("out.meryl");
    run_count(4, &input, &db, &["--blocks-bits", "0"]);

    let counts = dump_tsv(&db);
    assert_eq!(counts.get("ACGT"), Some(&2));
    assert_eq!(counts.len(), 1);
}

#[test]
fn forward_only_keeps_strand_specific_kmers_distinct() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "AAAA"), ("r2", "TTTT")]);
    let db = dir.path().join("out.meryl");
    run_count(4, &input, &db, &["--forward-only", "--blocks-bits", "0"]);

    let counts = dump_tsv(&db);
    assert_eq!(counts.get("AAAA"), Some(&1));
    assert_eq!(counts.get("TTTT"), Some(&1));
}

#[test]
fn multiset_mode_keeps_every_occurrence_as_a_separate_entry() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "ACGTACGT")]);
    let db = dir.path().join("out.meryl");
    run_count(4, &input, &db, &["--multiset", "--blocks-bits", "0"]);

    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("dump").arg(&db);
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 5); // every k-mer occurrence, uncoalesced
}

#[test]
fn min_count_filters_the_dump_output() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "ACGTACGT")]);
    let db = dir.path().join("out.meryl");
    run_count(4, &input, &db, &["--blocks-bits", "0"]);

    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    cmd.arg("dump").arg(&db).arg("--min-count").arg("2");
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 2); // only ACGT and CGTA reach count 2
}

#[test]
fn rejects_a_k_mer_size_that_cannot_fit_the_persistent_layout() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "ACGT")]);
    let db = dir.path().join("out.meryl");
    let mut cmd = Command::cargo_bin("orion-kmer").unwrap();
    // K=64 with the default blocksBits leaves a suffix wider than 64 bits.
    cmd.arg("count").arg("-k").arg("64").arg("-i").arg(&input).arg("-o").arg(&db);
    cmd.assert().failure().code(1);
}

#[test]
fn counting_into_an_existing_output_directory_still_succeeds() {
    let dir = TempDir::new().unwrap();
    let input = write_fasta(&dir, "in.fa", &[("r1", "ACGT")]);
    let db = dir.path().join("out.meryl");
    fs::create_dir_all(&db).unwrap();
    run_count(4, &input, &db, &["--blocks-bits", "0"]);
    assert!(db.join("merylIndex").exists());
}
