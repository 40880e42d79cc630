//! Command-line validation tests for annorecon.
//!
//! Tests cover:
//! 1. Unsorted input detection and --assume-sorted
//! 2. Error messages naming kind, file and record
//! 3. Argument errors (schema tag, split threshold)
//! 4. stdout as the default data channel

use std::io::Write;
use std::process::{Command, Output};
use tempfile::{tempdir, NamedTempFile};

/// Helper to create a temporary input file.
fn create_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file.flush().unwrap();
    file
}

/// Helper to run annorecon and return output.
fn run_annorecon(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_annorecon"))
        .args(args)
        .env_remove("ANNORECON_LOG")
        .output()
        .expect("Failed to run annorecon")
}

fn is_success(output: &Output) -> bool {
    output.status.success()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// =============================================================================
// Test fixtures
// =============================================================================

fn interpro_row(key: &str, go: &str) -> String {
    format!(
        "\"{k}\";\"{k}\";\"\";\"{go}\";\"\";\"\";\"\"\n",
        k = key,
        go = go
    )
}

fn sorted_table() -> String {
    [interpro_row("g1", "GO:1"), interpro_row("g3", "GO:3")].concat()
}

fn other_sorted_table() -> String {
    [interpro_row("g2", "GO:2"), interpro_row("g3", "GO:33")].concat()
}

fn unsorted_table() -> String {
    [interpro_row("g5", "GO:5"), interpro_row("g2", "GO:2")].concat()
}

// =============================================================================
// Merge command tests
// =============================================================================

#[test]
fn test_merge_sorted_inputs_to_stdout() {
    let a = create_file(&sorted_table());
    let b = create_file(&other_sorted_table());
    let output = run_annorecon(&[
        "merge",
        "--type",
        "interpro",
        "-a",
        a.path().to_str().unwrap(),
        "-b",
        b.path().to_str().unwrap(),
        "--no-header",
    ]);
    assert!(is_success(&output), "stderr: {}", stderr(&output));

    let keys: Vec<String> = stdout(&output)
        .lines()
        .map(|l| l.split(';').next().unwrap().trim_matches('"').to_string())
        .collect();
    assert_eq!(keys, vec!["g1", "g2", "g3", "g3"]);
}

#[test]
fn test_merge_unsorted_fails() {
    let a = create_file(&unsorted_table());
    let b = create_file(&other_sorted_table());
    let output = run_annorecon(&[
        "merge",
        "--type",
        "INTERPRO",
        "-a",
        a.path().to_str().unwrap(),
        "-b",
        b.path().to_str().unwrap(),
    ]);
    assert!(!is_success(&output), "Unsorted input should fail");
    let err = stderr(&output);
    assert!(err.contains("FormatError"), "stderr: {}", err);
    assert!(err.contains("record 2"), "stderr: {}", err);
}

#[test]
fn test_merge_assume_sorted_bypasses_validation() {
    let a = create_file(&unsorted_table());
    let b = create_file(&other_sorted_table());
    let output = run_annorecon(&[
        "merge",
        "--type",
        "interpro",
        "-a",
        a.path().to_str().unwrap(),
        "-b",
        b.path().to_str().unwrap(),
        "--assume-sorted",
    ]);
    assert!(is_success(&output), "--assume-sorted should bypass validation");
    assert_eq!(stdout(&output).lines().count(), 5);
}

#[test]
fn test_merge_stats_on_stderr() {
    let a = create_file(&sorted_table());
    let b = create_file(&other_sorted_table());
    let output = run_annorecon(&[
        "merge",
        "--type",
        "interpro",
        "-a",
        a.path().to_str().unwrap(),
        "-b",
        b.path().to_str().unwrap(),
        "--stats",
    ]);
    assert!(is_success(&output));
    assert!(stderr(&output).contains("Read A: 2, Read B: 2, Written: 4"));
}

#[test]
fn test_unknown_schema_rejected() {
    let a = create_file(&sorted_table());
    let output = run_annorecon(&[
        "merge",
        "--type",
        "genbank",
        "-a",
        a.path().to_str().unwrap(),
        "-b",
        a.path().to_str().unwrap(),
    ]);
    assert!(!is_success(&output));
    assert!(stderr(&output).contains("unknown annotation type"));
}

#[test]
fn test_missing_input_names_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nothing_here.csv");
    let output = run_annorecon(&[
        "merge",
        "--type",
        "interpro",
        "-a",
        missing.to_str().unwrap(),
        "-b",
        missing.to_str().unwrap(),
    ]);
    assert!(!is_success(&output));
    let err = stderr(&output);
    assert!(err.contains("PathError"), "stderr: {}", err);
    assert!(err.contains("nothing_here.csv"), "stderr: {}", err);
}

// =============================================================================
// Split and extract tests
// =============================================================================

#[test]
fn test_split_zero_threshold_rejected() {
    let dir = tempdir().unwrap();
    let input = create_file(&sorted_table());
    let template = dir.path().join("part.csv");
    let output = run_annorecon(&[
        "split",
        "--type",
        "interpro",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        template.to_str().unwrap(),
        "-n",
        "0",
    ]);
    assert!(!is_success(&output));
    assert!(stderr(&output).contains("ArgumentError"));
    assert!(!dir.path().join("part-001.csv").exists());
}

#[test]
fn test_split_writes_series() {
    let dir = tempdir().unwrap();
    let input = create_file(&[sorted_table(), interpro_row("g4", "GO:4")].concat());
    let template = dir.path().join("part.csv");
    let output = run_annorecon(&[
        "split",
        "--type",
        "interpro",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        template.to_str().unwrap(),
        "-n",
        "2",
    ]);
    assert!(is_success(&output), "stderr: {}", stderr(&output));
    assert!(dir.path().join("part-001.csv").exists());
    assert!(dir.path().join("part-002.csv").exists());
    assert!(!dir.path().join("part-003.csv").exists());
}

#[test]
fn test_extract_raw_keys() {
    let input =
        create_file(&[interpro_row("q1 extra", "GO:1"), interpro_row("q2", "GO:2")].concat());
    let ids = create_file("q1\nq2\n");
    let args = |raw: bool| {
        let mut args = vec![
            "extract",
            "--type",
            "interpro",
            "-i",
            input.path().to_str().unwrap(),
            "--ids",
            ids.path().to_str().unwrap(),
            "--no-header",
        ];
        if raw {
            args.push("--raw-keys");
        }
        run_annorecon(&args)
    };

    let normalized = args(false);
    assert!(is_success(&normalized));
    assert_eq!(stdout(&normalized).lines().count(), 2);

    let raw = args(true);
    assert!(is_success(&raw));
    assert_eq!(stdout(&raw).lines().count(), 1);
}

// =============================================================================
// Sequence commands
// =============================================================================

#[test]
fn test_reconcile_headerless_fasta_fails() {
    let dir = tempdir().unwrap();
    let a = create_file("ACGT\n");
    let b = create_file(">s1\nAC\n");
    let out = dir.path().join("out.fa");
    let output = run_annorecon(&[
        "reconcile",
        "-a",
        a.path().to_str().unwrap(),
        "-b",
        b.path().to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(!is_success(&output));
    assert!(stderr(&output).contains("FormatError"));
    assert!(!out.exists());
}

#[test]
fn test_renumber_then_restore() {
    let dir = tempdir().unwrap();
    let input = create_file(">alpha one\nAC\n>beta\nGT\n");
    let renumbered = dir.path().join("renumbered.fa");
    let relationships = dir.path().join("rel.csv");

    let output = run_annorecon(&[
        "renumber",
        "-i",
        input.path().to_str().unwrap(),
        "-o",
        renumbered.to_str().unwrap(),
        "-r",
        relationships.to_str().unwrap(),
        "--prefix",
        "Q",
        "--width",
        "2",
    ]);
    assert!(is_success(&output), "stderr: {}", stderr(&output));

    let output = run_annorecon(&[
        "restore-ids",
        "-i",
        renumbered.to_str().unwrap(),
        "-r",
        relationships.to_str().unwrap(),
    ]);
    assert!(is_success(&output), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), ">alpha one\nAC\n>beta\nGT\n");
}
