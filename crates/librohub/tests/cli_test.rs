//! Integration tests for the `librohub` CLI binary.
//!
//! Argument parsing, configuration errors, and every library command run
//! against the `--demo` in-memory catalog, so no hosted service is needed.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `librohub` binary with env isolation.
///
/// Clears all `LIBROHUB_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn librohub_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("librohub");
    cmd.env("HOME", "/tmp/librohub-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/librohub-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("LIBROHUB_PROFILE")
        .env_remove("LIBROHUB_URL")
        .env_remove("LIBROHUB_API_KEY")
        .env_remove("LIBROHUB_OUTPUT")
        .env_remove("LIBROHUB_INSECURE")
        .env_remove("LIBROHUB_TIMEOUT")
        .env_remove("LIBROHUB_DEMO")
        .env_remove("RUST_LOG");
    cmd
}

/// `librohub --demo <args>`.
fn demo(args: &[&str]) -> assert_cmd::Command {
    let mut cmd = librohub_cmd();
    cmd.arg("--demo").args(args);
    cmd
}

fn json_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = librohub_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    librohub_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("books")
            .and(predicate::str::contains("members"))
            .and(predicate::str::contains("loans"))
            .and(predicate::str::contains("--demo")),
    );
}

#[test]
fn test_version_flag() {
    librohub_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("librohub"));
}

#[test]
fn test_completions_zsh() {
    librohub_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    librohub_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_books_list_without_service() {
    librohub_cmd()
        .args(["books", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No service configured"));
}

#[test]
fn test_unknown_profile() {
    librohub_cmd()
        .args(["--profile", "nope", "stats"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Profile 'nope' not found"));
}

#[test]
fn test_url_without_api_key() {
    librohub_cmd()
        .args(["--url", "https://library.example.org", "stats"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn test_config_path() {
    librohub_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("librohub").and(predicate::str::contains("config.toml")));
}

// ── Catalog ─────────────────────────────────────────────────────────

#[test]
fn test_demo_books_list_json() {
    let output = demo(&["books", "list", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let books = json_stdout(&output);
    assert_eq!(books.as_array().unwrap().len(), 8);
}

#[test]
fn test_demo_books_list_filters() {
    let output = demo(&["books", "list", "-a", "borrowed", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(json_stdout(&output).as_array().unwrap().len(), 3);

    let output = demo(&["books", "list", "-s", "herbert", "-o", "json"])
        .output()
        .unwrap();
    let books = json_stdout(&output);
    assert_eq!(books.as_array().unwrap().len(), 1);
    assert_eq!(books[0]["title"], "Dune");
}

#[test]
fn test_demo_books_list_plain_prints_one_id_per_line() {
    let output = demo(&["books", "list", "-o", "plain"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 8);
}

#[test]
fn test_demo_books_show_unknown() {
    demo(&["books", "show", "Moby Dick"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("book 'Moby Dick' not found"));
}

#[test]
fn test_demo_books_add() {
    demo(&[
        "books",
        "add",
        "--title",
        "Beloved",
        "--author",
        "Toni Morrison",
        "--category",
        "Fiction",
    ])
    .assert()
    .success()
    .stderr(predicate::str::contains("Book added successfully!"));
}

#[test]
fn test_demo_books_add_blank_title() {
    demo(&[
        "books", "add", "--title", " ", "--author", "Anon", "--category", "Fiction",
    ])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("title"));
}

#[test]
fn test_demo_categories_list() {
    demo(&["categories", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Science Fiction").and(predicate::str::contains("Children")));
}

// ── Lending ─────────────────────────────────────────────────────────

#[test]
fn test_demo_borrow_available_book() {
    demo(&["books", "borrow", "Matilda", "--member", "ada@example.org"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Book borrowed successfully!"));
}

#[test]
fn test_demo_borrow_book_on_loan_is_refused() {
    demo(&["books", "borrow", "Dune", "-m", "Grace Hopper"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Book is not available"));
}

#[test]
fn test_demo_borrow_unknown_member() {
    demo(&["books", "borrow", "Matilda", "-m", "nobody@example.org"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("member 'nobody@example.org' not found"));
}

#[test]
fn test_demo_return_borrowed_book() {
    demo(&["books", "return", "Dune"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Book returned successfully!"));
}

#[test]
fn test_demo_return_book_on_shelf_is_refused() {
    demo(&["books", "return", "Middlemarch"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Book is not currently borrowed"));
}

#[test]
fn test_demo_delete_borrowed_book_is_refused() {
    demo(&["books", "delete", "Dune", "--yes"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("currently borrowed"));
}

#[test]
fn test_demo_delete_book_on_shelf() {
    demo(&["books", "delete", "Middlemarch", "--yes"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Book deleted successfully!"));
}

#[test]
fn test_demo_delete_requires_yes_without_tty() {
    demo(&["books", "delete", "Middlemarch"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("requires confirmation"));
}

// ── Members, loans, stats ───────────────────────────────────────────

#[test]
fn test_demo_members_show_json() {
    let output = demo(&["members", "show", "ada@example.org", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let dashboard = json_stdout(&output);
    assert_eq!(dashboard["member"]["name"], "Ada Lovelace");
    assert_eq!(dashboard["open_loans"].as_array().unwrap().len(), 1);
}

#[test]
fn test_demo_members_add_requires_email() {
    demo(&["members", "add", "--name", "Edsger Dijkstra", "--email", ""])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("email"));
}

#[test]
fn test_demo_overdue_loans() {
    let output = demo(&["loans", "list", "--status", "overdue", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
}

#[test]
fn test_demo_loans_for_member() {
    let output = demo(&["loans", "list", "-m", "Katherine Johnson", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let loans = json_stdout(&output);
    assert_eq!(loans.as_array().unwrap().len(), 1);
    assert!(loans[0]["return_date"].is_string());
}

#[test]
fn test_demo_stats_json() {
    let output = demo(&["stats", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let stats = json_stdout(&output);
    assert_eq!(stats["total_books"], 8);
    assert_eq!(stats["available_books"], 5);
    assert_eq!(stats["total_members"], 4);
    assert_eq!(stats["active_loans"], 3);
    assert_eq!(stats["overdue_loans"], 1);
}

#[test]
fn test_demo_watch_for_a_second() {
    demo(&["watch", "--duration", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("books 8 (5 available)"));
}
