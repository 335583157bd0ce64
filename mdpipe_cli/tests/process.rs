use mdpipe_core::AnyEmptyResult;

mod common;

use common::mdpipe_cmd;

const README: &str = "# Readme\n\n[include:file]: ./snippet.txt\n";

#[test]
fn process_writes_generated_blocks() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("readme.md"), README)?;
	std::fs::write(tmp.path().join("snippet.txt"), "Hello from the snippet.\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Updated readme.md"));

	let content = std::fs::read_to_string(tmp.path().join("readme.md"))?;
	assert!(content.starts_with(README));
	assert!(content.contains("[//]: # (start: "));
	assert!(content.contains("\nHello from the snippet.\n"));

	Ok(())
}

#[test]
fn process_noop_when_up_to_date() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("readme.md"), README)?;
	std::fs::write(tmp.path().join("snippet.txt"), "Hello\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let first = std::fs::read_to_string(tmp.path().join("readme.md"))?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("already up to date"));

	assert_eq!(std::fs::read_to_string(tmp.path().join("readme.md"))?, first);

	Ok(())
}

#[test]
fn process_dry_run_shows_diff_without_writing() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("readme.md"), README)?;
	std::fs::write(tmp.path().join("snippet.txt"), "Hello\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--dry-run")
		.arg("--diff")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Would update readme.md"))
		.stdout(predicates::str::contains("+Hello"));

	assert_eq!(std::fs::read_to_string(tmp.path().join("readme.md"))?, README);

	Ok(())
}

#[test]
fn process_exclude_flag_skips_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("readme.md"), README)?;
	std::fs::write(tmp.path().join("snippet.txt"), "Hello\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--exclude")
		.arg("readme.md")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("already up to date"));

	assert_eq!(std::fs::read_to_string(tmp.path().join("readme.md"))?, README);

	Ok(())
}

#[test]
fn process_single_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("readme.md"), README)?;
	std::fs::write(tmp.path().join("other.md"), README)?;
	std::fs::write(tmp.path().join("snippet.txt"), "Hello\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path().join("readme.md"))
		.assert()
		.success()
		.stdout(predicates::str::contains("Updated readme.md"));

	assert_ne!(std::fs::read_to_string(tmp.path().join("readme.md"))?, README);
	assert_eq!(std::fs::read_to_string(tmp.path().join("other.md"))?, README);

	Ok(())
}

#[test]
fn process_config_disables_preprocess() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("mdpipe.toml"), "[preprocess]\nenabled = false\n")?;
	std::fs::write(tmp.path().join("readme.md"), README)?;
	std::fs::write(tmp.path().join("snippet.txt"), "Hello\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("already up to date"));

	Ok(())
}

#[cfg(unix)]
#[test]
fn process_config_allows_exec() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("mdpipe.toml"), "[preprocess]\nallow_exec = true\n")?;
	std::fs::write(
		tmp.path().join("readme.md"),
		"[include:exec]: <echo from-shell>\n",
	)?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let content = std::fs::read_to_string(tmp.path().join("readme.md"))?;
	assert!(content.contains("\nfrom-shell\n"));

	Ok(())
}

#[test]
fn process_invalid_config_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("mdpipe.toml"), "unknown_key = 1\n")?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("failed to parse config file"));

	Ok(())
}

#[test]
fn process_missing_include_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	std::fs::write(tmp.path().join("readme.md"), README)?;

	mdpipe_cmd()
		.arg("process")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("not found"));

	assert_eq!(std::fs::read_to_string(tmp.path().join("readme.md"))?, README);

	Ok(())
}

#[test]
fn missing_subcommand_fails() {
	mdpipe_cmd()
		.assert()
		.code(1)
		.stderr(predicates::str::contains("No subcommand specified"));
}
