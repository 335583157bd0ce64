use assert_cmd::Command;

pub fn mdpipe_cmd() -> Command {
	let mut cmd = Command::cargo_bin("mdpipe").unwrap_or_else(|e| panic!("binary: {e}"));
	cmd.env("NO_COLOR", "1").env_remove("MDPIPE_LOG");
	cmd
}
