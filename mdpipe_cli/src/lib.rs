use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Keep markdown documentation up to date with embedded instructions.",
	long_about = "mdpipe processes markdown files and runs the instructions written in them as \
	              reference definitions, e.g. `[include:file]: ./snippet.md`.\n\nThe output of \
	              each instruction is written into a generated block right after it and replaced \
	              on every run. Files are processed in dependency order, so included files are \
	              always up to date first.\n\nQuick start:\n  mdpipe process            Process \
	              the current directory\n  mdpipe process --dry-run  Preview the changes"
)]
pub struct MdpipeCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory, or to a single file.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Process markdown files and update their generated blocks.
	///
	/// Reads `mdpipe.toml` from the project root when present. Flags given
	/// on the command line take precedence over the configuration. Exits
	/// with status 2 when processing fails; nothing is written in that case
	/// for the file which failed.
	Process {
		/// Directory whose files may be written. Relative paths are resolved
		/// against the project root. Defaults to the project root.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Gitignore-style pattern of files which are not processed. Can be
		/// repeated and extends the patterns from the configuration.
		#[arg(long, short)]
		exclude: Vec<String>,

		/// Compute all changes without writing files.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Show a unified diff for each changed file.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
}
