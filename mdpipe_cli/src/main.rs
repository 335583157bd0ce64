use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use mdpipe_cli::Commands;
use mdpipe_cli::MdpipeCli;
use mdpipe_core::Event;
use mdpipe_core::FileChange;
use mdpipe_core::MdpipeConfig;
use mdpipe_core::MdpipeError;
use mdpipe_core::TracingListener;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,cyan) => {
		if color_enabled() {
			format!("{}", $text.cyan())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = MdpipeCli::parse();

	// Respect NO_COLOR, --no-color and terminals without color support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Process {
			output,
			exclude,
			dry_run,
			diff,
		}) => run_process(&args, output.as_deref(), exclude, *dry_run, *diff),
		None => {
			eprintln!("No subcommand specified. Run `mdpipe --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<MdpipeError>() {
			Ok(error) => {
				let report: miette::Report = (*error).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log records go to stderr. `MDPIPE_LOG` takes an `EnvFilter` directive and
/// overrides the level picked from `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default = if verbose {
		"mdpipe_core=debug"
	} else {
		"mdpipe_core=warn"
	};
	let filter = EnvFilter::try_from_env("MDPIPE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.try_init()
		.ok();
}

fn resolve_path(args: &MdpipeCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// The project root: the given directory, or the directory of the given
/// file.
fn resolve_root(path: &Path) -> PathBuf {
	let root = if path.is_file() {
		path.parent()
			.filter(|parent| !parent.as_os_str().is_empty())
			.map_or_else(|| PathBuf::from("."), Path::to_path_buf)
	} else {
		path.to_path_buf()
	};

	root.canonicalize().unwrap_or(root)
}

fn run_process(
	args: &MdpipeCli,
	output: Option<&Path>,
	exclude: &[String],
	dry_run: bool,
	show_diff: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let path = resolve_path(args);
	let root = resolve_root(&path);
	let config = MdpipeConfig::load(&root)?.unwrap_or_default();
	let output = output
		.map(|output| root.join(output))
		.or_else(|| config.output(&root));
	let mut processor = config.processor();

	processor
		.exclude(exclude.iter().cloned())
		.dry_run(dry_run)
		.add_listener(TracingListener);

	if args.verbose {
		processor.add_listener(progress);
		println!(
			"Processing {} (output: {})",
			path.display(),
			output.as_deref().unwrap_or(root.as_path()).display()
		);
	}

	let changes = processor.run(&path, output.as_deref())?;

	print_summary(&changes, &root, dry_run, show_diff);

	Ok(())
}

/// Reports each file as it starts processing.
fn progress(event: &Event) {
	if let Event::FileStarted { path } = event {
		eprintln!("  {} {path}", colored!("processing", cyan));
	}
}

fn print_summary(changes: &[FileChange], root: &Path, dry_run: bool, show_diff: bool) {
	if changes.is_empty() {
		println!("All files are already up to date.");
		return;
	}

	let verb = if dry_run { "Would update" } else { "Updated" };

	for change in changes {
		println!("{verb} {}", make_relative(&change.path, root));

		if show_diff {
			print_diff(&change.original, &change.content);
		}
	}

	println!();
	println!(
		"{}",
		colored!(
			format!("{verb} {} file(s).", changes.len()),
			bold
		)
	);
}

/// Print a unified diff between two strings, colorized.
fn print_diff(original: &str, updated: &str) {
	let diff = TextDiff::from_lines(original, updated);

	for (index, group) in diff.grouped_ops(3).iter().enumerate() {
		if index > 0 {
			println!("  ...");
		}

		for op in group {
			for change in diff.iter_changes(op) {
				match change.tag() {
					ChangeTag::Delete => {
						print!("  {}", colored!(format!("-{change}"), red));
					}
					ChangeTag::Insert => {
						print!("  {}", colored!(format!("+{change}"), green));
					}
					ChangeTag::Equal => {
						print!("   {change}");
					}
				}

				if change.missing_newline() {
					println!();
				}
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
