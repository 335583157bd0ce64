use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum MdpipeError {
	#[error(transparent)]
	#[diagnostic(code(mdpipe::io_error))]
	Io(#[from] std::io::Error),

	#[error("failure to load markdown: {0}")]
	#[diagnostic(code(mdpipe::markdown))]
	Markdown(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(mdpipe::config_parse),
		help("check that mdpipe.toml is valid TOML with optional `output`, [exclude] and [preprocess] entries")
	)]
	ConfigParse(String),

	#[error("`{}` is not valid JSON: {reason}", .file.display())]
	#[diagnostic(code(mdpipe::invalid_json))]
	InvalidJson { file: PathBuf, reason: String },

	#[error("invalid glob pattern `{pattern}`: {reason}")]
	#[diagnostic(code(mdpipe::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("symlink cycle detected at `{}`", .path.display())]
	#[diagnostic(
		code(mdpipe::symlink_cycle),
		help("remove the circular symlink or exclude this path")
	)]
	SymlinkCycle { path: PathBuf },

	#[error("dependency `{dependency}` not found")]
	#[diagnostic(
		code(mdpipe::dependency_unresolvable),
		help("check the path or wrap the dependency in `Optional` if it may be missing")
	)]
	DependencyUnresolvable { dependency: String },

	#[error("circular dependency detected for `{}`:\n{}", .file.display(), format_stack(.stack))]
	#[diagnostic(
		code(mdpipe::circular_dependency),
		help("break the cycle by removing one of the dependencies in the stack")
	)]
	DependencyCircularDependency { file: PathBuf, stack: Vec<PathBuf> },

	#[error("dependency `{}` is not available yet", .file.display())]
	#[diagnostic(
		code(mdpipe::dependency_unavailable),
		help("files cannot be requested before they are processed; queue them instead")
	)]
	DependencyUnavailable { file: PathBuf },

	#[error("processing of dependency `{}` failed", .file.display())]
	#[diagnostic(code(mdpipe::dependency_failed))]
	DependencyFailed { file: PathBuf },

	#[error("the `{task}` task failed for `{}`", .file.display())]
	#[diagnostic(code(mdpipe::task_failed))]
	TaskFailed {
		file: PathBuf,
		task: String,
		#[source]
		source: Option<Box<MdpipeError>>,
	},

	#[error("processing failed")]
	#[diagnostic(code(mdpipe::processing_failed))]
	ProcessingFailed(#[source] Box<MdpipeError>),

	#[error("cannot write `{}`: the file is outside the output directory `{}`", .file.display(), .output.display())]
	#[diagnostic(
		code(mdpipe::write_outside_output),
		help("only files inside the output directory can be modified")
	)]
	WriteOutsideOutput { file: PathBuf, output: PathBuf },

	#[error("instruction `{instruction}` failed for target `{target}`: {reason}")]
	#[diagnostic(code(mdpipe::instruction_failed))]
	InstructionFailed {
		instruction: String,
		target: String,
		reason: String,
	},

	#[error("invalid parameters for instruction `{instruction}`: {reason}")]
	#[diagnostic(
		code(mdpipe::instruction_parameters),
		help("parameters are a JSON object in the title: `[{instruction}]: <target> ({{\"key\": \"value\"}})`")
	)]
	InstructionParameters { instruction: String, reason: String },
}

impl MdpipeError {
	/// Errors raised by the processing engine itself. These pass through task
	/// wrapping unchanged so that the originating context is preserved.
	pub fn is_processor_error(&self) -> bool {
		matches!(
			self,
			Self::DependencyUnresolvable { .. }
				| Self::DependencyCircularDependency { .. }
				| Self::DependencyUnavailable { .. }
				| Self::DependencyFailed { .. }
				| Self::TaskFailed { .. }
				| Self::ProcessingFailed(_)
		)
	}

	pub fn is_unresolvable(&self) -> bool {
		matches!(self, Self::DependencyUnresolvable { .. })
	}
}

fn format_stack(stack: &[PathBuf]) -> String {
	stack
		.iter()
		.map(|path| format!("  * {}", path.display()))
		.collect::<Vec<_>>()
		.join("\n")
}

pub type MdpipeResult<T> = Result<T, MdpipeError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
