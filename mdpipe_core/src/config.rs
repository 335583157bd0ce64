use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::MdpipeError;
use crate::MdpipeResult;
use crate::Processor;
use crate::preprocess::Preprocess;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"mdpipe.toml",
	".mdpipe.toml",
	".config/mdpipe.toml",
];

/// Project configuration.
///
/// ```toml
/// output = "docs"
/// max_depth = 4
///
/// [exclude]
/// patterns = ["build/", "*.generated.md"]
///
/// [preprocess]
/// allow_exec = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MdpipeConfig {
	/// Directory whose files may be written, relative to the project root.
	/// Defaults to the input directory.
	#[serde(default)]
	pub output: Option<PathBuf>,
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Ignore `.gitignore` rules when listing files.
	#[serde(default)]
	pub disable_gitignore: bool,
	/// Maximum directory depth below the input directory.
	#[serde(default)]
	pub max_depth: Option<usize>,
	#[serde(default)]
	pub preprocess: PreprocessConfig,
}

/// Files which are never processed.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
	/// Gitignore-style patterns relative to the project root.
	///
	/// Examples: `"build/"`, `"*.generated.md"`, `"!important.md"`.
	#[serde(default)]
	pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// Allow `include:exec` to run shell commands.
	#[serde(default)]
	pub allow_exec: bool,
}

impl Default for PreprocessConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			allow_exec: false,
		}
	}
}

fn default_true() -> bool {
	true
}

impl MdpipeConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> MdpipeResult<Option<MdpipeConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		tracing::debug!(path = %config_path.display(), "loading config");

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;

		Ok(Some(config))
	}

	pub fn parse(content: &str) -> MdpipeResult<MdpipeConfig> {
		toml::from_str(content).map_err(|e| MdpipeError::ConfigParse(e.to_string()))
	}

	/// The output directory resolved against `root`.
	pub fn output(&self, root: &Path) -> Option<PathBuf> {
		self.output.as_ref().map(|output| root.join(output))
	}

	/// A processor set up according to this configuration.
	pub fn processor(&self) -> Processor {
		let mut processor = Processor::new();

		processor
			.exclude(self.exclude.patterns.iter().cloned())
			.disable_gitignore(self.disable_gitignore)
			.max_depth(self.max_depth);

		if self.preprocess.enabled {
			processor.add_task(
				Preprocess::default().with_exec(self.preprocess.allow_exec),
				None,
			);
		}

		processor
	}
}
