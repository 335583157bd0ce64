//! The preprocess task.
//!
//! Instructions are reference definitions whose label names a registered
//! [`Instruction`]:
//!
//! ```markdown
//! [include:file]: ./path/to/file.md
//! [include:exec]: <./script.sh --quiet>
//! ```
//!
//! The optional title holds the parameters as a JSON object. The output of
//! each instruction is written after it as a generated block which is
//! replaced on every run:
//!
//! ```markdown
//! [include:file]: ./path/to/file.md
//! [//]: # (start: 5b1d5a8c7e3f9a20)
//! [//]: # (warning: Generated automatically. Do not edit.)
//!
//! The content of file.md
//!
//! [//]: # (end: 5b1d5a8c7e3f9a20)
//! ```
//!
//! Instructions inside a generated block are ignored.

use std::collections::HashMap;
use std::ops::Range;
use std::process::Command;
use std::rc::Rc;

use xxhash_rust::xxh3::xxh3_64;

use super::MdpipeError;
use super::MdpipeResult;
use crate::Change;
use crate::Coordinate;
use crate::Document;
use crate::Editor;
use crate::File;
use crate::FileReference;
use crate::Location;
use crate::Markdown;
use crate::Mutation;
use crate::NodeData;
use crate::NodeKind;
use crate::NodeType;
use crate::Resolver;
use crate::Target;
use crate::Task;
use crate::paths;

pub const WARNING: &str = "Generated automatically. Do not edit.";

/// A named operation producing the content of a generated block.
pub trait Instruction {
	/// Label used to invoke the instruction, e.g. `include:file`.
	fn name(&self) -> &str;

	/// Produce the output for `target`. Relative targets are resolved against
	/// the directory of `file`.
	fn process(
		&self,
		resolver: &mut Resolver<'_>,
		file: &Rc<File>,
		target: &str,
		parameters: &serde_json::Value,
	) -> MdpipeResult<String>;
}

/// Includes the target file.
///
/// Markdown targets have their reference links inlined and relative links
/// rebased onto the including file. Other files are included as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeFile;

impl Instruction for IncludeFile {
	fn name(&self) -> &str {
		"include:file"
	}

	fn process(
		&self,
		resolver: &mut Resolver<'_>,
		file: &Rc<File>,
		target: &str,
		_parameters: &serde_json::Value,
	) -> MdpipeResult<String> {
		let included = resolver.resolve(&FileReference::new(target))?;

		if included.extension() != Some("md") {
			return Ok(included.content()?.trim_end().to_string());
		}

		let document = included.metadata::<Markdown>()?;
		let document = document.mutate([
			Mutation::ReferencesInline,
			Mutation::Move(file.path().to_path_buf()),
		])?;

		Ok(document.to_string().trim_end().to_string())
	}
}

/// Runs the target as a shell command in the directory of the file and
/// includes its standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeExec;

impl Instruction for IncludeExec {
	fn name(&self) -> &str {
		"include:exec"
	}

	fn process(
		&self,
		_resolver: &mut Resolver<'_>,
		file: &Rc<File>,
		target: &str,
		_parameters: &serde_json::Value,
	) -> MdpipeResult<String> {
		let directory = file.directory();
		let output = if cfg!(windows) {
			Command::new("cmd")
				.arg("/C")
				.arg(target)
				.current_dir(&directory)
				.output()?
		} else {
			Command::new("sh")
				.arg("-c")
				.arg(target)
				.current_dir(&directory)
				.output()?
		};

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			let reason = if stderr.is_empty() {
				format!(
					"command exited with status {}",
					output
						.status
						.code()
						.map_or_else(|| "unknown".to_string(), |code| code.to_string())
				)
			} else {
				stderr
			};

			return Err(MdpipeError::InstructionFailed {
				instruction: self.name().to_string(),
				target: target.to_string(),
				reason,
			});
		}

		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	}
}

/// Task running instructions in markdown files.
pub struct Preprocess {
	instructions: Vec<Rc<dyn Instruction>>,
}

impl Default for Preprocess {
	fn default() -> Self {
		let mut preprocess = Self::new();
		preprocess.add_instruction(IncludeFile);
		preprocess
	}
}

impl Preprocess {
	/// A task without any instruction.
	pub fn new() -> Self {
		Self {
			instructions: Vec::new(),
		}
	}

	/// Register `instruction`, replacing any instruction with the same name.
	pub fn add_instruction(&mut self, instruction: impl Instruction + 'static) -> &mut Self {
		let name = instruction.name().to_string();

		self.instructions
			.retain(|existing| existing.name() != name);
		self.instructions.push(Rc::new(instruction));
		self
	}

	/// Enable `include:exec`.
	#[must_use]
	pub fn with_exec(mut self, allow: bool) -> Self {
		if allow {
			self.add_instruction(IncludeExec);
		} else {
			self.instructions
				.retain(|instruction| instruction.name() != IncludeExec.name());
		}

		self
	}

	pub fn has_instruction(&self, name: &str) -> bool {
		self.instruction(name).is_some()
	}

	fn instruction(&self, name: &str) -> Option<Rc<dyn Instruction>> {
		self.instructions
			.iter()
			.find(|instruction| instruction.name() == name)
			.cloned()
	}
}

impl std::fmt::Debug for Preprocess {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list()
			.entries(self.instructions.iter().map(|instruction| instruction.name()))
			.finish()
	}
}

impl Task for Preprocess {
	fn name(&self) -> &str {
		"preprocess"
	}

	fn targets(&self) -> Vec<Target> {
		vec![Target::extension("md")]
	}

	fn run(&self, resolver: &mut Resolver<'_>, file: &Rc<File>) -> MdpipeResult<bool> {
		let document = file.metadata::<Markdown>()?;
		let blocks = generated_blocks(document.editor().lines());
		let mut outputs: HashMap<String, String> = HashMap::new();
		let mut changes: Vec<Change> = Vec::new();

		for node in document.nodes_of(&[NodeType::Definition]) {
			let NodeKind::Definition {
				identifier,
				label,
				url,
				title,
			} = &node.kind
			else {
				continue;
			};
			let name = label.as_deref().unwrap_or(identifier);
			let Some(instruction) = self.instruction(name) else {
				continue;
			};
			let Some(location) = document.location(node.id) else {
				continue;
			};
			let (Some(start), Some(end)) = (location.start_line(), location.end_line()) else {
				continue;
			};

			if blocks.iter().any(|block| block.contains(&start)) {
				continue;
			}

			let parameters = parameters(instruction.name(), title.as_deref())?;
			let hash = hash(instruction.name(), url, &parameters);
			let output = if let Some(output) = outputs.get(&hash) {
				output.clone()
			} else {
				tracing::debug!(instruction = instruction.name(), target = %url, "running instruction");

				let output = instruction.process(resolver, file, url, &parameters)?;
				outputs.insert(hash.clone(), output.clone());
				output
			};

			changes.push(generated_change(
				&document,
				node,
				end,
				location.padding(),
				&blocks,
				&generated(&hash, &output),
			));
		}

		if changes.is_empty() {
			return Ok(true);
		}

		if !paths::is_inside(resolver.fs().output(), file.path()) {
			tracing::debug!(path = %file.path().display(), "outside of output, not updated");
			return Ok(true);
		}

		let content = Editor::new(&file.content()?).mutate(changes).to_string();

		resolver.write(file, content)?;

		Ok(true)
	}
}

/// Parse the JSON parameters stored in the title of an instruction.
fn parameters(instruction: &str, title: Option<&str>) -> MdpipeResult<serde_json::Value> {
	let Some(title) = title.map(str::trim).filter(|title| !title.is_empty()) else {
		return Ok(serde_json::Value::Object(serde_json::Map::new()));
	};
	let value: serde_json::Value = serde_json::from_str(title).map_err(|e| {
		MdpipeError::InstructionParameters {
			instruction: instruction.to_string(),
			reason: e.to_string(),
		}
	})?;

	if !value.is_object() {
		return Err(MdpipeError::InstructionParameters {
			instruction: instruction.to_string(),
			reason: "parameters must be a JSON object".to_string(),
		});
	}

	Ok(value)
}

/// Identifies a generated block. Object keys are sorted first, so the hash
/// does not depend on how the parameters were written.
pub fn hash(instruction: &str, target: &str, parameters: &serde_json::Value) -> String {
	let seed = format!("{instruction}\n{target}\n{}", canonical(parameters));

	format!("{:016x}", xxh3_64(seed.as_bytes()))
}

fn canonical(value: &serde_json::Value) -> serde_json::Value {
	match value {
		serde_json::Value::Object(map) => {
			let mut entries: Vec<_> = map.iter().collect();
			entries.sort_by(|a, b| a.0.cmp(b.0));

			serde_json::Value::Object(
				entries
					.into_iter()
					.map(|(key, value)| (key.clone(), canonical(value)))
					.collect(),
			)
		}
		serde_json::Value::Array(values) => {
			serde_json::Value::Array(values.iter().map(canonical).collect())
		}
		other => other.clone(),
	}
}

/// The generated block for `output`, without a trailing line break.
pub fn generated(hash: &str, output: &str) -> String {
	let output = output.trim_start_matches(['\n', '\r']).trim_end();
	let mut lines = vec![
		format!("[//]: # (start: {hash})"),
		format!("[//]: # (warning: {WARNING})"),
	];

	if output.is_empty() {
		lines.push("[//]: # (empty)".to_string());
	} else {
		lines.push(String::new());
		lines.push(output.to_string());
		lines.push(String::new());
	}

	lines.push(format!("[//]: # (end: {hash})"));
	lines.join("\n")
}

/// Line ranges of the generated blocks, including their markers.
fn generated_blocks(lines: &[String]) -> Vec<Range<usize>> {
	let mut open: Vec<(&str, usize)> = Vec::new();
	let mut blocks = Vec::new();

	for (index, line) in lines.iter().enumerate() {
		if let Some(hash) = marker(line, "start") {
			open.push((hash, index));
		} else if let Some(hash) = marker(line, "end") {
			if let Some(position) = open.iter().rposition(|(start, _)| *start == hash) {
				let (_, start) = open[position];

				open.truncate(position);
				blocks.push(start..index + 1);
			}
		}
	}

	blocks
}

fn marker<'l>(line: &'l str, kind: &str) -> Option<&'l str> {
	line.trim_start_matches(|c: char| c == '>' || c.is_whitespace())
		.trim_end()
		.strip_prefix("[//]: # (")?
		.strip_suffix(')')?
		.strip_prefix(kind)?
		.strip_prefix(": ")
}

/// Insert `block` after the last line of the instruction, replacing the block
/// which directly follows it.
fn generated_change(
	document: &Document,
	node: &NodeData,
	line: usize,
	padding: usize,
	blocks: &[Range<usize>],
	block: &str,
) -> Change {
	let lines = document.editor().lines();
	let length = lines.get(line).map_or(0, String::len);
	let mut coordinates = vec![Coordinate::new(line, length, Some(0)).with_padding(padding)];

	if let Some(existing) = blocks.iter().find(|existing| existing.start == line + 1) {
		for index in existing.clone() {
			let padding = document.lines().padding(index, node.depth);

			coordinates.push(Coordinate::new(index, padding, None).with_padding(padding));
		}
	}

	(Location::new(coordinates), Some(format!("\n{block}")))
}
