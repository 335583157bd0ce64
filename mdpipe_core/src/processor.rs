use std::path::Path;
use std::rc::Rc;

use super::MdpipeError;
use super::MdpipeResult;
use crate::Dispatcher;
use crate::Event;
use crate::Executor;
use crate::FileChange;
use crate::FileSystem;
use crate::Filter;
use crate::Listener;
use crate::ProcessingFinishedResult;
use crate::Task;
use crate::Tasks;
use crate::filesystem::build_exclude_matcher;
use crate::paths;

/// Runs tasks over a directory tree (or a single file).
///
/// ```rust,no_run
/// use std::path::Path;
///
/// use mdpipe_core::Processor;
/// use mdpipe_core::preprocess::Preprocess;
///
/// let mut processor = Processor::new();
/// processor.add_task(Preprocess::default(), None);
/// let changes = processor.run(Path::new("docs"), None).unwrap();
/// println!("{} file(s) changed", changes.len());
/// ```
#[derive(Debug, Default)]
pub struct Processor {
	tasks: Tasks,
	exclude: Vec<String>,
	dispatcher: Rc<Dispatcher>,
	dry_run: bool,
	disable_gitignore: bool,
	max_depth: Option<usize>,
}

impl Processor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a task. Higher priorities run first; tasks with the same
	/// priority run in the order they were added.
	pub fn add_task(&mut self, task: impl Task + 'static, priority: Option<i32>) -> &mut Self {
		self.tasks.add(task, priority);
		self
	}

	pub fn remove_task(&mut self, name: &str) -> &mut Self {
		self.tasks.remove(name);
		self
	}

	/// Gitignore-style patterns, relative to the input directory, of files
	/// which should not be processed.
	pub fn exclude(&mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
		self.exclude.extend(patterns.into_iter().map(Into::into));
		self
	}

	pub fn add_listener(&mut self, listener: impl Listener + 'static) -> &mut Self {
		self.dispatcher.attach(listener);
		self
	}

	/// Compute all changes without writing them.
	pub fn dry_run(&mut self, dry_run: bool) -> &mut Self {
		self.dry_run = dry_run;
		self
	}

	pub fn disable_gitignore(&mut self, disable: bool) -> &mut Self {
		self.disable_gitignore = disable;
		self
	}

	pub fn max_depth(&mut self, depth: Option<usize>) -> &mut Self {
		self.max_depth = depth;
		self
	}

	/// Process `input` and return the files which were (or, in dry-run mode,
	/// would be) written.
	///
	/// Only files inside `output` (which defaults to the input directory) can
	/// be written. An output directory nested in the input is not processed.
	pub fn run(&self, input: &Path, output: Option<&Path>) -> MdpipeResult<Vec<FileChange>> {
		self.dispatcher.notify(Event::ProcessingStarted);

		let result = self.execute(input, output).map_err(|error| {
			if error.is_processor_error() {
				error
			} else {
				MdpipeError::ProcessingFailed(Box::new(error))
			}
		});

		self.dispatcher.notify(Event::ProcessingFinished {
			result: if result.is_ok() {
				ProcessingFinishedResult::Success
			} else {
				ProcessingFinishedResult::Failed
			},
		});

		result
	}

	fn execute(&self, input: &Path, output: Option<&Path>) -> MdpipeResult<Vec<FileChange>> {
		let input = input.canonicalize()?;
		let (directory, filter) = if input.is_file() {
			let name = input
				.file_name()
				.map(|name| name.to_string_lossy().into_owned())
				.unwrap_or_default();

			(
				paths::directory(&input),
				Filter::include([name]).with_depth(Some(0)),
			)
		} else {
			let include = if self.tasks.has_wildcard() {
				Vec::new()
			} else {
				self.tasks
					.extensions()
					.into_iter()
					.map(|extension| format!("*.{extension}"))
					.collect()
			};

			(input, Filter::include(include).with_depth(self.max_depth))
		};
		let fs = FileSystem::new(&directory, output)?
			.with_dry_run(self.dry_run)
			.with_gitignore(!self.disable_gitignore);
		let mut exclude = self.exclude.clone();

		if fs.output() != fs.input() && paths::is_inside(fs.input(), fs.output()) {
			let relative = paths::relative(fs.input(), fs.output());
			exclude.push(format!("/{}/", paths::to_slash(relative)));
		}

		let filter = filter.with_exclude(exclude.iter().cloned());
		let root = fs
			.directory(fs.input())
			.ok_or_else(|| MdpipeError::DependencyUnresolvable {
				dependency: directory.display().to_string(),
			})?;
		let files = fs.files(&root, &filter)?;
		let exclude = build_exclude_matcher(fs.input(), &exclude)?;
		let fs = Rc::new(fs);
		let tasks = Rc::new(self.tasks.clone());

		tracing::debug!(
			input = %fs.input().display(),
			output = %fs.output().display(),
			files = files.len(),
			"processing"
		);

		let mut executor = Executor::new(
			Rc::clone(&fs),
			tasks,
			Rc::clone(&self.dispatcher),
			exclude,
			files,
		);

		executor.run()?;

		Ok(fs.changes())
	}
}
