use std::collections::HashSet;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use ignore::gitignore::Gitignore;

use super::MdpipeError;
use super::MdpipeResult;
use crate::Dispatcher;
use crate::Event;
use crate::File;
use crate::FileFinishedResult;
use crate::FileSystem;
use crate::Resolver;
use crate::ResolverMode;
use crate::Target;
use crate::Task;
use crate::TaskFinishedResult;
use crate::Tasks;
use crate::paths;

/// Drives processing of the file graph.
///
/// Files come from the initial list and from the queue filled by
/// [`Resolver::queue`]. Each file is processed at most once; files requested
/// as dependencies are processed depth first while the requesting file waits
/// on the stack.
pub struct Executor {
	fs: Rc<FileSystem>,
	tasks: Rc<Tasks>,
	dispatcher: Rc<Dispatcher>,
	exclude: Gitignore,
	files: VecDeque<Rc<File>>,
	queue: VecDeque<Rc<File>>,
	processed: HashSet<PathBuf>,
	stack: Vec<Rc<File>>,
}

impl Executor {
	pub fn new(
		fs: Rc<FileSystem>,
		tasks: Rc<Tasks>,
		dispatcher: Rc<Dispatcher>,
		exclude: Gitignore,
		files: impl IntoIterator<Item = Rc<File>>,
	) -> Self {
		Self {
			fs,
			tasks,
			dispatcher,
			exclude,
			files: files.into_iter().collect(),
			queue: VecDeque::new(),
			processed: HashSet::new(),
			stack: Vec::new(),
		}
	}

	pub fn fs(&self) -> &FileSystem {
		&self.fs
	}

	/// Run the `Before` hooks, every file, then the `After` hooks.
	pub fn run(&mut self) -> MdpipeResult<()> {
		self.hook(&Target::Before, ResolverMode::Before, "@before")?;

		while let Some(file) = self.files.pop_front().or_else(|| self.queue.pop_front()) {
			self.file(&file)?;
		}

		self.hook(&Target::After, ResolverMode::After, "@after")
	}

	pub fn is_processed(&self, file: &File) -> bool {
		self.processed.contains(file.path())
	}

	pub(crate) fn enqueue(&mut self, file: Rc<File>) {
		self.queue.push_back(file);
	}

	pub(crate) fn notify(&self, event: Event) {
		self.dispatcher.notify(event);
	}

	/// Process `file` unless it was processed already.
	pub(crate) fn file(&mut self, file: &Rc<File>) -> MdpipeResult<()> {
		let path = file.path().to_path_buf();

		if self.processed.contains(&path) {
			return Ok(());
		}

		if self.stack.iter().any(|active| active.path() == path) {
			// Files outside the output directory cannot change, so the
			// unfinished file is as good as the finished one.
			if !paths::is_inside(self.fs.output(), &path) {
				return Ok(());
			}

			self.notify(Event::FileStarted {
				path: self.fs.pathname(&path),
			});
			self.notify(Event::FileFinished {
				result: FileFinishedResult::Failed,
			});

			return Err(MdpipeError::DependencyCircularDependency {
				file: path,
				stack: self
					.stack
					.iter()
					.map(|active| active.path().to_path_buf())
					.collect(),
			});
		}

		self.notify(Event::FileStarted {
			path: self.fs.pathname(&path),
		});

		if self.is_skipped(file) {
			tracing::trace!(path = %path.display(), "skipped");
			self.processed.insert(path);
			self.notify(Event::FileFinished {
				result: FileFinishedResult::Skipped,
			});

			return Ok(());
		}

		let tasks = self.tasks.get(file.extension());

		self.stack.push(Rc::clone(file));
		self.fs.begin();

		let result = self.tasks(file, &tasks, ResolverMode::File);
		let result = self.finish(result);

		self.processed.insert(path);
		self.stack.pop();
		self.notify(Event::FileFinished {
			result: if result.is_ok() {
				FileFinishedResult::Success
			} else {
				FileFinishedResult::Failed
			},
		});

		result
	}

	fn hook(&mut self, hook: &Target, mode: ResolverMode, name: &str) -> MdpipeResult<()> {
		let tasks = self.tasks.hooks(hook);

		if tasks.is_empty() {
			return Ok(());
		}

		let file = Rc::new(File::detached(self.fs.input().join(name)));

		self.notify(Event::FileStarted {
			path: name.to_string(),
		});
		self.fs.begin();

		let result = self.tasks(&file, &tasks, mode);
		let result = self.finish(result);

		self.notify(Event::FileFinished {
			result: if result.is_ok() {
				FileFinishedResult::Success
			} else {
				FileFinishedResult::Failed
			},
		});

		result
	}

	fn tasks(&mut self, file: &Rc<File>, tasks: &[Rc<dyn Task>], mode: ResolverMode) -> MdpipeResult<()> {
		for task in tasks {
			self.task(file, task.as_ref(), mode)?;
		}

		Ok(())
	}

	/// Commit the transaction of the current file, or roll it back when
	/// processing failed.
	fn finish(&self, result: MdpipeResult<()>) -> MdpipeResult<()> {
		match result {
			Ok(()) => self.fs.commit(),
			Err(error) => {
				if let Err(rollback) = self.fs.rollback() {
					tracing::warn!(error = %rollback, "rollback failed");
				}

				Err(error)
			}
		}
	}

	fn task(&mut self, file: &Rc<File>, task: &dyn Task, mode: ResolverMode) -> MdpipeResult<()> {
		let name = task.name().to_string();

		self.notify(Event::TaskStarted { task: name.clone() });

		let mut resolver = Resolver::new(self, Rc::clone(file), mode);
		let result = task.run(&mut resolver, file);
		let failure = resolver.take_failure();
		let result = match (failure, result) {
			(Some(failure), _) => Err(failure),
			(None, Ok(true)) => Ok(()),
			(None, Ok(false)) => {
				Err(MdpipeError::TaskFailed {
					file: file.path().to_path_buf(),
					task: name,
					source: None,
				})
			}
			(None, Err(error)) if error.is_processor_error() => Err(error),
			(None, Err(error)) => {
				Err(MdpipeError::TaskFailed {
					file: file.path().to_path_buf(),
					task: name,
					source: Some(Box::new(error)),
				})
			}
		};

		self.notify(Event::TaskFinished {
			result: if result.is_ok() {
				TaskFinishedResult::Success
			} else {
				TaskFinishedResult::Failed
			},
		});

		result
	}

	fn is_skipped(&self, file: &File) -> bool {
		if !self.tasks.has(file.extension()) {
			return true;
		}

		let Ok(relative) = file.path().strip_prefix(self.fs.input()) else {
			return true;
		};

		self.exclude
			.matched_path_or_any_parents(relative, false)
			.is_ignore()
	}
}

impl std::fmt::Debug for Executor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Executor")
			.field("fs", &self.fs)
			.field("tasks", &self.tasks)
			.field("processed", &self.processed.len())
			.field("stack", &self.stack.len())
			.finish_non_exhaustive()
	}
}
