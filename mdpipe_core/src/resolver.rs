use std::path::PathBuf;
use std::rc::Rc;

use super::MdpipeError;
use super::MdpipeResult;
use crate::Dependency;
use crate::DependencyResolvedResult;
use crate::Entries;
use crate::Entry;
use crate::Event;
use crate::Executor;
use crate::File;
use crate::FileSystem;
use crate::Iterable;
use crate::Queueable;
use crate::Resolvable;

/// Where the task asking for dependencies runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
	File,
	Before,
	After,
}

/// Resolves dependencies for one task invocation.
///
/// Resolving a file processes it first, so the task always sees the final
/// content. When processing a dependency fails, the task receives
/// [`MdpipeError::DependencyFailed`] and the original error is raised by the
/// executor once the task returns, even when the task ignored it.
pub struct Resolver<'a> {
	executor: &'a mut Executor,
	file: Rc<File>,
	mode: ResolverMode,
	failure: Option<MdpipeError>,
}

impl<'a> Resolver<'a> {
	pub(crate) fn new(executor: &'a mut Executor, file: Rc<File>, mode: ResolverMode) -> Self {
		Self {
			executor,
			file,
			mode,
			failure: None,
		}
	}

	pub fn fs(&self) -> &FileSystem {
		self.executor.fs()
	}

	/// The file the task runs on.
	pub fn file(&self) -> &Rc<File> {
		&self.file
	}

	pub fn mode(&self) -> ResolverMode {
		self.mode
	}

	/// Resolve `dependency`, processing the resolved file first.
	pub fn resolve<D>(&mut self, dependency: &D) -> MdpipeResult<D::Value>
	where
		D: Dependency,
		D::Value: Resolvable,
	{
		let value = self.lookup(dependency)?;
		let path = value
			.entry_path()
			.map_or_else(|| self.dependency_path(dependency), |path| path.to_path_buf());
		let result = if value.entry_path().is_some() {
			DependencyResolvedResult::Success
		} else {
			DependencyResolvedResult::Null
		};

		self.notify(&path, result);

		if let Some(file) = value.file() {
			self.process(file)?;
		}

		Ok(value)
	}

	/// Resolve an iterator dependency. Files are processed one by one as the
	/// returned iterator is consumed.
	pub fn iterate<D>(&mut self, dependency: &D) -> MdpipeResult<ResolvedEntries<'_, 'a>>
	where
		D: Dependency,
		D::Value: Iterable,
	{
		let entries = self.lookup(dependency)?.into_entries();

		if entries.is_none() {
			let path = self.dependency_path(dependency);
			self.notify(&path, DependencyResolvedResult::Null);
		}

		Ok(ResolvedEntries {
			resolver: self,
			entries,
		})
	}

	/// Schedule the files of `dependency` for processing after the files that
	/// are already known, without waiting for them.
	pub fn queue<D>(&mut self, dependency: &D) -> MdpipeResult<()>
	where
		D: Dependency,
		D::Value: Queueable,
	{
		let files = self.lookup(dependency)?.into_files();

		for file in files {
			self.notify(file.path(), DependencyResolvedResult::Queued);
			self.executor.enqueue(file);
		}

		Ok(())
	}

	/// Replace the content of `file`, buffered until the current file is
	/// committed.
	pub fn write(&self, file: &Rc<File>, content: impl Into<String>) -> MdpipeResult<()> {
		self.fs().write(file, content)
	}

	pub(crate) fn take_failure(&mut self) -> Option<MdpipeError> {
		self.failure.take()
	}

	fn lookup<D: Dependency>(&self, dependency: &D) -> MdpipeResult<D::Value> {
		let base = self.file.directory();

		dependency
			.resolve(self.executor.fs(), &base)
			.inspect_err(|error| {
				let result = if error.is_unresolvable() {
					DependencyResolvedResult::Missed
				} else {
					DependencyResolvedResult::Failed
				};
				let path = dependency.path(self.executor.fs(), &base);

				self.notify(&path, result);
			})
	}

	fn process(&mut self, file: &Rc<File>) -> MdpipeResult<()> {
		if self.mode == ResolverMode::Before && !self.executor.is_processed(file) {
			return Err(MdpipeError::DependencyUnavailable {
				file: file.path().to_path_buf(),
			});
		}

		match self.executor.file(file) {
			Ok(()) => Ok(()),
			Err(error) => {
				tracing::debug!(path = %file.path().display(), "dependency processing failed");

				if self.failure.is_none() {
					self.failure = Some(error);
				}

				Err(MdpipeError::DependencyFailed {
					file: file.path().to_path_buf(),
				})
			}
		}
	}

	fn dependency_path<D: Dependency>(&self, dependency: &D) -> PathBuf {
		dependency.path(self.executor.fs(), &self.file.directory())
	}

	fn notify(&self, path: &std::path::Path, result: DependencyResolvedResult) {
		self.executor.notify(Event::DependencyResolved {
			path: self.executor.fs().pathname(path),
			result,
		});
	}
}

/// Streaming result of [`Resolver::iterate`].
pub struct ResolvedEntries<'r, 'a> {
	resolver: &'r mut Resolver<'a>,
	entries: Option<Entries>,
}

impl Iterator for ResolvedEntries<'_, '_> {
	type Item = MdpipeResult<Entry>;

	fn next(&mut self) -> Option<Self::Item> {
		let entry = self.entries.as_mut()?.next()?;

		self.resolver
			.notify(entry.path(), DependencyResolvedResult::Success);

		if let Entry::File(file) = &entry {
			if let Err(error) = self.resolver.process(file) {
				return Some(Err(error));
			}
		}

		Some(Ok(entry))
	}
}
