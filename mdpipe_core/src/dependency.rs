use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use super::MdpipeError;
use super::MdpipeResult;
use crate::Directory;
use crate::Entry;
use crate::File;
use crate::FileSystem;
use crate::Filter;
use crate::paths;

/// Another file or directory a task needs.
///
/// Relative paths are resolved against `base`, the directory of the file the
/// task runs on.
pub trait Dependency {
	type Value;

	/// Look the dependency up. Missing targets fail with
	/// [`MdpipeError::DependencyUnresolvable`].
	fn resolve(&self, fs: &FileSystem, base: &Path) -> MdpipeResult<Self::Value>;

	/// The path this dependency refers to, used for reporting.
	fn path(&self, fs: &FileSystem, base: &Path) -> PathBuf;
}

fn unresolvable(fs: &FileSystem, path: &Path) -> MdpipeError {
	MdpipeError::DependencyUnresolvable {
		dependency: fs.pathname(path),
	}
}

/// A single file, by path or by an already known [`File`].
#[derive(Debug, Clone)]
pub enum FileReference {
	Path(PathBuf),
	File(Rc<File>),
}

impl FileReference {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self::Path(path.into())
	}
}

impl From<Rc<File>> for FileReference {
	fn from(file: Rc<File>) -> Self {
		Self::File(file)
	}
}

impl Dependency for FileReference {
	type Value = Rc<File>;

	fn resolve(&self, fs: &FileSystem, base: &Path) -> MdpipeResult<Self::Value> {
		match self {
			Self::File(file) => Ok(Rc::clone(file)),
			Self::Path(_) => {
				let path = self.path(fs, base);
				fs.file(&path).ok_or_else(|| unresolvable(fs, &path))
			}
		}
	}

	fn path(&self, _fs: &FileSystem, base: &Path) -> PathBuf {
		match self {
			Self::File(file) => file.path().to_path_buf(),
			Self::Path(path) => paths::resolve(base, path),
		}
	}
}

/// A single directory.
#[derive(Debug, Clone)]
pub enum DirectoryReference {
	Path(PathBuf),
	Directory(Rc<Directory>),
}

impl DirectoryReference {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self::Path(path.into())
	}
}

impl Dependency for DirectoryReference {
	type Value = Rc<Directory>;

	fn resolve(&self, fs: &FileSystem, base: &Path) -> MdpipeResult<Self::Value> {
		match self {
			Self::Directory(directory) => Ok(Rc::clone(directory)),
			Self::Path(_) => {
				let path = self.path(fs, base);
				fs.directory(&path).ok_or_else(|| unresolvable(fs, &path))
			}
		}
	}

	fn path(&self, _fs: &FileSystem, base: &Path) -> PathBuf {
		match self {
			Self::Directory(directory) => directory.path().to_path_buf(),
			Self::Path(path) => paths::resolve(base, path),
		}
	}
}

/// Files below a directory.
#[derive(Debug, Clone)]
pub struct FileIterator {
	pub directory: DirectoryReference,
	pub filter: Filter,
}

impl FileIterator {
	pub fn new(directory: impl Into<PathBuf>, filter: Filter) -> Self {
		Self {
			directory: DirectoryReference::new(directory),
			filter,
		}
	}
}

impl Dependency for FileIterator {
	type Value = Entries;

	fn resolve(&self, fs: &FileSystem, base: &Path) -> MdpipeResult<Self::Value> {
		let directory = self.directory.resolve(fs, base)?;
		let files = fs.files(&directory, &self.filter)?;

		Ok(Entries::new(files.into_iter().map(Entry::File)))
	}

	fn path(&self, fs: &FileSystem, base: &Path) -> PathBuf {
		self.directory.path(fs, base)
	}
}

/// Directories below a directory.
#[derive(Debug, Clone)]
pub struct DirectoryIterator {
	pub directory: DirectoryReference,
	pub filter: Filter,
}

impl DirectoryIterator {
	pub fn new(directory: impl Into<PathBuf>, filter: Filter) -> Self {
		Self {
			directory: DirectoryReference::new(directory),
			filter,
		}
	}
}

impl Dependency for DirectoryIterator {
	type Value = Entries;

	fn resolve(&self, fs: &FileSystem, base: &Path) -> MdpipeResult<Self::Value> {
		let directory = self.directory.resolve(fs, base)?;
		let directories = fs.directories(&directory, &self.filter)?;

		Ok(Entries::new(directories.into_iter().map(Entry::Directory)))
	}

	fn path(&self, fs: &FileSystem, base: &Path) -> PathBuf {
		self.directory.path(fs, base)
	}
}

/// Turns a missing dependency into `None`.
#[derive(Debug, Clone)]
pub struct Optional<D>(pub D);

impl<D: Dependency> Dependency for Optional<D> {
	type Value = Option<D::Value>;

	fn resolve(&self, fs: &FileSystem, base: &Path) -> MdpipeResult<Self::Value> {
		match self.0.resolve(fs, base) {
			Ok(value) => Ok(Some(value)),
			Err(error) if error.is_unresolvable() => Ok(None),
			Err(error) => Err(error),
		}
	}

	fn path(&self, fs: &FileSystem, base: &Path) -> PathBuf {
		self.0.path(fs, base)
	}
}

/// Entries produced by the iterator dependencies.
#[derive(Debug)]
pub struct Entries {
	inner: std::vec::IntoIter<Entry>,
}

impl Entries {
	pub fn new(entries: impl IntoIterator<Item = Entry>) -> Self {
		Self {
			inner: entries.into_iter().collect::<Vec<_>>().into_iter(),
		}
	}
}

impl Iterator for Entries {
	type Item = Entry;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next()
	}
}

/// Values [`crate::Resolver::resolve`] can return.
pub trait Resolvable {
	/// The file which has to be processed before the value is handed out.
	fn file(&self) -> Option<&Rc<File>>;

	/// Path of the resolved entry, `None` for a missing optional value.
	fn entry_path(&self) -> Option<&Path>;
}

impl Resolvable for Rc<File> {
	fn file(&self) -> Option<&Rc<File>> {
		Some(self)
	}

	fn entry_path(&self) -> Option<&Path> {
		Some(self.path())
	}
}

impl Resolvable for Rc<Directory> {
	fn file(&self) -> Option<&Rc<File>> {
		None
	}

	fn entry_path(&self) -> Option<&Path> {
		Some(self.path())
	}
}

impl<T: Resolvable> Resolvable for Option<T> {
	fn file(&self) -> Option<&Rc<File>> {
		self.as_ref().and_then(Resolvable::file)
	}

	fn entry_path(&self) -> Option<&Path> {
		self.as_ref().and_then(Resolvable::entry_path)
	}
}

/// Values [`crate::Resolver::iterate`] can stream.
pub trait Iterable {
	fn into_entries(self) -> Option<Entries>;
}

impl Iterable for Entries {
	fn into_entries(self) -> Option<Entries> {
		Some(self)
	}
}

impl Iterable for Option<Entries> {
	fn into_entries(self) -> Option<Entries> {
		self
	}
}

/// Values [`crate::Resolver::queue`] can schedule.
pub trait Queueable {
	fn into_files(self) -> Vec<Rc<File>>;
}

impl Queueable for Rc<File> {
	fn into_files(self) -> Vec<Rc<File>> {
		vec![self]
	}
}

impl Queueable for Entries {
	fn into_files(self) -> Vec<Rc<File>> {
		self.filter_map(|entry| entry.as_file().cloned()).collect()
	}
}

impl<T: Queueable> Queueable for Option<T> {
	fn into_files(self) -> Vec<Rc<File>> {
		self.map(Queueable::into_files).unwrap_or_default()
	}
}
