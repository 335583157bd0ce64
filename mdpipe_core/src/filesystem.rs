use std::any::Any;
use std::any::TypeId;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use super::MdpipeError;
use super::MdpipeResult;
use crate::MetadataResolver;
use crate::paths;

/// A file reachable through a [`FileSystem`].
///
/// Content is read lazily and can be replaced through [`FileSystem::write`].
/// Every change bumps the version, which invalidates derived metadata.
pub struct File {
	path: PathBuf,
	content: RefCell<Option<String>>,
	original: RefCell<Option<String>>,
	version: Cell<u64>,
	metadata: RefCell<HashMap<TypeId, (u64, Rc<dyn Any>)>>,
}

impl File {
	fn new(path: PathBuf) -> Self {
		Self {
			path,
			content: RefCell::new(None),
			original: RefCell::new(None),
			version: Cell::new(0),
			metadata: RefCell::new(HashMap::new()),
		}
	}

	/// A file which is not backed by the cache, used for the processing hooks.
	pub(crate) fn detached(path: PathBuf) -> Self {
		Self::new(path)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn name(&self) -> &str {
		self.path
			.file_name()
			.and_then(|name| name.to_str())
			.unwrap_or_default()
	}

	pub fn extension(&self) -> Option<&str> {
		self.path.extension().and_then(|extension| extension.to_str())
	}

	/// Directory containing the file.
	pub fn directory(&self) -> PathBuf {
		paths::directory(&self.path)
	}

	pub fn content(&self) -> MdpipeResult<String> {
		if let Some(content) = self.content.borrow().as_ref() {
			return Ok(content.clone());
		}

		let content = if self.path.exists() {
			std::fs::read_to_string(&self.path)?
		} else {
			String::new()
		};

		*self.original.borrow_mut() = Some(content.clone());
		*self.content.borrow_mut() = Some(content.clone());

		Ok(content)
	}

	/// Incremented every time the content changes.
	pub fn version(&self) -> u64 {
		self.version.get()
	}

	/// Whether the content differs from what is stored on disk.
	pub fn is_modified(&self) -> bool {
		match (&*self.content.borrow(), &*self.original.borrow()) {
			(Some(content), Some(original)) => content != original,
			_ => false,
		}
	}

	/// Derived data computed by `M`, cached until the content changes.
	pub fn metadata<M: MetadataResolver>(&self) -> MdpipeResult<Rc<M::Value>> {
		let key = TypeId::of::<M>();
		let version = self.version();
		let cached = self
			.metadata
			.borrow()
			.get(&key)
			.filter(|(computed, _)| *computed == version)
			.map(|(_, value)| Rc::clone(value));

		if let Some(value) = cached.and_then(|value| value.downcast::<M::Value>().ok()) {
			return Ok(value);
		}

		let value = Rc::new(M::resolve(self)?);
		let erased: Rc<dyn Any> = value.clone();

		self.metadata.borrow_mut().insert(key, (version, erased));

		Ok(value)
	}

	fn set_content(&self, content: String) -> MdpipeResult<bool> {
		if self.content()? == content {
			return Ok(false);
		}

		*self.content.borrow_mut() = Some(content);
		self.version.set(self.version.get() + 1);
		self.metadata.borrow_mut().clear();

		Ok(true)
	}

	fn original(&self) -> String {
		self.original.borrow().clone().unwrap_or_default()
	}

	fn mark_saved(&self) {
		*self.original.borrow_mut() = self.content.borrow().clone();
	}
}

impl fmt::Debug for File {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("File")
			.field("path", &self.path)
			.field("version", &self.version.get())
			.finish_non_exhaustive()
	}
}

impl PartialEq for File {
	fn eq(&self, other: &Self) -> bool {
		self.path == other.path
	}
}

impl Eq for File {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
	path: PathBuf,
}

impl Directory {
	pub fn path(&self) -> &Path {
		&self.path
	}
}

/// A cached file system entry.
#[derive(Debug, Clone)]
pub enum Entry {
	File(Rc<File>),
	Directory(Rc<Directory>),
}

impl Entry {
	pub fn path(&self) -> &Path {
		match self {
			Self::File(file) => file.path(),
			Self::Directory(directory) => directory.path(),
		}
	}

	pub fn as_file(&self) -> Option<&Rc<File>> {
		match self {
			Self::File(file) => Some(file),
			Self::Directory(_) => None,
		}
	}
}

/// Which entries of a directory tree to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
	/// Globs matched against the entry name or its path relative to the listed
	/// directory. Empty means everything.
	pub include: Vec<String>,
	/// Gitignore-style patterns relative to the listed directory.
	pub exclude: Vec<String>,
	/// Maximum depth below the listed directory, `Some(0)` lists only direct
	/// children.
	pub depth: Option<usize>,
}

impl Filter {
	pub fn include(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			include: patterns.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_depth(mut self, depth: Option<usize>) -> Self {
		self.depth = depth;
		self
	}

	#[must_use]
	pub fn with_exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.exclude.extend(patterns.into_iter().map(Into::into));
		self
	}
}

/// A file written during processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
	pub path: PathBuf,
	pub original: String,
	pub content: String,
}

/// Entry cache and write gate for one processing run.
///
/// Every path maps to a single [`File`] or [`Directory`] instance. Writes are
/// buffered in transactions and only files inside the output directory can
/// be written.
pub struct FileSystem {
	input: PathBuf,
	output: PathBuf,
	dry_run: bool,
	gitignore: bool,
	entries: RefCell<HashMap<PathBuf, Entry>>,
	transactions: RefCell<Vec<Vec<(Rc<File>, String)>>>,
	changes: RefCell<Vec<FileChange>>,
}

impl FileSystem {
	/// `input` must exist. `output` defaults to `input`; relative paths are
	/// resolved against `input`.
	pub fn new(input: impl AsRef<Path>, output: Option<&Path>) -> MdpipeResult<Self> {
		let input = input.as_ref().canonicalize()?;
		let output = match output {
			Some(output) => {
				let output = paths::resolve(&input, output);
				output.canonicalize().unwrap_or(output)
			}
			None => input.clone(),
		};

		Ok(Self {
			input,
			output,
			dry_run: false,
			gitignore: true,
			entries: RefCell::new(HashMap::new()),
			transactions: RefCell::new(Vec::new()),
			changes: RefCell::new(Vec::new()),
		})
	}

	/// Record changes without writing them to disk.
	#[must_use]
	pub fn with_dry_run(mut self, dry_run: bool) -> Self {
		self.dry_run = dry_run;
		self
	}

	/// Whether `.gitignore` rules of the input directory are respected when
	/// listing directories.
	#[must_use]
	pub fn with_gitignore(mut self, gitignore: bool) -> Self {
		self.gitignore = gitignore;
		self
	}

	pub fn input(&self) -> &Path {
		&self.input
	}

	pub fn output(&self) -> &Path {
		&self.output
	}

	pub fn is_dry_run(&self) -> bool {
		self.dry_run
	}

	/// Resolve `path` against the input directory.
	pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
		paths::resolve(&self.input, path)
	}

	/// The file at `path`, or `None` when it does not exist.
	pub fn file(&self, path: impl AsRef<Path>) -> Option<Rc<File>> {
		let path = self.resolve(path);

		if let Some(entry) = self.entries.borrow().get(&path) {
			return entry.as_file().cloned();
		}

		if !path.is_file() {
			return None;
		}

		let file = Rc::new(File::new(path.clone()));
		self.entries
			.borrow_mut()
			.insert(path, Entry::File(Rc::clone(&file)));

		Some(file)
	}

	/// The directory at `path`, or `None` when it does not exist.
	pub fn directory(&self, path: impl AsRef<Path>) -> Option<Rc<Directory>> {
		let path = self.resolve(path);

		if let Some(entry) = self.entries.borrow().get(&path) {
			return match entry {
				Entry::Directory(directory) => Some(Rc::clone(directory)),
				Entry::File(_) => None,
			};
		}

		if !path.is_dir() {
			return None;
		}

		let directory = Rc::new(Directory { path: path.clone() });
		self.entries
			.borrow_mut()
			.insert(path, Entry::Directory(Rc::clone(&directory)));

		Some(directory)
	}

	/// Files below `directory` matching `filter`, sorted by path.
	pub fn files(&self, directory: &Directory, filter: &Filter) -> MdpipeResult<Vec<Rc<File>>> {
		let paths = self.walk(directory.path(), filter, false)?;

		Ok(paths.into_iter().filter_map(|path| self.file(path)).collect())
	}

	/// Directories below `directory` matching `filter`, sorted by path.
	pub fn directories(
		&self,
		directory: &Directory,
		filter: &Filter,
	) -> MdpipeResult<Vec<Rc<Directory>>> {
		let paths = self.walk(directory.path(), filter, true)?;

		Ok(paths
			.into_iter()
			.filter_map(|path| self.directory(path))
			.collect())
	}

	/// Path for display: relative to the input directory when inside it.
	pub fn pathname(&self, path: impl AsRef<Path>) -> String {
		let path = path.as_ref();

		match path.strip_prefix(&self.input) {
			Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
			Ok(relative) => paths::to_slash(relative),
			Err(_) => paths::to_slash(path),
		}
	}

	/// Replace the content of `file`.
	///
	/// Inside a transaction the write is buffered until the transaction is
	/// committed, otherwise it is saved immediately.
	pub fn write(&self, file: &Rc<File>, content: impl Into<String>) -> MdpipeResult<()> {
		if !paths::is_inside(&self.output, file.path()) {
			return Err(MdpipeError::WriteOutsideOutput {
				file: file.path().to_path_buf(),
				output: self.output.clone(),
			});
		}

		let previous = file.content()?;

		{
			let mut transactions = self.transactions.borrow_mut();

			if let Some(frame) = transactions.last_mut() {
				if !frame.iter().any(|(existing, _)| Rc::ptr_eq(existing, file)) {
					frame.push((Rc::clone(file), previous));
				}

				file.set_content(content.into())?;
				return Ok(());
			}
		}

		file.set_content(content.into())?;
		self.save(file)
	}

	/// Create `path` inside the output directory with `content`.
	pub fn create(&self, path: impl AsRef<Path>, content: impl Into<String>) -> MdpipeResult<Rc<File>> {
		let path = self.resolve(path);
		let file = self.file(&path).unwrap_or_else(|| {
			let file = Rc::new(File::new(path.clone()));
			self.entries
				.borrow_mut()
				.insert(path, Entry::File(Rc::clone(&file)));
			file
		});

		self.write(&file, content)?;

		Ok(file)
	}

	pub fn begin(&self) {
		self.transactions.borrow_mut().push(Vec::new());
	}

	/// Save every file written since the matching [`FileSystem::begin`].
	pub fn commit(&self) -> MdpipeResult<()> {
		let frame = self.transactions.borrow_mut().pop().unwrap_or_default();

		for (file, _) in &frame {
			self.save(file)?;
		}

		Ok(())
	}

	/// Restore every file written since the matching [`FileSystem::begin`].
	pub fn rollback(&self) -> MdpipeResult<()> {
		let frame = self.transactions.borrow_mut().pop().unwrap_or_default();

		for (file, previous) in frame.into_iter().rev() {
			file.set_content(previous)?;
		}

		Ok(())
	}

	/// Files saved so far (or that would have been saved in dry-run mode).
	pub fn changes(&self) -> Vec<FileChange> {
		self.changes.borrow().clone()
	}

	fn save(&self, file: &Rc<File>) -> MdpipeResult<()> {
		if !file.is_modified() {
			return Ok(());
		}

		let content = file.content()?;

		if !self.dry_run {
			if let Some(parent) = file.path().parent() {
				std::fs::create_dir_all(parent)?;
			}

			std::fs::write(file.path(), &content)?;
		}

		tracing::debug!(path = %self.pathname(file.path()), dry_run = self.dry_run, "saved file");

		let mut changes = self.changes.borrow_mut();
		let original = match changes.iter().position(|change| change.path == file.path()) {
			Some(index) => changes.remove(index).original,
			None => file.original(),
		};

		changes.push(FileChange {
			path: file.path().to_path_buf(),
			original,
			content,
		});
		file.mark_saved();

		Ok(())
	}

	fn walk(&self, root: &Path, filter: &Filter, directories: bool) -> MdpipeResult<Vec<PathBuf>> {
		let include = build_glob_set(&filter.include)?;
		let exclude = build_exclude_matcher(root, &filter.exclude)?;
		let gitignore = if self.gitignore && paths::is_inside(&self.input, root) {
			build_gitignore(&self.input)
		} else {
			Gitignore::empty()
		};
		let walker = Walker {
			root,
			filter,
			include: &include,
			exclude: &exclude,
			gitignore: &gitignore,
			directories,
		};
		let mut found = Vec::new();
		let mut visited = HashSet::new();

		walker.walk_dir(root, 0, &mut visited, &mut found)?;
		found.sort();

		Ok(found)
	}
}

impl fmt::Debug for FileSystem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FileSystem")
			.field("input", &self.input)
			.field("output", &self.output)
			.field("dry_run", &self.dry_run)
			.finish_non_exhaustive()
	}
}

struct Walker<'a> {
	root: &'a Path,
	filter: &'a Filter,
	include: &'a GlobSet,
	exclude: &'a Gitignore,
	gitignore: &'a Gitignore,
	directories: bool,
}

impl Walker<'_> {
	fn walk_dir(
		&self,
		dir: &Path,
		depth: usize,
		visited: &mut HashSet<PathBuf>,
		found: &mut Vec<PathBuf>,
	) -> MdpipeResult<()> {
		if !dir.is_dir() {
			return Ok(());
		}

		// A directory reached twice through symlinks would list its files
		// under several aliased paths.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !visited.insert(canonical) {
			return Err(MdpipeError::SymlinkCycle {
				path: dir.to_path_buf(),
			});
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();
			let is_dir = path.is_dir();

			if is_dir
				&& path
					.file_name()
					.and_then(|name| name.to_str())
					.is_some_and(is_ignored_directory_name)
			{
				continue;
			}

			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir == self.directories && self.is_included(&path) {
				found.push(path.clone());
			}

			if is_dir && self.filter.depth.is_none_or(|max| depth < max) {
				self.walk_dir(&path, depth + 1, visited, found)?;
			}
		}

		Ok(())
	}

	fn is_included(&self, path: &Path) -> bool {
		if self.filter.include.is_empty() {
			return true;
		}

		let relative = path.strip_prefix(self.root).unwrap_or(path);

		self.include.is_match(relative)
			|| path
				.file_name()
				.is_some_and(|name| self.include.is_match(Path::new(name)))
	}
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "vendor"
}

/// Build a `GlobSet` from a list of glob pattern strings.
pub(crate) fn build_glob_set(patterns: &[String]) -> MdpipeResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();

	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			MdpipeError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| {
		MdpipeError::InvalidPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// Build a `Gitignore` matcher from exclude patterns. Patterns follow
/// `.gitignore` syntax relative to `root`.
pub(crate) fn build_exclude_matcher(root: &Path, patterns: &[String]) -> MdpipeResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);

	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			MdpipeError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
	}

	builder.build().map_err(|e| {
		MdpipeError::InvalidPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// Build a `Gitignore` matcher from the `.gitignore` of `root` (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");

	if gitignore_path.exists() {
		if let Some(error) = builder.add(&gitignore_path) {
			tracing::warn!(path = %gitignore_path.display(), error = %error, "invalid .gitignore entry");
		}
	}

	builder.build().unwrap_or_else(|error| {
		tracing::warn!(path = %gitignore_path.display(), error = %error, "ignoring .gitignore");
		Gitignore::empty()
	})
}
