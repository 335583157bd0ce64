//! Lexical path helpers. Nothing here touches the file system: paths are
//! normalized by folding `.` and `..` components so that two spellings of the
//! same location compare equal.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Fold `.` and `..` components without resolving symlinks.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
	let mut normalized = PathBuf::new();

	for component in path.as_ref().components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				let can_pop = matches!(
					normalized.components().next_back(),
					Some(Component::Normal(_))
				);

				if can_pop {
					normalized.pop();
				} else if !normalized.has_root() {
					normalized.push("..");
				}
			}
			other => normalized.push(other.as_os_str()),
		}
	}

	normalized
}

/// Resolve `path` against `base` (a directory) unless it is already absolute.
pub fn resolve(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
	let path = path.as_ref();

	if path.is_absolute() {
		normalize(path)
	} else {
		normalize(base.as_ref().join(path))
	}
}

/// Whether `path` is `root` itself or lies somewhere below it.
pub fn is_inside(root: impl AsRef<Path>, path: impl AsRef<Path>) -> bool {
	normalize(path).starts_with(normalize(root))
}

/// Relative path leading from the directory `from` to `to`.
///
/// Both paths are expected to share the same root (both absolute, or both
/// relative to the same directory).
pub fn relative(from: impl AsRef<Path>, to: impl AsRef<Path>) -> PathBuf {
	let from = normalize(from);
	let to = normalize(to);
	let from: Vec<_> = from.components().collect();
	let to: Vec<_> = to.components().collect();
	let common = from
		.iter()
		.zip(to.iter())
		.take_while(|(a, b)| a == b)
		.count();
	let mut relative = PathBuf::new();

	for _ in common..from.len() {
		relative.push("..");
	}

	for component in &to[common..] {
		relative.push(component.as_os_str());
	}

	relative
}

/// Render a path with forward slashes, as used inside markdown links.
pub fn to_slash(path: impl AsRef<Path>) -> String {
	path.as_ref()
		.components()
		.map(|component| component.as_os_str().to_string_lossy().into_owned())
		.collect::<Vec<_>>()
		.join("/")
		.replacen("//", "/", 1)
}

/// The directory containing `path`, or `path` itself when it has no parent.
pub fn directory(path: impl AsRef<Path>) -> PathBuf {
	path.as_ref()
		.parent()
		.map_or_else(|| path.as_ref().to_path_buf(), Path::to_path_buf)
}
