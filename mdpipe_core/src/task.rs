use std::cmp::Reverse;
use std::fmt;
use std::rc::Rc;

use crate::File;
use crate::MdpipeResult;
use crate::Resolver;

/// Which files a [`Task`] runs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
	/// Files with this extension (without the leading dot).
	Extension(String),
	/// Every file, ordered together with extension tasks.
	Any,
	/// Every processed file, after all other tasks of the file.
	Each,
	/// Once, before the first file is processed.
	Before,
	/// Once, after the last file is processed.
	After,
}

impl Target {
	pub fn extension(extension: impl Into<String>) -> Self {
		Self::Extension(extension.into())
	}
}

/// A unit of per-file work.
///
/// Tasks request other files through the [`Resolver`]; requested files are
/// processed before the call returns. A task must return `Ok(true)` on
/// success, anything else fails the file.
pub trait Task {
	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}

	fn targets(&self) -> Vec<Target>;

	fn run(&self, resolver: &mut Resolver<'_>, file: &Rc<File>) -> MdpipeResult<bool>;
}

#[derive(Clone)]
struct Registered {
	task: Rc<dyn Task>,
	targets: Vec<Target>,
	priority: i32,
	order: usize,
}

/// Registered tasks ordered by priority.
///
/// Higher priorities run first. Tasks with the same priority run in
/// registration order, so the first added task wins ties.
#[derive(Clone, Default)]
pub struct Tasks {
	registered: Vec<Registered>,
}

impl Tasks {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, task: impl Task + 'static, priority: Option<i32>) -> &mut Self {
		self.add_rc(Rc::new(task), priority)
	}

	pub fn add_rc(&mut self, task: Rc<dyn Task>, priority: Option<i32>) -> &mut Self {
		let order = self.registered.len();

		self.registered.push(Registered {
			targets: task.targets(),
			task,
			priority: priority.unwrap_or_default(),
			order,
		});
		self.registered
			.sort_by_key(|registered| (Reverse(registered.priority), registered.order));

		self
	}

	/// Remove every task with the given name.
	pub fn remove(&mut self, name: &str) -> &mut Self {
		self.registered
			.retain(|registered| registered.task.name() != name);
		self
	}

	pub fn len(&self) -> usize {
		self.registered.len()
	}

	pub fn is_empty(&self) -> bool {
		self.registered.is_empty()
	}

	/// Tasks for a file with `extension`: extension and wildcard tasks by
	/// priority, then the each-file tasks.
	pub fn get(&self, extension: Option<&str>) -> Vec<Rc<dyn Task>> {
		let matching = |target: &Target| {
			match target {
				Target::Extension(wanted) => Some(wanted.as_str()) == extension,
				Target::Any => true,
				_ => false,
			}
		};
		let mut tasks = self.collect(|targets| targets.iter().any(|target| matching(target)));

		tasks.extend(self.collect(|targets| targets.contains(&Target::Each)));
		tasks
	}

	/// Whether any task would run for a file with `extension`.
	pub fn has(&self, extension: Option<&str>) -> bool {
		!self.get(extension).is_empty()
	}

	/// Whether tasks run on files regardless of their extension.
	pub fn has_wildcard(&self) -> bool {
		self.registered.iter().any(|registered| {
			registered
				.targets
				.iter()
				.any(|target| matches!(target, Target::Any | Target::Each))
		})
	}

	/// Extensions targeted by the registered tasks, in priority order.
	pub fn extensions(&self) -> Vec<String> {
		let mut extensions: Vec<String> = Vec::new();

		for registered in &self.registered {
			for target in &registered.targets {
				if let Target::Extension(extension) = target {
					if !extensions.contains(extension) {
						extensions.push(extension.clone());
					}
				}
			}
		}

		extensions
	}

	/// Tasks registered for the `Before` or `After` hook.
	pub fn hooks(&self, hook: &Target) -> Vec<Rc<dyn Task>> {
		self.collect(|targets| targets.contains(hook))
	}

	fn collect(&self, predicate: impl Fn(&[Target]) -> bool) -> Vec<Rc<dyn Task>> {
		self.registered
			.iter()
			.filter(|registered| predicate(&registered.targets))
			.map(|registered| Rc::clone(&registered.task))
			.collect()
	}
}

impl fmt::Debug for Tasks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list()
			.entries(self.registered.iter().map(|registered| registered.task.name()))
			.finish()
	}
}
