use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;

use crate::Event;
use crate::File;
use crate::FileReference;
use crate::MdpipeResult;
use crate::Processor;
use crate::Resolver;
use crate::Target;
use crate::Task;

pub type Log = Rc<RefCell<Vec<String>>>;

/// Create a temporary directory containing `files`.
pub fn tree(files: &[(&str, &str)]) -> TempDir {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));

	for (path, content) in files {
		let path = tmp.path().join(path);

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
		}

		std::fs::write(&path, content).unwrap_or_else(|e| panic!("write: {e}"));
	}

	tmp
}

pub fn read(root: &Path, path: &str) -> String {
	std::fs::read_to_string(root.join(path)).unwrap_or_else(|e| panic!("read {path}: {e}"))
}

pub fn log() -> Log {
	Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
	log.borrow().clone()
}

type Callback = Box<dyn Fn(&mut Resolver<'_>, &Rc<File>) -> MdpipeResult<bool>>;

/// A task defined by a closure.
pub struct FnTask {
	name: String,
	targets: Vec<Target>,
	callback: Callback,
}

impl FnTask {
	pub fn new(
		name: &str,
		targets: Vec<Target>,
		callback: impl Fn(&mut Resolver<'_>, &Rc<File>) -> MdpipeResult<bool> + 'static,
	) -> Self {
		Self {
			name: name.to_string(),
			targets,
			callback: Box::new(callback),
		}
	}
}

impl Task for FnTask {
	fn name(&self) -> &str {
		&self.name
	}

	fn targets(&self) -> Vec<Target> {
		self.targets.clone()
	}

	fn run(&self, resolver: &mut Resolver<'_>, file: &Rc<File>) -> MdpipeResult<bool> {
		(self.callback)(resolver, file)
	}
}

/// Records the processed `md` files and resolves the file named on the first
/// line of each one, if any.
pub fn linking_task(log: &Log) -> FnTask {
	let log = Rc::clone(log);

	FnTask::new("link", vec![Target::extension("md")], move |resolver, file| {
		log.borrow_mut().push(resolver.fs().pathname(file.path()));

		let content = file.content()?;
		let target = content.lines().next().unwrap_or_default().trim();

		if !target.is_empty() {
			resolver.resolve(&FileReference::new(target))?;
		}

		Ok(true)
	})
}

/// Records every processed `md` file.
pub fn recording_task(log: &Log) -> FnTask {
	let log = Rc::clone(log);

	FnTask::new("record", vec![Target::extension("md")], move |resolver, file| {
		log.borrow_mut().push(resolver.fs().pathname(file.path()));
		Ok(true)
	})
}

/// Collects every event of a processor.
pub fn collect_events(processor: &mut Processor) -> Rc<RefCell<Vec<Event>>> {
	let events = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&events);

	processor.add_listener(move |event: &Event| sink.borrow_mut().push(event.clone()));

	events
}
