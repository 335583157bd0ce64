use std::cell::RefCell;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingFinishedResult {
	Success,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFinishedResult {
	Success,
	Skipped,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFinishedResult {
	Success,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyResolvedResult {
	Success,
	/// The dependency does not exist.
	Missed,
	Failed,
	/// An optional dependency does not exist.
	Null,
	/// The dependency was queued for later processing.
	Queued,
}

/// Progress of a processing run. Paths are relative to the input directory
/// when possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
	ProcessingStarted,
	ProcessingFinished {
		result: ProcessingFinishedResult,
	},
	FileStarted {
		path: String,
	},
	FileFinished {
		result: FileFinishedResult,
	},
	TaskStarted {
		task: String,
	},
	TaskFinished {
		result: TaskFinishedResult,
	},
	DependencyResolved {
		path: String,
		result: DependencyResolvedResult,
	},
}

impl fmt::Display for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ProcessingStarted => write!(f, "processing started"),
			Self::ProcessingFinished { result } => write!(f, "processing finished: {result:?}"),
			Self::FileStarted { path } => write!(f, "file `{path}` started"),
			Self::FileFinished { result } => write!(f, "file finished: {result:?}"),
			Self::TaskStarted { task } => write!(f, "task `{task}` started"),
			Self::TaskFinished { result } => write!(f, "task finished: {result:?}"),
			Self::DependencyResolved { path, result } => {
				write!(f, "dependency `{path}` resolved: {result:?}")
			}
		}
	}
}

/// Receives processing events.
pub trait Listener {
	fn notify(&self, event: &Event);
}

impl<F: Fn(&Event)> Listener for F {
	fn notify(&self, event: &Event) {
		self(event);
	}
}

/// Forwards events to every attached listener in attachment order.
#[derive(Default)]
pub struct Dispatcher {
	listeners: RefCell<Vec<Box<dyn Listener>>>,
}

impl Dispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn attach(&self, listener: impl Listener + 'static) {
		self.listeners.borrow_mut().push(Box::new(listener));
	}

	pub fn notify(&self, event: Event) {
		for listener in self.listeners.borrow().iter() {
			listener.notify(&event);
		}
	}

	pub fn len(&self) -> usize {
		self.listeners.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.borrow().is_empty()
	}
}

impl fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatcher")
			.field("listeners", &self.len())
			.finish()
	}
}

/// Writes events as `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl Listener for TracingListener {
	fn notify(&self, event: &Event) {
		match event {
			Event::ProcessingStarted => tracing::info!("processing started"),
			Event::ProcessingFinished { result } => {
				match result {
					ProcessingFinishedResult::Success => tracing::info!("processing finished"),
					ProcessingFinishedResult::Failed => tracing::error!("processing failed"),
				}
			}
			Event::FileStarted { path } => tracing::debug!(path = %path, "file started"),
			Event::FileFinished { result } => tracing::debug!(result = ?result, "file finished"),
			Event::TaskStarted { task } => tracing::trace!(task = %task, "task started"),
			Event::TaskFinished { result } => tracing::trace!(result = ?result, "task finished"),
			Event::DependencyResolved { path, result } => {
				if matches!(result, DependencyResolvedResult::Missed | DependencyResolvedResult::Failed) {
					tracing::warn!(path = %path, result = ?result, "dependency not resolved");
				} else {
					tracing::trace!(path = %path, result = ?result, "dependency resolved");
				}
			}
		}
	}
}
