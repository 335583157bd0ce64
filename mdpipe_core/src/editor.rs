use std::fmt;

use crate::Coordinate;
use crate::Location;

/// A replacement (`Some`) or deletion (`None`) of the text at a location.
pub type Change = (Location, Option<String>);

/// Line oriented text which can be rewritten by coordinates.
///
/// All operations are pure: [`Editor::mutate`] and [`Editor::extract`] return
/// a new editor and never touch the original lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
	lines: Vec<String>,
	end_of_line: String,
}

impl Editor {
	pub fn new(content: &str) -> Self {
		let end_of_line = if content.contains("\r\n") {
			"\r\n"
		} else {
			"\n"
		};

		Self::from_lines(split_lines(content), end_of_line)
	}

	pub fn from_lines(lines: Vec<String>, end_of_line: impl Into<String>) -> Self {
		Self {
			lines,
			end_of_line: end_of_line.into(),
		}
	}

	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	pub fn end_of_line(&self) -> &str {
		&self.end_of_line
	}

	/// Text covered by `location`, coordinates joined by line breaks.
	///
	/// Returns `None` when the location is empty or starts on a line which
	/// does not exist.
	pub fn text(&self, location: &Location) -> Option<String> {
		let first = location.first()?;

		if first.line >= self.lines.len() {
			return None;
		}

		let parts: Vec<&str> = location
			.iter()
			.map(|coordinate| self.slice(coordinate))
			.collect();

		Some(parts.join("\n"))
	}

	/// A new editor holding the text of each coordinate as a separate line.
	#[must_use]
	pub fn extract<'a>(&self, locations: impl IntoIterator<Item = &'a Location>) -> Self {
		let lines = locations
			.into_iter()
			.flat_map(|location| location.iter())
			.map(|coordinate| self.slice(coordinate).to_string())
			.collect();

		Self::from_lines(lines, self.end_of_line.clone())
	}

	/// Apply `changes` and return the mutated text as a new editor.
	///
	/// When changes overlap, the one declared last wins and the others are
	/// dropped entirely. Edits are applied bottom-up and right-to-left so the
	/// offsets of the remaining edits stay valid.
	#[must_use]
	pub fn mutate(&self, changes: impl IntoIterator<Item = Change>) -> Self {
		let mut changes: Vec<(Vec<Coordinate>, Option<String>)> = changes
			.into_iter()
			.map(|(location, text)| (location.into_coordinates(), text))
			.filter(|(coordinates, _)| !coordinates.is_empty())
			.collect();

		changes.reverse();

		let changes = remove_overlaps(changes);
		let (mut edits, mut appends) = expand(changes);
		let mut lines = self.lines.clone();

		edits.sort_by(|a, b| {
			(b.coordinate.line, b.coordinate.offset).cmp(&(a.coordinate.line, a.coordinate.offset))
		});

		for edit in edits {
			apply(&mut lines, &edit.coordinate, &edit.fragments);
		}

		// Changes were reversed above, restore the declaration order.
		appends.reverse();

		for fragments in appends {
			lines.extend(fragments);
		}

		Self::from_lines(lines, self.end_of_line.clone())
	}

	fn slice(&self, coordinate: &Coordinate) -> &str {
		let Some(line) = self.lines.get(coordinate.line) else {
			return "";
		};
		let start = floor_boundary(line, coordinate.offset);
		let end = coordinate
			.length
			.map_or(line.len(), |length| floor_boundary(line, start.saturating_add(length)));

		&line[start..end]
	}
}

impl fmt::Display for Editor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.lines.join(&self.end_of_line))
	}
}

struct Edit {
	coordinate: Coordinate,
	fragments: Vec<String>,
}

fn split_lines(content: &str) -> Vec<String> {
	content
		.split('\n')
		.map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
		.collect()
}

fn remove_overlaps(
	changes: Vec<(Vec<Coordinate>, Option<String>)>,
) -> Vec<(Vec<Coordinate>, Option<String>)> {
	let mut claimed: Vec<Coordinate> = Vec::new();
	let mut accepted = Vec::with_capacity(changes.len());

	for (coordinates, text) in changes {
		let overlaps = coordinates
			.iter()
			.any(|coordinate| claimed.iter().any(|other| coordinate.overlaps(other)));

		if overlaps {
			continue;
		}

		claimed.extend(coordinates.iter().copied());
		accepted.push((coordinates, text));
	}

	accepted
}

fn expand(changes: Vec<(Vec<Coordinate>, Option<String>)>) -> (Vec<Edit>, Vec<Vec<String>>) {
	let mut edits = Vec::new();
	let mut appends = Vec::new();

	for (mut coordinates, text) in changes {
		let mut fragments: Vec<String> = match text {
			None => Vec::new(),
			Some(text) => split_lines(&text),
		};

		coordinates.sort_by_key(|coordinate| (coordinate.line, coordinate.offset));

		let last = coordinates.len() - 1;

		for (index, coordinate) in coordinates.into_iter().enumerate() {
			let assigned = if index == last {
				std::mem::take(&mut fragments)
			} else if fragments.is_empty() {
				Vec::new()
			} else {
				vec![fragments.remove(0)]
			};

			if coordinate.is_append() {
				appends.push(assigned);
			} else {
				edits.push(Edit {
					coordinate,
					fragments: assigned,
				});
			}
		}
	}

	(edits, appends)
}

fn apply(lines: &mut Vec<String>, coordinate: &Coordinate, fragments: &[String]) {
	let index = coordinate.line;

	if index >= lines.len() {
		if fragments.is_empty() {
			return;
		}

		lines.resize(index + 1, String::new());
	}

	let line = lines[index].clone();
	let start = floor_boundary(&line, coordinate.offset);
	let end = coordinate
		.length
		.map_or(line.len(), |length| floor_boundary(&line, start.saturating_add(length)));
	let prefix = &line[..start];
	let suffix = &line[end..];
	let padding = &line[..floor_boundary(&line, coordinate.padding)];

	match fragments {
		[] => {
			if prefix.trim() != padding.trim() || !suffix.is_empty() {
				lines[index] = format!("{prefix}{suffix}").trim_end().to_string();
			} else {
				lines.remove(index);
			}
		}
		[fragment] => {
			lines[index] = format!("{prefix}{fragment}{suffix}").trim_end().to_string();
		}
		[first, middle @ .., last] => {
			let mut produced = Vec::with_capacity(middle.len() + 2);

			produced.push(format!("{prefix}{first}").trim_end().to_string());

			for fragment in middle {
				produced.push(format!("{padding}{fragment}").trim_end().to_string());
			}

			produced.push(format!("{padding}{last}{suffix}").trim_end().to_string());
			lines.splice(index..=index, produced);
		}
	}
}

/// Clamp `index` to the line length and move it back to a char boundary.
fn floor_boundary(line: &str, index: usize) -> usize {
	let mut index = index.min(line.len());

	while !line.is_char_boundary(index) {
		index -= 1;
	}

	index
}
