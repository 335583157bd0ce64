use std::ops::Range;

use derive_more::Deref;

use crate::Coordinate;

/// An ordered sequence of [`Coordinate`]s describing a possibly multi-line
/// span of the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deref)]
pub struct Location(Vec<Coordinate>);

impl Location {
	pub fn new(coordinates: impl IntoIterator<Item = Coordinate>) -> Self {
		Self(coordinates.into_iter().collect())
	}

	/// A location which appends text after the last line.
	pub fn append() -> Self {
		Self(vec![Coordinate::append()])
	}

	pub fn start_line(&self) -> Option<usize> {
		self.0.first().map(|coordinate| coordinate.line)
	}

	pub fn end_line(&self) -> Option<usize> {
		self.0.last().map(|coordinate| coordinate.line)
	}

	pub fn padding(&self) -> usize {
		self.0.first().map_or(0, |coordinate| coordinate.padding)
	}

	/// Shift the start of the first coordinate `offset` bytes to the right,
	/// shrinking it accordingly.
	#[must_use]
	pub fn with_offset(&self, offset: usize) -> Self {
		let mut coordinates = self.0.clone();

		if let Some(first) = coordinates.first_mut() {
			first.offset += offset;
			first.length = first.length.map(|length| length.saturating_sub(offset));
		}

		Self(coordinates)
	}

	pub fn into_coordinates(self) -> Vec<Coordinate> {
		self.0
	}
}

impl From<Coordinate> for Location {
	fn from(coordinate: Coordinate) -> Self {
		Self(vec![coordinate])
	}
}

impl From<Vec<Coordinate>> for Location {
	fn from(coordinates: Vec<Coordinate>) -> Self {
		Self(coordinates)
	}
}

impl FromIterator<Coordinate> for Location {
	fn from_iter<T: IntoIterator<Item = Coordinate>>(iter: T) -> Self {
		Self::new(iter)
	}
}

/// Byte offsets of line starts, used to turn byte ranges of a source string
/// into [`Location`]s.
#[derive(Debug, Clone)]
pub struct LineTable {
	/// `line_starts[0]` is always 0.
	line_starts: Vec<usize>,
	/// Byte length of each line, excluding the line break.
	line_lengths: Vec<usize>,
	/// Width of leading whitespace and blockquote markers, indexed by line and
	/// then by the number of markers consumed.
	prefixes: Vec<Vec<usize>>,
}

impl LineTable {
	pub fn new(content: &str) -> Self {
		let mut line_starts = vec![0];
		let mut line_lengths = Vec::new();
		let mut prefixes = Vec::new();

		for line in content.split('\n') {
			let start = line_starts.last().copied().unwrap_or_default();
			line_lengths.push(line.len());
			prefixes.push(prefix_widths(line));
			line_starts.push(start + line.len() + 1);
		}

		line_starts.pop();

		Self {
			line_starts,
			line_lengths,
			prefixes,
		}
	}

	pub fn len(&self) -> usize {
		self.line_starts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.line_starts.is_empty()
	}

	/// 0-indexed line containing the byte `offset`.
	pub fn line_of(&self, offset: usize) -> usize {
		match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact,
			Err(insert) => insert.saturating_sub(1),
		}
	}

	pub fn line_start(&self, line: usize) -> usize {
		self.line_starts.get(line).copied().unwrap_or_default()
	}

	/// Width of the line prefix made of indentation and up to `depth`
	/// blockquote markers.
	pub fn padding(&self, line: usize, depth: usize) -> usize {
		self.prefixes.get(line).map_or(0, |widths| {
			widths.get(depth).or(widths.last()).copied().unwrap_or_default()
		})
	}

	/// Convert the byte `range` into a [`Location`]. Continuation lines start
	/// after their padding so container markers are preserved.
	pub fn location(&self, range: Range<usize>, depth: usize) -> Location {
		let start_line = self.line_of(range.start);
		let end_line = if range.end > range.start {
			self.line_of(range.end - 1)
		} else {
			start_line
		};
		let mut coordinates = Vec::with_capacity(end_line - start_line + 1);

		for line in start_line..=end_line {
			let line_start = self.line_start(line);
			let line_length = self.line_lengths.get(line).copied().unwrap_or_default();
			let padding = self.padding(line, depth);
			let offset = if line == start_line {
				range.start - line_start
			} else {
				padding.min(line_length)
			};
			let length = if line == end_line {
				Some(range.end.saturating_sub(line_start).min(line_length).saturating_sub(offset))
			} else {
				None
			};

			coordinates.push(Coordinate {
				line,
				offset,
				length,
				padding,
			});
		}

		Location(coordinates)
	}
}

/// Prefix widths after consuming 0, 1, 2, ... blockquote markers.
fn prefix_widths(line: &str) -> Vec<usize> {
	let bytes = line.as_bytes();
	let skip_spaces = |mut index: usize| {
		while index < bytes.len() && (bytes[index] == b' ' || bytes[index] == b'\t') {
			index += 1;
		}
		index
	};
	let mut index = skip_spaces(0);
	let mut widths = vec![index];

	while index < bytes.len() && bytes[index] == b'>' {
		index = skip_spaces(index + 1);
		widths.push(index);
	}

	widths
}
