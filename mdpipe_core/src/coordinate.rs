use serde::Deserialize;
use serde::Serialize;

/// A span within a single line of text.
///
/// `offset` and `length` are byte offsets into the line. A `length` of `None`
/// extends the span to the end of the line. `padding` is the width of the
/// line's own prefix (indentation and container markers such as `> `) which is
/// reused when a replacement has to be split over several lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
	/// 0-indexed line number.
	pub line: usize,
	/// Byte offset of the span start within the line.
	pub offset: usize,
	/// Byte length of the span, `None` means "to the end of the line".
	pub length: Option<usize>,
	/// Width of the line prefix reused for continuation lines.
	pub padding: usize,
}

impl Coordinate {
	/// Line sentinel used to append text after the last line of the document.
	pub const APPEND: usize = usize::MAX;

	pub const fn new(line: usize, offset: usize, length: Option<usize>) -> Self {
		Self {
			line,
			offset,
			length,
			padding: 0,
		}
	}

	pub const fn with_padding(mut self, padding: usize) -> Self {
		self.padding = padding;
		self
	}

	/// A coordinate that appends to the end of the document.
	pub const fn append() -> Self {
		Self::new(Self::APPEND, 0, None)
	}

	pub const fn is_append(&self) -> bool {
		self.line == Self::APPEND
	}

	/// Exclusive end of the span, `usize::MAX` when the span is open ended.
	pub fn end(&self) -> usize {
		self.length
			.map_or(usize::MAX, |length| self.offset.saturating_add(length))
	}

	/// Half-open interval intersection on the same physical line. Appends
	/// never overlap.
	pub fn overlaps(&self, other: &Coordinate) -> bool {
		!self.is_append()
			&& self.line == other.line
			&& self.offset < other.end()
			&& other.offset < self.end()
	}
}
