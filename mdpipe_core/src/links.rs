//! Helpers for the raw syntax of links, images and reference definitions.
//!
//! The markdown tree only keeps the parsed destination and title, so these
//! functions scan the original source to find where a destination is written
//! and how it was formatted.

use std::ops::Range;
use std::path::Path;

use crate::Document;
use crate::NodeData;
use crate::NodeKind;
use crate::paths;

/// The written destination of a link, image or definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
	/// Byte range of the destination including angle brackets.
	pub span: Range<usize>,
	/// Whether the destination is written as `<...>`.
	pub wrapped: bool,
}

/// Find the end (exclusive, pointing at the `]`) of a label starting at
/// `start`, just after the opening bracket.
pub fn label_end(source: &str, start: usize) -> Option<usize> {
	let bytes = source.as_bytes();
	let mut depth = 0usize;
	let mut index = start;

	while index < bytes.len() {
		match bytes[index] {
			b'\\' => index += 1,
			b'`' => {
				let run = count_run(bytes, index, b'`');
				if let Some(close) = find_run(bytes, index + run, run) {
					index = close + run;
					continue;
				}
				index += run;
				continue;
			}
			b'[' => depth += 1,
			b']' if depth == 0 => return Some(index),
			b']' => depth -= 1,
			_ => {}
		}

		index += 1;
	}

	None
}

/// Byte range of the text between the brackets of a link or image.
pub fn label_span(document: &Document, node: &NodeData) -> Option<Range<usize>> {
	let source = document.source();
	let open = match node.kind {
		NodeKind::Image { .. } | NodeKind::ImageReference { .. } => 2,
		_ => 1,
	};
	let start = node.span.start + open;
	let scan_from = node
		.children
		.last()
		.and_then(|child| document.node(*child))
		.map_or(start, |child| child.span.end.max(start));
	let end = label_end(source, scan_from)?;

	(end <= node.span.end).then_some(start..end)
}

/// Locate the destination of an inline link or image.
pub fn inline_destination(document: &Document, node: &NodeData) -> Option<Destination> {
	let source = document.source();
	let label = label_span(document, node)?;
	let open = label.end + 1;

	if source.as_bytes().get(open) != Some(&b'(') {
		return None;
	}

	let start = skip_whitespace(source, open + 1);
	destination_at(source, start)
}

/// Locate the destination of a reference definition.
pub fn definition_destination(document: &Document, node: &NodeData) -> Option<Destination> {
	let source = document.source();
	let label_end = label_end(source, node.span.start + 1)?;

	if source.as_bytes().get(label_end + 1) != Some(&b':') {
		return None;
	}

	let start = skip_whitespace(source, label_end + 2);
	destination_at(source, start)
}

/// Locate the destination of any node which has one written in the source.
pub fn destination(document: &Document, node: &NodeData) -> Option<Destination> {
	match node.kind {
		NodeKind::Link { .. } | NodeKind::Image { .. } => inline_destination(document, node),
		NodeKind::Definition { .. } => definition_destination(document, node),
		_ => None,
	}
}

fn destination_at(source: &str, start: usize) -> Option<Destination> {
	let bytes = source.as_bytes();

	if bytes.get(start) == Some(&b'<') {
		let mut index = start + 1;

		while index < bytes.len() {
			match bytes[index] {
				b'\\' => index += 1,
				b'>' => {
					return Some(Destination {
						span: start..index + 1,
						wrapped: true,
					});
				}
				b'\n' => return None,
				_ => {}
			}

			index += 1;
		}

		return None;
	}

	let mut depth = 0usize;
	let mut index = start;

	while index < bytes.len() {
		match bytes[index] {
			b'\\' => index += 1,
			b'(' => depth += 1,
			b')' if depth == 0 => break,
			b')' => depth -= 1,
			byte if byte.is_ascii_whitespace() => break,
			_ => {}
		}

		index += 1;
	}

	Some(Destination {
		span: start..index.min(bytes.len()),
		wrapped: false,
	})
}

fn skip_whitespace(source: &str, start: usize) -> usize {
	let bytes = source.as_bytes();
	let mut index = start;

	while index < bytes.len() && bytes[index].is_ascii_whitespace() {
		index += 1;
	}

	index
}

fn count_run(bytes: &[u8], start: usize, byte: u8) -> usize {
	bytes[start..].iter().take_while(|b| **b == byte).count()
}

fn find_run(bytes: &[u8], from: usize, length: usize) -> Option<usize> {
	let mut index = from;

	while index < bytes.len() {
		if bytes[index] == b'`' {
			let run = count_run(bytes, index, b'`');
			if run == length {
				return Some(index);
			}
			index += run;
		} else {
			index += 1;
		}
	}

	None
}

/// Format a link destination. The target is wrapped into `<>` when `wrap` is
/// set, or when it contains whitespace or unbalanced parentheses.
pub fn format_target(target: &str, wrap: bool) -> String {
	let needs_wrap = wrap || target.chars().any(char::is_whitespace) || !balanced(target);

	if needs_wrap {
		format!("<{}>", target.replace('<', "\\<").replace('>', "\\>"))
	} else {
		target.to_string()
	}
}

/// Format a link title, picking the first wrapper that does not occur in it.
pub fn format_title(title: &str) -> String {
	if title.is_empty() {
		String::new()
	} else if !title.contains('"') {
		format!("\"{title}\"")
	} else if !title.contains('\'') {
		format!("'{title}'")
	} else {
		format!("({})", title.replace('(', "\\(").replace(')', "\\)"))
	}
}

/// `(target "title")` as written after the label of an inline link.
pub fn format_inline(target: &str, title: Option<&str>) -> String {
	let target = format_target(target, false);
	let title = format_title(title.unwrap_or_default());

	if title.is_empty() {
		format!("({target})")
	} else {
		format!("({target} {title})")
	}
}

fn balanced(target: &str) -> bool {
	let mut depth = 0i32;

	for char in target.chars() {
		match char {
			'(' => depth += 1,
			')' => {
				depth -= 1;
				if depth < 0 {
					return false;
				}
			}
			_ => {}
		}
	}

	depth == 0
}

/// Decode `%XX` escapes. Invalid sequences are kept as written.
pub fn percent_decode(url: &str) -> String {
	let bytes = url.as_bytes();
	let mut decoded = Vec::with_capacity(bytes.len());
	let mut index = 0;

	while index < bytes.len() {
		let escaped = (bytes[index] == b'%')
			.then(|| bytes.get(index + 1..index + 3))
			.flatten()
			.filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
			.and_then(|hex| std::str::from_utf8(hex).ok())
			.and_then(|hex| u8::from_str_radix(hex, 16).ok());

		if let Some(byte) = escaped {
			decoded.push(byte);
			index += 3;
			continue;
		}

		decoded.push(bytes[index]);
		index += 1;
	}

	String::from_utf8_lossy(&decoded).into_owned()
}

/// Split a url into its path and the `?query#fragment` suffix.
pub fn split_suffix(url: &str) -> (&str, &str) {
	let index = url.find(['?', '#']).unwrap_or(url.len());
	url.split_at(index)
}

fn has_scheme(url: &str) -> bool {
	let Some(index) = url.find(':') else {
		return false;
	};
	let scheme = &url[..index];

	!scheme.is_empty()
		&& scheme.starts_with(|c: char| c.is_ascii_alphabetic())
		&& scheme
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Whether the url points into the file system rather than to a remote
/// resource.
pub fn is_path(url: &str) -> bool {
	let url = url.trim();
	!url.is_empty() && !url.starts_with("//") && !has_scheme(url)
}

/// Whether the url is a path relative to the document, including bare
/// fragments like `#section`.
pub fn is_relative(url: &str) -> bool {
	is_path(url) && !url.trim().starts_with('/')
}

/// Whether the path part of `url` points to the document itself.
pub fn is_self(document_path: Option<&Path>, url: &str) -> bool {
	let url = url.trim();
	let (path, _) = split_suffix(url);

	if path.is_empty() {
		return is_path(url);
	}

	if !is_path(path) {
		return false;
	}

	let Some(document_path) = document_path else {
		return false;
	};

	resolve(document_path, path) == paths::normalize(document_path)
}

/// Whether the url leads nowhere: it is empty, a bare `#`, or a link to the
/// document itself without a fragment.
pub fn is_empty(document_path: Option<&Path>, url: &str) -> bool {
	let url = url.trim();

	if url.is_empty() || url == "#" {
		return true;
	}

	let (path, suffix) = split_suffix(url);
	let fragment = suffix.split_once('#').map_or("", |(_, fragment)| fragment);

	!path.is_empty() && fragment.is_empty() && !suffix.contains('?') && is_self(document_path, url)
}

/// Resolve the path part of a url against the directory of `document_path`.
pub fn resolve(document_path: &Path, path: &str) -> std::path::PathBuf {
	paths::resolve(paths::directory(document_path), path)
}

/// Rewrite a relative url so it points to the same target from `to` as it
/// did from `from`. Self links keep only their fragment.
pub fn rebase(from: &Path, to: &Path, url: &str) -> String {
	let url = percent_decode(url);

	if is_self(Some(from), &url) {
		let (_, suffix) = split_suffix(&url);
		return if suffix.is_empty() {
			"#".to_string()
		} else {
			suffix.to_string()
		};
	}

	let (path, suffix) = split_suffix(&url);
	let target = resolve(from, path);
	let relative = paths::to_slash(paths::relative(paths::directory(to), target));
	let relative = if relative.is_empty() {
		"./".to_string()
	} else if path.ends_with('/') && !relative.ends_with('/') {
		format!("{relative}/")
	} else {
		relative
	};

	format!("{relative}{suffix}")
}
