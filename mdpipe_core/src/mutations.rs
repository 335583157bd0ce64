use std::path::Path;

use crate::Change;
use crate::Document;
use crate::NodeData;
use crate::NodeKind;
use crate::NodeType;
use crate::each_node;
use crate::links;
use crate::paths;

const DESTINATIONS: &[NodeType] = &[NodeType::Link, NodeType::Image, NodeType::Definition];
const LINKS: &[NodeType] = &[NodeType::Link, NodeType::LinkReference];
const IMAGES: &[NodeType] = &[NodeType::Image, NodeType::ImageReference];

pub(crate) fn move_to(document: &Document, path: &Path) -> Vec<Change> {
	let Some(from) = document.path().map(paths::normalize) else {
		return Vec::new();
	};
	let to = paths::normalize(path);

	if from == to {
		return Vec::new();
	}

	each_node(document, DESTINATIONS, |node| {
		let Some(url) = document.url(node.id).map(links::percent_decode) else {
			return Vec::new();
		};

		if !links::is_relative(&url) {
			return Vec::new();
		}

		let target = links::rebase(&from, &to, &url);
		replace_destination(document, node, &target)
	})
}

pub(crate) fn relink(document: &Document, callback: &dyn Fn(&str) -> String) -> Vec<Change> {
	each_node(document, DESTINATIONS, |node| {
		let Some(url) = document.url(node.id).map(links::percent_decode) else {
			return Vec::new();
		};
		let url = match document.path() {
			Some(path) if links::is_path(&url) => {
				let (target, suffix) = links::split_suffix(&url);
				if target.is_empty() {
					url.clone()
				} else {
					format!("{}{suffix}", paths::to_slash(links::resolve(path, target)))
				}
			}
			_ => url,
		};
		let target = callback(&url);

		if target == url {
			return Vec::new();
		}

		replace_destination(document, node, &target)
	})
}

fn replace_destination(document: &Document, node: &NodeData, target: &str) -> Vec<Change> {
	let Some(destination) = links::destination(document, node) else {
		return Vec::new();
	};
	let text = links::format_target(target, destination.wrapped);

	if document.slice(destination.span.clone()) == text {
		return Vec::new();
	}

	vec![(
		document.range_location(destination.span, node.depth),
		Some(text),
	)]
}

/// Replace a link by the text of its label, or remove it when the label is
/// empty.
pub(crate) fn unlink(document: &Document, node: &NodeData) -> Vec<Change> {
	let Some(location) = document.location(node.id) else {
		return Vec::new();
	};
	let text = links::label_span(document, node)
		.filter(|label| !label.is_empty())
		.and_then(|label| document.text(&document.range_location(label, node.depth)));

	vec![(location, text)]
}

fn delete(document: &Document, node: &NodeData) -> Vec<Change> {
	document
		.location(node.id)
		.map(|location| vec![(location, None)])
		.unwrap_or_default()
}

fn decoded_url(document: &Document, node: &NodeData) -> Option<String> {
	document.url(node.id).map(links::percent_decode)
}

pub(crate) fn link_unlink_empty(document: &Document) -> Vec<Change> {
	each_node(document, LINKS, |node| {
		match decoded_url(document, node) {
			Some(url) if links::is_empty(document.path(), &url) => unlink(document, node),
			_ => Vec::new(),
		}
	})
}

pub(crate) fn link_remove_to_self(document: &Document) -> Vec<Change> {
	each_node(document, LINKS, |node| {
		match decoded_url(document, node) {
			Some(url) if links::is_relative(&url) && links::is_self(document.path(), &url) => {
				unlink(document, node)
			}
			_ => Vec::new(),
		}
	})
}

pub(crate) fn image_remove_empty(document: &Document) -> Vec<Change> {
	each_node(document, IMAGES, |node| {
		match decoded_url(document, node) {
			Some(url)
				if links::is_self(document.path(), &url)
					|| links::is_empty(document.path(), &url) =>
			{
				delete(document, node)
			}
			_ => Vec::new(),
		}
	})
}

pub(crate) fn reference_remove_empty(document: &Document) -> Vec<Change> {
	each_node(document, &[NodeType::Definition], |node| {
		let empty = decoded_url(document, node).is_some_and(|url| links::is_empty(document.path(), &url));

		if !empty {
			return Vec::new();
		}

		let mut changes = delete(document, node);

		// A shadowed duplicate resolves nothing, its usages belong to the
		// definition declared last.
		let winning = match &node.kind {
			NodeKind::Definition { identifier, .. } => {
				document.definition(identifier).map(|definition| definition.id) == Some(node.id)
			}
			_ => false,
		};

		if !winning {
			return changes;
		}

		for usage in document.usages().get(node.id) {
			let Some(usage) = document.node(*usage) else {
				continue;
			};

			match usage.kind {
				NodeKind::LinkReference { .. } => changes.extend(unlink(document, usage)),
				NodeKind::ImageReference { .. } => changes.extend(delete(document, usage)),
				_ => {}
			}
		}

		changes
	})
}

pub(crate) fn link_remove(document: &Document) -> Vec<Change> {
	each_node(document, LINKS, |node| unlink(document, node))
}

pub(crate) fn reference_remove_unused(document: &Document) -> Vec<Change> {
	each_node(document, &[NodeType::Definition], |node| {
		if document.usages().is_used(node.id) {
			Vec::new()
		} else {
			delete(document, node)
		}
	})
}

pub(crate) fn footnotes_remove_unused(document: &Document) -> Vec<Change> {
	each_node(document, &[NodeType::FootnoteDefinition], |node| {
		if document.usages().is_used(node.id) {
			Vec::new()
		} else {
			delete(document, node)
		}
	})
}

/// Remove footnote references and the definitions they use. Unused
/// definitions are left to [`footnotes_remove_unused`].
pub(crate) fn footnotes_remove(document: &Document) -> Vec<Change> {
	let types = [NodeType::FootnoteReference, NodeType::FootnoteDefinition];

	each_node(document, &types, |node| {
		match node.kind {
			NodeKind::FootnoteDefinition { .. } if !document.usages().is_used(node.id) => Vec::new(),
			_ => delete(document, node),
		}
	})
}

pub(crate) fn references_inline(document: &Document) -> Vec<Change> {
	let types = [
		NodeType::LinkReference,
		NodeType::ImageReference,
		NodeType::Definition,
	];

	each_node(document, &types, |node| {
		let identifier = match &node.kind {
			NodeKind::Definition { .. } => return delete(document, node),
			NodeKind::LinkReference { identifier, .. }
			| NodeKind::ImageReference { identifier, .. } => identifier,
			_ => return Vec::new(),
		};
		let Some(NodeKind::Definition { url, title, .. }) = document
			.definition(identifier)
			.map(|definition| &definition.kind)
		else {
			return Vec::new();
		};
		let Some(label) = links::label_span(document, node) else {
			return Vec::new();
		};
		let text = links::format_inline(&links::percent_decode(url), title.as_deref());
		let location = document.range_location(label.end + 1..node.span.end, node.depth);

		vec![(location, Some(text))]
	})
}
