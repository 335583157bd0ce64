use std::borrow::Borrow;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use markdown::ParseOptions;
use markdown::mdast;
use markdown::mdast::Node;
use markdown::to_mdast;
use serde::Deserialize;
use serde::Serialize;

use super::MdpipeError;
use super::MdpipeResult;
use crate::Editor;
use crate::LineTable;
use crate::Location;
use crate::Mutation;

/// Index of a node inside the [`Document`] arena. Stable for the lifetime of
/// the document.
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
	/// `[text]`
	Shortcut,
	/// `[text][]`
	Collapsed,
	/// `[text][label]`
	Full,
}

impl From<&mdast::ReferenceKind> for ReferenceKind {
	fn from(kind: &mdast::ReferenceKind) -> Self {
		match kind {
			mdast::ReferenceKind::Shortcut => Self::Shortcut,
			mdast::ReferenceKind::Collapsed => Self::Collapsed,
			mdast::ReferenceKind::Full => Self::Full,
		}
	}
}

/// The parts of a markdown node this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	Root,
	Blockquote,
	Link {
		url: String,
		title: Option<String>,
	},
	Image {
		url: String,
		title: Option<String>,
		alt: String,
	},
	LinkReference {
		identifier: String,
		kind: ReferenceKind,
	},
	ImageReference {
		identifier: String,
		kind: ReferenceKind,
		alt: String,
	},
	Definition {
		identifier: String,
		label: Option<String>,
		url: String,
		title: Option<String>,
	},
	FootnoteReference {
		identifier: String,
	},
	FootnoteDefinition {
		identifier: String,
	},
	Html {
		value: String,
	},
	Other,
}

/// Discriminant of [`NodeKind`] used to filter nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
	Root,
	Blockquote,
	Link,
	Image,
	LinkReference,
	ImageReference,
	Definition,
	FootnoteReference,
	FootnoteDefinition,
	Html,
	Other,
}

impl NodeKind {
	pub fn node_type(&self) -> NodeType {
		match self {
			Self::Root => NodeType::Root,
			Self::Blockquote => NodeType::Blockquote,
			Self::Link { .. } => NodeType::Link,
			Self::Image { .. } => NodeType::Image,
			Self::LinkReference { .. } => NodeType::LinkReference,
			Self::ImageReference { .. } => NodeType::ImageReference,
			Self::Definition { .. } => NodeType::Definition,
			Self::FootnoteReference { .. } => NodeType::FootnoteReference,
			Self::FootnoteDefinition { .. } => NodeType::FootnoteDefinition,
			Self::Html { .. } => NodeType::Html,
			Self::Other => NodeType::Other,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
	pub id: NodeId,
	pub parent: Option<NodeId>,
	pub children: Vec<NodeId>,
	/// Byte range in the (line ending normalized) source.
	pub span: Range<usize>,
	/// Number of enclosing blockquotes.
	pub depth: usize,
	pub kind: NodeKind,
}

impl NodeData {
	pub fn node_type(&self) -> NodeType {
		self.kind.node_type()
	}
}

/// A parsed markdown document.
///
/// The tree is flattened into an arena so nodes can be referenced by
/// [`NodeId`]. Documents are immutable: [`Document::mutate`] returns a new
/// document parsed from the mutated text.
pub struct Document {
	source: String,
	path: Option<PathBuf>,
	nodes: Vec<NodeData>,
	lines: LineTable,
	editor: Editor,
	usages: OnceCell<Usages>,
}

impl Document {
	pub fn parse(text: impl AsRef<str>, path: Option<PathBuf>) -> MdpipeResult<Self> {
		let source = text.as_ref().replace("\r\n", "\n");
		let options = ParseOptions::gfm();
		let mdast = to_mdast(&source, &options).map_err(|e| MdpipeError::Markdown(e.to_string()))?;
		let mut nodes = Vec::new();

		flatten(&mdast, None, 0, &mut nodes);

		Ok(Self {
			lines: LineTable::new(&source),
			editor: Editor::new(&source),
			path,
			nodes,
			source,
			usages: OnceCell::new(),
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn path(&self) -> Option<&Path> {
		self.path.as_deref()
	}

	pub fn editor(&self) -> &Editor {
		&self.editor
	}

	pub fn lines(&self) -> &LineTable {
		&self.lines
	}

	/// Whether the document has no content other than whitespace.
	pub fn is_empty(&self) -> bool {
		self.source.trim().is_empty()
	}

	/// All nodes in document order, the root first.
	pub fn nodes(&self) -> &[NodeData] {
		&self.nodes
	}

	pub fn node(&self, id: NodeId) -> Option<&NodeData> {
		self.nodes.get(id)
	}

	pub fn nodes_of<'a>(&'a self, types: &'a [NodeType]) -> impl Iterator<Item = &'a NodeData> {
		self.nodes
			.iter()
			.filter(move |node| types.contains(&node.node_type()))
	}

	/// Location of the whole node.
	pub fn location(&self, id: NodeId) -> Option<Location> {
		let node = self.nodes.get(id)?;

		Some(self.lines.location(node.span.clone(), node.depth))
	}

	/// Location of an arbitrary byte range, using `depth` blockquote markers
	/// as padding for continuation lines.
	pub fn range_location(&self, range: Range<usize>, depth: usize) -> Location {
		self.lines.location(range, depth)
	}

	pub fn text(&self, location: &Location) -> Option<String> {
		self.editor.text(location)
	}

	pub fn slice(&self, range: Range<usize>) -> &str {
		self.source.get(range).unwrap_or_default()
	}

	/// Every definition with the given identifier, in document order.
	pub fn definitions(&self, identifier: &str) -> Vec<&NodeData> {
		self.nodes
			.iter()
			.filter(|node| {
				matches!(&node.kind, NodeKind::Definition { identifier: id, .. } if id == identifier)
			})
			.collect()
	}

	/// The definition used to resolve references to `identifier`. The last one
	/// wins when the label is defined more than once.
	pub fn definition(&self, identifier: &str) -> Option<&NodeData> {
		self.definitions(identifier).pop()
	}

	/// Destination of a link, image or reference, resolving references through
	/// their definition.
	pub fn url(&self, id: NodeId) -> Option<&str> {
		match &self.nodes.get(id)?.kind {
			NodeKind::Link { url, .. }
			| NodeKind::Image { url, .. }
			| NodeKind::Definition { url, .. } => Some(url),
			NodeKind::LinkReference { identifier, .. } | NodeKind::ImageReference { identifier, .. } => {
				match &self.definition(identifier)?.kind {
					NodeKind::Definition { url, .. } => Some(url),
					_ => None,
				}
			}
			_ => None,
		}
	}

	pub fn usages(&self) -> &Usages {
		self.usages.get_or_init(|| Usages::build(&self.nodes))
	}

	/// Apply `mutations` one after another. Each mutation sees the output of
	/// the previous one.
	pub fn mutate<M: Borrow<Mutation>>(
		&self,
		mutations: impl IntoIterator<Item = M>,
	) -> MdpipeResult<Self> {
		let mut document = Self::parse(&self.source, self.path.clone())?;

		for mutation in mutations {
			let mutation = mutation.borrow();
			let changes = mutation.changes(&document);
			let path = match mutation {
				Mutation::Move(path) => Some(crate::paths::normalize(path)),
				_ => document.path.clone(),
			};

			tracing::trace!(mutation = mutation.name(), changes = changes.len(), "mutating document");

			if changes.is_empty() && path == document.path {
				continue;
			}

			let text = document.editor.mutate(changes).to_string();
			document = Self::parse(text, path)?;
		}

		Ok(document)
	}
}

impl fmt::Display for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

impl fmt::Debug for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("path", &self.path)
			.field("nodes", &self.nodes.len())
			.finish_non_exhaustive()
	}
}

/// Map from definition nodes to the nodes consuming them.
///
/// Duplicate definitions of the same label share one list of usages. Footnote
/// definitions are tracked the same way through footnote references.
#[derive(Debug, Clone, Default)]
pub struct Usages {
	table: Vec<Vec<NodeId>>,
}

impl Usages {
	fn build(nodes: &[NodeData]) -> Self {
		let mut references: HashMap<(bool, &str), Vec<NodeId>> = HashMap::new();

		for node in nodes {
			let key = match &node.kind {
				NodeKind::LinkReference { identifier, .. }
				| NodeKind::ImageReference { identifier, .. } => (false, identifier.as_str()),
				NodeKind::FootnoteReference { identifier } => (true, identifier.as_str()),
				_ => continue,
			};

			references.entry(key).or_default().push(node.id);
		}

		let mut table = vec![Vec::new(); nodes.len()];

		for node in nodes {
			let key = match &node.kind {
				NodeKind::Definition { identifier, .. } => (false, identifier.as_str()),
				NodeKind::FootnoteDefinition { identifier } => (true, identifier.as_str()),
				_ => continue,
			};

			if let Some(usages) = references.get(&key) {
				table[node.id].clone_from(usages);
			}
		}

		Self { table }
	}

	/// Nodes consuming the definition `id`. Empty for unused definitions and
	/// for nodes which are not definitions.
	pub fn get(&self, id: NodeId) -> &[NodeId] {
		self.table.get(id).map_or(&[], Vec::as_slice)
	}

	pub fn is_used(&self, id: NodeId) -> bool {
		!self.get(id).is_empty()
	}
}

fn flatten(node: &Node, parent: Option<NodeId>, depth: usize, nodes: &mut Vec<NodeData>) {
	let id = nodes.len();
	let span = node
		.position()
		.map_or(0..0, |position| position.start.offset..position.end.offset);
	let kind = match node {
		Node::Root(_) => NodeKind::Root,
		Node::Blockquote(_) => NodeKind::Blockquote,
		Node::Link(link) => {
			NodeKind::Link {
				url: link.url.clone(),
				title: link.title.clone(),
			}
		}
		Node::Image(image) => {
			NodeKind::Image {
				url: image.url.clone(),
				title: image.title.clone(),
				alt: image.alt.clone(),
			}
		}
		Node::LinkReference(reference) => {
			NodeKind::LinkReference {
				identifier: reference.identifier.clone(),
				kind: (&reference.reference_kind).into(),
			}
		}
		Node::ImageReference(reference) => {
			NodeKind::ImageReference {
				identifier: reference.identifier.clone(),
				kind: (&reference.reference_kind).into(),
				alt: reference.alt.clone(),
			}
		}
		Node::Definition(definition) => {
			NodeKind::Definition {
				identifier: definition.identifier.clone(),
				label: definition.label.clone(),
				url: definition.url.clone(),
				title: definition.title.clone(),
			}
		}
		Node::FootnoteReference(reference) => {
			NodeKind::FootnoteReference {
				identifier: reference.identifier.clone(),
			}
		}
		Node::FootnoteDefinition(definition) => {
			NodeKind::FootnoteDefinition {
				identifier: definition.identifier.clone(),
			}
		}
		Node::Html(html) => {
			NodeKind::Html {
				value: html.value.clone(),
			}
		}
		_ => NodeKind::Other,
	};

	nodes.push(NodeData {
		id,
		parent,
		children: Vec::new(),
		span,
		depth,
		kind,
	});

	if let Some(parent) = parent {
		nodes[parent].children.push(id);
	}

	let depth = if matches!(node, Node::Blockquote(_)) {
		depth + 1
	} else {
		depth
	};

	if let Some(children) = node.children() {
		for child in children {
			flatten(child, Some(id), depth, nodes);
		}
	}
}
