use std::fmt;
use std::path::PathBuf;

use crate::Change;
use crate::Document;
use crate::NodeData;
use crate::NodeType;
use crate::mutations;

/// Url rewrite used by [`Mutation::Relink`].
pub type RelinkFn = Box<dyn Fn(&str) -> String>;

/// Custom change producer used by [`Mutation::Custom`].
pub type MutationFn = Box<dyn Fn(&Document) -> Vec<Change>>;

/// A pure transformation of a [`Document`] into a set of changes.
///
/// Apply mutations with [`Document::mutate`].
pub enum Mutation {
	/// Change the path of the document and rewrite every relative link,
	/// image and definition so they still point to the same targets.
	Move(PathBuf),
	/// Rewrite every destination which is not a reference. Paths are resolved
	/// against the document directory before being passed to the callback.
	Relink(RelinkFn),
	/// Replace every link by its text. Images are kept.
	LinkRemove,
	/// Replace links with an empty destination by their text.
	LinkUnlinkEmpty,
	/// Replace links to the document itself by their text.
	LinkRemoveToSelf,
	/// Remove images with an empty destination or pointing to the document.
	ImageRemoveEmpty,
	/// Remove definitions with an empty destination together with their
	/// usages.
	ReferenceRemoveEmpty,
	/// Remove definitions nothing refers to.
	ReferenceRemoveUnused,
	/// Remove footnote references together with the definitions they use.
	FootnotesRemove,
	/// Remove footnote definitions nothing refers to.
	FootnotesRemoveUnused,
	/// Turn reference links and images into inline ones and remove the
	/// definitions.
	ReferencesInline,
	/// Unlink empty links, remove empty images, unused definitions and unused
	/// footnotes in one pass.
	Cleanup,
	/// Apply a fixed set of changes.
	Changes(Vec<Change>),
	Custom(MutationFn),
}

impl Mutation {
	pub fn relink(callback: impl Fn(&str) -> String + 'static) -> Self {
		Self::Relink(Box::new(callback))
	}

	pub fn custom(callback: impl Fn(&Document) -> Vec<Change> + 'static) -> Self {
		Self::Custom(Box::new(callback))
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Move(_) => "move",
			Self::Relink(_) => "relink",
			Self::LinkRemove => "link-remove",
			Self::LinkUnlinkEmpty => "link-unlink-empty",
			Self::LinkRemoveToSelf => "link-remove-to-self",
			Self::ImageRemoveEmpty => "image-remove-empty",
			Self::ReferenceRemoveEmpty => "reference-remove-empty",
			Self::ReferenceRemoveUnused => "reference-remove-unused",
			Self::FootnotesRemove => "footnotes-remove",
			Self::FootnotesRemoveUnused => "footnotes-remove-unused",
			Self::ReferencesInline => "references-inline",
			Self::Cleanup => "cleanup",
			Self::Changes(_) => "changes",
			Self::Custom(_) => "custom",
		}
	}

	/// Changes this mutation makes to `document`.
	pub fn changes(&self, document: &Document) -> Vec<Change> {
		match self {
			Self::Move(path) => mutations::move_to(document, path),
			Self::Relink(callback) => mutations::relink(document, callback.as_ref()),
			Self::LinkRemove => mutations::link_remove(document),
			Self::LinkUnlinkEmpty => mutations::link_unlink_empty(document),
			Self::LinkRemoveToSelf => mutations::link_remove_to_self(document),
			Self::ImageRemoveEmpty => mutations::image_remove_empty(document),
			Self::ReferenceRemoveEmpty => mutations::reference_remove_empty(document),
			Self::ReferenceRemoveUnused => mutations::reference_remove_unused(document),
			Self::FootnotesRemove => mutations::footnotes_remove(document),
			Self::FootnotesRemoveUnused => mutations::footnotes_remove_unused(document),
			Self::ReferencesInline => mutations::references_inline(document),
			Self::Cleanup => {
				let mut changes = mutations::link_unlink_empty(document);
				changes.extend(mutations::image_remove_empty(document));
				changes.extend(mutations::reference_remove_unused(document));
				changes.extend(mutations::footnotes_remove_unused(document));
				changes
			}
			Self::Changes(changes) => changes.clone(),
			Self::Custom(callback) => callback(document),
		}
	}
}

impl fmt::Debug for Mutation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Move(path) => f.debug_tuple("Move").field(path).finish(),
			Self::Changes(changes) => f.debug_tuple("Changes").field(changes).finish(),
			other => f.write_str(other.name()),
		}
	}
}

/// Collect the changes `callback` produces for every node of the given
/// types, in document order.
pub fn each_node(
	document: &Document,
	types: &[NodeType],
	mut callback: impl FnMut(&NodeData) -> Vec<Change>,
) -> Vec<Change> {
	document
		.nodes_of(types)
		.flat_map(|node| callback(node))
		.collect()
}
