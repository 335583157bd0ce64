use super::MdpipeError;
use super::MdpipeResult;
use crate::Document;
use crate::File;

/// Derives a value from the content of a [`File`].
///
/// Values are memoized per file with [`File::metadata`] and recomputed once
/// the content changes.
pub trait MetadataResolver: 'static {
	type Value: 'static;

	fn resolve(file: &File) -> MdpipeResult<Self::Value>;
}

/// The parsed markdown [`Document`] of a file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl MetadataResolver for Markdown {
	type Value = Document;

	fn resolve(file: &File) -> MdpipeResult<Self::Value> {
		Document::parse(file.content()?, Some(file.path().to_path_buf()))
	}
}

/// The content of a file parsed as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl MetadataResolver for Json {
	type Value = serde_json::Value;

	fn resolve(file: &File) -> MdpipeResult<Self::Value> {
		serde_json::from_str(&file.content()?).map_err(|e| {
			MdpipeError::InvalidJson {
				file: file.path().to_path_buf(),
				reason: e.to_string(),
			}
		})
	}
}
