use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::preprocess::Preprocess;

fn change(coordinates: Vec<Coordinate>, text: Option<&str>) -> Change {
	(Location::new(coordinates), text.map(ToString::to_string))
}

// --- Editor tests ---

#[test]
fn editor_overlapping_changes_last_declared_wins() {
	let editor = Editor::new("abcdef");
	let result = editor.mutate([
		change(vec![Coordinate::new(0, 1, Some(2))], Some("X")),
		change(vec![Coordinate::new(0, 0, Some(3))], Some("Y")),
	]);

	assert_eq!(result.to_string(), "Ydef");
}

#[test]
fn editor_last_coordinate_absorbs_extra_fragments() {
	let editor = Editor::new("ab\ncd");
	let result = editor.mutate([change(
		vec![Coordinate::new(0, 1, None), Coordinate::new(1, 0, Some(1))],
		Some("1\n2\n3"),
	)]);

	assert_eq!(result.to_string(), "a1\n2\n3d");
}

#[rstest]
#[case::whole_line(Coordinate::new(1, 0, None), "a\nb")]
#[case::line_tail(Coordinate::new(1, 6, None), "a\nremove\nb")]
#[case::line_head(Coordinate::new(1, 0, Some(7)), "a\nme\nb")]
fn editor_deletion(#[case] coordinate: Coordinate, #[case] expected: &str) {
	let editor = Editor::new("a\nremove me\nb");
	let result = editor.mutate([change(vec![coordinate], None)]);

	assert_eq!(result.to_string(), expected);
}

#[test]
fn editor_deletion_keeps_padding_of_other_content() {
	let editor = Editor::new("> quoted [link](x)");
	let result = editor.mutate([change(vec![Coordinate::new(0, 9, None).with_padding(2)], None)]);

	assert_eq!(result.to_string(), "> quoted");
}

#[test]
fn editor_multiline_replacement_reuses_padding() {
	let editor = Editor::new("> a X b");
	let result = editor.mutate([change(
		vec![Coordinate::new(0, 4, Some(1)).with_padding(2)],
		Some("one\ntwo"),
	)]);

	assert_eq!(result.to_string(), "> a one\n> two b");
}

#[test]
fn editor_appends_in_declaration_order() {
	let editor = Editor::new("a\nb");
	let result = editor.mutate([
		(Location::append(), Some("c".to_string())),
		(Location::append(), Some("d\ne".to_string())),
	]);

	assert_eq!(result.to_string(), "a\nb\nc\nd\ne");
}

#[test]
fn editor_non_overlapping_changes_are_reversible() {
	let editor = Editor::new("alpha beta\ngamma delta");
	let forward = [
		change(vec![Coordinate::new(0, 0, Some(5))], Some("A")),
		change(vec![Coordinate::new(0, 6, Some(4))], Some("B")),
		change(vec![Coordinate::new(1, 6, Some(5))], Some("D")),
	];
	let result = editor.mutate(forward.clone());
	let reversed = editor.mutate(forward.into_iter().rev());

	assert_eq!(result.to_string(), "A B\ngamma D");
	assert_eq!(reversed.to_string(), result.to_string());

	let restored = result.mutate([
		change(vec![Coordinate::new(0, 0, Some(1))], Some("alpha")),
		change(vec![Coordinate::new(0, 2, Some(1))], Some("beta")),
		change(vec![Coordinate::new(1, 6, Some(1))], Some("delta")),
	]);

	assert_eq!(restored.to_string(), "alpha beta\ngamma delta");
}

#[test]
fn editor_insertion_on_missing_line_extends_text() {
	let editor = Editor::new("a");
	let result = editor.mutate([change(vec![Coordinate::new(2, 0, None)], Some("c"))]);

	assert_eq!(result.to_string(), "a\n\nc");
}

#[test]
fn editor_deletion_on_missing_line_is_ignored() {
	let editor = Editor::new("a");
	let result = editor.mutate([change(vec![Coordinate::new(4, 0, None)], None)]);

	assert_eq!(result.to_string(), "a");
}

#[test]
fn editor_is_not_modified_by_mutate() {
	let editor = Editor::new("one\ntwo");
	let _ = editor.mutate([change(vec![Coordinate::new(0, 0, None)], Some("1"))]);

	assert_eq!(editor.lines().to_vec(), vec!["one".to_string(), "two".to_string()]);
}

#[test]
fn editor_text_of_location() {
	let editor = Editor::new("hello world\nsecond line");
	let location = Location::new([Coordinate::new(0, 6, None), Coordinate::new(1, 0, Some(6))]);

	assert_eq!(editor.text(&location).as_deref(), Some("world\nsecond"));
	assert_eq!(editor.text(&Location::from(Coordinate::new(5, 0, None))), None);
}

#[test]
fn editor_keeps_crlf_line_endings() {
	let editor = Editor::new("a\r\nb");
	let result = editor.mutate([change(vec![Coordinate::new(1, 0, None)], Some("c"))]);

	assert_eq!(result.to_string(), "a\r\nc");
}

#[test]
fn line_table_location_skips_blockquote_markers() {
	let lines = LineTable::new("> a\n> b\nc");
	let location = lines.location(2..7, 1);

	assert_eq!(
		location.to_vec(),
		vec![
			Coordinate::new(0, 2, None).with_padding(2),
			Coordinate::new(1, 2, Some(1)).with_padding(2),
		]
	);
}

// --- Link helper tests ---

#[rstest]
#[case::dot_relative("./x.md", true)]
#[case::plain("x.md", true)]
#[case::fragment("#frag", true)]
#[case::absolute("/abs/x.md", false)]
#[case::url("https://example.com", false)]
#[case::protocol_relative("//cdn.example.com/x", false)]
#[case::mailto("mailto:user@example.com", false)]
fn link_is_relative(#[case] url: &str, #[case] expected: bool) {
	assert_eq!(links::is_relative(url), expected);
}

#[rstest]
#[case::blank("", true)]
#[case::hash("#", true)]
#[case::self_link("./a.md", true)]
#[case::self_fragment("./a.md#x", false)]
#[case::other("./b.md", false)]
#[case::query("a.md?x=1", false)]
fn link_is_empty(#[case] url: &str, #[case] expected: bool) {
	assert_eq!(links::is_empty(Some(Path::new("/docs/a.md")), url), expected);
}

#[rstest]
#[case::plain("x.md", false, "x.md")]
#[case::wrapped("x.md", true, "<x.md>")]
#[case::whitespace("a b.md", false, "<a b.md>")]
#[case::unbalanced("a(b.md", false, "<a(b.md>")]
fn link_format_target(#[case] target: &str, #[case] wrap: bool, #[case] expected: &str) {
	assert_eq!(links::format_target(target, wrap), expected);
}

#[rstest]
#[case::double("title", "\"title\"")]
#[case::single("say \"hi\"", "'say \"hi\"'")]
#[case::parens("it's \"x\"", "(it's \"x\")")]
fn link_format_title(#[case] title: &str, #[case] expected: &str) {
	assert_eq!(links::format_title(title), expected);
}

#[test]
fn link_percent_decode() {
	assert_eq!(links::percent_decode("a%20b%2Fc%zz"), "a b/c%zz");
}

#[test]
fn paths_are_normalized_lexically() {
	assert_eq!(paths::normalize("/a/./b/../c"), PathBuf::from("/a/c"));
	assert_eq!(paths::relative("/a/b", "/a/c/d.md"), PathBuf::from("../c/d.md"));
	assert!(paths::is_inside("/a", "/a/b/../c.md"));
	assert!(!paths::is_inside("/a/b", "/a/c.md"));
}

// --- Document tests ---

#[test]
fn document_definition_last_wins() -> MdpipeResult<()> {
	let document = Document::parse("[a]\n\n[a]: ./first.md\n[a]: ./second.md\n", None)?;
	let reference = document
		.nodes_of(&[NodeType::LinkReference])
		.next()
		.map(|node| node.id)
		.unwrap_or_else(|| panic!("reference missing"));

	assert_eq!(document.url(reference), Some("./second.md"));

	Ok(())
}

#[test]
fn document_usages_are_shared_by_duplicate_definitions() -> MdpipeResult<()> {
	let document = Document::parse("[a] [a][]\n\n[a]: ./x.md\n[a]: ./y.md\n[b]: ./z.md\n", None)?;
	let definitions: Vec<_> = document
		.nodes_of(&[NodeType::Definition])
		.map(|node| node.id)
		.collect();

	assert_eq!(definitions.len(), 3);
	assert_eq!(document.usages().get(definitions[0]).len(), 2);
	assert_eq!(document.usages().get(definitions[1]).len(), 2);
	assert!(!document.usages().is_used(definitions[2]));

	Ok(())
}

#[test]
fn document_normalizes_line_endings() -> MdpipeResult<()> {
	let document = Document::parse("# Title\r\n\r\ntext\r\n", None)?;

	assert_eq!(document.source(), "# Title\n\ntext\n");

	Ok(())
}

#[test]
fn mutation_move_round_trip() -> MdpipeResult<()> {
	let document = Document::parse(
		"See [x](./x.md), [y](../y.md#top) and [me](./a.md#x).",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let moved = document.mutate([Mutation::Move(PathBuf::from("/docs/sub/b.md"))])?;

	assert_eq!(
		moved.source(),
		"See [x](../x.md), [y](../../y.md#top) and [me](#x)."
	);
	assert_eq!(moved.path(), Some(Path::new("/docs/sub/b.md")));

	let back = moved.mutate([Mutation::Move(PathBuf::from("/docs/a.md"))])?;

	assert_eq!(back.source(), "See [x](x.md), [y](../y.md#top) and [me](#x).");

	Ok(())
}

#[test]
fn mutation_move_keeps_angle_brackets() -> MdpipeResult<()> {
	let document = Document::parse(
		"[x](<./x.md>)\n\n[ref]: <./r.md>\n",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let moved = document.mutate([Mutation::Move(PathBuf::from("/docs/sub/b.md"))])?;

	assert_eq!(moved.source(), "[x](<../x.md>)\n\n[ref]: <../r.md>\n");

	Ok(())
}

#[rstest]
#[case::same_directory("/docs/b.md", "[dir](./) and [up](../)")]
#[case::nested_directory("/docs/sub/b.md", "[dir](../) and [up](../../)")]
fn mutation_move_keeps_directory_links(#[case] to: &str, #[case] expected: &str) -> MdpipeResult<()> {
	let document = Document::parse("[dir](./) and [up](../)", Some(PathBuf::from("/docs/a.md")))?;
	let moved = document.mutate([Mutation::Move(PathBuf::from(to))])?;

	assert_eq!(moved.source(), expected);

	Ok(())
}

#[test]
fn mutation_relink_receives_resolved_paths() -> MdpipeResult<()> {
	let document = Document::parse(
		"[a](./x.md) [b](https://example.com)",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let relinked = document.mutate([Mutation::relink(|url| url.replace(".md", ".html"))])?;

	assert_eq!(relinked.source(), "[a](/docs/x.html) [b](https://example.com)");

	Ok(())
}

#[test]
fn mutation_link_unlink_empty() -> MdpipeResult<()> {
	let document = Document::parse(
		"A [link]() and [b](#) and [c](./a.md) but [d](./a.md#x).",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let result = document.mutate([Mutation::LinkUnlinkEmpty])?;

	assert_eq!(result.source(), "A link and b and c but [d](./a.md#x).");

	Ok(())
}

#[test]
fn mutation_link_remove_keeps_images() -> MdpipeResult<()> {
	let document = Document::parse(
		"Text [link](https://example.com) and [`code`][link] and ![image](#x).\n\n> Quote [self](#f) text\n\n[link]: ./file.md\n",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let result = document.mutate([Mutation::LinkRemove])?;

	assert_eq!(
		result.source(),
		"Text link and `code` and ![image](#x).\n\n> Quote self text\n\n[link]: ./file.md\n"
	);

	Ok(())
}

#[test]
fn mutation_link_remove_to_self() -> MdpipeResult<()> {
	let document = Document::parse(
		"[top](#top) [other](./b.md) [self](./a.md#x)",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let result = document.mutate([Mutation::LinkRemoveToSelf])?;

	assert_eq!(result.source(), "top [other](./b.md) self");

	Ok(())
}

#[test]
fn mutation_image_remove_empty_leaves_surrounding_text() -> MdpipeResult<()> {
	let document = Document::parse("Text ![img]() end", None)?;
	let result = document.mutate([Mutation::ImageRemoveEmpty])?;

	assert_eq!(result.source(), "Text  end");

	Ok(())
}

#[test]
fn mutation_reference_remove_empty_cascades_to_usages() -> MdpipeResult<()> {
	let document = Document::parse("[a] and ![b]\n\n[a]: #\n[b]: #\n", None)?;
	let result = document.mutate([Mutation::ReferenceRemoveEmpty])?;

	assert_eq!(result.source(), "a and\n\n");

	Ok(())
}

#[test]
fn mutation_reference_remove_empty_ignores_shadowed_duplicates() -> MdpipeResult<()> {
	let document = Document::parse(
		"See [a][x].\n\n[x]: #\n[x]: ./b.md\n",
		Some(PathBuf::from("/docs/a.md")),
	)?;
	let result = document.mutate([Mutation::ReferenceRemoveEmpty])?;

	assert_eq!(result.source(), "See [a][x].\n\n[x]: ./b.md\n");

	Ok(())
}

#[test]
fn mutation_reference_remove_unused() -> MdpipeResult<()> {
	let document = Document::parse("Text [used].\n\n[used]: ./a.md\n[unused]: ./b.md\n", None)?;
	let result = document.mutate([Mutation::ReferenceRemoveUnused])?;

	assert_eq!(result.source(), "Text [used].\n\n[used]: ./a.md\n");

	Ok(())
}

#[test]
fn mutation_footnotes_remove_unused() -> MdpipeResult<()> {
	let document = Document::parse("Text[^1].\n\n[^1]: Used.\n\n[^2]: Unused.\n", None)?;
	let result = document.mutate([Mutation::FootnotesRemoveUnused])?;

	assert!(result.source().contains("[^1]: Used."));
	assert!(!result.source().contains("[^2]"));

	Ok(())
}

#[test]
fn mutation_footnotes_remove() -> MdpipeResult<()> {
	let document = Document::parse(
		"# Header[^1]\n\nText[^2] and [^1] text [^3].\n\n[^1]: footnote 1\n\n[^2]: footnote 2\n\n[^4]: footnote 4\n",
		None,
	)?;
	let result = document.mutate([Mutation::FootnotesRemove])?;

	assert_eq!(
		result.source(),
		"# Header\n\nText and  text [^3].\n\n\n\n[^4]: footnote 4\n"
	);

	Ok(())
}

#[test]
fn mutation_references_inline() -> MdpipeResult<()> {
	let document = Document::parse(
		"See [a][ref] and [ref].\n\n[ref]: ./x.md \"Title\"\n",
		None,
	)?;
	let result = document.mutate([Mutation::ReferencesInline])?;

	assert_eq!(
		result.source(),
		"See [a](./x.md \"Title\") and [ref](./x.md \"Title\").\n\n"
	);

	Ok(())
}

#[test]
fn mutation_cleanup() -> MdpipeResult<()> {
	let document = Document::parse(
		"An [empty]() link, ![gone]() image and [kept](./k.md).\n\n[unused]: ./u.md\n",
		None,
	)?;
	let result = document.mutate([Mutation::Cleanup])?;
	let source = result.source();

	assert!(source.starts_with("An empty link,  image and [kept](./k.md)."));
	assert!(!source.contains("[unused]"));

	Ok(())
}

#[test]
fn mutation_changes_and_custom() -> MdpipeResult<()> {
	let document = Document::parse("one\ntwo\n", None)?;
	let result = document.mutate([
		Mutation::Changes(vec![change(vec![Coordinate::new(0, 0, None)], Some("1"))]),
		Mutation::custom(|document| {
			vec![change(
				vec![Coordinate::new(1, 0, None)],
				Some(&document.source().lines().next().unwrap_or_default().repeat(2)),
			)]
		}),
	])?;

	assert_eq!(result.source(), "1\n11\n");

	Ok(())
}

// --- File system tests ---

#[test]
fn file_metadata_is_invalidated_by_writes() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "# Old\n")]);
	let fs = FileSystem::new(tmp.path(), None)?;
	let file = fs.file("a.md").unwrap_or_else(|| panic!("file missing"));
	let first = file.metadata::<Markdown>()?;
	let cached = file.metadata::<Markdown>()?;

	assert!(Rc::ptr_eq(&first, &cached));

	fs.write(&file, "# New\n")?;

	let updated = file.metadata::<Markdown>()?;

	assert_eq!(updated.source(), "# New\n");
	assert_eq!(read(tmp.path(), "a.md"), "# New\n");
	assert_eq!(file.version(), 1);

	Ok(())
}

#[test]
fn file_json_metadata() -> MdpipeResult<()> {
	let tmp = tree(&[("data.json", r#"{"name": "mdpipe"}"#), ("broken.json", "{")]);
	let fs = FileSystem::new(tmp.path(), None)?;
	let data = fs.file("data.json").unwrap_or_else(|| panic!("file missing"));
	let broken = fs.file("broken.json").unwrap_or_else(|| panic!("file missing"));

	assert_eq!(data.metadata::<Json>()?["name"], "mdpipe");
	assert!(matches!(
		broken.metadata::<Json>(),
		Err(MdpipeError::InvalidJson { .. })
	));

	Ok(())
}

#[test]
fn file_system_returns_the_same_instance() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "")]);
	let fs = FileSystem::new(tmp.path(), None)?;
	let first = fs.file("a.md").unwrap_or_else(|| panic!("file missing"));
	let second = fs
		.file("./sub/../a.md")
		.unwrap_or_else(|| panic!("file missing"));

	assert!(Rc::ptr_eq(&first, &second));
	assert!(fs.file("missing.md").is_none());

	Ok(())
}

#[test]
fn file_system_rollback_restores_content() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "before\n")]);
	let fs = FileSystem::new(tmp.path(), None)?;
	let file = fs.file("a.md").unwrap_or_else(|| panic!("file missing"));

	fs.begin();
	fs.write(&file, "after\n")?;

	assert_eq!(file.content()?, "after\n");

	fs.rollback()?;

	assert_eq!(file.content()?, "before\n");
	assert_eq!(read(tmp.path(), "a.md"), "before\n");
	assert!(fs.changes().is_empty());

	Ok(())
}

#[test]
fn file_system_write_outside_output_fails() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", ""), ("out/b.md", "")]);
	let fs = FileSystem::new(tmp.path(), Some(Path::new("out")))?;
	let file = fs.file("a.md").unwrap_or_else(|| panic!("file missing"));

	assert!(matches!(
		fs.write(&file, "changed"),
		Err(MdpipeError::WriteOutsideOutput { .. })
	));

	Ok(())
}

#[test]
fn file_system_walk_skips_ignored_entries() -> MdpipeResult<()> {
	let tmp = tree(&[
		(".gitignore", "ignored.md\n"),
		("a.md", ""),
		("ignored.md", ""),
		("nested/b.md", ""),
		("nested/deeper/c.md", ""),
		("node_modules/d.md", ""),
		(".hidden/e.md", ""),
		("f.txt", ""),
	]);
	let fs = FileSystem::new(tmp.path(), None)?;
	let root = fs.directory(".").unwrap_or_else(|| panic!("directory missing"));
	let names = |files: Vec<Rc<File>>| {
		files
			.iter()
			.map(|file| fs.pathname(file.path()))
			.collect::<Vec<_>>()
	};

	assert_eq!(
		names(fs.files(&root, &Filter::include(["*.md"]))?),
		vec!["a.md", "nested/b.md", "nested/deeper/c.md"]
	);
	assert_eq!(
		names(fs.files(&root, &Filter::include(["*.md"]).with_depth(Some(1)))?),
		vec!["a.md", "nested/b.md"]
	);
	assert_eq!(
		names(fs.files(&root, &Filter::include(["*.md"]).with_exclude(["nested/"]))?),
		vec!["a.md"]
	);

	Ok(())
}

#[cfg(unix)]
#[test]
fn file_system_walk_detects_symlink_cycles() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", ""), ("sub/b.md", "")]);

	std::os::unix::fs::symlink(tmp.path(), tmp.path().join("sub/loop"))?;

	let fs = FileSystem::new(tmp.path(), None)?;
	let root = fs.directory(".").unwrap_or_else(|| panic!("directory missing"));
	let result = fs.files(&root, &Filter::include(["*.md"]));
	let Err(MdpipeError::SymlinkCycle { path }) = result else {
		panic!("expected symlink cycle, got {result:?}");
	};

	assert!(path.ends_with("sub/loop"));

	Ok(())
}

#[test]
#[traced_test]
fn file_system_warns_about_invalid_gitignore() -> MdpipeResult<()> {
	let tmp = tree(&[(".gitignore", "[\nignored.md\n"), ("a.md", ""), ("ignored.md", "")]);
	let fs = FileSystem::new(tmp.path(), None)?;
	let root = fs.directory(".").unwrap_or_else(|| panic!("directory missing"));
	let names = fs
		.files(&root, &Filter::include(["*.md"]))?
		.iter()
		.map(|file| fs.pathname(file.path()))
		.collect::<Vec<_>>();

	assert_eq!(names, vec!["a.md"]);
	assert!(logs_contain("invalid .gitignore entry"));

	Ok(())
}

// --- Task registry tests ---

#[test]
fn tasks_are_ordered_by_priority() {
	let task = |name: &str, targets: Vec<Target>| FnTask::new(name, targets, |_, _| Ok(true));
	let mut tasks = Tasks::new();

	tasks.add(task("a", vec![Target::extension("md")]), None);
	tasks.add(task("b", vec![Target::extension("md")]), Some(10));
	tasks.add(task("c", vec![Target::Any]), None);
	tasks.add(task("d", vec![Target::Each]), Some(100));
	tasks.add(task("e", vec![Target::extension("txt")]), None);

	let names: Vec<String> = tasks
		.get(Some("md"))
		.iter()
		.map(|task| task.name().to_string())
		.collect();

	assert_eq!(names, vec!["b", "a", "c", "d"]);
	assert_eq!(tasks.extensions(), vec!["md", "txt"]);
	assert!(tasks.has_wildcard());
	assert!(tasks.has(Some("json")));
}

// --- Processor tests ---

#[test]
fn processor_processes_each_file_once() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "b.md\n"), ("b.md", ""), ("c.md", "b.md\n")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(linking_task(&log), None);
	processor.run(tmp.path(), None)?;

	assert_eq!(entries(&log), vec!["a.md", "b.md", "c.md"]);

	Ok(())
}

#[test]
fn processor_detects_circular_dependencies() {
	let tmp = tree(&[("a.md", "b.md\n"), ("b.md", "a.md\n")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(linking_task(&log), None);

	let result = processor.run(tmp.path(), None);
	let Err(MdpipeError::DependencyCircularDependency { file, stack }) = result else {
		panic!("expected a circular dependency, got {result:?}");
	};

	assert!(file.ends_with("a.md"));
	assert_eq!(stack.len(), 2);
}

#[test]
fn processor_allows_cycles_outside_output() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "b.md\n"), ("b.md", "a.md\n"), ("out/.keep", "")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(linking_task(&log), None);
	processor.run(tmp.path(), Some(Path::new("out")))?;

	assert_eq!(entries(&log), vec!["a.md", "b.md"]);

	Ok(())
}

#[test]
fn processor_reports_missing_dependencies() {
	let tmp = tree(&[("a.md", "missing.md\n")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(linking_task(&log), None);

	let result = processor.run(tmp.path(), None);

	assert!(
		matches!(result, Err(MdpipeError::DependencyUnresolvable { .. })),
		"{result:?}"
	);
}

#[test]
fn processor_optional_dependency_resolves_to_none() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "")]);
	let log = log();
	let sink = Rc::clone(&log);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("optional", vec![Target::extension("md")], move |resolver, _| {
			let missing = resolver.resolve(&Optional(FileReference::new("missing.md")))?;
			sink.borrow_mut().push(format!("{}", missing.is_none()));
			Ok(true)
		}),
		None,
	);
	processor.run(tmp.path(), None)?;

	assert_eq!(entries(&log), vec!["true"]);

	Ok(())
}

#[test]
fn processor_wraps_task_errors() {
	let tmp = tree(&[("a.md", "")]);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("broken", vec![Target::extension("md")], |_, _| {
			Err(MdpipeError::Markdown("boom".to_string()))
		}),
		None,
	);

	let result = processor.run(tmp.path(), None);
	let Err(MdpipeError::TaskFailed { task, source, .. }) = result else {
		panic!("expected a task failure, got {result:?}");
	};

	assert_eq!(task, "broken");
	assert!(matches!(source.as_deref(), Some(MdpipeError::Markdown(_))));
}

#[test]
fn processor_fails_tasks_without_success() {
	let tmp = tree(&[("a.md", "")]);
	let mut processor = Processor::new();

	processor.add_task(FnTask::new("unfinished", vec![Target::extension("md")], |_, _| Ok(false)), None);

	let result = processor.run(tmp.path(), None);

	assert!(
		matches!(result, Err(MdpipeError::TaskFailed { ref task, source: None, .. }) if task == "unfinished"),
		"{result:?}"
	);
}

#[test]
fn processor_reraises_swallowed_dependency_failures() {
	let tmp = tree(&[("a.md", ""), ("b.md", "")]);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("swallow", vec![Target::extension("md")], |resolver, file| {
			if file.name() == "b.md" {
				return Ok(false);
			}

			let _ = resolver.resolve(&FileReference::new("b.md"));
			Ok(true)
		}),
		None,
	);

	let result = processor.run(tmp.path(), None);
	let Err(MdpipeError::TaskFailed { file, .. }) = result else {
		panic!("expected a task failure, got {result:?}");
	};

	assert!(file.ends_with("b.md"));
}

#[test]
fn processor_skips_excluded_files() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "b.md\n"), ("b.md", "")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(linking_task(&log), None).exclude(["b.md"]);
	processor.run(tmp.path(), None)?;

	assert_eq!(entries(&log), vec!["a.md"]);

	Ok(())
}

#[test]
fn processor_processes_a_single_file() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", ""), ("b.md", "")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(recording_task(&log), None);
	processor.run(&tmp.path().join("b.md"), None)?;

	assert_eq!(entries(&log), vec!["b.md"]);

	Ok(())
}

#[test]
fn processor_excludes_nested_output() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", ""), ("out/b.md", "")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(recording_task(&log), None);
	processor.run(tmp.path(), Some(Path::new("out")))?;

	assert_eq!(entries(&log), vec!["a.md"]);

	Ok(())
}

#[test]
fn processor_visits_queued_files_last() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", ""), ("b.md", ""), ("sub/c.md", "")]);
	let log = log();
	let sink = Rc::clone(&log);
	let mut processor = Processor::new();

	processor
		.add_task(
			FnTask::new("queue", vec![Target::extension("md")], move |resolver, file| {
				sink.borrow_mut().push(resolver.fs().pathname(file.path()));

				if file.name() == "a.md" {
					resolver.queue(&FileReference::new("sub/c.md"))?;
				}

				Ok(true)
			}),
			None,
		)
		.max_depth(Some(0));
	processor.run(tmp.path(), None)?;

	assert_eq!(entries(&log), vec!["a.md", "b.md", "sub/c.md"]);

	Ok(())
}

#[test]
fn processor_iterates_dependencies_lazily() -> MdpipeResult<()> {
	let tmp = tree(&[("index.md", ""), ("pages/x.md", ""), ("pages/y.md", "")]);
	let log = log();
	let sink = Rc::clone(&log);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("index", vec![Target::extension("md")], move |resolver, file| {
			sink.borrow_mut().push(resolver.fs().pathname(file.path()));

			if file.name() == "index.md" {
				let pages = FileIterator::new("pages", Filter::include(["*.md"]));
				for entry in resolver.iterate(&pages)? {
					let entry = entry?;
					let name = entry.path().file_name().unwrap_or_default().to_string_lossy();

					sink.borrow_mut().push(format!("after {name}"));
				}
			}

			Ok(true)
		}),
		None,
	);
	processor.run(tmp.path(), None)?;

	assert_eq!(
		entries(&log),
		vec!["index.md", "pages/x.md", "after x.md", "pages/y.md", "after y.md"]
	);

	Ok(())
}

#[test]
fn processor_writes_changes() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "hello\n")]);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("upper", vec![Target::extension("md")], |resolver, file| {
			resolver.write(file, file.content()?.to_uppercase())?;
			Ok(true)
		}),
		None,
	);

	let changes = processor.run(tmp.path(), None)?;

	assert_eq!(changes.len(), 1);
	assert_eq!(changes[0].original, "hello\n");
	assert_eq!(changes[0].content, "HELLO\n");
	assert_eq!(read(tmp.path(), "a.md"), "HELLO\n");

	Ok(())
}

#[test]
fn processor_dry_run_does_not_write() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "hello\n")]);
	let mut processor = Processor::new();

	processor
		.add_task(
			FnTask::new("upper", vec![Target::extension("md")], |resolver, file| {
				resolver.write(file, file.content()?.to_uppercase())?;
				Ok(true)
			}),
			None,
		)
		.dry_run(true);

	let changes = processor.run(tmp.path(), None)?;

	assert_eq!(changes.len(), 1);
	assert_eq!(changes[0].content, "HELLO\n");
	assert_eq!(read(tmp.path(), "a.md"), "hello\n");

	Ok(())
}

#[test]
fn processor_rolls_back_failed_files() {
	let tmp = tree(&[("a.md", "hello\n")]);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("partial", vec![Target::extension("md")], |resolver, file| {
			resolver.write(file, "changed\n")?;
			Ok(false)
		}),
		None,
	);

	assert!(processor.run(tmp.path(), None).is_err());
	assert_eq!(read(tmp.path(), "a.md"), "hello\n");
}

#[test]
fn processor_rejects_writes_outside_output() {
	let tmp = tree(&[("a.md", "hello\n"), ("out/.keep", "")]);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("outside", vec![Target::extension("md")], |resolver, file| {
			resolver.write(file, "changed\n")?;
			Ok(true)
		}),
		None,
	);

	let result = processor.run(tmp.path(), Some(Path::new("out")));
	let Err(MdpipeError::TaskFailed { source, .. }) = result else {
		panic!("expected a task failure, got {result:?}");
	};

	assert!(matches!(
		source.as_deref(),
		Some(MdpipeError::WriteOutsideOutput { .. })
	));
}

#[test]
fn processor_before_hook_cannot_resolve_unprocessed_files() {
	let tmp = tree(&[("a.md", "")]);
	let mut processor = Processor::new();

	processor.add_task(
		FnTask::new("before", vec![Target::Before], |resolver, _| {
			resolver.resolve(&FileReference::new("a.md"))?;
			Ok(true)
		}),
		None,
	);

	let result = processor.run(tmp.path(), None);

	assert!(
		matches!(result, Err(MdpipeError::DependencyUnavailable { .. })),
		"{result:?}"
	);
}

#[test]
fn processor_runs_after_hook_last() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "")]);
	let log = log();
	let sink = Rc::clone(&log);
	let mut processor = Processor::new();

	processor.add_task(recording_task(&log), None).add_task(
		FnTask::new("after", vec![Target::After], move |resolver, file| {
			resolver.resolve(&FileReference::new("a.md"))?;
			sink.borrow_mut().push(file.name().to_string());
			Ok(true)
		}),
		None,
	);
	processor.run(tmp.path(), None)?;

	assert_eq!(entries(&log), vec!["a.md", "@after"]);

	Ok(())
}

#[test]
fn processor_emits_events() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "")]);
	let log = log();
	let mut processor = Processor::new();

	processor.add_task(recording_task(&log), None);

	let events = collect_events(&mut processor);

	processor.run(tmp.path(), None)?;

	assert_eq!(
		events.borrow().clone(),
		vec![
			Event::ProcessingStarted,
			Event::FileStarted {
				path: "a.md".to_string()
			},
			Event::TaskStarted {
				task: "record".to_string()
			},
			Event::TaskFinished {
				result: TaskFinishedResult::Success
			},
			Event::FileFinished {
				result: FileFinishedResult::Success
			},
			Event::ProcessingFinished {
				result: ProcessingFinishedResult::Success
			},
		]
	);

	Ok(())
}

#[test]
#[traced_test]
fn processor_events_are_logged() -> MdpipeResult<()> {
	let tmp = tree(&[("a.md", "")]);
	let log = log();
	let mut processor = Processor::new();

	processor
		.add_task(recording_task(&log), None)
		.add_listener(TracingListener);
	processor.run(tmp.path(), None)?;

	assert!(logs_contain("processing started"));
	assert!(logs_contain("processing finished"));

	Ok(())
}

// --- Preprocess tests ---

fn preprocessor() -> Processor {
	let mut processor = Processor::new();
	processor.add_task(Preprocess::default(), None);
	processor
}

fn block(instruction: &str, target: &str, content: &str) -> String {
	let hash = preprocess::hash(instruction, target, &serde_json::json!({}));

	format!(
		"[//]: # (start: {hash})\n[//]: # (warning: Generated automatically. Do not edit.)\n\n{content}\n\n[//]: # (end: {hash})"
	)
}

#[test]
fn preprocess_includes_text_files() -> MdpipeResult<()> {
	let tmp = tree(&[
		("readme.md", "# Title\n\n[include:file]: ./snippet.txt\n"),
		("snippet.txt", "Hello\n"),
	]);

	preprocessor().run(tmp.path(), None)?;

	assert_eq!(
		read(tmp.path(), "readme.md"),
		format!(
			"# Title\n\n[include:file]: ./snippet.txt\n{}\n",
			block("include:file", "./snippet.txt", "Hello")
		)
	);

	Ok(())
}

#[test]
fn preprocess_is_idempotent() -> MdpipeResult<()> {
	let tmp = tree(&[
		("readme.md", "[include:file]: ./snippet.txt\n"),
		("snippet.txt", "Hello\n"),
	]);

	preprocessor().run(tmp.path(), None)?;

	let first = read(tmp.path(), "readme.md");
	let changes = preprocessor().run(tmp.path(), None)?;

	assert!(changes.is_empty());
	assert_eq!(read(tmp.path(), "readme.md"), first);

	Ok(())
}

#[test]
fn preprocess_replaces_outdated_blocks_and_ignores_nested_instructions() -> MdpipeResult<()> {
	let tmp = tree(&[
		(
			"readme.md",
			"[include:file]: ./a.txt\n[//]: # (start: old)\n\n[include:file]: ./missing.txt\n\n[//]: # (end: old)\n",
		),
		("a.txt", "A"),
	]);

	preprocessor().run(tmp.path(), None)?;

	assert_eq!(
		read(tmp.path(), "readme.md"),
		format!(
			"[include:file]: ./a.txt\n{}\n",
			block("include:file", "./a.txt", "A")
		)
	);

	Ok(())
}

#[test]
fn preprocess_inlines_and_rebases_markdown() -> MdpipeResult<()> {
	let tmp = tree(&[
		("readme.md", "[include:file]: ./docs/part.md\n"),
		("docs/part.md", "See [guide][g].\n\n[g]: ./guide.md\n"),
	]);

	preprocessor().run(tmp.path(), None)?;

	assert_eq!(
		read(tmp.path(), "readme.md"),
		format!(
			"[include:file]: ./docs/part.md\n{}\n",
			block("include:file", "./docs/part.md", "See [guide](docs/guide.md).")
		)
	);
	assert_eq!(
		read(tmp.path(), "docs/part.md"),
		"See [guide][g].\n\n[g]: ./guide.md\n"
	);

	Ok(())
}

#[test]
fn preprocess_writes_empty_marker() -> MdpipeResult<()> {
	let tmp = tree(&[("readme.md", "[include:file]: ./empty.txt\n"), ("empty.txt", "\n\n")]);

	preprocessor().run(tmp.path(), None)?;

	let hash = preprocess::hash("include:file", "./empty.txt", &serde_json::json!({}));

	assert_eq!(
		read(tmp.path(), "readme.md"),
		format!(
			"[include:file]: ./empty.txt\n[//]: # (start: {hash})\n[//]: # (warning: Generated automatically. Do not edit.)\n[//]: # (empty)\n[//]: # (end: {hash})\n"
		)
	);

	Ok(())
}

#[test]
fn preprocess_detects_include_cycles() {
	let tmp = tree(&[
		("a.md", "[include:file]: ./b.md\n"),
		("b.md", "[include:file]: ./a.md\n"),
	]);
	let result = preprocessor().run(tmp.path(), None);

	assert!(
		matches!(result, Err(MdpipeError::DependencyCircularDependency { .. })),
		"{result:?}"
	);
}

#[test]
fn preprocess_rejects_invalid_parameters() {
	let tmp = tree(&[("readme.md", "[include:file]: ./a.txt ({invalid)\n"), ("a.txt", "A")]);
	let result = preprocessor().run(tmp.path(), None);
	let Err(MdpipeError::TaskFailed { source, .. }) = result else {
		panic!("expected a task failure, got {result:?}");
	};

	assert!(matches!(
		source.as_deref(),
		Some(MdpipeError::InstructionParameters { .. })
	));
}

#[test]
fn preprocess_hash_ignores_parameter_order() {
	let a = preprocess::hash("x", "t", &serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}}));
	let b: serde_json::Value =
		serde_json::from_str(r#"{"b": {"d": 3, "c": 2}, "a": 1}"#).unwrap_or_else(|e| panic!("{e}"));

	assert_eq!(a, preprocess::hash("x", "t", &b));
	assert_ne!(a, preprocess::hash("x", "other", &b));
}

#[test]
fn preprocess_exec_is_disabled_by_default() -> MdpipeResult<()> {
	let tmp = tree(&[("readme.md", "[include:exec]: <echo hi>\n")]);
	let changes = preprocessor().run(tmp.path(), None)?;

	assert!(changes.is_empty());
	assert_eq!(read(tmp.path(), "readme.md"), "[include:exec]: <echo hi>\n");

	Ok(())
}

#[cfg(unix)]
#[test]
fn preprocess_exec_includes_command_output() -> MdpipeResult<()> {
	let tmp = tree(&[("readme.md", "[include:exec]: <echo hi>\n")]);
	let mut processor = Processor::new();

	processor.add_task(Preprocess::default().with_exec(true), None);
	processor.run(tmp.path(), None)?;

	assert_eq!(
		read(tmp.path(), "readme.md"),
		format!(
			"[include:exec]: <echo hi>\n{}\n",
			block("include:exec", "echo hi", "hi")
		)
	);

	Ok(())
}

// --- Config tests ---

#[test]
fn config_defaults() -> MdpipeResult<()> {
	let config = MdpipeConfig::parse("")?;

	assert!(config.output.is_none());
	assert!(config.exclude.patterns.is_empty());
	assert!(config.preprocess.enabled);
	assert!(!config.preprocess.allow_exec);

	Ok(())
}

#[test]
fn config_is_discovered_in_config_directory() -> MdpipeResult<()> {
	let tmp = tree(&[(
		".config/mdpipe.toml",
		"output = \"docs\"\nmax_depth = 2\n\n[exclude]\npatterns = [\"build/\"]\n\n[preprocess]\nallow_exec = true\n",
	)]);
	let config = MdpipeConfig::load(tmp.path())?.unwrap_or_else(|| panic!("config missing"));

	assert_eq!(config.output(tmp.path()), Some(tmp.path().join("docs")));
	assert_eq!(config.max_depth, Some(2));
	assert_eq!(config.exclude.patterns, vec!["build/"]);
	assert!(config.preprocess.allow_exec);

	Ok(())
}

#[test]
fn config_rejects_unknown_keys() {
	assert!(matches!(
		MdpipeConfig::parse("unknown = true"),
		Err(MdpipeError::ConfigParse(_))
	));
}

#[test]
fn config_missing_file_is_none() -> MdpipeResult<()> {
	let tmp = tree(&[]);

	assert!(MdpipeConfig::load(tmp.path())?.is_none());

	Ok(())
}

// --- Display tests ---

#[test]
fn event_display() {
	let event = Event::DependencyResolved {
		path: "docs/a.md".to_string(),
		result: DependencyResolvedResult::Missed,
	};

	insta::assert_snapshot!(event.to_string(), @"dependency `docs/a.md` resolved: Missed");
}

#[test]
fn error_display() {
	let error = MdpipeError::InstructionParameters {
		instruction: "include:file".to_string(),
		reason: "expected an object".to_string(),
	};

	insta::assert_snapshot!(
		error.to_string(),
		@"invalid parameters for instruction `include:file`: expected an object"
	);
}
