use super::*;
use std::io::Write as _;
use tempfile::TempDir;

fn docs_domain(dir: &Path) -> DomainConfig {
    DomainConfig {
        name: "dispatch".to_string(),
        keywords: Vec::new(),
        git_paths: Vec::new(),
        wiki_space: None,
        wiki_query: None,
        local_docs_dir: Some(dir.to_path_buf()),
    }
}

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let file = std::fs::File::create(path).expect("create docx");
    let mut archive = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );

    archive
        .start_file("word/document.xml", options)
        .expect("start docx entry");
    archive
        .write_all(document.as_bytes())
        .expect("write docx body");
    archive.finish().expect("finish docx");
}

#[test]
fn markdown_and_text_files_are_loaded_with_provenance() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("overview.md"), "# Overview\ndispatch logic").expect("write md");
    std::fs::write(dir.path().join("notes.txt"), "operator notes").expect("write txt");

    let loader = LocalDocumentLoader::new();
    let text = loader.load(&docs_domain(dir.path())).expect("load succeeds");

    assert!(text.contains("--- overview.md ---"));
    assert!(text.contains("dispatch logic"));
    assert!(text.contains("--- notes.txt ---"));
    assert!(text.contains("operator notes"));
}

#[test]
fn unsupported_formats_are_skipped_without_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("readme.md"), "real content").expect("write md");
    std::fs::write(dir.path().join("image.png"), [0u8, 1, 2, 3]).expect("write png");

    let loader = LocalDocumentLoader::new();
    let text = loader.load(&docs_domain(dir.path())).expect("load succeeds");

    assert!(text.contains("real content"));
    assert!(!text.contains("image.png"));
}

#[test]
fn docx_body_text_is_extracted_with_paragraph_breaks() {
    let dir = TempDir::new().expect("temp dir");
    write_docx(
        &dir.path().join("manual.docx"),
        &["First paragraph.", "Second paragraph."],
    );

    let loader = LocalDocumentLoader::new();
    let text = loader.load(&docs_domain(dir.path())).expect("load succeeds");

    assert!(text.contains("--- manual.docx ---"));
    assert!(text.contains("First paragraph.\nSecond paragraph."));
}

#[test]
fn corrupt_file_is_skipped_not_fatal() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("broken.pdf"), b"not actually a pdf").expect("write pdf");
    std::fs::write(dir.path().join("good.md"), "still loaded").expect("write md");

    let loader = LocalDocumentLoader::new();
    let text = loader.load(&docs_domain(dir.path())).expect("load succeeds");

    assert!(text.contains("still loaded"));
    assert!(!text.contains("broken.pdf"));
}

#[test]
fn missing_directory_is_a_loader_error() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("does-not-exist");

    let loader = LocalDocumentLoader::new();
    let result = loader.load(&docs_domain(&missing));

    assert!(matches!(result, Err(KbError::Loader(_))));
}

#[test]
fn nested_directories_are_walked() {
    let dir = TempDir::new().expect("temp dir");
    let nested = dir.path().join("guides").join("advanced");
    std::fs::create_dir_all(&nested).expect("create nested dirs");
    std::fs::write(nested.join("deep.md"), "deeply nested doc").expect("write md");

    let loader = LocalDocumentLoader::new();
    let text = loader.load(&docs_domain(dir.path())).expect("load succeeds");

    assert!(text.contains("deeply nested doc"));
}

#[test]
fn docx_parser_handles_escaped_entities() {
    let text = parse_docx_body(
        "<w:document xmlns:w=\"ns\"><w:body>\
         <w:p><w:r><w:t>Trucks &amp; shovels</w:t></w:r></w:p>\
         </w:body></w:document>",
    )
    .expect("parse succeeds");

    assert_eq!(text.trim(), "Trucks & shovels");
}
