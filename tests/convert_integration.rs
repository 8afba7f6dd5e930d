//! End-to-end tests for document conversion.
//!
//! Each test builds a small set of HTML files (and image files) in a temp
//! directory, serves remote images from a mock server, and checks the
//! assembled book.

use std::fs;
use std::path::{Path, PathBuf};

use html_to_epub::{ConvertError, ConvertOptions, Converter, run};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR fake";
const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0 fake";

fn options(temp_dir: &TempDir, inputs: Vec<PathBuf>) -> ConvertOptions {
    ConvertOptions {
        inputs,
        output: temp_dir.path().join("out.epub"),
        images_dir: temp_dir.path().join("images"),
        ..ConvertOptions::default()
    }
}

fn write_html(dir: &Path, name: &str, html: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, html).expect("write html");
    path
}

async fn serve_png(mock_server: &MockServer, route: &str, expected_gets: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG.to_vec()))
        .expect(expected_gets)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_shared_images_embedded_once_across_documents() {
    let mock_server = MockServer::start().await;
    serve_png(&mock_server, "/logo.png", 1).await;
    let remote = format!("{}/logo.png", mock_server.uri());

    let temp_dir = TempDir::new().expect("temp dir");
    fs::write(temp_dir.path().join("local.jpg"), JPEG).expect("local image");
    let html = format!(
        r#"<html><body><img src="{remote}"><img src="local.jpg"><img src="{remote}"></body></html>"#
    );
    let a = write_html(temp_dir.path(), "a.html", &html);
    let b = write_html(temp_dir.path(), "b.html", &html);

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &a).await.expect("doc a");
    converter.add_document(2, &b).await.expect("doc b");

    let book = converter.book();
    assert_eq!(book.images().len(), 2, "one resource per distinct src");
    assert_eq!(book.images()[0].href, "images/image_000.png");
    assert_eq!(book.images()[1].href, "images/image_001.jpg");

    for section in book.sections() {
        assert_eq!(section.body.matches("images/image_000.png").count(), 2);
        assert_eq!(section.body.matches("images/image_001.jpg").count(), 1);
        assert!(!section.body.contains(&remote));
    }

    let summary = converter.finish().expect("write");
    assert!(summary.output.exists());
    assert_eq!(summary.downloads.downloaded, 1);
}

#[tokio::test]
async fn test_sections_follow_input_order_with_numbered_titles() {
    let temp_dir = TempDir::new().expect("temp dir");
    let first = write_html(
        temp_dir.path(),
        "zeta.html",
        "<html><head><title> Hello </title></head><body><p>one</p></body></html>",
    );
    let second = write_html(
        temp_dir.path(),
        "alpha.html",
        "<html><body><p>two</p></body></html>",
    );

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &first).await.expect("first");
    converter.add_document(2, &second).await.expect("second");

    let titles: Vec<&str> = converter
        .book()
        .sections()
        .iter()
        .map(|s| s.title.as_str())
        .collect();
    assert_eq!(titles, vec!["1. Hello", "2. alpha"]);
    assert_eq!(converter.book().sections()[0].body, "<p>one</p>");
}

#[tokio::test]
async fn test_exported_note_folders_are_searched() {
    let temp_dir = TempDir::new().expect("temp dir");
    fs::create_dir(temp_dir.path().join("note_files")).expect("files dir");
    fs::write(temp_dir.path().join("note_files").join("pic.png"), PNG).expect("pic");
    fs::create_dir(temp_dir.path().join("clip.resources")).expect("resources dir");
    fs::write(temp_dir.path().join("clip.resources").join("shot.jpg"), JPEG).expect("shot");

    let note = write_html(
        temp_dir.path(),
        "note.html",
        r#"<body><img src="pic.png"></body>"#,
    );
    let clip = write_html(
        temp_dir.path(),
        "clip.html",
        r#"<body><img src="somewhere/else/shot.jpg."></body>"#,
    );

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &note).await.expect("note");
    converter.add_document(2, &clip).await.expect("clip");

    let sections = converter.book().sections();
    assert_eq!(sections[0].body, r#"<img src="images/image_000.png"/>"#);
    assert_eq!(sections[1].body, r#"<img src="images/image_001.jpg"/>"#);
}

#[tokio::test]
async fn test_broken_images_do_not_stop_conversion() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    let broken = format!("{}/gone.png", mock_server.uri());

    let temp_dir = TempDir::new().expect("temp dir");
    fs::write(temp_dir.path().join("one.png"), PNG).expect("one");
    fs::write(temp_dir.path().join("two.jpg"), JPEG).expect("two");
    fs::write(temp_dir.path().join("page.png"), "<html><body>oops</body></html>").expect("html");
    let doc = write_html(
        temp_dir.path(),
        "doc.html",
        &format!(
            r#"<body><img src="{broken}"><img src="one.png"><img src="missing.gif"><img src="page.png"><img src="two.jpg"></body>"#
        ),
    );

    let summary = run(options(&temp_dir, vec![doc])).await.expect("run succeeds");

    assert_eq!(summary.sections, 1);
    assert_eq!(summary.images, 2);
    assert_eq!(summary.unresolved_images, 3);
    assert_eq!(summary.downloads.failed, 1);
    assert!(summary.output.exists());
}

#[tokio::test]
async fn test_section_body_is_xhtml() {
    let temp_dir = TempDir::new().expect("temp dir");
    fs::write(temp_dir.path().join("a.png"), PNG).expect("image");
    let doc = write_html(
        temp_dir.path(),
        "doc.html",
        "<body><p>x\u{a0}y<br></p><img src=\"a.png\"></body>",
    );

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &doc).await.expect("doc");

    let body = &converter.book().sections()[0].body;
    assert_eq!(
        body,
        "<p>x\u{a0}y<br/></p><img src=\"images/image_000.png\"/>"
    );
    assert!(!body.contains("&nbsp;"));
}

#[tokio::test]
async fn test_failed_image_keeps_original_source() {
    let temp_dir = TempDir::new().expect("temp dir");
    let doc = write_html(
        temp_dir.path(),
        "doc.html",
        r#"<body><img src="nowhere.png" loading="lazy" srcset="a.png 2x"></body>"#,
    );

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &doc).await.expect("doc");

    assert_eq!(
        converter.book().sections()[0].body,
        r#"<img src="nowhere.png"/>"#
    );
}

#[tokio::test]
async fn test_data_uri_left_inline() {
    let temp_dir = TempDir::new().expect("temp dir");
    let doc = write_html(
        temp_dir.path(),
        "doc.html",
        r#"<body><img src="data:image/png;base64,iVBORw0KGgo=" srcset="x.png 2x"></body>"#,
    );

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &doc).await.expect("doc");

    assert!(converter.book().images().is_empty());
    assert_eq!(
        converter.book().sections()[0].body,
        r#"<img src="data:image/png;base64,iVBORw0KGgo="/>"#
    );
}

#[tokio::test]
async fn test_ads_removed_before_image_handling() {
    let mock_server = MockServer::start().await;
    serve_png(&mock_server, "/ad.png", 0).await;
    let ad = format!("{}/ad.png", mock_server.uri());

    let temp_dir = TempDir::new().expect("temp dir");
    let doc = write_html(
        temp_dir.path(),
        "doc.html",
        &format!(
            r#"<body><p>text</p><center><div>ads from inoreader</div><img src="{ad}"></center></body>"#
        ),
    );

    let mut converter = Converter::new(options(&temp_dir, vec![])).expect("converter");
    converter.add_document(1, &doc).await.expect("doc");

    assert_eq!(converter.book().sections()[0].body, "<p>text</p>");
}

#[tokio::test]
async fn test_existing_output_aborts_before_any_request() {
    let mock_server = MockServer::start().await;
    serve_png(&mock_server, "/a.png", 0).await;

    let temp_dir = TempDir::new().expect("temp dir");
    let doc = write_html(
        temp_dir.path(),
        "doc.html",
        &format!(r#"<body><img src="{}/a.png"></body>"#, mock_server.uri()),
    );
    let opts = options(&temp_dir, vec![doc]);
    fs::write(&opts.output, b"keep me").expect("existing output");

    let result = run(opts.clone()).await;

    assert!(matches!(result, Err(ConvertError::OutputExists { .. })));
    assert_eq!(fs::read(&opts.output).expect("read"), b"keep me");
}

#[tokio::test]
async fn test_unreadable_document_is_fatal_and_writes_nothing() {
    let temp_dir = TempDir::new().expect("temp dir");
    let good = write_html(temp_dir.path(), "good.html", "<body><p>ok</p></body>");
    let opts = options(&temp_dir, vec![good, temp_dir.path().join("missing.html")]);

    let result = run(opts.clone()).await;

    assert!(matches!(result, Err(ConvertError::Document { .. })));
    assert!(!opts.output.exists());
}

#[tokio::test]
async fn test_non_image_cover_is_fatal() {
    let temp_dir = TempDir::new().expect("temp dir");
    let cover = temp_dir.path().join("cover.png");
    fs::write(&cover, "plain text, not a picture").expect("cover");
    let doc = write_html(temp_dir.path(), "doc.html", "<body></body>");

    let opts = ConvertOptions {
        cover: Some(cover),
        ..options(&temp_dir, vec![doc])
    };
    let result = run(opts.clone()).await;

    assert!(matches!(result, Err(ConvertError::CoverMime { .. })));
    assert!(!opts.output.exists());
}
