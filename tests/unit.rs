//! Unit tests for the public Kansho API.
//!
//! These exercise configuration, preflight checks and segmentation without
//! writing containers.

use kansho::error::{Error, Result};
use kansho::DEFAULT_CHAPTER_PATTERN;
use kansho::prelude::*;

mod common;
use common::{setup_test_dirs, write_gb18030_source, write_source, write_utf8_source};

fn demo_config() -> KanshoConfigBuilder {
    let mut builder = KanshoConfig::builder();
    builder
        .metadata(EbookMetadata::default_with_title("Demo".to_string()))
        .chapter_pattern("^第.+章")
        .encoding(TextEncoding::Utf8);
    builder
}

#[tokio::test]
async fn test_kansho_config_builder_validation() -> Result<()> {
    // Valid build with defaults
    let config = KanshoConfig::builder().build()?;
    assert_eq!(config.metadata.title, "Untitled Conversion");
    assert_eq!(config.encoding, TextEncoding::Gb18030);
    assert_eq!(config.output_format, FileFormat::Epub);
    assert_eq!(config.chapter_pattern, DEFAULT_CHAPTER_PATTERN);
    assert!(config.sub_chapter_pattern.is_none());
    assert!(config.escape);
    assert!(!config.paragraph_mode);
    assert!(config.skip_empty_placeholder);
    assert!(config.create_output_directory);

    // Invalid chapter pattern
    let err = KanshoConfig::builder()
        .chapter_pattern("^第(.+章")
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("Invalid chapter_pattern"));

    // Invalid sub-chapter pattern
    let err = KanshoConfig::builder()
        .sub_chapter_pattern("[unclosed")
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("Invalid sub_chapter_pattern"));

    // Empty sub-chapter pattern is accepted and means "none"
    let config = KanshoConfig::builder().sub_chapter_pattern("").build()?;
    assert!(config.patterns()?.sub_chapter().is_none());

    // Builder errors convert into the crate error
    let converted: Error = KanshoConfig::builder()
        .output_file_name("   ")
        .build()
        .unwrap_err()
        .into();
    assert!(matches!(converted, Error::KanshoBuilder(_)));

    Ok(())
}

#[tokio::test]
async fn test_kansho_config_preflight_check() -> Result<()> {
    let test_dirs = setup_test_dirs("preflight_check").await;
    let source_file = test_dirs.source_dir.join("novel.txt");
    write_utf8_source(&source_file, &["第一章 开始", "正文"]).await?;

    // Missing target path
    let config = KanshoConfig::builder()
        .source_path(source_file.clone())
        .build()?;
    assert!(config.preflight_check(KanshoExecutionMode::FromLines).is_err());

    // Empty title
    let config = KanshoConfig::builder()
        .metadata(EbookMetadata::default_with_title(String::new()))
        .target_path(test_dirs.target_dir.clone())
        .build()?;
    assert!(config.preflight_check(KanshoExecutionMode::FromChapters).is_err());

    // FromSource without a source path
    let config = KanshoConfig::builder()
        .target_path(test_dirs.target_dir.clone())
        .build()?;
    assert!(config.preflight_check(KanshoExecutionMode::FromLines).is_ok());
    assert!(config.preflight_check(KanshoExecutionMode::FromSource).is_err());

    // FromSource with a missing file
    let config = KanshoConfig::builder()
        .source_path(test_dirs.source_dir.join("missing.txt"))
        .target_path(test_dirs.target_dir.clone())
        .build()?;
    assert!(matches!(
        config.preflight_check(KanshoExecutionMode::FromSource),
        Err(Error::NotFound(_))
    ));

    // FromSource with a directory
    let config = KanshoConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .target_path(test_dirs.target_dir.clone())
        .build()?;
    assert!(matches!(
        config.preflight_check(KanshoExecutionMode::FromSource),
        Err(Error::InvalidPath(_, _))
    ));

    // Missing cover image
    let config = KanshoConfig::builder()
        .source_path(source_file.clone())
        .target_path(test_dirs.target_dir.clone())
        .cover_path(test_dirs.source_dir.join("cover.png"))
        .build()?;
    assert!(config.preflight_check(KanshoExecutionMode::FromSource).is_err());

    // Valid
    let config = KanshoConfig::builder()
        .source_path(source_file)
        .target_path(test_dirs.target_dir.clone())
        .build()?;
    assert!(config.preflight_check(KanshoExecutionMode::FromSource).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_title_from_source() -> Result<()> {
    let config = KanshoConfig::builder()
        .source_path(PathBuf::from("library/三体.txt"))
        .title_from_source()
        .build()?;
    assert_eq!(config.metadata.title, "三体");

    // Explicit metadata wins
    let config = KanshoConfig::builder()
        .metadata(EbookMetadata::default_with_title("Explicit".to_string()))
        .source_path(PathBuf::from("library/三体.txt"))
        .title_from_source()
        .build()?;
    assert_eq!(config.metadata.title, "Explicit");
    Ok(())
}

#[tokio::test]
async fn test_segment_lines_end_to_end() -> Result<()> {
    let config = demo_config().build()?;
    let segmented =
        config.segment_lines(["Intro", "第一章 Start", "hello", "第二章 End", "world"])?;

    let titles: Vec<&str> = segmented.chapters.iter().map(|c| c.title()).collect();
    assert_eq!(titles, vec!["Demo", "第一章 Start", "第二章 End"]);

    let contents: Vec<&[u8]> = segmented.chapters.iter().map(|c| c.content()).collect();
    assert_eq!(
        contents,
        vec![&b"<br/>Intro"[..], &b"<br/>hello"[..], &b"<br/>world"[..]]
    );

    assert_eq!(
        segmented.report,
        SegmentReport {
            lines_processed: 5,
            chapters_emitted: 3,
            sub_chapters_emitted: 0,
            content_bytes: 30,
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_segment_emits_one_more_chapter_than_headings() -> Result<()> {
    let config = demo_config().build()?;
    for headings in 0..5 {
        let mut lines = Vec::new();
        for i in 0..headings {
            lines.push(format!("第{}章", i + 1));
            lines.push(format!("body {}", i));
        }
        let segmented = config.segment_lines(&lines)?;
        assert_eq!(segmented.chapters.len(), headings + 1);
        assert_eq!(segmented.report.chapters_emitted, headings + 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_segment_without_matches_yields_single_chapter() -> Result<()> {
    let config = demo_config().default_chapter_title("前言").build()?;
    let segmented = config.segment_lines(["just", "some", "text"])?;

    assert_eq!(segmented.chapters.len(), 1);
    assert_eq!(segmented.chapters[0].title(), "前言");
    assert_eq!(segmented.chapters[0].content(), b"<br/>just<br/>some<br/>text");
    Ok(())
}

#[tokio::test]
async fn test_segment_with_sub_chapters() -> Result<()> {
    let config = demo_config()
        .chapter_pattern("^第.+卷")
        .sub_chapter_pattern("^第.+章")
        .paragraph_mode(true)
        .build()?;

    let segmented = config.segment_lines([
        "第一卷 风起",
        "卷首语",
        "第一章 少年",
        "正文一",
        "第二章 出山",
        "正文二",
        "第二卷 云涌",
        "第三章 入城",
        "正文三",
    ])?;

    let chapters = &segmented.chapters;
    assert_eq!(chapters.len(), 3);
    assert!(chapters[0].is_empty());

    let first = &chapters[1];
    assert_eq!(first.title(), "第一卷 风起");
    assert_eq!(first.content(), "<p>卷首语</p>".as_bytes());
    assert_eq!(first.sub_chapters().len(), 2);
    assert_eq!(first.sub_chapters()[0].title(), "第一章 少年");
    assert_eq!(first.sub_chapters()[0].content(), "<p>正文一</p>".as_bytes());
    assert_eq!(first.sub_chapters()[1].content(), "<p>正文二</p>".as_bytes());

    let second = &chapters[2];
    assert!(second.content().is_empty());
    assert_eq!(second.sub_chapters().len(), 1);
    assert_eq!(second.sub_chapters()[0].title(), "第三章 入城");

    assert_eq!(segmented.report.sub_chapters_emitted, 3);
    Ok(())
}

#[tokio::test]
async fn test_chapter_pattern_wins_over_sub_chapter_pattern() -> Result<()> {
    // Both patterns match every heading: the chapter pattern takes precedence.
    let config = demo_config()
        .chapter_pattern("^第")
        .sub_chapter_pattern("^第")
        .build()?;
    let segmented = config.segment_lines(["第一章", "a", "第二章", "b"])?;
    assert_eq!(segmented.chapters.len(), 3);
    assert!(segmented.chapters.iter().all(|c| c.sub_chapters().is_empty()));
    Ok(())
}

#[tokio::test]
async fn test_segment_escaping_policy() -> Result<()> {
    let lines = ["第一章", "<b>Tom & \"Jerry\"</b>"];

    let escaped = demo_config().build()?.segment_lines(lines)?;
    assert_eq!(
        escaped.chapters[1].content(),
        b"<br/>&lt;b&gt;Tom &amp; &#34;Jerry&#34;&lt;/b&gt;"
    );

    let raw = demo_config().escape(false).build()?.segment_lines(lines)?;
    assert_eq!(raw.chapters[1].content(), b"<br/><b>Tom & \"Jerry\"</b>");
    Ok(())
}

#[tokio::test]
async fn test_segmentation_is_deterministic() -> Result<()> {
    let config = demo_config().sub_chapter_pattern("^第.+节").build()?;
    let lines = ["序", "第一章", "第一节", "x", "第二节", "y", "第二章", "z"];

    let first = config.segment_lines(lines)?;
    let second = config.segment_lines(lines)?;
    assert_eq!(first.chapters, second.chapters);
    assert_eq!(first.report, second.report);
    Ok(())
}

#[tokio::test]
async fn test_segment_bytes_decodes_gbk() -> Result<()> {
    let text = "引子\r\n第一章 回家\r\n他回来了。\r\n";
    let (bytes, _, had_errors) = encoding_rs::GBK.encode(text);
    assert!(!had_errors);

    let config = demo_config().encoding(TextEncoding::Gbk).build()?;
    let segmented = config.segment_bytes(&bytes)?;

    assert_eq!(segmented.chapters.len(), 2);
    assert_eq!(segmented.chapters[1].title(), "第一章 回家");
    assert_eq!(segmented.chapters[1].content(), "<br/>他回来了。".as_bytes());
    Ok(())
}

#[tokio::test]
async fn test_segment_bytes_reports_failing_line() -> Result<()> {
    let config = demo_config().build()?;
    let result = config.segment_bytes(b"ok\n\xFF\xFE broken\nnever reached");
    match result {
        Err(Error::Decode { line, encoding }) => {
            assert_eq!(line, 2);
            assert_eq!(encoding, "UTF-8");
        }
        other => panic!("Expected decode error, got {:?}", other.map(|s| s.report)),
    }
    Ok(())
}

#[tokio::test]
async fn test_segment_source() -> Result<()> {
    let test_dirs = setup_test_dirs("segment_source").await;

    let gb_file = test_dirs.source_dir.join("gb.txt");
    write_gb18030_source(&gb_file, &["第一章 初见", "你好", "第二章 再见", "再会"]).await?;
    let config = KanshoConfig::builder()
        .source_path(gb_file)
        .build()?;
    let segmented = config.segment_source().await?;
    // The leading placeholder chapter is empty but still emitted
    assert_eq!(segmented.chapters.len(), 3);
    assert!(segmented.chapters[0].is_empty());
    assert_eq!(segmented.chapters[2].content(), "<br/>再会".as_bytes());

    let empty_file = test_dirs.source_dir.join("empty.txt");
    write_source(&empty_file, b"").await?;
    let config = demo_config().source_path(empty_file).build()?;
    let segmented = config.segment_source().await?;
    assert_eq!(segmented.chapters.len(), 1);
    assert!(segmented.chapters[0].is_empty());
    assert_eq!(segmented.report.lines_processed, 0);

    Ok(())
}

#[tokio::test]
async fn test_segment_lines_with_custom_sink() -> Result<()> {
    struct TitleSink(Vec<String>);

    impl ChapterSink for TitleSink {
        fn emit_chapter(&mut self, chapter: Chapter) -> Result<()> {
            self.0.push(chapter.title().to_string());
            Ok(())
        }
    }

    let patterns = Patterns::compile("^Chapter", None)?;
    let mut sink = TitleSink(Vec::new());
    let lines = ["Chapter 1", "a", "Chapter 2", "b"]
        .into_iter()
        .map(|l| Ok::<_, Error>(l.as_bytes()));
    let report = segment_lines(lines, "Front", &patterns, FormatOptions::default(), &mut sink)?;

    assert_eq!(sink.0, vec!["Front", "Chapter 1", "Chapter 2"]);
    assert_eq!(report.chapters_emitted, 3);
    Ok(())
}

#[tokio::test]
async fn test_ebook_metadata_default_with_title() {
    let metadata = EbookMetadata::default_with_title("Test Title".to_string());
    assert_eq!(metadata.title, "Test Title");
    assert_eq!(metadata.language, "zh");
    assert!(metadata.authors.is_empty());
}
