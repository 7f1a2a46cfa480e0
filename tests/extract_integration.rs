//! Integration tests for archive grouping and extraction.

mod support;

use std::sync::Arc;

use cpi_docs_core::extract::{ExtractError, extract_all, group_key, resolve_entry_path};
use cpi_docs_core::NoProgress;
use cpi_docs_core::progress::progress_bar;
use support::zip_bytes;
use tempfile::TempDir;

#[tokio::test]
async fn test_multi_part_archives_merge_into_one_directory() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let dir = temp_dir.path();
    std::fs::write(
        dir.join("Relatório Final-1.zip"),
        zip_bytes(&[("capítulos/", b""), ("capítulos/Genocídio.txt", b"parte 1")]),
    )
    .unwrap();
    std::fs::write(
        dir.join("Relatório Final-2.zip"),
        zip_bytes(&[("anexos/Ofício.pdf", b"parte 2")]),
    )
    .unwrap();

    let stats = extract_all(dir, Arc::new(NoProgress)).await.unwrap();

    assert_eq!(stats.groups(), 1);
    assert_eq!(stats.extracted(), 1);
    assert_eq!(stats.entries(), 3);
    let target = dir.join("Relatorio Final");
    assert_eq!(
        std::fs::read(target.join("capitulos/Genocidio.txt")).unwrap(),
        b"parte 1"
    );
    assert_eq!(std::fs::read(target.join("anexos/Oficio.pdf")).unwrap(), b"parte 2");
    assert!(!dir.join("Relatório Final-1.zip").exists());
    assert!(!dir.join("Relatório Final-2.zip").exists());
}

#[tokio::test]
async fn test_progress_is_sized_from_the_scan() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let dir = temp_dir.path();
    std::fs::write(dir.join("a-1.zip"), zip_bytes(&[("1.txt", b"1")])).unwrap();
    std::fs::write(dir.join("a-2.zip"), zip_bytes(&[("2.txt", b"2")])).unwrap();
    std::fs::write(dir.join("b.zip"), zip_bytes(&[("3.txt", b"3")])).unwrap();
    let bar = progress_bar(0, "archives", false);

    extract_all(dir, bar.clone()).await.unwrap();

    assert_eq!(bar.length(), Some(2));
    assert_eq!(bar.position(), 2);
}

#[tokio::test]
async fn test_cache_and_nested_zips_are_not_scanned() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let dir = temp_dir.path();
    std::fs::create_dir_all(dir.join(".cache/aa")).unwrap();
    std::fs::write(dir.join(".cache/aa/bb.zip"), zip_bytes(&[("x.txt", b"x")])).unwrap();
    std::fs::create_dir_all(dir.join("antigo")).unwrap();
    std::fs::write(dir.join("antigo/velho.zip"), zip_bytes(&[("y.txt", b"y")])).unwrap();

    let stats = extract_all(dir, Arc::new(NoProgress)).await.unwrap();

    assert_eq!(stats.groups(), 0);
    assert!(dir.join(".cache/aa/bb.zip").exists());
    assert!(dir.join("antigo/velho.zip").exists());
}

#[tokio::test]
async fn test_bad_groups_do_not_block_good_ones() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let dir = temp_dir.path();
    std::fs::write(dir.join("bom.zip"), zip_bytes(&[("ok.txt", b"ok")])).unwrap();
    std::fs::write(dir.join("corrompido-1.zip"), b"not a zip archive").unwrap();
    std::fs::write(dir.join("-1.zip"), zip_bytes(&[("z.txt", b"z")])).unwrap();

    let stats = extract_all(dir, Arc::new(NoProgress)).await.unwrap();

    assert_eq!(stats.groups(), 3);
    assert_eq!(stats.extracted(), 1);
    assert_eq!(stats.failed(), 2);
    assert!(dir.join("bom/ok.txt").exists());
    assert!(dir.join("corrompido-1.zip").exists());
    assert!(dir.join("-1.zip").exists());
}

#[tokio::test]
async fn test_traversal_entry_keeps_group_archives() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let dir = temp_dir.path();
    std::fs::write(
        dir.join("ataque.zip"),
        zip_bytes(&[("../../fora.txt", b"evil")]),
    )
    .unwrap();

    let stats = extract_all(dir, Arc::new(NoProgress)).await.unwrap();

    assert_eq!(stats.failed(), 1);
    assert!(dir.join("ataque.zip").exists());
    assert!(!dir.join("fora.txt").exists());
    assert!(!temp_dir.path().parent().unwrap().join("fora.txt").exists());
}

#[test]
fn test_group_key_examples() {
    assert_eq!(group_key("a-1.zip").unwrap(), "a");
    assert_eq!(group_key("a-2.zip").unwrap(), "a");
    assert_eq!(group_key("b.zip").unwrap(), "b");
    assert!(matches!(
        group_key("nada.txt"),
        Err(ExtractError::SequenceParse { .. })
    ));
}

#[test]
fn test_entry_guard_with_diacritic_target() {
    let target = std::path::Path::new("/mnt/data/CPI do Genocídio");
    assert!(resolve_entry_path(target, "relatorio.pdf").is_some());
    assert!(resolve_entry_path(target, "../CPI do Genocídio-x/relatorio.pdf").is_none());
}
