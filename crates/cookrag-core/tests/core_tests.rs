use std::fs;
use tempfile::TempDir;

use cookrag_core::data_processor::{parent_id_for, DataProcessor};
use cookrag_core::types::{Category, Difficulty};
use cookrag_core::{DocumentStore, Error, StoreState};

const HONGSHAOROU: &str = "# 红烧肉的做法\n\n预估烹饪难度：★★★★\n\n## 必备原料和工具\n\n- 五花肉\n\n## 操作\n\n- 焯水\n";
const TOMATO_EGG: &str = "# 番茄炒蛋\n\n预估烹饪难度：★★\n\n## 操作\n\n- 炒蛋\n";

fn write_corpus(dir: &std::path::Path) {
    fs::create_dir_all(dir.join("dishes/meat_dish")).unwrap();
    fs::create_dir_all(dir.join("dishes/vegetable_dish")).unwrap();
    fs::write(dir.join("dishes/meat_dish/红烧肉.md"), HONGSHAOROU).unwrap();
    fs::write(dir.join("dishes/vegetable_dish/番茄炒蛋.md"), TOMATO_EGG).unwrap();
    fs::write(dir.join("dishes/notes.txt"), "ignored").unwrap();
}

#[test]
fn load_documents_enriches_metadata() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());

    let docs = DataProcessor::new().load_documents(tmp.path()).expect("load");
    assert_eq!(docs.len(), 2, "only markdown files are loaded");

    let pork = docs.iter().find(|d| d.metadata.dish_name == "红烧肉").expect("pork");
    assert_eq!(pork.metadata.category, Category::MeatDish);
    assert_eq!(pork.metadata.difficulty, Difficulty::Hard);
    assert_eq!(pork.metadata.relative_path, "dishes/meat_dish/红烧肉.md");
    assert_eq!(pork.parent_id, parent_id_for("dishes/meat_dish/红烧肉.md"));
}

#[test]
fn parent_id_is_stable_across_runs() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let processor = DataProcessor::new();
    let first = processor.load_documents(tmp.path()).unwrap();
    let second = processor.load_documents(tmp.path()).unwrap();
    let ids = |docs: &[cookrag_core::types::ParentDocument]| docs.iter().map(|d| d.parent_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn chunking_assigns_positions_and_inherits_metadata() {
    let processor = DataProcessor::new();
    let docs = vec![
        processor.document_from_markdown("meat_dish/红烧肉.md", "meat_dish/红烧肉.md", HONGSHAOROU.to_string()),
        processor.document_from_markdown("vegetable_dish/番茄炒蛋.md", "vegetable_dish/番茄炒蛋.md", TOMATO_EGG.to_string()),
    ];
    let chunks = processor.chunk_documents(&docs).expect("chunk");
    assert_eq!(chunks.len(), 5);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.batch_index, i);
        assert_eq!(c.chunk_size, c.content.chars().count());
        assert!(!c.is_pseudo());
    }
    assert_eq!(chunks[2].chunk_index, 2);
    assert_eq!(chunks[3].chunk_index, 0, "chunk_index restarts per parent");
    assert_eq!(chunks[3].metadata.dish_name, "番茄炒蛋");
    assert_eq!(chunks[3].parent_id, docs[1].parent_id);
}

#[test]
fn structureless_document_becomes_pseudo_chunk() {
    let processor = DataProcessor::new();
    let docs = vec![processor.document_from_markdown("drink/水.md", "drink/水.md", "   \n".to_string())];
    let chunks = processor.chunk_documents(&docs).unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].is_pseudo());
    assert_eq!(chunks[0].chunk_id, docs[0].parent_id);
}

#[test]
fn chunking_nothing_is_an_empty_corpus() {
    assert!(matches!(DataProcessor::new().chunk_documents(&[]), Err(Error::EmptyCorpus(_))));
}

#[test]
fn ingest_builds_consistent_parent_child_map() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let store = DataProcessor::new().ingest_directory(tmp.path()).expect("ingest");
    assert_eq!(store.state(), StoreState::Ingested);
    assert_eq!(store.parent_count(), 2);
    for chunk in store.chunks() {
        assert_eq!(store.parent_of(&chunk.chunk_id), Some(chunk.parent_id.as_str()));
        assert!(store.get_parent(&chunk.parent_id).is_ok());
    }
}

#[test]
fn reingesting_same_path_is_idempotent() {
    let processor = DataProcessor::new();
    let doc = processor.document_from_markdown("meat_dish/红烧肉.md", "a", HONGSHAOROU.to_string());
    let again = processor.document_from_markdown("meat_dish/红烧肉.md", "b", HONGSHAOROU.to_string());
    let chunks = processor.chunk_documents(std::slice::from_ref(&doc)).unwrap();

    let mut store = DocumentStore::new();
    store.put_parent(doc.clone()).unwrap();
    store.put_chunks(&doc.parent_id, chunks).unwrap();
    store.put_parent(again).unwrap();

    assert_eq!(store.parent_count(), 1);
    assert_eq!(store.get_parent(&doc.parent_id).unwrap().metadata.source, "b");
    assert_eq!(store.chunk_count(), 0, "chunks of the replaced text are retracted");
}

#[test]
fn ingesting_a_path_twice_keeps_only_the_last_chunks() {
    let processor = DataProcessor::new();
    let first = processor.document_from_markdown("meat_dish/红烧肉.md", "a", HONGSHAOROU.to_string());
    let second = processor.document_from_markdown("meat_dish/红烧肉.md", "b", TOMATO_EGG.to_string());
    let expected: Vec<String> = processor.chunk_documents(std::slice::from_ref(&second)).unwrap().into_iter().map(|c| c.content).collect();

    let store = processor.ingest(vec![first, second]).expect("ingest");
    assert_eq!(store.parent_count(), 1);
    assert_eq!(store.parents()[0].metadata.source, "b");
    let stored: Vec<&str> = store.chunks().iter().map(|c| c.content.as_str()).collect();
    assert_eq!(stored, expected);
    for chunk in store.chunks() {
        assert_eq!(store.parent_of(&chunk.chunk_id), Some(chunk.parent_id.as_str()));
    }
}

#[test]
fn colliding_id_from_different_path_is_refused() {
    let processor = DataProcessor::new();
    let doc = processor.document_from_markdown("soup/a.md", "a", "x".into());
    let mut impostor = processor.document_from_markdown("soup/b.md", "b", "y".into());
    impostor.parent_id = doc.parent_id.clone();

    let mut store = DocumentStore::new();
    store.put_parent(doc).unwrap();
    assert!(matches!(store.put_parent(impostor), Err(Error::DuplicateParent { .. })));
}

#[test]
fn chunks_for_unknown_parent_are_refused() {
    let mut store = DocumentStore::new();
    assert!(matches!(store.put_chunks("missing", vec![]), Err(Error::UnknownParent(_))));
    assert!(matches!(store.get_parent("missing"), Err(Error::NotFound(_))));
}

#[test]
fn listing_by_label_validates_enumeration() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let store = DataProcessor::new().ingest_directory(tmp.path()).unwrap();

    let meat = store.list_by_category("荤菜").unwrap();
    assert_eq!(meat.len(), 1);
    assert_eq!(store.list_by_category("vegetable_dish").unwrap().len(), 1);
    assert_eq!(store.list_by_difficulty("简单").unwrap().len(), 1);
    assert!(matches!(store.list_by_category("川菜"), Err(Error::UnsupportedLabel { .. })));
    assert!(matches!(store.list_by_difficulty("极难"), Err(Error::UnsupportedLabel { .. })));
}

#[test]
fn indexed_store_is_read_only() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let processor = DataProcessor::new();
    let mut store = processor.ingest_directory(tmp.path()).unwrap();
    store.mark_indexed().unwrap();
    assert_eq!(store.state(), StoreState::Indexed);

    let doc = processor.document_from_markdown("soup/新汤.md", "x", "# 新汤".into());
    assert!(matches!(store.put_parent(doc), Err(Error::InvalidState { .. })));
    assert!(matches!(DocumentStore::new().mark_indexed(), Err(Error::EmptyCorpus(_))));
}

#[test]
fn statistics_and_metadata_export() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let store = DataProcessor::new().ingest_directory(tmp.path()).unwrap();

    let stats = store.statistics();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.total_chunks, 5);
    assert_eq!(stats.categories.get(&Category::MeatDish), Some(&1));
    assert!(stats.avg_chunk_size > 0.0);

    let out = tmp.path().join("metadata.json");
    store.export_metadata(&out).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| r["category"] == "荤菜" && r["difficulty"] == "困难"));
}
