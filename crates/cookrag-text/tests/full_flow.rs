use std::sync::Arc;

use cookrag_core::data_processor::DataProcessor;
use cookrag_core::traits::TextIndexer;
use cookrag_core::types::ChunkRef;
use cookrag_text::analyzer::{analyze, terms};
use cookrag_text::tantivy_utils::{build_schema, register_tokenizer, TERMS_TOKENIZER};
use cookrag_text::TantivyChunkIndex;

fn corpus_chunks() -> Vec<ChunkRef> {
    let processor = DataProcessor::new();
    let docs = vec![
        processor.document_from_markdown("meat_dish/红烧肉.md", "meat_dish/红烧肉.md", "# 红烧肉\n\n## 原料\n\n五花肉 冰糖 生抽\n\n## 操作\n\n五花肉焯水后炒糖色".to_string()),
        processor.document_from_markdown("vegetable_dish/番茄炒蛋.md", "vegetable_dish/番茄炒蛋.md", "# 番茄炒蛋\n\n## 原料\n\n番茄 鸡蛋\n\n## 操作\n\n先炒鸡蛋再炒番茄".to_string()),
        processor.document_from_markdown("drink/lemonade.md", "drink/lemonade.md", "# Lemonade\n\n## Steps\n\nSqueeze the lemons and add sugar".to_string()),
    ];
    processor.chunk_documents(&docs).expect("chunk").into_iter().map(Arc::new).collect()
}

#[test]
fn tantivy_full_flow() {
    let chunks = corpus_chunks();
    let index = TantivyChunkIndex::in_ram().expect("index");
    index.index(&chunks).expect("index chunks");
    assert_eq!(index.len(), chunks.len());

    let hits = index.search("五花肉怎么做", 3).expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].metadata.dish_name, "红烧肉");
    assert!(hits.len() <= 3);

    let hits = index.search("LEMONS", 5).expect("search");
    assert_eq!(hits.len(), 1, "latin terms are case-insensitive");
    assert_eq!(hits[0].metadata.dish_name, "lemonade");
}

#[test]
fn hits_share_the_indexed_chunk() {
    let chunks = corpus_chunks();
    let index = TantivyChunkIndex::in_ram().expect("index");
    index.index(&chunks).expect("index chunks");
    let hits = index.search("番茄", 2).expect("search");
    assert!(hits.iter().all(|h| chunks.iter().any(|c| Arc::ptr_eq(c, h))));
}

#[test]
fn stop_words_and_zero_k_return_nothing() {
    let index = TantivyChunkIndex::in_ram().expect("index");
    index.index(&corpus_chunks()).expect("index chunks");
    assert!(index.search("the and of", 5).expect("search").is_empty());
    assert!(index.search("番茄", 0).expect("search").is_empty());
}

#[test]
fn on_disk_index_starts_clean() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().join("tantivy");
    let first = TantivyChunkIndex::in_dir(dir.clone()).expect("index");
    first.index(&corpus_chunks()).expect("index chunks");
    drop(first);
    let second = TantivyChunkIndex::in_dir(dir).expect("index");
    assert!(second.is_empty());
    assert!(second.search("番茄", 3).expect("search").is_empty());
}

#[test]
fn registered_analyzer_matches_shared_terms() {
    let index = tantivy::Index::create_in_ram(build_schema());
    register_tokenizer(&index);
    let mut analyzer = index.tokenizers().get(TERMS_TOKENIZER).expect("registered");
    let text = "The COLA鸡翅 and 番茄";
    assert_eq!(analyze(&mut analyzer, text), terms(text));
    assert_eq!(terms(text), vec!["cola", "鸡", "鸡翅", "翅", "番", "番茄", "茄"]);
}
