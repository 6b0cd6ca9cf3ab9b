use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use cookrag_core::config::RagConfig;
use cookrag_core::data_processor::DataProcessor;
use cookrag_core::traits::{FragmentStream, Generator, QueryRewriter, QueryRouter};
use cookrag_core::types::{Category, ParentDocument, Route};
use cookrag_core::{DocumentStore, Error};
use cookrag_embed::{HashEmbedder, HASH_EMBEDDER_DIM};
use cookrag_hybrid::{Answer, HybridRetriever, KnowledgeBase, KnowledgeHandle, RecipeRag, NO_RESULTS_ANSWER};
use cookrag_text::TantivyChunkIndex;
use cookrag_vector::FlatVectorIndex;

const RECIPES: &[(&str, &str)] = &[
    ("meat_dish/红烧肉.md", "# 红烧肉的做法\n\n预估烹饪难度：★★★★\n\n## 必备原料和工具\n\n- 五花肉\n- 冰糖\n\n## 操作\n\n- 五花肉切块焯水\n- 炒糖色后炖煮"),
    ("meat_dish/可乐鸡翅.md", "# 可乐鸡翅的做法\n\n预估烹饪难度：★★\n\n## 必备原料和工具\n\n- 鸡翅\n- 可乐\n\n## 操作\n\n- 鸡翅焯水\n- 加可乐收汁"),
    ("vegetable_dish/番茄炒蛋.md", "# 番茄炒蛋的做法\n\n预估烹饪难度：★★\n\n## 必备原料和工具\n\n- 番茄\n- 鸡蛋\n\n## 操作\n\n- 先炒鸡蛋\n- 再炒番茄"),
    ("vegetable_dish/凉拌黄瓜.md", "# 凉拌黄瓜的做法\n\n预估烹饪难度：★\n\n## 必备原料和工具\n\n- 黄瓜\n- 蒜\n\n## 操作\n\n- 拍黄瓜\n- 加蒜末"),
    ("soup/紫菜蛋花汤.md", "# 紫菜蛋花汤的做法\n\n预估烹饪难度：★\n\n## 必备原料和工具\n\n- 紫菜\n- 鸡蛋\n\n## 操作\n\n- 水开下紫菜\n- 淋入蛋液"),
];

const DESSERT: (&str, &str) = ("dessert/双皮奶.md", "# 双皮奶的做法\n\n一道经典甜品\n\n## 必备原料和工具\n\n- 牛奶\n- 蛋清\n\n## 操作\n\n- 牛奶加热\n- 蒸制");

fn ingest(recipes: &[(&str, &str)]) -> DocumentStore {
    let processor = DataProcessor::new();
    let docs = recipes.iter().map(|(path, text)| processor.document_from_markdown(path, path, text.to_string())).collect();
    processor.ingest(docs).expect("ingest")
}

fn retriever(config: &RagConfig) -> HybridRetriever {
    HybridRetriever::new(
        Box::new(TantivyChunkIndex::in_ram().expect("tantivy")),
        Box::new(FlatVectorIndex::new()),
        Box::new(HashEmbedder::new(HASH_EMBEDDER_DIM)),
        config,
    )
}

fn knowledge(recipes: &[(&str, &str)]) -> Result<KnowledgeBase> {
    let config = RagConfig::default();
    let store = ingest(recipes);
    let retriever = retriever(&config);
    retriever.index(store.chunks())?;
    Ok(KnowledgeBase::new(store, retriever)?)
}

struct KeywordRouter;

impl QueryRouter for KeywordRouter {
    fn classify_route(&self, query: &str) -> Result<Route> {
        Ok(if query.contains("推荐") { Route::List } else if query.contains("怎么做") { Route::Detail } else { Route::Basic })
    }
}

struct CountingRewriter(Arc<AtomicUsize>);

impl QueryRewriter for CountingRewriter {
    fn rewrite(&self, query: &str) -> Result<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(query.to_string())
    }
}

/// Answers with `route|query|dish,dish,...`.
struct EchoGenerator;

impl Generator for EchoGenerator {
    fn generate(&self, route: Route, query: &str, context: &[Arc<ParentDocument>]) -> Result<String> {
        let names: Vec<_> = context.iter().map(|p| p.metadata.dish_name.as_str()).collect();
        Ok(format!("{route}|{query}|{}", names.join(",")))
    }

    fn generate_stream(&self, route: Route, query: &str, context: &[Arc<ParentDocument>]) -> Result<FragmentStream> {
        let text = self.generate(route, query, context)?;
        let fragments: Vec<Result<String>> = text.chars().map(|c| Ok(c.to_string())).collect();
        Ok(Box::new(fragments.into_iter()))
    }
}

fn rag() -> (RecipeRag, Arc<AtomicUsize>) {
    let rewrites = Arc::new(AtomicUsize::new(0));
    let rag = RecipeRag::new(
        RagConfig::default(),
        knowledge(RECIPES).expect("knowledge"),
        Box::new(KeywordRouter),
        Box::new(CountingRewriter(rewrites.clone())),
        Box::new(EchoGenerator),
    );
    (rag, rewrites)
}

fn first_dish(answer: &str) -> &str {
    answer.rsplit('|').next().unwrap().split(',').next().unwrap()
}

#[test]
fn detail_question_is_rewritten_and_answered_from_parents() {
    let (rag, rewrites) = rag();
    let answer = rag.answer("红烧肉怎么做", false).unwrap().into_text().unwrap();
    assert!(answer.starts_with("detail|红烧肉怎么做|"));
    assert_eq!(first_dish(&answer), "红烧肉");
    assert_eq!(rewrites.load(Ordering::SeqCst), 1);
}

#[test]
fn list_question_skips_rewrite_and_applies_category_filter() {
    let (rag, rewrites) = rag();
    let retrieval = rag.retrieve("推荐几道鸡蛋做的素菜").unwrap();
    assert_eq!(retrieval.route, Route::List);
    assert_eq!(rewrites.load(Ordering::SeqCst), 0);
    assert!(!retrieval.filters.is_empty());
    assert!(!retrieval.chunks.is_empty());
    assert!(retrieval.chunks.len() <= rag.config().top_k);
    assert!(retrieval.chunks.iter().all(|r| r.chunk.metadata.category == Category::VegetableDish));
    assert!(retrieval.parents.iter().all(|p| p.metadata.category == Category::VegetableDish));
}

#[test]
fn nothing_matching_the_filter_yields_the_fixed_answer() {
    let (rag, _) = rag();
    let answer = rag.answer("推荐几道甜品", true).unwrap();
    assert!(matches!(answer, Answer::Text(ref t) if t == NO_RESULTS_ANSWER));
}

#[test]
fn streamed_answer_matches_the_plain_one() {
    let (rag, _) = rag();
    let streamed = rag.answer("红烧肉怎么做", true).unwrap();
    assert!(matches!(streamed, Answer::Stream(_)));
    let plain = rag.answer("红烧肉怎么做", false).unwrap().into_text().unwrap();
    assert_eq!(streamed.into_text().unwrap(), plain);

    let list = rag.answer("推荐几道鸡蛋做的素菜", true).unwrap();
    assert!(matches!(list, Answer::Text(_)), "list answers are not streamed");
}

#[test]
fn category_search_returns_distinct_dish_names() {
    let (rag, _) = rag();
    let mut names = rag.search_by_category("荤菜", "").unwrap();
    names.sort();
    assert_eq!(names, ["可乐鸡翅", "红烧肉"]);
    assert!(rag.search_by_category("meat_dish", "鸡翅").unwrap().contains(&"可乐鸡翅".to_string()));
    let err = rag.search_by_category("川菜", "").unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnsupportedLabel { .. })));
}

#[test]
fn ingredients_use_a_basic_answer() {
    let (rag, _) = rag();
    let answer = rag.ingredients_for("红烧肉").unwrap();
    assert!(answer.starts_with("basic|红烧肉需要什么食材？|"));
    assert_eq!(first_dish(&answer), "红烧肉");
}

#[test]
fn reload_swaps_in_a_new_snapshot() {
    let (rag, _) = rag();
    let before = rag.knowledge();
    let mut recipes = RECIPES.to_vec();
    recipes.push(DESSERT);
    rag.reload(|| knowledge(&recipes)).unwrap();

    assert_eq!(before.store().parent_count(), 5, "readers keep their snapshot");
    assert_eq!(rag.knowledge().store().parent_count(), 6);
    let answer = rag.answer("推荐几道甜品", false).unwrap().into_text().unwrap();
    assert!(answer.contains("双皮奶"));

    assert!(rag.reload(|| Err(anyhow!("corpus unavailable"))).is_err());
    assert_eq!(rag.knowledge().store().parent_count(), 6);
}

#[test]
fn swap_returns_the_snapshot_readers_still_hold() {
    let handle = KnowledgeHandle::new(knowledge(RECIPES).expect("knowledge"));
    let held = handle.current();
    let previous = handle.swap(knowledge(&[DESSERT]).expect("knowledge"));
    assert!(Arc::ptr_eq(&previous, &held));
    assert_eq!(held.store().parent_count(), RECIPES.len());
    assert_eq!(handle.current().store().parent_count(), 1);
    assert_eq!(handle.current().store().parents()[0].metadata.dish_name, "双皮奶");
}

#[test]
fn searching_before_indexing_is_an_empty_corpus() {
    let config = RagConfig::default();
    let err = retriever(&config).hybrid_search("红烧肉", 3).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyCorpus(_))));
    let err = KnowledgeBase::new(DocumentStore::new(), retriever(&config)).err().unwrap();
    assert!(matches!(err, Error::EmptyCorpus(_)));
}

#[test]
fn hybrid_search_respects_top_k_and_smoothing() {
    let kb = knowledge(RECIPES).unwrap();
    let results = kb.retriever().hybrid_search("紫菜蛋花汤", 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.metadata.dish_name, "紫菜蛋花汤");
    // top_k = 2 smooths with k = 2: a first place in both lists is 2/3
    assert!(results[0].score <= 2.0 / 3.0 + 1e-12);
    assert!(kb.retriever().hybrid_search("紫菜蛋花汤", 0).unwrap().is_empty());
}
