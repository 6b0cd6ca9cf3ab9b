use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use cookrag_core::config::RagConfig;
use cookrag_core::traits::{FragmentStream, Generator, QueryRewriter, QueryRouter};
use cookrag_core::types::{MetadataField, ParentDocument, Route};

use crate::filter::{extract_filters, FilterPredicates};
use crate::fusion::RankedResult;
use crate::knowledge::{KnowledgeBase, KnowledgeHandle};

pub const NO_RESULTS_ANSWER: &str = "抱歉，没有找到相关的食谱信息。请尝试其他菜品名称或关键词。";

const CATEGORY_SEARCH_K: usize = 10;

pub enum Answer {
    Text(String),
    Stream(FragmentStream),
}

impl Answer {
    /// Drains a streamed answer into one string.
    pub fn into_text(self) -> Result<String> {
        match self {
            Answer::Text(text) => Ok(text),
            Answer::Stream(fragments) => fragments.collect(),
        }
    }
}

/// Everything retrieval decided for one question.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub route: Route,
    /// Query used for search and generation; the original for `list` routes.
    pub query: String,
    pub filters: FilterPredicates,
    pub chunks: Vec<RankedResult>,
    pub parents: Vec<Arc<ParentDocument>>,
}

pub struct RecipeRag {
    config: RagConfig,
    knowledge: KnowledgeHandle,
    router: Box<dyn QueryRouter>,
    rewriter: Box<dyn QueryRewriter>,
    generator: Box<dyn Generator>,
}

impl RecipeRag {
    pub fn new(
        config: RagConfig,
        knowledge: KnowledgeBase,
        router: Box<dyn QueryRouter>,
        rewriter: Box<dyn QueryRewriter>,
        generator: Box<dyn Generator>,
    ) -> Self {
        Self { config, knowledge: KnowledgeHandle::new(knowledge), router, rewriter, generator }
    }

    pub fn config(&self) -> &RagConfig { &self.config }

    pub fn knowledge(&self) -> Arc<KnowledgeBase> { self.knowledge.current() }

    /// Routes the question, rewrites it unless it asks for a list, then runs a
    /// filtered or plain hybrid search. Filters come from the original wording.
    pub fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let knowledge = self.knowledge.current();
        let route = self.router.classify_route(query)?;
        let search_query = match route {
            Route::List => query.to_string(),
            _ => self.rewriter.rewrite(query)?,
        };
        let filters = extract_filters(query);
        let retriever = knowledge.retriever();
        let chunks = if filters.is_empty() {
            retriever.hybrid_search(&search_query, self.config.top_k)?
        } else {
            info!(filters = %filters, "applying query filters");
            retriever.metadata_filtered_search(&search_query, &filters, self.config.top_k)?
        };
        let parents = if chunks.is_empty() { Vec::new() } else { knowledge.resolve_parents(&chunks)? };
        info!(route = %route, query = %search_query, chunks = chunks.len(), parents = parents.len(), "retrieval complete");
        Ok(Retrieval { route, query: search_query, filters, chunks, parents })
    }

    /// List answers are never streamed.
    pub fn answer(&self, query: &str, stream: bool) -> Result<Answer> {
        let retrieval = self.retrieve(query)?;
        if retrieval.chunks.is_empty() {
            warn!(query, "no recipes matched");
            return Ok(Answer::Text(NO_RESULTS_ANSWER.to_string()));
        }
        if stream && retrieval.route != Route::List {
            return Ok(Answer::Stream(self.generator.generate_stream(retrieval.route, &retrieval.query, &retrieval.parents)?));
        }
        Ok(Answer::Text(self.generator.generate(retrieval.route, &retrieval.query, &retrieval.parents)?))
    }

    /// Dish names in `category`, best match first, without repeats.
    pub fn search_by_category(&self, category: &str, query: &str) -> Result<Vec<String>> {
        let filters = FilterPredicates::new().require(MetadataField::Category, category)?;
        let search_query = if query.trim().is_empty() { category } else { query };
        let results = self.knowledge.current().retriever().metadata_filtered_search(search_query, &filters, CATEGORY_SEARCH_K)?;
        let mut names: Vec<String> = Vec::new();
        for r in results {
            if !names.contains(&r.chunk.metadata.dish_name) { names.push(r.chunk.metadata.dish_name.clone()); }
        }
        Ok(names)
    }

    pub fn ingredients_for(&self, dish_name: &str) -> Result<String> {
        let knowledge = self.knowledge.current();
        let results = knowledge.retriever().hybrid_search(dish_name, self.config.top_k)?;
        if results.is_empty() { return Ok(NO_RESULTS_ANSWER.to_string()); }
        let parents = knowledge.resolve_parents(&results)?;
        self.generator.generate(Route::Basic, &format!("{dish_name}需要什么食材？"), &parents)
    }

    /// Rebuilds the knowledge base with `build` and swaps it in. Queries in
    /// flight finish against the snapshot they started with.
    pub fn reload<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce() -> Result<KnowledgeBase>,
    {
        self.knowledge.rebuild(build)
    }
}
