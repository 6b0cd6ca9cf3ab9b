//! OpenAI-compatible `/chat/completions` client.
//!
//! One client serves as router, rewriter and generator. List answers are
//! formatted locally from the resolved recipes and never reach the model.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use cookrag_core::config::RagConfig;
use cookrag_core::traits::{FragmentStream, Generator, QueryRewriter, QueryRouter};
use cookrag_core::types::{ParentDocument, Route};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const NO_DISHES: &str = "抱歉，没有找到相关的菜品信息。";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<Content>,
    #[serde(default)]
    delta: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Arc<str>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, temperature: f32, max_tokens: u32) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: Arc::from(api_key),
            model: model.to_string(),
            temperature,
            max_tokens,
        })
    }

    /// Reads the API key from the variable named by `llm_api_key_env`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let api_key = std::env::var(&config.llm_api_key_env)
            .map_err(|_| anyhow!("{} is not set; export an API key for {}", config.llm_api_key_env, config.llm_base_url))?;
        Self::new(&config.llm_base_url, &api_key, &config.llm_model_name, config.temperature, config.max_tokens)
    }

    fn send(&self, prompt: &str, temperature: f32, stream: bool) -> Result<reqwest::blocking::Response> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature,
            max_tokens: self.max_tokens,
            stream,
        };
        debug!(endpoint = %self.endpoint, stream, prompt_chars = prompt.chars().count(), "chat request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&*self.api_key)
            .json(&request)
            .send()
            .map_err(|err| anyhow!("chat request failed: {err}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("chat completion HTTP {status}: {body}");
        }
        Ok(response)
    }

    pub fn complete(&self, prompt: &str) -> Result<String> { self.complete_with(prompt, self.temperature) }

    fn complete_with(&self, prompt: &str, temperature: f32) -> Result<String> {
        let response: ChatResponse = self.send(prompt, temperature, false)?.json().map_err(|err| anyhow!("chat response parse: {err}"))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("chat response carried no message"))
    }

    /// Streams content deltas from a server-sent-events response.
    pub fn complete_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let response = self.send(prompt, self.temperature, true)?;
        Ok(Box::new(SseFragments { lines: BufReader::new(response).lines(), done: false }))
    }
}

struct SseFragments {
    lines: Lines<BufReader<reqwest::blocking::Response>>,
    done: bool,
}

impl Iterator for SseFragments {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(anyhow!("reading chat stream: {err}")));
                }
                None => break,
            };
            let Some(data) = line.strip_prefix("data:") else { continue };
            let data = data.trim();
            if data == "[DONE]" { break; }
            let chunk: ChatResponse = match serde_json::from_str(data) {
                Ok(chunk) => chunk,
                Err(err) => {
                    self.done = true;
                    return Some(Err(anyhow!("chat stream parse: {err}")));
                }
            };
            let text = chunk.choices.into_iter().next().and_then(|c| c.delta).and_then(|d| d.content).unwrap_or_default();
            if !text.is_empty() { return Some(Ok(text)); }
        }
        self.done = true;
        None
    }
}

fn route_prompt(query: &str) -> String {
    format!(
        "根据用户的问题，将其分类为以下三种类型之一：\n\
         1. 'list' - 用户想要获取菜品列表或推荐，只需要菜名\n\
         2. 'detail' - 用户想要具体的制作方法或详细信息\n\
         3. 'general' 或 'basic' - 其他一般性问题\n\n\
         请只返回分类结果：list、detail 或 basic\n\n\
         用户问题: {query}\n\n分类结果:"
    )
}

fn rewrite_prompt(query: &str) -> String {
    format!(
        "你是一个智能查询分析助手。请分析用户的查询，判断是否需要重写以提高食谱搜索效果。\n\n\
         原始查询: {query}\n\n\
         如果查询已经包含具体菜名或明确的制作问题，保持原查询不变；\
         如果查询过于模糊，将其改写为更具体、更利于检索的表达，保持原意。\n\n\
         请只输出最终查询，不要解释："
    )
}

fn context_block(context: &[Arc<ParentDocument>]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "【食谱 {}】{} | 分类: {} | 难度: {}\n{}",
                i + 1,
                doc.metadata.dish_name,
                doc.metadata.category,
                doc.metadata.difficulty,
                doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn answer_prompt(route: Route, query: &str, context: &[Arc<ParentDocument>]) -> String {
    let instructions = match route {
        Route::Detail => "请根据食谱信息，为用户提供分步骤的详细解答：先列出所需食材，再按顺序写出制作步骤，最后给出实用的烹饪技巧。",
        _ => "请根据食谱信息回答用户的问题。回答要准确、简洁；如果信息不足以回答，请如实说明。",
    };
    format!("你是一位专业的烹饪助手。{instructions}\n\n用户问题: {query}\n\n相关食谱信息:\n{}\n\n回答:", context_block(context))
}

/// Numbered dish names in context order, without repeats.
pub fn list_answer(context: &[Arc<ParentDocument>]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for doc in context {
        if !names.contains(&doc.metadata.dish_name.as_str()) { names.push(&doc.metadata.dish_name); }
    }
    if names.is_empty() { return NO_DISHES.to_string(); }
    let lines: Vec<String> = names.iter().enumerate().map(|(i, n)| format!("{}. {n}", i + 1)).collect();
    format!("为您推荐以下菜品：\n{}", lines.join("\n"))
}

impl QueryRouter for ChatClient {
    /// Anything the model answers outside the three labels counts as `basic`.
    fn classify_route(&self, query: &str) -> Result<Route> {
        let raw = self.complete_with(&route_prompt(query), 0.0)?;
        let label = raw.trim().trim_matches(|c: char| c == '\'' || c == '"' || c == '`' || c == '.').to_lowercase();
        Ok(label.parse().unwrap_or_else(|_| {
            if label != "general" { warn!(answer = %raw, "unrecognised route, using basic"); }
            Route::Basic
        }))
    }
}

impl QueryRewriter for ChatClient {
    fn rewrite(&self, query: &str) -> Result<String> {
        let rewritten = self.complete_with(&rewrite_prompt(query), 0.0)?;
        if rewritten.is_empty() { return Ok(query.to_string()); }
        if rewritten != query { debug!(from = query, to = %rewritten, "query rewritten"); }
        Ok(rewritten)
    }
}

impl Generator for ChatClient {
    fn generate(&self, route: Route, query: &str, context: &[Arc<ParentDocument>]) -> Result<String> {
        match route {
            Route::List => Ok(list_answer(context)),
            _ => self.complete(&answer_prompt(route, query, context)),
        }
    }

    fn generate_stream(&self, route: Route, query: &str, context: &[Arc<ParentDocument>]) -> Result<FragmentStream> {
        match route {
            Route::List => Ok(Box::new(std::iter::once(Ok(list_answer(context))))),
            _ => self.complete_stream(&answer_prompt(route, query, context)),
        }
    }
}
