//! Term analysis shared by the keyword index and the hash embedder.
//!
//! [`CjkBigramTokenizer`] splits latin text into alphanumeric words and emits
//! CJK runs, which have no word delimiters, as single characters plus
//! overlapping bigrams. The registered analyzer chains tantivy's
//! `LowerCaser` and an English `StopWordFilter` behind it.

use tantivy::tokenizer::{LowerCaser, StopWordFilter, TextAnalyzer, Token, TokenStream, Tokenizer};

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

pub fn is_cjk(c: char) -> bool {
	matches!(c as u32,
		0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF)
}

#[derive(Clone, Default)]
pub struct CjkBigramTokenizer;

pub struct CjkBigramTokenStream {
	tokens: Vec<Token>,
	cursor: usize,
}

impl Tokenizer for CjkBigramTokenizer {
	type TokenStream<'a> = CjkBigramTokenStream;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
		CjkBigramTokenStream { tokens: split(text), cursor: 0 }
	}
}

impl TokenStream for CjkBigramTokenStream {
	fn advance(&mut self) -> bool {
		if self.cursor < self.tokens.len() {
			self.cursor += 1;
			true
		} else {
			false
		}
	}

	fn token(&self) -> &Token { &self.tokens[self.cursor - 1] }

	fn token_mut(&mut self) -> &mut Token { &mut self.tokens[self.cursor - 1] }
}

fn split(text: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let mut word_start: Option<usize> = None;
	let mut cjk_run: Vec<(usize, char)> = Vec::new();

	for (offset, c) in text.char_indices() {
		if is_cjk(c) {
			flush_word(text, &mut word_start, offset, &mut tokens);
			cjk_run.push((offset, c));
		} else if c.is_alphanumeric() {
			flush_cjk(&mut cjk_run, &mut tokens);
			word_start.get_or_insert(offset);
		} else {
			flush_word(text, &mut word_start, offset, &mut tokens);
			flush_cjk(&mut cjk_run, &mut tokens);
		}
	}
	flush_word(text, &mut word_start, text.len(), &mut tokens);
	flush_cjk(&mut cjk_run, &mut tokens);
	tokens
}

fn push_token(tokens: &mut Vec<Token>, offset_from: usize, offset_to: usize, text: String) {
	let position = tokens.len();
	tokens.push(Token { offset_from, offset_to, position, text, position_length: 1 });
}

fn flush_word(text: &str, start: &mut Option<usize>, end: usize, tokens: &mut Vec<Token>) {
	if let Some(from) = start.take() {
		push_token(tokens, from, end, text[from..end].to_string());
	}
}

fn flush_cjk(run: &mut Vec<(usize, char)>, tokens: &mut Vec<Token>) {
	for (i, &(offset, c)) in run.iter().enumerate() {
		push_token(tokens, offset, offset + c.len_utf8(), c.to_string());
		if let Some(&(next_offset, next)) = run.get(i + 1) {
			push_token(tokens, offset, next_offset + next.len_utf8(), [c, next].iter().collect());
		}
	}
	run.clear();
}

/// CJK bigrams, lowercased, English stop words removed.
pub fn terms_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(CjkBigramTokenizer)
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}

/// Token texts of `text` in order of appearance (duplicates kept).
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut stream = analyzer.token_stream(text);
	let mut out = Vec::new();
	while stream.advance() {
		out.push(stream.token().text.clone());
	}
	out
}

pub fn terms(text: &str) -> Vec<String> { analyze(&mut terms_analyzer(), text) }
