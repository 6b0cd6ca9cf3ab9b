use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, STORED, STRING};
use tantivy::Index;

use crate::analyzer::terms_analyzer;

pub const TERMS_TOKENIZER: &str = "cookrag_terms";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _ord_field = schema_builder.add_u64_field("ord", STORED | FAST);
	let _chunk_id_field = schema_builder.add_text_field("chunk_id", STRING | STORED);
	let terms_indexing = TextFieldIndexing::default().set_tokenizer(TERMS_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let terms_options = TextOptions::default().set_indexing_options(terms_indexing);
	let _terms_field = schema_builder.add_text_field("terms", terms_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TERMS_TOKENIZER, terms_analyzer());
}
