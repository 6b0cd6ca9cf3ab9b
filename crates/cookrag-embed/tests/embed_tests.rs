use cookrag_embed::{get_default_embedder, Embedder, HashEmbedder, HASH_EMBEDDER_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading a model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(None).expect("embedder");
    let texts = vec!["红烧肉的做法".to_string(), "红烧肉的做法".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), HASH_EMBEDDER_DIM);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_terms_score_closer() {
    let embedder = HashEmbedder::new(HASH_EMBEDDER_DIM);
    let query = embedder.embed_query("红烧肉").unwrap();
    let near = embedder.embed_query("红烧肉需要五花肉").unwrap();
    let far = embedder.embed_query("lemonade with sugar").unwrap();
    assert!(cosine(&query, &near) > cosine(&query, &far));
}

#[test]
fn case_and_stop_words_do_not_change_the_vector() {
    let embedder = HashEmbedder::new(HASH_EMBEDDER_DIM);
    let a = embedder.embed_query("Braised PORK").unwrap();
    let b = embedder.embed_query("the braised pork").unwrap();
    assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
}
