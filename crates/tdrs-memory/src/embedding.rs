use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Dimensionality of the feature-hashed embedding space.
pub const EMBEDDING_DIM: usize = 256;

/// Embed a text into a fixed-dimension vector via feature hashing.
///
/// Tokens are lowercased alphanumeric runs; each token bumps the bucket
/// its hash lands in, and the vector is L2-normalized. Deterministic
/// across processes, so stored embeddings stay comparable to query
/// embeddings computed later.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];

    for token in tokenize(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % EMBEDDING_DIM;
        vector[bucket] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
}

/// Cosine similarity between two vectors. Zero for mismatched lengths or
/// zero-norm inputs (already-normalized vectors reduce this to a dot product).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let a = embed("Strong earnings with elevated valuation");
        let b = embed("Strong earnings with elevated valuation");
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_is_normalized() {
        let v = embed("momentum breakout with rising volume");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_texts_have_max_similarity() {
        let a = embed("semiconductor demand surge");
        let b = embed("semiconductor demand surge");
        let sim = cosine_similarity(&a, &b);
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_above_unrelated() {
        let query = embed("chip maker earnings beat, strong AI demand, raised guidance");
        let related = embed("earnings beat on AI chip demand with guidance raised");
        let unrelated = embed("utility dividend cut amid regulatory pressure");

        let related_sim = cosine_similarity(&query, &related);
        let unrelated_sim = cosine_similarity(&query, &unrelated);
        assert!(
            related_sim > unrelated_sim,
            "related {related_sim} should beat unrelated {unrelated_sim}"
        );
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let v = embed("");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &embed("anything at all")), 0.0);
    }

    #[test]
    fn tokenizer_drops_single_chars() {
        // "a" and "i" contribute nothing; casing is ignored.
        let a = embed("I a BUY Signal");
        let b = embed("buy signal");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }
}
