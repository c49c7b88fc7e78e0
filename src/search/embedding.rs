//! Text embedders
//!
//! Everything that turns text into a vector implements [`Embedder`]. Embedders
//! never normalize; the vector store applies one normalization policy to both
//! build-time and query-time vectors.
//!
//! [`HarmonicEmbedder`] is a deterministic, model-free embedder based on
//! "Harmonic Token Projection" (<https://arxiv.org/html/2511.20665>). It needs no
//! model server and is used for offline runs and tests. The production embedder is
//! the sentence-transformer served through Ollama, see
//! [`crate::ollama::OllamaEmbedder`].

use anyhow::Result;
use std::f64::consts::PI;

pub use super::index::EMBEDDING_DIM;

/// Maps a text to an [`EMBEDDING_DIM`]-wide `f32` vector
pub trait Embedder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        (**self).encode(text)
    }
}

/// Number of coprime moduli, two dimensions each
const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Maximum token length (Unicode code points)
const MAX_TOKEN_LENGTH: usize = 64;

/// First NUM_MODULI primes, pairwise coprime by construction
static COPRIME_MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

/// Deterministic harmonic token projection embedder
#[derive(Debug, Clone)]
pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: COPRIME_MODULI[..NUM_MODULI].to_vec(),
        }
    }

    /// Mean of the token projections; empty text maps to the zero vector
    fn embed(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; EMBEDDING_DIM];
        }

        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            for (slot, val) in sum.iter_mut().zip(self.embed_token(token)) {
                *slot += val;
            }
        }

        let count = tokens.len() as f64;
        sum.into_iter().map(|v| (v / count) as f32).collect()
    }

    /// Project one token onto the unit circle of every modulus
    ///
    /// The token is read as a base-2^16 integer N; for each modulus m the residue
    /// r = N mod m becomes the pair [sin(2πr/m), cos(2πr/m)].
    fn embed_token(&self, token: &str) -> Vec<f64> {
        let n = token_to_integer(token);

        let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
        for &m in &self.moduli {
            let r = n % m;
            let theta = 2.0 * PI * (r as f64) / (m as f64);
            embedding.push(theta.sin());
            embedding.push(theta.cos());
        }
        embedding
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HarmonicEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}

fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

/// Lowercased words split on whitespace and ASCII punctuation
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}
