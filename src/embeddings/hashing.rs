use super::Embedder;
use crate::error::Result;
use async_trait::async_trait;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Feature-hashed character trigrams, L2-normalized.
///
/// Words are lowercased and padded with a space on each side, so "skate" and
/// "skateboarding" share " sk", "ska", "kat" and "ate". Deterministic across
/// runs and machines, which makes it usable offline and in tests.
pub struct HashingEmbedder {
    dimensions: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            name: format!("hashing-trigram-{}", dimensions),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars().flat_map(char::to_lowercase))
                .chain(std::iter::once(' '))
                .collect();
            for gram in padded.windows(3) {
                let bucket = (fnv1a(gram) % self.dimensions as u64) as usize;
                vector[bucket] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut buf = [0u8; 4];
    for c in chars {
        for byte in c.encode_utf8(&mut buf).bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
