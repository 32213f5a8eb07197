use super::{now_secs, proposals::proposal_from_row, Database};
use crate::error::{CacheError, Result};
use crate::models::{EmbeddingRecord, EmbeddingStats, Proposal, ProposalStatus};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

/// A chunk of proposal text and its vector, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEmbedding {
    pub chunk_index: usize,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

/// Packs a vector as little-endian 32-bit floats, 4 bytes per element.
pub fn pack_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * FLOAT_BYTES);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn unpack_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % FLOAT_BYTES != 0 {
        return Err(CacheError::InvalidBlob(blob.len()));
    }
    Ok(blob
        .chunks_exact(FLOAT_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn upsert_embedding_in(
    conn: &Connection,
    proposal_id: &str,
    chunk_index: usize,
    text: &str,
    vector: &[f32],
    created_at: i64,
) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO embeddings (proposal_id, chunk_index, chunk_text, embedding, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(proposal_id, chunk_index) DO UPDATE SET
             chunk_text = excluded.chunk_text,
             embedding = excluded.embedding,
             created_at = excluded.created_at",
    )?
    .execute(rusqlite::params![
        proposal_id,
        chunk_index as i64,
        text,
        pack_embedding(vector),
        created_at
    ])?;
    Ok(())
}

impl Database {
    pub fn upsert_embedding(
        &self,
        proposal_id: &str,
        chunk_index: usize,
        text: &str,
        vector: &[f32],
    ) -> Result<()> {
        let conn = self.conn();
        upsert_embedding_in(&conn, proposal_id, chunk_index, text, vector, now_secs())
    }

    pub fn delete_embeddings(&self, proposal_id: &str) -> Result<usize> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM embeddings WHERE proposal_id = ?1", [proposal_id])?;
        Ok(deleted)
    }

    /// Swaps a proposal's chunk set in one transaction, so readers see either
    /// the old chunks or the new ones and no stale chunk indices survive.
    pub fn replace_embeddings(&self, proposal_id: &str, chunks: &[ChunkEmbedding]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM embeddings WHERE proposal_id = ?1", [proposal_id])?;
        let now = now_secs();
        for chunk in chunks {
            upsert_embedding_in(
                &tx,
                proposal_id,
                chunk.chunk_index,
                &chunk.chunk_text,
                &chunk.embedding,
                now,
            )?;
        }
        tx.commit()?;
        debug!(
            "Database: Stored {} chunks for proposal {}",
            chunks.len(),
            proposal_id
        );
        Ok(chunks.len())
    }

    pub fn has_embeddings(&self, proposal_id: &str) -> Result<bool> {
        let conn = self.conn();
        let exists = conn
            .prepare_cached("SELECT 1 FROM embeddings WHERE proposal_id = ?1 LIMIT 1")?
            .exists([proposal_id])?;
        Ok(exists)
    }

    /// The indexing work queue, oldest proposals first.
    pub fn get_proposals_without_embeddings(&self) -> Result<Vec<Proposal>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.proposal_number, p.title, p.description, p.proposer, p.status,
                    p.time_created, p.vote_start, p.vote_end, p.snapshot_block, p.for_votes,
                    p.against_votes, p.abstain_votes, p.quorum_votes, p.executed, p.canceled,
                    p.vetoed, p.queued, p.transaction_hash, p.expires_at, p.executable_from,
                    p.updated_at
             FROM proposals p
             LEFT JOIN embeddings e ON e.proposal_id = p.id
             WHERE e.proposal_id IS NULL
             ORDER BY p.proposal_number ASC",
        )?;
        let rows = stmt.query_map([], proposal_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Every stored chunk with its proposal's number, title and status,
    /// ordered by proposal number descending then chunk index ascending.
    pub fn get_all_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT e.proposal_id, p.proposal_number, p.title, p.status,
                    e.chunk_index, e.chunk_text, e.embedding
             FROM embeddings e
             JOIN proposals p ON p.id = e.proposal_id
             ORDER BY p.proposal_number DESC, e.chunk_index ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, ProposalStatus>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Vec<u8>>(6)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (proposal_id, proposal_number, title, status, chunk_index, chunk_text, blob) = row?;
            results.push(EmbeddingRecord {
                proposal_id,
                proposal_number,
                title,
                status,
                chunk_index: chunk_index as usize,
                chunk_text,
                embedding: unpack_embedding(&blob)?,
            });
        }
        Ok(results)
    }

    /// Stored chunk texts for one proposal, by chunk index.
    pub fn get_embedding_chunks(&self, proposal_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT chunk_text FROM embeddings WHERE proposal_id = ?1 ORDER BY chunk_index ASC",
        )?;
        let rows = stmt.query_map([proposal_id], |row| row.get(0))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Dimensionality of the stored vectors, `None` while the table is empty.
    pub fn embedding_dimension(&self) -> Result<Option<usize>> {
        let conn = self.conn();
        let bytes: Option<i64> = conn
            .query_row("SELECT length(embedding) FROM embeddings LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(bytes.map(|b| b as usize / FLOAT_BYTES))
    }

    pub fn get_embedding_stats(&self) -> Result<EmbeddingStats> {
        let conn = self.conn();
        let stats = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM proposals),
                (SELECT COUNT(DISTINCT proposal_id) FROM embeddings),
                (SELECT COUNT(*) FROM embeddings)",
            [],
            |row| {
                Ok(EmbeddingStats {
                    total_proposals: row.get::<_, i64>(0)? as usize,
                    embedded_proposals: row.get::<_, i64>(1)? as usize,
                    total_chunks: row.get::<_, i64>(2)? as usize,
                })
            },
        )?;
        Ok(stats)
    }
}
