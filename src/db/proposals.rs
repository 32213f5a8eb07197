use super::{now_secs, Database};
use crate::error::Result;
use crate::models::{Page, Proposal, ProposalStatus, SortOrder, Vote};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

const PROPOSAL_COLUMNS: &str = "id, proposal_number, title, description, proposer, status, \
     time_created, vote_start, vote_end, snapshot_block, for_votes, against_votes, \
     abstain_votes, quorum_votes, executed, canceled, vetoed, queued, transaction_hash, \
     expires_at, executable_from, updated_at";

// `id`, `proposal_number`, `proposer` and `time_created` are never touched on conflict.
const UPSERT_PROPOSAL: &str = "
    INSERT INTO proposals (
        id, proposal_number, title, description, proposer, status,
        time_created, vote_start, vote_end, snapshot_block, for_votes, against_votes,
        abstain_votes, quorum_votes, executed, canceled, vetoed, queued, transaction_hash,
        expires_at, executable_from, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
        ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
    )
    ON CONFLICT(id) DO UPDATE SET
        title = excluded.title,
        description = excluded.description,
        status = excluded.status,
        vote_start = excluded.vote_start,
        vote_end = excluded.vote_end,
        for_votes = excluded.for_votes,
        against_votes = excluded.against_votes,
        abstain_votes = excluded.abstain_votes,
        quorum_votes = excluded.quorum_votes,
        executed = excluded.executed,
        canceled = excluded.canceled,
        vetoed = excluded.vetoed,
        queued = excluded.queued,
        expires_at = excluded.expires_at,
        executable_from = excluded.executable_from,
        updated_at = excluded.updated_at";

pub(super) fn proposal_from_row(row: &Row<'_>) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: row.get(0)?,
        proposal_number: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        proposer: row.get(4)?,
        status: row.get(5)?,
        time_created: row.get(6)?,
        vote_start: row.get(7)?,
        vote_end: row.get(8)?,
        snapshot_block: row.get(9)?,
        for_votes: row.get(10)?,
        against_votes: row.get(11)?,
        abstain_votes: row.get(12)?,
        quorum_votes: row.get(13)?,
        executed: row.get(14)?,
        canceled: row.get(15)?,
        vetoed: row.get(16)?,
        queued: row.get(17)?,
        transaction_hash: row.get(18)?,
        expires_at: row.get(19)?,
        executable_from: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

pub(super) fn upsert_proposal_in(conn: &Connection, p: &Proposal, updated_at: i64) -> Result<()> {
    conn.prepare_cached(UPSERT_PROPOSAL)?.execute(rusqlite::params![
        p.id,
        p.proposal_number,
        p.title,
        p.description,
        p.proposer,
        p.status,
        p.time_created,
        p.vote_start,
        p.vote_end,
        p.snapshot_block,
        p.for_votes,
        p.against_votes,
        p.abstain_votes,
        p.quorum_votes,
        p.executed,
        p.canceled,
        p.vetoed,
        p.queued,
        p.transaction_hash,
        p.expires_at,
        p.executable_from,
        updated_at,
    ])?;
    Ok(())
}

impl Database {
    pub fn upsert_proposal(&self, proposal: &Proposal) -> Result<()> {
        let conn = self.conn();
        upsert_proposal_in(&conn, proposal, now_secs())
    }

    /// Upserts every proposal in one transaction. Any failure rolls back the
    /// whole batch. Returns the number of rows written.
    pub fn upsert_proposals(&self, proposals: &[Proposal]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = now_secs();
        for proposal in proposals {
            upsert_proposal_in(&tx, proposal, now)?;
        }
        tx.commit()?;
        debug!("Database: Upserted {} proposals", proposals.len());
        Ok(proposals.len())
    }

    /// Commits one sync page: proposals first, then their votes, all or nothing.
    /// Returns `(proposals_written, votes_written)`.
    pub fn store_sync_page(&self, proposals: &[Proposal], votes: &[Vote]) -> Result<(usize, usize)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = now_secs();
        for proposal in proposals {
            upsert_proposal_in(&tx, proposal, now)?;
        }
        for vote in votes {
            super::votes::upsert_vote_in(&tx, vote)?;
        }
        tx.commit()?;
        Ok((proposals.len(), votes.len()))
    }

    pub fn get_proposal_by_id(&self, id: &str) -> Result<Option<Proposal>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM proposals WHERE id = ?1", PROPOSAL_COLUMNS);
        let proposal = conn
            .query_row(&sql, [id], proposal_from_row)
            .optional()?;
        Ok(proposal)
    }

    pub fn get_proposal_by_number(&self, number: i64) -> Result<Option<Proposal>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM proposals WHERE proposal_number = ?1",
            PROPOSAL_COLUMNS
        );
        let proposal = conn
            .query_row(&sql, [number], proposal_from_row)
            .optional()?;
        Ok(proposal)
    }

    /// Looks a proposal up by chain id (`0x...`, any case) or by its DAO-local
    /// number.
    pub fn get_proposal(&self, id_or_number: &str) -> Result<Option<Proposal>> {
        let key = id_or_number.trim().trim_start_matches('#');
        match key.parse::<i64>() {
            Ok(number) => self.get_proposal_by_number(number),
            Err(_) => self.get_proposal_by_id(&key.to_lowercase()),
        }
    }

    pub fn list_proposals(
        &self,
        status: Option<ProposalStatus>,
        limit: usize,
        offset: usize,
        order: SortOrder,
    ) -> Result<Page<Proposal>> {
        let conn = self.conn();

        // Page and count share one predicate.
        let (predicate, params): (&str, Vec<&dyn rusqlite::ToSql>) = match &status {
            Some(s) => ("WHERE status = ?1", vec![s as &dyn rusqlite::ToSql]),
            None => ("", vec![]),
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM proposals {}", predicate),
            params.as_slice(),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM proposals {} ORDER BY time_created {}, proposal_number {} LIMIT {} OFFSET {}",
            PROPOSAL_COLUMNS,
            predicate,
            order.as_sql(),
            order.as_sql(),
            limit,
            offset
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), proposal_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(Page {
            items,
            total: total as usize,
        })
    }
}
