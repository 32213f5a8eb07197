use super::Database;
use crate::error::Result;
use crate::models::{Page, Vote, VoteSummary, VoteSupport};
use rusqlite::{Connection, Row};
use tracing::debug;

const VOTE_COLUMNS: &str =
    "id, proposal_id, proposal_number, voter, support, weight, reason, timestamp, transaction_hash";

// Only `weight` and `reason` may be corrected by a later sync.
const UPSERT_VOTE: &str = "
    INSERT INTO votes (
        id, proposal_id, proposal_number, voter, support, weight, reason, timestamp, transaction_hash
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        weight = excluded.weight,
        reason = excluded.reason";

fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<Vote> {
    Ok(Vote {
        id: row.get(0)?,
        proposal_id: row.get(1)?,
        proposal_number: row.get(2)?,
        voter: row.get(3)?,
        support: row.get(4)?,
        weight: row.get(5)?,
        reason: row.get(6)?,
        timestamp: row.get(7)?,
        transaction_hash: row.get(8)?,
    })
}

pub(super) fn upsert_vote_in(conn: &Connection, v: &Vote) -> Result<()> {
    conn.prepare_cached(UPSERT_VOTE)?.execute(rusqlite::params![
        v.id,
        v.proposal_id,
        v.proposal_number,
        v.voter,
        v.support,
        v.weight,
        v.reason,
        v.timestamp,
        v.transaction_hash,
    ])?;
    Ok(())
}

impl Database {
    pub fn upsert_vote(&self, vote: &Vote) -> Result<()> {
        let conn = self.conn();
        upsert_vote_in(&conn, vote)
    }

    /// Same all-or-nothing discipline as [`Database::upsert_proposals`].
    pub fn upsert_votes(&self, votes: &[Vote]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for vote in votes {
            upsert_vote_in(&tx, vote)?;
        }
        tx.commit()?;
        debug!("Database: Upserted {} votes", votes.len());
        Ok(votes.len())
    }

    /// Votes for a proposal, newest first.
    pub fn get_votes(
        &self,
        proposal_number: i64,
        support: Option<VoteSupport>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Vote>> {
        let conn = self.conn();

        let mut predicate = String::from("WHERE proposal_number = ?1");
        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&proposal_number];
        if let Some(s) = &support {
            predicate.push_str(" AND support = ?2");
            params.push(s);
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM votes {}", predicate),
            params.as_slice(),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM votes {} ORDER BY timestamp DESC, id ASC LIMIT {} OFFSET {}",
            VOTE_COLUMNS, predicate, limit, offset
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), vote_from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(Page {
            items,
            total: total as usize,
        })
    }

    /// Distinct voters per support value. Counts voters, not rows, so a
    /// source that double-reports a vote does not inflate the tally.
    pub fn get_vote_summary(&self, proposal_number: i64) -> Result<VoteSummary> {
        let conn = self.conn();
        let summary = conn.query_row(
            "SELECT
                COUNT(DISTINCT voter),
                COUNT(DISTINCT CASE WHEN support = 'FOR' THEN voter END),
                COUNT(DISTINCT CASE WHEN support = 'AGAINST' THEN voter END),
                COUNT(DISTINCT CASE WHEN support = 'ABSTAIN' THEN voter END)
             FROM votes WHERE proposal_number = ?1",
            [proposal_number],
            |row| {
                Ok(VoteSummary {
                    total_voters: row.get::<_, i64>(0)? as usize,
                    for_voters: row.get::<_, i64>(1)? as usize,
                    against_voters: row.get::<_, i64>(2)? as usize,
                    abstain_voters: row.get::<_, i64>(3)? as usize,
                })
            },
        )?;
        Ok(summary)
    }
}
