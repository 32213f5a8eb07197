use crate::config::Config;
use crate::db::{now_secs, Database};
use crate::error::Result;
use crate::models::{Proposal, Vote};
use crate::subgraph::{ProposalSource, SubgraphProposal};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub page_size: usize,
    /// Rows re-scanned by an incremental pass, newest first.
    pub recent_window: usize,
    pub votes_page_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 200,
            recent_window: 200,
            votes_page_size: 1000,
        }
    }
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.sync_page_size,
            recent_window: config.sync_recent_window,
            votes_page_size: config.sync_votes_page_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub full: bool,
    pub pages: usize,
    pub proposals_written: usize,
    pub votes_written: usize,
    pub duration_ms: u64,
}

/// Reconciles the cache against a [`ProposalSource`].
///
/// The subgraph has no reliable "changed since" filter, so every pass re-reads
/// proposals newest first and relies on idempotent upserts to converge. A
/// full pass walks the whole history; an incremental pass stops after
/// `recent_window` rows. Each page commits atomically with its votes.
pub struct SyncEngine {
    db: Database,
    source: Arc<dyn ProposalSource>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(db: Database, source: Arc<dyn ProposalSource>, options: SyncOptions) -> Self {
        let options = SyncOptions {
            page_size: options.page_size.max(1),
            votes_page_size: options.votes_page_size.max(1),
            ..options
        };
        Self {
            db,
            source,
            options,
        }
    }

    pub async fn sync(&self, full: bool) -> Result<SyncSummary> {
        let started = Instant::now();
        let mut summary = SyncSummary {
            full,
            ..Default::default()
        };
        let mut offset = 0usize;

        info!(
            "Sync: starting {} pass (page size {})",
            if full { "full" } else { "incremental" },
            self.options.page_size
        );

        loop {
            let first = if full {
                self.options.page_size
            } else {
                self.options
                    .page_size
                    .min(self.options.recent_window.saturating_sub(offset))
            };
            if first == 0 {
                break;
            }

            let page = self
                .source
                .fetch_proposals_page(offset, first, self.options.votes_page_size)
                .await
                .map_err(|e| e.with_pages_committed(summary.pages))?;
            let fetched = page.items.len();
            let has_more = page.has_more && fetched >= first;

            let (proposals, votes) = self
                .collect_page(page.items, now_secs())
                .await
                .map_err(|e| e.with_pages_committed(summary.pages))?;

            let stored = self
                .db
                .run_blocking(move |db| db.store_sync_page(&proposals, &votes))
                .await;
            let (proposals_written, votes_written) = match stored {
                Ok(counts) => counts,
                Err(e) => {
                    warn!(
                        "Sync: page at offset {} failed after {} committed page(s): {}",
                        offset, summary.pages, e
                    );
                    return Err(e.sync_aborted(offset, summary.pages));
                }
            };

            summary.pages += 1;
            summary.proposals_written += proposals_written;
            summary.votes_written += votes_written;
            offset += fetched;
            debug!(
                "Sync: committed page {} ({} proposals, {} votes)",
                summary.pages, proposals_written, votes_written
            );

            if !has_more {
                break;
            }
        }

        let finished_at = now_secs();
        self.db
            .run_blocking(move |db| db.set_last_sync_time(finished_at))
            .await?;

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Sync: wrote {} proposals and {} votes in {} page(s), {}ms",
            summary.proposals_written, summary.votes_written, summary.pages, summary.duration_ms
        );
        Ok(summary)
    }

    /// Converts a fetched page into cache records, pulling any votes beyond the
    /// nested limit so the page commits with its complete vote set.
    async fn collect_page(
        &self,
        items: Vec<SubgraphProposal>,
        now: i64,
    ) -> Result<(Vec<Proposal>, Vec<Vote>)> {
        let mut proposals = Vec::with_capacity(items.len());
        let mut votes = Vec::new();

        for item in items {
            let proposal = item.to_proposal(now);
            let mut seen = HashSet::new();
            let mut nested_full = item.votes.len() >= self.options.votes_page_size;

            for vote in &item.votes {
                if seen.insert(vote.id.clone()) {
                    votes.push(vote.to_vote(&proposal));
                }
            }

            let mut skip = item.votes.len();
            while nested_full {
                let page = self
                    .source
                    .fetch_votes_page(&item.proposal_id, skip, self.options.votes_page_size)
                    .await?;
                skip += page.items.len();
                nested_full = page.has_more;
                for vote in &page.items {
                    if seen.insert(vote.id.clone()) {
                        votes.push(vote.to_vote(&proposal));
                    }
                }
            }

            proposals.push(proposal);
        }

        Ok((proposals, votes))
    }
}
