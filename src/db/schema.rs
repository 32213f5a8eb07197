pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS proposals (
        id TEXT PRIMARY KEY,
        proposal_number INTEGER NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        proposer TEXT NOT NULL,
        status TEXT NOT NULL,
        time_created INTEGER NOT NULL,
        vote_start INTEGER NOT NULL,
        vote_end INTEGER NOT NULL,
        snapshot_block INTEGER NOT NULL,
        for_votes INTEGER NOT NULL DEFAULT 0,
        against_votes INTEGER NOT NULL DEFAULT 0,
        abstain_votes INTEGER NOT NULL DEFAULT 0,
        quorum_votes INTEGER NOT NULL DEFAULT 0,
        executed BOOLEAN NOT NULL DEFAULT FALSE,
        canceled BOOLEAN NOT NULL DEFAULT FALSE,
        vetoed BOOLEAN NOT NULL DEFAULT FALSE,
        queued BOOLEAN NOT NULL DEFAULT FALSE,
        transaction_hash TEXT NOT NULL,
        expires_at INTEGER,
        executable_from INTEGER,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_proposals_time_created ON proposals (time_created);
    CREATE INDEX IF NOT EXISTS idx_proposals_status ON proposals (status);

    CREATE TABLE IF NOT EXISTS votes (
        id TEXT PRIMARY KEY,
        proposal_id TEXT NOT NULL REFERENCES proposals (id),
        proposal_number INTEGER NOT NULL,
        voter TEXT NOT NULL,
        support TEXT NOT NULL,
        weight INTEGER NOT NULL DEFAULT 0,
        reason TEXT,
        timestamp INTEGER NOT NULL,
        transaction_hash TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_votes_proposal_number_ts ON votes (proposal_number, timestamp);

    CREATE TABLE IF NOT EXISTS embeddings (
        proposal_id TEXT NOT NULL REFERENCES proposals (id),
        chunk_index INTEGER NOT NULL,
        chunk_text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (proposal_id, chunk_index)
    );
    CREATE INDEX IF NOT EXISTS idx_embeddings_proposal ON embeddings (proposal_id);

    CREATE TABLE IF NOT EXISTS sync_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";
