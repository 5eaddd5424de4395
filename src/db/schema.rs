//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `resource_state` table (durable record of one resource actor, keyed by actor key)
/// - `sync_plans` table (one row per distinct resource id, the dedup index)
/// - `sync_history` table (append-only log of sync attempts)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Resource actor state (JSON record per actor key)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS resource_state (
    actor_key TEXT PRIMARY KEY NOT NULL,
    record TEXT NOT NULL, -- JSON
    updated_at TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Sync plans
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sync_plans (
    id TEXT PRIMARY KEY NOT NULL,
    provider TEXT NOT NULL,
    resource_id TEXT NOT NULL UNIQUE,
    user_ids TEXT NOT NULL DEFAULT '[]', -- JSON array, insertion ordered
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Sync history (append-only)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sync_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    sync_plan_id TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    user_id TEXT NULL,
    started_at TEXT NOT NULL, -- RFC3339
    completed_at TEXT NOT NULL, -- RFC3339
    previous_cursor TEXT NOT NULL,
    new_cursor TEXT NOT NULL,
    items_processed INTEGER NOT NULL,
    updated_paths TEXT NOT NULL, -- JSON array
    status TEXT NOT NULL,
    error_message TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_history_resource ON sync_history(resource_id, seq);
CREATE INDEX IF NOT EXISTS idx_sync_history_plan ON sync_history(sync_plan_id, seq);
CREATE INDEX IF NOT EXISTS idx_sync_history_user ON sync_history(user_id, seq);
"#;
