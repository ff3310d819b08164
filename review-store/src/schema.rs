//! Embedded schema. Executed statement by statement at connect time; every
//! statement is idempotent so repeated boots are safe.

pub(crate) const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tenants (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        gold_score_threshold INTEGER NOT NULL DEFAULT 80,
        gold_min_approvals INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tenant_secrets (
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        provider TEXT NOT NULL,
        webhook_secret TEXT NOT NULL,
        PRIMARY KEY (tenant_id, provider)
    )",
    "CREATE INDEX IF NOT EXISTS idx_tenant_secrets_lookup
        ON tenant_secrets (provider, webhook_secret)",
    "CREATE TABLE IF NOT EXISTS repositories (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        provider TEXT NOT NULL,
        provider_repo_id TEXT NOT NULL,
        namespace TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        default_branch TEXT NOT NULL DEFAULT 'main',
        UNIQUE (tenant_id, provider, provider_repo_id)
    )",
    "CREATE TABLE IF NOT EXISTS merge_requests (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        repository_id TEXT NOT NULL REFERENCES repositories(id),
        iid INTEGER NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        author TEXT,
        source_branch TEXT NOT NULL DEFAULT '',
        target_branch TEXT NOT NULL DEFAULT '',
        state TEXT NOT NULL DEFAULT 'opened',
        web_url TEXT NOT NULL DEFAULT '',
        last_seen_sha TEXT,
        UNIQUE (tenant_id, repository_id, iid)
    )",
    "CREATE TABLE IF NOT EXISTS review_runs (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        merge_request_id TEXT NOT NULL REFERENCES merge_requests(id),
        head_sha TEXT NOT NULL,
        status TEXT NOT NULL,
        phase TEXT,
        progress_message TEXT,
        score INTEGER,
        summary TEXT,
        error TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_review_runs_listing
        ON review_runs (tenant_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_review_runs_mr
        ON review_runs (tenant_id, merge_request_id, head_sha, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS review_check_results (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        review_run_id TEXT NOT NULL REFERENCES review_runs(id),
        check_key TEXT NOT NULL,
        category TEXT NOT NULL,
        status TEXT NOT NULL,
        severity TEXT NOT NULL,
        message TEXT NOT NULL DEFAULT '',
        file_path TEXT,
        line_start INTEGER,
        line_end INTEGER,
        evidence TEXT,
        UNIQUE (review_run_id, check_key)
    )",
    "CREATE TABLE IF NOT EXISTS ai_suggestions (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        review_run_id TEXT NOT NULL REFERENCES review_runs(id),
        check_key TEXT NOT NULL,
        severity TEXT NOT NULL,
        title TEXT NOT NULL,
        rationale TEXT NOT NULL DEFAULT '',
        suggested_fix TEXT NOT NULL DEFAULT '',
        files TEXT NOT NULL DEFAULT '[]'
    )",
    "CREATE TABLE IF NOT EXISTS posted_comments (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        review_run_id TEXT NOT NULL REFERENCES review_runs(id),
        provider TEXT NOT NULL,
        provider_id TEXT NOT NULL,
        comment_type TEXT NOT NULL DEFAULT 'SUMMARY',
        body TEXT NOT NULL,
        ai_included INTEGER NOT NULL DEFAULT 0,
        ai_summary_hash TEXT,
        UNIQUE (review_run_id, comment_type)
    )",
    "CREATE TABLE IF NOT EXISTS knowledge_sources (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        source_type TEXT NOT NULL,
        provider TEXT NOT NULL,
        provider_id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        source_url TEXT,
        content_text TEXT NOT NULL DEFAULT '',
        content_hash TEXT NOT NULL,
        metadata TEXT,
        feature_tokens TEXT NOT NULL DEFAULT '[]',
        UNIQUE (tenant_id, content_hash),
        UNIQUE (tenant_id, source_type, provider, provider_id)
    )",
    "CREATE TABLE IF NOT EXISTS tenant_ai_configs (
        tenant_id TEXT PRIMARY KEY REFERENCES tenants(id),
        enabled INTEGER NOT NULL DEFAULT 0,
        provider TEXT NOT NULL DEFAULT 'openai',
        model TEXT NOT NULL DEFAULT 'gpt-4o-mini',
        max_suggestions INTEGER NOT NULL DEFAULT 3,
        max_prompt_chars INTEGER NOT NULL DEFAULT 24000,
        max_total_diff_bytes INTEGER NOT NULL DEFAULT 524288
    )",
    "CREATE TABLE IF NOT EXISTS check_configs (
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        check_key TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        severity_override TEXT,
        thresholds TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (tenant_id, check_key)
    )",
];
