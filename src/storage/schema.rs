//! Database schema definitions.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Courses: route, checkpoints and the current record run
CREATE TABLE IF NOT EXISTS courses (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    route_json TEXT NOT NULL,
    checkpoints_json TEXT NOT NULL,
    total_distance REAL NOT NULL,
    record_json TEXT,
    created_at TEXT NOT NULL
);

-- Every finished run, record or not
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    runner_name TEXT NOT NULL,
    total_time REAL NOT NULL,
    best_lap_time REAL,
    laps_json TEXT NOT NULL,
    new_record INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_course ON runs(course_id, created_at);

-- Pace high scores
CREATE TABLE IF NOT EXISTS high_scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    points INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_high_scores_course ON high_scores(course_id, points DESC);
"#;

/// SQL for the schema version table
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;
