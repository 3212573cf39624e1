//! Course and record store using rusqlite.

use crate::racing::checkpoint::Checkpoint;
use crate::racing::ghost::{RecordRun, StoredRecordRun};
use crate::racing::results::{is_new_record, HighScore, RunSubmission};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::world::course::Course;
use crate::world::route::{Route, RouteSegment};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Failure of a store operation. Never fatal to a race in progress.
pub type PersistenceError = DatabaseError;

/// Course and record persistence used by a race session.
pub trait CourseStore {
    /// Route of a course.
    fn load_route(&self, course_id: &str) -> Result<Route, PersistenceError>;

    /// Current record run of a course, migrated to absolute distances.
    fn load_record_run(&self, course_id: &str) -> Result<Option<RecordRun>, PersistenceError>;

    /// Store a finished run. Returns whether it became the new record.
    fn save_run(&self, course_id: &str, run: &RunSubmission) -> Result<bool, PersistenceError>;

    /// Store a pace high score.
    fn save_high_score(&self, course_id: &str, score: &HighScore) -> Result<(), PersistenceError>;
}

/// Course listing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseSummary {
    pub id: String,
    pub name: String,
    pub total_distance: f64,
    pub record_time: Option<f64>,
}

/// Stored run history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: Uuid,
    pub runner_name: String,
    pub total_time: f64,
    pub best_lap_time: Option<f64>,
    pub new_record: bool,
}

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========== Courses ==========

    /// Insert a new course. Fails if the id is taken.
    pub fn insert_course(&self, course: &Course) -> Result<(), DatabaseError> {
        let route_json = serde_json::to_string(course.route.segments())
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let checkpoints_json = serde_json::to_string(&course.checkpoints)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO courses (id, name, route_json, checkpoints_json, total_distance, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    course.id,
                    course.name,
                    route_json,
                    checkpoints_json,
                    course.total_distance(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DatabaseError::ConstraintViolation(format!("course {} exists", course.id))
                }
                e => DatabaseError::QueryFailed(e.to_string()),
            })?;

        tracing::info!(
            "Saved course {} ({:.2} miles)",
            course.id,
            course.total_distance()
        );

        Ok(())
    }

    /// Load a course by id.
    pub fn load_course(&self, id: &str) -> Result<Option<Course>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT name, route_json, checkpoints_json FROM courses WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let Some((name, route_json, checkpoints_json)) = row else {
            return Ok(None);
        };

        let route = parse_route(&route_json)?;
        let checkpoints: Vec<Checkpoint> = serde_json::from_str(&checkpoints_json)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;

        Ok(Some(Course {
            id: id.to_string(),
            name,
            route,
            checkpoints,
        }))
    }

    /// All courses, by name.
    pub fn list_courses(&self) -> Result<Vec<CourseSummary>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, total_distance, record_json FROM courses ORDER BY name")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut courses = Vec::new();
        for row in rows {
            let (id, name, total_distance, record_json) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            let record_time = record_json
                .map(|json| parse_record(&json, total_distance))
                .transpose()?
                .map(|r| r.total_time);

            courses.push(CourseSummary {
                id,
                name,
                total_distance,
                record_time,
            });
        }

        Ok(courses)
    }

    /// Replace a course's record run without comparison.
    pub fn set_record_run(&self, course_id: &str, record: &RecordRun) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(record)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let updated = self
            .conn
            .execute(
                "UPDATE courses SET record_json = ?1 WHERE id = ?2",
                params![json, course_id],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound(format!("course {}", course_id)));
        }
        Ok(())
    }

    // ========== Runs and high scores ==========

    /// Run history for a course, newest first.
    pub fn list_runs(&self, course_id: &str) -> Result<Vec<RunRecord>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, runner_name, total_time, best_lap_time, new_record
                 FROM runs WHERE course_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![course_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, runner_name, total_time, best_lap_time, new_record) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            runs.push(RunRecord {
                id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
                runner_name,
                total_time,
                best_lap_time,
                new_record,
            });
        }

        Ok(runs)
    }

    /// Best high scores for a course.
    pub fn top_high_scores(
        &self,
        course_id: &str,
        limit: u32,
    ) -> Result<Vec<HighScore>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, points FROM high_scores WHERE course_id = ?1
                 ORDER BY points DESC, id ASC LIMIT ?2",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![course_id, limit], |row| {
                Ok(HighScore {
                    name: row.get(0)?,
                    points: row.get(1)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<SqliteResult<Vec<_>>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    fn course_distance_and_record(
        &self,
        course_id: &str,
    ) -> Result<(f64, Option<String>), DatabaseError> {
        self.conn
            .query_row(
                "SELECT total_distance, record_json FROM courses WHERE id = ?1",
                params![course_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
            .ok_or_else(|| DatabaseError::NotFound(format!("course {}", course_id)))
    }
}

impl CourseStore for Database {
    fn load_route(&self, course_id: &str) -> Result<Route, PersistenceError> {
        let route_json: String = self
            .conn
            .query_row(
                "SELECT route_json FROM courses WHERE id = ?1",
                params![course_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
            .ok_or_else(|| DatabaseError::NotFound(format!("course {}", course_id)))?;

        parse_route(&route_json)
    }

    fn load_record_run(&self, course_id: &str) -> Result<Option<RecordRun>, PersistenceError> {
        let (total_distance, record_json) = self.course_distance_and_record(course_id)?;
        record_json
            .map(|json| parse_record(&json, total_distance))
            .transpose()
    }

    fn save_run(&self, course_id: &str, run: &RunSubmission) -> Result<bool, PersistenceError> {
        let current = self.load_record_run(course_id)?;
        let candidate = run.record_candidate();
        let new_record = candidate
            .as_ref()
            .is_some_and(|c| is_new_record(c.total_time, current.as_ref()));

        let laps_json = serde_json::to_string(&run.laps)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tx.execute(
            "INSERT INTO runs (id, course_id, runner_name, total_time, best_lap_time, laps_json, new_record, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Uuid::new_v4().to_string(),
                course_id,
                run.runner_name,
                run.total_time,
                candidate.as_ref().map(|c| c.total_time),
                laps_json,
                new_record,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let (true, Some(record)) = (new_record, candidate.as_ref()) {
            let record_json = serde_json::to_string(record)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            tx.execute(
                "UPDATE courses SET record_json = ?1 WHERE id = ?2",
                params![record_json, course_id],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        if let (true, Some(record)) = (new_record, candidate) {
            tracing::info!(
                "New record on {}: {} in {:.2}s",
                course_id,
                record.runner_name,
                record.total_time
            );
        }

        Ok(new_record)
    }

    fn save_high_score(&self, course_id: &str, score: &HighScore) -> Result<(), PersistenceError> {
        self.conn
            .execute(
                "INSERT INTO high_scores (course_id, name, points, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![course_id, score.name, score.points, Utc::now().to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}

fn parse_route(json: &str) -> Result<Route, DatabaseError> {
    let segments: Vec<RouteSegment> =
        serde_json::from_str(json).map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
    Route::new(segments).map_err(|e| DatabaseError::DeserializationError(e.to_string()))
}

fn parse_record(json: &str, total_distance: f64) -> Result<RecordRun, DatabaseError> {
    let stored: StoredRecordRun =
        serde_json::from_str(json).map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
    Ok(stored.migrate(total_distance))
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
