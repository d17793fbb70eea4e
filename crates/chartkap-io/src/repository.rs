//! Chart repository: survey data, annotations and production markers.
//!
//! [`ChartRepository`] is the orchestrator's view of persistence.
//! [`SqliteRepository`] implements it on a single SQLite file with three
//! tables:
//!
//! - `charts`: one row per chart with its survey fields, workflow status
//!   and `generated_at` marker.
//! - `insets`: sub-charts with their `cropped_at` marker.
//! - `points`: boundary (`PLY`) and crop (`CROP`) annotations. Replaced
//!   annotations are kept with `active = 0`.
//!
//! Timestamps are stored as RFC 3339 text in UTC.

use std::path::Path;

use chartkap_pipeline::{ChartNumber, ChartStatus, PolygonPoint, SurveyFields};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params};

/// Errors from the chart repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The database failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No chart with this number exists.
    #[error("chart {0} not found")]
    NotFound(ChartNumber),

    /// A stored chart number is not all digits.
    #[error("stored chart number {0:?} is invalid")]
    InvalidChartNumber(String),

    /// A stored timestamp cannot be read.
    #[error("stored timestamp {value:?} is not RFC 3339: {source}")]
    Timestamp {
        /// The raw stored value.
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// An inset of a chart and its crop marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsetRecord {
    /// Inset id, unique within the chart.
    pub inset_id: String,
    /// When the inset was last cropped.
    pub cropped_at: Option<DateTime<Utc>>,
}

/// Extremes of an inset's active `CROP` annotations, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropExtremes {
    /// Leftmost annotated column.
    pub min_x: i64,
    /// Rightmost annotated column.
    pub max_x: i64,
    /// Topmost annotated row.
    pub min_y: i64,
    /// Bottom annotated row.
    pub max_y: i64,
}

/// Persistence operations needed by the orchestrator.
pub trait ChartRepository {
    /// Charts in a batch-eligible status without a `generated_at` marker.
    fn fetch_pending_base(&self) -> Result<Vec<ChartNumber>, RepositoryError>;

    /// Insets with usable `CROP` annotations and no `cropped_at` marker.
    ///
    /// Insets whose annotations all sit at pixel (0, 0) are left out.
    fn fetch_pending_insets(&self) -> Result<Vec<(ChartNumber, String)>, RepositoryError>;

    /// Raw survey fields of a chart; `NotFound` for unknown charts.
    fn fetch_survey_fields(&self, chart: &ChartNumber) -> Result<SurveyFields, RepositoryError>;

    /// Active boundary points of the chart, ordered by sequence.
    fn fetch_boundary_points(
        &self,
        chart: &ChartNumber,
    ) -> Result<Vec<PolygonPoint>, RepositoryError>;

    /// Active insets of the chart, ordered by id.
    fn fetch_insets(&self, chart: &ChartNumber) -> Result<Vec<InsetRecord>, RepositoryError>;

    /// Extremes of the inset's active `CROP` annotations.
    ///
    /// `None` without any, or when every annotation sits at pixel (0, 0),
    /// matching what [`fetch_pending_insets`](Self::fetch_pending_insets)
    /// leaves out.
    fn fetch_inset_crop_points(
        &self,
        chart: &ChartNumber,
        inset_id: &str,
    ) -> Result<Option<CropExtremes>, RepositoryError>;

    /// The chart's `generated_at` marker.
    fn fetch_generated_at(
        &self,
        chart: &ChartNumber,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    /// Set the chart's `generated_at` marker.
    fn mark_produced(&self, chart: &ChartNumber, at: DateTime<Utc>)
    -> Result<(), RepositoryError>;

    /// Clear the chart's `generated_at` marker.
    fn clear_produced(&self, chart: &ChartNumber) -> Result<(), RepositoryError>;

    /// Set an inset's `cropped_at` marker.
    fn mark_cropped(
        &self,
        chart: &ChartNumber,
        inset_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Store an imported boundary in one transaction.
    ///
    /// The active boundary points are deactivated and replaced by
    /// `points`, the `generated_at` marker is cleared and the status set
    /// to `status`. Nothing changes if any step fails.
    fn import_boundary_points(
        &self,
        chart: &ChartNumber,
        points: &[PolygonPoint],
        status: ChartStatus,
    ) -> Result<(), RepositoryError>;

    /// The chart's workflow status.
    fn chart_status(&self, chart: &ChartNumber) -> Result<ChartStatus, RepositoryError>;

    /// Set the chart's workflow status.
    fn set_status(&self, chart: &ChartNumber, status: ChartStatus) -> Result<(), RepositoryError>;
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS charts (
    number TEXT PRIMARY KEY,
    status_id INTEGER NOT NULL DEFAULT 1,
    title TEXT,
    width INTEGER,
    height INTEGER,
    prerotate INTEGER NOT NULL DEFAULT 0,
    cornersize INTEGER NOT NULL DEFAULT 1500,
    north REAL,
    south REAL,
    east REAL,
    west REAL,
    xsw INTEGER, ysw INTEGER,
    xnw INTEGER, ynw INTEGER,
    xne INTEGER, yne INTEGER,
    xse INTEGER, yse INTEGER,
    scale INTEGER,
    datum TEXT,
    projection TEXT,
    projection_parameter REAL,
    units TEXT,
    sounding_datum TEXT,
    dtm_lat REAL,
    dtm_lon REAL,
    dtm_datum TEXT,
    edition_date TEXT,
    edition TEXT,
    correction TEXT,
    kap_type TEXT NOT NULL DEFAULT 'BASE',
    chart_format TEXT,
    generated_at TEXT
);

CREATE TABLE IF NOT EXISTS insets (
    number TEXT NOT NULL REFERENCES charts(number),
    inset_id TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    cropped_at TEXT,
    PRIMARY KEY (number, inset_id)
);

CREATE TABLE IF NOT EXISTS points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL REFERENCES charts(number),
    inset_id TEXT,
    point_type TEXT NOT NULL CHECK (point_type IN ('PLY', 'CROP')),
    sequence INTEGER,
    latitude REAL,
    longitude REAL,
    x INTEGER,
    y INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_points_owner ON points(number, inset_id, point_type, active);
";

/// Columns of `charts` that are bookkeeping, not survey data.
const NON_SURVEY_COLUMNS: [&str; 3] = ["number", "status_id", "generated_at"];

/// [`ChartRepository`] on a SQLite database.
#[derive(Debug)]
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Sqlite`] if the file cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// A fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Sqlite`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Register a chart with its survey fields.
    ///
    /// Unknown field names are rejected by SQLite.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Sqlite`] on constraint violations or
    /// unknown columns.
    pub fn insert_chart(
        &self,
        chart: &ChartNumber,
        status: ChartStatus,
        fields: &[(&str, &dyn rusqlite::ToSql)],
    ) -> Result<(), RepositoryError> {
        let mut columns = vec!["number", "status_id"];
        columns.extend(fields.iter().map(|(name, _)| *name));
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO charts ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        let number = chart.as_str();
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&number, &status.0];
        values.extend(fields.iter().map(|(_, value)| *value));
        self.conn.execute(&sql, values.as_slice())?;
        Ok(())
    }

    /// Register an inset of `chart`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Sqlite`] on constraint violations.
    pub fn insert_inset(&self, chart: &ChartNumber, inset_id: &str) -> Result<(), RepositoryError> {
        self.conn.execute(
            "INSERT INTO insets (number, inset_id) VALUES (?1, ?2)",
            params![chart.as_str(), inset_id],
        )?;
        Ok(())
    }

    /// Annotate one corner of an inset's crop box.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Sqlite`] on constraint violations.
    pub fn insert_crop_point(
        &self,
        chart: &ChartNumber,
        inset_id: &str,
        x: i64,
        y: i64,
    ) -> Result<(), RepositoryError> {
        self.conn.execute(
            "INSERT INTO points (number, inset_id, point_type, x, y, created_at)
             VALUES (?1, ?2, 'CROP', ?3, ?4, ?5)",
            params![chart.as_str(), inset_id, x, y, timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn update_chart(
        &self,
        chart: &ChartNumber,
        sql: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<(), RepositoryError> {
        let changed = self.conn.execute(sql, params![chart.as_str(), value])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(chart.clone()));
        }
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|source| RepositoryError::Timestamp { value: raw, source })
        })
        .transpose()
}

fn chart_number(raw: String) -> Result<ChartNumber, RepositoryError> {
    ChartNumber::parse(&raw).map_err(|_| RepositoryError::InvalidChartNumber(raw))
}

/// Survey value of a column as the text the calibration builder parses.
fn field_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

impl ChartRepository for SqliteRepository {
    fn fetch_pending_base(&self) -> Result<Vec<ChartNumber>, RepositoryError> {
        let eligible = ChartStatus::BATCH_ELIGIBLE
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT number FROM charts
             WHERE status_id IN ({eligible}) AND generated_at IS NULL
             ORDER BY number"
        ))?;
        let numbers = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        numbers.into_iter().map(chart_number).collect()
    }

    fn fetch_pending_insets(&self) -> Result<Vec<(ChartNumber, String)>, RepositoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT i.number, i.inset_id FROM insets i
             JOIN charts c ON c.number = i.number
             WHERE i.active = 1 AND i.cropped_at IS NULL
               AND EXISTS (
                   SELECT 1 FROM points p
                   WHERE p.number = i.number AND p.inset_id = i.inset_id
                     AND p.point_type = 'CROP' AND p.active = 1
                     AND (p.x <> 0 OR p.y <> 0))
             ORDER BY i.number, i.inset_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(number, inset)| Ok((chart_number(number)?, inset)))
            .collect()
    }

    fn fetch_survey_fields(&self, chart: &ChartNumber) -> Result<SurveyFields, RepositoryError> {
        let mut stmt = self.conn.prepare("SELECT * FROM charts WHERE number = ?1")?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let fields = stmt
            .query_row(params![chart.as_str()], |row| {
                let mut fields = SurveyFields::new();
                for (i, name) in columns.iter().enumerate() {
                    if NON_SURVEY_COLUMNS.contains(&name.as_str()) {
                        continue;
                    }
                    if let Some(text) = field_text(row.get_ref(i)?) {
                        fields.insert(name.as_str(), text);
                    }
                }
                Ok(fields)
            })
            .optional()?;
        fields.ok_or_else(|| RepositoryError::NotFound(chart.clone()))
    }

    fn fetch_boundary_points(
        &self,
        chart: &ChartNumber,
    ) -> Result<Vec<PolygonPoint>, RepositoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, latitude, longitude FROM points
             WHERE number = ?1 AND inset_id IS NULL AND point_type = 'PLY' AND active = 1
             ORDER BY sequence",
        )?;
        let points = stmt
            .query_map(params![chart.as_str()], |row| {
                Ok(PolygonPoint {
                    sequence: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    fn fetch_insets(&self, chart: &ChartNumber) -> Result<Vec<InsetRecord>, RepositoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT inset_id, cropped_at FROM insets
             WHERE number = ?1 AND active = 1
             ORDER BY inset_id",
        )?;
        let rows = stmt
            .query_map(params![chart.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(inset_id, cropped_at)| {
                Ok(InsetRecord {
                    inset_id,
                    cropped_at: parse_timestamp(cropped_at)?,
                })
            })
            .collect()
    }

    fn fetch_inset_crop_points(
        &self,
        chart: &ChartNumber,
        inset_id: &str,
    ) -> Result<Option<CropExtremes>, RepositoryError> {
        let extremes = self.conn.query_row(
            "SELECT MIN(x), MAX(x), MIN(y), MAX(y), MAX(x <> 0 OR y <> 0) FROM points
             WHERE number = ?1 AND inset_id = ?2 AND point_type = 'CROP' AND active = 1",
            params![chart.as_str(), inset_id],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<bool>>(4)?,
                ))
            },
        )?;
        Ok(match extremes {
            (Some(min_x), Some(max_x), Some(min_y), Some(max_y), Some(true)) => Some(CropExtremes {
                min_x,
                max_x,
                min_y,
                max_y,
            }),
            _ => None,
        })
    }

    fn fetch_generated_at(
        &self,
        chart: &ChartNumber,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let raw = self
            .conn
            .query_row(
                "SELECT generated_at FROM charts WHERE number = ?1",
                params![chart.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound(chart.clone()))?;
        parse_timestamp(raw)
    }

    fn mark_produced(
        &self,
        chart: &ChartNumber,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.update_chart(
            chart,
            "UPDATE charts SET generated_at = ?2 WHERE number = ?1",
            &timestamp(at),
        )
    }

    fn clear_produced(&self, chart: &ChartNumber) -> Result<(), RepositoryError> {
        self.update_chart(
            chart,
            "UPDATE charts SET generated_at = ?2 WHERE number = ?1",
            &rusqlite::types::Null,
        )
    }

    fn mark_cropped(
        &self,
        chart: &ChartNumber,
        inset_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let changed = self.conn.execute(
            "UPDATE insets SET cropped_at = ?3 WHERE number = ?1 AND inset_id = ?2",
            params![chart.as_str(), inset_id, timestamp(at)],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(chart.clone()));
        }
        Ok(())
    }

    fn import_boundary_points(
        &self,
        chart: &ChartNumber,
        points: &[PolygonPoint],
        status: ChartStatus,
    ) -> Result<(), RepositoryError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE charts SET generated_at = NULL, status_id = ?2 WHERE number = ?1",
            params![chart.as_str(), status.0],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(chart.clone()));
        }
        tx.execute(
            "UPDATE points SET active = 0
             WHERE number = ?1 AND inset_id IS NULL AND point_type = 'PLY' AND active = 1",
            params![chart.as_str()],
        )?;
        let created_at = timestamp(Utc::now());
        {
            let mut insert = tx.prepare(
                "INSERT INTO points (number, point_type, sequence, latitude, longitude, created_at)
                 VALUES (?1, 'PLY', ?2, ?3, ?4, ?5)",
            )?;
            for p in points {
                insert.execute(params![
                    chart.as_str(),
                    p.sequence,
                    p.latitude,
                    p.longitude,
                    created_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn chart_status(&self, chart: &ChartNumber) -> Result<ChartStatus, RepositoryError> {
        self.conn
            .query_row(
                "SELECT status_id FROM charts WHERE number = ?1",
                params![chart.as_str()],
                |row| row.get::<_, u16>(0),
            )
            .optional()?
            .map(ChartStatus)
            .ok_or_else(|| RepositoryError::NotFound(chart.clone()))
    }

    fn set_status(&self, chart: &ChartNumber, status: ChartStatus) -> Result<(), RepositoryError> {
        self.update_chart(
            chart,
            "UPDATE charts SET status_id = ?2 WHERE number = ?1",
            &status.0,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chartkap_pipeline::calibration::field;

    use super::*;

    fn chart(number: &str) -> ChartNumber {
        ChartNumber::parse(number).unwrap()
    }

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    fn repo_with_chart() -> SqliteRepository {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.insert_chart(
            &chart("25641"),
            ChartStatus::NEW,
            &[
                ("title", &"Approaches"),
                ("north", &11.0),
                ("south", &10.0),
                ("xne", &1200),
                ("width", &1200),
            ],
        )
        .unwrap();
        repo
    }

    #[test]
    fn survey_fields_skip_nulls_and_bookkeeping() {
        let repo = repo_with_chart();
        let fields = repo.fetch_survey_fields(&chart("25641")).unwrap();
        assert_eq!(fields.text(field::TITLE), Some("Approaches"));
        assert_eq!(fields.number(field::NORTH).unwrap(), Some(11.0));
        assert_eq!(fields.number(field::X_NE).unwrap(), Some(1200.0));
        assert_eq!(fields.text(field::PRE_ROTATE), Some("0"));
        assert_eq!(fields.text(field::EAST), None);
        assert_eq!(fields.text("status_id"), None);
        assert_eq!(fields.text("number"), None);
    }

    #[test]
    fn unknown_chart_is_not_found() {
        let repo = repo_with_chart();
        assert!(matches!(
            repo.fetch_survey_fields(&chart("1")),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.mark_produced(&chart("1"), Utc::now()),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.chart_status(&chart("1")),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn produced_marker_controls_pending_base() {
        let repo = repo_with_chart();
        repo.insert_chart(&chart("4000"), ChartStatus(5), &[]).unwrap();
        assert_eq!(repo.fetch_pending_base().unwrap(), vec![chart("25641")]);

        let when = at("2024-03-01T12:00:00Z");
        repo.mark_produced(&chart("25641"), when).unwrap();
        assert_eq!(repo.fetch_generated_at(&chart("25641")).unwrap(), Some(when));
        assert!(repo.fetch_pending_base().unwrap().is_empty());

        repo.clear_produced(&chart("25641")).unwrap();
        assert_eq!(repo.fetch_generated_at(&chart("25641")).unwrap(), None);
        assert_eq!(repo.fetch_pending_base().unwrap().len(), 1);
    }

    fn ply(sequence: u32, latitude: f64) -> PolygonPoint {
        PolygonPoint {
            sequence,
            latitude,
            longitude: -69.5,
        }
    }

    #[test]
    fn importing_boundary_deactivates_old_points() {
        let repo = repo_with_chart();
        let c = chart("25641");
        let status = ChartStatus::NEEDS_REGENERATION;
        repo.import_boundary_points(&c, &[ply(1, 10.1), ply(2, 10.2), ply(3, 10.3)], status)
            .unwrap();
        repo.mark_produced(&c, at("2024-03-01T12:00:00Z")).unwrap();
        repo.import_boundary_points(&c, &[ply(2, 10.9), ply(1, 10.8)], status)
            .unwrap();
        assert_eq!(repo.fetch_generated_at(&c).unwrap(), None);
        assert_eq!(repo.chart_status(&c).unwrap(), status);
        assert_eq!(
            repo.fetch_boundary_points(&c).unwrap(),
            vec![ply(1, 10.8), ply(2, 10.9)]
        );
        let inactive: i64 = repo
            .conn
            .query_row("SELECT COUNT(*) FROM points WHERE active = 0", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(inactive, 3);
    }

    #[test]
    fn boundary_import_of_unknown_chart_stores_nothing() {
        let repo = repo_with_chart();
        assert!(matches!(
            repo.import_boundary_points(
                &chart("1"),
                &[ply(1, 10.1), ply(2, 10.2)],
                ChartStatus::NEEDS_REGENERATION
            ),
            Err(RepositoryError::NotFound(_))
        ));
        let stored: i64 = repo
            .conn
            .query_row("SELECT COUNT(*) FROM points", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, 0);
    }

    #[test]
    fn crop_extremes_and_pending_insets() {
        let repo = repo_with_chart();
        let c = chart("25641");
        repo.insert_inset(&c, "A").unwrap();
        repo.insert_inset(&c, "B").unwrap();
        repo.insert_inset(&c, "C").unwrap();
        for (x, y) in [(100, 50), (600, 450), (100, 450)] {
            repo.insert_crop_point(&c, "A", x, y).unwrap();
        }
        // B was annotated at the origin only; C not at all.
        repo.insert_crop_point(&c, "B", 0, 0).unwrap();

        assert_eq!(
            repo.fetch_inset_crop_points(&c, "A").unwrap(),
            Some(CropExtremes {
                min_x: 100,
                max_x: 600,
                min_y: 50,
                max_y: 450
            })
        );
        assert_eq!(repo.fetch_inset_crop_points(&c, "B").unwrap(), None);
        assert_eq!(repo.fetch_inset_crop_points(&c, "C").unwrap(), None);
        assert_eq!(
            repo.fetch_pending_insets().unwrap(),
            vec![(c.clone(), "A".to_owned())]
        );

        let when = at("2024-03-02T08:30:00Z");
        repo.mark_cropped(&c, "A", when).unwrap();
        assert!(repo.fetch_pending_insets().unwrap().is_empty());
        let insets = repo.fetch_insets(&c).unwrap();
        assert_eq!(insets[0].cropped_at, Some(when));
        assert_eq!(insets[1].cropped_at, None);
    }

    #[test]
    fn status_round_trips() {
        let repo = repo_with_chart();
        let c = chart("25641");
        assert_eq!(repo.chart_status(&c).unwrap(), ChartStatus::NEW);
        repo.set_status(&c, ChartStatus::NEEDS_REGENERATION).unwrap();
        assert_eq!(
            repo.chart_status(&c).unwrap(),
            ChartStatus::NEEDS_REGENERATION
        );
    }

    #[test]
    fn database_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.sqlite");
        SqliteRepository::open(&path)
            .unwrap()
            .insert_chart(&chart("7"), ChartStatus::NEW, &[])
            .unwrap();
        let reopened = SqliteRepository::open(&path).unwrap();
        assert_eq!(reopened.fetch_pending_base().unwrap(), vec![chart("7")]);
    }
}
