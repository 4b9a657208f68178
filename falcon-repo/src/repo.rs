use std::path::Path;

use falcon_types::{CameraId, ClassTag, EventKind, PersistedEvent};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unknown class tag {0:?} stored in event row")]
    UnknownClass(String),
    #[error("unknown event kind {0:?} stored in event row")]
    UnknownKind(String),
    #[error("invalid camera id stored in event row")]
    InvalidCameraId(#[from] falcon_types::CameraIdError),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS class_tag (name TEXT PRIMARY KEY);
CREATE TABLE IF NOT EXISTS event_kind (name TEXT PRIMARY KEY);
CREATE TABLE IF NOT EXISTS area (name TEXT PRIMARY KEY, polygon_json TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS event (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id TEXT NOT NULL,
    camera_id TEXT NOT NULL,
    class TEXT NOT NULL REFERENCES class_tag(name),
    kind TEXT NOT NULL REFERENCES event_kind(name),
    area TEXT REFERENCES area(name),
    bbox_x0 REAL NOT NULL,
    bbox_y0 REAL NOT NULL,
    bbox_x1 REAL NOT NULL,
    bbox_y1 REAL NOT NULL,
    rescue_level INTEGER,
    crop_path TEXT,
    instant_ms INTEGER NOT NULL,
    UNIQUE(object_id, instant_ms)
);
";

const CLASS_TAGS: &[ClassTag] = &[
    ClassTag::Bird,
    ClassTag::Fod,
    ClassTag::Person,
    ClassTag::Animal,
    ClassTag::Airplane,
    ClassTag::Vehicle,
    ClassTag::WorkPerson,
    ClassTag::WorkVehicle,
];

const EVENT_KINDS: &[EventKind] = &[EventKind::FirstObservation, EventKind::RescueEscalation];

fn class_tag_name(c: ClassTag) -> &'static str {
    match c {
        ClassTag::Bird => "BIRD",
        ClassTag::Fod => "FOD",
        ClassTag::Person => "PERSON",
        ClassTag::Animal => "ANIMAL",
        ClassTag::Airplane => "AIRPLANE",
        ClassTag::Vehicle => "VEHICLE",
        ClassTag::WorkPerson => "WORK_PERSON",
        ClassTag::WorkVehicle => "WORK_VEHICLE",
    }
}

fn class_tag_from_name(name: &str) -> Result<ClassTag, RepoError> {
    CLASS_TAGS
        .iter()
        .copied()
        .find(|c| class_tag_name(*c) == name)
        .ok_or_else(|| RepoError::UnknownClass(name.to_owned()))
}

fn event_kind_name(k: EventKind) -> &'static str {
    match k {
        EventKind::FirstObservation => "FIRST_OBSERVATION",
        EventKind::RescueEscalation => "RESCUE_ESCALATION",
    }
}

fn event_kind_from_name(name: &str) -> Result<EventKind, RepoError> {
    EVENT_KINDS
        .iter()
        .copied()
        .find(|k| event_kind_name(*k) == name)
        .ok_or_else(|| RepoError::UnknownKind(name.to_owned()))
}

/// The append-only event log (4.14). Owned by a single task per the
/// dispatch core's ownership model; no internal locking.
pub struct EventRepo {
    conn: Connection,
}

impl EventRepo {
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        let repo = EventRepo { conn };
        repo.seed_reference_tables()?;
        Ok(repo)
    }

    pub fn open_in_memory() -> Result<Self, RepoError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        let repo = EventRepo { conn };
        repo.seed_reference_tables()?;
        Ok(repo)
    }

    fn seed_reference_tables(&self) -> Result<(), RepoError> {
        for c in CLASS_TAGS {
            self.conn
                .execute("INSERT OR IGNORE INTO class_tag(name) VALUES (?1)", params![class_tag_name(*c)])?;
        }
        for k in EVENT_KINDS {
            self.conn
                .execute("INSERT OR IGNORE INTO event_kind(name) VALUES (?1)", params![event_kind_name(*k)])?;
        }
        Ok(())
    }

    pub fn register_area(&self, name: &str, polygon_json: &str) -> Result<(), RepoError> {
        self.conn.execute(
            "INSERT INTO area(name, polygon_json) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET polygon_json = excluded.polygon_json",
            params![name, polygon_json],
        )?;
        Ok(())
    }

    /// Inserts one event. Returns `true` if a new row was written, `false`
    /// if `(object_id, instant_ms)` already existed — the single source of
    /// idempotence truth for 4.14, replacing the original's separate
    /// in-memory/DB gates.
    pub fn insert_event(&self, event: &PersistedEvent) -> Result<bool, RepoError> {
        let rows = self.conn.execute(
            "INSERT INTO event (
                object_id, camera_id, class, kind, area,
                bbox_x0, bbox_y0, bbox_x1, bbox_y1,
                rescue_level, crop_path, instant_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(object_id, instant_ms) DO NOTHING",
            params![
                event.object_id,
                event.camera_id.as_str(),
                class_tag_name(event.class),
                event_kind_name(event.kind),
                event.area,
                event.bbox.x0,
                event.bbox.y0,
                event.bbox.x1,
                event.bbox.y1,
                event.rescue_level,
                event.crop_path,
                event.instant_ms,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Returns the most recent event recorded for `object_id`, if any.
    pub fn latest_for_object(&self, object_id: &str) -> Result<Option<PersistedEvent>, RepoError> {
        let row = self
            .conn
            .query_row(
                "SELECT object_id, camera_id, class, kind, area,
                        bbox_x0, bbox_y0, bbox_x1, bbox_y1, rescue_level, crop_path, instant_ms
                 FROM event WHERE object_id = ?1 ORDER BY instant_ms DESC LIMIT 1",
                params![object_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, f32>(5)?,
                        row.get::<_, f32>(6)?,
                        row.get::<_, f32>(7)?,
                        row.get::<_, f32>(8)?,
                        row.get::<_, Option<u32>>(9)?,
                        row.get::<_, Option<String>>(10)?,
                        row.get::<_, i64>(11)?,
                    ))
                },
            )
            .optional()?;

        let Some((object_id, camera_id, class, kind, area, x0, y0, x1, y1, rescue_level, crop_path, instant_ms)) = row else {
            return Ok(None);
        };

        Ok(Some(PersistedEvent {
            object_id,
            camera_id: CameraId::new(&camera_id)?,
            class: class_tag_from_name(&class)?,
            kind: event_kind_from_name(&kind)?,
            area,
            bbox: falcon_types::BBox { x0, y0, x1, y1 },
            rescue_level,
            crop_path,
            instant_ms,
        }))
    }

    /// Returns `true` if `object_id` has ever been recorded, used by the
    /// first-observation gate (4.12) alongside the in-memory `alerted_ids`
    /// set to detect drift after a process restart.
    pub fn has_been_observed(&self, object_id: &str) -> Result<bool, RepoError> {
        Ok(self.latest_for_object(object_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_types::BBox;

    fn sample_event(object_id: &str, instant_ms: i64) -> PersistedEvent {
        PersistedEvent {
            object_id: object_id.to_string(),
            camera_id: CameraId::new("A").unwrap(),
            class: ClassTag::Person,
            kind: EventKind::FirstObservation,
            area: Some("RWY-A".into()),
            bbox: BBox { x0: 0.0, y0: 0.0, x1: 10.0, y1: 10.0 },
            rescue_level: None,
            crop_path: Some("img/img_1_20260726120000.jpg".into()),
            instant_ms,
        }
    }

    #[test]
    fn insert_then_query_round_trips() {
        let repo = EventRepo::open_in_memory().unwrap();
        assert!(repo.insert_event(&sample_event("obj1", 1_000)).unwrap());
        let fetched = repo.latest_for_object("obj1").unwrap().unwrap();
        assert_eq!(fetched.object_id, "obj1");
        assert_eq!(fetched.class, ClassTag::Person);
    }

    #[test]
    fn duplicate_object_instant_is_idempotent() {
        let repo = EventRepo::open_in_memory().unwrap();
        assert!(repo.insert_event(&sample_event("obj1", 1_000)).unwrap());
        assert!(!repo.insert_event(&sample_event("obj1", 1_000)).unwrap());
    }

    #[test]
    fn same_object_different_instant_inserts_again() {
        let repo = EventRepo::open_in_memory().unwrap();
        assert!(repo.insert_event(&sample_event("obj1", 1_000)).unwrap());
        assert!(repo.insert_event(&sample_event("obj1", 2_000)).unwrap());
    }

    #[test]
    fn has_been_observed_reflects_prior_inserts() {
        let repo = EventRepo::open_in_memory().unwrap();
        assert!(!repo.has_been_observed("obj1").unwrap());
        repo.insert_event(&sample_event("obj1", 1_000)).unwrap();
        assert!(repo.has_been_observed("obj1").unwrap());
    }

    #[test]
    fn latest_for_object_picks_most_recent_instant() {
        let repo = EventRepo::open_in_memory().unwrap();
        repo.insert_event(&sample_event("obj1", 1_000)).unwrap();
        repo.insert_event(&sample_event("obj1", 5_000)).unwrap();
        let latest = repo.latest_for_object("obj1").unwrap().unwrap();
        assert_eq!(latest.instant_ms, 5_000);
    }
}
