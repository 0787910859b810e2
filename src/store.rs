use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::report::{FloorEntry, FloorReport, FobReport, HourlyReport, Quantity, ReportKind};

// Constants
const FLOOR_FILE: &str = "floor_reports.json";
const HOURLY_FILE: &str = "hourly_reports.json";
const FOB_FILE: &str = "fob_reports.json";
const USERS_FILE: &str = "users.json";

/// A dashboard login as persisted in `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    pub username: String,

    /// Argon2 PHC string; the plaintext password is never written.
    pub password_hash: String,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} for {date} already exists")]
    AlreadyExists { kind: ReportKind, date: String },

    #[error("no {kind} found for {key}")]
    NotFound { kind: ReportKind, key: String },

    #[error("user {0} already exists")]
    UserExists(String),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// All three report collections read under one lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub floor: Vec<FloorReport>,
    pub hourly: Vec<HourlyReport>,
    pub fob: Vec<FobReport>,
    /// Store revision the collections were read at.
    pub revision: u64,
}

#[derive(Debug, Default)]
struct Collections {
    floor: Vec<FloorReport>,
    hourly: Vec<HourlyReport>,
    fob: Vec<FobReport>,
    users: Vec<StoredUser>,
    revision: u64,
}

/// Report documents kept as JSON arrays, one file per collection.
///
/// Every collection is loaded into memory on open. A mutation is applied to
/// a copy, written to disk, and only then made visible, so a failed write
/// leaves both the file and the in-memory view untouched.
pub struct ReportStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    collections: Mutex<Collections>,
}

impl ReportStore {
    /// Open (creating if needed) the store under `dir`, stamping documents with the host clock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(dir, Arc::new(SystemClock))
    }

    /// Open the store under `dir`, stamping `createdAt`/`updatedAt` from `clock`.
    ///
    /// # Arguments
    /// * `dir` - Data directory; created if it does not exist
    /// * `clock` - Source of document timestamps
    ///
    /// # Returns
    /// * `Result<ReportStore, StoreError>` - The opened store, or `Io`/`Json`
    ///   if a collection file cannot be read or parsed
    ///
    /// # Examples
    /// ```
    /// use floor_dashboard::store::ReportStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = ReportStore::open(dir.path()).unwrap();
    /// assert!(store.floor_reports().is_empty());
    /// assert_eq!(store.revision(), 0);
    /// ```
    pub fn open_with_clock(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            create_dir_all(&dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        let collections = Collections {
            floor: read_collection(&dir.join(FLOOR_FILE))?,
            hourly: read_collection(&dir.join(HOURLY_FILE))?,
            fob: read_collection(&dir.join(FOB_FILE))?,
            users: read_collection(&dir.join(USERS_FILE))?,
            revision: 0,
        };

        log::info!(
            "opened report store at {} ({} floor, {} hourly, {} FOB reports)",
            dir.display(),
            collections.floor.len(),
            collections.hourly.len(),
            collections.fob.len()
        );

        Ok(ReportStore {
            dir,
            clock,
            collections: Mutex::new(collections),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of successful mutations since the store was opened.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Copy of the three report collections, taken under one lock.
    ///
    /// The returned `revision` identifies the state the copy was taken at,
    /// so two snapshots can be ordered by how current they are.
    pub fn snapshot(&self) -> Snapshot {
        let c = self.lock();
        Snapshot {
            floor: c.floor.clone(),
            hourly: c.hourly.clone(),
            fob: c.fob.clone(),
            revision: c.revision,
        }
    }

    // ---- floor reports ----

    /// All floor reports, newest date label first (plain string order).
    pub fn floor_reports(&self) -> Vec<FloorReport> {
        let mut reports = self.lock().floor.clone();
        reports.sort_by(|a, b| b.date.cmp(&a.date));
        reports
    }

    /// The floor report stored under exactly `date`.
    pub fn find_floor(&self, date: &str) -> Option<FloorReport> {
        self.lock().floor.iter().find(|r| r.date == date).cloned()
    }

    /// Create the floor report for `date`
    ///
    /// # Arguments
    /// * `date` - Storage key, already in the floor report label format
    /// * `data` - Per-floor entries
    ///
    /// # Returns
    /// * `Result<FloorReport, StoreError>` - The stored document, or
    ///   `AlreadyExists` if a report for `date` is present. Never overwrites.
    ///
    /// # Examples
    /// ```
    /// use floor_dashboard::report::{Floor, FloorEntry};
    /// use floor_dashboard::store::{ReportStore, StoreError};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = ReportStore::open(dir.path()).unwrap();
    /// let data = vec![FloorEntry::new(Floor::A2, 5.0, 2.0, 1.0, 40.0)];
    ///
    /// store.create_floor("11/2", data.clone()).unwrap();
    /// assert!(matches!(
    ///     store.create_floor("11/2", data),
    ///     Err(StoreError::AlreadyExists { .. })
    /// ));
    /// ```
    pub fn create_floor(&self, date: &str, data: Vec<FloorEntry>) -> Result<FloorReport, StoreError> {
        let mut c = self.lock();
        if c.floor.iter().any(|r| r.date == date) {
            return Err(StoreError::AlreadyExists {
                kind: ReportKind::Floor,
                date: date.to_string(),
            });
        }

        let now = self.clock.now();
        let mut report = FloorReport::new(date, data);
        report.created_at = Some(now);
        report.updated_at = Some(now);

        let mut next = c.floor.clone();
        next.push(report.clone());
        self.persist(FLOOR_FILE, &next)?;
        c.floor = next;
        c.revision += 1;

        log::info!("created floor report {} for {}", report.id, date);
        Ok(report)
    }

    /// Replace the entries of the floor report for `date`
    ///
    /// # Returns
    /// * `Result<FloorReport, StoreError>` - The updated document, or
    ///   `NotFound` when no report has that date. Nothing is created.
    pub fn update_floor(&self, date: &str, data: Vec<FloorEntry>) -> Result<FloorReport, StoreError> {
        let mut c = self.lock();
        let mut next = c.floor.clone();
        let report = next
            .iter_mut()
            .find(|r| r.date == date)
            .ok_or_else(|| StoreError::NotFound {
                kind: ReportKind::Floor,
                key: date.to_string(),
            })?;
        report.data = data;
        report.updated_at = Some(self.clock.now());
        let updated = report.clone();

        self.persist(FLOOR_FILE, &next)?;
        c.floor = next;
        c.revision += 1;

        log::info!("updated floor report for {}", date);
        Ok(updated)
    }

    /// Remove the floor report for `date`, returning it.
    ///
    /// # Errors
    /// * `NotFound` if no report has that date
    pub fn delete_floor(&self, date: &str) -> Result<FloorReport, StoreError> {
        let mut c = self.lock();
        let mut next = c.floor.clone();
        let index = next
            .iter()
            .position(|r| r.date == date)
            .ok_or_else(|| StoreError::NotFound {
                kind: ReportKind::Floor,
                key: date.to_string(),
            })?;
        let removed = next.remove(index);

        self.persist(FLOOR_FILE, &next)?;
        c.floor = next;
        c.revision += 1;

        log::info!("deleted floor report for {}", date);
        Ok(removed)
    }

    // ---- hourly reports ----

    /// All hourly reports in insertion order.
    pub fn hourly_reports(&self) -> Vec<HourlyReport> {
        self.lock().hourly.clone()
    }

    pub fn find_hourly(&self, date: &str) -> Option<HourlyReport> {
        self.lock().hourly.iter().find(|r| r.date == date).cloned()
    }

    /// Create the hourly report for `date`
    ///
    /// # Arguments
    /// * `date` - Storage key, in the hourly report label format
    /// * `data` - Bucket name to count, e.g. `"12H"`
    ///
    /// # Returns
    /// * `Result<HourlyReport, StoreError>` - The stored document (with its
    ///   new `_id`), or `AlreadyExists` for a duplicate date
    pub fn create_hourly(
        &self,
        date: &str,
        data: BTreeMap<String, Quantity>,
    ) -> Result<HourlyReport, StoreError> {
        let mut c = self.lock();
        if c.hourly.iter().any(|r| r.date == date) {
            return Err(StoreError::AlreadyExists {
                kind: ReportKind::Hourly,
                date: date.to_string(),
            });
        }

        let now = self.clock.now();
        let mut report = HourlyReport::new(date, data);
        report.created_at = Some(now);
        report.updated_at = Some(now);

        let mut next = c.hourly.clone();
        next.push(report.clone());
        self.persist(HOURLY_FILE, &next)?;
        c.hourly = next;
        c.revision += 1;

        log::info!("created hourly report {} for {}", report.id, date);
        Ok(report)
    }

    /// Replace the buckets of the hourly report with document id `id`
    ///
    /// Hourly reports are edited by document id rather than by date.
    ///
    /// # Errors
    /// * `NotFound` if no report has that id
    pub fn update_hourly(
        &self,
        id: &str,
        data: BTreeMap<String, Quantity>,
    ) -> Result<HourlyReport, StoreError> {
        let mut c = self.lock();
        let mut next = c.hourly.clone();
        let report = next
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: ReportKind::Hourly,
                key: id.to_string(),
            })?;
        report.data = data;
        report.updated_at = Some(self.clock.now());
        let updated = report.clone();

        self.persist(HOURLY_FILE, &next)?;
        c.hourly = next;
        c.revision += 1;

        log::info!("updated hourly report {}", id);
        Ok(updated)
    }

    // ---- FOB reports ----

    /// All FOB reports in insertion order.
    pub fn fob_reports(&self) -> Vec<FobReport> {
        self.lock().fob.clone()
    }

    pub fn find_fob(&self, date: &str) -> Option<FobReport> {
        self.lock().fob.iter().find(|r| r.date == date).cloned()
    }

    /// Create the FOB report for `date`
    ///
    /// # Arguments
    /// * `date` - Storage key, in the FOB report label format
    /// * `monthly`, `yearly` - Running FOB totals
    /// * `runday` - Operating day count
    ///
    /// # Returns
    /// * `Result<FobReport, StoreError>` - The stored document, or
    ///   `AlreadyExists` for a duplicate date
    pub fn create_fob(
        &self,
        date: &str,
        monthly: Quantity,
        yearly: Quantity,
        runday: Quantity,
    ) -> Result<FobReport, StoreError> {
        let mut c = self.lock();
        if c.fob.iter().any(|r| r.date == date) {
            return Err(StoreError::AlreadyExists {
                kind: ReportKind::Fob,
                date: date.to_string(),
            });
        }

        let now = self.clock.now();
        let mut report = FobReport::new(date, monthly.value(), yearly.value(), runday.value());
        report.created_at = Some(now);
        report.updated_at = Some(now);

        let mut next = c.fob.clone();
        next.push(report.clone());
        self.persist(FOB_FILE, &next)?;
        c.fob = next;
        c.revision += 1;

        log::info!("created FOB report {} for {}", report.id, date);
        Ok(report)
    }

    /// Update the FOB report for `date`
    ///
    /// Fields passed as `None` keep their stored value.
    ///
    /// # Errors
    /// * `NotFound` if no report has that date
    pub fn update_fob(
        &self,
        date: &str,
        monthly: Option<Quantity>,
        yearly: Option<Quantity>,
        runday: Option<Quantity>,
    ) -> Result<FobReport, StoreError> {
        let mut c = self.lock();
        let mut next = c.fob.clone();
        let report = next
            .iter_mut()
            .find(|r| r.date == date)
            .ok_or_else(|| StoreError::NotFound {
                kind: ReportKind::Fob,
                key: date.to_string(),
            })?;
        if let Some(monthly) = monthly {
            report.monthly_upto_fob = monthly;
        }
        if let Some(yearly) = yearly {
            report.yearly_upto_fob = yearly;
        }
        if let Some(runday) = runday {
            report.runday = runday;
        }
        report.updated_at = Some(self.clock.now());
        let updated = report.clone();

        self.persist(FOB_FILE, &next)?;
        c.fob = next;
        c.revision += 1;

        log::info!("updated FOB report for {}", date);
        Ok(updated)
    }

    // ---- users ----

    pub fn users(&self) -> Vec<StoredUser> {
        self.lock().users.clone()
    }

    pub fn find_user(&self, username: &str) -> Option<StoredUser> {
        self.lock().users.iter().find(|u| u.username == username).cloned()
    }

    /// Add a user with an already hashed password.
    ///
    /// # Errors
    /// * `UserExists` if the username is taken
    pub fn insert_user(&self, username: &str, password_hash: String) -> Result<StoredUser, StoreError> {
        let mut c = self.lock();
        if c.users.iter().any(|u| u.username == username) {
            return Err(StoreError::UserExists(username.to_string()));
        }

        let user = StoredUser {
            username: username.to_string(),
            password_hash,
            created_at: Some(self.clock.now()),
        };

        let mut next = c.users.clone();
        next.push(user.clone());
        self.persist(USERS_FILE, &next)?;
        c.users = next;
        c.revision += 1;

        log::info!("registered user {}", username);
        Ok(user)
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist<T: Serialize>(&self, file: &str, items: &[T]) -> Result<(), StoreError> {
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(items).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        // Write beside the target and rename so readers never see a torn file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(())
    }
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
