//! User store backends.
//!
//! [`UserStore`] is the storage-agnostic contract the gateway and the
//! command dispatcher share. [`SqliteUserStore`] is the persistent
//! backend; [`InMemoryUserStore`] backs tests and local development.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::user::{NewUser, User, UserPatch};

/// Error type for user store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mail address already exists")]
    DuplicateMail,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateMail => ApiError::DataIntegrityViolation,
            StoreError::Backend(detail) => ApiError::Unexpected(detail),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::DuplicateMail
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Storage contract for user records. Duplicate `mail` on create/update
/// must surface as [`StoreError::DuplicateMail`].
pub trait UserStore: Send + Sync {
    fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    fn get_all(&self) -> Result<Vec<User>, StoreError>;
    fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    fn get_by_mail(&self, mail: &str) -> Result<Option<User>, StoreError>;
    fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;
    fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// SQLite-backed store. The unique index on `mail` enforces the
/// data-integrity constraint at the storage boundary.
#[derive(Debug)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteUserStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let db_path = path.into();
        let conn = Connection::open(&db_path).map_err(|e| StoreError::Backend(e.to_string()))?;
        conn.execute_batch(
            "BEGIN;CREATE TABLE IF NOT EXISTS users(
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                mail TEXT NOT NULL UNIQUE,
                age INTEGER NOT NULL
            );COMMIT;",
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Location of the backing database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, i64)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn into_user(raw: (String, String, String, i64)) -> Result<User, StoreError> {
        let (id, name, mail, age) = raw;
        let id = Uuid::parse_str(&id)
            .map_err(|e| StoreError::Backend(format!("corrupt user id '{}': {}", id, e)))?;
        Ok(User {
            id,
            name,
            mail,
            age: age as u32,
        })
    }
}

impl UserStore for SqliteUserStore {
    fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO users(id, name, mail, age) VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                new_user.name,
                new_user.mail,
                new_user.age as i64
            ],
        )?;
        Ok(User {
            id,
            name: new_user.name,
            mail: new_user.mail,
            age: new_user.age,
        })
    }

    fn get_all(&self) -> Result<Vec<User>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
        let mut stmt = conn
            .prepare("SELECT id, name, mail, age FROM users ORDER BY rowid")
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut users = Vec::new();
        for row in rows {
            users.push(Self::into_user(
                row.map_err(|e| StoreError::Backend(e.to_string()))?,
            )?);
        }
        Ok(users)
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT id, name, mail, age FROM users WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_user,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        raw.map(Self::into_user).transpose()
    }

    fn get_by_mail(&self, mail: &str) -> Result<Option<User>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT id, name, mail, age FROM users WHERE mail = ?1",
                params![mail],
                Self::row_to_user,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        raw.map(Self::into_user).transpose()
    }

    fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        // Read-then-write inside one transaction so a concurrent writer
        // cannot interleave between the lookup and the update.
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let raw = tx
            .query_row(
                "SELECT id, name, mail, age FROM users WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_user,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut user = match raw {
            Some(raw) => Self::into_user(raw)?,
            None => return Ok(None),
        };
        patch.apply(&mut user);

        tx.execute(
            "UPDATE users SET name = ?2, mail = ?3, age = ?4 WHERE id = ?1",
            params![
                user.id.to_string(),
                user.name,
                user.mail,
                user.age as i64
            ],
        )?;
        tx.commit().map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(user))
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
        let affected = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(affected > 0)
    }
}

/// In-memory store with the same contract, insertion-ordered.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        if users.iter().any(|u| u.mail == new_user.mail) {
            return Err(StoreError::DuplicateMail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            mail: new_user.mail,
            age: new_user.age,
        };
        users.push(user.clone());
        Ok(user)
    }

    fn get_all(&self) -> Result<Vec<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(users.clone())
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    fn get_by_mail(&self, mail: &str) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(users.iter().find(|u| u.mail == mail).cloned())
    }

    fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        if !users.iter().any(|u| u.id == id) {
            return Ok(None);
        }
        if let Some(new_mail) = &patch.mail {
            if users.iter().any(|u| u.id != id && &u.mail == new_mail) {
                return Err(StoreError::DuplicateMail);
            }
        }
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                patch.apply(user);
                Ok(Some(user.clone()))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}
