//! Command dispatcher.
//!
//! Routes a validated [`Command`] to exactly one [`UserStore`] operation.
//! Field validation reuses the same request types as the direct CRUD
//! endpoints and always happens before any store write.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::nlp::command::{Command, Operation};
use crate::user::store::UserStore;
use crate::user::{NewUser, User, UserPatch};

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// `create` succeeded.
    Created(User),
    /// `get` with an empty payload: the full record set.
    All(Vec<User>),
    /// `get` targeting one record that exists.
    One(User),
    /// `get` targeting one record that does not exist. A normal outcome,
    /// not an error.
    NoMatch,
    /// `update` succeeded.
    Updated(User),
    /// `delete` succeeded; no body.
    Deleted,
}

pub struct Dispatcher {
    store: Arc<dyn UserStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn dispatch(&self, command: &Command) -> Result<DispatchOutcome, ApiError> {
        debug!(operation = command.operation.as_str(), "dispatching command");
        match command.operation {
            Operation::Create => self.create(command),
            Operation::Get => self.get(command),
            Operation::Update => self.update(command),
            Operation::Delete => self.delete(command),
        }
    }

    fn create(&self, command: &Command) -> Result<DispatchOutcome, ApiError> {
        let new_user = NewUser {
            name: require_str(command, "name")?.to_string(),
            mail: require_str(command, "mail")?.to_string(),
            age: require_age(command)?,
        };
        new_user.validate()?;
        let user = self.store.create(new_user)?;
        Ok(DispatchOutcome::Created(user))
    }

    fn get(&self, command: &Command) -> Result<DispatchOutcome, ApiError> {
        if command.data.is_empty() {
            return Ok(DispatchOutcome::All(self.store.get_all()?));
        }
        let user = match target_id(command)? {
            Target::Id(id) => self.store.get_by_id(id)?,
            Target::Mail(mail) => self.store.get_by_mail(&mail)?,
        };
        Ok(match user {
            Some(user) => DispatchOutcome::One(user),
            None => DispatchOutcome::NoMatch,
        })
    }

    fn update(&self, command: &Command) -> Result<DispatchOutcome, ApiError> {
        let target = target_id(command)?;
        let patch = build_patch(command)?;
        patch.validate()?;

        let id = match target {
            Target::Id(id) => id,
            // Mail-resolved targets race with concurrent writers between
            // lookup and write; last write wins, as on the direct path.
            Target::Mail(mail) => match self.store.get_by_mail(&mail)? {
                Some(user) => user.id,
                None => return Err(ApiError::TargetNotFound),
            },
        };

        match self.store.update(id, patch)? {
            Some(user) => Ok(DispatchOutcome::Updated(user)),
            None => Err(ApiError::TargetNotFound),
        }
    }

    fn delete(&self, command: &Command) -> Result<DispatchOutcome, ApiError> {
        let id = match target_id(command)? {
            Target::Id(id) => id,
            Target::Mail(mail) => match self.store.get_by_mail(&mail)? {
                Some(user) => user.id,
                None => return Err(ApiError::TargetNotFound),
            },
        };
        if self.store.delete(id)? {
            Ok(DispatchOutcome::Deleted)
        } else {
            Err(ApiError::TargetNotFound)
        }
    }
}

/// Target identifier embedded in the payload. `id` wins when both are
/// present.
enum Target {
    Id(Uuid),
    Mail(String),
}

fn target_id(command: &Command) -> Result<Target, ApiError> {
    if let Some(value) = command.data.get("id") {
        let raw = value.as_str().ok_or_else(|| {
            ApiError::InvalidCommand("field 'id' must be a string".to_string())
        })?;
        let id = Uuid::parse_str(raw).map_err(|_| {
            ApiError::InvalidCommand(format!("field 'id' is not a valid identifier: '{}'", raw))
        })?;
        return Ok(Target::Id(id));
    }
    if let Some(value) = command.data.get("mail") {
        let mail = value.as_str().ok_or_else(|| {
            ApiError::InvalidCommand("field 'mail' must be a string".to_string())
        })?;
        return Ok(Target::Mail(mail.to_string()));
    }
    Err(ApiError::InvalidCommand(format!(
        "{} requires an 'id' or 'mail' to identify the target",
        command.operation.as_str()
    )))
}

fn require_str<'a>(command: &'a Command, key: &str) -> Result<&'a str, ApiError> {
    match command.data.get(key) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ApiError::InvalidCommand(format!(
            "field '{}' must be a string",
            key
        ))),
        None => Err(ApiError::InvalidCommand(format!(
            "missing required field '{}'",
            key
        ))),
    }
}

fn require_age(command: &Command) -> Result<u32, ApiError> {
    match command.data.get("age") {
        Some(value) => parse_age(value),
        None => Err(ApiError::InvalidCommand(
            "missing required field 'age'".to_string(),
        )),
    }
}

fn parse_age(value: &Value) -> Result<u32, ApiError> {
    value
        .as_u64()
        .and_then(|age| u32::try_from(age).ok())
        .ok_or_else(|| {
            ApiError::InvalidCommand("field 'age' must be a non-negative integer".to_string())
        })
}

fn build_patch(command: &Command) -> Result<UserPatch, ApiError> {
    let mut patch = UserPatch::default();
    if command.data.contains_key("name") {
        patch.name = Some(require_str(command, "name")?.to_string());
    }
    if command.data.contains_key("mail") {
        patch.mail = Some(require_str(command, "mail")?.to_string());
    }
    if let Some(value) = command.data.get("age") {
        patch.age = Some(parse_age(value)?);
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::store::InMemoryUserStore;
    use pretty_assertions::assert_eq;

    fn dispatcher_with_store() -> (Dispatcher, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        (Dispatcher::new(store.clone()), store)
    }

    fn command(raw: &str) -> Command {
        Command::parse(raw).expect("test command should parse")
    }

    fn seed(store: &InMemoryUserStore, name: &str, mail: &str, age: u32) -> User {
        store
            .create(NewUser {
                name: name.to_string(),
                mail: mail.to_string(),
                age,
            })
            .expect("seed user")
    }

    #[test]
    fn create_returns_created_record() {
        let (dispatcher, store) = dispatcher_with_store();
        let outcome = dispatcher
            .dispatch(&command(
                r#"{"operation":"create","data":{"name":"Alice","mail":"alice@example.com","age":30}}"#,
            ))
            .unwrap();
        let DispatchOutcome::Created(user) = outcome else {
            panic!("expected Created, got {:?}", outcome);
        };
        assert_eq!(user.name, "Alice");
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn create_twice_with_same_mail_conflicts() {
        let (dispatcher, _store) = dispatcher_with_store();
        let raw =
            r#"{"operation":"create","data":{"name":"Alice","mail":"alice@example.com","age":30}}"#;
        dispatcher.dispatch(&command(raw)).unwrap();
        let err = dispatcher.dispatch(&command(raw)).unwrap_err();
        assert!(matches!(err, ApiError::DataIntegrityViolation));
    }

    #[test]
    fn create_with_missing_field_writes_nothing() {
        let (dispatcher, store) = dispatcher_with_store();
        let err = dispatcher
            .dispatch(&command(
                r#"{"operation":"create","data":{"name":"Alice","age":30}}"#,
            ))
            .unwrap_err();
        assert!(err.public_message().contains("'mail'"));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn create_with_out_of_range_age_is_invalid() {
        let (dispatcher, store) = dispatcher_with_store();
        let err = dispatcher
            .dispatch(&command(
                r#"{"operation":"create","data":{"name":"A","mail":"a@b.com","age":151}}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCommand(_)));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn get_with_empty_payload_returns_all() {
        let (dispatcher, store) = dispatcher_with_store();
        let a = seed(&store, "A", "a@example.com", 1);
        let b = seed(&store, "B", "b@example.com", 2);
        let outcome = dispatcher
            .dispatch(&command(r#"{"operation":"get","data":{}}"#))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::All(vec![a, b]));
    }

    #[test]
    fn get_by_mail_returns_single_record() {
        let (dispatcher, store) = dispatcher_with_store();
        let user = seed(&store, "A", "a@example.com", 1);
        let outcome = dispatcher
            .dispatch(&command(
                r#"{"operation":"get","data":{"mail":"a@example.com"}}"#,
            ))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::One(user));
    }

    #[test]
    fn get_by_unknown_mail_is_a_normal_no_match() {
        let (dispatcher, _store) = dispatcher_with_store();
        let outcome = dispatcher
            .dispatch(&command(
                r#"{"operation":"get","data":{"mail":"ghost@example.com"}}"#,
            ))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch);
    }

    #[test]
    fn get_by_id_round_trips_created_record() {
        let (dispatcher, _store) = dispatcher_with_store();
        let created = dispatcher
            .dispatch(&command(
                r#"{"operation":"create","data":{"name":"A","mail":"a@b.com","age":1}}"#,
            ))
            .unwrap();
        let DispatchOutcome::Created(user) = created else {
            panic!("expected Created");
        };
        let raw = format!(r#"{{"operation":"get","data":{{"id":"{}"}}}}"#, user.id);
        let outcome = dispatcher.dispatch(&command(&raw)).unwrap();
        assert_eq!(outcome, DispatchOutcome::One(user));
    }

    #[test]
    fn update_changes_only_provided_field() {
        let (dispatcher, store) = dispatcher_with_store();
        let user = seed(&store, "A", "a@example.com", 30);
        let outcome = dispatcher
            .dispatch(&command(
                r#"{"operation":"update","data":{"mail":"a@example.com","age":31}}"#,
            ))
            .unwrap();
        let DispatchOutcome::Updated(updated) = outcome else {
            panic!("expected Updated");
        };
        assert_eq!(updated.age, 31);
        assert_eq!(updated.name, user.name);
        assert_eq!(updated.mail, user.mail);
    }

    #[test]
    fn update_without_target_is_invalid() {
        let (dispatcher, _store) = dispatcher_with_store();
        let err = dispatcher
            .dispatch(&command(r#"{"operation":"update","data":{"age":31}}"#))
            .unwrap_err();
        assert!(err.public_message().contains("identify the target"));
    }

    #[test]
    fn update_missing_target_is_not_found() {
        let (dispatcher, _store) = dispatcher_with_store();
        let err = dispatcher
            .dispatch(&command(
                r#"{"operation":"update","data":{"mail":"ghost@example.com","age":31}}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::TargetNotFound));
    }

    #[test]
    fn update_with_malformed_id_is_invalid_not_not_found() {
        let (dispatcher, _store) = dispatcher_with_store();
        let err = dispatcher
            .dispatch(&command(
                r#"{"operation":"update","data":{"id":"not-a-uuid","age":31}}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCommand(_)));
    }

    #[test]
    fn update_with_no_mutable_fields_returns_record_unchanged() {
        let (dispatcher, store) = dispatcher_with_store();
        let user = seed(&store, "A", "a@example.com", 30);
        let raw = format!(r#"{{"operation":"update","data":{{"id":"{}"}}}}"#, user.id);
        let outcome = dispatcher.dispatch(&command(&raw)).unwrap();
        assert_eq!(outcome, DispatchOutcome::Updated(user));
    }

    #[test]
    fn delete_by_mail_removes_record() {
        let (dispatcher, store) = dispatcher_with_store();
        let user = seed(&store, "A", "a@example.com", 30);
        let outcome = dispatcher
            .dispatch(&command(
                r#"{"operation":"delete","data":{"mail":"a@example.com"}}"#,
            ))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Deleted);
        assert!(store.get_by_id(user.id).unwrap().is_none());
    }

    #[test]
    fn delete_missing_target_is_not_found_and_mutates_nothing() {
        let (dispatcher, store) = dispatcher_with_store();
        seed(&store, "A", "a@example.com", 30);
        let err = dispatcher
            .dispatch(&command(
                r#"{"operation":"delete","data":{"mail":"ghost@example.com"}}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::TargetNotFound));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }
}
