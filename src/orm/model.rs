//! Model facade.
//!
//! A [`Model`] binds a logical entity name and its [`Schema`] to a live
//! connection and exposes CRUD over the derived collection. Relational
//! connections go through [`QueryBuilder`] and the connection's [`Executor`];
//! document connections go through the [`DocumentStore`].
//!
//! [`Executor`]: crate::db::Executor
//! [`DocumentStore`]: crate::db::DocumentStore

use crate::db::document::{self, ID_FIELD};
use crate::db::{Backend, Connection, Executor, InsertStrategy};
use crate::error::{DbError, DbResult};
use crate::models::{FieldValue, Record, Schema};
use crate::orm::builder::QueryBuilder;
use std::sync::Arc;
use tracing::debug;

/// Collection name for a logical entity name.
pub fn collection_name(name: &str) -> String {
    format!("{}s", name)
}

#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    schema: Schema,
    collection: String,
    connection: Arc<Connection>,
}

impl Model {
    pub fn new(name: impl Into<String>, schema: Schema, connection: Arc<Connection>) -> Self {
        let name = name.into();
        Self {
            collection: collection_name(&name),
            name,
            schema,
            connection,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptions. Never used to validate data.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// A fresh query builder over this model's collection.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(&self.connection), self.collection.clone())
    }

    pub fn where_(
        &self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> QueryBuilder {
        self.query().where_(field, operator, value)
    }

    pub async fn find_all(&self) -> DbResult<Vec<Record>> {
        self.query().find_all().await
    }

    /// Find one record matching `conditions`.
    ///
    /// Relational connections apply only the first condition as an equality
    /// filter; the remaining keys are ignored. Document connections match on
    /// all of them.
    pub async fn find_one(&self, conditions: &Record) -> DbResult<Option<Record>> {
        match self.connection.backend() {
            Backend::Document(store) => {
                let filter = document::record_to_document(conditions)?;
                store.find_one(&self.collection, filter).await
            }
            Backend::Relational(_) => {
                let mut entries = conditions.iter();
                let query = match entries.next() {
                    Some((field, value)) => self.where_(field.as_str(), "=", value),
                    None => self.query(),
                };

                let ignored: Vec<&str> = entries.map(|(k, _)| k.as_str()).collect();
                if !ignored.is_empty() {
                    debug!(
                        collection = %self.collection,
                        ignored = ?ignored,
                        "find_one uses only the first condition"
                    );
                }

                query.find_one().await
            }
        }
    }

    pub async fn find_by_id(&self, id: impl Into<FieldValue>) -> DbResult<Option<Record>> {
        let id = id.into();
        match self.connection.backend() {
            Backend::Document(store) => store.find_by_id(&self.collection, &id).await,
            Backend::Relational(_) => self.where_(ID_FIELD, "=", id).find_one().await,
        }
    }

    /// Insert `data` and return the stored record including its identifier.
    pub async fn create(&self, data: Record) -> DbResult<Record> {
        if data.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Cannot create an empty {} record",
                self.name
            )));
        }

        let executor = match self.connection.backend() {
            Backend::Document(store) => return store.insert_one(&self.collection, &data).await,
            Backend::Relational(executor) => executor,
        };

        let style = executor.placeholder_style();
        let fields: Vec<&str> = data.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| style.placeholder(i)).collect();
        let params: Vec<FieldValue> = data.values().map(FieldValue::from).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.collection,
            fields.join(", "),
            placeholders.join(", ")
        );

        match executor.insert_strategy() {
            InsertStrategy::Returning => self.insert_returning(executor, &insert, &params).await,
            InsertStrategy::InsertThenRefetch => {
                self.insert_then_refetch(executor, &data, &insert, &params).await
            }
            InsertStrategy::ReturningOrRefetch => {
                match self.insert_returning(executor, &insert, &params).await {
                    Err(e) if e.is_syntax_error() => {
                        debug!(
                            collection = %self.collection,
                            error = %e,
                            "RETURNING rejected, inserting and refetching"
                        );
                        self.insert_then_refetch(executor, &data, &insert, &params).await
                    }
                    result => result,
                }
            }
        }
    }

    async fn insert_returning(
        &self,
        executor: &Arc<dyn Executor>,
        insert: &str,
        params: &[FieldValue],
    ) -> DbResult<Record> {
        let sql = format!("{} RETURNING *", insert);
        executor
            .query(&sql, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::internal("INSERT ... RETURNING produced no row"))
    }

    async fn insert_then_refetch(
        &self,
        executor: &Arc<dyn Executor>,
        data: &Record,
        insert: &str,
        params: &[FieldValue],
    ) -> DbResult<Record> {
        let outcome = executor.execute(insert, params).await?;

        let id = match data.get(ID_FIELD) {
            Some(id) if !id.is_null() => FieldValue::from(id),
            _ => outcome.last_insert_id.map(FieldValue::Int).ok_or_else(|| {
                DbError::internal(format!(
                    "No generated identifier reported for insert into {}",
                    self.collection
                ))
            })?,
        };

        self.find_by_id(id.clone()).await?.ok_or_else(|| {
            DbError::internal(format!(
                "Inserted row {} not found in {}",
                id, self.collection
            ))
        })
    }

    /// Apply `data` to the record with `id` and return the updated record.
    ///
    /// Returns `None` when no record has that id.
    pub async fn update(&self, id: impl Into<FieldValue>, data: Record) -> DbResult<Option<Record>> {
        let id = id.into();
        let executor = match self.connection.backend() {
            Backend::Document(store) => {
                let matched = store.update_by_id(&self.collection, &id, &data).await?;
                if matched == 0 {
                    return Ok(None);
                }
                return store.find_by_id(&self.collection, &id).await;
            }
            Backend::Relational(executor) => executor,
        };

        if !data.is_empty() {
            let style = executor.placeholder_style();
            let mut params: Vec<FieldValue> = Vec::with_capacity(data.len() + 1);
            let assignments: Vec<String> = data
                .iter()
                .map(|(field, value)| {
                    params.push(FieldValue::from(value));
                    format!("{} = {}", field, style.placeholder(params.len()))
                })
                .collect();
            params.push(id.clone());

            let sql = format!(
                "UPDATE {} SET {} WHERE {} = {}",
                self.collection,
                assignments.join(", "),
                ID_FIELD,
                style.placeholder(params.len())
            );
            executor.execute(&sql, &params).await?;
        }

        self.find_by_id(id).await
    }

    /// Delete the record with `id`.
    ///
    /// Document connections report whether a document was removed. Relational
    /// connections always report `true`, whether or not a row existed.
    pub async fn delete(&self, id: impl Into<FieldValue>) -> DbResult<bool> {
        let id = id.into();
        match self.connection.backend() {
            Backend::Document(store) => {
                let deleted = store.delete_by_id(&self.collection, &id).await?;
                Ok(deleted > 0)
            }
            Backend::Relational(executor) => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = {}",
                    self.collection,
                    ID_FIELD,
                    executor.placeholder_style().placeholder(1)
                );
                executor.execute(&sql, &[id]).await?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::WriteOutcome;
    use crate::models::{BackendKind, ConnectionConfig, to_record};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every statement and answers with a canned row.
    #[derive(Debug)]
    struct Recorder {
        kind: BackendKind,
        strategy: InsertStrategy,
        statements: Mutex<Vec<(String, Vec<FieldValue>)>>,
    }

    impl Recorder {
        fn new(kind: BackendKind, strategy: InsertStrategy) -> Arc<Self> {
            Arc::new(Self {
                kind,
                strategy,
                statements: Mutex::new(Vec::new()),
            })
        }

        fn statements(&self) -> Vec<(String, Vec<FieldValue>)> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Executor for Recorder {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn insert_strategy(&self) -> InsertStrategy {
            self.strategy
        }

        async fn query(&self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Record>> {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(vec![to_record(json!({"id": 7, "name": "Ada"})).unwrap()])
        }

        async fn execute(&self, sql: &str, params: &[FieldValue]) -> DbResult<WriteOutcome> {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(WriteOutcome {
                rows_affected: 1,
                last_insert_id: Some(7),
            })
        }

        async fn close(&self) {}
    }

    fn model(recorder: Arc<Recorder>) -> Model {
        let config = ConnectionConfig::new(recorder.kind, "unused://");
        let connection = Connection::from_executor(config, recorder);
        Model::new("user", Schema::new(), Arc::new(connection))
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("user"), "users");
        assert_eq!(collection_name("post"), "posts");
    }

    #[tokio::test]
    async fn test_create_with_returning() {
        let recorder = Recorder::new(BackendKind::RelationalNumbered, InsertStrategy::Returning);
        let users = model(recorder.clone());

        let created = users
            .create(to_record(json!({"age": 36, "name": "Ada"})).unwrap())
            .await
            .unwrap();
        assert_eq!(created["id"], 7);

        let statements = recorder.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].0,
            "INSERT INTO users (age, name) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(statements[0].1, vec![FieldValue::Int(36), FieldValue::from("Ada")]);
    }

    #[tokio::test]
    async fn test_create_insert_then_refetch() {
        let recorder = Recorder::new(BackendKind::RelationalPositional, InsertStrategy::InsertThenRefetch);
        let users = model(recorder.clone());

        users
            .create(to_record(json!({"name": "Ada"})).unwrap())
            .await
            .unwrap();

        let statements = recorder.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].0, "INSERT INTO users (name) VALUES (?)");
        assert_eq!(statements[1].0, "SELECT * FROM users WHERE id = ? LIMIT 1");
        assert_eq!(statements[1].1, vec![FieldValue::Int(7)]);
    }

    #[tokio::test]
    async fn test_create_empty_rejected() {
        let recorder = Recorder::new(BackendKind::EmbeddedFile, InsertStrategy::InsertThenRefetch);
        let err = model(recorder.clone()).create(Record::new()).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(recorder.statements().is_empty());
    }

    #[tokio::test]
    async fn test_update_renders_set_then_refetches() {
        let recorder = Recorder::new(BackendKind::RelationalNumbered, InsertStrategy::Returning);
        let users = model(recorder.clone());

        users
            .update(7, to_record(json!({"age": 37, "name": "Ada L."})).unwrap())
            .await
            .unwrap();

        let statements = recorder.statements();
        assert_eq!(statements[0].0, "UPDATE users SET age = $1, name = $2 WHERE id = $3");
        assert_eq!(
            statements[0].1,
            vec![FieldValue::Int(37), FieldValue::from("Ada L."), FieldValue::Int(7)]
        );
        assert_eq!(statements[1].0, "SELECT * FROM users WHERE id = $1 LIMIT 1");
    }

    #[tokio::test]
    async fn test_update_empty_only_refetches() {
        let recorder = Recorder::new(BackendKind::EmbeddedFile, InsertStrategy::InsertThenRefetch);
        model(recorder.clone()).update(7, Record::new()).await.unwrap();

        let statements = recorder.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].0.starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_find_one_uses_first_condition() {
        let recorder = Recorder::new(BackendKind::EmbeddedFile, InsertStrategy::InsertThenRefetch);
        let conditions = to_record(json!({"email": "ada@example.com", "name": "nobody"})).unwrap();
        model(recorder.clone()).find_one(&conditions).await.unwrap();

        let statements = recorder.statements();
        assert_eq!(statements[0].0, "SELECT * FROM users WHERE email = ? LIMIT 1");
        assert_eq!(statements[0].1, vec![FieldValue::from("ada@example.com")]);
    }

    #[tokio::test]
    async fn test_delete_always_true_on_relational() {
        let recorder = Recorder::new(BackendKind::RelationalNumbered, InsertStrategy::Returning);
        assert!(model(recorder.clone()).delete(404).await.unwrap());
        assert_eq!(recorder.statements()[0].0, "DELETE FROM users WHERE id = $1");
    }
}
