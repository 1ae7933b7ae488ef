// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres core.
//!
//! Key/value pairs live in a `ghost_kv` table (created on connect);
//! SQL operations run verbatim with JSON-typed parameters and rows.

use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::time::Duration;
use tracing::debug;

const KV_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS ghost_kv (\
     key TEXT PRIMARY KEY, \
     value BYTEA NOT NULL, \
     expires_at TIMESTAMPTZ\
 )";

pub struct PostgresData {
    pool: PgPool,
}

impl PostgresData {
    pub async fn connect(url: &str) -> Result<Self, DataError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        sqlx::query(KV_TABLE_DDL).execute(&pool).await.map_err(map_sqlx)?;
        debug!("postgres core connected");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn expiry(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|d| Utc::now() + d)
    }
}

fn map_sqlx(e: sqlx::Error) -> DataError {
    match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DataError::ConnectionFailed(e.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            DataError::Validation(e.to_string())
        }
        _ => DataError::OperationFailed(e.to_string()),
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

fn build_query<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_value(query, param);
    }
    query
}

fn row_to_json(row: &PgRow) -> Value {
    let mut object = serde_json::Map::new();
    for column in row.columns() {
        let index = column.ordinal();
        object.insert(column.name().to_string(), column_value(row, index, column.type_info().name()));
    }
    Value::Object(object)
}

fn column_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    fn number(n: impl Into<serde_json::Number>) -> Value {
        Value::Number(n.into())
    }
    match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(number)
            .unwrap_or(Value::Null),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(number)
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(number)
            .unwrap_or(Value::Null),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .and_then(|f| serde_json::Number::from_f64(f as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)
            .ok()
            .flatten()
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(|bytes| {
                use base64::Engine as _;
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            })
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[async_trait]
impl DataClient for PostgresData {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        let row = sqlx::query(
            "SELECT value FROM ghost_kv \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        match row {
            Some(row) => row.try_get::<Vec<u8>, _>(0).map(Some).map_err(map_sqlx),
            None => Ok(None),
        }
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        sqlx::query(
            "INSERT INTO ghost_kv (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = $2, expires_at = $3",
        )
        .bind(key)
        .bind(value)
        .bind(Self::expiry(ttl))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        let result = sqlx::query("DELETE FROM ghost_kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM ghost_kv \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > now()))",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.kv_get(key).await?);
        }
        Ok(out)
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        for (key, value) in pairs {
            self.kv_set(&key, value, ttl).await?;
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
        let rows = build_query(sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        let row = build_query(sql, params)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.as_ref().map(row_to_json))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        let result = build_query(sql, params)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let mut affected = 0u64;
        for statement in statements {
            let result = build_query(&statement.sql, &statement.params)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
            affected += result.rows_affected();
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(affected)
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(Box::new(PgTransaction { tx: Some(tx) }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DataError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        sqlx::query_scalar::<_, String>(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    fn layer_names(&self) -> Vec<&'static str> {
        vec!["postgres"]
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

struct PgTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

#[async_trait]
impl DataTransaction for PgTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| DataError::InvalidOperation("transaction already finished".into()))?;
        let result = build_query(sql, params)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DataError::InvalidOperation("transaction already finished".into()))?;
        tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DataError::InvalidOperation("transaction already finished".into()))?;
        tx.rollback().await.map_err(map_sqlx)
    }
}
