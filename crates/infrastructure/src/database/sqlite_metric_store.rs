use async_trait::async_trait;
use hoststat_core::{
    models::{AggregateSummary, ColumnType, MetricSample, SampleValue, TableSchema},
    traits::MetricStore,
    HostStatError, HostStatResult,
};
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

/// 基于表结构描述生成SQL的SQLite样本存储
///
/// 表名与列名只来自静态的 [`TableSchema`]，调用方传入的列名先经过表结构校验，
/// 因此可以直接拼接进语句。
pub struct SqliteMetricStore {
    pool: SqlitePool,
}

impl SqliteMetricStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn create_table_sql(schema: &TableSchema) -> String {
        let columns: Vec<String> = schema
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.kind.sql_type()))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, epoch INTEGER NOT NULL, {}, timestamp INTEGER NOT NULL)",
            schema.table,
            columns.join(", ")
        )
    }

    fn insert_sql(schema: &TableSchema) -> String {
        let names = schema.column_names().join(", ");
        let placeholders: Vec<String> = (1..=schema.columns.len() + 2)
            .map(|i| format!("?{i}"))
            .collect();

        format!(
            "INSERT INTO {} (epoch, {}, timestamp) VALUES ({})",
            schema.table,
            names,
            placeholders.join(", ")
        )
    }

    fn row_to_json(schema: &TableSchema, row: &SqliteRow) -> HostStatResult<Value> {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::from(row.try_get::<i64, _>("id")?));
        object.insert(
            "epoch".to_string(),
            Value::from(row.try_get::<i64, _>("epoch")?),
        );

        for column in schema.columns {
            let value = match column.kind {
                ColumnType::Real => row
                    .try_get::<Option<f64>, _>(column.name)?
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                ColumnType::Integer => row
                    .try_get::<Option<i64>, _>(column.name)?
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                ColumnType::Text => row
                    .try_get::<Option<String>, _>(column.name)?
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            };
            object.insert(column.name.to_string(), value);
        }

        object.insert(
            "timestamp".to_string(),
            Value::from(row.try_get::<i64, _>("timestamp")?),
        );
        Ok(Value::Object(object))
    }
}

#[async_trait]
impl MetricStore for SqliteMetricStore {
    async fn ensure_table(&self, schema: &TableSchema) -> HostStatResult<()> {
        sqlx::query(&Self::create_table_sql(schema))
            .execute(&self.pool)
            .await?;

        let index_sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_epoch ON {table}(epoch)",
            table = schema.table
        );
        sqlx::query(&index_sql).execute(&self.pool).await?;

        debug!("采集表已就绪: {}", schema.table);
        Ok(())
    }

    async fn insert_sample(
        &self,
        schema: &TableSchema,
        sample: &MetricSample,
    ) -> HostStatResult<i64> {
        let unknown = sample.unknown_columns(schema);
        if let Some(column) = unknown.first() {
            return Err(HostStatError::InvalidColumn {
                table: schema.table.to_string(),
                column: column.to_string(),
            });
        }

        let sql = Self::insert_sql(schema);
        let mut query = sqlx::query(&sql).bind(sample.epoch.as_i64());
        for column in schema.columns {
            query = match sample.value_for(column) {
                SampleValue::Real(v) => query.bind(v),
                SampleValue::Integer(v) => query.bind(v),
                SampleValue::Text(v) => query.bind(v),
            };
        }
        let result = query.bind(sample.timestamp).execute(&self.pool).await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_samples(&self, schema: &TableSchema, limit: u32) -> HostStatResult<Vec<Value>> {
        let sql = format!("SELECT * FROM {} ORDER BY id DESC LIMIT ?1", schema.table);
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| Self::row_to_json(schema, row)).collect()
    }

    async fn aggregate(&self, schema: &TableSchema, column: &str) -> HostStatResult<AggregateSummary> {
        let column = schema.numeric_column(column)?.name;

        let sql = format!(
            "SELECT MAX(CAST({c} AS REAL)) AS max_value, MIN(CAST({c} AS REAL)) AS min_value, \
             AVG(CAST({c} AS REAL)) AS avg_value, TOTAL(CAST({c} AS REAL)) AS total_value, \
             COUNT({c}) AS count_value FROM {t}",
            c = column,
            t = schema.table
        );
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;

        Ok(AggregateSummary {
            max: row.try_get("max_value")?,
            min: row.try_get("min_value")?,
            avg: row.try_get("avg_value")?,
            total: row.try_get("total_value")?,
            count: row.try_get("count_value")?,
        })
    }
}
