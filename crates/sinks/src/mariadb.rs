//! MariaDB/MySQL destination over `mysql_async`.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts};
use serde_json::Value;
use tracing::info;

use shapesink_config::{ConnectionSettings, redact_url_password};
use shapesink_core::{
    BoxDynDestination, Destination, DestinationError, DestinationResult,
    PropertyDefinition, ShapeDefinition, SubscriberError, SubscriberResult,
};
use sql_render::{Dialect, from_sql_type, scrub};

use crate::relational::{DestinationConnector, RelationalSubscriber};

impl RelationalSubscriber {
    /// A MariaDB/MySQL subscriber with the built-in `mysql_async` connector.
    pub fn mariadb() -> Self {
        Self::new(Dialect::MariaDb, Box::new(MySqlConnector))
    }
}

pub struct MySqlDestination {
    conn: Conn,
}

impl MySqlDestination {
    pub async fn connect(dsn: &str) -> DestinationResult<Self> {
        let opts = Opts::from_url(dsn).map_err(|e| {
            DestinationError::Connect {
                details: format!("invalid DSN: {e}").into(),
            }
        })?;
        let conn = Conn::new(opts).await.map_err(|e| {
            DestinationError::Connect {
                details: e.to_string().into(),
            }
        })?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Destination for MySqlDestination {
    async fn exec(&mut self, sql: &str) -> DestinationResult<u64> {
        self.conn.query_drop(sql).await.map_err(|e| {
            DestinationError::Exec {
                details: e.to_string().into(),
            }
        })?;
        Ok(self.conn.affected_rows())
    }

    async fn exec_with_params(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> DestinationResult<u64> {
        let values: Vec<mysql_async::Value> =
            params.iter().map(to_mysql_value).collect();
        self.conn.exec_drop(sql, values).await.map_err(|e| {
            DestinationError::Exec {
                details: e.to_string().into(),
            }
        })?;
        Ok(self.conn.affected_rows())
    }

    async fn query(&mut self, sql: &str) -> DestinationResult<Vec<Vec<Value>>> {
        let rows: Vec<mysql_async::Row> =
            self.conn.query(sql).await.map_err(|e| {
                DestinationError::Query {
                    details: e.to_string().into(),
                }
            })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| {
                        row.get::<mysql_async::Value, _>(i)
                            .map(from_mysql_value)
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect())
    }
}

pub(crate) struct MySqlConnector;

#[async_trait]
impl DestinationConnector for MySqlConnector {
    async fn connect(
        &mut self,
        conn: &ConnectionSettings,
    ) -> SubscriberResult<BoxDynDestination> {
        let dsn = conn.mysql_dsn();
        info!(dsn = %redact_url_password(&dsn), "connecting");
        let destination = MySqlDestination::connect(&dsn)
            .await
            .map_err(|e| SubscriberError::connect(e.to_string()))?;
        Ok(Box::new(destination))
    }
}

/// Rebuild shape definitions from the live schema: one `SHOW TABLES` pass,
/// then a `DESCRIBE` per table. `PRI` columns become keys; physical column
/// types reverse-map to logical ones.
pub(crate) async fn introspect(
    destination: &mut dyn Destination,
) -> SubscriberResult<Vec<ShapeDefinition>> {
    let tables = destination
        .query("SHOW TABLES")
        .await
        .map_err(|e| SubscriberError::introspect(e.to_string()))?;

    let mut shapes = Vec::new();
    for row in tables {
        let Some(table) = row.into_iter().next().and_then(as_text) else {
            continue;
        };

        let columns = destination
            .query(&format!("DESCRIBE `{}`", scrub(&table)))
            .await
            .map_err(|e| SubscriberError::introspect(e.to_string()))?;

        let mut def = ShapeDefinition {
            name: table,
            ..Default::default()
        };
        for col in columns {
            // DESCRIBE row: Field, Type, Null, Key, Default, Extra
            let field = col.first().and_then(Value::as_str).unwrap_or_default();
            if field.is_empty() {
                continue;
            }
            let coltype =
                col.get(1).and_then(Value::as_str).unwrap_or_default();
            if col.get(3).and_then(Value::as_str) == Some("PRI") {
                def.keys.push(field.to_string());
            }
            def.properties
                .push(PropertyDefinition::new(field, from_sql_type(coltype)));
        }
        def.sort_properties();
        shapes.push(def);
    }

    shapes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(shapes)
}

fn as_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn to_mysql_value(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mysql_async::Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                mysql_async::Value::UInt(u)
            } else {
                mysql_async::Value::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => mysql_async::Value::Bytes(s.clone().into_bytes()),
        other => mysql_async::Value::Bytes(other.to_string().into_bytes()),
    }
}

fn from_mysql_value(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => {
            Value::String(String::from_utf8_lossy(&b).into_owned())
        }
        mysql_async::Value::Int(i) => i.into(),
        mysql_async::Value::UInt(u) => u.into(),
        mysql_async::Value::Float(f) => serde_json::json!(f),
        mysql_async::Value::Double(d) => serde_json::json!(d),
        other => Value::String(format!("{other:?}")),
    }
}
