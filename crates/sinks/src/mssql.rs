//! SQL Server subscriber pieces.
//!
//! The driver is a host concern: construct the subscriber with a
//! [`DestinationConnector`] that opens whatever client the host links. This
//! module contributes the catalog introspection and the dialect wiring.

use std::collections::BTreeMap;

use serde_json::Value;

use shapesink_config::CommandType;
use shapesink_core::{
    Destination, PropertyDefinition, ShapeDefinition, SubscriberError,
    SubscriberResult,
};
use sql_render::{Dialect, from_sql_type};

use crate::relational::{DestinationConnector, RelationalSubscriber};

impl RelationalSubscriber {
    /// A SQL Server subscriber over a host-provided driver.
    pub fn mssql(connector: Box<dyn DestinationConnector>) -> Self {
        Self::new(Dialect::Mssql, connector)
    }
}

const TABLE_SHAPES_QUERY: &str = "select s.Name, o.Name, c.Name, ty.name from \
    sys.objects o \
    INNER JOIN sys.schemas s ON (o.schema_id = s.schema_id) \
    INNER JOIN sys.columns c ON (o.object_id = c.object_id) \
    INNER JOIN sys.types ty ON (c.user_type_id = ty.user_type_id) \
    where type IN ('U', 'V') \
    ORDER BY s.Name, o.Name, c.column_id";

const SP_SHAPES_QUERY: &str = "select s.Name, o.Name, c.Name, ty.name from \
    sys.procedures o \
    INNER JOIN sys.schemas s ON (o.schema_id = s.schema_id) \
    INNER JOIN sys.parameters c ON (o.object_id = c.object_id) \
    INNER JOIN sys.types ty ON (c.user_type_id = ty.user_type_id) \
    WHERE c.is_output = 0 \
    ORDER BY s.Name, o.Name, c.parameter_id";

/// Rebuild shape definitions from the catalog views. In stored-procedure
/// mode the shapes are the procedures' input parameter lists; otherwise the
/// tables' and views' column lists. Non-dbo objects surface under the
/// `schema__name` compound.
pub(crate) async fn introspect(
    destination: &mut dyn Destination,
    command_type: CommandType,
) -> SubscriberResult<Vec<ShapeDefinition>> {
    let query = match command_type {
        CommandType::StoredProcedure => SP_SHAPES_QUERY,
        CommandType::TableUpsert => TABLE_SHAPES_QUERY,
    };

    let rows = destination
        .query(query)
        .await
        .map_err(|e| SubscriberError::introspect(e.to_string()))?;

    let mut by_name: BTreeMap<String, ShapeDefinition> = BTreeMap::new();
    for row in rows {
        let [schema, object, column, coltype] = [0, 1, 2, 3].map(|i| {
            row.get(i).and_then(Value::as_str).unwrap_or_default()
        });
        if object.is_empty() || column.is_empty() {
            continue;
        }

        let name = if schema == "dbo" || schema.is_empty() {
            object.to_string()
        } else {
            format!("{schema}__{object}")
        };

        let def = by_name.entry(name.clone()).or_insert_with(|| {
            ShapeDefinition {
                name,
                ..Default::default()
            }
        });
        // Parameter names carry the @ prefix in sys.parameters.
        let column = column.trim_start_matches('@');
        def.properties
            .push(PropertyDefinition::new(column, from_sql_type(coltype)));
    }

    Ok(by_name
        .into_values()
        .map(|mut def| {
            def.sort_properties();
            def
        })
        .collect())
}
