//! Per-record upsert rendering.
//!
//! The rendered SQL and its parameter order are memoized in the shape's
//! scratch cache; a merge wipes the scratch, so a plan never outlives the
//! definition it was built from.

use std::sync::Arc;

use serde_json::Value;

use shape_engine::KnownShape;
use shapesink_core::DataPoint;

use crate::ident::{qualify_name, quote, scrub};
use crate::Dialect;

pub const SCRATCH_UPSERT_PLAN: &str = "upsert_plan";
const SCRATCH_EXEC_PLAN: &str = "stored_procedure_plan";

/// A prepared upsert: the SQL text plus the column name behind each `?`
/// placeholder, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertPlan {
    pub sql: String,
    pub param_columns: Vec<String>,
}

impl UpsertPlan {
    /// Order the data point's values to match the plan's placeholders.
    /// Missing keys map to SQL NULL.
    pub fn params_for(&self, dp: &DataPoint) -> Vec<Value> {
        param_values(&self.param_columns, dp)
    }
}

/// `[dp.data[c] or NULL for c in columns]`.
pub fn param_values(columns: &[String], dp: &DataPoint) -> Vec<Value> {
    columns
        .iter()
        .map(|c| dp.data.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Render the upsert for a data point against its (post-apply) shape,
/// memoizing the plan in the shape's scratch cache.
pub fn render_upsert(
    dialect: Dialect,
    shape: &mut KnownShape,
    dp: &DataPoint,
) -> (Arc<UpsertPlan>, Vec<Value>) {
    let plan = match shape.get::<UpsertPlan>(SCRATCH_UPSERT_PLAN) {
        Some(plan) => plan,
        None => {
            let plan = build_upsert_plan(dialect, shape);
            shape.set(SCRATCH_UPSERT_PLAN, plan);
            shape
                .get::<UpsertPlan>(SCRATCH_UPSERT_PLAN)
                .expect("plan was just cached")
        }
    };
    let params = plan.params_for(dp);
    (plan, params)
}

/// Render the stored-procedure call form (`command_type = "stored
/// procedure"`): one `@Column = ?` argument per property, in column order.
pub fn render_stored_procedure(
    shape: &mut KnownShape,
    dp: &DataPoint,
) -> (Arc<UpsertPlan>, Vec<Value>) {
    let plan = match shape.get::<UpsertPlan>(SCRATCH_EXEC_PLAN) {
        Some(plan) => plan,
        None => {
            let plan = build_exec_plan(shape);
            shape.set(SCRATCH_EXEC_PLAN, plan);
            shape
                .get::<UpsertPlan>(SCRATCH_EXEC_PLAN)
                .expect("plan was just cached")
        }
    };
    let params = plan.params_for(dp);
    (plan, params)
}

fn sorted_columns(shape: &KnownShape) -> Vec<String> {
    let mut columns: Vec<String> =
        shape.properties().iter().map(|p| p.name.clone()).collect();
    columns.sort();
    columns
}

fn build_upsert_plan(dialect: Dialect, shape: &KnownShape) -> UpsertPlan {
    let columns = sorted_columns(shape);
    let non_key: Vec<&String> = columns
        .iter()
        .filter(|c| !shape.definition().has_key(c))
        .collect();

    match dialect {
        Dialect::MariaDb => {
            build_maria_upsert(shape, &columns, &non_key)
        }
        Dialect::Mssql => build_mssql_upsert(shape, &columns, &non_key),
    }
}

fn build_maria_upsert(
    shape: &KnownShape,
    columns: &[String],
    non_key: &[&String],
) -> UpsertPlan {
    let table = qualify_name(Dialect::MariaDb, shape.name());
    let quoted: Vec<String> =
        columns.iter().map(|c| quote(Dialect::MariaDb, c)).collect();
    let placeholders = vec!["?"; columns.len()].join(",");

    let sql = if non_key.is_empty() {
        // Every column is part of the key; a duplicate row carries nothing
        // to update.
        format!(
            "INSERT IGNORE INTO {table} ({}) VALUES ({placeholders});",
            quoted.join(", ")
        )
    } else {
        let updates: Vec<String> = non_key
            .iter()
            .map(|c| {
                let q = quote(Dialect::MariaDb, c);
                format!("{q}=VALUES({q})")
            })
            .collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders}) ON DUPLICATE KEY UPDATE {};",
            quoted.join(", "),
            updates.join(",")
        )
    };

    UpsertPlan {
        sql,
        param_columns: columns.to_vec(),
    }
}

fn build_mssql_upsert(
    shape: &KnownShape,
    columns: &[String],
    non_key: &[&String],
) -> UpsertPlan {
    let table = qualify_name(Dialect::Mssql, shape.name());
    let keys: Vec<&String> = columns
        .iter()
        .filter(|c| shape.definition().has_key(c))
        .collect();

    let quoted: Vec<String> =
        columns.iter().map(|c| quote(Dialect::Mssql, c)).collect();
    let placeholders = vec!["?"; columns.len()].join(",");
    let where_clause = keys
        .iter()
        .map(|k| format!("{}=?", quote(Dialect::Mssql, k)))
        .collect::<Vec<_>>()
        .join(" AND ");
    let insert = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        quoted.join(", ")
    );

    let mut param_columns = Vec::new();
    let sql = if non_key.is_empty() {
        param_columns.extend(keys.iter().map(|k| (*k).clone()));
        param_columns.extend(columns.iter().cloned());
        format!(
            "IF NOT EXISTS (SELECT 1 FROM {table} WHERE {where_clause}) {insert};"
        )
    } else {
        let sets = non_key
            .iter()
            .map(|c| format!("{}=?", quote(Dialect::Mssql, c)))
            .collect::<Vec<_>>()
            .join(", ");
        param_columns.extend(non_key.iter().map(|c| (*c).clone()));
        param_columns.extend(keys.iter().map(|k| (*k).clone()));
        param_columns.extend(columns.iter().cloned());
        format!(
            "UPDATE {table} SET {sets} WHERE {where_clause}; IF @@ROWCOUNT = 0 {insert};"
        )
    };

    UpsertPlan { sql, param_columns }
}

fn build_exec_plan(shape: &KnownShape) -> UpsertPlan {
    let columns = sorted_columns(shape);

    // Stored procedures live under dbo unless the name carries a schema.
    let (schema, proc_name) = match shape.name().split_once("__") {
        Some((schema, name)) if !schema.is_empty() => (schema, name),
        _ => ("dbo", shape.name()),
    };

    let args = columns
        .iter()
        .map(|c| format!("@{} = ?", scrub(c)))
        .collect::<Vec<_>>()
        .join(", ");

    UpsertPlan {
        sql: format!(
            "EXEC {}.{} {args};",
            quote(Dialect::Mssql, schema),
            quote(Dialect::Mssql, proc_name)
        ),
        param_columns: columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shapesink_core::{PropertyDefinition, ShapeDefinition};

    fn products_shape() -> KnownShape {
        KnownShape::from_definition(ShapeDefinition {
            name: "Test.Products".into(),
            keys: vec!["ID".into()],
            properties: vec![
                PropertyDefinition::new("DateAvailable", "date"),
                PropertyDefinition::new("ID", "integer"),
                PropertyDefinition::new("Name", "string"),
                PropertyDefinition::new("Price", "float"),
            ],
        })
    }

    fn products_data_point() -> DataPoint {
        let mut dp = DataPoint {
            source: "Test".into(),
            entity: "Products".into(),
            ..Default::default()
        };
        dp.data.insert("ID".into(), json!(1));
        dp.data.insert("Name".into(), json!("First"));
        dp.data.insert("Price".into(), json!(42.2));
        dp.data.insert("DateAvailable".into(), json!("2017-10-11"));
        dp
    }

    #[test]
    fn maria_upsert_matches_expected_sql_and_params() {
        let mut shape = products_shape();
        let dp = products_data_point();

        let (plan, params) =
            render_upsert(Dialect::MariaDb, &mut shape, &dp);

        assert_eq!(
            plan.sql,
            "INSERT INTO `Test.Products` (`DateAvailable`, `ID`, `Name`, `Price`) VALUES (?,?,?,?) ON DUPLICATE KEY UPDATE `DateAvailable`=VALUES(`DateAvailable`),`Name`=VALUES(`Name`),`Price`=VALUES(`Price`);"
        );
        assert_eq!(
            params,
            vec![json!("2017-10-11"), json!(1), json!("First"), json!(42.2)]
        );
    }

    #[test]
    fn param_vector_aligns_with_placeholders() {
        let mut shape = products_shape();
        let dp = products_data_point();

        let (plan, params) =
            render_upsert(Dialect::MariaDb, &mut shape, &dp);
        assert_eq!(plan.sql.matches('?').count(), params.len());

        let (plan, params) = render_upsert(Dialect::Mssql, &mut shape, &dp);
        assert_eq!(plan.sql.matches('?').count(), params.len());
    }

    #[test]
    fn missing_data_keys_become_null() {
        let mut shape = products_shape();
        let mut dp = products_data_point();
        dp.data.remove("Price");

        let (_, params) = render_upsert(Dialect::MariaDb, &mut shape, &dp);
        assert_eq!(params[3], Value::Null);
    }

    #[test]
    fn plan_is_memoized_until_merge() {
        let mut shape = products_shape();
        let dp = products_data_point();

        assert!(shape.get::<UpsertPlan>(SCRATCH_UPSERT_PLAN).is_none());
        let (first, _) = render_upsert(Dialect::MariaDb, &mut shape, &dp);
        let (second, _) = render_upsert(Dialect::MariaDb, &mut shape, &dp);
        assert!(Arc::ptr_eq(&first, &second));

        let mut wider = products_shape();
        let other = KnownShape::from_definition(ShapeDefinition {
            name: "Test.Products".into(),
            keys: vec!["ID".into()],
            properties: vec![PropertyDefinition::new("Extra", "bool")],
        });
        wider.merge(other);
        assert!(
            wider.get::<UpsertPlan>(SCRATCH_UPSERT_PLAN).is_none(),
            "merge must invalidate the memoized plan"
        );
    }

    #[test]
    fn rerendered_plan_after_merge_sees_new_columns() {
        let mut shape = products_shape();
        let dp = products_data_point();
        let _ = render_upsert(Dialect::MariaDb, &mut shape, &dp);

        shape.merge(KnownShape::from_definition(ShapeDefinition {
            name: "Test.Products".into(),
            keys: vec!["ID".into()],
            properties: vec![PropertyDefinition::new("Extra", "bool")],
        }));

        let (plan, params) =
            render_upsert(Dialect::MariaDb, &mut shape, &dp);
        assert!(plan.sql.contains("`Extra`"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn mssql_upsert_updates_then_inserts() {
        let mut shape = products_shape();
        let dp = products_data_point();

        let (plan, params) = render_upsert(Dialect::Mssql, &mut shape, &dp);

        assert_eq!(
            plan.sql,
            "UPDATE [Test.Products] SET [DateAvailable]=?, [Name]=?, [Price]=? WHERE [ID]=?; IF @@ROWCOUNT = 0 INSERT INTO [Test.Products] ([DateAvailable], [ID], [Name], [Price]) VALUES (?,?,?,?);"
        );
        // set columns, then keys, then the full insert list
        assert_eq!(
            params,
            vec![
                json!("2017-10-11"),
                json!("First"),
                json!(42.2),
                json!(1),
                json!("2017-10-11"),
                json!(1),
                json!("First"),
                json!(42.2),
            ]
        );
    }

    #[test]
    fn stored_procedure_call_uses_dbo_default() {
        let mut shape = products_shape();
        let dp = products_data_point();

        let (plan, params) = render_stored_procedure(&mut shape, &dp);
        assert_eq!(
            plan.sql,
            "EXEC [dbo].[Test.Products] @DateAvailable = ?, @ID = ?, @Name = ?, @Price = ?;"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn stored_procedure_call_splits_schema_compound() {
        let mut shape = KnownShape::from_definition(ShapeDefinition {
            name: "sales__UpsertOrder".into(),
            keys: vec![],
            properties: vec![PropertyDefinition::new("ID", "integer")],
        });
        let (plan, _) =
            render_stored_procedure(&mut shape, &DataPoint::default());
        assert_eq!(plan.sql, "EXEC [sales].[UpsertOrder] @ID = ?;");
    }

    #[test]
    fn all_key_shape_falls_back_to_insert_ignore() {
        let mut shape = KnownShape::from_definition(ShapeDefinition {
            name: "t".into(),
            keys: vec!["a".into(), "b".into()],
            properties: vec![
                PropertyDefinition::new("a", "integer"),
                PropertyDefinition::new("b", "integer"),
            ],
        });
        let (plan, params) =
            render_upsert(Dialect::MariaDb, &mut shape, &DataPoint::default());
        assert_eq!(
            plan.sql,
            "INSERT IGNORE INTO `t` (`a`, `b`) VALUES (?,?);"
        );
        assert_eq!(params, vec![Value::Null, Value::Null]);
    }
}
