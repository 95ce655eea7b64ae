//! Schema-change rendering: one statement per non-no-op delta.

use shape_engine::ShapeDelta;

use crate::ident::{qualify_name, quote};
use crate::types::to_sql_type;
use crate::Dialect;

/// Render the DDL a destination must run to absorb a delta.
///
/// Returns `None` for a no-op delta. The statement is deterministic: new
/// columns are emitted in ascending name order, and the primary-key column
/// list is the delta's new keys followed by the previously-known keys.
pub fn render_shape_change(
    dialect: Dialect,
    delta: &ShapeDelta,
) -> Option<String> {
    if !delta.has_changes() {
        return None;
    }

    let table = qualify_name(dialect, &delta.name);

    let keys: Vec<&str> = delta
        .new_keys
        .iter()
        .chain(delta.existing_keys.iter())
        .map(String::as_str)
        .collect();
    let is_key = |name: &str| keys.iter().any(|k| *k == name);

    // new_properties is a BTreeMap, so iteration is already name-ordered.
    let columns: Vec<String> = delta
        .new_properties
        .iter()
        .map(|(name, ty)| {
            format!(
                "{} {} {}",
                quote(dialect, name),
                to_sql_type(dialect, ty),
                if is_key(name) { "NOT NULL" } else { "NULL" }
            )
        })
        .collect();

    let key_list = || {
        keys.iter()
            .map(|k| quote(dialect, k))
            .collect::<Vec<_>>()
            .join(", ")
    };

    if delta.is_new {
        let mut body = columns.join(", ");
        if !keys.is_empty() {
            if !body.is_empty() {
                body.push_str(", ");
            }
            body.push_str(&format!("PRIMARY KEY ({})", key_list()));
        }
        return Some(format!("CREATE TABLE IF NOT EXISTS {table} ({body})"));
    }

    let mut clauses: Vec<String> = delta
        .new_properties
        .iter()
        .map(|(name, ty)| {
            format!(
                "ADD COLUMN IF NOT EXISTS {} {} {}",
                quote(dialect, name),
                to_sql_type(dialect, ty),
                if is_key(name) { "NOT NULL" } else { "NULL" }
            )
        })
        .collect();

    if delta.has_key_changes {
        clauses.push("DROP PRIMARY KEY".into());
        clauses.push(format!("ADD PRIMARY KEY ({})", key_list()));
    }

    Some(format!("ALTER TABLE {table} {};", clauses.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shape_engine::{ShapeCache, generate_delta, KnownShape};
    use shapesink_core::{
        DataPoint, PropertyDefinition, ShapeDefinition, ShapeFragment,
    };

    fn data_point(keys: &[&str], props: &[&str]) -> DataPoint {
        DataPoint {
            source: "Test".into(),
            entity: "Products".into(),
            shape: ShapeFragment {
                key_names: keys.iter().map(|s| s.to_string()).collect(),
                properties: props.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            data: serde_json::Map::new(),
        }
    }

    #[test]
    fn create_table_for_a_new_shape() {
        let cache = ShapeCache::new();
        let delta =
            cache.analyze(&data_point(&["id"], &["id:integer", "name:string"]));

        let sql = render_shape_change(Dialect::MariaDb, &delta).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `Test.Products` (`id` INT(10) NOT NULL, `name` VARCHAR(1000) NULL, PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn alter_table_for_an_added_property() {
        let mut cache = ShapeCache::new();
        cache.apply_delta(
            cache.analyze(&data_point(&["id"], &["id:integer", "name:string"])),
        );
        let delta = cache.analyze(&data_point(
            &["id"],
            &["id:integer", "name:string", "other:bool"],
        ));

        let sql = render_shape_change(Dialect::MariaDb, &delta).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE `Test.Products` ADD COLUMN IF NOT EXISTS `other` BIT NULL;"
        );
    }

    #[test]
    fn alter_table_for_an_added_key_emits_only_pk_clauses() {
        let mut cache = ShapeCache::new();
        cache.apply_delta(
            cache.analyze(&data_point(&["id"], &["id:integer", "name:string"])),
        );
        let delta = cache.analyze(&data_point(
            &["id", "otherkey"],
            &["id:integer", "name:string"],
        ));

        let sql = render_shape_change(Dialect::MariaDb, &delta).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE `Test.Products` DROP PRIMARY KEY, ADD PRIMARY KEY (`otherkey`, `id`);"
        );
    }

    #[test]
    fn alter_with_columns_and_keys_orders_new_keys_first() {
        let prev = KnownShape::from_definition(ShapeDefinition {
            name: "Test.Products".into(),
            keys: vec!["id".into()],
            properties: vec![PropertyDefinition::new("id", "integer")],
        });
        let next = KnownShape::from_definition(ShapeDefinition {
            name: "Test.Products".into(),
            keys: vec!["region".into(), "id".into()],
            properties: vec![
                PropertyDefinition::new("id", "integer"),
                PropertyDefinition::new("region", "string"),
            ],
        });
        let delta = generate_delta(Some(&prev), next);

        let sql = render_shape_change(Dialect::MariaDb, &delta).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE `Test.Products` ADD COLUMN IF NOT EXISTS `region` VARCHAR(1000) NOT NULL, DROP PRIMARY KEY, ADD PRIMARY KEY (`region`, `id`);"
        );
    }

    #[test]
    fn noop_delta_renders_nothing() {
        let mut cache = ShapeCache::new();
        cache.apply_delta(
            cache.analyze(&data_point(&["id"], &["id:integer", "name:string"])),
        );
        let delta = cache.analyze(&data_point(&["id"], &["id:integer"]));

        assert!(!delta.has_changes());
        assert!(render_shape_change(Dialect::MariaDb, &delta).is_none());
    }

    #[test]
    fn rendering_is_byte_stable() {
        let cache = ShapeCache::new();
        let dp = data_point(
            &["id"],
            &["id:integer", "name:string", "price:float", "zdate:date"],
        );
        let a = render_shape_change(Dialect::MariaDb, &cache.analyze(&dp));
        let b = render_shape_change(Dialect::MariaDb, &cache.analyze(&dp));
        assert_eq!(a, b);
    }

    #[test]
    fn create_uses_mssql_quoting_and_types() {
        let cache = ShapeCache::new();
        let delta =
            cache.analyze(&data_point(&["id"], &["id:integer", "name:string"]));

        let sql = render_shape_change(Dialect::Mssql, &delta).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS [Test.Products] ([id] INT NOT NULL, [name] NVARCHAR(512) NULL, PRIMARY KEY ([id]))"
        );
    }

    #[test]
    fn table_names_are_scrubbed() {
        let mut dp = data_point(&["id"], &["id:integer"]);
        dp.source = String::new();
        dp.entity = "`DROP Database".into();
        let cache = ShapeCache::new();
        let delta = cache.analyze(&dp);

        let sql = render_shape_change(Dialect::MariaDb, &delta).unwrap();
        assert!(sql.starts_with(
            "CREATE TABLE IF NOT EXISTS `DROP Database` ("
        ));
    }

    #[test]
    fn unknown_property_type_becomes_string_column() {
        let cache = ShapeCache::new();
        let delta =
            cache.analyze(&data_point(&["id"], &["id:integer", "blob:thing"]));

        let sql = render_shape_change(Dialect::MariaDb, &delta).unwrap();
        assert!(sql.contains("`blob` VARCHAR(1000) NULL"));
    }
}
