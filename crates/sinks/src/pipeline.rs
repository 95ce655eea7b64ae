//! The per-record pipeline: recognize, analyze, evolve, write.

use metrics::counter;
use tracing::debug;

use shape_engine::ShapeCache;
use shapesink_config::CommandType;
use shapesink_core::{DataPoint, Destination, SubscriberError, SubscriberResult};
use sql_render::{
    Dialect, render_shape_change, render_stored_procedure, render_upsert,
};

/// Land one data point: evolve the destination schema if the shape is new or
/// wider, then upsert the record.
///
/// On DDL failure the delta is not applied to the cache, so the next record
/// with the same shape observes the same delta and retries. On DML failure
/// the shape state is already consistent with the destination and only the
/// record is rejected.
pub async fn apply_data_point(
    dialect: Dialect,
    command_type: CommandType,
    cache: &mut ShapeCache,
    destination: &mut dyn Destination,
    dp: &DataPoint,
) -> SubscriberResult<()> {
    let name = dp.canonical_name();
    counter!("shapesink_datapoints_total", "shape" => name.clone())
        .increment(1);

    if cache.recognize(dp).is_none() {
        let delta = cache.analyze(dp);
        // Stored procedures own their write path; there is no table to
        // evolve, but the cache still learns the shape.
        if command_type == CommandType::TableUpsert {
            if let Some(sql) = render_shape_change(dialect, &delta) {
                debug!(shape = %name, %sql, "applying schema change");
                destination.exec(&sql).await.map_err(|e| {
                    counter!("shapesink_ddl_failures_total", "shape" => name.clone())
                        .increment(1);
                    SubscriberError::ddl(e.to_string())
                })?;
            }
        }
        cache.apply_delta(delta);
    }

    let shape = cache
        .get_mut(&name)
        .ok_or_else(|| SubscriberError::dml("shape missing after apply"))?;

    let (plan, params) = match command_type {
        CommandType::TableUpsert => render_upsert(dialect, shape, dp),
        CommandType::StoredProcedure => render_stored_procedure(shape, dp),
    };

    destination
        .exec_with_params(&plan.sql, &params)
        .await
        .map_err(|e| {
            counter!("shapesink_dml_failures_total", "shape" => name.clone())
                .increment(1);
            SubscriberError::dml(e.to_string())
        })?;

    Ok(())
}
