//! The shared SQL subscriber: owns the connection, the shape cache, and the
//! per-record pipeline; dialect-specific pieces (connector, introspection)
//! plug in from the sibling modules.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use shape_engine::{KnownShape, ShapeCache};
use shapesink_config::{CommandType, ConnectionSettings, Settings};
use shapesink_core::protocol::{
    DiscoverShapesRequest, DiscoverShapesResponse, DisposeRequest,
    DisposeResponse, InitRequest, InitResponse, ReceiveDataPointRequest,
    ReceiveDataPointResponse, TestConnectionRequest, TestConnectionResponse,
};
use shapesink_core::{
    BoxDynDestination, Subscriber, SubscriberError, SubscriberResult,
};
use sql_render::Dialect;

use crate::pipeline::apply_data_point;

/// Opens a destination from parsed connection settings.
///
/// MariaDB ships a concrete connector over `mysql_async`; SQL Server
/// connectors are provided by the host, which owns the driver choice.
#[async_trait]
pub trait DestinationConnector: Send {
    async fn connect(
        &mut self,
        conn: &ConnectionSettings,
    ) -> SubscriberResult<BoxDynDestination>;
}

/// Commit unit for destinations that keep an open transaction.
const COMMIT_EVERY: u64 = 1000;

pub struct RelationalSubscriber {
    dialect: Dialect,
    connector: Box<dyn DestinationConnector>,
    open: Option<OpenState>,
}

struct OpenState {
    destination: BoxDynDestination,
    cache: ShapeCache,
    command_type: CommandType,
    /// Whether this destination keeps one open transaction (SQL Server path).
    batching: bool,
    records_since_commit: u64,
}

impl RelationalSubscriber {
    pub fn new(
        dialect: Dialect,
        connector: Box<dyn DestinationConnector>,
    ) -> Self {
        Self {
            dialect,
            connector,
            open: None,
        }
    }

    fn probe_sql(&self) -> &'static str {
        match self.dialect {
            Dialect::MariaDb => "SELECT VERSION()",
            Dialect::Mssql => "SELECT @@VERSION",
        }
    }

    async fn close_open(&mut self) -> SubscriberResult<()> {
        if let Some(mut open) = self.open.take() {
            if open.batching && open.records_since_commit > 0 {
                open.destination.exec("COMMIT").await.map_err(|e| {
                    SubscriberError::dml(format!(
                        "committing pending transaction: {e}"
                    ))
                })?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Subscriber for RelationalSubscriber {
    async fn init(
        &mut self,
        req: InitRequest,
    ) -> SubscriberResult<InitResponse> {
        // Init may be called again on a live subscriber; the prior handle is
        // closed first so the settings take effect cleanly.
        if self.open.is_some() {
            if let Err(e) = self.close_open().await {
                warn!(error = %e, "closing previous connection during re-init");
            }
        }

        let settings = Settings::new(req.settings);
        let conn = ConnectionSettings::from_settings(&settings)
            .map_err(|e| SubscriberError::config(e.to_string()))?;
        let command_type = settings.command_type();

        let mut destination = self.connector.connect(&conn).await?;

        let version = destination
            .query(self.probe_sql())
            .await
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .and_then(|row| row.into_iter().next())
            .map(cell_text)
            .unwrap_or_default();
        if version.is_empty() {
            return Err(SubscriberError::connect(
                "couldn't get data from database server",
            ));
        }

        // The destination is the persisted state; rebuild the cache from it.
        // A refused metadata query is surfaced but not fatal.
        let cache = match introspect(
            self.dialect,
            command_type,
            destination.as_mut(),
        )
        .await
        {
            Ok(defs) => ShapeCache::with_shapes(
                defs.into_iter().map(KnownShape::from_definition),
            ),
            Err(e) => {
                warn!(error = %e, "introspection failed; starting with an empty shape cache");
                ShapeCache::new()
            }
        };

        let batching = self.dialect == Dialect::Mssql;
        if batching {
            destination.exec("BEGIN TRANSACTION").await.map_err(|e| {
                SubscriberError::connect(format!(
                    "opening initial transaction: {e}"
                ))
            })?;
        }

        let server_info = format!("Connected to: {version}");
        info!(dialect = ?self.dialect, shapes = cache.len(), %server_info, "subscriber initialized");

        self.open = Some(OpenState {
            destination,
            cache,
            command_type,
            batching,
            records_since_commit: 0,
        });

        Ok(InitResponse::ok(server_info))
    }

    async fn test_connection(
        &mut self,
        req: TestConnectionRequest,
    ) -> SubscriberResult<TestConnectionResponse> {
        let resp = self
            .init(InitRequest {
                settings: req.settings,
            })
            .await?;
        Ok(TestConnectionResponse {
            success: resp.success,
            message: resp.message,
        })
    }

    async fn discover_shapes(
        &mut self,
        req: DiscoverShapesRequest,
    ) -> SubscriberResult<DiscoverShapesResponse> {
        if self.open.is_none() {
            self.init(InitRequest {
                settings: req.settings,
            })
            .await?;
        }
        let open =
            self.open.as_ref().ok_or(SubscriberError::NotInitialized)?;

        let mut shapes = open.cache.all_definitions();
        shapes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(DiscoverShapesResponse::ok(shapes))
    }

    async fn receive_data_point(
        &mut self,
        req: ReceiveDataPointRequest,
    ) -> SubscriberResult<ReceiveDataPointResponse> {
        let open = self.open.as_mut().ok_or(SubscriberError::NotInitialized)?;

        apply_data_point(
            self.dialect,
            open.command_type,
            &mut open.cache,
            open.destination.as_mut(),
            &req.data_point,
        )
        .await?;

        if open.batching {
            open.records_since_commit += 1;
            if open.records_since_commit >= COMMIT_EVERY {
                open.destination.exec("COMMIT").await.map_err(|e| {
                    SubscriberError::dml(format!("committing batch: {e}"))
                })?;
                open.destination.exec("BEGIN TRANSACTION").await.map_err(
                    |e| {
                        SubscriberError::dml(format!(
                            "opening next transaction: {e}"
                        ))
                    },
                )?;
                open.records_since_commit = 0;
            }
        }

        Ok(ReceiveDataPointResponse::ok())
    }

    async fn dispose(
        &mut self,
        _req: DisposeRequest,
    ) -> SubscriberResult<DisposeResponse> {
        if self.open.is_none() {
            return Ok(DisposeResponse::ok("Not initialized."));
        }
        self.close_open().await?;
        Ok(DisposeResponse::ok("Closed connection."))
    }
}

async fn introspect(
    dialect: Dialect,
    command_type: CommandType,
    destination: &mut dyn shapesink_core::Destination,
) -> SubscriberResult<Vec<shapesink_core::ShapeDefinition>> {
    match dialect {
        Dialect::MariaDb => crate::mariadb::introspect(destination).await,
        Dialect::Mssql => {
            crate::mssql::introspect(destination, command_type).await
        }
    }
}

/// Render a metadata cell as text, whatever JSON type the driver produced.
pub(crate) fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
