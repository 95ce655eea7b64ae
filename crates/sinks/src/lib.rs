//! Destination subscribers.
//!
//! Each subscriber implements the `Subscriber` trait from `shapesink_core`
//! and owns its destination handle, its shape cache, and any in-flight
//! transaction for the lifetime of the process.
//!
//! # Available destinations
//!
//! - **MariaDB/MySQL**: table upserts over `mysql_async`, schema rebuilt at
//!   Init via `SHOW TABLES` + `DESCRIBE`
//! - **SQL Server**: table upserts or stored-procedure dispatch over a
//!   host-provided driver, schema rebuilt via the `sys.columns` catalog
//! - **CSV**: append-only file sink driven by a shape definition file
//!
//! # Design
//!
//! - **Cache mirrors storage**: a shape delta reaches the cache only after
//!   the destination accepted the DDL, so a failed ALTER is retried by the
//!   next record with the same shape
//! - **Errors are answers**: pipeline failures become `{success: false}`
//!   responses; only Init failures are fatal
//! - **Credential safety**: connection strings are redacted in logs

use shapesink_core::BoxDynSubscriber;

mod csv;
mod mariadb;
mod mssql;
mod pipeline;
mod relational;

pub use csv::CsvSubscriber;
pub use mariadb::MySqlDestination;
pub use pipeline::apply_data_point;
pub use relational::{DestinationConnector, RelationalSubscriber};

/// Build a subscriber by destination kind.
///
/// SQL Server is not constructible here: its driver is a host concern, so
/// [`RelationalSubscriber::mssql`] must be called directly with a connector.
pub fn build_subscriber(kind: &str) -> anyhow::Result<BoxDynSubscriber> {
    match kind {
        "mariadb" | "mysql" => {
            Ok(Box::new(RelationalSubscriber::mariadb()))
        }
        "csv" => Ok(Box::new(CsvSubscriber::new())),
        other => anyhow::bail!("unknown subscriber kind: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_build() {
        assert!(build_subscriber("mariadb").is_ok());
        assert!(build_subscriber("mysql").is_ok());
        assert!(build_subscriber("csv").is_ok());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(build_subscriber("oracle").is_err());
    }
}
