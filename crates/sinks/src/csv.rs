//! CSV file sink.
//!
//! Unlike the SQL sinks, the shape here is fixed up front by a JSON shape
//! definition file; the stream is expected to conform to it. Records append
//! to the output file with a single header row, CRLF line endings, and a
//! configurable separator.

use chrono::Local;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use shapesink_config::{CsvSettings, Settings};
use shapesink_core::protocol::{
    DiscoverShapesRequest, DiscoverShapesResponse, DisposeRequest,
    DisposeResponse, InitRequest, InitResponse, ReceiveDataPointRequest,
    ReceiveDataPointResponse, TestConnectionRequest, TestConnectionResponse,
};
use shapesink_core::{
    ShapeDefinition, Subscriber, SubscriberError, SubscriberResult,
};
use async_trait::async_trait;

#[derive(Default)]
pub struct CsvSubscriber {
    open: Option<OpenCsv>,
}

struct OpenCsv {
    out: File,
    columns: Vec<String>,
    separator: String,
    quote: Option<String>,
    headers_written: bool,
}

impl CsvSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    async fn load_shape(
        settings: &CsvSettings,
    ) -> SubscriberResult<ShapeDefinition> {
        let bytes = tokio::fs::read(&settings.shape_file).await?;
        let mut shape: ShapeDefinition = serde_json::from_slice(&bytes)?;
        shape.sort_properties();
        Ok(shape)
    }
}

#[async_trait]
impl Subscriber for CsvSubscriber {
    async fn init(
        &mut self,
        req: InitRequest,
    ) -> SubscriberResult<InitResponse> {
        if let Some(mut prior) = self.open.take() {
            let _ = prior.out.flush().await;
        }

        let settings = Settings::new(req.settings);
        let csv = CsvSettings::from_settings(&settings)
            .map_err(|e| SubscriberError::config(e.to_string()))?;

        let shape = Self::load_shape(&csv).await?;
        let columns: Vec<String> =
            shape.properties.iter().map(|p| p.name.clone()).collect();

        let out_path = csv.out_path(Local::now());
        let out = File::create(&out_path).await?;
        info!(path = %out_path.display(), shape = %shape.name, "output file created");

        self.open = Some(OpenCsv {
            out,
            columns,
            separator: csv.column_separator.clone(),
            quote: csv.quote_character.clone(),
            headers_written: false,
        });

        Ok(InitResponse::ok(format!("Writing {}", out_path.display())))
    }

    async fn test_connection(
        &mut self,
        _req: TestConnectionRequest,
    ) -> SubscriberResult<TestConnectionResponse> {
        Ok(TestConnectionResponse::ok(""))
    }

    async fn discover_shapes(
        &mut self,
        req: DiscoverShapesRequest,
    ) -> SubscriberResult<DiscoverShapesResponse> {
        let settings = Settings::new(req.settings);
        let csv = CsvSettings::from_settings(&settings)
            .map_err(|e| SubscriberError::config(e.to_string()))?;
        let shape = Self::load_shape(&csv).await?;
        Ok(DiscoverShapesResponse::ok(vec![shape]))
    }

    async fn receive_data_point(
        &mut self,
        req: ReceiveDataPointRequest,
    ) -> SubscriberResult<ReceiveDataPointResponse> {
        let open = self.open.as_mut().ok_or(SubscriberError::NotInitialized)?;

        if !open.headers_written {
            let header = render_line(
                &open.columns,
                &open.separator,
                open.quote.as_deref(),
                |c| c.to_string(),
            );
            open.out.write_all(header.as_bytes()).await?;
            open.headers_written = true;
        }

        let data = &req.data_point.data;
        let line = render_line(
            &open.columns,
            &open.separator,
            open.quote.as_deref(),
            |c| data.get(c).map(render_value).unwrap_or_default(),
        );
        open.out.write_all(line.as_bytes()).await?;

        Ok(ReceiveDataPointResponse::ok())
    }

    async fn dispose(
        &mut self,
        _req: DisposeRequest,
    ) -> SubscriberResult<DisposeResponse> {
        let Some(mut open) = self.open.take() else {
            return Ok(DisposeResponse::ok("Not initialized."));
        };
        open.out.flush().await?;
        Ok(DisposeResponse::ok("Closed output file."))
    }
}

fn render_line(
    columns: &[String],
    separator: &str,
    quote: Option<&str>,
    mut field: impl FnMut(&str) -> String,
) -> String {
    let mut line = columns
        .iter()
        .map(|c| {
            let value = field(c);
            match quote {
                Some(q) => format!("{q}{value}{q}"),
                None => value,
            }
        })
        .collect::<Vec<_>>()
        .join(separator);
    line.push_str("\r\n");
    line
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
