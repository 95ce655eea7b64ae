use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod errors;
pub mod protocol;

pub use errors::{
    DestinationError, DestinationResult, SubscriberError, SubscriberResult,
};
pub use protocol::{
    DiscoverShapesRequest, DiscoverShapesResponse, DisposeRequest,
    DisposeResponse, InitRequest, InitResponse, ReceiveDataPointRequest,
    ReceiveDataPointResponse, TestConnectionRequest, TestConnectionResponse,
};

/// One typed column of a shape.
///
/// `ty` is the logical type as it arrived on the wire
/// (`string`, `integer`, `number`/`float`, `date`, `bool`). Unknown types are
/// carried verbatim; the DDL layer surfaces them as the string column type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,

    #[serde(rename = "type", default)]
    pub ty: String,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// The `name:type` wire form of this property.
    pub fn property_string(&self) -> String {
        format!("{}:{}", self.name, self.ty)
    }
}

/// The self-description attached to every inbound data point.
///
/// `properties` entries are `name:type` strings. The two fingerprints are
/// precomputed upstream when possible; zero means "unknown" and is recomputed
/// on arrival by the shape engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeFragment {
    pub key_names: Vec<String>,
    pub properties: Vec<String>,
    pub key_names_hash: u32,
    pub property_hash: u32,
}

/// Canonical, destination-facing description of one logical entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDefinition {
    pub name: String,

    #[serde(default)]
    pub keys: Vec<String>,

    /// Sorted ascending by name, unique by name.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl ShapeDefinition {
    pub fn sort_properties(&mut self) {
        self.properties.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }
}

/// A single inbound record: payload plus its shape fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPoint {
    pub source: String,
    pub entity: String,
    pub shape: ShapeFragment,
    pub data: serde_json::Map<String, Value>,
}

impl DataPoint {
    /// The stable identifier used to locate this record's shape in the cache:
    /// `"source.entity"` when both are set, otherwise the non-empty one.
    pub fn canonical_name(&self) -> String {
        canonical_name(&self.source, &self.entity)
    }
}

pub fn canonical_name(source: &str, entity: &str) -> String {
    match (source.is_empty(), entity.is_empty()) {
        (false, false) => format!("{source}.{entity}"),
        (false, true) => source.to_string(),
        (true, false) => entity.to_string(),
        (true, true) => String::new(),
    }
}

/// Capability set a destination must provide.
///
/// The engine depends only on this; each destination variant (MariaDB,
/// SQL Server, file) implements it once. A destination handle is exclusively
/// owned by its subscriber; calls are serialized.
#[async_trait]
pub trait Destination: Send {
    /// Execute a statement without parameters (DDL, transaction control).
    async fn exec(&mut self, sql: &str) -> DestinationResult<u64>;

    /// Execute a statement with positional `?` parameters.
    async fn exec_with_params(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> DestinationResult<u64>;

    /// Run a metadata query, returning untyped rows.
    async fn query(&mut self, sql: &str) -> DestinationResult<Vec<Vec<Value>>>;
}

/// The five operations every subscriber supports. The transport layer maps
/// `Err` into a `{success: false, message}` envelope; only Init failures are
/// fatal to the process.
#[async_trait]
pub trait Subscriber: Send {
    async fn init(
        &mut self,
        req: InitRequest,
    ) -> SubscriberResult<InitResponse>;

    async fn test_connection(
        &mut self,
        req: TestConnectionRequest,
    ) -> SubscriberResult<TestConnectionResponse>;

    async fn discover_shapes(
        &mut self,
        req: DiscoverShapesRequest,
    ) -> SubscriberResult<DiscoverShapesResponse>;

    async fn receive_data_point(
        &mut self,
        req: ReceiveDataPointRequest,
    ) -> SubscriberResult<ReceiveDataPointResponse>;

    async fn dispose(
        &mut self,
        req: DisposeRequest,
    ) -> SubscriberResult<DisposeResponse>;
}

pub type BoxDynDestination = Box<dyn Destination>;
pub type BoxDynSubscriber = Box<dyn Subscriber>;
