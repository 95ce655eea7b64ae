//! HTTP transport for a subscriber.
//!
//! One route per subscriber operation. Pipeline errors never surface as HTTP
//! failures: every error is folded into the operation's response envelope as
//! `{success: false, message}`, and the caller decides what is fatal.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::{get, post}};
use tokio::sync::Mutex;
use tracing::error;

use shapesink_core::protocol::{
    DiscoverShapesRequest, DiscoverShapesResponse, DisposeRequest,
    DisposeResponse, InitRequest, InitResponse, ReceiveDataPointRequest,
    ReceiveDataPointResponse, TestConnectionRequest, TestConnectionResponse,
};
use shapesink_core::BoxDynSubscriber;

#[derive(Clone)]
pub struct AppState {
    pub subscriber: Arc<Mutex<BoxDynSubscriber>>,
}

impl AppState {
    pub fn new(subscriber: BoxDynSubscriber) -> Self {
        Self {
            subscriber: Arc::new(Mutex::new(subscriber)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/init", post(init))
        .route("/test-connection", post(test_connection))
        .route("/discover-shapes", post(discover_shapes))
        .route("/receive-data-point", post(receive_data_point))
        .route("/dispose", post(dispose))
        .with_state(state)
}

/// Failure form of a response envelope.
trait Envelope {
    fn failure(message: String) -> Self;
}

macro_rules! impl_envelope {
    ($($ty:ty),+) => {$(
        impl Envelope for $ty {
            fn failure(message: String) -> Self {
                Self {
                    success: false,
                    message: Some(message),
                    ..Default::default()
                }
            }
        }
    )+};
}

impl_envelope!(
    InitResponse,
    TestConnectionResponse,
    DiscoverShapesResponse,
    ReceiveDataPointResponse,
    DisposeResponse
);

fn envelope<T: Envelope>(
    op: &'static str,
    result: shapesink_core::SubscriberResult<T>,
) -> Json<T> {
    match result {
        Ok(resp) => Json(resp),
        Err(e) => {
            error!(operation = op, error = %e, "subscriber operation failed");
            Json(T::failure(e.to_string()))
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn init(
    State(st): State<AppState>,
    Json(req): Json<InitRequest>,
) -> Json<InitResponse> {
    envelope("init", st.subscriber.lock().await.init(req).await)
}

async fn test_connection(
    State(st): State<AppState>,
    Json(req): Json<TestConnectionRequest>,
) -> Json<TestConnectionResponse> {
    envelope(
        "test_connection",
        st.subscriber.lock().await.test_connection(req).await,
    )
}

async fn discover_shapes(
    State(st): State<AppState>,
    Json(req): Json<DiscoverShapesRequest>,
) -> Json<DiscoverShapesResponse> {
    envelope(
        "discover_shapes",
        st.subscriber.lock().await.discover_shapes(req).await,
    )
}

async fn receive_data_point(
    State(st): State<AppState>,
    Json(req): Json<ReceiveDataPointRequest>,
) -> Json<ReceiveDataPointResponse> {
    envelope(
        "receive_data_point",
        st.subscriber.lock().await.receive_data_point(req).await,
    )
}

async fn dispose(
    State(st): State<AppState>,
    Json(req): Json<DisposeRequest>,
) -> Json<DisposeResponse> {
    envelope("dispose", st.subscriber.lock().await.dispose(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shapesink_core::{Subscriber, SubscriberError, SubscriberResult};

    /// Succeeds on everything except receive, which rejects every record.
    struct StubSubscriber;

    #[async_trait]
    impl Subscriber for StubSubscriber {
        async fn init(
            &mut self,
            _req: InitRequest,
        ) -> SubscriberResult<InitResponse> {
            Ok(InitResponse::ok("Connected to: stub"))
        }

        async fn test_connection(
            &mut self,
            _req: TestConnectionRequest,
        ) -> SubscriberResult<TestConnectionResponse> {
            Ok(TestConnectionResponse::ok("ok"))
        }

        async fn discover_shapes(
            &mut self,
            _req: DiscoverShapesRequest,
        ) -> SubscriberResult<DiscoverShapesResponse> {
            Ok(DiscoverShapesResponse::ok(vec![]))
        }

        async fn receive_data_point(
            &mut self,
            _req: ReceiveDataPointRequest,
        ) -> SubscriberResult<ReceiveDataPointResponse> {
            Err(SubscriberError::dml("row write failed"))
        }

        async fn dispose(
            &mut self,
            _req: DisposeRequest,
        ) -> SubscriberResult<DisposeResponse> {
            Ok(DisposeResponse::ok("Closed connection."))
        }
    }

    fn state() -> AppState {
        AppState::new(Box::new(StubSubscriber))
    }

    #[tokio::test]
    async fn success_flows_through_as_is() {
        let Json(resp) =
            init(State(state()), Json(InitRequest::default())).await;
        assert!(resp.success);
        assert_eq!(resp.message.as_deref(), Some("Connected to: stub"));
    }

    #[tokio::test]
    async fn errors_become_failure_envelopes() {
        let Json(resp) = receive_data_point(
            State(state()),
            Json(ReceiveDataPointRequest::default()),
        )
        .await;
        assert!(!resp.success);
        assert!(resp.message.unwrap().contains("row write failed"));
    }

    #[test]
    fn router_builds() {
        let _ = router(state());
    }
}
