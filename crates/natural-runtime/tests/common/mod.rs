//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use natural_core::{Map, object};
use natural_runtime::UpdateTarget;

pub fn map(json: serde_json::Value) -> Map {
    object(json).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError(pub String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service error: {}", self.0)
    }
}

impl std::error::Error for ServiceError {}

/// In-memory update service that records every call and echoes the fields.
#[derive(Default)]
pub struct FakeService {
    calls: Mutex<Vec<Map>>,
    latency: Duration,
    failing: bool,
    panicking: bool,
}

impl FakeService {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panicking: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Map> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateTarget for FakeService {
    type Output = Map;
    type Error = ServiceError;

    async fn update_now(&self, fields: Map) -> Result<Map, ServiceError> {
        self.calls.lock().unwrap().push(fields.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        assert!(!self.panicking, "service crashed");
        if self.failing {
            Err(ServiceError("rejected".into()))
        } else {
            Ok(fields)
        }
    }
}
