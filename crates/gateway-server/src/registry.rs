//! Handler registry and router: resolves `(operation, mode[, scenario])`
//! into a concrete handler (spec §4.1 step 4, §4.9).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gateway_core::{HandlerOutput, Operation, OperationRequest, ProcessingMode, SchemaScenario};
use gateway_error::{GatewayError, Result};

use crate::context::RequestContext;
use crate::deps::Dependencies;

/// One stateless unit of work. Handlers never hold request-specific state
/// across calls; anything they need is in `request` or `deps`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, request: &OperationRequest, deps: &Dependencies) -> Result<HandlerOutput>;
}

/// Routing key built from the tuple the lifecycle's ROUTE phase consults.
/// Schema requests carry the scenario; everything else ignores it.
fn route_key(operation: Operation, mode: ProcessingMode, scenario: Option<SchemaScenario>) -> String {
    match scenario {
        Some(s) => format!("{operation:?}.{mode:?}.{}", s.as_key()),
        None => format!("{operation:?}.{mode:?}"),
    }
}

pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, operation: Operation, mode: ProcessingMode, scenario: Option<SchemaScenario>, handler: Arc<dyn Handler>) {
        self.handlers.insert(route_key(operation, mode, scenario), handler);
    }

    pub fn route(&self, request: &OperationRequest) -> Result<Arc<dyn Handler>> {
        let key = route_key(request.operation, request.mode, request.scenario);
        self.handlers.get(&key).cloned().ok_or_else(|| {
            GatewayError::validation_field(
                "This operation is not supported",
                format!("no handler registered for routing key '{key}'"),
                "operation",
            )
        })
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl Handler for Dummy {
        async fn handle(&self, _ctx: &RequestContext, _request: &OperationRequest, _deps: &Dependencies) -> Result<HandlerOutput> {
            unreachable!("not invoked in this test")
        }
    }

    #[test]
    fn unknown_route_is_a_validation_error() {
        let registry = HandlerRegistry::new();
        let request = crate::test_support::sample_request(Operation::Read, ProcessingMode::Single);
        assert!(registry.route(&request).is_err());
    }

    #[test]
    fn registered_route_resolves() {
        let mut registry = HandlerRegistry::new();
        registry.register(Operation::Heartbeat, ProcessingMode::Single, None, Arc::new(Dummy));
        let request = crate::test_support::sample_request(Operation::Heartbeat, ProcessingMode::Single);
        assert!(registry.route(&request).is_ok());
    }
}
