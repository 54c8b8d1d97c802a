//! The ten-phase request orchestrator (spec §4.1). `Lifecycle::process`
//! is the only place that sequences VALIDATE through the final cleanup;
//! every phase failure is mapped to an `ErrorDetail` and returned inside
//! an `OperationResponse` rather than propagated.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;

use gateway_core::{
    shape_result, validators, HandlerOutput, Operation, OperationRequest, OperationResponse, Payload, ProcessingMode,
    ShapedResult,
};
use gateway_error::{ErrorDetail, GatewayError};

use crate::admission::AdmissionGate;
use crate::context::{RequestContext, RequestHeaders};
use crate::deps::Dependencies;
use crate::rate_limiter::RateLimiter;
use crate::registry::HandlerRegistry;
use crate::warmup::WarmupGate;

pub struct Lifecycle {
    pub registry: HandlerRegistry,
    pub rate_limiter: RateLimiter,
    pub admission: AdmissionGate,
    pub warmup: WarmupGate,
    last_rate_limiter_cleanup: Mutex<Instant>,
}

fn validate_request(request: &OperationRequest, deps: &Dependencies) -> gateway_error::Result<()> {
    if let Some(payload) = &request.payload {
        validators::validate_batch_size(payload, deps.config.max_batch_size)?;
    }

    if request.operation == Operation::Transaction {
        validators::validate_transaction_shape(request, deps.config.max_transaction_statements)?;
    }

    if matches!(request.operation, Operation::Update | Operation::Merge | Operation::Delete) {
        validators::validate_mutation_safety(request)?;
    }

    if request.mode == ProcessingMode::Batch && matches!(request.operation, Operation::Update | Operation::Merge) {
        if let Some(Payload::Batch(records)) = &request.payload {
            crate::intent_build::per_record_where(&request.filter_where, records.len())?;
        }
    }

    Ok(())
}

impl Lifecycle {
    pub fn new(registry: HandlerRegistry, rate_limiter: RateLimiter, admission: AdmissionGate, warmup: WarmupGate) -> Self {
        Self {
            registry,
            rate_limiter,
            admission,
            warmup,
            last_rate_limiter_cleanup: Mutex::new(Instant::now()),
        }
    }

    /// Evicts idle rate-limiter sessions at most once per `interval`,
    /// regardless of how many concurrent requests race into OBSERVE at
    /// once (spec §4.1 step 9).
    fn maybe_cleanup_rate_limiter(&self, interval: Duration) {
        let mut last = self.last_rate_limiter_cleanup.lock();
        if last.elapsed() >= interval {
            self.rate_limiter.cleanup();
            *last = Instant::now();
        }
    }

    pub async fn process(
        &self,
        mut request: OperationRequest,
        mut ctx: RequestContext,
        headers: &RequestHeaders,
        deps: &Dependencies,
    ) -> OperationResponse {
        let started = std::time::Instant::now();
        let mut schema_resolved = false;

        let response = self.run_phases(&mut request, &mut ctx, headers, deps, &mut schema_resolved).await;

        let mut response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id,
                    phase = %ctx.phase,
                    error = %err.internal_message(),
                    "request failed"
                );
                OperationResponse::failure(ErrorDetail::from(&err))
            }
        };

        response.metadata.insert("correlation_id".to_string(), json!(ctx.correlation_id));
        if schema_resolved {
            response.metadata.insert("schema_resolved".to_string(), json!(true));
        }

        tracing::info!(
            correlation_id = %ctx.correlation_id,
            operation = ?request.operation,
            mode = ?request.mode,
            success = response.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request complete"
        );

        self.maybe_cleanup_rate_limiter(deps.config.rate_limit_cleanup_interval);

        ctx.set_phase("DONE");
        response
    }

    async fn run_phases(
        &self,
        request: &mut OperationRequest,
        ctx: &mut RequestContext,
        headers: &RequestHeaders,
        deps: &Dependencies,
        schema_resolved: &mut bool,
    ) -> gateway_error::Result<OperationResponse> {
        ctx.set_phase("VALIDATE");
        validate_request(request, deps)?;

        ctx.set_phase("THROTTLE");
        if request.operation != Operation::Heartbeat && !self.rate_limiter.check(ctx.session_id.as_deref()) {
            return Err(GatewayError::throttled(deps.config.rate_limit_window.as_secs()));
        }

        ctx.set_phase("AUTHN");
        ctx.detect_auth(headers, deps.config.databricks_token.is_some());

        ctx.set_phase("ROUTE");
        let handler = self.registry.route(request)?;

        ctx.set_phase("WARMUP");
        if request.operation != Operation::Heartbeat {
            self.warmup.warm(&deps.pool).await;
        }

        ctx.set_phase("RESOLVE");
        if request.operation == Operation::Read && request.mode != ProcessingMode::Named && request.wants_wildcard_columns() {
            match deps.schema_provider.get_table_schema(&request.table).await {
                Ok(schema) => {
                    request.columns = Some(schema.column_names());
                    *schema_resolved = true;
                }
                Err(err) => {
                    tracing::warn!(error = %err.internal_message(), table = %request.table, "schema resolution failed, continuing without it");
                }
            }
        }

        ctx.set_phase("EXECUTE");
        let needs_admission = !matches!(request.operation, Operation::Heartbeat | Operation::Schema);
        let _permit = if needs_admission {
            match self.admission.try_acquire() {
                Some(permit) => Some(permit),
                None => return Err(GatewayError::admission_rejected()),
            }
        } else {
            None
        };
        let output = handler.handle(ctx, request, deps).await?;

        ctx.set_phase("SHAPE");
        let response = shape_output(output, request);

        ctx.set_phase("OBSERVE");
        Ok(response)
    }
}

fn shape_output(output: HandlerOutput, request: &OperationRequest) -> OperationResponse {
    match output {
        HandlerOutput::Response(mut response) => {
            if !response.success && response.errors.is_empty() {
                response.errors.push(ErrorDetail::unknown("handler reported failure with no error detail"));
            }
            response
        }
        HandlerOutput::Query(result) => match shape_result(&result, request.ui_format) {
            Ok(shaped) => {
                let mut response = OperationResponse::ok("ok");
                response.columns = result.columns.clone();
                response.schema = result.column_metadata.clone();
                response.metadata.insert("row_count".to_string(), json!(result.row_count));
                response.data = Some(match shaped {
                    ShapedResult::JsonRows(rows) => json!(rows),
                    ShapedResult::Frame(batch) | ShapedResult::ArrowTable(batch) => json!(batch.data),
                });
                response
            }
            Err(err) => OperationResponse::failure(ErrorDetail::from(&err)),
        },
    }
}
