//! Parameter binding and action invocation.

use std::sync::Arc;

use mailroom_core::boundary::ActionExecutor;
use mailroom_core::error::MailroomError;
use mailroom_core::types::{ActionResult, BoundParams, MessageMeta};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::extractor::EntityMap;
use crate::rules::{ActionDescriptor, SourcePath};

/// Binds entity values onto an action's parameters and executes it.
pub struct Dispatcher {
    executor: Arc<dyn ActionExecutor>,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }

    /// Resolve every parameter of `descriptor`.
    ///
    /// Optional parameters whose source is missing bind to `None`. A missing
    /// required source fails with [`PipelineError::Binding`]. Values are
    /// never coerced to empty strings.
    pub fn bind_params(
        descriptor: &ActionDescriptor,
        entities: &EntityMap,
        meta: MessageMeta<'_>,
    ) -> Result<BoundParams, PipelineError> {
        let mut bound = BoundParams::new();

        for (param, binding) in &descriptor.params_map {
            let value = match &binding.source {
                SourcePath::Entity(key) => entities.get(key).cloned(),
                SourcePath::Meta(field) => match meta.field(field) {
                    Some(v) => Some(v.to_string()),
                    None => {
                        return Err(PipelineError::Configuration(format!(
                            "Action '{}' parameter '{}' references unknown metadata field '{}'",
                            descriptor.name, param, field
                        )))
                    }
                },
            };

            match value {
                Some(v) => {
                    bound.insert(param.clone(), Some(v));
                }
                None if binding.required => {
                    return Err(PipelineError::Binding {
                        param: param.clone(),
                        source_path: binding.source.to_string(),
                    });
                }
                None => {
                    debug!(param = %param, source = %binding.source, "Optional parameter bound to NULL");
                    bound.insert(param.clone(), None);
                }
            }
        }

        Ok(bound)
    }

    /// Bind parameters and call the action-execution boundary once.
    pub async fn dispatch(
        &self,
        descriptor: &ActionDescriptor,
        entities: &EntityMap,
        meta: MessageMeta<'_>,
    ) -> Result<ActionResult, PipelineError> {
        let params = Self::bind_params(descriptor, entities, meta)?;

        debug!(action = %descriptor.name, params = params.len(), "Dispatching action");

        let result = self
            .executor
            .execute(&descriptor.name, &params)
            .await
            .map_err(|cause| PipelineError::Execution {
                action: descriptor.name.clone(),
                cause,
            })?;

        if !result.success {
            warn!(action = %descriptor.name, message = %result.message, "Action reported failure");
            return Err(PipelineError::Execution {
                action: descriptor.name.clone(),
                cause: MailroomError::Execution(result.message),
            });
        }

        Ok(result)
    }
}
