//! Exception handling for the VM: raise, catch and unwind.

use std::rc::Rc;

use tracing::debug;

use crate::error::RuntimeError;
use crate::object::{ExceptionObject, Value};
use crate::span::Span;

use super::vm::Vm;

impl Vm {
    /// `RAISE`: remember the thrown value and describe it as an error.
    pub(crate) fn raise(&mut self, value: Value, span: Span) -> RuntimeError {
        let (kind, message) = match &value {
            Value::Exception(exception) => (exception.kind.clone(), exception.message.clone()),
            Value::Str(message) => ("Exception".to_string(), message.to_string()),
            other => (other.type_name(), other.to_string()),
        };
        self.raised = Some(value);
        RuntimeError::Uncaught {
            kind,
            message,
            span,
        }
    }

    /// Route `error` to the innermost handler installed above `base_depth`.
    ///
    /// With no such handler the frames above `base_depth` are discarded and
    /// the error is handed back, keeping the thrown value for outer handlers.
    pub(crate) fn recover(
        &mut self,
        error: RuntimeError,
        base_depth: usize,
    ) -> Result<(), RuntimeError> {
        let exception = self
            .raised
            .take()
            .unwrap_or_else(|| Value::Exception(Rc::new(ExceptionObject::from_error(&error))));

        let handler = match self.handlers.last() {
            Some(handler) if handler.frame_depth > base_depth => *handler,
            _ => {
                self.frames.truncate(base_depth);
                self.handlers.retain(|handler| handler.frame_depth <= base_depth);
                self.raised = Some(exception);
                return Err(error);
            }
        };

        debug!(error = %error, depth = handler.frame_depth, "exception caught");
        self.handlers.pop();
        self.frames.truncate(handler.frame_depth);
        self.stack.truncate(handler.stack_len);
        let frame = self.frame_mut();
        frame.exception = exception;
        frame.ip = handler.target;
        Ok(())
    }
}
