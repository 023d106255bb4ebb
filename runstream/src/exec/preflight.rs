//! Checks made before a run is submitted.

use tracing::debug;

use super::error::ExecError;
use crate::client::{get_codespec, ControlPlane};
use crate::model::{BufferParameters, Codespec, CodespecRef, Run};

/// Buffer parameters the orchestrator streams through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferBindings {
    /// Parameter fed from stdin.
    pub input: Option<String>,
    /// Parameter copied to stdout.
    pub output: Option<String>,
}

/// Pick the single input and output parameter, if any.
pub fn bind_buffers(params: Option<&BufferParameters>) -> Result<BufferBindings, ExecError> {
    let Some(params) = params else {
        return Ok(BufferBindings::default());
    };

    let input = match params.inputs.as_slice() {
        [] => None,
        [one] => Some(one.clone()),
        _ => return Err(ExecError::MultipleInputBuffers),
    };
    let output = match params.outputs.as_slice() {
        [] => None,
        [one] => Some(one.clone()),
        _ => return Err(ExecError::MultipleOutputBuffers),
    };
    Ok(BufferBindings { input, output })
}

/// Resolve the job codespec of `run` and bind its buffers.
pub async fn preflight<C: ControlPlane>(client: &C, run: &Run) -> Result<BufferBindings, ExecError> {
    let codespec: Codespec = match run.job.codespec {
        Some(CodespecRef::Inline(ref inline)) => inline.as_ref().clone(),
        Some(CodespecRef::Named(ref name)) => {
            debug!(codespec = %name, "Resolving codespec");
            get_codespec(client, name).await?
        }
        None => return Err(ExecError::MissingCodespec),
    };

    bind_buffers(codespec.buffers.as_ref())
}
