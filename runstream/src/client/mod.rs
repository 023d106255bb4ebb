//! Control-plane access.
//!
//! The orchestrator only needs three shapes of request against the service:
//! a JSON `GET`, a JSON `POST`, and a `GET` whose body is kept open and
//! consumed as a byte stream (status watch and log follow). [`ControlPlane`]
//! captures exactly those; [`HttpControlPlane`] is the production
//! implementation and tests substitute scripted mocks.
//!
//! A handful of typed helpers for the paths the orchestrator uses live here
//! too, so callers never build `v1/...` strings by hand.

mod error;
mod http;

pub use error::ApiError;
pub use http::{ByteStream, ControlPlane, HttpControlPlane};

use crate::model::{BufferAccess, Codespec, Run};

/// `GET v1/runs/{id}`.
pub async fn get_run<C: ControlPlane>(client: &C, run_id: i64) -> Result<Run, ApiError> {
    client.get_json(&format!("v1/runs/{}", run_id)).await
}

/// `POST v1/runs`, returning the committed run.
pub async fn create_run<C: ControlPlane>(client: &C, run: &Run) -> Result<Run, ApiError> {
    let body = serde_json::to_value(run).map_err(|e| ApiError::Decode(e.to_string()))?;
    client.post_json("v1/runs", Some(body)).await
}

/// `GET v1/codespecs/{name}` where `name` may include `/versions/N`.
pub async fn get_codespec<C: ControlPlane>(client: &C, name: &str) -> Result<Codespec, ApiError> {
    client.get_json(&format!("v1/codespecs/{}", name)).await
}

/// `POST v1/buffers/{id}/access_uri?writeable=...`, returning the capability URI.
pub async fn get_buffer_access_uri<C: ControlPlane>(
    client: &C,
    buffer_id: &str,
    writeable: bool,
) -> Result<String, ApiError> {
    let access: BufferAccess = client
        .post_json(
            &format!("v1/buffers/{}/access_uri?writeable={}", buffer_id, writeable),
            None,
        )
        .await?;
    Ok(access.uri)
}
