//! Job file describing the script step handed to this worker.
//!
//! ```json
//! {
//!   "parameters": [{ "name": "script", "value": "echo hi", "type": "text" }],
//!   "build_variables": [{ "name": "cds.build.id", "value": "42" }]
//! }
//! ```

use std::path::{Path, PathBuf};

use scriptstep_core::parameter::{Parameter, Variable};
use scriptstep_core::scripting::environment::WorkerVars;
use scriptstep_core::StepRequest;
use serde::Deserialize;

use crate::config::WorkerConfig;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("cannot read job file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid job file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub build_variables: Vec<Variable>,
}

impl JobFile {
    pub async fn load(path: &Path) -> Result<Self, JobError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| JobError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| JobError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Combine the job with the worker's own settings into a step request.
    pub fn into_request(self, config: &WorkerConfig) -> StepRequest {
        let mut request = StepRequest::new(self.parameters, config.basedir.clone());
        request.working_dir = config.working_dir.clone();
        request.worker = WorkerVars {
            export_port: config.export_port,
            legacy_key: config.legacy_key.clone(),
            build_variables: self.build_variables,
        };
        request
    }
}
