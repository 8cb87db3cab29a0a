//! Step parameters and build variables as handed over by the job runner.

use serde::{Deserialize, Serialize};

/// Name of the parameter holding the inline script body.
pub const SCRIPT_PARAMETER: &str = "script";

/// Parameters with this prefix are exported a second time without the
/// `CDS_` namespace so scripts can read them under their own name.
pub const ENV_PARAMETER_PREFIX: &str = "cds.env.";

const KEY_PARAMETER_PREFIX: &str = "cds.key.";
const PRIVATE_KEY_SUFFIX: &str = ".priv";
const PUBLIC_KEY_SUFFIX: &str = ".pub";

/// Declared type of a step parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Text,
    Boolean,
    Number,
    List,
    /// Secret key material. Only the `.pub` half may reach the environment.
    Key,
    /// Any other runner type (`password`, `env`, `repository`, ...).
    /// Exported like a string.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            param_type: ParameterType::String,
        }
    }

    pub fn with_type(mut self, param_type: ParameterType) -> Self {
        self.param_type = param_type;
        self
    }

    /// Whether this parameter carries private key material.
    ///
    /// Matches `cds.key.*.priv` by name, and any `key`-typed parameter whose
    /// name does not denote the public half.
    pub fn is_private_key(&self) -> bool {
        if self.name.starts_with(KEY_PARAMETER_PREFIX) && self.name.ends_with(PRIVATE_KEY_SUFFIX) {
            return true;
        }
        self.param_type == ParameterType::Key && !self.name.ends_with(PUBLIC_KEY_SUFFIX)
    }
}

/// Build-scoped name/value pair exported by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// First parameter called `name`, if any.
pub fn find_parameter<'a>(params: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
    params.iter().find(|p| p.name == name)
}

/// `cds.build.my-var` -> `CDS_BUILD_MY_VAR`.
pub fn env_var_name(name: &str) -> String {
    name.replace(['.', '-'], "_").to_uppercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
