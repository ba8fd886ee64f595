//! Manifest template rendering.
//!
//! Rendering is a pure function of (template text, substitution mapping)
//! with strict placeholder resolution: any placeholder without a mapping
//! entry aborts that template. Substitution is all-or-nothing; there is no
//! partial output.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use handlebars::Handlebars;
use std::collections::BTreeMap;

use crate::error::DeployError;

/// Base64-encode a config value for Secret `data` fields.
pub fn base64_value(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Decode a Secret `data` field back to its plain value.
pub fn base64_decode(encoded: &str) -> Result<String, DeployError> {
    let bytes = STANDARD.decode(encoded).map_err(|e| DeployError::Config {
        message: format!("invalid base64: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| DeployError::Config {
        message: format!("decoded value is not UTF-8: {}", e),
    })
}

/// Render one template against the substitution mapping. `name` is used
/// only for diagnostics.
pub fn render(
    name: &str,
    template: &str,
    values: &BTreeMap<String, String>,
) -> Result<String, DeployError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars
        .render_template(template, values)
        .map_err(|e| DeployError::Render {
            template: name.to_string(),
            message: e.to_string(),
        })
}
