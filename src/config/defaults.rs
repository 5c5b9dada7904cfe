//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

/// Environment used when neither `--env` nor `SHEAF_ENV` is given.
pub const ENV: &str = "development";

/// Output directory when neither the build nor `_site.yml` names one.
pub const DEST: &str = "build";

/// Layout applied to pages that do not declare one.
pub const LAYOUT: &str = "layout";
