//! Migration templates.
//!
//! A template is plain text with four placeholders: `<version>`, `<up>`,
//! `<down>` and `<custom>`. See [`render`](crate::render::render).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DiffgenError, Result};

/// The built-in template.
pub const DEFAULT_TEMPLATE: &str = r#"//! Migration <version>.

use oxide_diffgen::migration::{SchemaTarget, VersionedMigration};

/// Auto-generated migration.
pub struct Version<version>;

impl VersionedMigration for Version<version> {
    const VERSION: &'static str = "<version>";

    fn up(target: &mut dyn SchemaTarget) {
<up>
    }

    fn down(target: &mut dyn SchemaTarget) {
<down>
    }
}

impl Version<version> {
<custom>
}
"#;

/// Where template text comes from.
pub trait TemplateSource {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns the template text.
    fn load(&self) -> Result<String>;
}

/// The built-in template.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplate;

impl TemplateSource for DefaultTemplate {
    fn name(&self) -> &str {
        "default"
    }

    fn load(&self) -> Result<String> {
        Ok(DEFAULT_TEMPLATE.to_string())
    }
}

/// A template stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTemplate {
    name: String,
    path: PathBuf,
}

impl FileTemplate {
    /// Resolves a template name against a base directory.
    ///
    /// Absolute names are used as they are; relative names are joined to
    /// `base_dir`. Fails with [`DiffgenError::TemplateNotFound`] if the
    /// resolved path is not a file.
    pub fn resolve(name: &str, base_dir: &Path) -> Result<Self> {
        let candidate = Path::new(name);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            base_dir.join(candidate)
        };

        if !path.is_file() {
            return Err(DiffgenError::TemplateNotFound {
                name: name.to_string(),
                path,
            });
        }

        debug!(template = %name, path = %path.display(), "resolved template");
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Resolved location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateSource for FileTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => DiffgenError::TemplateNotFound {
                name: self.name.clone(),
                path: self.path.clone(),
            },
            _ => DiffgenError::Io(err),
        })
    }
}
