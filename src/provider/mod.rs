//! Built-in providers and their registration with the evaluation context

pub mod file;

pub use file::FileProvider;

use anyhow::Result;
use evalctx::{BuiltinEvalContext, GraphState};
use reconcile::ProviderHandle;
use std::path::PathBuf;
use std::sync::Arc;

use crate::paths;
use crate::schema::{AttuneConfig, ProviderConfig, ProviderKind};

/// Build an evaluation context with one factory per declared provider.
///
/// Providers are only constructed when the walker initializes them.
pub fn build_context(config: &AttuneConfig) -> Result<BuiltinEvalContext> {
    let state = Arc::new(GraphState::new(config.variables.clone()));
    let mut ctx = BuiltinEvalContext::new(state);

    for (name, provider) in &config.providers {
        match provider.kind {
            ProviderKind::File => {
                let path = document_path(name, provider)?;
                log::debug!("Registered file provider '{}' at {}", name, path.display());
                ctx = ctx.with_factory(name.clone(), move |name: &str| {
                    Ok(Arc::new(FileProvider::new(name, path.clone())) as ProviderHandle)
                });
            }
        }
    }

    Ok(ctx)
}

fn document_path(name: &str, provider: &ProviderConfig) -> Result<PathBuf> {
    match &provider.path {
        Some(path) => Ok(paths::expand(path)),
        None => paths::remote_file(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalctx::{EvalContext, Error};

    #[test]
    fn test_build_context_registers_declared_providers() {
        let dir = tempfile::tempdir().unwrap();
        let config = AttuneConfig::parse(&format!(
            r#"
[providers.local]
kind = "file"
path = '{}'
"#,
            dir.path().join("local.json").display()
        ))
        .unwrap();

        let ctx = build_context(&config).unwrap();
        let provider = ctx.init_provider("local").unwrap();
        assert_eq!(provider.name(), "local");
        assert!(matches!(
            ctx.init_provider("local"),
            Err(Error::AlreadyInitialized { .. })
        ));
        assert!(matches!(
            ctx.init_provider("aws"),
            Err(Error::UnknownProvider { .. })
        ));
    }
}
