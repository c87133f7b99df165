//! One-call setup for an axum router

use axum::{Extension, Router};

use crate::config::Config;
use crate::pagination::PaginationDefaults;
use crate::pipeline::ExceptionPipeline;

/// Installs the scaffold conventions on a router
///
/// ```rust,no_run
/// use api_scaffold::prelude::*;
///
/// # fn run() -> api_scaffold::Result<()> {
/// let config = Config::load()?;
/// let app: Router = Scaffold::new(&config).install(Router::new());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scaffold {
    pipeline: ExceptionPipeline,
    pagination: PaginationDefaults,
}

impl Scaffold {
    pub fn new(config: &Config) -> Self {
        Self {
            pipeline: ExceptionPipeline::new(config.service.debug),
            pagination: PaginationDefaults::from(&config.pagination),
        }
    }

    /// Default settings with diagnostic mode set explicitly
    pub fn with_debug(debug: bool) -> Self {
        Self {
            pipeline: ExceptionPipeline::new(debug),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pagination(mut self, defaults: PaginationDefaults) -> Self {
        self.pagination = defaults;
        self
    }

    pub fn pipeline(&self) -> ExceptionPipeline {
        self.pipeline
    }

    pub fn pagination_defaults(&self) -> PaginationDefaults {
        self.pagination
    }

    /// Install the exception pipeline and pagination defaults
    ///
    /// Call after every route has been added.
    pub fn install<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = router.layer(Extension(self.pagination));
        self.pipeline.install(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reads_config() {
        let mut config = Config::default();
        config.service.debug = true;
        config.pagination.default_per_page = 25;
        config.pagination.max_per_page = Some(50);

        let scaffold = Scaffold::new(&config);
        assert!(scaffold.pipeline().is_diagnostic());
        assert_eq!(
            scaffold.pagination_defaults(),
            PaginationDefaults {
                per_page: 25,
                max_per_page: Some(50),
            }
        );
    }

    #[test]
    fn test_zero_default_per_page_is_clamped() {
        let mut config = Config::default();
        config.pagination.default_per_page = 0;
        assert_eq!(Scaffold::new(&config).pagination_defaults().per_page, 1);
    }

    #[test]
    fn test_with_debug() {
        assert!(Scaffold::with_debug(true).pipeline().is_diagnostic());
        assert!(!Scaffold::with_debug(false).pipeline().is_diagnostic());
        assert_eq!(
            Scaffold::with_debug(false).pagination_defaults(),
            PaginationDefaults::default()
        );
    }
}
