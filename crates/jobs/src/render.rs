//! Job configuration rendering.

use tracing::debug;

use crate::bundle::BundleInfo;
use crate::environment::WorkflowEnvironment;
use crate::error::JobsError;
use crate::job_config::JobConfig;
use crate::profile::{BackendKind, BackendProfile, CrabProfile, HtcondorProfile};
use crate::settings::BundleSettings;

/// Name of the bootstrap entry in `JobConfig::input_files`.
pub const BOOTSTRAP_INPUT: &str = "bootstrap";

/// Populates job configurations for one of the supported backends.
///
/// Environment values are injected at construction, so rendering never
/// reads process state.
#[derive(Debug, Clone)]
pub struct JobConfigRenderer {
    environment: WorkflowEnvironment,
    htcondor: HtcondorProfile,
    crab: CrabProfile,
}

impl JobConfigRenderer {
    /// Create a renderer from bundle settings.
    ///
    /// # Arguments
    /// * `settings` - Provides the bootstrap script and per-backend settings
    /// * `environment` - Source of passthrough values
    pub fn new(settings: &BundleSettings, environment: WorkflowEnvironment) -> Self {
        Self {
            environment,
            htcondor: HtcondorProfile::new(&settings.bootstrap_file, settings.htcondor.clone()),
            crab: CrabProfile::new(&settings.bootstrap_file, settings.crab.clone()),
        }
    }

    /// Profile used for a backend.
    pub fn profile(&self, kind: BackendKind) -> &dyn BackendProfile {
        match kind {
            BackendKind::Htcondor => &self.htcondor,
            BackendKind::Crab => &self.crab,
        }
    }

    /// Render a job configuration for a backend.
    ///
    /// Adds the backend's resource and custom directives, the bootstrap file
    /// and any backend input files, then the render variables: each bundle's
    /// `{name}_uris` (comma-joined) and `{name}_pattern` (pattern basename),
    /// plus the backend's environment passthrough values. Existing entries of
    /// `base` are kept unless a rendered entry of the same name replaces them.
    ///
    /// # Arguments
    /// * `kind` - Target backend
    /// * `base` - Configuration populated by earlier contributors
    /// * `bundles` - Distributed artifacts the jobs will fetch
    ///
    /// # Errors
    /// Returns `JobsError::MissingEnvironment` if a passthrough value is
    /// absent. Nothing is rendered in that case.
    pub fn render(
        &self,
        kind: BackendKind,
        base: JobConfig,
        bundles: &[BundleInfo],
    ) -> Result<JobConfig, JobsError> {
        let profile: &dyn BackendProfile = self.profile(kind);

        let passthrough: Vec<(&str, &str)> = profile
            .passthrough_variables()
            .iter()
            .map(|(name, var)| self.environment.require(*var).map(|value| (*name, value)))
            .collect::<Result<Vec<_>, JobsError>>()?;

        let mut config: JobConfig = base;
        config.backend = Some(kind);

        for directive in profile.resource_directives(&config.resources) {
            config.push_directive(directive);
        }
        for directive in profile.custom_directives() {
            config.push_directive(directive);
        }

        config.add_input_file(BOOTSTRAP_INPUT, profile.bootstrap_reference());
        for (name, file) in profile.input_files() {
            config.add_input_file(name, file);
        }

        for (name, value) in passthrough {
            config.set_render_variable(name, value);
        }
        for bundle in bundles {
            config.set_render_variable(bundle.uris_variable(), bundle.uris.join(","));
            config.set_render_variable(bundle.pattern_variable(), bundle.pattern_basename());
        }

        debug!(
            backend = %kind,
            directives = config.directives.len(),
            input_files = config.input_files.len(),
            render_variables = config.render_variables.len(),
            "rendered job config"
        );

        Ok(config)
    }
}
