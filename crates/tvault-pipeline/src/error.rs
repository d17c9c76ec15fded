use tvault_core::types::Stage;
use tvault_core::{ValidationError, VaultError};

/// A pipeline failure tagged with the stage it happened in.
///
/// `stage` is `None` when the request was rejected pre-flight, before any key
/// material existed.
#[derive(Debug, thiserror::Error)]
#[error("{} failed: {source}", stage_label(.stage))]
pub struct PipelineError {
    pub stage: Option<Stage>,
    #[source]
    pub source: VaultError,
}

fn stage_label(stage: &Option<Stage>) -> &'static str {
    match stage {
        Some(stage) => stage.as_str(),
        None => "pre-flight validation",
    }
}

impl PipelineError {
    pub fn at(stage: Stage, source: VaultError) -> Self {
        Self {
            stage: Some(stage),
            source,
        }
    }

    pub fn preflight(source: impl Into<VaultError>) -> Self {
        Self {
            stage: None,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &VaultError {
        &self.source
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match &self.source {
            VaultError::Validation(v) => Some(v),
            _ => None,
        }
    }
}

/// `.map_err(at(Stage::Hashing))`
pub(crate) fn at(stage: Stage) -> impl Fn(VaultError) -> PipelineError {
    move |source| PipelineError::at(stage, source)
}

pub(crate) fn join_failed(err: tokio::task::JoinError) -> VaultError {
    VaultError::Other(anyhow::anyhow!("crypto worker did not complete: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_stage() {
        let err = PipelineError::at(Stage::KeyWrapping, VaultError::PlatformUnavailable("no rng".into()));
        assert_eq!(
            err.to_string(),
            "key_wrapping failed: platform unavailable: no rng"
        );
    }

    #[test]
    fn test_preflight_has_no_stage() {
        let err = PipelineError::preflight(ValidationError::MissingMedia);
        assert!(err.stage.is_none());
        assert!(matches!(err.validation(), Some(ValidationError::MissingMedia)));
        assert!(err.to_string().starts_with("pre-flight validation failed"));
    }
}
