//! Everything a stage needs to know about its instance

use crate::error::Result;
use crate::layout::LayoutRegistry;
use crate::master::MasterNaming;
use crate::settings::PipelineSettings;
use crate::workspace::Workspace;
use std::path::PathBuf;

/// Validated settings, layouts and directory layout of one instance
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub workspace: Workspace,
    pub settings: PipelineSettings,
    pub registry: LayoutRegistry,
    pub naming: MasterNaming,
}

impl PipelineContext {
    /// Validate settings and load the layout registry
    pub fn new(root: impl Into<PathBuf>, settings: PipelineSettings) -> Result<Self> {
        settings.validate()?;
        let registry = LayoutRegistry::builtin()?;
        let naming = MasterNaming::from_settings(&settings)?;
        Ok(Self {
            workspace: Workspace::new(root),
            settings,
            registry,
            naming,
        })
    }
}
