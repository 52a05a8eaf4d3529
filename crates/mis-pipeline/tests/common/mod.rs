//! Shared fixtures for pipeline integration tests
//!
//! Every test gets its own instance directory under a `TempDir`, with the
//! full working layout created and default district settings.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use mis_pipeline::{ArtifactKey, PipelineContext, PipelineSettings};
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestInstance {
    pub dir: TempDir,
    pub ctx: PipelineContext,
}

impl TestInstance {
    pub fn new() -> Self {
        Self::with_settings(PipelineSettings {
            contact_block: "OPERATOR        TEST      5555550100".to_string(),
            ..Default::default()
        })
    }

    pub fn with_settings(settings: PipelineSettings) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let ctx = PipelineContext::new(dir.path(), settings).expect("Invalid settings");
        ctx.workspace.ensure_layout().expect("Failed to create layout");
        Self { dir, ctx }
    }

    /// Write `lines` records of `key` as a versioned extract
    pub fn extract(&self, key: &ArtifactKey, version: u32, lines: usize) -> PathBuf {
        let dir = self.ctx.workspace.shared_export().join(&key.campus);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}_{:02}.txt", key, version));
        std::fs::write(&path, records(key, lines, 220, &format!("v{}", version))).unwrap();
        path
    }

    /// Write a master file into `input_dat/`
    pub fn input_master(&self, term: &str, record_type: &str, content: &str) -> PathBuf {
        let path = self
            .ctx
            .workspace
            .input_dat()
            .join(self.ctx.naming.file_name(term, record_type));
        std::fs::write(&path, content).unwrap();
        path
    }
}

/// `count` fixed-width records of `key`, each `width` bytes plus `\n`
pub fn records(key: &ArtifactKey, count: usize, width: usize, tag: &str) -> String {
    (0..count)
        .map(|i| {
            let body = format!("{}{}{:06}", key.prefix(), tag, i);
            format!("{:<width$}\n", body, width = width)
        })
        .collect()
}

/// Tracing output routed through the test harness
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}
