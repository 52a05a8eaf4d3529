//! Trailer (`TX`) file generation
//!
//! The trailer file of a term holds one count record per master file and a
//! final self record describing the trailer file itself:
//!
//! ```text
//! TX860253CB00000010U86253CBDAT
//! TX860253SB00000007U86253SBDAT
//! TX860253TX00000003U86253TXDAT<contact block>
//! ```

use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::Result;
use crate::files::{count_records, write_atomic};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Record type of the trailer file
pub const TRAILER_TYPE: &str = "TX";

/// Outcome of writing a trailer file
#[derive(Debug, Clone, Serialize)]
pub struct TrailerReport {
    pub path: PathBuf,
    /// Record count per master type, excluding the self record
    pub counts: BTreeMap<String, usize>,
    pub overwritten: bool,
}

impl TrailerReport {
    /// Lines in the trailer file, self record included
    pub fn entries(&self) -> usize {
        self.counts.len() + 1
    }
}

/// Build the trailer lines for `counts`, self record last
pub fn trailer_lines(ctx: &PipelineContext, term: &str, counts: &BTreeMap<String, usize>) -> Vec<String> {
    let district = &ctx.settings.district;
    let mut lines: Vec<String> = counts
        .iter()
        .map(|(record_type, count)| {
            format!(
                "TX{}{}{}{:08}{}\n",
                district,
                term,
                record_type,
                count,
                ctx.naming.target_name(term, record_type)
            )
        })
        .collect();
    lines.sort();

    lines.push(format!(
        "TX{}{}{}{:08}{}{}\n",
        district,
        term,
        TRAILER_TYPE,
        lines.len() + 1,
        ctx.naming.target_name(term, TRAILER_TYPE),
        ctx.settings.contact_field()
    ));
    lines
}

/// Count records of every master of `term` in `dir` and rewrite its trailer file
pub fn generate_trailer(
    ctx: &PipelineContext,
    dir: &Path,
    term: &str,
    log: &mut ActivityLog,
) -> Result<TrailerReport> {
    let mut counts = BTreeMap::new();
    for (name, path) in ctx.naming.masters(dir, Some(term))? {
        if name.record_type == TRAILER_TYPE {
            continue;
        }
        let count = count_records(&std::fs::read(&path)?);
        counts.insert(name.record_type, count);
    }

    let lines = trailer_lines(ctx, term, &counts);
    let path = dir.join(ctx.naming.file_name(term, TRAILER_TYPE));
    let overwritten = path.exists();
    write_atomic(&path, lines.concat().as_bytes())?;

    log.info(format!(
        "Trailer file {} {} with {} entries",
        ctx.naming.file_name(term, TRAILER_TYPE),
        if overwritten { "overwritten" } else { "created" },
        lines.len()
    ));

    Ok(TrailerReport {
        path,
        counts,
        overwritten,
    })
}
