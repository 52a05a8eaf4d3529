//! Merge, assembly and trailer stages over a full instance tree

mod common;

use common::{init_tracing, records, TestInstance};
use mis_pipeline::activity::ActivityLog;
use mis_pipeline::files::split_lines;
use mis_pipeline::master::latest_extracts;
use mis_pipeline::merge::{assemble, merge, merge_term, normalize_records, TermFilter};
use mis_pipeline::trailer::generate_trailer;
use mis_pipeline::{ArtifactKey, PipelineError, Selection};
use std::collections::BTreeMap;

fn select(instance: &TestInstance, term: &str) -> Selection {
    let (mut log, _) = ActivityLog::in_memory("select");
    latest_extracts(
        &instance.ctx.workspace.shared_export(),
        term,
        &instance.ctx.registry,
        &mut log,
    )
    .expect("Selection failed")
}

fn prefixes_of(content: &[u8]) -> Vec<String> {
    split_lines(content)
        .iter()
        .map(|line| String::from_utf8_lossy(&line[..8.min(line.len())]).to_string())
        .collect()
}

// ============================================================================
// Record merge
// ============================================================================

#[test]
fn test_new_campus_lands_between_neighbours_with_trailer_last() {
    let cb861 = ArtifactKey::new("CB", "861", "253");
    let cb862 = ArtifactKey::new("CB", "862", "253");
    let cb863 = ArtifactKey::new("CB", "863", "253");

    let mut master = records(&cb861, 1, 220, "m");
    master.push_str(&records(&cb863, 2, 220, "m"));
    master.push_str("TX860253CB00000003U86253CBDAT\n");

    let outcome = merge(
        split_lines(master.as_bytes()),
        &[cb862.prefix()],
        normalize_records(records(&cb862, 2, 220, "n").as_bytes()),
    );

    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.inserted, 2);
    assert_eq!(
        prefixes_of(&outcome.lines.concat()),
        vec!["CB861253", "CB862253", "CB862253", "CB863253", "CB863253", "TX860253"]
    );
    assert_eq!(outcome.lines[0].len(), 221);
}

#[test]
fn test_merge_term_end_to_end() {
    init_tracing();
    let instance = TestInstance::new();
    let cb861 = ArtifactKey::new("CB", "861", "253");
    let cb862 = ArtifactKey::new("CB", "862", "253");
    let cb863 = ArtifactKey::new("CB", "863", "253");

    let mut master = records(&cb861, 2, 220, "old");
    master.push_str(&records(&cb862, 4, 220, "old"));
    master.push_str(&records(&cb863, 1, 220, "old"));
    instance.input_master("253", "CB", &master);
    instance.input_master("253", "SB", "SB861253 a\nSB862253 b\n");
    instance.input_master("243", "SB", "SB861243 a\n");

    instance.extract(&cb862, 1, 2);
    instance.extract(&cb862, 2, 3);

    let (mut log, sink) = ActivityLog::in_memory("merge");
    let report = merge_term(
        &instance.ctx,
        "253",
        &select(&instance, "253"),
        &TermFilter::default(),
        &mut log,
    )
    .expect("Merge failed");

    assert_eq!(report.files.len(), 1);
    let group = &report.files[0].groups[0];
    assert_eq!((group.campus.as_str(), group.removed, group.inserted), ("862", 4, 3));
    assert_eq!(report.copied, vec!["U86253SB.dat".to_string()]);
    assert!(sink.contains("Updated 862 records from CB_862_253_02.txt (3 records)"));

    let final_dat = instance.ctx.workspace.final_dat();
    let merged = std::fs::read_to_string(final_dat.join("U86253CB.dat")).unwrap();
    assert_eq!(merged.lines().count(), 6);
    assert!(merged.lines().nth(2).unwrap().starts_with("CB862253v2"));
    assert!(merged.lines().nth(5).unwrap().starts_with("CB863253old"));

    // Other terms never leak into this term's output
    assert!(!final_dat.join("U86243SB.dat").exists());

    assert_eq!(
        report.trailer.counts,
        BTreeMap::from([("CB".to_string(), 6), ("SB".to_string(), 2)])
    );
    let trailer = std::fs::read_to_string(final_dat.join("U86253TX.dat")).unwrap();
    assert!(trailer.lines().last().unwrap().starts_with("TX860253TX00000003U86253TXDATOPERATOR"));
}

#[test]
fn test_merge_is_idempotent() {
    let instance = TestInstance::new();
    let cb861 = ArtifactKey::new("CB", "861", "253");
    let cb862 = ArtifactKey::new("CB", "862", "253");
    instance.input_master("253", "CB", &records(&cb861, 3, 220, "old"));
    instance.extract(&cb862, 1, 2);
    let selection = select(&instance, "253");

    let (mut log, _) = ActivityLog::in_memory("merge");
    merge_term(&instance.ctx, "253", &selection, &TermFilter::default(), &mut log).unwrap();
    let first = std::fs::read(instance.ctx.workspace.final_dat().join("U86253CB.dat")).unwrap();

    instance.input_master("253", "CB", std::str::from_utf8(&first).unwrap());
    merge_term(&instance.ctx, "253", &selection, &TermFilter::default(), &mut log).unwrap();
    let second = std::fs::read(instance.ctx.workspace.final_dat().join("U86253CB.dat")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_filter_limits_campuses() {
    let instance = TestInstance::new();
    let cb861 = ArtifactKey::new("CB", "861", "253");
    let cb862 = ArtifactKey::new("CB", "862", "253");
    let mut master = records(&cb861, 1, 220, "old");
    master.push_str(&records(&cb862, 1, 220, "old"));
    instance.input_master("253", "CB", &master);
    instance.extract(&cb861, 1, 2);
    instance.extract(&cb862, 1, 2);

    let filter = TermFilter {
        campuses: vec!["862".to_string()],
        types: Vec::new(),
    };
    let (mut log, _) = ActivityLog::in_memory("merge");
    let report = merge_term(&instance.ctx, "253", &select(&instance, "253"), &filter, &mut log).unwrap();

    assert_eq!(report.files[0].groups.len(), 1);
    let merged = std::fs::read_to_string(instance.ctx.workspace.final_dat().join("U86253CB.dat")).unwrap();
    assert!(merged.starts_with("CB861253old"));
    assert_eq!(merged.lines().count(), 3);
}

#[test]
fn test_merge_without_base_master_fails() {
    let instance = TestInstance::new();
    instance.extract(&ArtifactKey::new("CB", "861", "253"), 1, 2);

    let (mut log, _) = ActivityLog::in_memory("merge");
    let err = merge_term(
        &instance.ctx,
        "253",
        &select(&instance, "253"),
        &TermFilter::default(),
        &mut log,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::MissingBaseFile(ref path) if path.ends_with("U86253CB.dat")));
    assert!(!instance.ctx.workspace.final_dat().join("U86253CB.dat").exists());
}

// ============================================================================
// Assembly and trailer
// ============================================================================

#[test]
fn test_assemble_concatenates_campuses() {
    let instance = TestInstance::new();
    let cb861 = ArtifactKey::new("CB", "861", "253");
    let cb862 = ArtifactKey::new("CB", "862", "253");
    instance.extract(&cb861, 1, 2);
    instance.extract(&cb862, 3, 1);

    let (mut log, _) = ActivityLog::in_memory("assemble");
    let report = assemble(&instance.ctx, "253", &select(&instance, "253"), &mut log).unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].sources, vec!["CB_861_253_01.txt", "CB_862_253_03.txt"]);
    assert!(!report.files[0].overwritten);

    let content = std::fs::read_to_string(instance.ctx.workspace.final_dat().join("U86253CB.dat")).unwrap();
    let expected = format!(
        "{}\r\n{}\r\n",
        records(&cb861, 2, 220, "v1").trim_end_matches('\n'),
        records(&cb862, 1, 220, "v3").trim_end_matches('\n')
    );
    assert_eq!(content, expected);
    assert_eq!(report.trailer.counts.get("CB"), Some(&3));
}

#[test]
fn test_trailer_counts_two_types() {
    let instance = TestInstance::new();
    let final_dat = instance.ctx.workspace.final_dat();
    std::fs::write(
        final_dat.join("U86253CB.dat"),
        records(&ArtifactKey::new("CB", "861", "253"), 10, 220, "t"),
    )
    .unwrap();
    std::fs::write(
        final_dat.join("U86253SB.dat"),
        records(&ArtifactKey::new("SB", "861", "253"), 7, 100, "t"),
    )
    .unwrap();

    let (mut log, _) = ActivityLog::in_memory("trailer");
    let report = generate_trailer(&instance.ctx, &final_dat, "253", &mut log).unwrap();
    assert_eq!(report.entries(), 3);

    let trailer = std::fs::read_to_string(&report.path).unwrap();
    let lines: Vec<&str> = trailer.lines().collect();
    assert_eq!(lines[0], "TX860253CB00000010U86253CBDAT");
    assert_eq!(lines[1], "TX860253SB00000007U86253SBDAT");
    assert!(lines[2].starts_with("TX860253TX00000003U86253TXDAT"));
}
