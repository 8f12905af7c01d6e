//! End-to-end tests: register roots, index, search in every keyword mode

mod common;

use std::fs;
use std::time::Duration;

use docseek_core::index::IndexStats;
use docseek_core::{
    find_workspace_root, CancelFlag, Config, DsError, Dispatcher, Indexer, Location, SearchMode,
    SearchRequest,
};

fn index_all(ws: &common::TestWorkspace, rebuild: bool) -> IndexStats {
    let mut db = ws.db();
    let config = Config::load(ws.path()).unwrap();
    let roots = db.select_roots(&[]).unwrap();
    let mut indexer = Indexer::new(&mut db, &config);
    if rebuild {
        indexer.rebuild(&roots).unwrap()
    } else {
        indexer.update(&roots).unwrap()
    }
}

fn search(ws: &common::TestWorkspace, request: SearchRequest) -> Vec<docseek_core::SearchHit> {
    let db = ws.db();
    let config = Config::load(ws.path()).unwrap();
    Dispatcher::new(ws.path(), &db, &config)
        .search(&request)
        .unwrap()
}

#[test]
fn test_workspace_is_found_from_subdirectory() {
    let ws = common::workspace();
    let found = find_workspace_root(&ws.reports.join("2024")).unwrap();
    assert_eq!(found, ws.path().canonicalize().unwrap());
}

#[test]
fn test_rebuild_indexes_every_document() {
    let ws = common::workspace();
    let stats = index_all(&ws, true);

    assert_eq!(stats.files_added, 5);
    assert_eq!(stats.files_failed, 0);

    let db = ws.db();
    let mut types = db.counts_by_type().unwrap();
    types.sort();
    assert_eq!(
        types,
        vec![
            ("DOCX".to_string(), 1),
            ("MD".to_string(), 1),
            ("TXT".to_string(), 2),
            ("XLSX".to_string(), 1),
        ]
    );
}

#[test]
fn test_index_search_across_formats() {
    let ws = common::workspace();
    index_all(&ws, true);

    let hits = search(&ws, SearchRequest::new("budget", SearchMode::Index));
    let mut files: Vec<String> = hits
        .iter()
        .map(|h| h.path.rsplit('/').next().unwrap().to_string())
        .collect();
    files.sort();
    assert_eq!(files, vec!["minutes.docx", "old.txt", "plan.md", "summary.txt"]);
    assert!(hits.iter().all(|h| matches!(h.location, Location::Indexed { .. })));

    let berlin = search(&ws, SearchRequest::new("berlin", SearchMode::Index));
    assert_eq!(berlin.len(), 1);
    assert_eq!(berlin[0].file_type, "XLSX");
    assert!(berlin[0].content.contains("[Berlin]"));
}

#[test]
fn test_index_search_single_root() {
    let ws = common::workspace();
    index_all(&ws, true);
    let archive = ws.roots()[1].clone();

    let request = SearchRequest {
        roots: vec![ws.archive.to_string_lossy().to_string()],
        ..SearchRequest::new("budget", SearchMode::Index)
    };
    let hits = search(&ws, request);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].location, Location::Indexed { root: archive });
}

#[test]
fn test_live_search_locations() {
    let ws = common::workspace();

    let hits = search(&ws, SearchRequest::new("budget", SearchMode::Live));
    let locations: Vec<(String, String)> = hits
        .iter()
        .map(|h| {
            (
                h.path.rsplit('/').next().unwrap().to_string(),
                h.location.to_string(),
            )
        })
        .collect();

    assert!(locations.contains(&("summary.txt".to_string(), "Line 3".to_string())));
    assert!(locations.contains(&("plan.md".to_string(), "Line 4".to_string())));
    assert!(locations.contains(&("minutes.docx".to_string(), "Paragraph 2".to_string())));
    assert!(locations.contains(&("old.txt".to_string(), "Line 1".to_string())));
    assert_eq!(hits.len(), 4);

    let cells = search(&ws, SearchRequest::new("berlin", SearchMode::Live));
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].location.to_string(), "Sheet Travel, Row 2, Column A");
    assert_eq!(cells[0].content, "Berlin");
}

#[test]
fn test_update_picks_up_changes() {
    let ws = common::workspace();
    index_all(&ws, false);

    // Make sure the new mtime is strictly greater than the indexed one.
    std::thread::sleep(Duration::from_millis(20));
    fs::write(ws.reports.join("summary.txt"), "Rewritten: forecast only\n").unwrap();
    fs::remove_file(ws.archive.join("old.txt")).unwrap();
    fs::write(ws.archive.join("new.md"), "forecast for 2025\n").unwrap();

    let stats = index_all(&ws, false);
    assert_eq!(stats.files_updated, 1);
    assert_eq!(stats.files_added, 1);
    assert_eq!(stats.files_removed, 1);
    assert_eq!(stats.files_unchanged, 3);

    let hits = search(&ws, SearchRequest::new("forecast", SearchMode::Index));
    assert_eq!(hits.len(), 2);
    let budget = search(&ws, SearchRequest::new("budget", SearchMode::Index));
    assert_eq!(budget.len(), 2);
}

#[test]
fn test_removing_a_root_drops_its_rows() {
    let ws = common::workspace();
    index_all(&ws, true);

    let mut db = ws.db();
    let archive = ws.roots()[1].clone();
    assert!(db.remove_root(&archive).unwrap());
    assert_eq!(db.indexed_file_count().unwrap(), 4);
    assert_eq!(ws.roots().len(), 1);

    let request = SearchRequest {
        roots: vec![archive],
        ..SearchRequest::new("budget", SearchMode::Index)
    };
    let config = Config::load(ws.path()).unwrap();
    let result = Dispatcher::new(ws.path(), &db, &config).search(&request);
    assert!(matches!(result, Err(DsError::RootNotFound(_))));
}

#[test]
fn test_only_one_indexing_run_at_a_time() {
    let ws = common::workspace();
    let db = ws.db();
    let _guard = docseek_core::OperationGuard::acquire(db.key(), "rebuild").unwrap();

    let mut other = ws.db();
    let config = Config::default();
    let roots = other.select_roots(&[]).unwrap();
    let result = Indexer::new(&mut other, &config).update(&roots);
    assert!(matches!(result, Err(DsError::Busy(name)) if name == "rebuild"));
}

#[test]
fn test_cancelled_rebuild_reports_cancellation() {
    let ws = common::workspace();
    let mut db = ws.db();
    let config = Config::default();
    let roots = db.select_roots(&[]).unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let stats = Indexer::new(&mut db, &config)
        .with_cancel(cancel)
        .rebuild(&roots)
        .unwrap();
    assert!(stats.cancelled);
    assert_eq!(db.indexed_file_count().unwrap(), 0);
}
