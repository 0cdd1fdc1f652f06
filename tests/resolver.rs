use code_anchor::error::AnchorError;
use code_anchor::git::test_utils::TmpRepo;
use code_anchor::graph::{GraphQueryer, GraphRow};
use code_anchor::resolution::{FileResolver, MatchMethod};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// In-memory stand-in for the graph store: a set of indexed file paths.
struct MockGraph {
    paths: HashSet<String>,
}

impl MockGraph {
    fn with_paths(paths: &[&str]) -> Arc<Self> {
        Arc::new(MockGraph {
            paths: paths.iter().map(|p| p.to_string()).collect(),
        })
    }
}

impl GraphQueryer for MockGraph {
    fn execute_query(
        &self,
        query: &str,
        params: &HashMap<String, Value>,
    ) -> Result<Vec<GraphRow>, AnchorError> {
        if query.contains("$path ") || query.contains("= $path") {
            let path = params["path"].as_str().unwrap_or_default();
            if self.paths.contains(path) {
                return Ok(vec![GraphRow::File { path: path.to_string() }]);
            }
            return Ok(Vec::new());
        }

        let candidates = params["paths"].as_array().cloned().unwrap_or_default();
        Ok(candidates
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|p| self.paths.contains(*p))
            .map(|p| GraphRow::File { path: p.to_string() })
            .collect())
    }
}

/// Graph stand-in that stalls on any query mentioning a marker path.
struct StallingGraph {
    inner: Arc<MockGraph>,
    stall_on: String,
    delay: Duration,
}

impl GraphQueryer for StallingGraph {
    fn execute_query(
        &self,
        query: &str,
        params: &HashMap<String, Value>,
    ) -> Result<Vec<GraphRow>, AnchorError> {
        let rendered = serde_json::to_string(params).unwrap_or_default();
        if rendered.contains(&self.stall_on) {
            std::thread::sleep(self.delay);
        }
        self.inner.execute_query(query, params)
    }
}

/// Graph stand-in that fails queries matching a marker, serving the rest.
struct FlakyGraph {
    inner: Arc<MockGraph>,
    fail_on: &'static str,
}

impl GraphQueryer for FlakyGraph {
    fn execute_query(
        &self,
        query: &str,
        params: &HashMap<String, Value>,
    ) -> Result<Vec<GraphRow>, AnchorError> {
        // An empty marker fails every query.
        if query.contains(self.fail_on) {
            return Err(AnchorError::GraphError("graph offline".to_string()));
        }
        self.inner.execute_query(query, params)
    }
}

#[test]
fn exact_hit_has_full_confidence() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("src/api.rs", "fn handler() {}\n").unwrap();
    repo.commit_all("init").unwrap();

    let resolver = FileResolver::new(repo.path(), MockGraph::with_paths(&["src/api.rs"]));
    let matches = resolver.resolve("src/api.rs").unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].historical_path, "src/api.rs");
    assert_eq!(matches[0].confidence, 1.0);
    assert_eq!(matches[0].method, MatchMethod::Exact);
}

#[test]
fn renamed_file_found_under_old_path() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("settings.py", "DEBUG = True\nPORT = 8000\n").unwrap();
    repo.commit_all("add settings").unwrap();
    repo.rename_file("settings.py", "config/settings.py").unwrap();
    repo.commit_all("move settings").unwrap();

    // The graph only knows the pre-rename path.
    let resolver = FileResolver::new(repo.path(), MockGraph::with_paths(&["settings.py"]));
    let matches = resolver.resolve("config/settings.py").unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].historical_path, "settings.py");
    assert_eq!(matches[0].confidence, 0.95);
    assert_eq!(matches[0].method, MatchMethod::GitFollow);
}

#[test]
fn both_strategies_merge_with_single_exact_entry() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("old.rs", "fn f() {}\nfn g() {}\n").unwrap();
    repo.commit_all("add").unwrap();
    repo.rename_file("old.rs", "new.rs").unwrap();
    repo.commit_all("rename").unwrap();

    let resolver = FileResolver::new(repo.path(), MockGraph::with_paths(&["new.rs", "old.rs"]));
    let matches = resolver.resolve("new.rs").unwrap();

    assert_eq!(matches.len(), 2);
    let exact: Vec<_> = matches.iter().filter(|m| m.method == MatchMethod::Exact).collect();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].historical_path, "new.rs");

    let follow: Vec<_> = matches.iter().filter(|m| m.method == MatchMethod::GitFollow).collect();
    assert_eq!(follow.len(), 1);
    assert_eq!(follow[0].historical_path, "old.rs");
    assert_eq!(follow[0].confidence, 0.95);
}

#[test]
fn unmatched_path_gets_low_confidence_placeholder() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("known.rs", "fn f() {}\n").unwrap();
    repo.commit_all("init").unwrap();

    let resolver = FileResolver::new(repo.path(), MockGraph::with_paths(&["known.rs"]));
    let (path, confidence) = resolver.resolve_to_single_path("brand_new.rs").unwrap();

    assert_eq!(path, "brand_new.rs");
    assert_eq!(confidence, 0.3);
}

#[test]
fn all_paths_falls_back_to_current_path() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("known.rs", "fn f() {}\n").unwrap();
    repo.commit_all("init").unwrap();

    let resolver = FileResolver::new(repo.path(), MockGraph::with_paths(&["known.rs"]));
    let paths = resolver.resolve_to_all_paths("unseen.rs").unwrap();

    assert_eq!(paths, vec!["unseen.rs".to_string()]);
}

#[test]
fn batch_resolve_isolates_per_path_failures() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("a.rs", "fn a() {}\n").unwrap();
    repo.write_file("b.rs", "fn b() {}\n").unwrap();
    repo.commit_all("init").unwrap();

    let resolver = FileResolver::new(repo.path(), MockGraph::with_paths(&["a.rs", "b.rs"]));
    let results = resolver.batch_resolve(
        &["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()],
        None,
    );

    assert_eq!(results.len(), 3);
    assert!(!results["a.rs"].is_empty());
    assert!(!results["b.rs"].is_empty());
    assert!(results["c.rs"].is_empty());
}

#[test]
fn batch_deadline_drops_stalled_path_and_finishes_siblings() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("fast.rs", "fn fast() {}\n").unwrap();
    repo.write_file("slow.rs", "fn slow() {}\n").unwrap();
    repo.commit_all("init").unwrap();

    let graph = Arc::new(StallingGraph {
        inner: MockGraph::with_paths(&["fast.rs", "slow.rs"]),
        stall_on: "slow.rs".to_string(),
        delay: Duration::from_secs(5),
    });
    let resolver = FileResolver::new(repo.path(), graph);

    let results = resolver.batch_resolve(
        &["fast.rs".to_string(), "slow.rs".to_string()],
        Some(Duration::from_millis(250)),
    );

    assert_eq!(results["fast.rs"][0].historical_path, "fast.rs");
    assert!(!results.contains_key("slow.rs"));
}

#[test]
fn resolve_errors_when_both_strategies_fail() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("lib.rs", "fn lib() {}\n").unwrap();
    repo.commit_all("init").unwrap();

    // History succeeds, so both strategies reach the graph and both fail.
    let graph = Arc::new(FlakyGraph {
        inner: MockGraph::with_paths(&["lib.rs"]),
        fail_on: "",
    });
    let resolver = FileResolver::new(repo.path(), graph);

    let err = resolver.resolve("lib.rs").unwrap_err();
    assert!(matches!(err, AnchorError::GraphError(_)));
}

#[test]
fn surviving_strategy_still_returns_matches() {
    let repo = TmpRepo::new().unwrap();
    repo.write_file("old.rs", "fn f() {}\n").unwrap();
    repo.commit_all("add").unwrap();
    repo.rename_file("old.rs", "new.rs").unwrap();
    repo.commit_all("rename").unwrap();

    // Only the exact-match query path fails; rename-following still answers.
    let graph = Arc::new(FlakyGraph {
        inner: MockGraph::with_paths(&["old.rs"]),
        fail_on: "= $path",
    });
    let resolver = FileResolver::new(repo.path(), graph);

    let matches = resolver.resolve("new.rs").unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].historical_path, "old.rs");
    assert_eq!(matches[0].method, MatchMethod::GitFollow);
}
