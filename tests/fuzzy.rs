use code_anchor::error::AnchorError;
use code_anchor::llm::JsonCompleter;
use code_anchor::resolution::{CodeBlockCandidate, FuzzyResolver, ResolutionMethod};

struct FakeJudge {
    enabled: bool,
    response: Result<String, String>,
}

impl FakeJudge {
    fn answering(json: &str) -> Box<Self> {
        Box::new(FakeJudge {
            enabled: true,
            response: Ok(json.to_string()),
        })
    }

    fn failing() -> Box<Self> {
        Box::new(FakeJudge {
            enabled: true,
            response: Err("judge offline".to_string()),
        })
    }
}

impl JsonCompleter for FakeJudge {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn complete_json(&self, _system: &str, _user: &str) -> Result<String, AnchorError> {
        self.response
            .clone()
            .map_err(AnchorError::Generic)
    }
}

fn candidate(id: i64, start: usize, end: usize) -> CodeBlockCandidate {
    CodeBlockCandidate {
        id,
        name: "process".to_string(),
        file_path: "src/worker.rs".to_string(),
        start_line: start,
        end_line: end,
        content: format!("fn process() {{\n    // body {}\n}}\n", id),
    }
}

const OVERLAP_DIFF: &str = "@@ -45,16 +45,16 @@\n+    let result = compute();\n";

#[test]
fn zero_candidates_is_no_match() {
    let resolver = FuzzyResolver::new(None);
    let result = resolver.resolve(&[], "+ anything");

    assert!(result.matched.is_none());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.method, ResolutionMethod::NoMatch);
}

#[test]
fn single_candidate_is_unique_regardless_of_diff() {
    let resolver = FuzzyResolver::new(Some(FakeJudge::failing()));
    let candidates = vec![candidate(1, 10, 40)];

    let result = resolver.resolve(&candidates, "garbage that is not a diff");

    assert_eq!(result.matched.as_ref().unwrap().id, 1);
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.method, ResolutionMethod::Unique);
}

#[test]
fn heuristic_picks_greatest_line_overlap() {
    // Changed lines 45..=60: candidate [1,50] overlaps 6, [51,100] overlaps 10.
    let resolver = FuzzyResolver::new(None);
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.matched.as_ref().unwrap().id, 2);
    assert_eq!(result.method, ResolutionMethod::Heuristic);
    assert!((result.confidence - 0.625).abs() < 1e-9);
}

#[test]
fn heuristic_confidence_never_below_floor() {
    // Overlap 1/16 would be 0.0625; the floor lifts it to 0.5.
    let resolver = FuzzyResolver::new(None);
    let candidates = vec![candidate(1, 60, 60), candidate(2, 300, 400)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.matched.as_ref().unwrap().id, 1);
    assert_eq!(result.confidence, 0.5);
}

#[test]
fn diff_without_line_numbers_degrades_to_first_candidate() {
    let resolver = FuzzyResolver::new(None);
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, "+new line\n-old line\n");

    assert_eq!(result.matched.as_ref().unwrap().id, 1);
    assert_eq!(result.confidence, 0.5);
    assert_eq!(result.method, ResolutionMethod::Heuristic);
    assert!(result.reason.contains("first candidate"));
}

#[test]
fn confident_judge_verdict_is_accepted() {
    let judge = FakeJudge::answering(
        r#"{"matched_index": 1, "confidence": 0.9, "reasoning": "diff touches compute()"}"#,
    );
    let resolver = FuzzyResolver::new(Some(judge));
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.matched.as_ref().unwrap().id, 2);
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.method, ResolutionMethod::FuzzyLlm);
    assert_eq!(result.reason, "diff touches compute()");
}

#[test]
fn low_confidence_verdict_falls_back_to_heuristic() {
    let judge = FakeJudge::answering(
        r#"{"matched_index": 0, "confidence": 0.4, "reasoning": "unsure"}"#,
    );
    let resolver = FuzzyResolver::new(Some(judge));
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.method, ResolutionMethod::Heuristic);
    assert_eq!(result.matched.as_ref().unwrap().id, 2);
}

#[test]
fn out_of_range_index_falls_back_to_heuristic() {
    let judge = FakeJudge::answering(
        r#"{"matched_index": 7, "confidence": 0.95, "reasoning": "hallucinated"}"#,
    );
    let resolver = FuzzyResolver::new(Some(judge));
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.method, ResolutionMethod::Heuristic);
    assert_eq!(result.matched.as_ref().unwrap().id, 2);
}

#[test]
fn judge_error_falls_back_to_heuristic() {
    let resolver = FuzzyResolver::new(Some(FakeJudge::failing()));
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.method, ResolutionMethod::Heuristic);
    assert_eq!(result.matched.as_ref().unwrap().id, 2);
}

#[test]
fn malformed_judge_response_falls_back_to_heuristic() {
    let judge = FakeJudge::answering("the best candidate is probably the second one");
    let resolver = FuzzyResolver::new(Some(judge));
    let candidates = vec![candidate(1, 1, 50), candidate(2, 51, 100)];

    let result = resolver.resolve(&candidates, OVERLAP_DIFF);

    assert_eq!(result.method, ResolutionMethod::Heuristic);
}
