use crate::git::diff_chunker::{extract_excerpt_for_resolution, parse_hunk_header, select_code_dense_lines};
use crate::llm::JsonCompleter;
use crate::utils::debug_log;
use serde::Deserialize;

/// Token budget for the diff excerpt shown to the judge.
const DIFF_EXCERPT_BUDGET: usize = 1500;
/// Token budget per candidate context.
const CANDIDATE_CONTEXT_BUDGET: usize = 500;
/// Judge verdicts below this confidence are not trusted.
const JUDGE_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// The heuristic never reports below this floor.
const HEURISTIC_CONFIDENCE_FLOOR: f64 = 0.5;

/// A code block that may be the target of a diff. Multiple candidates can
/// share a name within one file (overloads, duplicated-then-renamed
/// functions); disambiguation operates only within that set.
#[derive(Debug, Clone)]
pub struct CodeBlockCandidate {
    pub id: i64,
    pub name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    Unique,
    FuzzyLlm,
    Heuristic,
    NoMatch,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionMethod::Unique => write!(f, "unique"),
            ResolutionMethod::FuzzyLlm => write!(f, "fuzzy_llm"),
            ResolutionMethod::Heuristic => write!(f, "heuristic"),
            ResolutionMethod::NoMatch => write!(f, "no_match"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub matched: Option<CodeBlockCandidate>,
    pub confidence: f64,
    pub method: ResolutionMethod,
    pub reason: String,
}

#[derive(Deserialize)]
struct JudgeVerdict {
    matched_index: i64,
    confidence: f64,
    reasoning: String,
}

const JUDGE_SYSTEM_PROMPT: &str = "You are a code entity resolver. Your job is to match a code diff \
to the correct code block from multiple candidates with the same name.

Analyze the semantic content of the diff and each candidate to determine the best match.

Return a JSON object with:
{
  \"matched_index\": <0-based index of matched candidate, or -1 if no good match>,
  \"confidence\": <0.0-1.0, where >0.7 is high confidence>,
  \"reasoning\": \"<brief explanation of why this candidate matches>\"
}

IMPORTANT: Only return high confidence (>0.7) if you're certain. If unsure, return low confidence.";

/// Disambiguates between same-named code blocks using a language-model judge
/// with a deterministic line-overlap fallback. The two-tier design never
/// blocks on the judge being unusable and never returns an unexplained
/// result.
pub struct FuzzyResolver {
    judge: Option<Box<dyn JsonCompleter>>,
}

impl FuzzyResolver {
    pub fn new(judge: Option<Box<dyn JsonCompleter>>) -> Self {
        FuzzyResolver { judge }
    }

    /// Picks the candidate a diff is actually modifying.
    ///
    /// Zero candidates is a `NoMatch`; exactly one is `Unique` at full
    /// confidence with no further work. Only with two or more does the judge
    /// (and, failing that, the heuristic) get involved.
    pub fn resolve(&self, candidates: &[CodeBlockCandidate], diff_content: &str) -> ResolutionResult {
        if candidates.is_empty() {
            return ResolutionResult {
                matched: None,
                confidence: 0.0,
                method: ResolutionMethod::NoMatch,
                reason: "No matching code blocks found".to_string(),
            };
        }

        if candidates.len() == 1 {
            return ResolutionResult {
                matched: Some(candidates[0].clone()),
                confidence: 1.0,
                method: ResolutionMethod::Unique,
                reason: "Only one block with this name exists".to_string(),
            };
        }

        debug_log(&format!(
            "{} candidates for block '{}', disambiguating",
            candidates.len(),
            candidates[0].name
        ));

        match &self.judge {
            Some(judge) if judge.is_enabled() => self.judge_resolve(judge.as_ref(), candidates, diff_content),
            _ => self.heuristic_resolve(candidates, diff_content),
        }
    }

    /// Asks the judge for a semantic match. Any failure mode (transport
    /// error, malformed response, out-of-range index, low confidence) falls
    /// back to the heuristic rather than surfacing an error.
    fn judge_resolve(
        &self,
        judge: &dyn JsonCompleter,
        candidates: &[CodeBlockCandidate],
        diff_content: &str,
    ) -> ResolutionResult {
        let excerpt = extract_excerpt_for_resolution(diff_content, DIFF_EXCERPT_BUDGET);

        let candidate_contexts: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "Candidate {} (lines {}-{}):\n{}",
                    i,
                    c.start_line,
                    c.end_line,
                    hybrid_context(&c.content, CANDIDATE_CONTEXT_BUDGET)
                )
            })
            .collect();

        let user_prompt = format!(
            "Diff excerpt showing code change:\n{}\n\nCandidates ({} total):\n{}\n\nWhich candidate is being modified by this diff?",
            excerpt.format(),
            candidates.len(),
            candidate_contexts.join("\n\n")
        );

        let response = match judge.complete_json(JUDGE_SYSTEM_PROMPT, &user_prompt) {
            Ok(response) => response,
            Err(e) => {
                debug_log(&format!("judge call failed, using heuristic: {}", e));
                return self.heuristic_resolve(candidates, diff_content);
            }
        };

        let verdict: JudgeVerdict = match serde_json::from_str(&response) {
            Ok(verdict) => verdict,
            Err(e) => {
                debug_log(&format!("unparseable judge response, using heuristic: {}", e));
                return self.heuristic_resolve(candidates, diff_content);
            }
        };

        if verdict.matched_index < 0 || verdict.matched_index as usize >= candidates.len() {
            debug_log(&format!(
                "judge index {} out of range, using heuristic",
                verdict.matched_index
            ));
            return self.heuristic_resolve(candidates, diff_content);
        }

        if verdict.confidence < JUDGE_CONFIDENCE_THRESHOLD {
            debug_log(&format!(
                "judge confidence {:.2} below threshold, using heuristic",
                verdict.confidence
            ));
            return self.heuristic_resolve(candidates, diff_content);
        }

        ResolutionResult {
            matched: Some(candidates[verdict.matched_index as usize].clone()),
            confidence: verdict.confidence,
            method: ResolutionMethod::FuzzyLlm,
            reason: verdict.reasoning,
        }
    }

    /// Deterministic fallback: the candidate whose line range overlaps the
    /// most changed lines wins. Assumes code blocks do not move drastically
    /// between commits.
    fn heuristic_resolve(&self, candidates: &[CodeBlockCandidate], diff_content: &str) -> ResolutionResult {
        let changed_lines = changed_line_numbers(diff_content);

        if changed_lines.is_empty() {
            return ResolutionResult {
                matched: Some(candidates[0].clone()),
                confidence: HEURISTIC_CONFIDENCE_FLOOR,
                method: ResolutionMethod::Heuristic,
                reason: "No line numbers in diff, selected first candidate (low confidence)".to_string(),
            };
        }

        let mut best_index = 0;
        let mut best_overlap = 0;
        for (i, candidate) in candidates.iter().enumerate() {
            let overlap = changed_lines
                .iter()
                .filter(|line| **line >= candidate.start_line && **line <= candidate.end_line)
                .count();
            if overlap > best_overlap {
                best_overlap = overlap;
                best_index = i;
            }
        }

        let confidence =
            (best_overlap as f64 / changed_lines.len() as f64).max(HEURISTIC_CONFIDENCE_FLOOR);

        ResolutionResult {
            matched: Some(candidates[best_index].clone()),
            confidence,
            method: ResolutionMethod::Heuristic,
            reason: format!("Line range overlap: {}/{} lines", best_overlap, changed_lines.len()),
        }
    }
}

/// First 10 + last 5 + code-dense middle of a candidate's content, bounded by
/// a token budget.
fn hybrid_context(content: &str, max_tokens: usize) -> String {
    let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();

    if lines.len() <= 20 || content.len() < max_tokens * 4 {
        return content.to_string();
    }

    let first = &lines[..10];
    let last_start = lines.len() - 5;
    let last = &lines[last_start..];
    let edge_tokens: usize = first.iter().chain(last).map(|l| l.len()).sum::<usize>() / 4;
    let middle = select_code_dense_lines(&lines[10..last_start], max_tokens.saturating_sub(edge_tokens));

    let mut out = String::new();
    for line in first {
        out.push_str(line);
        out.push('\n');
    }
    if !middle.is_empty() {
        out.push_str("... [truncated] ...\n");
        for line in &middle {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("... [truncated] ...\n");
    for line in last {
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Expands each hunk header's new-side range into individual line numbers.
fn changed_line_numbers(diff_content: &str) -> Vec<usize> {
    let mut line_numbers = Vec::new();

    for line in diff_content.lines() {
        if line.starts_with("@@") {
            if let Some((start, end)) = parse_hunk_header(line) {
                line_numbers.extend(start..=end);
            }
        }
    }

    line_numbers
}
