use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Max chunk size in bytes (~25K tokens).
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 100 * 1024;
/// Chunk budget per file.
pub const DEFAULT_MAX_CHUNKS_PER_FILE: usize = 10;
/// Fallback line-based chunking.
pub const DEFAULT_LINES_PER_CHUNK: usize = 3000;

/// Top-level function detection patterns, keyed by lowercase language name.
/// Matched only against lines with no leading indentation so nested functions
/// stay attached to their enclosing function.
static FUNCTION_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("go", Regex::new(r"^func\s+(\w+|\(\w+\s+\*?\w+\))").unwrap());
    m.insert("python", Regex::new(r"^def\s+\w+\s*\(").unwrap());
    m.insert(
        "javascript",
        Regex::new(r"^(function\s+\w+|const\s+\w+\s*=\s*(function|\())").unwrap(),
    );
    m.insert(
        "typescript",
        Regex::new(r"^(function\s+\w+|const\s+\w+\s*=\s*(function|\()|export\s+(async\s+)?function)")
            .unwrap(),
    );
    m.insert("java", Regex::new(r"^(public|private|protected|static|final)+.*\{$").unwrap());
    m.insert("ruby", Regex::new(r"^def\s+\w+").unwrap());
    m.insert("rust", Regex::new(r"^(pub\s+)?(async\s+)?fn\s+\w+").unwrap());
    m.insert("c", Regex::new(r"^\w+\s+\w+\s*\([^)]*\)\s*\{$").unwrap());
    m.insert("cpp", Regex::new(r"^\w+\s+\w+\s*\([^)]*\)\s*\{$").unwrap());
    m
});

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@@ -(\d+),(\d+) \+(\d+),(\d+) @@").unwrap());

/// A logical chunk of git diff output (or of a new file's content).
#[derive(Debug, Clone, Default)]
pub struct DiffChunk {
    /// File path (canonical, `a/` prefix stripped).
    pub file_path: String,
    /// Starting line number in the new version.
    pub start_line: usize,
    /// Ending line number in the new version.
    pub end_line: usize,
    /// Raw diff content including `@@` headers.
    pub content: String,
    pub size_bytes: usize,
    /// Lines of content (for new files).
    pub lines: Vec<String>,
    /// Synthesized header giving continuation chunks file context. Kept out
    /// of `content` so concatenating a file's chunks reproduces its diff body.
    pub file_header: String,
}

/// Splits git diff output into bounded chunks using `@@` hunk headers as
/// natural boundaries.
pub struct DiffChunker {
    max_chunk_size: usize,
}

impl DiffChunker {
    pub fn new(max_chunk_size_bytes: usize) -> Self {
        DiffChunker {
            max_chunk_size: if max_chunk_size_bytes == 0 {
                DEFAULT_MAX_CHUNK_SIZE
            } else {
                max_chunk_size_bytes
            },
        }
    }

    /// Parses git diff output and extracts chunks. Hunks are buffered so a
    /// chunk only exceeds the size budget when one hunk alone exceeds it.
    pub fn extract_chunks(&self, diff_output: &str) -> Vec<DiffChunk> {
        let mut chunks = Vec::new();
        let mut state = ChunkState::default();
        let mut in_diff_block = false;

        for line in diff_output.lines() {
            // File boundary: diff --git a/path b/path
            if line.starts_with("diff --git") {
                state.finish_hunk(self.max_chunk_size, &mut chunks);
                state.flush_chunk(&mut chunks);
                state.file_path = parse_file_path(line);
                state.pending_header = String::new();
                in_diff_block = true;
                state.hunk.push_line(line);
                continue;
            }

            if !in_diff_block {
                continue;
            }

            // Hunk boundary: @@ -old,count +new,count @@. A buffer holding
            // only the file-header lines (no range yet) absorbs its first
            // hunk instead of being finalized on its own.
            if line.starts_with("@@") {
                if state.hunk.start.is_some() {
                    state.finish_hunk(self.max_chunk_size, &mut chunks);
                }
                if let Some((start, end)) = parse_hunk_header(line) {
                    if state.hunk.start.is_none() {
                        state.hunk.start = Some(start);
                    }
                    state.hunk.end = end;
                }
            }

            state.hunk.push_line(line);
        }

        state.finish_hunk(self.max_chunk_size, &mut chunks);
        state.flush_chunk(&mut chunks);

        chunks
    }

    /// Groups extracted chunks by file path, preserving per-file order.
    pub fn extract_chunks_by_file(&self, diff_output: &str) -> HashMap<String, Vec<DiffChunk>> {
        let mut by_file: HashMap<String, Vec<DiffChunk>> = HashMap::new();
        for chunk in self.extract_chunks(diff_output) {
            by_file.entry(chunk.file_path.clone()).or_default().push(chunk);
        }
        by_file
    }
}

impl Default for DiffChunker {
    fn default() -> Self {
        DiffChunker::new(0)
    }
}

/// Accumulation state for one file section of a diff scan.
#[derive(Default)]
struct ChunkState {
    file_path: String,
    chunk: Accum,
    hunk: Accum,
    pending_header: String,
}

#[derive(Default)]
struct Accum {
    content: String,
    start: Option<usize>,
    end: usize,
}

impl Accum {
    fn push_line(&mut self, line: &str) {
        self.content.push_str(line);
        self.content.push('\n');
    }

    fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn take(&mut self) -> Accum {
        std::mem::take(self)
    }
}

impl ChunkState {
    /// Moves the buffered hunk into the current chunk, flushing the chunk
    /// first if the hunk would push it over the size budget.
    fn finish_hunk(&mut self, max_chunk_size: usize, chunks: &mut Vec<DiffChunk>) {
        let hunk = self.hunk.take();
        if hunk.is_empty() {
            return;
        }

        if !self.chunk.is_empty()
            && self.chunk.content.len() + hunk.content.len() > max_chunk_size
        {
            self.flush_chunk(chunks);
        }

        if self.chunk.start.is_none() {
            self.chunk.start = hunk.start;
        }
        if hunk.start.is_some() {
            self.chunk.end = hunk.end;
        }
        self.chunk.content.push_str(&hunk.content);

        // A single hunk larger than the budget becomes its own chunk.
        if self.chunk.content.len() > max_chunk_size {
            self.flush_chunk(chunks);
        }
    }

    fn flush_chunk(&mut self, chunks: &mut Vec<DiffChunk>) {
        let chunk = self.chunk.take();
        if chunk.is_empty() {
            return;
        }

        chunks.push(DiffChunk {
            file_path: self.file_path.clone(),
            start_line: chunk.start.unwrap_or(0),
            end_line: chunk.end,
            size_bytes: chunk.content.len(),
            content: chunk.content,
            lines: Vec::new(),
            file_header: self.pending_header.clone(),
        });

        // Continuation chunks of the same file carry a synthesized header.
        self.pending_header = format!("diff --git a/{} b/{}", self.file_path, self.file_path);
    }
}

/// Groups chunks into batches of at most `max_per_batch` for distribution
/// across parallel consumers.
pub fn batch_chunks(chunks: Vec<DiffChunk>, max_per_batch: usize) -> Vec<Vec<DiffChunk>> {
    let max_per_batch = if max_per_batch == 0 {
        DEFAULT_MAX_CHUNKS_PER_FILE
    } else {
        max_per_batch
    };

    let mut batches = Vec::new();
    let mut batch = Vec::new();
    for chunk in chunks {
        batch.push(chunk);
        if batch.len() == max_per_batch {
            batches.push(std::mem::take(&mut batch));
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }

    batches
}

/// Extracts the file path from a `diff --git a/path b/path` line.
fn parse_file_path(line: &str) -> String {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() >= 3 {
        return parts[2].strip_prefix("a/").unwrap_or(parts[2]).to_string();
    }
    String::new()
}

/// Parses `@@ -oldStart,oldCount +newStart,newCount @@`, returning the
/// new-side `(start, end)` line range. Returns `None` for headers that do not
/// carry parseable line numbers.
pub fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    let caps = HUNK_HEADER.captures(line)?;
    let new_start: usize = caps[3].parse().ok()?;
    let new_count: usize = caps[4].parse().ok()?;
    Some((new_start, (new_start + new_count).saturating_sub(1)))
}

/// Splits a brand-new file's content by top-level function boundaries,
/// grouping consecutive functions until the size budget would be exceeded.
/// A single function larger than the budget is split by fixed line count, and
/// unknown languages fall back directly to fixed-line splitting. The result
/// is truncated to `max_chunks` (0 meaning the default), never silently.
pub fn extract_chunks_for_new_file(
    file_content: &str,
    language: &str,
    max_chunks: usize,
) -> Vec<DiffChunk> {
    let max_chunks = if max_chunks == 0 {
        DEFAULT_MAX_CHUNKS_PER_FILE
    } else {
        max_chunks
    };
    let lines: Vec<&str> = file_content.split('\n').collect();

    let pattern = match FUNCTION_PATTERNS.get(language.to_lowercase().as_str()) {
        Some(p) => p,
        None => {
            crate::utils::debug_log(&format!("line-based chunking for language: {}", language));
            return split_by_lines(&lines, 0, DEFAULT_LINES_PER_CHUNK, Some(max_chunks));
        }
    };

    // Top-level function start indices. Indented lines never match, so inner
    // functions stay inside their enclosing block.
    let mut function_starts = vec![0];
    for (i, line) in lines.iter().enumerate() {
        let unindented = !line.starts_with(' ') && !line.starts_with('\t');
        if i > 0 && unindented && pattern.is_match(line) {
            function_starts.push(i);
        }
    }
    function_starts.push(lines.len());

    let mut chunks: Vec<DiffChunk> = Vec::new();
    let mut current_lines: Vec<String> = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut current_size = 0usize;

    for window in function_starts.windows(2) {
        let (start, end) = (window[0], window[1]);
        let function_lines = &lines[start..end];
        let function_size: usize = function_lines.iter().map(|l| l.len()).sum();

        // Flush the accumulated chunk before a function that would overflow it.
        if current_size + function_size > DEFAULT_MAX_CHUNK_SIZE && !current_lines.is_empty() {
            chunks.push(new_file_chunk(
                std::mem::take(&mut current_lines),
                current_start.unwrap_or(0),
                start.saturating_sub(1),
            ));
            current_start = None;
            current_size = 0;
        }

        // A function that alone exceeds the budget is split by line count.
        if function_size > DEFAULT_MAX_CHUNK_SIZE {
            for mut sub in split_by_lines(function_lines, start, DEFAULT_LINES_PER_CHUNK, None) {
                sub.file_header = synth_header(&sub);
                chunks.push(sub);
            }
            continue;
        }

        if current_start.is_none() {
            current_start = Some(start);
        }
        current_lines.extend(function_lines.iter().map(|l| l.to_string()));
        current_size += function_size;
    }

    if !current_lines.is_empty() {
        let start = current_start.unwrap_or(0);
        chunks.push(new_file_chunk(
            current_lines,
            start,
            lines.len().saturating_sub(1),
        ));
    }

    if chunks.len() > max_chunks {
        eprintln!(
            "warning: file truncated from {} chunks to {} (chunk budget)",
            chunks.len(),
            max_chunks
        );
        chunks.truncate(max_chunks);
    }

    for chunk in &mut chunks {
        if chunk.file_header.is_empty() {
            chunk.file_header = synth_header(chunk);
        }
    }

    chunks
}

fn new_file_chunk(lines: Vec<String>, start_line: usize, end_line: usize) -> DiffChunk {
    DiffChunk {
        size_bytes: lines.iter().map(|l| l.len()).sum(),
        start_line,
        end_line,
        lines,
        ..Default::default()
    }
}

fn synth_header(chunk: &DiffChunk) -> String {
    format!(
        "@@ -{},{} +{},{} @@",
        chunk.start_line,
        chunk.lines.len(),
        chunk.start_line,
        chunk.lines.len()
    )
}

/// Fixed-line-count chunking for unknown languages and oversized functions.
fn split_by_lines(
    lines: &[&str],
    offset: usize,
    lines_per_chunk: usize,
    max_chunks: Option<usize>,
) -> Vec<DiffChunk> {
    let mut chunks = Vec::new();

    for (i, window) in lines.chunks(lines_per_chunk).enumerate() {
        let start = offset + i * lines_per_chunk;
        chunks.push(new_file_chunk(
            window.iter().map(|l| l.to_string()).collect(),
            start,
            start + window.len().saturating_sub(1),
        ));

        if let Some(max) = max_chunks {
            if chunks.len() >= max {
                break;
            }
        }
    }

    chunks
}

/// A minimal excerpt of a diff for entity resolution: first lines, last
/// lines, and a code-dense middle bounded by a token budget.
#[derive(Debug, Clone, Default)]
pub struct DiffExcerpt {
    pub first_lines: Vec<String>,
    pub last_lines: Vec<String>,
    pub middle_lines: Vec<String>,
    /// Total changed lines in the full diff.
    pub total_lines: usize,
    /// Estimated tokens in the excerpt.
    pub token_estimate: usize,
}

/// Creates minimal context for fuzzy entity resolution using the hybrid
/// strategy: first 10 + last 5 + smart middle. Only `+`/`-` content lines
/// participate; the `+++`/`---` file headers are excluded.
pub fn extract_excerpt_for_resolution(diff_content: &str, token_budget: usize) -> DiffExcerpt {
    let changed_lines: Vec<String> = diff_content
        .lines()
        .filter(|line| {
            (line.starts_with('+') || line.starts_with('-'))
                && !line.starts_with("+++")
                && !line.starts_with("---")
        })
        .map(|l| l.to_string())
        .collect();

    let total_lines = changed_lines.len();
    if total_lines == 0 {
        return DiffExcerpt::default();
    }

    // Small diffs go through whole.
    if total_lines <= 20 {
        return DiffExcerpt {
            token_estimate: estimate_tokens(&changed_lines),
            first_lines: changed_lines,
            last_lines: Vec::new(),
            middle_lines: Vec::new(),
            total_lines,
        };
    }

    let first_n = 10;
    let last_n = 5;
    let first_lines = changed_lines[..first_n].to_vec();
    let last_lines = changed_lines[total_lines - last_n..].to_vec();

    let remaining_budget = token_budget
        .saturating_sub(estimate_tokens(&first_lines))
        .saturating_sub(estimate_tokens(&last_lines));
    let middle_lines =
        select_code_dense_lines(&changed_lines[first_n..total_lines - last_n], remaining_budget);

    DiffExcerpt {
        token_estimate: estimate_tokens(&first_lines)
            + estimate_tokens(&last_lines)
            + estimate_tokens(&middle_lines),
        first_lines,
        last_lines,
        middle_lines,
        total_lines,
    }
}

impl DiffExcerpt {
    /// Formats the excerpt for an LLM prompt.
    pub fn format(&self) -> String {
        let mut out = String::from("=== First lines ===\n");
        for line in &self.first_lines {
            out.push_str(line);
            out.push('\n');
        }

        if !self.middle_lines.is_empty() {
            out.push_str("\n... [truncated] ...\n\n=== Key middle section ===\n");
            for line in &self.middle_lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        if !self.last_lines.is_empty() {
            out.push_str("\n... [truncated] ...\n\n=== Last lines ===\n");
            for line in &self.last_lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        out.push_str(&format!(
            "\n(Total: {} lines, showing {} lines)\n",
            self.total_lines,
            self.first_lines.len() + self.middle_lines.len() + self.last_lines.len()
        ));

        out
    }
}

/// Selects the most code-dense lines within a token budget, preserving their
/// original order.
pub fn select_code_dense_lines(lines: &[String], max_tokens: usize) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &String, usize)> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| (i, line, code_density(line)))
        .collect();
    scored.sort_by(|a, b| b.2.cmp(&a.2));

    let mut picked: Vec<(usize, &String)> = Vec::new();
    let mut used_tokens = 0;
    for (index, line, _) in scored {
        let line_tokens = line.len() / 4;
        if used_tokens + line_tokens > max_tokens {
            break;
        }
        picked.push((index, line));
        used_tokens += line_tokens;
    }

    picked.sort_by_key(|(index, _)| *index);
    picked.into_iter().map(|(_, line)| line.clone()).collect()
}

/// Scores a line by code content. Comment-only and blank lines score 0.
pub fn code_density(line: &str) -> usize {
    let mut trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix('+').or_else(|| trimmed.strip_prefix('-')) {
        trimmed = rest.trim();
    }

    if trimmed.is_empty() {
        return 0;
    }
    if trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with("/*") {
        return 0;
    }

    trimmed.matches('(').count() * 2
        + trimmed.matches('{').count() * 2
        + trimmed.matches('=').count()
        + trimmed.matches('.').count()
        + trimmed.split_whitespace().count()
}

/// Rough token estimate: 4 characters per token.
pub fn estimate_tokens(lines: &[String]) -> usize {
    lines.iter().map(|l| l.len()).sum::<usize>() / 4
}
