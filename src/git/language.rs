use std::path::Path;

/// Returns the programming language for a file path based on its extension.
///
/// Names are lowercase and match the keys of the chunker's top-level-function
/// patterns. Unknown extensions fall back to the bare extension, and files
/// without one report "unknown".
pub fn detect_language(file_path: &str) -> String {
    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let known = match ext.as_str() {
        "go" => "go",
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "rs" => "rust",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "pl" => "perl",
        "lua" => "lua",
        "dart" => "dart",
        "ex" | "exs" => "elixir",
        "clj" => "clojure",
        "ml" => "ocaml",
        "hs" => "haskell",
        _ => "",
    };

    if !known.is_empty() {
        return known.to_string();
    }

    if !ext.is_empty() {
        return ext;
    }

    "unknown".to_string()
}
