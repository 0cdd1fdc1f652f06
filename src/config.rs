use std::env;
use std::path::Path;
use std::sync::OnceLock;

/// Centralized configuration for the application
pub struct Config {
    git_path: String,
    llm_api_key: Option<String>,
    llm_api_url: String,
    llm_model: String,
    graph_url: Option<String>,
    graph_user: Option<String>,
    graph_password: Option<String>,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    /// Initialize the global configuration exactly once.
    /// Safe to call multiple times; subsequent calls are no-ops.
    pub fn init() {
        let _ = CONFIG.get_or_init(Config::from_env);
    }

    /// Access the global configuration, initializing it lazily.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    fn from_env() -> Config {
        Config {
            git_path: resolve_git_path(),
            llm_api_key: env::var("CODE_ANCHOR_OPENAI_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .ok()
                .filter(|v| !v.trim().is_empty()),
            llm_api_url: env::var("CODE_ANCHOR_LLM_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            llm_model: env::var("CODE_ANCHOR_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            graph_url: env::var("CODE_ANCHOR_GRAPH_URL").ok(),
            graph_user: env::var("CODE_ANCHOR_GRAPH_USER").ok(),
            graph_password: env::var("CODE_ANCHOR_GRAPH_PASSWORD").ok(),
        }
    }

    /// Returns the command to invoke git.
    pub fn git_cmd(&self) -> &str {
        &self.git_path
    }

    /// API key for the LLM judge, if one is configured.
    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm_api_key.as_deref()
    }

    pub fn llm_api_url(&self) -> &str {
        &self.llm_api_url
    }

    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }

    /// Base URL of the graph store's HTTP transaction endpoint, if configured.
    pub fn graph_url(&self) -> Option<&str> {
        self.graph_url.as_deref()
    }

    pub fn graph_credentials(&self) -> Option<(&str, &str)> {
        match (self.graph_user.as_deref(), self.graph_password.as_deref()) {
            (Some(u), Some(p)) => Some((u, p)),
            _ => None,
        }
    }
}

fn resolve_git_path() -> String {
    // 1) Environment override
    if let Ok(val) = env::var("CODE_ANCHOR_GIT") {
        if !val.trim().is_empty() {
            return val;
        }
    }

    // 2) Probe common locations across platforms. We skip a full PATH search
    // here to keep startup fast; the bare "git" fallback lets the OS resolve
    // PATH itself.
    let candidates: &[&str] = &[
        "/opt/homebrew/bin/git",
        "/usr/local/bin/git",
        "/usr/bin/git",
        "/bin/git",
        r"C:\Program Files\Git\bin\git.exe",
    ];

    if let Some(found) = candidates.iter().map(Path::new).find(|p| p.is_file()) {
        return found.to_string_lossy().to_string();
    }

    // 3) Fallback: rely on system PATH
    "git".to_string()
}
