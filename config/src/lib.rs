pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::Settings;

/// Environment variable the gateway key is read from when none is passed explicitly.
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Load environment variables from .env files.
/// First loads from ~/.env (home directory), then from ./.env (project directory).
/// Project directory values take precedence over home directory values.
/// Call this before parsing CLI args to ensure env vars are available.
pub fn load_env_file() {
    // dotenv never overrides a variable that is already set, so the
    // project file has to go first for it to win over the home file.
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }
}

/// Resolve an API key: the explicit value wins, otherwise `env_var` is read.
/// Blank values count as absent.
pub fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Option<String> {
    let non_blank = |key: &str| {
        let key = key.trim();
        (!key.is_empty()).then(|| key.to_string())
    };

    explicit
        .and_then(non_blank)
        .or_else(|| std::env::var(env_var).ok().as_deref().and_then(non_blank))
}
