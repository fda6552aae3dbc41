use std::env;

/// Per-image ceiling applied to task screenshots before anything is uploaded.
pub const DEFAULT_MAX_SCREENSHOT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub max_screenshot_bytes: usize,
}

impl Config {
    /**
     * load tunables from the environment
     * missing or malformed vars fall back to defaults
     */
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let max_screenshot_bytes = env::var("MAX_SCREENSHOT_BYTES")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_SCREENSHOT_BYTES);

        Self {
            max_screenshot_bytes,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_screenshot_bytes: DEFAULT_MAX_SCREENSHOT_BYTES,
        }
    }
}
