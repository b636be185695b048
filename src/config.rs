use clap::Parser;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_TTS_VOICE: &str = "Kore";
// fits a 100k char chat prompt plus a long history
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "portfolio-api", version)]
#[command(about = "Rate limited proxy between the portfolio site and a generative AI API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Base URL of the generative AI API
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    // Upstream credential; requests fail with 500 while it is missing
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    // Upstream call timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub upstream_timeout: u64,

    // How often expired rate limit windows are evicted (0 disables)
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Largest accepted request body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    // Model used by chat, helper and translate when the client does not pick one
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    #[arg(long, default_value = DEFAULT_TTS_MODEL)]
    pub tts_model: String,

    #[arg(long, default_value = DEFAULT_TTS_VOICE)]
    pub tts_voice: String,

    // Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

// Runtime settings, independent of how they were supplied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub upstream_url: String,
    pub api_key: Option<String>,
    pub upstream_timeout: Duration,
    pub sweep_interval: Option<Duration>,
    pub max_body_bytes: usize,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            upstream_timeout: Duration::from_secs(30),
            sweep_interval: Some(Duration::from_secs(60)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
        }
    }
}

impl From<&Args> for Settings {
    fn from(args: &Args) -> Self {
        Self {
            upstream_url: args.upstream_url.clone(),
            // an empty variable counts as missing
            api_key: args.api_key.clone().filter(|k| !k.trim().is_empty()),
            upstream_timeout: Duration::from_secs(args.upstream_timeout),
            sweep_interval: (args.sweep_interval > 0)
                .then(|| Duration::from_secs(args.sweep_interval)),
            max_body_bytes: args.max_body_bytes,
            chat_model: args.chat_model.clone(),
            tts_model: args.tts_model.clone(),
            tts_voice: args.tts_voice.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_command_line() {
        let args = Args::try_parse_from(["portfolio-api", "--api-key", ""]).unwrap();
        let settings = Settings::from(&args);

        assert_eq!(settings.api_key, None);
        assert_eq!(settings.upstream_timeout, Duration::from_secs(30));
        assert_eq!(settings.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(settings.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn zero_sweep_interval_disables_sweeper() {
        let args = Args::try_parse_from(["portfolio-api", "--sweep-interval", "0"]).unwrap();
        assert!(Settings::from(&args).sweep_interval.is_none());
    }
}
