//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the file named by `CHAT_RELAY_CONFIG`)
//! relative to the current working directory, then applies
//! `CHAT_RELAY_BIND` and `CHAT_RELAY_LOG_LEVEL` env overrides.
//!
//! Provider credentials are never sourced from TOML. The file only lists
//! the env variable names to consult, in priority order.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// How the Gemini provider picks its request convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConventionPreference {
    /// Try the structured convention, fall back to the bare one, and keep
    /// whichever answers first.
    Auto,
    /// Always `generateContent` with multi-part contents.
    Structured,
    /// Always the legacy `generateText` bare-prompt call.
    Bare,
}

impl ConventionPreference {
    fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "auto" => Ok(Self::Auto),
            "structured" => Ok(Self::Structured),
            "bare" => Ok(Self::Bare),
            other => Err(AppError::Config(format!(
                "unknown llm.gemini.call_convention '{other}' (expected auto, structured or bare)"
            ))),
        }
    }
}

/// Gemini provider configuration (`[llm.gemini]`).
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Scheme + host of the Generative Language API, no trailing slash.
    pub api_base_url: String,
    pub api_version: String,
    /// Fixed model identifier. Never taken from the request.
    pub model: String,
    pub call_convention: ConventionPreference,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Env variable names holding the API key, highest priority first.
    pub credential_env: Vec<String>,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"` or `"dummy"`).
    pub provider: String,
    pub gemini: GeminiConfig,
}

/// Chat behaviour (`[chat]`).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Seed entry of every new transcript.
    pub system_prompt: String,
    /// Prepended verbatim to the user message before it is sent.
    pub brevity_instruction: String,
    /// Send prior turns along with the latest message.
    pub include_history: bool,
}

/// Session store limits (`[memory]`).
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Max entries per transcript, system seed included.
    pub transcript_cap: usize,
    /// Max live sessions before least-recently-used eviction.
    pub max_sessions: usize,
}

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address for the HTTP listener.
    pub bind: String,
    pub log_level: String,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub memory: MemoryConfig,
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    chat: RawChat,
    #[serde(default)]
    memory: RawMemory,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    gemini: RawGemini,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), gemini: RawGemini::default() }
    }
}

#[derive(Deserialize)]
struct RawGemini {
    #[serde(default = "default_gemini_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_gemini_api_version")]
    api_version: String,
    #[serde(default = "default_gemini_model")]
    model: String,
    #[serde(default = "default_call_convention")]
    call_convention: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_credential_env")]
    credential_env: Vec<String>,
}

impl Default for RawGemini {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api_base_url(),
            api_version: default_gemini_api_version(),
            model: default_gemini_model(),
            call_convention: default_call_convention(),
            timeout_seconds: default_timeout_seconds(),
            credential_env: default_credential_env(),
        }
    }
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default = "default_system_prompt")]
    system_prompt: String,
    #[serde(default = "default_brevity_instruction")]
    brevity_instruction: String,
    #[serde(default)]
    include_history: bool,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            brevity_instruction: default_brevity_instruction(),
            include_history: false,
        }
    }
}

#[derive(Deserialize)]
struct RawMemory {
    #[serde(default = "default_transcript_cap")]
    transcript_cap: usize,
    #[serde(default = "default_max_sessions")]
    max_sessions: usize,
}

impl Default for RawMemory {
    fn default() -> Self {
        Self { transcript_cap: default_transcript_cap(), max_sessions: default_max_sessions() }
    }
}

fn default_bind() -> String { "127.0.0.1:5000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "gemini".to_string() }
fn default_gemini_api_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_gemini_api_version() -> String { "v1beta".to_string() }
fn default_gemini_model() -> String { "gemini-pro".to_string() }
fn default_call_convention() -> String { "auto".to_string() }
fn default_timeout_seconds() -> u64 { 60 }
fn default_system_prompt() -> String { "Give short, concise answers".to_string() }
fn default_brevity_instruction() -> String { "Respond very briefly (1-2 lines): ".to_string() }
fn default_transcript_cap() -> usize { 500 }
fn default_max_sessions() -> usize { 1024 }

fn default_credential_env() -> Vec<String> {
    ["GEMINI_API_KEY", "GEMINIAI_API", "GENAI_API_KEY"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from the default path (or `CHAT_RELAY_CONFIG`), then apply
/// env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("CHAT_RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let bind_override = env::var("CHAT_RELAY_BIND").ok();
    let log_level_override = env::var("CHAT_RELAY_LOG_LEVEL").ok();
    load_from(&path, bind_override.as_deref(), log_level_override.as_deref())
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    bind_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;
    resolve(parsed, bind_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    bind_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let g = parsed.llm.gemini;

    if parsed.memory.transcript_cap == 0 {
        return Err(AppError::Config("memory.transcript_cap must be at least 1".into()));
    }
    if parsed.memory.max_sessions == 0 {
        return Err(AppError::Config("memory.max_sessions must be at least 1".into()));
    }
    if g.timeout_seconds == 0 {
        return Err(AppError::Config("llm.gemini.timeout_seconds must be at least 1".into()));
    }

    let log_level = log_level_override.unwrap_or(&parsed.server.log_level).to_string();
    logger::parse_filter(&log_level).map_err(|e| AppError::Config(format!("server.log_level: {e}")))?;

    Ok(Config {
        bind: bind_override.unwrap_or(&parsed.server.bind).to_string(),
        log_level,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            gemini: GeminiConfig {
                api_base_url: g.api_base_url.trim_end_matches('/').to_string(),
                api_version: g.api_version,
                model: g.model,
                call_convention: ConventionPreference::parse(&g.call_convention)?,
                timeout_seconds: g.timeout_seconds,
                credential_env: g.credential_env,
            },
        },
        chat: ChatConfig {
            system_prompt: parsed.chat.system_prompt,
            brevity_instruction: parsed.chat.brevity_instruction,
            include_history: parsed.chat.include_history,
        },
        memory: MemoryConfig {
            transcript_cap: parsed.memory.transcript_cap,
            max_sessions: parsed.memory.max_sessions,
        },
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Built-in defaults with the keyless dummy provider. For tests and
    /// local smoke runs; makes no external calls.
    pub fn test_default() -> Self {
        let mut cfg = resolve(RawConfig::default(), None, None)
            .unwrap_or_else(|e| unreachable!("built-in defaults are valid: {e}"));
        cfg.llm.provider = "dummy".into();
        cfg.llm.gemini.api_base_url = "http://127.0.0.1:0".into();
        cfg.llm.gemini.timeout_seconds = 1;
        cfg
    }
}
