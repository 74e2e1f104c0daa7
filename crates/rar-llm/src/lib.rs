//! RAR LLM - chat-completions classifier backend
//!
//! Implements `rar_core::Classifier` against any OpenAI-compatible
//! endpoint (OpenAI, DeepSeek, local vLLM/Ollama gateways):
//! - per-stage system instructions (`prompts`)
//! - bearer-auth POST with a per-request timeout
//! - HTTP/provider failures mapped onto `ClassifierError`

#![warn(unreachable_pub)]

pub mod client;
pub mod prompts;

pub use client::OpenAiClassifier;
pub use prompts::system_prompt;
