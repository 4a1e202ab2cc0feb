//! phishguard-core: Core library for PhishGuard
//!
//! This crate provides the navigation-aware scan overlay: it watches a
//! single-page application for in-place navigation, asks a privileged relay
//! for a phishing verdict on each settled address, and keeps exactly one
//! indicator on the page that reflects the latest scan.
//!
//! # Architecture
//!
//! ```text
//! ChangeSource → NavigationWatcher → Overlay ──▶ RelayChannel ──▶ RelayHost
//!                                      │              (boundary)       │
//!                               SessionRegistry                AnalysisClient
//!                                      ↓                               │
//!                               VerdictRenderer              analysis service
//! ```
//!
//! # Modules
//!
//! - `navigation`: structural change sources and the debounced watcher
//! - `debounce`: single-slot cancel-and-reschedule timer state
//! - `relay`: request/response bridge across the privilege boundary
//! - `service`: HTTP client for the analysis service
//! - `protocol`: relay and service wire formats
//! - `session`: scan session registry (supersession, idempotent resolve)
//! - `renderer`: indicator styles and the single-indicator renderer
//! - `overlay`: coordinator tying the above together
//! - `history`: display rows for the manual scan history
//! - `verdict`: classification and verdict model
//! - `config`: Configuration management
//! - `logging`: tracing subscriber setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod config;
pub mod debounce;
pub mod error;
pub mod history;
pub mod logging;
pub mod navigation;
pub mod overlay;
pub mod protocol;
pub mod relay;
pub mod renderer;
pub mod service;
pub mod session;
pub mod verdict;

pub use error::{Error, RelayError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
