//! Nightly automation that asks a language model to improve the source files
//! of a hosted repository and opens one pull request per improved file.

pub mod completion;
pub mod config;
pub mod cycle;
pub mod enumerate;
pub mod errors;
pub mod github;
pub mod improve;
pub mod publish;
pub mod rate_limit;
pub mod style;
pub mod testing;

pub use completion::{CompletionService, OpenAiClient};
pub use config::{Config, FileConfig, RepoSlug};
pub use cycle::{CycleOptions, FileOutcome, NightCycle, RunSummary};
pub use github::{GitHubClient, HostingService};
pub use rate_limit::{MinIntervalGate, RateLimiter};
