//! Application services sitting between the routes and the stores

pub mod accounts;
pub mod catalog;
pub mod notifier;
pub mod roadmap;

pub use accounts::{AccountError, AccountService, AuthSession, MIN_PASSWORD_LENGTH};
pub use catalog::{
    dashboard, item_views, parse_goal, search, CategoryView, Dashboard, ItemFilter, ItemView,
    SearchResult,
};
pub use notifier::{ConsoleNotifier, HttpMailer, Notifier, NotifyError};
pub use roadmap::{GeminiClient, ModelClient, ModelError, RoadmapError, RoadmapGenerator};
