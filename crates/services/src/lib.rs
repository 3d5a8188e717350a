//! # services
//!
//! Use-case layer of KitchenHelper. Each service borrows the ports it needs
//! as trait objects and never talks to a concrete adapter.
//!
//! Ordering rule shared by every service: the mutation is persisted first,
//! the notification is dispatched second. A failed write therefore never
//! produces a notification.

pub mod accounts;
pub mod lifecycle;
pub mod moderation;
pub mod notifications;
pub mod ratings;

pub use accounts::{AccountService, Registration};
pub use lifecycle::RecipeLifecycle;
pub use moderation::ModerationService;
pub use notifications::NotificationDispatcher;
pub use ratings::{RatingAggregator, RatingReceipt};
