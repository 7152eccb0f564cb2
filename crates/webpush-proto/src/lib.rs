//! Web Push message types: subscriptions, VAPID token inspection and
//! request assembly.

pub mod error;
pub mod jwt;
pub mod request;
pub mod subscription;

pub use error::ProtoError;
pub use request::{PushRequest, PushRequestBuilder};
pub use subscription::Subscription;
