//! Business logic for users and posts.
//!
//! Handlers receive a request that already passed authentication,
//! authorization, defaulting and validation, together with the
//! [`RequestContext`](crate::context::RequestContext) of the call.

pub mod password;
mod post;
mod user;

use blog_core::JwtValidator;
use blog_proto::v1::HealthzResponse;
use blog_store::Store;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::aggregate::ListAggregator;

pub use post::PostBiz;
pub use user::{PostCountEnricher, UserBiz};

/// Username of the bootstrap administrator.
pub const ROOT_USERNAME: &str = "root";
/// Fixed id of the bootstrap administrator.
pub const ROOT_USER_ID: &str = "user-000000";

/// Role every registered user is bound to.
pub const ROLE_USER: &str = "role::user";
pub const ROLE_ADMIN: &str = "role::admin";

/// Business layer entry point.
#[derive(Debug, Clone)]
pub struct Biz {
    users: UserBiz,
    posts: PostBiz,
}

impl Biz {
    #[must_use]
    pub fn new(store: Store, tokens: JwtValidator, aggregator: ListAggregator) -> Self {
        Self {
            users: UserBiz::new(store.clone(), tokens, aggregator),
            posts: PostBiz::new(store),
        }
    }

    #[inline]
    #[must_use]
    pub const fn users(&self) -> &UserBiz {
        &self.users
    }

    #[inline]
    #[must_use]
    pub const fn posts(&self) -> &PostBiz {
        &self.posts
    }

    #[must_use]
    pub fn healthz(&self) -> HealthzResponse {
        HealthzResponse {
            status: "Healthy".to_string(),
            timestamp: timestamp(Utc::now()),
            message: String::new(),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T08:30:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2024-05-01T06:30:00Z");
    }
}
