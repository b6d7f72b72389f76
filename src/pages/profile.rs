use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lines_common::{DashboardStats, FavoritesStats, UserProfile};

use super::PageContext;
use super::notifications::unread_count_query;
use crate::errors::ApiError;
use crate::query::{QueryDescriptor, QueryKey};
use crate::services::UsersService;
use crate::services::users::ProfileUpdate;
use crate::session::AuthProvider;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProfileTab {
    #[default]
    Dashboard,
    Profile,
    History,
    Favorites,
}

impl ProfileTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Profile => "profile",
            Self::History => "history",
            Self::Favorites => "favorites",
        }
    }
}

impl fmt::Display for ProfileTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dashboard" => Ok(Self::Dashboard),
            "profile" => Ok(Self::Profile),
            "history" => Ok(Self::History),
            "favorites" => Ok(Self::Favorites),
            _ => Err(format!("Unknown profile tab: {}", s)),
        }
    }
}

/// The signed-in user's profile area: dashboard counters, favorites stats
/// and the unread badge, plus profile editing.
pub struct ProfilePage {
    ctx: PageContext,
    users: UsersService,
    auth: Arc<AuthProvider>,
    tab: ProfileTab,
}

impl ProfilePage {
    pub fn new(ctx: PageContext, auth: Arc<AuthProvider>) -> Self {
        Self {
            users: UsersService::new(ctx.http.clone()),
            ctx,
            auth,
            tab: ProfileTab::default(),
        }
    }

    pub fn tab(&self) -> ProfileTab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: ProfileTab) {
        self.tab = tab;
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.auth.session().user()
    }

    pub fn dashboard_query(&self) -> QueryDescriptor<DashboardStats> {
        let users = self.users.clone();
        QueryDescriptor::new(
            QueryKey::new("user-dashboard"),
            self.ctx.stale_time("user-dashboard"),
            move || {
                let users = users.clone();
                async move { users.get_dashboard().await }
            },
        )
    }

    pub fn favorites_stats_query(&self) -> QueryDescriptor<FavoritesStats> {
        let users = self.users.clone();
        QueryDescriptor::new(
            QueryKey::new("favorites-stats"),
            self.ctx.stale_time("favorites-stats"),
            move || {
                let users = users.clone();
                async move { users.favorites_stats().await }
            },
        )
    }

    pub async fn dashboard(&self) -> Result<Arc<DashboardStats>, ApiError> {
        self.ctx.cache.fetch(&self.dashboard_query()).await
    }

    pub async fn favorites_stats(&self) -> Result<Arc<FavoritesStats>, ApiError> {
        self.ctx.cache.fetch(&self.favorites_stats_query()).await
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        Ok(*self
            .ctx
            .cache
            .fetch(&unread_count_query(&self.ctx, &self.users))
            .await?)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.auth.update_profile(update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_parses_its_own_name() {
        for tab in [
            ProfileTab::Dashboard,
            ProfileTab::Profile,
            ProfileTab::History,
            ProfileTab::Favorites,
        ] {
            assert_eq!(tab.as_str().parse::<ProfileTab>().unwrap(), tab);
        }
        assert!("settings".parse::<ProfileTab>().is_err());
    }
}
