mod memory;
pub mod seed;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use waymark_core::{
    ActivityLog, Marker, MarkerCategory, MarkerImage, MarkerReview, MarkerTag, SavedRoute, User,
};

pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Markers plus their categories, tags, images and reviews. Deletes are soft
/// throughout; every read filters rows whose `deleted_at` is set.
pub trait CatalogRepository: Send + Sync {
    /// List reads leave `tags` and `images` empty; only `find_marker` hydrates
    /// the relations.
    async fn list_markers(&self) -> Result<Vec<Marker>>;
    async fn find_marker(&self, id: Uuid) -> Result<Option<Marker>>;
    async fn create_marker(&self, marker: &Marker) -> Result<()>;
    async fn update_marker(&self, marker: &Marker) -> Result<()>;
    async fn soft_delete_marker(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;
    async fn increment_view_count(&self, id: Uuid) -> Result<()>;
    async fn set_marker_tags(&self, marker_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;
    async fn add_marker_image(&self, image: &MarkerImage) -> Result<()>;

    async fn list_categories(&self) -> Result<Vec<MarkerCategory>>;
    async fn find_category(&self, id: Uuid) -> Result<Option<MarkerCategory>>;
    async fn create_category(&self, category: &MarkerCategory) -> Result<()>;
    async fn update_category(&self, category: &MarkerCategory) -> Result<()>;
    async fn soft_delete_category(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    async fn list_tags(&self) -> Result<Vec<MarkerTag>>;
    async fn find_tag(&self, id: Uuid) -> Result<Option<MarkerTag>>;
    async fn create_tag(&self, tag: &MarkerTag) -> Result<()>;
    async fn update_tag(&self, tag: &MarkerTag) -> Result<()>;
    async fn soft_delete_tag(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    async fn list_reviews(&self, marker_id: Uuid) -> Result<Vec<MarkerReview>>;
    /// Inserts the review and recomputes the marker's `avg_rating` and
    /// `total_reviews` in the same call.
    async fn add_review(&self, review: &MarkerReview) -> Result<()>;
}

pub trait RouteRepository: Send + Sync {
    async fn save_route(&self, route: &SavedRoute) -> Result<()>;
    async fn list_routes_for_user(&self, user_id: Uuid) -> Result<Vec<SavedRoute>>;
    async fn list_public_routes(&self) -> Result<Vec<SavedRoute>>;
}

pub trait ActivityRepository: Send + Sync {
    async fn record_activity(&self, entry: &ActivityLog) -> Result<()>;
    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityLog>>;
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Store::Memory($store) => $call,
            Store::Sqlite($store) => $call,
        }
    };
}

impl UserRepository for Store {
    async fn create_user(&self, user: &User) -> Result<()> {
        dispatch!(self, store => store.create_user(user).await)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        dispatch!(self, store => store.find_user_by_username(username).await)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        dispatch!(self, store => store.find_user_by_email(email).await)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        dispatch!(self, store => store.find_user_by_id(id).await)
    }

    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        dispatch!(self, store => store.touch_last_active(id, at).await)
    }
}

impl CatalogRepository for Store {
    async fn list_markers(&self) -> Result<Vec<Marker>> {
        dispatch!(self, store => store.list_markers().await)
    }

    async fn find_marker(&self, id: Uuid) -> Result<Option<Marker>> {
        dispatch!(self, store => store.find_marker(id).await)
    }

    async fn create_marker(&self, marker: &Marker) -> Result<()> {
        dispatch!(self, store => store.create_marker(marker).await)
    }

    async fn update_marker(&self, marker: &Marker) -> Result<()> {
        dispatch!(self, store => store.update_marker(marker).await)
    }

    async fn soft_delete_marker(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        dispatch!(self, store => store.soft_delete_marker(id, at).await)
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<()> {
        dispatch!(self, store => store.increment_view_count(id).await)
    }

    async fn set_marker_tags(&self, marker_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        dispatch!(self, store => store.set_marker_tags(marker_id, tag_ids).await)
    }

    async fn add_marker_image(&self, image: &MarkerImage) -> Result<()> {
        dispatch!(self, store => store.add_marker_image(image).await)
    }

    async fn list_categories(&self) -> Result<Vec<MarkerCategory>> {
        dispatch!(self, store => store.list_categories().await)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<MarkerCategory>> {
        dispatch!(self, store => store.find_category(id).await)
    }

    async fn create_category(&self, category: &MarkerCategory) -> Result<()> {
        dispatch!(self, store => store.create_category(category).await)
    }

    async fn update_category(&self, category: &MarkerCategory) -> Result<()> {
        dispatch!(self, store => store.update_category(category).await)
    }

    async fn soft_delete_category(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        dispatch!(self, store => store.soft_delete_category(id, at).await)
    }

    async fn list_tags(&self) -> Result<Vec<MarkerTag>> {
        dispatch!(self, store => store.list_tags().await)
    }

    async fn find_tag(&self, id: Uuid) -> Result<Option<MarkerTag>> {
        dispatch!(self, store => store.find_tag(id).await)
    }

    async fn create_tag(&self, tag: &MarkerTag) -> Result<()> {
        dispatch!(self, store => store.create_tag(tag).await)
    }

    async fn update_tag(&self, tag: &MarkerTag) -> Result<()> {
        dispatch!(self, store => store.update_tag(tag).await)
    }

    async fn soft_delete_tag(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        dispatch!(self, store => store.soft_delete_tag(id, at).await)
    }

    async fn list_reviews(&self, marker_id: Uuid) -> Result<Vec<MarkerReview>> {
        dispatch!(self, store => store.list_reviews(marker_id).await)
    }

    async fn add_review(&self, review: &MarkerReview) -> Result<()> {
        dispatch!(self, store => store.add_review(review).await)
    }
}

impl RouteRepository for Store {
    async fn save_route(&self, route: &SavedRoute) -> Result<()> {
        dispatch!(self, store => store.save_route(route).await)
    }

    async fn list_routes_for_user(&self, user_id: Uuid) -> Result<Vec<SavedRoute>> {
        dispatch!(self, store => store.list_routes_for_user(user_id).await)
    }

    async fn list_public_routes(&self) -> Result<Vec<SavedRoute>> {
        dispatch!(self, store => store.list_public_routes().await)
    }
}

impl ActivityRepository for Store {
    async fn record_activity(&self, entry: &ActivityLog) -> Result<()> {
        dispatch!(self, store => store.record_activity(entry).await)
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityLog>> {
        dispatch!(self, store => store.recent_activity(limit).await)
    }
}
