use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use waymark_core::{
    ActivityLog, Marker, MarkerCategory, MarkerImage, MarkerReview, MarkerTag, SavedRoute, User,
};

use crate::{ActivityRepository, CatalogRepository, RouteRepository, UserRepository};

/// In-process store backing tests and local development. Markers are held
/// without their relations; `find_marker` joins tags and images on read, the
/// same shape the sqlite store produces.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    markers: Arc<RwLock<HashMap<Uuid, Marker>>>,
    categories: Arc<RwLock<HashMap<Uuid, MarkerCategory>>>,
    tags: Arc<RwLock<HashMap<Uuid, MarkerTag>>>,
    marker_tags: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
    images: Arc<RwLock<HashMap<Uuid, Vec<MarkerImage>>>>,
    reviews: Arc<RwLock<HashMap<Uuid, Vec<MarkerReview>>>>,
    routes: Arc<RwLock<HashMap<Uuid, SavedRoute>>>,
    activity: Arc<RwLock<Vec<ActivityLog>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn bare(marker: &Marker) -> Marker {
    Marker {
        tags: Vec::new(),
        images: Vec::new(),
        ..marker.clone()
    }
}

impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        self.users.write().insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.username == username && user.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.email == email && user.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .get(&id)
            .filter(|user| user.deleted_at.is_none())
            .cloned())
    }

    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(user) = self.users.write().get_mut(&id) {
            user.last_active_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }
}

impl CatalogRepository for MemoryStore {
    async fn list_markers(&self) -> Result<Vec<Marker>> {
        let mut markers: Vec<Marker> = self
            .markers
            .read()
            .values()
            .filter(|marker| marker.deleted_at.is_none())
            .map(bare)
            .collect();
        markers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(markers)
    }

    async fn find_marker(&self, id: Uuid) -> Result<Option<Marker>> {
        let Some(mut marker) = self
            .markers
            .read()
            .get(&id)
            .filter(|marker| marker.deleted_at.is_none())
            .map(bare)
        else {
            return Ok(None);
        };

        let tags = self.tags.read();
        marker.tags = self
            .marker_tags
            .read()
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|tag_id| tags.get(tag_id))
            .filter(|tag| tag.deleted_at.is_none())
            .cloned()
            .collect();

        marker.images = self
            .images
            .read()
            .get(&id)
            .into_iter()
            .flatten()
            .filter(|image| image.deleted_at.is_none())
            .cloned()
            .collect();

        Ok(Some(marker))
    }

    async fn create_marker(&self, marker: &Marker) -> Result<()> {
        self.markers.write().insert(marker.id, bare(marker));
        Ok(())
    }

    async fn update_marker(&self, marker: &Marker) -> Result<()> {
        self.markers.write().insert(marker.id, bare(marker));
        Ok(())
    }

    async fn soft_delete_marker(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut markers = self.markers.write();
        match markers.get_mut(&id).filter(|m| m.deleted_at.is_none()) {
            Some(marker) => {
                marker.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<()> {
        if let Some(marker) = self.markers.write().get_mut(&id) {
            marker.view_count += 1;
        }
        Ok(())
    }

    async fn set_marker_tags(&self, marker_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        self.marker_tags.write().insert(marker_id, tag_ids.to_vec());
        Ok(())
    }

    async fn add_marker_image(&self, image: &MarkerImage) -> Result<()> {
        self.images
            .write()
            .entry(image.marker_id)
            .or_default()
            .push(image.clone());
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<MarkerCategory>> {
        let mut categories: Vec<MarkerCategory> = self
            .categories
            .read()
            .values()
            .filter(|category| category.deleted_at.is_none())
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<MarkerCategory>> {
        Ok(self
            .categories
            .read()
            .get(&id)
            .filter(|category| category.deleted_at.is_none())
            .cloned())
    }

    async fn create_category(&self, category: &MarkerCategory) -> Result<()> {
        self.categories.write().insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &MarkerCategory) -> Result<()> {
        self.categories.write().insert(category.id, category.clone());
        Ok(())
    }

    async fn soft_delete_category(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut categories = self.categories.write();
        match categories.get_mut(&id).filter(|c| c.deleted_at.is_none()) {
            Some(category) => {
                category.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_tags(&self) -> Result<Vec<MarkerTag>> {
        let mut tags: Vec<MarkerTag> = self
            .tags
            .read()
            .values()
            .filter(|tag| tag.deleted_at.is_none())
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_tag(&self, id: Uuid) -> Result<Option<MarkerTag>> {
        Ok(self
            .tags
            .read()
            .get(&id)
            .filter(|tag| tag.deleted_at.is_none())
            .cloned())
    }

    async fn create_tag(&self, tag: &MarkerTag) -> Result<()> {
        self.tags.write().insert(tag.id, tag.clone());
        Ok(())
    }

    async fn update_tag(&self, tag: &MarkerTag) -> Result<()> {
        self.tags.write().insert(tag.id, tag.clone());
        Ok(())
    }

    async fn soft_delete_tag(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut tags = self.tags.write();
        match tags.get_mut(&id).filter(|t| t.deleted_at.is_none()) {
            Some(tag) => {
                tag.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_reviews(&self, marker_id: Uuid) -> Result<Vec<MarkerReview>> {
        let mut reviews: Vec<MarkerReview> = self
            .reviews
            .read()
            .get(&marker_id)
            .into_iter()
            .flatten()
            .filter(|review| review.deleted_at.is_none())
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn add_review(&self, review: &MarkerReview) -> Result<()> {
        let (total, sum) = {
            let mut reviews = self.reviews.write();
            let entries = reviews.entry(review.marker_id).or_default();
            entries.push(review.clone());

            let live: Vec<&MarkerReview> = entries
                .iter()
                .filter(|r| r.deleted_at.is_none())
                .collect();
            let sum: i64 = live.iter().map(|r| i64::from(r.rating)).sum();
            (live.len() as i64, sum)
        };

        if let Some(marker) = self.markers.write().get_mut(&review.marker_id) {
            marker.total_reviews = total;
            marker.avg_rating = if total == 0 {
                0.0
            } else {
                sum as f64 / total as f64
            };
        }

        Ok(())
    }
}

impl RouteRepository for MemoryStore {
    async fn save_route(&self, route: &SavedRoute) -> Result<()> {
        self.routes.write().insert(route.id, route.clone());
        Ok(())
    }

    async fn list_routes_for_user(&self, user_id: Uuid) -> Result<Vec<SavedRoute>> {
        let mut routes: Vec<SavedRoute> = self
            .routes
            .read()
            .values()
            .filter(|route| route.user_id == user_id && route.deleted_at.is_none())
            .cloned()
            .collect();
        routes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(routes)
    }

    async fn list_public_routes(&self) -> Result<Vec<SavedRoute>> {
        let mut routes: Vec<SavedRoute> = self
            .routes
            .read()
            .values()
            .filter(|route| route.is_public && route.deleted_at.is_none())
            .cloned()
            .collect();
        routes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(routes)
    }
}

impl ActivityRepository for MemoryStore {
    async fn record_activity(&self, entry: &ActivityLog) -> Result<()> {
        self.activity.write().push(entry.clone());
        Ok(())
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityLog>> {
        let activity = self.activity.read();
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(activity.iter().rev().take(take).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn sample_marker(category_id: Uuid, user_id: Uuid) -> Marker {
        let now = Utc::now();
        Marker {
            id: Uuid::new_v4(),
            name: "Tangkuban Perahu".to_string(),
            description: Some("Volcano north of Bandung".to_string()),
            latitude: -6.7596,
            longitude: 107.6098,
            category_id,
            avg_rating: 0.0,
            total_reviews: 0,
            view_count: 0,
            added_by_user_id: user_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            tags: Vec::new(),
            images: Vec::new(),
        }
    }

    fn sample_review(marker_id: Uuid, rating: i32) -> MarkerReview {
        let now = Utc::now();
        MarkerReview {
            id: Uuid::new_v4(),
            marker_id,
            user_id: Uuid::new_v4(),
            rating,
            comment: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn soft_deleted_markers_disappear_from_reads() {
        let store = MemoryStore::new();
        let marker = sample_marker(Uuid::new_v4(), Uuid::new_v4());
        store.create_marker(&marker).await.unwrap();

        assert!(store.soft_delete_marker(marker.id, Utc::now()).await.unwrap());
        assert!(store.list_markers().await.unwrap().is_empty());
        assert!(store.find_marker(marker.id).await.unwrap().is_none());

        // A second delete of the same marker reports nothing to delete.
        assert!(!store.soft_delete_marker(marker.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn reviews_update_marker_aggregates() {
        let store = MemoryStore::new();
        let marker = sample_marker(Uuid::new_v4(), Uuid::new_v4());
        store.create_marker(&marker).await.unwrap();

        store.add_review(&sample_review(marker.id, 5)).await.unwrap();
        store.add_review(&sample_review(marker.id, 4)).await.unwrap();

        let found = store.find_marker(marker.id).await.unwrap().unwrap();
        assert_eq!(found.total_reviews, 2);
        assert!((found.avg_rating - 4.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn find_marker_hydrates_live_tags_only() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let keep = MarkerTag {
            id: Uuid::new_v4(),
            name: "Hiking".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let gone = MarkerTag {
            id: Uuid::new_v4(),
            name: "Snorkeling".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        store.create_tag(&keep).await.unwrap();
        store.create_tag(&gone).await.unwrap();

        let marker = sample_marker(Uuid::new_v4(), Uuid::new_v4());
        store.create_marker(&marker).await.unwrap();
        store
            .set_marker_tags(marker.id, &[keep.id, gone.id])
            .await
            .unwrap();
        store.soft_delete_tag(gone.id, Utc::now()).await.unwrap();

        let found = store.find_marker(marker.id).await.unwrap().unwrap();
        assert_eq!(found.tags.len(), 1);
        assert_eq!(found.tags[0].name, "Hiking");
    }

    #[tokio::test]
    async fn public_route_listing_excludes_private_routes() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let now = Utc::now();
        for (name, is_public) in [("commute", false), ("weekend loop", true)] {
            store
                .save_route(&SavedRoute {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    origin_text: "Bekasi".to_string(),
                    destination_text: "Bandung".to_string(),
                    origin_lat: -6.23,
                    origin_lng: 106.97,
                    destination_lat: -6.91,
                    destination_lng: 107.61,
                    route_data: Value::Object(Default::default()),
                    distance_meters: 147573,
                    duration_seconds: 9882,
                    user_id: owner,
                    is_public,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                })
                .await
                .unwrap();
        }

        let public = store.list_public_routes().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name, "weekend loop");

        assert_eq!(store.list_routes_for_user(owner).await.unwrap().len(), 2);
    }
}
