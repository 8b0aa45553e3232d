use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use waymark_core::{
    ActivityLog, Marker, MarkerCategory, MarkerImage, MarkerReview, MarkerTag, SavedRoute, User,
};

use crate::{ActivityRepository, CatalogRepository, RouteRepository, UserRepository};

/// Sqlite-backed store. Uuids and timestamps are stored as TEXT (RFC 3339 for
/// the latter); rows written by older builds decode leniently rather than
/// failing the whole read.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn uuid_col(row: &SqliteRow, name: &str) -> Uuid {
    Uuid::parse_str(row.get::<String, _>(name).as_str()).unwrap_or_default()
}

fn opt_uuid_col(row: &SqliteRow, name: &str) -> Option<Uuid> {
    row.get::<Option<String>, _>(name)
        .and_then(|value| Uuid::parse_str(&value).ok())
}

fn time_col(row: &SqliteRow, name: &str) -> DateTime<Utc> {
    row.get::<String, _>(name)
        .parse()
        .unwrap_or_else(|_| Utc::now())
}

fn opt_time_col(row: &SqliteRow, name: &str) -> Option<DateTime<Utc>> {
    row.get::<Option<String>, _>(name)
        .and_then(|value| value.parse().ok())
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: uuid_col(row, "id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        whatsapp: row.get("whatsapp"),
        last_active_at: opt_time_col(row, "last_active_at"),
        created_at: time_col(row, "created_at"),
        updated_at: time_col(row, "updated_at"),
        deleted_at: opt_time_col(row, "deleted_at"),
    }
}

fn marker_from_row(row: &SqliteRow) -> Marker {
    Marker {
        id: uuid_col(row, "id"),
        name: row.get("name"),
        description: row.get("description"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        category_id: uuid_col(row, "category_id"),
        avg_rating: row.get("avg_rating"),
        total_reviews: row.get("total_reviews"),
        view_count: row.get("view_count"),
        added_by_user_id: uuid_col(row, "added_by_user_id"),
        created_at: time_col(row, "created_at"),
        updated_at: time_col(row, "updated_at"),
        deleted_at: opt_time_col(row, "deleted_at"),
        tags: Vec::new(),
        images: Vec::new(),
    }
}

fn category_from_row(row: &SqliteRow) -> MarkerCategory {
    MarkerCategory {
        id: uuid_col(row, "id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: time_col(row, "created_at"),
        updated_at: time_col(row, "updated_at"),
        deleted_at: opt_time_col(row, "deleted_at"),
    }
}

fn tag_from_row(row: &SqliteRow) -> MarkerTag {
    MarkerTag {
        id: uuid_col(row, "id"),
        name: row.get("name"),
        created_at: time_col(row, "created_at"),
        updated_at: time_col(row, "updated_at"),
        deleted_at: opt_time_col(row, "deleted_at"),
    }
}

fn review_from_row(row: &SqliteRow) -> MarkerReview {
    MarkerReview {
        id: uuid_col(row, "id"),
        marker_id: uuid_col(row, "marker_id"),
        user_id: uuid_col(row, "user_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: time_col(row, "created_at"),
        updated_at: time_col(row, "updated_at"),
        deleted_at: opt_time_col(row, "deleted_at"),
    }
}

fn route_from_row(row: &SqliteRow) -> SavedRoute {
    let route_data: String = row.get("route_data");
    SavedRoute {
        id: uuid_col(row, "id"),
        name: row.get("name"),
        origin_text: row.get("origin_text"),
        destination_text: row.get("destination_text"),
        origin_lat: row.get("origin_lat"),
        origin_lng: row.get("origin_lng"),
        destination_lat: row.get("destination_lat"),
        destination_lng: row.get("destination_lng"),
        route_data: serde_json::from_str(&route_data).unwrap_or_default(),
        distance_meters: row.get("distance_meters"),
        duration_seconds: row.get("duration_seconds"),
        user_id: uuid_col(row, "user_id"),
        is_public: row.get::<i64, _>("is_public") != 0,
        created_at: time_col(row, "created_at"),
        updated_at: time_col(row, "updated_at"),
        deleted_at: opt_time_col(row, "deleted_at"),
    }
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
              id TEXT PRIMARY KEY,
              username TEXT NOT NULL UNIQUE,
              email TEXT NOT NULL UNIQUE,
              password_hash TEXT NOT NULL,
              role TEXT NOT NULL,
              whatsapp TEXT,
              last_active_at TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS marker_categories (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              description TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS marker_tags (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS markers (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              description TEXT,
              latitude REAL NOT NULL,
              longitude REAL NOT NULL,
              category_id TEXT NOT NULL,
              avg_rating REAL NOT NULL DEFAULT 0,
              total_reviews INTEGER NOT NULL DEFAULT 0,
              view_count INTEGER NOT NULL DEFAULT 0,
              added_by_user_id TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS marker_has_tags (
              marker_id TEXT NOT NULL,
              tag_id TEXT NOT NULL,
              PRIMARY KEY (marker_id, tag_id)
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS marker_images (
              id TEXT PRIMARY KEY,
              marker_id TEXT NOT NULL,
              image_url TEXT NOT NULL,
              description TEXT,
              uploaded_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS marker_reviews (
              id TEXT PRIMARY KEY,
              marker_id TEXT NOT NULL,
              user_id TEXT NOT NULL,
              rating INTEGER NOT NULL,
              comment TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS routes (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              origin_text TEXT NOT NULL,
              destination_text TEXT NOT NULL,
              origin_lat REAL NOT NULL,
              origin_lng REAL NOT NULL,
              destination_lat REAL NOT NULL,
              destination_lng REAL NOT NULL,
              route_data TEXT NOT NULL,
              distance_meters INTEGER NOT NULL,
              duration_seconds INTEGER NOT NULL,
              user_id TEXT NOT NULL,
              is_public INTEGER NOT NULL DEFAULT 0,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              deleted_at TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_activity_logs (
              id TEXT PRIMARY KEY,
              user_id TEXT NOT NULL,
              activity_type TEXT NOT NULL,
              target_id TEXT,
              activity_data TEXT NOT NULL,
              timestamp TEXT NOT NULL
            );
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }
}

impl UserRepository for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users
              (id, username, email, password_hash, role, whatsapp,
               last_active_at, created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.whatsapp)
        .bind(user.last_active_at.map(|at| at.to_rfc3339()))
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .bind(user.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1 AND deleted_at IS NULL")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1 AND deleted_at IS NULL")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1 AND deleted_at IS NULL")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn touch_last_active(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_active_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl CatalogRepository for SqliteStore {
    async fn list_markers(&self) -> Result<Vec<Marker>> {
        let rows = sqlx::query("SELECT * FROM markers WHERE deleted_at IS NULL ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(marker_from_row).collect())
    }

    async fn find_marker(&self, id: Uuid) -> Result<Option<Marker>> {
        let row = sqlx::query("SELECT * FROM markers WHERE id = ?1 AND deleted_at IS NULL")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut marker = marker_from_row(&row);

        let tag_rows = sqlx::query(
            r#"
            SELECT t.* FROM marker_tags t
            JOIN marker_has_tags mht ON mht.tag_id = t.id
            WHERE mht.marker_id = ?1 AND t.deleted_at IS NULL
            ORDER BY t.name
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        marker.tags = tag_rows.iter().map(tag_from_row).collect();

        let image_rows = sqlx::query(
            r#"
            SELECT * FROM marker_images
            WHERE marker_id = ?1 AND deleted_at IS NULL
            ORDER BY uploaded_at
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        marker.images = image_rows
            .iter()
            .map(|row| MarkerImage {
                id: uuid_col(row, "id"),
                marker_id: uuid_col(row, "marker_id"),
                image_url: row.get("image_url"),
                description: row.get("description"),
                uploaded_at: time_col(row, "uploaded_at"),
                deleted_at: opt_time_col(row, "deleted_at"),
            })
            .collect();

        Ok(Some(marker))
    }

    async fn create_marker(&self, marker: &Marker) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO markers
              (id, name, description, latitude, longitude, category_id,
               avg_rating, total_reviews, view_count, added_by_user_id,
               created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(marker.id.to_string())
        .bind(&marker.name)
        .bind(&marker.description)
        .bind(marker.latitude)
        .bind(marker.longitude)
        .bind(marker.category_id.to_string())
        .bind(marker.avg_rating)
        .bind(marker.total_reviews)
        .bind(marker.view_count)
        .bind(marker.added_by_user_id.to_string())
        .bind(marker.created_at.to_rfc3339())
        .bind(marker.updated_at.to_rfc3339())
        .bind(marker.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_marker(&self, marker: &Marker) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE markers SET
              name = ?2, description = ?3, latitude = ?4, longitude = ?5,
              category_id = ?6, updated_at = ?7
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(marker.id.to_string())
        .bind(&marker.name)
        .bind(&marker.description)
        .bind(marker.latitude)
        .bind(marker.longitude)
        .bind(marker.category_id.to_string())
        .bind(marker.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soft_delete_marker(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE markers SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE markers SET view_count = view_count + 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_marker_tags(&self, marker_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        sqlx::query("DELETE FROM marker_has_tags WHERE marker_id = ?1")
            .bind(marker_id.to_string())
            .execute(&self.pool)
            .await?;

        for tag_id in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO marker_has_tags (marker_id, tag_id) VALUES (?1, ?2)")
                .bind(marker_id.to_string())
                .bind(tag_id.to_string())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn add_marker_image(&self, image: &MarkerImage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marker_images
              (id, marker_id, image_url, description, uploaded_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(image.id.to_string())
        .bind(image.marker_id.to_string())
        .bind(&image.image_url)
        .bind(&image.description)
        .bind(image.uploaded_at.to_rfc3339())
        .bind(image.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<MarkerCategory>> {
        let rows =
            sqlx::query("SELECT * FROM marker_categories WHERE deleted_at IS NULL ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<MarkerCategory>> {
        let row =
            sqlx::query("SELECT * FROM marker_categories WHERE id = ?1 AND deleted_at IS NULL")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.as_ref().map(category_from_row))
    }

    async fn create_category(&self, category: &MarkerCategory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marker_categories
              (id, name, description, created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at.to_rfc3339())
        .bind(category.updated_at.to_rfc3339())
        .bind(category.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_category(&self, category: &MarkerCategory) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE marker_categories SET name = ?2, description = ?3, updated_at = ?4
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soft_delete_category(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE marker_categories SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_tags(&self) -> Result<Vec<MarkerTag>> {
        let rows = sqlx::query("SELECT * FROM marker_tags WHERE deleted_at IS NULL ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn find_tag(&self, id: Uuid) -> Result<Option<MarkerTag>> {
        let row = sqlx::query("SELECT * FROM marker_tags WHERE id = ?1 AND deleted_at IS NULL")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(tag_from_row))
    }

    async fn create_tag(&self, tag: &MarkerTag) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marker_tags (id, name, created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(tag.id.to_string())
        .bind(&tag.name)
        .bind(tag.created_at.to_rfc3339())
        .bind(tag.updated_at.to_rfc3339())
        .bind(tag.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_tag(&self, tag: &MarkerTag) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE marker_tags SET name = ?2, updated_at = ?3
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(tag.id.to_string())
        .bind(&tag.name)
        .bind(tag.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soft_delete_tag(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE marker_tags SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_reviews(&self, marker_id: Uuid) -> Result<Vec<MarkerReview>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM marker_reviews
            WHERE marker_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(marker_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(review_from_row).collect())
    }

    async fn add_review(&self, review: &MarkerReview) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marker_reviews
              (id, marker_id, user_id, rating, comment, created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(review.id.to_string())
        .bind(review.marker_id.to_string())
        .bind(review.user_id.to_string())
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at.to_rfc3339())
        .bind(review.updated_at.to_rfc3339())
        .bind(review.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            UPDATE markers SET
              avg_rating = COALESCE(
                (SELECT AVG(rating) FROM marker_reviews
                 WHERE marker_id = ?1 AND deleted_at IS NULL), 0),
              total_reviews =
                (SELECT COUNT(*) FROM marker_reviews
                 WHERE marker_id = ?1 AND deleted_at IS NULL)
            WHERE id = ?1
            "#,
        )
        .bind(review.marker_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl RouteRepository for SqliteStore {
    async fn save_route(&self, route: &SavedRoute) -> Result<()> {
        let route_data = serde_json::to_string(&route.route_data)?;

        sqlx::query(
            r#"
            INSERT INTO routes
              (id, name, origin_text, destination_text,
               origin_lat, origin_lng, destination_lat, destination_lng,
               route_data, distance_meters, duration_seconds,
               user_id, is_public, created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(route.id.to_string())
        .bind(&route.name)
        .bind(&route.origin_text)
        .bind(&route.destination_text)
        .bind(route.origin_lat)
        .bind(route.origin_lng)
        .bind(route.destination_lat)
        .bind(route.destination_lng)
        .bind(route_data)
        .bind(route.distance_meters)
        .bind(route.duration_seconds)
        .bind(route.user_id.to_string())
        .bind(i64::from(route.is_public))
        .bind(route.created_at.to_rfc3339())
        .bind(route.updated_at.to_rfc3339())
        .bind(route.deleted_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_routes_for_user(&self, user_id: Uuid) -> Result<Vec<SavedRoute>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM routes
            WHERE user_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(route_from_row).collect())
    }

    async fn list_public_routes(&self) -> Result<Vec<SavedRoute>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM routes
            WHERE is_public = 1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(route_from_row).collect())
    }
}

impl ActivityRepository for SqliteStore {
    async fn record_activity(&self, entry: &ActivityLog) -> Result<()> {
        let activity_data = serde_json::to_string(&entry.activity_data)?;

        sqlx::query(
            r#"
            INSERT INTO user_activity_logs
              (id, user_id, activity_type, target_id, activity_data, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.to_string())
        .bind(&entry.activity_type)
        .bind(entry.target_id.map(|id| id.to_string()))
        .bind(activity_data)
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityLog>> {
        let rows = sqlx::query(
            "SELECT * FROM user_activity_logs ORDER BY timestamp DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| {
                let activity_data: String = row.get("activity_data");
                ActivityLog {
                    id: uuid_col(row, "id"),
                    user_id: uuid_col(row, "user_id"),
                    activity_type: row.get("activity_type"),
                    target_id: opt_uuid_col(row, "target_id"),
                    activity_data: serde_json::from_str(&activity_data).unwrap_or_default(),
                    timestamp: time_col(row, "timestamp"),
                }
            })
            .collect();

        Ok(entries)
    }
}
