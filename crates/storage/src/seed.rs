use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use waymark_core::{MarkerCategory, MarkerTag, User, ROLE_ADMIN, ROLE_USER};

use crate::{CatalogRepository, UserRepository};

const CATEGORIES: [&str; 6] = [
    "Restaurant",
    "Wisata Alam",
    "Sejarah & Budaya",
    "Akomodasi",
    "Transportasi",
    "Hiburan",
];

const TAGS: [&str; 8] = [
    "Family-Friendly",
    "Pet-Friendly",
    "Sunset-View",
    "Live Music",
    "Hiking",
    "Snorkeling",
    "Budget-Friendly",
    "Luxury",
];

/// Seeds the default accounts, categories and tags. Safe to run on every
/// startup; rows that already exist are left alone.
pub async fn run_all<S>(store: &S) -> Result<()>
where
    S: UserRepository + CatalogRepository,
{
    seed_user(store, "superadmin", "superadmin@waymark.local", "adminpassword", ROLE_ADMIN, None)
        .await?;
    seed_user(
        store,
        "raffa",
        "raffa@waymark.local",
        "userpassword",
        ROLE_USER,
        Some("6281220544440"),
    )
    .await?;

    let existing: Vec<String> = store
        .list_categories()
        .await?
        .into_iter()
        .map(|category| category.name)
        .collect();
    for name in CATEGORIES {
        if existing.iter().any(|have| have == name) {
            continue;
        }
        let now = Utc::now();
        store
            .create_category(&MarkerCategory {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: None,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .await?;
    }

    let existing: Vec<String> = store
        .list_tags()
        .await?
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    for name in TAGS {
        if existing.iter().any(|have| have == name) {
            continue;
        }
        let now = Utc::now();
        store
            .create_tag(&MarkerTag {
                id: Uuid::new_v4(),
                name: name.to_string(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .await?;
    }

    info!("seed data ensured");
    Ok(())
}

async fn seed_user<S>(
    store: &S,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
    whatsapp: Option<&str>,
) -> Result<()>
where
    S: UserRepository,
{
    if store.find_user_by_username(username).await?.is_some() {
        return Ok(());
    }

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .with_context(|| format!("failed hashing seed password for {}", username))?;

    let now = Utc::now();
    store
        .create_user(&User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: role.to_string(),
            whatsapp: whatsapp.map(str::to_string),
            last_active_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .await?;

    info!(username, role, "seeded account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn seeding_twice_does_not_duplicate() {
        let store = MemoryStore::new();
        run_all(&store).await.unwrap();
        run_all(&store).await.unwrap();

        assert_eq!(store.list_categories().await.unwrap().len(), 6);
        assert_eq!(store.list_tags().await.unwrap().len(), 8);

        let admin = store
            .find_user_by_username("superadmin")
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_admin());
        assert!(bcrypt::verify("adminpassword", &admin.password_hash).unwrap());
    }
}
