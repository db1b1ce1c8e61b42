//! Creates the default admin and user accounts when they are missing.

use usermanager::{
    auth::password::hash_password_blocking,
    store::{NewUser, StoreError, UserStore},
    users::model::Role,
    AppState,
};

struct SeedUser {
    email: &'static str,
    password: &'static str,
    name: &'static str,
    role: Role,
}

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        email: "admin@test.com",
        password: "admin123",
        name: "Admin User",
        role: Role::Admin,
    },
    SeedUser {
        email: "user@test.com",
        password: "user1234",
        name: "Regular User",
        role: Role::User,
    },
];

async fn seed(store: &dyn UserStore) -> anyhow::Result<()> {
    for seed in SEED_USERS {
        if store.find_by_email(seed.email).await?.is_some() {
            tracing::info!(email = seed.email, "already present, skipping");
            continue;
        }
        let password_hash = hash_password_blocking(seed.password.to_string()).await?;
        match store
            .create(NewUser {
                email: seed.email.to_string(),
                password_hash,
                name: seed.name.to_string(),
                role: seed.role,
                is_active: true,
            })
            .await
        {
            Ok(user) => tracing::info!(user_id = %user.id, email = seed.email, role = %seed.role, "seeded"),
            Err(StoreError::Duplicate) => tracing::info!(email = seed.email, "created concurrently, skipping"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let state = AppState::init().await?;
    seed(state.store.as_ref()).await?;
    tracing::info!("database seeded");
    Ok(())
}
