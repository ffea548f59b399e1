//! Initial data for fresh deployments

use color_eyre::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::model::activities::NewActivity;
use crate::model::users::{NewUser, Role, User};

/// `(name, city, description, price)` of seeded activities, alternately owned by the seeded users
const ACTIVITIES: &[(&str, &str, &str, i32)] = &[
    ("Surf", "Biarritz", "Learn to ride the Atlantic waves with a local instructor", 45),
    ("Pelota", "Biarritz", "Discover the traditional Basque ball game", 20),
    ("Indoor Climbing", "Lyon", "Bouldering and top rope session for all levels", 18),
    ("Kayak", "Lyon", "Paddle down the Rhone at sunset", 35),
    ("Paragliding", "Annecy", "Tandem flight above the lake", 110),
    ("Canyoning", "Annecy", "Jump, slide and swim through the gorges", 60),
    ("Sailing", "Marseille", "Half day cruise to the Calanques", 75),
    ("Diving", "Marseille", "First dive with a certified instructor", 65),
];

/// Creates demo users and activities if there are no users yet
///
/// Returns whether anything was created.
pub async fn seed(db: &SqlitePool) -> Result<bool> {
    if User::count(db).await? > 0 {
        info!("Database already populated, skipping seeding");
        return Ok(false);
    }

    let owners = [
        NewUser::new("user1@test.fr", "user1", "John", "Doe")
            .create(db)
            .await?,
        NewUser::new("admin@test.fr", "admin", "Jane", "Doe")
            .with_role(Role::Admin)
            .create(db)
            .await?,
    ];

    for (idx, (name, city, description, price)) in ACTIVITIES.iter().enumerate() {
        let owner = &owners[idx % owners.len()];
        NewActivity::new(*name, *city, *description, *price)
            .create(db, owner.id)
            .await?;
    }

    info!(
        users = owners.len(),
        activities = ACTIVITIES.len(),
        "Database seeded"
    );
    Ok(true)
}
