use std::str::FromStr;

use autocompany_api::{
    db::{create_orm_conn, run_migrations},
    entity::{
        products::{self, Column as ProductCol, Entity as Products},
        users::{self, Column as UserCol, Entity as Users},
    },
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Only the database is needed here; skip the full AppConfig so the
    // binary runs without JWT_SECRET.
    let database_url = std::env::var("DATABASE_URL")?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin").await?;
    let user_id = ensure_user(&orm, "user@example.com", "user").await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(orm: &DatabaseConnection, email: &str, role: &str) -> anyhow::Result<Uuid> {
    let existing = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?;

    let user_id = match existing {
        Some(user) => user.id,
        None => {
            let user = users::ActiveModel {
                id: Set(Uuid::new_v4()),
                email: Set(email.to_string()),
                role: Set(role.to_string()),
                created_at: NotSet,
            }
            .insert(orm)
            .await?;
            user.id
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let items = vec![
        ("Engine Oil 5W-30", "Synthetic engine oil, 4L", "39.99", 120),
        ("Brake Pad Set", "Front axle brake pads", "54.50", 60),
        ("Wiper Blades", "All-season wiper blade pair", "18.75", 200),
        ("Car Battery 60Ah", "Maintenance-free battery", "109.00", 35),
    ];

    for (name, description, price, stock_quantity) in items {
        let exists = Products::find()
            .filter(ProductCol::Name.eq(name))
            .one(orm)
            .await?;
        if exists.is_some() {
            continue;
        }

        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price: Set(Decimal::from_str(price)?),
            stock_quantity: Set(stock_quantity),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
