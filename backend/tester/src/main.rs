use chrono::{Days, Utc};
use clap::Parser;
use redis::AsyncCommands;
use roster::{ActivityPeriod, Client, Product, RedisStore, Store};
use serde_json::json;
use uuid::Uuid;

/// Seed Redis with demo clients, products and staff sessions.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,
}

const SESSIONS: [(&str, &str); 3] = [
    ("dev-admin", "admin"),
    ("dev-csrep", "csRep"),
    ("dev-coach", "coach"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let store = RedisStore::connect(&args.redis_url).await?;

    let now = Utc::now();
    let today = now.date_naive();
    let days_ago = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(today);

    let sprint = Product {
        id: Uuid::new_v4(),
        name: "90 Day Sprint".to_string(),
        duration_days: Some(90),
    };
    let membership = Product {
        id: Uuid::new_v4(),
        name: "Monthly Membership".to_string(),
        duration_days: None,
    };
    store.insert_product(&sprint).await?;
    store.insert_product(&membership).await?;

    // (name, product, start, end): lapsed, recently ended, inferred lapse, ongoing
    let seeds = [
        ("Avery Lapsed", &sprint, days_ago(130), Some(days_ago(40))),
        ("Blake Recent", &sprint, days_ago(100), Some(days_ago(10))),
        ("Casey Inferred", &sprint, days_ago(150), None),
        ("Drew Member", &membership, days_ago(400), None),
    ];

    for (name, product, start_date, end_date) in seeds {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        let client = Client::new(name, email, now);
        store.insert_client(&client).await?;

        store
            .insert_activity_period(&ActivityPeriod {
                id: Uuid::new_v4(),
                client_id: client.id,
                product_id: Some(product.id),
                start_date,
                end_date,
            })
            .await?;

        println!("Client {} ({})", client.id, name);
    }

    let mut conn = store.connection();
    for (token, role) in SESSIONS {
        let session = json!({ "user": { "id": format!("staff-{role}"), "role": role } });
        let _: () = conn
            .set_ex(format!("session:{token}"), session.to_string(), 60 * 60 * 24)
            .await?;

        println!("Session {token} -> {role}");
    }

    println!("\nSeeded {} clients", seeds.len());
    Ok(())
}
