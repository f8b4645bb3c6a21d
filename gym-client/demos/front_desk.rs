//! Front desk walkthrough
//!
//! Seeds an in-memory store, opens a cache for one gym and walks through a
//! morning at the front desk: reminders, a new member, check-ins, a payment.
//!
//! Run: cargo run --example front_desk
//! Set GYM_STORE_URL / GYM_STORE_API_KEY / GYM_ACCOUNT_ID to read a real store instead.

use std::sync::Arc;

use chrono::Duration;
use gym_client::logger::init_logger;
use gym_client::{
    AccountSession, CacheConfig, Clock, CrudAction, GymCache, GymIntent, MemoryChangeFeed, MemoryStore,
    RecommendationRequest, RemoteStore, RestStore, StoreConfig, SystemClock,
};
use rust_decimal::Decimal;
use serde_json::json;
use shared::models::{MemberCreate, PaymentCreate};

const DEMO_ACCOUNT: &str = "demo-gym";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    println!("\n🏋️  Gym Front Desk");
    println!("==================\n");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let feed = MemoryChangeFeed::new();

    let (store, account_id): (Arc<dyn RemoteStore>, String) = match std::env::var("GYM_STORE_URL") {
        Ok(_) => {
            let config = StoreConfig::from_env();
            let account = std::env::var("GYM_ACCOUNT_ID").unwrap_or_else(|_| DEMO_ACCOUNT.into());
            println!("Using remote store at {}", config.base_url);
            (Arc::new(RestStore::new(&config)?), account)
        }
        Err(_) => {
            let store = MemoryStore::new(clock.clone()).with_feed(feed.clone());
            seed(&store, clock.today());
            println!("Using seeded in-memory store");
            (Arc::new(store), DEMO_ACCOUNT.to_string())
        }
    };

    let cache = GymCache::new(store, Arc::new(feed), clock, CacheConfig::from_env());
    let mut notices = cache.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            let icon = if notice.is_error() { "❌" } else { "✅" };
            println!("   {icon} {}", notice.message);
        }
    });

    // 1. Open
    let view = cache
        .open(AccountSession::new(&account_id).with_display_name("Demo Owner"))
        .await?;
    let (active, expiring, expired) = view.status_counts();
    println!("\n📋 {} · {} members", view.profile.gym_name, view.members.len());
    println!("   active {active} / expiring {expiring} / expired {expired}");

    // 2. Reminders
    println!("\n⏰ Renewal reminders");
    if view.reminders.is_empty() {
        println!("   (none)");
    }
    for reminder in &view.reminders {
        println!(
            "   {} · {} day(s) left on {} · {}",
            reminder.member_name, reminder.days_left, reminder.plan, reminder.phone
        );
    }

    // 3. New member
    println!("\n➕ Adding a member");
    let outcome = cache
        .apply_mutation(GymIntent::Member(CrudAction::Create(MemberCreate {
            name: "Neha Kapoor".into(),
            email: "neha@mail.in".into(),
            phone: "9000000009".into(),
            plan_duration: 3,
            ..Default::default()
        })))
        .await?;
    let new_id = outcome.entity_id().unwrap_or_default().to_string();

    // 4. Check-ins
    println!("\n🚪 Check-ins");
    let qr = cache
        .snapshot()
        .and_then(|s| s.member(&new_id).and_then(|m| m.qr_token.clone()));
    if let Some(token) = qr {
        let _ = cache.check_in_by_qr(&token, Some("front-door")).await;
    }
    if let Some(first) = cache.snapshot().and_then(|s| s.members.last().map(|m| m.id.clone())) {
        let _ = cache.check_in_manual(&first).await;
        // twice on the same day is refused
        let _ = cache.check_in_manual(&first).await;
    }

    // 5. Payment
    println!("\n💳 Payment");
    cache
        .apply_mutation(GymIntent::Payment(CrudAction::Create(PaymentCreate {
            member_id: new_id.clone(),
            amount: Decimal::from(4500),
            payment_method: "upi".into(),
            plan_name: Some("Quarterly".into()),
            ..Default::default()
        })))
        .await?;

    let view = cache.fetch_snapshot().await?;
    let stats = view.attendance_stats(view.today);
    println!(
        "\n📈 Today: {}/{} present ({}%)",
        stats.present, stats.total_members, stats.rate
    );

    let request = RecommendationRequest::from_snapshot(&view, RecommendationRequest::gym_context(&view));
    println!("\n🤖 Recommendation request\n{}", serde_json::to_string_pretty(&request)?);

    println!("\n📝 Activity");
    for entry in &view.activity_log {
        println!("   {}", entry.description);
    }

    cache.close().await;
    println!("\nBye 👋");
    Ok(())
}

fn seed(store: &MemoryStore, today: chrono::NaiveDate) {
    store.seed(
        "users",
        json!({"id": DEMO_ACCOUNT, "name": "Demo Owner", "gym_name": "Iron Temple"}),
    );
    store.seed(
        "plans",
        json!({"user_id": DEMO_ACCOUNT, "name": "Monthly", "price": 1500, "duration": 1}),
    );
    store.seed(
        "plans",
        json!({"user_id": DEMO_ACCOUNT, "name": "Quarterly", "price": 4500, "duration": 3}),
    );

    let members = [
        ("Asha Rao", 3),
        ("Ravi Menon", 0),
        ("Meera Iyer", -2),
        ("Kabir Shah", 45),
    ];
    for (name, days) in members {
        let expiry = today + Duration::days(days);
        store.seed(
            "members",
            json!({
                "user_id": DEMO_ACCOUNT,
                "name": name,
                "email": format!("{}@mail.in", name.split(' ').next().unwrap_or(name).to_lowercase()),
                "phone": "9000000001",
                "plan_duration": 1,
                "joining_date": (expiry - Duration::days(30)).to_string(),
                "expiry_date": expiry.to_string(),
            }),
        );
    }
}
