//! Integration tests for the HTTP API using the CampaignTest harness

mod common;

use common::CampaignTest;
use serde_json::{json, Value};

#[tokio::test]
async fn test_server_starts_and_stops() {
    let campaign = CampaignTest::start().await.expect("Failed to start server");
    // Server shuts down automatically when dropped
    drop(campaign);
}

#[tokio::test]
async fn test_health_endpoint() {
    let campaign = CampaignTest::start().await.expect("Failed to start server");

    let resp = campaign.get("/health").await.expect("Failed to get health");
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_root_endpoint() {
    let campaign = CampaignTest::start().await.expect("Failed to start server");

    let body: Value = campaign.get("/").await.unwrap().json().await.unwrap();
    assert_eq!(body["name"], "campaignd");
    assert_eq!(body["battles"], 0);
}

#[tokio::test]
async fn test_database_isolation() {
    let first = CampaignTest::start().await.expect("Failed to start server 1");
    let second = CampaignTest::start().await.expect("Failed to start server 2");
    assert_ne!(first.addr, second.addr);

    first.create_character("Solo", &[]).await.unwrap_err();
    first
        .create_character("Solo", &["strength"; 6])
        .await
        .unwrap();

    let listed: Value = second.get("/characters").await.unwrap().json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_character() {
    let campaign = CampaignTest::start().await.unwrap();

    let c = campaign
        .create_character(
            "Aria",
            &[
                "constitution",
                "constitution",
                "intelligence",
                "intelligence",
                "dexterity",
                "dexterity",
            ],
        )
        .await
        .unwrap();

    assert_eq!(c["name"], "Aria");
    assert_eq!(c["level"], 1);
    assert_eq!(c["attributes"]["constitution"], 12);
    assert_eq!(c["attributes"]["strength"], 10);
    assert_eq!(c["max_health"], 11);
    assert_eq!(c["health"], 11);
    assert_eq!(c["max_mana"], 12);
    assert_eq!(c["gold"], 0);
    assert_eq!(c["experience_to_next"], 100);

    let fetched: Value = campaign.get("/characters/Aria").await.unwrap().json().await.unwrap();
    assert_eq!(fetched, c);

    let listed: Value = campaign.get("/characters").await.unwrap().json().await.unwrap();
    assert_eq!(listed[0]["name"], "Aria");
    assert_eq!(listed[0]["level"], 1);
}

#[tokio::test]
async fn test_create_character_rejections() {
    let campaign = CampaignTest::start().await.unwrap();

    // Unspent creation points
    let resp = campaign
        .post(
            "/characters",
            &json!({ "name": "Half", "class": "Rogue", "points": ["dexterity", "dexterity"] }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Bad name
    let resp = campaign
        .post(
            "/characters",
            &json!({ "name": "  ", "class": "Rogue", "points": ["dexterity", "dexterity", "dexterity", "dexterity", "dexterity", "dexterity"] }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("name"));

    // Duplicate
    campaign.create_character("Twin", &["wisdom", "wisdom", "wisdom", "wisdom", "wisdom", "wisdom"]).await.unwrap();
    let resp = campaign
        .post(
            "/characters",
            &json!({ "name": "Twin", "class": "Rogue", "points": ["wisdom", "wisdom", "wisdom", "wisdom", "wisdom", "wisdom"] }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = campaign.get("/characters/Nobody").await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_experience_award_and_attribute_points() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Brom", &["strength"; 6]).await.unwrap();

    let resp = campaign
        .post("/characters/Brom/experience", &json!({ "amount": 500 }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["leveled_up"], true);
    assert_eq!(body["levels"].as_array().unwrap().len(), 3);
    assert_eq!(body["character"]["level"], 4);
    assert_eq!(body["character"]["experience"], 25);
    assert_eq!(body["character"]["unspent_attribute_points"], 3);

    for _ in 0..3 {
        let resp = campaign
            .post("/characters/Brom/attributes", &json!({ "attribute": "dexterity" }))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
    let resp = campaign
        .post("/characters/Brom/attributes", &json!({ "attribute": "dexterity" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let c: Value = campaign.get("/characters/Brom").await.unwrap().json().await.unwrap();
    assert_eq!(c["attributes"]["dexterity"], 13);
    assert_eq!(c["unspent_attribute_points"], 0);

    let body: Value = campaign
        .post("/characters/Brom/experience", &json!({ "amount": 10 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["leveled_up"], false);
}

#[tokio::test]
async fn test_rest_and_delete() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Sleepy", &["constitution"; 6]).await.unwrap();

    let resp = campaign
        .post("/characters/Sleepy/rest", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let c: Value = resp.json().await.unwrap();
    assert_eq!(c["health"], c["max_health"]);
    assert_eq!(c["mana"], c["max_mana"]);

    assert_eq!(campaign.delete("/characters/Sleepy").await.unwrap().status(), 204);
    assert_eq!(campaign.delete("/characters/Sleepy").await.unwrap().status(), 404);
    assert_eq!(
        campaign
            .post("/characters/Sleepy/rest", &json!({}))
            .await
            .unwrap()
            .status(),
        404
    );
}

#[tokio::test]
async fn test_catalog_crud() {
    let campaign = CampaignTest::start().await.unwrap();

    for item in [
        json!({ "name": "Longsword", "category": "weapon", "price": 15, "damage_dice": "1d8", "attack_bonus": 1 }),
        json!({ "name": "Potion", "category": "consumable", "price": 10, "effect": "heal:10" }),
    ] {
        let resp = campaign.post("/catalog/items", &item).await.unwrap();
        assert_eq!(resp.status(), 201);
    }

    let items: Value = campaign.get("/catalog/items").await.unwrap().json().await.unwrap();
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Potion", "Longsword"]);
    assert_eq!(items[1]["attack_bonus"], 1);

    let resp = campaign
        .post(
            "/catalog/items",
            &json!({ "name": "Broken", "category": "weapon", "damage_dice": "banana" }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = campaign
        .post(
            "/catalog/abilities",
            &json!({ "name": "Firebolt", "effect": "damage:1d10:fire", "mana_cost": 3 }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let abilities: Value = campaign.get("/catalog/abilities").await.unwrap().json().await.unwrap();
    assert_eq!(abilities[0]["mana_cost"], 3);

    campaign.add_pushover_monster("Rat", 5, 1).await.unwrap();
    let monsters: Value = campaign.get("/catalog/monsters").await.unwrap().json().await.unwrap();
    assert_eq!(monsters[0]["name"], "Rat");

    assert_eq!(campaign.delete("/catalog/items/Potion").await.unwrap().status(), 204);
    assert_eq!(campaign.delete("/catalog/items/Potion").await.unwrap().status(), 404);
    assert_eq!(campaign.delete("/catalog/monsters/Rat").await.unwrap().status(), 204);
}

#[tokio::test]
async fn test_purchase() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Penny", &["charisma"; 6]).await.unwrap();
    campaign
        .post("/catalog/items", &json!({ "name": "Torch", "category": "gear", "price": 0 }))
        .await
        .unwrap();
    campaign
        .post("/catalog/items", &json!({ "name": "Plate", "category": "armor", "price": 50 }))
        .await
        .unwrap();

    let resp = campaign
        .post("/characters/Penny/purchase", &json!({ "item": "Torch" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["receipt"]["price"], 0);
    assert_eq!(body["character"]["inventory"], json!(["Torch"]));

    let resp = campaign
        .post("/characters/Penny/purchase", &json!({ "item": "Plate" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = campaign
        .post("/characters/Penny/purchase", &json!({ "item": "Crown" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let c: Value = campaign.get("/characters/Penny").await.unwrap().json().await.unwrap();
    assert_eq!(c["inventory"], json!(["Torch"]));
    assert_eq!(c["gold"], 0);
}
