//! End-to-end battle tests over WebSocket

mod common;

use std::time::Duration;

use common::CampaignTest;
use serde_json::{json, Value};

#[tokio::test]
async fn test_battle_won_with_level_up() {
    let campaign = CampaignTest::start().await.expect("Failed to start server");
    campaign.create_character("Hero", &["strength"; 6]).await.unwrap();
    campaign.add_pushover_monster("Rat", 150, 12).await.unwrap();

    let mut ws = campaign.connect_ws().await.expect("Failed to connect");

    let msg = ws.start_battle("Hero", Some("Rat")).await.unwrap();
    assert_eq!(msg["type"], "battle");
    assert_eq!(msg["events"][0]["type"], "started");
    assert_eq!(msg["events"][0]["monster"], "Rat");
    assert_eq!(msg["decision"]["kind"], "choose_action");

    // Strength 16 against defense 1 always hits, and any hit kills
    let msg = ws.input("attack").await.unwrap();
    assert_eq!(msg["type"], "battle");
    let kinds: Vec<&str> = msg["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"player_attack"));
    assert!(kinds.contains(&"monster_defeated"));
    assert!(kinds.contains(&"rewards"));
    assert!(kinds.contains(&"leveled_up"));
    assert_eq!(msg["decision"]["kind"], "choose_attribute");
    assert_eq!(msg["decision"]["points"], 1);

    let msg = ws.input("1").await.unwrap();
    assert_eq!(msg["type"], "finished");
    assert_eq!(msg["outcome"], "won");
    assert_eq!(msg["events"][0]["type"], "attribute_raised");
    assert_eq!(msg["character"]["level"], 2);

    let c: Value = campaign.get("/characters/Hero").await.unwrap().json().await.unwrap();
    assert_eq!(c["level"], 2);
    assert_eq!(c["gold"], 12);
    assert_eq!(c["experience"], 50);
    assert_eq!(c["attributes"]["strength"], 17);
    assert_eq!(c["unspent_attribute_points"], 0);

    campaign.wait_for_no_battles().await.unwrap();
}

#[tokio::test]
async fn test_character_busy_during_battle() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Busy", &["constitution"; 6]).await.unwrap();
    campaign.add_pushover_monster("Slime", 5, 1).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    let msg = ws.start_battle("Busy", Some("Slime")).await.unwrap();
    assert_eq!(msg["type"], "battle");

    let resp = campaign
        .post("/characters/Busy/rest", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let resp = campaign
        .post("/characters/Busy/experience", &json!({ "amount": 10 }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // A second connection cannot pull the same character into a battle
    let mut other = campaign.connect_ws().await.unwrap();
    let msg = other.start_battle("Busy", Some("Slime")).await.unwrap();
    assert_eq!(msg["type"], "error");

    // Nor can the first start another
    let msg = ws.start_battle("Busy", None).await.unwrap();
    assert_eq!(msg["type"], "error");

    let msg = ws.flee().await.unwrap();
    assert_eq!(msg["type"], "finished");
    assert_eq!(msg["outcome"], "fled");
    assert_eq!(msg["events"][0]["type"], "fled");
    assert_eq!(msg["character"]["gold"], 0);

    let resp = campaign
        .post("/characters/Busy/rest", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_flee_from_menu() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Coward", &["dexterity"; 6]).await.unwrap();
    campaign.add_pushover_monster("Bat", 5, 1).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    ws.start_battle("Coward", Some("Bat")).await.unwrap();

    let msg = ws.input("4").await.unwrap();
    assert_eq!(msg["type"], "finished");
    assert_eq!(msg["outcome"], "fled");
    assert_eq!(msg["character"]["experience"], 0);

    campaign.wait_for_no_battles().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_abandons_battle() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Ghost", &["wisdom"; 6]).await.unwrap();
    campaign.add_pushover_monster("Wisp", 5, 1).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    let msg = ws.start_battle("Ghost", Some("Wisp")).await.unwrap();
    assert_eq!(msg["type"], "battle");

    ws.close().await.unwrap();
    drop(ws);

    campaign.wait_for_no_battles().await.unwrap();
    let resp = campaign
        .post("/characters/Ghost/rest", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_random_encounter() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Wanderer", &["strength"; 6]).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    let msg = ws.start_battle("Wanderer", None).await.unwrap();
    assert_eq!(msg["type"], "error");
    assert!(msg["message"].as_str().unwrap().contains("no monsters"));

    campaign.add_pushover_monster("Newt", 5, 1).await.unwrap();
    let msg = ws.start_battle("Wanderer", None).await.unwrap();
    assert_eq!(msg["type"], "battle");
    assert_eq!(msg["events"][0]["monster"], "Newt");
}

#[tokio::test]
async fn test_unknown_names() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Lost", &["strength"; 6]).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    let msg = ws.start_battle("Nobody", None).await.unwrap();
    assert_eq!(msg["type"], "error");

    let msg = ws.start_battle("Lost", Some("Dragon")).await.unwrap();
    assert_eq!(msg["type"], "error");
    assert!(msg["message"].as_str().unwrap().contains("Dragon"));

    // The failed start must not leave the character claimed
    let resp = campaign
        .post("/characters/Lost/rest", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_invalid_input_keeps_turn() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Dancer", &["charisma"; 6]).await.unwrap();
    campaign.add_pushover_monster("Frog", 5, 1).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    let msg = ws.input("attack").await.unwrap();
    assert_eq!(msg["type"], "error");

    ws.start_battle("Dancer", Some("Frog")).await.unwrap();

    let msg = ws.input("dance").await.unwrap();
    assert_eq!(msg["type"], "battle");
    assert_eq!(msg["events"].as_array().unwrap().len(), 1);
    assert_eq!(msg["events"][0]["type"], "invalid_selection");
    assert_eq!(msg["decision"]["kind"], "choose_action");

    // Empty inventory and no abilities fall back to the action menu
    let msg = ws.input("item").await.unwrap();
    assert_eq!(msg["events"][0]["type"], "no_usable_items");
    assert_eq!(msg["decision"]["kind"], "choose_action");

    let msg = ws.input("cast").await.unwrap();
    assert_eq!(msg["events"][0]["type"], "no_abilities");
    assert_eq!(msg["decision"]["kind"], "choose_action");

    ws.send_json(&json!({ "type": "nonsense" })).await.unwrap();
    let msg = ws.recv_json_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(msg["type"], "error");
}

#[tokio::test]
async fn test_use_item_in_battle() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Medic", &["constitution"; 6]).await.unwrap();
    campaign
        .post(
            "/catalog/items",
            &json!({ "name": "Potion", "category": "consumable", "price": 0, "effect": "heal:10" }),
        )
        .await
        .unwrap();
    let resp = campaign
        .post("/characters/Medic/purchase", &json!({ "item": "Potion" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    campaign.add_pushover_monster("Moth", 5, 1).await.unwrap();

    let mut ws = campaign.connect_ws().await.unwrap();
    ws.start_battle("Medic", Some("Moth")).await.unwrap();

    let msg = ws.input("item").await.unwrap();
    assert_eq!(msg["decision"]["kind"], "choose_item");
    assert_eq!(msg["decision"]["options"][0]["name"], "Potion");

    let msg = ws.input("1").await.unwrap();
    assert_eq!(msg["type"], "battle");
    assert_eq!(msg["events"][0]["type"], "item_used");
    assert_eq!(msg["events"][0]["item"], "Potion");
    assert_eq!(msg["decision"]["kind"], "choose_action");

    let msg = ws.flee().await.unwrap();
    assert_eq!(msg["outcome"], "fled");
    assert_eq!(msg["character"]["inventory"], json!([]));

    let c: Value = campaign.get("/characters/Medic").await.unwrap().json().await.unwrap();
    assert_eq!(c["inventory"], json!([]));
}

#[tokio::test]
async fn test_learned_ability_cast_in_battle() {
    let campaign = CampaignTest::start().await.unwrap();
    campaign.create_character("Mage", &["intelligence"; 6]).await.unwrap();
    let resp = campaign
        .post(
            "/catalog/abilities",
            &json!({ "name": "Firebolt", "effect": "damage:1d10:fire", "mana_cost": 3 }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = campaign
        .post("/characters/Mage/abilities", &json!({ "ability": "Meteor" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = campaign
        .post("/characters/Mage/abilities", &json!({ "ability": "Firebolt" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let c: Value = resp.json().await.unwrap();
    assert_eq!(c["abilities"], json!(["Firebolt"]));
    assert_eq!(c["max_mana"], 16);

    campaign.add_pushover_monster("Imp", 5, 2).await.unwrap();
    let mut ws = campaign.connect_ws().await.unwrap();
    ws.start_battle("Mage", Some("Imp")).await.unwrap();

    // Sheet changes wait for the battle to end
    let resp = campaign
        .post("/characters/Mage/abilities", &json!({ "ability": "Firebolt" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let msg = ws.input("cast").await.unwrap();
    assert_eq!(msg["decision"]["kind"], "choose_ability");
    assert_eq!(msg["decision"]["options"][0]["name"], "Firebolt");
    assert_eq!(msg["decision"]["options"][0]["mana_cost"], 3);

    // Any damage kills a one-hit-point imp
    let msg = ws.input("1").await.unwrap();
    assert_eq!(msg["type"], "finished");
    assert_eq!(msg["outcome"], "won");
    assert_eq!(msg["events"][0]["type"], "ability_cast");
    assert_eq!(msg["events"][1]["type"], "effect_applied");
    assert_eq!(msg["events"][1]["target"], "Imp");
    assert_eq!(msg["character"]["mana"], 13);
    assert_eq!(msg["character"]["gold"], 2);

    let c: Value = campaign.get("/characters/Mage").await.unwrap().json().await.unwrap();
    assert_eq!(c["mana"], 13);
    assert_eq!(c["abilities"], json!(["Firebolt"]));
}

#[tokio::test]
async fn test_ping_has_no_reply() {
    let campaign = CampaignTest::start().await.unwrap();
    let mut ws = campaign.connect_ws().await.unwrap();

    ws.send_ping().await.unwrap();
    assert!(ws
        .recv_json_timeout(Duration::from_millis(300))
        .await
        .is_err());

    let root: Value = campaign.get("/").await.unwrap().json().await.unwrap();
    assert_eq!(root["connections"], 1);
}
