mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

use common::{TestWorkspace, write_item_settings};

fn converter() -> Command {
    Command::cargo_bin("csv-converter").expect("binary exists")
}

fn run(workspace: &TestWorkspace, args: &[&str]) -> assert_cmd::assert::Assert {
    converter()
        .current_dir(workspace.path())
        .env("RUST_LOG", "warn")
        .args(args)
        .assert()
}

#[test]
fn generate_then_convert_writes_sources_records_and_table() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, true, false);

    run(&workspace, &["generate", "--settings", "settings.yaml"]).success();
    let record_source = workspace.read("out/Item.rs");
    assert!(record_source.contains("pub struct Item {"));
    assert!(record_source.contains("pub tags: Vec<String>,"));
    let table_source = workspace.read("out/ItemTable.rs");
    assert!(table_source.contains("pub fn find(&self, id: &i32) -> Option<&Item>"));
    assert!(workspace.read("types.yaml").contains("ItemTable"));

    run(&workspace, &["convert", "--settings", "settings.yaml"]).success();
    assert!(workspace.path().join("out/Item_1.yaml").is_file());
    assert!(workspace.path().join("out/Item_3.yaml").is_file());
    assert!(workspace.read("out/Items.yaml").contains("Shield"));
}

#[test]
fn convert_without_generated_types_fails() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, false, false);
    run(&workspace, &["convert", "--settings", "settings.yaml"])
        .failure()
        .stderr(contains("type registry"));
}

#[test]
fn preview_prints_records_without_writing() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, false, false);
    run(&workspace, &["generate", "--settings", "settings.yaml"]).success();

    run(&workspace, &["convert", "--settings", "settings.yaml", "--preview"])
        .success()
        .stdout(contains("identity").and(contains("Item_2")).and(contains("Shield")));
    assert!(!workspace.path().join("out/Item_1.yaml").exists());
}

#[test]
fn report_lists_counts_and_diagnostics() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, false, false);
    run(&workspace, &["generate", "--settings", "settings.yaml"]).success();
    run(
        &workspace,
        &["convert", "--settings", "settings.yaml", "--report", "report.json"],
    )
    .success();

    let report: serde_json::Value =
        serde_json::from_str(&workspace.read("report.json")).expect("parse report");
    assert_eq!(report[0]["type_name"], "Item");
    assert_eq!(report[0]["rows"], 3);
    assert_eq!(report[0]["skipped"], 1);
    let diagnostics = report[0]["diagnostics"].as_array().expect("diagnostics");
    assert!(diagnostics.iter().any(|d| d["raw"] == "abc" && d["line"] == 6));
}

#[test]
fn failing_setting_does_not_stop_the_batch() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, false, false);
    run(&workspace, &["generate", "--settings", "settings.yaml"]).success();

    let settings = workspace.read("settings.yaml").replace("settings:\n", "");
    workspace.write(
        "settings.yaml",
        &format!(
            "settings:\n  - csv_file_path: sheets/missing.csv\n    class_name: Item\n    destination: gone\n{settings}"
        ),
    );
    run(&workspace, &["convert", "--settings", "settings.yaml"])
        .failure()
        .stderr(contains("1 of 2 setting(s) failed"));
    assert!(workspace.path().join("out/Item_1.yaml").is_file());
}

#[test]
fn name_filter_selects_matching_settings() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, false, false);
    run(&workspace, &["generate", "--settings", "settings.yaml", "--name", "monster"]).success();
    assert!(!workspace.path().join("out/Item.rs").exists());
    run(&workspace, &["generate", "--settings", "settings.yaml", "--name", "itm"]).success();
    assert!(workspace.path().join("out/Item.rs").exists());
}

#[test]
fn enum_sheets_generate_enums_usable_by_records() {
    let workspace = TestWorkspace::new();
    workspace.write("sheets/rarity.csv", "ID,VALUE\nCommon,0\nRare,3\nBroken,x\n");
    workspace.write("sheets/loot.csv", "id,rarity,weight\nint,Rarity,int\n1,Rare,Rarity.Rare\n2,Common,4\n");
    workspace.write(
        "settings.yaml",
        "settings:\n\
         \x20 - csv_file_path: sheets/loot.csv\n    class_name: Loot\n    destination: out\n    class_generate: true\n    keys: [id]\n\
         \x20 - csv_file_path: sheets/rarity.csv\n    class_name: Rarity\n    destination: out\n    is_enum: true\n",
    );
    run(&workspace, &["generate", "--settings", "settings.yaml"]).success();
    let enum_source = workspace.read("out/Rarity.rs");
    assert!(enum_source.contains("Rare = 3,"));
    assert!(!enum_source.contains("Broken"));
    assert!(workspace.read("out/Loot.rs").contains("pub rarity: Rarity,"));

    run(&workspace, &["convert", "--settings", "settings.yaml"]).success();
    assert!(workspace.read("out/Loot_2.yaml").contains("Common"));
    assert!(workspace.read("out/Loot_1.yaml").contains("Rare"));
}

#[test]
fn inspect_prints_field_descriptors() {
    let workspace = TestWorkspace::new();
    write_item_settings(&workspace, false, false);
    run(&workspace, &["inspect", "--settings", "settings.yaml"])
        .success()
        .stdout(contains("tags[1]").and(contains("base")));
}
