//! File-backed catalogs: loading, overriding declarations, and load-time
//! rejection of bad templates.

use std::io::Write;
use tempfile::NamedTempFile;
use worldweave::generation::DungeonConfig;
use worldweave::{
    BiomeDef, DataCatalog, DungeonComposer, GenerationConfig, JsonCatalog, WeaveError,
    WeaveResult, WorldGenerator,
};

const BUILTIN: &str = include_str!("../data/catalog.json");

fn write_catalog(value: &serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", value).unwrap();
    file
}

#[test]
fn test_catalog_loads_from_file() -> WeaveResult<()> {
    let file = write_catalog(&serde_json::from_str(BUILTIN)?);
    let catalog = JsonCatalog::from_path(file.path())?;

    assert_eq!(catalog.get_entries("biomes"), JsonCatalog::builtin()?.get_entries("biomes"));
    assert_eq!(catalog.get_value("biomes", "keep", "boss").as_deref(), Some("ogre"));
    assert_eq!(catalog.get_number_value("party", "default", "size"), Some(4.0));
    Ok(())
}

#[test]
fn test_overridden_declarations_drive_generation() -> WeaveResult<()> {
    let mut value: serde_json::Value = serde_json::from_str(BUILTIN)?;
    value["biomes"]["meadow"]["enemies"] = serde_json::json!(["rat"]);
    value["biomes"]["meadow"]["loot"] = serde_json::json!(["lucky stone"]);
    let file = write_catalog(&value);
    let catalog = JsonCatalog::from_path(file.path())?;

    let meadow = BiomeDef::load(&catalog, "meadow")?;
    assert_eq!(meadow.enemies, vec!["rat".to_string()]);

    let generator = WorldGenerator::new(&catalog, GenerationConfig::for_testing(6))?;
    let world = tokio_test::block_on(generator.generate_world())?;
    let start = world.overworld.get(world.overworld.start).unwrap();
    assert_eq!(start.biome.as_deref(), Some("meadow"));
    assert_eq!(start.loot, vec!["lucky stone".to_string()]);
    let dungeon = world.dungeon(start.position()).unwrap();
    assert!(dungeon.creatures.iter().all(|c| c.template == "rat"));
    Ok(())
}

#[test]
fn test_off_centre_marker_is_rejected() -> WeaveResult<()> {
    let mut value: serde_json::Value = serde_json::from_str(BUILTIN)?;
    value["tilesets"]["stone"]["inner.I"] = serde_json::json!([".#./*#./.#."]);
    let file = write_catalog(&value);
    let catalog = JsonCatalog::from_path(file.path())?;

    let result = DungeonComposer::new(&catalog, DungeonConfig::default());
    assert!(matches!(result, Err(WeaveError::InvalidPattern(_))));
    Ok(())
}

#[test]
fn test_wrong_template_size_is_rejected() -> WeaveResult<()> {
    let mut value: serde_json::Value = serde_json::from_str(BUILTIN)?;
    value["tilesets"]["grass"]["outer.T"] = serde_json::json!([".#.../.#*##/.#.../...../....."]);
    let file = write_catalog(&value);
    let catalog = JsonCatalog::from_path(file.path())?;

    let result = DungeonComposer::new(&catalog, DungeonConfig::default());
    assert!(matches!(result, Err(WeaveError::InvalidPattern(_))));
    Ok(())
}

#[test]
fn test_missing_and_malformed_files() {
    let missing = JsonCatalog::from_path("/nonexistent/worldweave/catalog.json");
    assert!(matches!(missing, Err(WeaveError::Io(_))));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{ \"biomes\": ").unwrap();
    assert!(matches!(JsonCatalog::from_path(file.path()), Err(WeaveError::Serde(_))));
}
