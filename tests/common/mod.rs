#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_converter::registry::{MemberDef, RecordType, TableType, TypeRegistry};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace (creating parent
    /// directories) and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

pub const ITEMS_CSV: &str = "\
id,name,hp,tags[0],tags[1]
int,string,int,string,string
1,Sword,10,sharp,heavy
2,Shield,,round,
,Ghost,3,,
3,Bow,abc,,
";

pub fn member(name: &str, type_name: &str) -> MemberDef {
    MemberDef {
        name: name.to_string(),
        type_name: type_name.to_string(),
    }
}

pub fn item_type() -> RecordType {
    RecordType {
        name: "game::Item".to_string(),
        members: vec![
            member("id", "int"),
            member("name", "string"),
            member("hp", "int"),
            member("tags", "string[]"),
        ],
    }
}

pub fn item_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::default();
    registry.register_record(item_type());
    registry.register_table(TableType {
        name: "ItemTable".to_string(),
        row_type: "game::Item".to_string(),
        keys: vec!["id".to_string()],
        dictionary: false,
    });
    registry
}

/// Writes a settings file with a single item sheet converted into `out/`.
pub fn write_item_settings(workspace: &TestWorkspace, table: bool, only_table: bool) -> PathBuf {
    workspace.write("sheets/items.csv", ITEMS_CSV);
    workspace.write(
        "settings.yaml",
        &format!(
            "settings:\n  - csv_file_path: sheets/items.csv\n    class_name: Item\n    \
             destination: out\n    class_generate: true\n    table_class_generate: true\n    \
             table_generate: {table}\n    only_table_create: {only_table}\n    keys: [id]\n    \
             table_asset_name: Items\n"
        ),
    )
}
