//! 快照文件加载/保存测试
//!
//! 测试场景：
//! - 从 JSON 文件加载对象图并编辑
//! - 编辑结果写回文件后可重新加载
//! - 覆盖前创建备份
//! - 无效快照返回错误

use std::fs;

use live_inspector::runtime::snapshot::SnapshotDocument;
use live_inspector::utils::create_backup;
use live_inspector::{InspectorDebugger, InspectorError, ObjectId, PropertyEditor, SnapshotRuntime, Value};
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "objects": [
    {
      "address": "0x1000",
      "class": "Counter",
      "superclasses": ["NSObject"],
      "properties": [
        { "name": "count", "attributes": "Tq,N,V_count", "value": "5", "readers": ["currentCount"] },
        { "name": "frame", "attributes": "T{CGRect={CGPoint=dd}{CGSize=dd}},N", "value": "{{0, 0}, {320, 480}}" },
        { "name": "delegate", "attributes": "T@,W,N", "value": "<UIWindow: 0x2000>" },
        { "name": "buffer", "attributes": "T^i,N", "value": "0x8000" }
      ]
    },
    { "address": "0x2000", "class": "UIWindow", "superclasses": ["UIView", "NSObject"] }
  ],
  "views": [ { "address": "0x2000", "depth": 0 } ],
  "regions": [ { "start": "0x8000", "size": 64 } ]
}"#;

fn write_snapshot(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("app.json");
    fs::write(&path, SNAPSHOT).unwrap();
    path
}

#[test]
fn test_load_edit_save_reload() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(&dir);
    let target = ObjectId(0x1000);

    let runtime = SnapshotRuntime::load(&path).unwrap();
    {
        let mut editor = PropertyEditor::for_name(&runtime, target, "frame").unwrap();
        editor.load().unwrap();
        assert_eq!(editor.text(), "{{0, 0}, {320, 480}}");
        editor.begin_edit_component(1, "{375, 812}").unwrap();
        editor.commit().unwrap();
    }
    {
        let mut editor = PropertyEditor::for_name(&runtime, target, "buffer").unwrap();
        editor.load().unwrap();
        editor.begin_edit("0x8010").unwrap();
        editor.commit().unwrap();

        // 不可读地址被拒绝
        editor.begin_edit("0x9000").unwrap();
        assert!(editor.commit().is_err());
    }

    let output = dir.path().join("edited.json");
    runtime.save(&output).unwrap();

    let reloaded = SnapshotRuntime::load(&output).unwrap();
    assert_eq!(
        reloaded.stored_value(target, "frame"),
        Some(Value::Struct(vec![
            Value::Struct(vec![Value::Float(0.0), Value::Float(0.0)]),
            Value::Struct(vec![Value::Float(375.0), Value::Float(812.0)]),
        ]))
    );
    assert_eq!(reloaded.stored_value(target, "buffer"), Some(Value::Pointer(0x8010)));
    assert_eq!(reloaded.views(), vec![(ObjectId(0x2000), 0)]);
    assert_eq!(reloaded.to_document(), runtime.to_document());
}

#[test]
fn test_saved_document_format() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(&dir);
    let runtime = SnapshotRuntime::load(&path).unwrap();

    let document: SnapshotDocument = serde_json::from_str(&serde_json::to_string(&runtime.to_document()).unwrap()).unwrap();
    let counter = &document.objects[0];
    assert_eq!(counter.address, "0x1000");

    let delegate = counter.properties.iter().find(|p| p.name == "delegate").unwrap();
    assert_eq!(delegate.value, "<UIWindow: 0x2000>");
    let count = counter.properties.iter().find(|p| p.name == "count").unwrap();
    assert_eq!(count.readers.len(), 1);
}

#[test]
fn test_dump_to_file() {
    let dir = TempDir::new().unwrap();
    let runtime = SnapshotRuntime::load(&write_snapshot(&dir)).unwrap();

    let dump_path = dir.path().join("counter.dump");
    InspectorDebugger::dump_object(&runtime, ObjectId(0x1000), &dump_path).unwrap();

    let text = fs::read_to_string(&dump_path).unwrap();
    assert!(text.contains("=== 对象结构dump ==="));
    assert!(text.contains("frame {"));
    assert!(text.contains("当前值: <UIWindow: 0x2000>"));
}

#[test]
fn test_backup_before_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(&dir);

    let backup = create_backup(&path).unwrap();
    assert!(backup.exists());
    assert_eq!(fs::read_to_string(&backup).unwrap(), SNAPSHOT);
}

#[test]
fn test_invalid_snapshots() {
    let dir = TempDir::new().unwrap();

    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(SnapshotRuntime::load(&path), Err(InspectorError::JsonError(_))));

    // 引用了不存在的对象
    fs::write(
        &path,
        r#"{"objects": [{"address": "0x10", "class": "A",
            "properties": [{"name": "peer", "attributes": "T@", "value": "0x20"}]}]}"#,
    )
    .unwrap();
    assert!(matches!(SnapshotRuntime::load(&path), Err(InspectorError::Editor(_))));

    let missing = dir.path().join("missing.json");
    assert!(matches!(SnapshotRuntime::load(&missing), Err(InspectorError::IoError(_))));
}
