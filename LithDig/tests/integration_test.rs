use lithdig::gamedb::calc_hash;
use lithdig::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn push_i32s(out: &mut Vec<u8>, values: &[i32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// `LTAR` v3 with the root folder and one stored 10-byte file.
fn single_file_archive() -> Vec<u8> {
    let names = b"\0data.bin\0";
    let header_size = 4 + 4 + 6 * 4 + 16 + names.len() + 32 + 16;
    let mut out = b"LTAR".to_vec();
    push_i32s(&mut out, &[3, names.len() as i32, 1, 1, 0, 0, 0]);
    out.extend_from_slice(&[0; 16]);
    out.extend_from_slice(names);
    // file: name, offset, compressed, uncompressed, flags
    push_i32s(&mut out, &[1]);
    out.extend_from_slice(&(header_size as i64).to_le_bytes());
    out.extend_from_slice(&10i64.to_le_bytes());
    out.extend_from_slice(&10i64.to_le_bytes());
    push_i32s(&mut out, &[0]);
    // root folder: name, first child, next sibling, file count
    push_i32s(&mut out, &[0, -1, -1, 1]);
    out.extend_from_slice(b"0123456789");
    out
}

#[test]
fn test_archive_single_stored_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Test.Arch00");
    std::fs::write(&path, single_file_archive()).unwrap();

    let mut archive = ArchFile::open(&path).unwrap();
    assert_eq!(archive.files().len(), 1);
    assert_eq!(archive.files()[0].full_path().as_deref(), Some("data.bin"));
    assert_eq!(archive.read_file("DATA.BIN").unwrap().unwrap(), b"0123456789");
}

#[test]
fn test_archive_unsupported_variant() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Test.Arch05");
    std::fs::write(&path, single_file_archive()).unwrap();
    assert!(matches!(ArchFile::open(&path), Err(Error::NotImplemented(_))));
}

#[test]
fn test_bundles_share_contract() {
    let dir = tempdir().unwrap();

    let names = b"\0mesh.mesh\0";
    let mut bndl = b"BNDL".to_vec();
    push_i32s(&mut bndl, &[3, names.len() as i32, 0, 0, 1]);
    bndl.extend_from_slice(names);
    push_i32s(&mut bndl, &[1]);
    bndl.extend_from_slice(&4u32.to_le_bytes());
    bndl.extend_from_slice(b"MESH");
    bndl.resize(128, 0);
    let bndl_path = dir.path().join("a.bndl");
    std::fs::write(&bndl_path, bndl).unwrap();

    let names = b"lvl.dat\0";
    let mut lv = b"LVRS".to_vec();
    push_i32s(&mut lv, &[1, 1, names.len() as i32]);
    lv.extend_from_slice(names);
    lv.extend_from_slice(&3u32.to_le_bytes());
    lv.extend_from_slice(b"xyz");
    let lv_path = dir.path().join("a.lvbndl");
    std::fs::write(&lv_path, lv).unwrap();

    fn first_payload(bundle: &mut impl Bundle) -> Vec<u8> {
        let entry = bundle.entries()[0].clone();
        bundle.read_data(&entry).unwrap().unwrap()
    }
    assert_eq!(first_payload(&mut BndlFile::open(&bndl_path).unwrap()), b"MESH");
    assert_eq!(first_payload(&mut LvBndlFile::open(&lv_path).unwrap()), b"xyz");
}

#[test]
fn test_empty_bundle_marker() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.bndl");
    let mut data = 15i32.to_le_bytes().to_vec();
    data.resize(256, 0xCC);
    std::fs::write(&path, data).unwrap();
    assert!(BndlFile::open(&path).unwrap().entries().is_empty());
}

#[test]
fn test_hash_name_lookup() {
    // letters of either case share S-box entries
    assert_eq!(calc_hash("Pos"), calc_hash("pos"));
    let names = HashNameTable::from_text("Pos\n");
    assert_eq!(names.name(calc_hash("Pos")), "Pos");
    let unknown = names.name(calc_hash("Missing"));
    assert!(unknown.starts_with("0x"));
    assert_eq!(unknown.len(), 10);
}

#[test]
fn test_game_db_from_disk() {
    let dir = tempdir().unwrap();
    let table = b"Weapons\0Pistol\0Damage\0";
    let mut data = b"GADB".to_vec();
    push_i32s(&mut data, &[3, table.len() as i32, 0, 0, 0, 0]);
    data.extend_from_slice(table);
    // category, record, one Int attribute with two values
    push_i32s(&mut data, &[1, 0, 1, 8, 1, 15, 3, 0, 2, 10, 20]);
    let path = dir.path().join("Weapons.gamedb");
    std::fs::write(&path, data).unwrap();

    let db = GameDbFile::open(&path, &HashNameTable::new()).unwrap();
    let record = db.category("WEAPONS").unwrap().record("pistol").unwrap();
    assert_eq!(
        record.attribute("Damage").unwrap().values,
        vec![AttributeValue::Int(10), AttributeValue::Int(20)]
    );
    assert!(db.resolve_link(RecordLink { record_index: 4, category_index: 0 }).is_none());
    assert!(db.resolve_link(RecordLink { record_index: 0, category_index: -1 }).is_none());
}

#[test]
fn test_world_errors_name_the_stage() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("Broken.world00p");
    let mut data = 111i32.to_le_bytes().to_vec();
    // section offsets and a truncated bounding box
    push_i32s(&mut data, &[0, 0, 0, 0, 0]);
    std::fs::write(&path, data).unwrap();

    let err = WorldFile::open(&path, &WorldLoadOptions::new(), &HashNameTable::new()).unwrap_err();
    match err {
        Error::World { path: failed, stage, source } => {
            assert_eq!(failed, path);
            assert_eq!(stage, "header");
            assert!(matches!(*source, Error::UnexpectedEof { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_world() {
    let dir = tempdir().unwrap();
    let err = WorldFile::open(dir.path().join("none.wld"), &WorldLoadOptions::new(), &HashNameTable::new())
        .unwrap_err();
    assert!(matches!(err, Error::World { stage: "header", .. }));
}

#[test]
fn test_version() {
    assert!(!lithdig::VERSION.is_empty());
}
