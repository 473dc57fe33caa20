//! End-to-end roundtrip tests: files produced by the SAS7BDAT writer are
//! parsed back with full fidelity for both the 32-bit and 64-bit layouts.

mod common;

use bdatrs::sas7bdat::Sas7bdatDialect;
use bdatrs::{MissingTag, Value, VarType, Writer};
use common::{OwnedValue, parse_bytes};

fn new_writer(version: i64, label: &str) -> Writer<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.set_version(version);
    writer.set_file_label(label);
    writer
}

#[test]
fn test_numeric_roundtrip_64bit() {
    let mut writer = new_writer(90101, "numbers");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 3)
        .unwrap();
    writer.add_variable("x", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();
    for v in [1.0, 2.0, -1.5] {
        writer.insert_value(0, &Value::Double(v)).unwrap();
        writer.finish_row().unwrap();
    }
    let bytes = writer.end_writing().unwrap();

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(parsed.info, Some((3, 1)));

    let meta = parsed.metadata.unwrap();
    assert_eq!(meta.file_label, "numbers");
    assert_eq!(meta.format_version, 90101);
    assert_eq!(meta.encoding, 20);
    assert_eq!(meta.host, "W32_VSPRO");
    // No frequency weight is designated; that lives in the catalog.
    assert_eq!(meta.fweight_index, None);

    assert_eq!(parsed.variables.len(), 1);
    assert_eq!(parsed.variables[0].name, "x");
    assert_eq!(parsed.variables[0].var_type, VarType::Numeric);
    assert_eq!(parsed.variables[0].storage_width(), 8);

    assert_eq!(
        parsed.values,
        vec![
            (0, 0, OwnedValue::Num(1.0)),
            (1, 0, OwnedValue::Num(2.0)),
            (2, 0, OwnedValue::Num(-1.5)),
        ]
    );
}

#[test]
fn test_mixed_schema_roundtrip_32bit() {
    let mut writer = new_writer(80101, "mixed");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 2)
        .unwrap();
    writer
        .add_variable("name", VarType::Str, 12)
        .unwrap()
        .label = "Subject name".to_string();
    writer
        .add_variable("score", VarType::Numeric, 8)
        .unwrap()
        .format = "8.2".to_string();
    writer.begin_data().unwrap();

    writer.insert_value(0, &Value::Str("ada")).unwrap();
    writer.insert_value(1, &Value::Double(9.25)).unwrap();
    writer.finish_row().unwrap();
    writer.insert_value(0, &Value::Str("grace")).unwrap();
    writer.insert_value(1, &Value::Int32(7)).unwrap();
    writer.finish_row().unwrap();
    let bytes = writer.end_writing().unwrap();

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(parsed.info, Some((2, 2)));

    let name = &parsed.variables[0];
    assert_eq!(name.name, "name");
    assert_eq!(name.var_type, VarType::Str);
    assert_eq!(name.storage_width(), 12);
    assert_eq!(name.label, "Subject name");

    let score = &parsed.variables[1];
    assert_eq!(score.name, "score");
    assert_eq!(score.var_type, VarType::Numeric);
    assert_eq!(score.format, "8.2");

    assert_eq!(
        parsed.values,
        vec![
            (0, 0, OwnedValue::Str("ada".to_string())),
            (0, 1, OwnedValue::Num(9.25)),
            (1, 0, OwnedValue::Str("grace".to_string())),
            // Narrow integers widen to doubles on disk.
            (1, 1, OwnedValue::Num(7.0)),
        ]
    );
}

#[test]
fn test_system_missing_payload_byte() {
    // One numeric column, rows [1.0, 2.0, system-missing]: the missing
    // cell is a NaN whose byte 5 is !0 = 0xFF.
    let mut writer = new_writer(80101, "t");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 3)
        .unwrap();
    writer.add_variable("x", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();
    writer.insert_value(0, &Value::Double(1.0)).unwrap();
    writer.finish_row().unwrap();
    writer.insert_value(0, &Value::Double(2.0)).unwrap();
    writer.finish_row().unwrap();
    writer
        .insert_value(0, &Value::Missing(MissingTag::System))
        .unwrap();
    writer.finish_row().unwrap();
    let bytes = writer.end_writing().unwrap();

    // 32-bit geometry: one meta page, rows start after the 24-byte page
    // header of the first data page.
    let rows = 1024 + 4096 + 24;
    assert_eq!(&bytes[rows..rows + 8], &1.0f64.to_le_bytes());
    assert_eq!(&bytes[rows + 8..rows + 16], &2.0f64.to_le_bytes());
    let missing = &bytes[rows + 16..rows + 24];
    assert_eq!(missing[5], 0xFF);
    assert!(f64::from_le_bytes(missing.try_into().unwrap()).is_nan());

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(
        parsed.values,
        vec![
            (0, 0, OwnedValue::Num(1.0)),
            (1, 0, OwnedValue::Num(2.0)),
            (2, 0, OwnedValue::Missing(MissingTag::System)),
        ]
    );
}

#[test]
fn test_tagged_missing_payload_byte() {
    // Tag 'a' is stored as !b'a' = 0x9E in byte 5 of the NaN.
    let mut writer = new_writer(80101, "t");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 1)
        .unwrap();
    writer.add_variable("y", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();
    writer
        .insert_value(0, &Value::Missing(MissingTag::Tagged(b'a')))
        .unwrap();
    writer.finish_row().unwrap();
    let bytes = writer.end_writing().unwrap();

    let cell = 1024 + 4096 + 24;
    assert_eq!(bytes[cell + 5], 0x9E);

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(
        parsed.values,
        vec![(0, 0, OwnedValue::Missing(MissingTag::Tagged(b'a')))]
    );
}

#[test]
fn test_all_tags_roundtrip() {
    let mut writer = new_writer(90101, "tags");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 26)
        .unwrap();
    writer.add_variable("m", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();
    for tag in b'a'..=b'z' {
        writer
            .insert_value(0, &Value::Missing(MissingTag::Tagged(tag)))
            .unwrap();
        writer.finish_row().unwrap();
    }
    let bytes = writer.end_writing().unwrap();

    let parsed = parse_bytes(bytes).unwrap();
    for (i, tag) in (b'a'..=b'z').enumerate() {
        assert_eq!(
            parsed.values[i],
            (i, 0, OwnedValue::Missing(MissingTag::Tagged(tag)))
        );
    }
}

#[test]
fn test_invalid_tag_rejected() {
    let mut writer = new_writer(90101, "bad");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 1)
        .unwrap();
    writer.add_variable("m", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();

    let err = writer
        .insert_value(0, &Value::Missing(MissingTag::Tagged(b'Q')))
        .unwrap_err();
    assert!(matches!(err, bdatrs::Error::ValueOutOfRange { .. }));
}

#[test]
fn test_long_variable_names_roundtrip() {
    // Names longer than 8 bytes flip the attrs name-length flag; both
    // forms must survive the trip.
    let mut writer = new_writer(90101, "names");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 1)
        .unwrap();
    writer.add_variable("abc", VarType::Numeric, 8).unwrap();
    writer
        .add_variable("abcdefghi", VarType::Numeric, 8)
        .unwrap();
    writer.begin_data().unwrap();
    writer.insert_value(0, &Value::Double(1.0)).unwrap();
    writer.insert_value(1, &Value::Double(2.0)).unwrap();
    writer.finish_row().unwrap();
    let bytes = writer.end_writing().unwrap();

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(parsed.variables[0].name, "abc");
    assert_eq!(parsed.variables[1].name, "abcdefghi");
}

#[test]
fn test_string_pool_overflow_roundtrip() {
    // Enough long names to overflow one column-text pool page: every
    // stored name must still resolve.
    let names: Vec<String> = (0..200)
        .map(|i| format!("variable_with_a_rather_long_name_{i:03}"))
        .collect();

    let mut writer = new_writer(80101, "pool overflow");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 1)
        .unwrap();
    for name in &names {
        writer.add_variable(name, VarType::Numeric, 8).unwrap();
    }
    writer.begin_data().unwrap();
    for i in 0..names.len() {
        writer.insert_value(i, &Value::Double(i as f64)).unwrap();
    }
    writer.finish_row().unwrap();
    let bytes = writer.end_writing().unwrap();

    // At least two COLUMN_TEXT subheaders were emitted (LE signature
    // FD FF FF FF; the ASCII pool contents cannot alias it).
    let sig = [0xFDu8, 0xFF, 0xFF, 0xFF];
    let text_subheaders = bytes.windows(4).filter(|w| *w == sig).count();
    assert!(
        text_subheaders >= 2,
        "expected >= 2 column-text subheaders, found {text_subheaders}"
    );

    let parsed = parse_bytes(bytes).unwrap();
    let parsed_names: Vec<_> = parsed.variables.iter().map(|v| v.name.clone()).collect();
    assert_eq!(parsed_names, names);
    assert_eq!(parsed.values.len(), names.len());
}

#[test]
fn test_empty_strings_read_back_empty() {
    let mut writer = new_writer(90101, "strings");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 2)
        .unwrap();
    writer.add_variable("s", VarType::Str, 8).unwrap();
    writer.begin_data().unwrap();
    writer.insert_value(0, &Value::Str("")).unwrap();
    writer.finish_row().unwrap();
    writer.insert_value(0, &Value::Str("full")).unwrap();
    writer.finish_row().unwrap();
    let bytes = writer.end_writing().unwrap();

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(
        parsed.values,
        vec![
            (0, 0, OwnedValue::Str(String::new())),
            (1, 0, OwnedValue::Str("full".to_string())),
        ]
    );
}

#[test]
fn test_multi_page_data_roundtrip() {
    // More rows than fit on one 4096-byte data page.
    let rows: usize = 2000; // 64-bit: (4096-40)/8 = 507 rows per page
    let mut writer = new_writer(90101, "paged");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), rows as u64)
        .unwrap();
    writer.add_variable("n", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();
    for i in 0..rows {
        writer.insert_value(0, &Value::Double(i as f64)).unwrap();
        writer.finish_row().unwrap();
    }
    let bytes = writer.end_writing().unwrap();

    let parsed = parse_bytes(bytes).unwrap();
    assert_eq!(parsed.values.len(), rows);
    assert_eq!(parsed.values[1999], (1999, 0, OwnedValue::Num(1999.0)));
}
