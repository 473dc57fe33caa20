//! Driver-level conversion tests exercising the CLI entry point.

mod common;

use std::path::Path;

use bdatrs::driver;
use bdatrs::io::FileSource;
use bdatrs::sas7bdat::Sas7bdatDialect;
use bdatrs::{MissingTag, Parser, Value, VarType, Writer};
use common::{Collector, OwnedValue};
use tempfile::tempdir;

fn write_sample(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = Writer::new(file);
    writer.set_version(90101);
    writer.set_file_label("sample");
    writer
        .begin_writing(Box::new(Sas7bdatDialect::new()), 3)
        .unwrap();
    writer.add_variable("city", VarType::Str, 10).unwrap();
    writer.add_variable("pop", VarType::Numeric, 8).unwrap();
    writer.begin_data().unwrap();

    for (city, pop) in [
        ("oslo", Some(709_000.0)),
        ("bergen", Some(291_000.0)),
        ("vadso", None),
    ] {
        writer.insert_value(0, &Value::Str(city)).unwrap();
        match pop {
            Some(v) => writer.insert_value(1, &Value::Double(v)).unwrap(),
            None => writer
                .insert_value(1, &Value::Missing(MissingTag::System))
                .unwrap(),
        }
        writer.finish_row().unwrap();
    }
    writer.end_writing().unwrap();
}

fn run(args: &[&str]) -> i32 {
    driver::run(
        std::iter::once("bdatrs")
            .chain(args.iter().copied())
            .map(String::from)
            .collect(),
    )
}

#[test]
fn test_convert_to_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("sample.sas7bdat");
    let output = dir.path().join("sample.csv");
    write_sample(&input);

    let code = run(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert_eq!(code, 0);

    let text = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        text,
        "\"city\",\"pop\"\n\"oslo\",709000\n\"bergen\",291000\n\"vadso\",\n"
    );
}

#[test]
fn test_convert_to_sas7bdat_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("sample.sas7bdat");
    let output = dir.path().join("copy.sas7bdat");
    write_sample(&input);

    let code = run(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert_eq!(code, 0);

    let mut collector = Collector::default();
    let mut parser = Parser::new(FileSource::new());
    parser.parse_path(&output, &mut collector).unwrap();

    assert_eq!(collector.info, Some((3, 2)));
    assert_eq!(collector.variables[0].name, "city");
    assert_eq!(collector.variables[1].name, "pop");
    assert_eq!(
        collector.values,
        vec![
            (0, 0, OwnedValue::Str("oslo".to_string())),
            (0, 1, OwnedValue::Num(709_000.0)),
            (1, 0, OwnedValue::Str("bergen".to_string())),
            (1, 1, OwnedValue::Num(291_000.0)),
            (2, 0, OwnedValue::Str("vadso".to_string())),
            (2, 1, OwnedValue::Missing(MissingTag::System)),
        ]
    );
}

#[test]
fn test_unparseable_input_unlinks_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("garbage.sas7bdat");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, b"not a real file").unwrap();

    let code = run(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(!output.exists());
}

#[test]
fn test_unsupported_dialect_reports_failure() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("legacy.dta");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, b"").unwrap();

    // The extension is recognised but the dialect parser is external.
    let code = run(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(!output.exists());
}
