//! Schema rendering
//!
//! Tables log their inferred Arrow schema as an indented tree:
//!
//! ```text
//! root
//!  |-- song_id: string (nullable = true)
//!  |-- year: long (nullable = true)
//! ```

use duckdb::arrow::datatypes::{DataType, Field, Schema};
use std::fmt::Write as _;

/// Render a schema as a `root` tree, one line per (nested) field
pub fn format_schema(schema: &Schema) -> String {
    let mut out = String::from("root\n");
    for field in schema.fields() {
        write_field(&mut out, field, 1);
    }
    out
}

fn write_field(out: &mut String, field: &Field, depth: usize) {
    let indent = " |   ".repeat(depth - 1);
    let _ = writeln!(
        out,
        "{indent} |-- {}: {} (nullable = {})",
        field.name(),
        type_name(field.data_type()),
        field.is_nullable()
    );

    match field.data_type() {
        DataType::Struct(children) => {
            for child in children {
                write_field(out, child, depth + 1);
            }
        }
        DataType::List(item) | DataType::LargeList(item) => {
            if let DataType::Struct(children) = item.data_type() {
                for child in children {
                    write_field(out, child, depth + 1);
                }
            }
        }
        _ => {}
    }
}

/// Short lowercase name for a column type
pub fn type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "string".to_string(),
        DataType::Boolean => "boolean".to_string(),
        DataType::Int8 => "byte".to_string(),
        DataType::Int16 => "short".to_string(),
        DataType::Int32 => "integer".to_string(),
        DataType::Int64 => "long".to_string(),
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            format!("{data_type:?}").to_lowercase()
        }
        DataType::Float32 => "float".to_string(),
        DataType::Float64 => "double".to_string(),
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => format!("decimal({p},{s})"),
        DataType::Date32 | DataType::Date64 => "date".to_string(),
        DataType::Timestamp(_, _) => "timestamp".to_string(),
        DataType::Null => "void".to_string(),
        DataType::Struct(_) => "struct".to_string(),
        DataType::List(item) | DataType::LargeList(item) => {
            format!("array<{}>", type_name(item.data_type()))
        }
        other => format!("{other:?}").to_lowercase(),
    }
}
