//! Column definition rendering.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::Column;
use crate::templates::placeholder;

/// Groups of column types sharing the same type arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTypeFamily {
    /// `decimal`, `numeric`: `(precision,scale)`.
    Exact,
    /// `float`, `real`: `(precision)`.
    Approximate,
    /// `time`, `datetime2`, `datetimeoffset`: `(scale)`.
    FractionalTime,
    /// `char`, `varchar`: length in bytes, plus collation.
    Character,
    /// `nchar`, `nvarchar`: length in characters, plus collation.
    UnicodeCharacter,
    /// `text`, `ntext`: collation only.
    Text,
    /// `binary`: fixed length.
    Binary,
    /// `varbinary`: length or `MAX`.
    VarBinary,
    /// Every other type, rendered bare.
    Plain,
}

impl ColumnTypeFamily {
    /// Classifies a type name. Matching is exact and case-sensitive.
    #[must_use]
    pub fn of(type_name: &str) -> Self {
        match type_name {
            "decimal" | "numeric" => Self::Exact,
            "float" | "real" => Self::Approximate,
            "time" | "datetime2" | "datetimeoffset" => Self::FractionalTime,
            "char" | "varchar" => Self::Character,
            "nchar" | "nvarchar" => Self::UnicodeCharacter,
            "text" | "ntext" => Self::Text,
            "binary" => Self::Binary,
            "varbinary" => Self::VarBinary,
            _ => Self::Plain,
        }
    }

    /// Returns the placeholder values contributed by this family.
    fn arguments(self, column: &Column) -> Vec<(&'static str, String)> {
        let collate = || {
            column
                .collation_name
                .as_deref()
                .filter(|c| !c.is_empty())
                .map(|c| (placeholder::COLLATE, format!("COLLATE {c}")))
        };

        match self {
            Self::Exact => vec![(
                placeholder::PRECISION_AND_SCALE,
                format!("{},{}", column.type_precision, column.type_scale),
            )],
            Self::Approximate => vec![(
                placeholder::PRECISION_AND_SCALE,
                column.type_precision.to_string(),
            )],
            Self::FractionalTime => vec![(
                placeholder::PRECISION_AND_SCALE,
                column.type_scale.to_string(),
            )],
            Self::Character | Self::UnicodeCharacter => {
                let length = match column.type_max_length {
                    -1 => "MAX".to_string(),
                    bytes if self == Self::UnicodeCharacter => (bytes / 2).to_string(),
                    bytes => bytes.to_string(),
                };
                let mut arguments = vec![(placeholder::COLUMN_MAX_LENGTH, length)];
                arguments.extend(collate());
                arguments
            }
            Self::Text => collate().into_iter().collect(),
            Self::Binary => vec![(
                placeholder::COLUMN_MAX_LENGTH,
                column.type_max_length.to_string(),
            )],
            Self::VarBinary => {
                let length = match column.type_max_length {
                    -1 => "MAX".to_string(),
                    bytes => bytes.to_string(),
                };
                vec![(placeholder::COLUMN_MAX_LENGTH, length)]
            }
            Self::Plain => Vec::new(),
        }
    }
}

/// Stands in for the column name while the template is cleaned, so that only
/// template text is ever stripped or collapsed.
const NAME_SLOT: &str = "\u{1}ColumnName\u{1}";

/// Fills a column template and strips whatever placeholders were left over.
/// `name` is inserted verbatim once the definition is clean.
pub fn render(template: &str, column: &Column, name: &str) -> String {
    let mut arguments = vec![
        (placeholder::COLUMN_NAME, NAME_SLOT.to_string()),
        (placeholder::COLUMN_TYPE, column.type_name.to_uppercase()),
        (
            placeholder::IS_NULLABLE,
            if column.is_nullable { "NULL" } else { "NOT NULL" }.to_string(),
        ),
    ];
    if column.is_identity {
        arguments.push((
            placeholder::IDENTITY,
            format!(
                "IDENTITY({},{})",
                column.identity_seed_value.unwrap_or(1),
                column.identity_increment_value.unwrap_or(1)
            ),
        ));
    }
    arguments.extend(ColumnTypeFamily::of(&column.type_name).arguments(column));

    let mut statement = template.to_string();
    for (token, value) in &arguments {
        statement = statement.replace(token, value);
    }
    clean(&statement).replace(NAME_SLOT, name)
}

/// Removes unfilled placeholders and empty parentheses, then normalizes
/// whitespace.
pub fn clean(statement: &str) -> String {
    let statement = placeholder_re().replace_all(statement, "");
    let statement = empty_parens_re().replace_all(&statement, "");
    let statement = whitespace_re().replace_all(&statement, " ");
    statement.trim_end().to_string()
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[A-Za-z]+\}").expect("valid regex"))
}

fn empty_parens_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\s*\)").expect("valid regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}
