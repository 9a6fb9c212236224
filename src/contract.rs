//! Table schema ("contract") the benchmark generates rows for.
//!
//! One column per line:
//!
//! ```text
//! id;        guid
//! login;     string(32)
//! balance;   decimal
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Guid,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Decimal,
    DateTime,
    String,
    Bool,
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "guid" => Self::Guid,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "decimal" => Self::Decimal,
            "datetime" => Self::DateTime,
            "string" => Self::String,
            "bool" => Self::Bool,
            other => return Err(format!("unknown column type `{other}`")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contract {
    pub columns: Vec<Column>,
}

impl Contract {
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let columns = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| parse_column(line).map_err(|message| BenchError::Contract { line: i + 1, message }))
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(BenchError::Contract {
                line: 0,
                message: "no columns declared".into(),
            });
        }
        Ok(Self { columns })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn parse_column(line: &str) -> std::result::Result<Column, String> {
    let mut parts = line.split(';').map(str::trim).filter(|p| !p.is_empty());
    let name = parts.next().ok_or("missing column name")?;
    let ty = parts.next().ok_or_else(|| format!("column `{name}` has no type"))?;

    let (ty, max_length) = match ty.split_once('(') {
        Some((base, rest)) => {
            let len = rest
                .strip_suffix(')')
                .ok_or_else(|| format!("unclosed length in `{ty}`"))?;
            let len = len
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("bad length `{len}`: {e}"))?;
            (base.trim(), Some(len))
        }
        None => (ty, None),
    };

    Ok(Column {
        name: name.to_owned(),
        ty: ty.parse()?,
        max_length,
    })
}
