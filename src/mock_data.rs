use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::{Builder, Uuid};

use crate::contract::{ColumnType, Contract};

// ─── Constants ───────────────────────────────────────────────────

/// String length used when a column declares no max length.
const DEFAULT_STRING_LEN: usize = 10;

/// Decimal mantissas span 96 bits, scales 0..10.
const DECIMAL_MANTISSA_BITS: u32 = 96;
const DECIMAL_MAX_SCALE: u8 = 10;

// ─── Values ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Guid(Uuid),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Decimal { mantissa: i128, scale: u8 },
    DateTime(DateTime<Utc>),
    Text(String),
    Bool(bool),
}

/// One generated row, values in contract column order.
pub type Row = Vec<Value>;

// ─── Generator ───────────────────────────────────────────────────

/// Fills rows with random values matching a [`Contract`].
pub struct RowGenerator {
    rng: StdRng,
}

impl RowGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Same seed, same rows (except `DateTime`, which is always "now").
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rows(&mut self, contract: &Contract, count: usize) -> Vec<Row> {
        (0..count).map(|_| self.row(contract)).collect()
    }

    pub fn row(&mut self, contract: &Contract) -> Row {
        contract
            .columns
            .iter()
            .map(|c| self.value(c.ty, c.max_length))
            .collect()
    }

    fn value(&mut self, ty: ColumnType, max_length: Option<usize>) -> Value {
        let rng = &mut self.rng;
        match ty {
            ColumnType::Guid => Value::Guid(Builder::from_random_bytes(rng.gen()).into_uuid()),
            ColumnType::Byte => Value::Byte(rng.gen()),
            ColumnType::Short => Value::Short(rng.gen_range(0..i16::MAX)),
            ColumnType::Int => Value::Int(rng.gen_range(0..i32::MAX)),
            ColumnType::Long => Value::Long(rng.gen_range(0..i64::MAX)),
            ColumnType::Float => Value::Float(rng.gen_range(-1.0e6f32..1.0e6)),
            ColumnType::Decimal => Value::Decimal {
                mantissa: rng.gen_range(0..1i128 << DECIMAL_MANTISSA_BITS),
                scale: rng.gen_range(0..DECIMAL_MAX_SCALE),
            },
            ColumnType::DateTime => Value::DateTime(Utc::now()),
            ColumnType::String => {
                let len = max_length.unwrap_or(DEFAULT_STRING_LEN);
                Value::Text(
                    rng.sample_iter(&Alphanumeric)
                        .take(len)
                        .map(char::from)
                        .collect(),
                )
            }
            ColumnType::Bool => Value::Bool(rng.gen()),
        }
    }
}

impl Default for RowGenerator {
    fn default() -> Self {
        Self::new()
    }
}
