//! Bit-flag schemas (targeting and quality masks).
//!
//! A `Bitmask` is a read-only mapping from bit position to flag label. Decoding
//! never mutates the schema; bits without a label are skipped so masks written
//! by newer pipelines with reserved bits still decode.

use crate::error::{DataModelError, Result};
use anyhow::bail;
use serde::Serialize;
use std::collections::BTreeMap;

/// Highest representable bit position plus one.
pub const MAX_BITS: u8 = 64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// One labelled bit in a schema.
pub struct Flag {
    pub bit: u8,
    pub label: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Named flag schema mapping bit positions to labels.
pub struct Bitmask {
    schema: String,
    description: String,
    flags: BTreeMap<u8, Flag>,
}

impl Bitmask {
    /// Build a schema, rejecting out-of-range bits, duplicate bits and
    /// duplicate labels.
    pub fn new(
        schema: impl Into<String>,
        description: impl Into<String>,
        flags: Vec<Flag>,
    ) -> anyhow::Result<Self> {
        let schema = schema.into();
        if schema.trim().is_empty() {
            bail!("bitmask schema name must not be empty");
        }

        let mut by_bit = BTreeMap::new();
        for flag in flags {
            if flag.bit >= MAX_BITS {
                bail!(
                    "bitmask {schema}: bit {} for '{}' exceeds {} bits",
                    flag.bit,
                    flag.label,
                    MAX_BITS
                );
            }
            if flag.label.trim().is_empty() {
                bail!("bitmask {schema}: bit {} has an empty label", flag.bit);
            }
            if by_bit
                .values()
                .any(|existing: &Flag| existing.label.eq_ignore_ascii_case(&flag.label))
            {
                bail!("bitmask {schema}: label '{}' used twice", flag.label);
            }
            let bit = flag.bit;
            if by_bit.insert(bit, flag).is_some() {
                bail!("bitmask {schema}: bit {bit} defined twice");
            }
        }

        Ok(Self {
            schema,
            description: description.into(),
            flags: by_bit,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Defined flags in ascending bit order.
    pub fn flags(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }

    /// Bit position for a label (case-insensitive).
    pub fn bit(&self, label: &str) -> Option<u8> {
        let wanted = label.trim();
        self.flags
            .values()
            .find(|flag| flag.label.eq_ignore_ascii_case(wanted))
            .map(|flag| flag.bit)
    }

    /// Labels of every set bit, ascending by bit position.
    ///
    /// Set bits without a label are ignored.
    pub fn decode(&self, mask: u64) -> Vec<&str> {
        self.flags
            .values()
            .filter(|flag| mask & (1u64 << flag.bit) != 0)
            .map(|flag| flag.label.as_str())
            .collect()
    }

    /// Inverse of [`decode`](Self::decode): OR together the bits for `labels`.
    pub fn encode<S: AsRef<str>>(&self, labels: &[S]) -> Result<u64> {
        labels.iter().try_fold(0u64, |mask, label| {
            let label = label.as_ref();
            let bit = self.bit(label).ok_or_else(|| DataModelError::UnknownFlag {
                schema: self.schema.clone(),
                label: label.to_string(),
            })?;
            Ok(mask | (1u64 << bit))
        })
    }
}
