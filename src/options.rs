//! Bintype and template records, plus the product key built from them.

use serde::Serialize;
use std::fmt;

/// Largest bintype or template id a catalog may declare.
pub const MAX_OPTION_ID: u32 = 9999;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Spatial binning scheme used to produce a data product.
pub struct BinType {
    pub name: String,
    pub id: u32,
    pub binned: bool,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Reference model set used during processing (e.g., stellar kinematics templates).
pub struct Template {
    pub name: String,
    pub id: u32,
    pub description: String,
}

impl fmt::Display for BinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Key identifying which processing configuration produced a product.
///
/// Legacy products are addressed by bintype name plus an iteration number;
/// later ones by a `<BINTYPE>-<TEMPLATE>` string.
pub enum DapType {
    Legacy { bintype: String, niter: u64 },
    Modern(String),
}

impl DapType {
    /// `None` when the iteration number does not fit in a `u64`.
    pub(crate) fn legacy(bintype: &BinType, template: &Template) -> Option<Self> {
        Some(Self::Legacy {
            bintype: bintype.name.clone(),
            niter: concat_digits(template.id, bintype.id)?,
        })
    }

    pub(crate) fn modern(bintype: &BinType, template: &Template) -> Self {
        Self::Modern(format!("{}-{}", bintype.name, template.name))
    }
}

impl fmt::Display for DapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DapType::Legacy { bintype, niter } => write!(f, "{bintype}-{niter:03}"),
            DapType::Modern(daptype) => f.write_str(daptype),
        }
    }
}

// Decimal concatenation: (2, 3) -> 23, (1, 10) -> 110.
fn concat_digits(high: u32, low: u32) -> Option<u64> {
    let mut scale: u64 = 10;
    while scale <= u64::from(low) {
        scale = scale.checked_mul(10)?;
    }
    u64::from(high)
        .checked_mul(scale)?
        .checked_add(u64::from(low))
}
