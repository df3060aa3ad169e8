//! Inference statistics: the append-only record of what each step produced.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::atom::Handle;

/// One recorded step: the chosen source, the applied rule, and the product
/// set. `source` is `None` for the apply-all-rules regime, which runs without
/// a chosen source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub source: Option<Handle>,
    pub rule: String,
    pub products: HashSet<Handle>,
}

/// Append-only log of inference records, in step order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainStats {
    records: Vec<InferenceRecord>,
}

impl ChainStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step's record.
    pub fn add_inference_record(
        &mut self,
        source: Option<Handle>,
        rule: impl Into<String>,
        products: HashSet<Handle>,
    ) {
        self.records.push(InferenceRecord {
            source,
            rule: rule.into(),
            products,
        });
    }

    /// Records in the order the steps ran.
    pub fn records(&self) -> &[InferenceRecord] {
        &self.records
    }

    /// The union of every recorded product set — the chain's public result.
    pub fn all_products(&self) -> HashSet<Handle> {
        let mut out = HashSet::new();
        for record in &self.records {
            out.extend(record.products.iter().copied());
        }
        out
    }
}
