use crate::analysis::details::{DetailStore, Summary};
use crate::analysis::pass::Pass;
use crate::analysis::value::Value;

/// Counts how often each distinct value of a detail field occurs.
///
/// The summary has one entry per distinct value, keyed by the value's text
/// form. Nodes without the field are not counted.
#[derive(Debug, Clone)]
pub struct HistogramPass {
    field: String,
    name: String,
}

impl HistogramPass {
    pub fn new(field: &str) -> Self {
        Self { field: field.to_string(), name: format!("histogram:{}", field) }
    }
}

impl Pass for HistogramPass {
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn on_summarize(&self, _: (), details: &DetailStore) -> Option<Summary> {
        let mut counts = Summary::new();
        for (_, entry) in details.iter() {
            if let Some(value) = entry.get(&self.field) {
                let slot = counts.entry(value.to_string()).or_insert(Value::Int(0));
                if let Value::Int(n) = slot {
                    *n += 1;
                }
            }
        }
        Some(counts)
    }
}
