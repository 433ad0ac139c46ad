use crate::analysis::details::NodeContext;
use crate::analysis::pass::Pass;
use crate::analysis::value::{FieldDecl, Value, ValueKind};
use crate::analysis::AnalysisResult;
use crate::asg::Call;

/// Copies one operator attribute (e.g. `strides`, `padding`) as a sequence
/// of integers into the detail field of the same name.
///
/// Calls without the attribute get no field. An attribute that is not
/// integer-valued is an anomaly.
#[derive(Debug, Clone)]
pub struct AttributePass {
    key: String,
    name: String,
}

impl AttributePass {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string(), name: format!("attribute:{}", key) }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Pass for AttributePass {
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new(self.key.clone(), ValueKind::Seq)]
    }

    fn on_call(&self, _: &mut (), call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        let Some(attr) = call.attrs.get(&self.key) else {
            return Ok(());
        };
        match attr.as_ints() {
            Some(values) => cx.set(&self.key, Value::from_ints(values)),
            None => {
                cx.anomaly(format!("attribute '{}' is not integer-valued: {:?}", self.key, attr));
                Ok(())
            }
        }
    }
}
