//! Integration tests for the walker, the pass contract and the pipeline.

use asgscope::analysis::passes::{
    self, HistogramPass, InputShapesPass, OpNamePass, OutputShapePass, VisitIndexPass, INDEX, OP, OUTPUT_SHAPE,
};
use asgscope::analysis::{
    AnalysisError, AnalysisResult, AnyPass, DetailStore, FieldDecl, NodeContext, Pass, Pipeline, Summary, Value,
    ValueKind, Walker,
};
use asgscope::asg::{Asg, Call, Node, NodeId, NodeKind, ResultType, VarRole};
use asgscope::zoo;
use std::collections::BTreeMap;

fn tensor(shape: &[usize]) -> ResultType {
    ResultType::Tensor(shape.to_vec())
}

fn pipeline(passes: Vec<Box<dyn AnyPass>>) -> Pipeline {
    Pipeline::new(passes).expect("valid pipeline")
}

/// `add(relu(x), relu(x))` where both operands are the same `relu` node.
fn shared_operand() -> Asg {
    let mut asg = Asg::new("shared");
    let x = asg.add_var("x", VarRole::Input, tensor(&[1, 8]));
    let r = asg.add_call(Call::new("nn.relu", vec![x], tensor(&[1, 8]))).unwrap();
    let y = asg.add_call(Call::new("add", vec![r, r], tensor(&[1, 8]))).unwrap();
    asg.set_output(y);
    asg
}

// --- Test passes ---

/// Counts reachable leaves in its per-run state.
struct LeafCountPass;

impl Pass for LeafCountPass {
    type State = i64;

    fn name(&self) -> &str {
        "leaf_count"
    }

    fn on_leaf(&self, count: &mut i64, _node: &Node) {
        *count += 1;
    }

    fn on_summarize(&self, count: i64, _details: &DetailStore) -> Option<Summary> {
        Some(Summary::from([("leaves".to_string(), Value::Int(count))]))
    }
}

/// Writes a field it never declared.
struct SneakyWritePass;

impl Pass for SneakyWritePass {
    type State = ();

    fn name(&self) -> &str {
        "sneaky_write"
    }

    fn on_call(&self, _: &mut (), _call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        cx.set("secret", Value::Int(1))
    }
}

/// Reads `op` without declaring it.
struct SneakyReadPass;

impl Pass for SneakyReadPass {
    type State = ();

    fn name(&self) -> &str {
        "sneaky_read"
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new("op_len", ValueKind::Int)]
    }

    fn on_call(&self, _: &mut (), _call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        let len = cx.get(OP)?.map_or(0, |v| v.to_string().len());
        cx.set("op_len", Value::Int(len as i64))
    }
}

/// Declares an integer field and writes a string into it.
struct WrongKindPass;

impl Pass for WrongKindPass {
    type State = ();

    fn name(&self) -> &str {
        "wrong_kind"
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new("arity", ValueKind::Int)]
    }

    fn on_call(&self, _: &mut (), call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        cx.set("arity", Value::from(call.args.len().to_string()))
    }
}

/// Writes `write` and reads `read`; used to build dependency graphs.
struct LinkPass {
    name: &'static str,
    write: &'static str,
    read: &'static str,
}

impl Pass for LinkPass {
    type State = ();

    fn name(&self) -> &str {
        self.name
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new(self.write, ValueKind::Int)]
    }

    fn reads(&self) -> Vec<String> {
        vec![self.read.to_string()]
    }
}

// --- Runs ---

#[test]
fn single_operator_graph() {
    let mut asg = Asg::new("one");
    let add = asg.add_call(Call::new("add", vec![], tensor(&[1, 3]))).unwrap();
    asg.set_output(add);

    let pipeline = pipeline(vec![
        Box::new(OpNamePass),
        Box::new(VisitIndexPass),
        Box::new(OutputShapePass),
        Box::new(HistogramPass::new(OP)),
    ]);
    let run = pipeline.run(&asg).unwrap();

    let expected = BTreeMap::from([
        (OP.to_string(), Value::from("add")),
        (INDEX.to_string(), Value::Int(0)),
        (OUTPUT_SHAPE.to_string(), Value::from_ints([1, 3])),
    ]);
    assert_eq!(run.details.len(), 1);
    assert_eq!(run.details.get(add), Some(&expected));
    assert_eq!(run.summary, Summary::from([("add".to_string(), Value::Int(1))]));
    assert!(run.anomalies.is_empty());
    assert_eq!(run.model, "one");
}

#[test]
fn shared_nodes_are_recorded_once() {
    let asg = shared_operand();
    let run = pipeline(passes::standard()).run(&asg).unwrap();

    assert_eq!(run.details.len(), 2);
    assert_eq!(
        run.summary,
        Summary::from([("add".to_string(), Value::Int(1)), ("nn.relu".to_string(), Value::Int(1))])
    );
    // Both argument positions see the same recorded shape.
    let inputs = run.details.field(NodeId(2), passes::INPUT_SHAPES).unwrap();
    assert_eq!(inputs.at(0), Some(&Value::from_ints([1, 8])));
    assert_eq!(inputs.at(1), Some(&Value::from_ints([1, 8])));
}

#[test]
fn arguments_are_indexed_before_their_consumers() {
    for entry in zoo::catalog() {
        let asg = (entry.build)().unwrap();
        let run = pipeline(passes::standard()).run(&asg).unwrap();

        for (id, details) in run.details.iter() {
            let Some(Value::Int(own)) = details.get(INDEX) else {
                panic!("{}: node {} has no index", entry.name, id);
            };
            let node = asg.get_node(id).unwrap();
            for &arg in node.args() {
                if let Some(Value::Int(arg_index)) = run.details.field(arg, INDEX) {
                    assert!(arg_index < own, "{}: {} visited before its argument {}", entry.name, id, arg);
                }
            }
        }
    }
}

#[test]
fn every_reachable_call_appears_exactly_once() {
    let asg = zoo::resnet_tiny().unwrap();
    let run = pipeline(passes::standard()).run(&asg).unwrap();

    let reachable_calls: Vec<NodeId> = Walker::order(&asg)
        .unwrap()
        .into_iter()
        .filter(|&id| matches!(asg.get_node(id).unwrap().kind, NodeKind::Call(_)))
        .collect();
    let recorded: Vec<NodeId> = run.details.iter().map(|(id, _)| id).collect();
    assert_eq!(recorded, reachable_calls);
}

#[test]
fn fields_do_not_depend_on_unrelated_passes() {
    let asg = zoo::lenet().unwrap();
    let alone = pipeline(vec![Box::new(OpNamePass)]).run(&asg).unwrap();
    let together = pipeline(passes::standard()).run(&asg).unwrap();

    assert_eq!(alone.details.len(), together.details.len());
    for (id, details) in alone.details.iter() {
        assert_eq!(details.get(OP), together.details.field(id, OP));
    }
}

#[test]
fn pass_state_is_fresh_for_every_run() {
    let asg = shared_operand();
    let pipeline = pipeline(vec![Box::new(VisitIndexPass), Box::new(LeafCountPass)]);

    let first = pipeline.run(&asg).unwrap();
    let second = pipeline.run(&asg).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.details.field(NodeId(1), INDEX), Some(&Value::Int(0)));
    assert_eq!(second.summary.get("leaves"), Some(&Value::Int(1)));
}

#[test]
fn unrecognized_result_type_is_an_anomaly() {
    let mut asg = Asg::new("opaque");
    let x = asg.add_var("x", VarRole::Input, tensor(&[1, 3]));
    let f = asg
        .add_call(Call::new("make_closure", vec![], ResultType::Opaque("fn".to_string())))
        .unwrap();
    let y = asg.add_call(Call::new("apply", vec![x, f], tensor(&[1, 3]))).unwrap();
    asg.set_output(y);

    let run = pipeline(passes::standard()).run(&asg).unwrap();
    assert_eq!(run.anomalies.len(), 1);
    assert_eq!(run.anomalies[0].node, f);
    assert_eq!(run.anomalies[0].pass, "output_shape");
    assert_eq!(run.details.field(f, OUTPUT_SHAPE), None);
    assert_eq!(run.details.field(f, OP), Some(&Value::from("make_closure")));
}

#[test]
fn non_integer_attribute_is_an_anomaly() {
    let mut asg = Asg::new("float_attr");
    let x = asg.add_var("x", VarRole::Input, tensor(&[1, 3, 8, 8]));
    let y = asg
        .add_call(Call::new("nn.max_pool2d", vec![x], tensor(&[1, 3, 4, 4])).with_attr("strides", 0.5))
        .unwrap();
    asg.set_output(y);

    let run = pipeline(passes::standard()).run(&asg).unwrap();
    assert_eq!(run.anomalies.len(), 1);
    assert_eq!(run.anomalies[0].node, y);
    assert_eq!(run.anomalies[0].pass, "attribute:strides");
    assert_eq!(run.details.field(y, "strides"), None);
    assert_eq!(run.details.field(y, OP), Some(&Value::from("nn.max_pool2d")));
}

#[test]
fn constant_arguments_contribute_their_array_shape() {
    let mut asg = Asg::new("constant_arg");
    let k = asg.add_constant("k", ndarray::ArrayD::zeros(ndarray::IxDyn(&[2, 5])));
    let x = asg.add_var("x", VarRole::Input, tensor(&[2, 5]));
    let y = asg.add_call(Call::new("multiply", vec![k, x], tensor(&[2, 5]))).unwrap();
    asg.set_output(y);

    let run = pipeline(passes::standard()).run(&asg).unwrap();
    assert!(run.anomalies.is_empty());
    let inputs = run.details.field(y, passes::INPUT_SHAPES).unwrap();
    assert_eq!(inputs.at(0), Some(&Value::from_ints([2, 5])));
    assert_eq!(inputs.at(1), Some(&Value::from_ints([2, 5])));
}

// --- Contract violations ---

#[test]
fn summary_collision_aborts_the_run() {
    let pipeline = pipeline(vec![
        Box::new(OpNamePass),
        Box::new(HistogramPass::new(OP)),
        Box::new(HistogramPass::new(OP)),
    ]);
    let err = pipeline.run(&shared_operand()).unwrap_err();
    assert!(matches!(err, AnalysisError::SummaryCollision { ref field, .. } if field == "add"));
}

#[test]
fn duplicate_field_owner_is_rejected() {
    let err = Pipeline::new(vec![Box::new(OpNamePass), Box::new(OpNamePass)]).err();
    assert_eq!(
        err,
        Some(AnalysisError::DuplicateField {
            field: OP.to_string(),
            first: "op_name".to_string(),
            second: "op_name".to_string(),
        })
    );
}

#[test]
fn read_without_writer_is_rejected() {
    let err = Pipeline::new(vec![Box::new(InputShapesPass)]).err();
    assert!(matches!(err, Some(AnalysisError::UnmetDependency { ref field, .. }) if field == OUTPUT_SHAPE));
}

#[test]
fn dependency_cycle_is_rejected() {
    let err = Pipeline::new(vec![
        Box::new(LinkPass { name: "a", write: "a", read: "b" }),
        Box::new(LinkPass { name: "b", write: "b", read: "a" }),
    ])
    .err();
    assert!(matches!(err, Some(AnalysisError::DependencyCycle(_))));
}

#[test]
fn dependencies_are_scheduled_first() {
    let pipeline = pipeline(vec![
        Box::new(InputShapesPass),
        Box::new(OpNamePass),
        Box::new(OutputShapePass),
    ]);
    assert_eq!(pipeline.pass_names(), vec!["op_name", "output_shape", "input_shapes"]);

    let run = pipeline.run(&shared_operand()).unwrap();
    let inputs = run.details.field(NodeId(2), passes::INPUT_SHAPES).unwrap();
    assert_eq!(inputs.at(1), Some(&Value::from_ints([1, 8])));
}

#[test]
fn undeclared_write_is_fatal() {
    let err = pipeline(vec![Box::new(SneakyWritePass)]).run(&shared_operand()).unwrap_err();
    assert_eq!(
        err,
        AnalysisError::UndeclaredWrite { pass: "sneaky_write".to_string(), field: "secret".to_string() }
    );
}

#[test]
fn undeclared_read_is_fatal() {
    let err = pipeline(vec![Box::new(OpNamePass), Box::new(SneakyReadPass)])
        .run(&shared_operand())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UndeclaredRead { ref field, .. } if field == OP));
}

#[test]
fn kind_mismatch_is_fatal() {
    let err = pipeline(vec![Box::new(WrongKindPass)]).run(&shared_operand()).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::KindMismatch { expected: ValueKind::Int, actual: ValueKind::Str, .. }
    ));
}

// --- Multiple models ---

#[test]
fn run_all_keeps_input_order_and_isolates_failures() {
    let mut cyclic = Asg::new("cyclic");
    for (id, arg) in [(0, 1), (1, 0)] {
        cyclic.nodes.push(Node {
            id: NodeId(id),
            kind: NodeKind::Call(Call::new("nn.relu", vec![NodeId(arg)], tensor(&[1]))),
        });
    }
    cyclic.set_output(NodeId(0));

    let graphs = vec![zoo::mlp().unwrap(), cyclic, zoo::lenet().unwrap(), shared_operand()];
    let pipeline = pipeline(passes::standard());
    let results = pipeline.run_all(&graphs);

    assert_eq!(results.len(), 4);
    assert!(results[1].is_err());
    for (i, graph) in graphs.iter().enumerate().filter(|(i, _)| *i != 1) {
        let run = results[i].as_ref().unwrap();
        assert_eq!(run.model, graph.name);
        assert_eq!(run, &pipeline.run(graph).unwrap());
    }
}
