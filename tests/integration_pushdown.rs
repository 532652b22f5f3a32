//! Projection pushdown integration tests
//!
//! Drives the public API end to end: graph construction, consumer
//! requirement aggregation, capability negotiation, actuation, and splicing.

use std::sync::Once;

use pipegraph::config::OptimizerConfig;
use pipegraph::core::error::{PipelineError, PushdownError};
use pipegraph::core::schema::{FieldKind, Schema};
use pipegraph::graph::{
    FieldTransform, OpaqueSink, OutputHandle, PipelineGraph, PipelineNode, RecordSource,
};
use pipegraph::optimizer::{
    FieldAccessDescriptor, ProjectSupport, ProjectSupportSet, ProjectionProducer,
    ProjectionPushdownPass,
};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = flexi_logger::Logger::try_with_str("debug").map(|l| l.start());
    });
}

fn order_schema() -> Schema {
    Schema::new()
        .with_field(
            "user",
            FieldKind::Struct(
                Schema::new()
                    .with_field("id", FieldKind::Int64)
                    .with_field("name", FieldKind::String)
                    .with_field("email", FieldKind::String),
            ),
        )
        .with_field("total", FieldKind::Float64)
        .with_field("ts", FieldKind::Int64)
}

fn fields(names: &[&str]) -> FieldAccessDescriptor {
    FieldAccessDescriptor::with_field_names(names.iter().copied()).expect("valid paths")
}

fn transform(name: &str, reads: &[&str]) -> Box<FieldTransform> {
    Box::new(FieldTransform::new(
        name,
        fields(reads),
        Schema::new().with_field("out", FieldKind::String),
    ))
}

/// Two consumers read `user.id` and `user.id`+`user.name` in source-native
/// order from a source advertising WITHOUT_FIELD_REORDERING: the merged
/// requirement is pushed down and the output keeps native field order.
#[test]
fn test_two_consumers_merge_and_narrow() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new(
            "orders",
            ProjectSupportSet::of(&[ProjectSupport::WithoutFieldReordering]),
        )
        .with_output("main", "orders_ds", order_schema()),
    ));
    let a = graph.add_node(transform("ids", &["user.id"]));
    let b = graph.add_node(transform("names", &["user.id", "user.name"]));
    graph.connect(OutputHandle::new(src, "main"), a).unwrap();
    graph.connect(OutputHandle::new(src, "main"), b).unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.actuated, 1);
    assert!(!graph.contains(src));
    assert!(graph.validate().is_ok());

    let replacement_id = graph.edges()[0].from.node;
    let replacement = graph.node(replacement_id).unwrap();
    let schema = replacement.output_schema("main").unwrap();
    assert_eq!(schema.field_names(), vec!["user"]);
    let user = schema.field("user").unwrap();
    match &user.kind {
        FieldKind::Struct(nested) => assert_eq!(nested.field_names(), vec!["id", "name"]),
        other => panic!("expected struct, got {:?}", other),
    }

    // Both downstream edges now read the replacement's output under the
    // same tag.
    for edge in graph.edges() {
        assert_eq!(edge.from, OutputHandle::new(replacement_id, "main"));
    }
}

/// Consumers that each read in native order must merge into a request the
/// source can serve without reordering, regardless of which consumer is
/// visited first. `totals` contributes `total` before `ids` contributes
/// `user.id`, the reverse of the native field order.
#[test]
fn test_native_order_consumers_push_down_without_reordering() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new(
            "orders",
            ProjectSupportSet::of(&[ProjectSupport::WithoutFieldReordering]),
        )
        .with_output("main", "orders_ds", order_schema()),
    ));
    let totals = graph.add_node(transform("totals", &["total"]));
    let ids = graph.add_node(transform("ids", &["user.id"]));
    graph.connect(OutputHandle::new(src, "main"), totals).unwrap();
    graph.connect(OutputHandle::new(src, "main"), ids).unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    assert_eq!(report.actuated, 1);
    assert_eq!(report.skipped_capability, 0);
    assert!(!graph.contains(src));
    assert!(graph.validate().is_ok());

    let replacement_id = graph.edges()[0].from.node;
    let schema = graph
        .node(replacement_id)
        .unwrap()
        .output_schema("main")
        .unwrap();
    assert_eq!(schema.field_names(), vec!["user", "total"]);
    match &schema.field("user").unwrap().kind {
        FieldKind::Struct(nested) => assert_eq!(nested.field_names(), vec!["id"]),
        other => panic!("expected struct, got {:?}", other),
    }
}

/// A consumer that reads fields out of native order needs
/// WITH_FIELD_REORDERING; a source that does not advertise it is left
/// unmodified.
#[test]
fn test_reordering_consumer_leaves_node_unmodified() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new(
            "orders",
            ProjectSupportSet::of(&[ProjectSupport::WithoutFieldReordering]),
        )
        .with_output("main", "orders_ds", order_schema()),
    ));
    // `total` precedes `user.name` here, the reverse of the native order.
    let sink = graph.add_node(transform("reordered", &["total", "user.name"]));
    graph.connect(OutputHandle::new(src, "main"), sink).unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.actuated, 0);
    assert_eq!(report.skipped_capability, 1);
    assert!(graph.contains(src));
    assert_eq!(
        graph.node(src).unwrap().output_schema("main").unwrap(),
        &order_schema()
    );
}

/// The same reordering request succeeds when the source advertises
/// WITH_FIELD_REORDERING, and the output follows the requested order.
#[test]
fn test_reordering_honored_when_advertised() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new(
            "orders",
            ProjectSupportSet::of(&[ProjectSupport::WithFieldReordering]),
        )
        .with_output("main", "orders_ds", order_schema()),
    ));
    let sink = graph.add_node(transform("reordered", &["total", "user.name"]));
    graph.connect(OutputHandle::new(src, "main"), sink).unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    assert_eq!(report.actuated, 1);

    let replacement_id = graph.edges()[0].from.node;
    let schema = graph
        .node(replacement_id)
        .unwrap()
        .output_schema("main")
        .unwrap();
    assert_eq!(schema.field_names(), vec!["total", "user"]);
}

/// Narrowing one output of a multi-output producer must not alter the field
/// set of its other outputs.
#[test]
fn test_output_isolation_on_multi_output_source() {
    init_logging();
    let audit_schema = Schema::new()
        .with_field("actor", FieldKind::String)
        .with_field("action", FieldKind::String);
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new("orders", ProjectSupportSet::all())
            .with_output("main", "orders_ds", order_schema())
            .with_output("audit", "audit_ds", audit_schema.clone()),
    ));
    let main_reader = graph.add_node(transform("main_reader", &["total"]));
    let audit_reader = graph.add_node(Box::new(OpaqueSink::new("audit_reader")));
    graph
        .connect(OutputHandle::new(src, "main"), main_reader)
        .unwrap();
    graph
        .connect(OutputHandle::new(src, "audit"), audit_reader)
        .unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    // main narrowed; audit skipped because its consumer is opaque.
    assert_eq!(report.actuated, 1);
    assert_eq!(report.skipped_no_benefit, 1);

    let replacement_id = graph.edges()[0].from.node;
    let replacement = graph.node(replacement_id).unwrap();
    assert_eq!(
        replacement.output_schema("main").unwrap().field_names(),
        vec!["total"]
    );
    assert_eq!(
        replacement.output_schema("audit").unwrap(),
        &audit_schema,
        "untargeted output must keep its full field set"
    );
    // Both edges repointed to the single replacement, tags preserved.
    assert_eq!(graph.edges()[1].from, OutputHandle::new(replacement_id, "audit"));
    assert!(graph.validate().is_ok());
}

/// An all-fields consumer absorbs every other requirement; the pass skips
/// actuation because narrowing brings no benefit.
#[test]
fn test_all_fields_consumer_suppresses_pushdown() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new("orders", ProjectSupportSet::all()).with_output(
            "main",
            "orders_ds",
            order_schema(),
        ),
    ));
    let narrow = graph.add_node(transform("narrow", &["user.id"]));
    let opaque = graph.add_node(Box::new(OpaqueSink::new("opaque")));
    graph.connect(OutputHandle::new(src, "main"), narrow).unwrap();
    graph.connect(OutputHandle::new(src, "main"), opaque).unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    assert_eq!(report.actuated, 0);
    assert_eq!(report.skipped_no_benefit, 1);
    assert!(graph.contains(src));
}

/// Unrelated graph regions are untouched by a splice elsewhere.
#[test]
fn test_unrelated_nodes_unaffected() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new("orders", ProjectSupportSet::all()).with_output(
            "main",
            "orders_ds",
            order_schema(),
        ),
    ));
    let reader = graph.add_node(transform("reader", &["ts"]));
    graph.connect(OutputHandle::new(src, "main"), reader).unwrap();

    let other_src = graph.add_node(Box::new(
        RecordSource::new("events", ProjectSupportSet::empty()).with_output(
            "main",
            "events_ds",
            Schema::new().with_field("kind", FieldKind::String),
        ),
    ));
    let other_sink = graph.add_node(Box::new(OpaqueSink::new("other_sink")));
    graph
        .connect(OutputHandle::new(other_src, "main"), other_sink)
        .unwrap();

    let report = ProjectionPushdownPass::default().run(&mut graph).unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.actuated, 1);
    assert!(graph.contains(other_src));
    assert!(graph.contains(other_sink));
    assert_eq!(
        graph.inputs_of(other_sink),
        vec![OutputHandle::new(other_src, "main")]
    );
}

/// A producer that advertises support but refuses the request at actuation
/// time is an implementation defect: the pass aborts with a diagnostic
/// naming the node and the requested fields.
#[derive(Debug, Clone)]
struct LyingSource {
    name: String,
    schema: Schema,
}

impl PipelineNode for LyingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_tags(&self) -> Vec<String> {
        vec!["main".to_string()]
    }

    fn output_schema(&self, tag: &str) -> Option<&Schema> {
        (tag == "main").then_some(&self.schema)
    }

    fn as_projection_producer(&self) -> Option<&dyn ProjectionProducer> {
        Some(self)
    }
}

impl ProjectionProducer for LyingSource {
    fn supports_projection_pushdown(&self) -> ProjectSupportSet {
        ProjectSupportSet::all()
    }

    fn actuate_projection_pushdown(
        &self,
        output_id: &str,
        fields: &FieldAccessDescriptor,
    ) -> Result<Box<dyn PipelineNode>, PushdownError> {
        Err(PushdownError::UnsatisfiableNarrowing {
            node: self.name.clone(),
            output_id: output_id.to_string(),
            fields: fields.to_string(),
            reason: "narrow read path not implemented".to_string(),
        })
    }
}

#[test]
fn test_contract_violation_aborts_pass() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(LyingSource {
        name: "liar".to_string(),
        schema: order_schema(),
    }));
    let sink = graph.add_node(transform("reader", &["total"]));
    graph.connect(OutputHandle::new(src, "main"), sink).unwrap();

    let err = ProjectionPushdownPass::default()
        .run(&mut graph)
        .unwrap_err();
    match err {
        PipelineError::Pushdown(PushdownError::UnsatisfiableNarrowing {
            node, fields, ..
        }) => {
            assert_eq!(node, "liar");
            assert_eq!(fields, "total");
        }
        other => panic!("expected unsatisfiable narrowing, got {}", other),
    }
    // The failing node was never spliced; the graph is still connected.
    assert!(graph.contains(src));
    assert!(graph.validate().is_ok());
}

/// Running the pass a second time treats surviving producers as fresh
/// candidates; with requirements already satisfied it changes nothing.
#[test]
fn test_second_run_is_stable() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new("orders", ProjectSupportSet::all()).with_output(
            "main",
            "orders_ds",
            order_schema(),
        ),
    ));
    let sink = graph.add_node(transform("reader", &["total"]));
    graph.connect(OutputHandle::new(src, "main"), sink).unwrap();

    let pass = ProjectionPushdownPass::default();
    let first = pass.run(&mut graph).unwrap();
    assert_eq!(first.actuated, 1);
    let schema_after_first = graph
        .node(graph.edges()[0].from.node)
        .unwrap()
        .output_schema("main")
        .unwrap()
        .clone();

    let second = pass.run(&mut graph).unwrap();
    assert_eq!(second.candidates, 1);
    let schema_after_second = graph
        .node(graph.edges()[0].from.node)
        .unwrap()
        .output_schema("main")
        .unwrap()
        .clone();
    assert_eq!(schema_after_first, schema_after_second);
    assert!(graph.validate().is_ok());
}

/// A pass disabled by configuration leaves the graph byte-for-byte alone.
#[test]
fn test_configuration_gates_the_pass() {
    init_logging();
    let mut graph = PipelineGraph::new();
    let src = graph.add_node(Box::new(
        RecordSource::new("orders", ProjectSupportSet::all()).with_output(
            "main",
            "orders_ds",
            order_schema(),
        ),
    ));
    let sink = graph.add_node(transform("reader", &["total"]));
    graph.connect(OutputHandle::new(src, "main"), sink).unwrap();

    let pass = ProjectionPushdownPass::new(OptimizerConfig {
        enable_projection_pushdown: false,
        report_pass_stats: true,
    });
    let report = pass.run(&mut graph).unwrap();
    assert_eq!(report.candidates, 0);
    assert!(graph.contains(src));
    assert_eq!(
        graph.node(src).unwrap().output_schema("main").unwrap(),
        &order_schema()
    );
}
