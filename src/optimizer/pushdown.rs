//! 投影下推优化遍
//!
//! 在管道构建阶段对内存图运行一次。对每个实现 `ProjectionProducer`
//! 的节点，聚合下游消费者实际读取的字段，按节点声明的能力集做门控，
//! 执行下推并把替换节点接回图中。任何跳过路径都不改动图；一个节点
//! 要么被完整替换且所有输出边重新指向，要么保持原样。

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::OptimizerConfig;
use crate::core::error::{GraphError, PipelineError, PipelineResult, PushdownError};
use crate::graph::node::{NodeId, OutputHandle, PipelineNode};
use crate::graph::PipelineGraph;
use crate::optimizer::capability::ProjectSupport;
use crate::optimizer::field_access::FieldAccessDescriptor;

/// 单次运行的结果统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// 实现能力接口的节点数
    pub candidates: usize,
    /// 实际被收窄的输出数
    pub actuated: usize,
    /// 因合并需求为全字段而跳过的输出数
    pub skipped_no_benefit: usize,
    /// 因声明的能力集不足而跳过的输出数
    pub skipped_capability: usize,
}

/// 一次计划中的下推：目标输出及合并后的字段需求
#[derive(Debug)]
struct OutputPlan {
    output_id: String,
    fields: FieldAccessDescriptor,
}

pub struct ProjectionPushdownPass {
    config: OptimizerConfig,
}

impl ProjectionPushdownPass {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        "ProjectionPushdown"
    }

    /// 对图运行本遍。每个节点只访问一次；运行中接入的替换节点
    /// 不会被重新访问。
    pub fn run(&self, graph: &mut PipelineGraph) -> PipelineResult<PassReport> {
        let mut report = PassReport::default();
        if !self.config.enable_projection_pushdown {
            debug!("projection pushdown disabled by configuration");
            return Ok(report);
        }

        for id in graph.node_ids() {
            let is_candidate = graph
                .node(id)
                .map(|n| n.as_projection_producer().is_some())
                .unwrap_or(false);
            if !is_candidate {
                continue;
            }
            report.candidates += 1;

            let plans = self.plan_node(graph, id, &mut report)?;
            if plans.is_empty() {
                continue;
            }
            let actuated = plans.len();
            let new_id = self.apply(graph, id, plans)?;
            debug!("node {} replaced by {} after pushdown", id, new_id);
            report.actuated += actuated;
        }

        graph.validate()?;
        if self.config.report_pass_stats {
            let rendered = serde_json::to_string(&report)
                .unwrap_or_else(|_| format!("{:?}", report));
            info!("projection pushdown report: {}", rendered);
        }
        Ok(report)
    }

    /// 针对候选节点的每个输出，决定是否下推以及合并后的描述符。
    /// 不修改图。
    fn plan_node(
        &self,
        graph: &PipelineGraph,
        id: NodeId,
        report: &mut PassReport,
    ) -> PipelineResult<Vec<OutputPlan>> {
        let node = graph.node(id).ok_or(GraphError::NodeNotFound(id))?;
        let producer = node.as_projection_producer().ok_or_else(|| {
            PipelineError::Internal(format!("node {} is not a projection producer", id))
        })?;
        let support = producer.supports_projection_pushdown();

        let mut plans = Vec::new();
        for tag in node.output_tags() {
            let handle = OutputHandle::new(id, tag.clone());
            let consumers = graph.consumers_of(&handle);
            if consumers.is_empty() {
                continue;
            }
            let schema = node
                .output_schema(&tag)
                .ok_or_else(|| GraphError::UnknownOutputTag {
                    node: node.name().to_string(),
                    tag: tag.clone(),
                })?;
            let native = schema.field_names();

            // 对所有下游读取点求并集；能力等级按单个消费者判定，
            // 因为并集会丢失各消费者自身的顺序。
            let mut merged = FieldAccessDescriptor::empty();
            let mut required = ProjectSupport::WithoutFieldReordering;
            for (consumer_id, input_index) in consumers {
                let consumer = graph
                    .node(consumer_id)
                    .ok_or(GraphError::NodeNotFound(consumer_id))?;
                let descriptor = consumer
                    .required_fields(input_index)
                    .unwrap_or_else(FieldAccessDescriptor::all);
                if !descriptor.is_all_fields() && !descriptor.preserves_order(&native) {
                    required = ProjectSupport::WithFieldReordering;
                }
                debug!(
                    "output {} consumer '{}' requires [{}]",
                    handle,
                    consumer.name(),
                    descriptor
                );
                merged = merged.union(&descriptor);
            }

            if merged.is_all_fields() {
                debug!("output {}: all fields required, no benefit", handle);
                report.skipped_no_benefit += 1;
                continue;
            }
            if !support.satisfies(required) {
                debug!(
                    "output {}: requires {} but node '{}' advertises {}",
                    handle,
                    required,
                    node.name(),
                    support
                );
                report.skipped_capability += 1;
                continue;
            }
            merged
                .validate(schema)
                .map_err(|e| PushdownError::MalformedDescriptor {
                    node: node.name().to_string(),
                    output_id: tag.clone(),
                    source: e,
                })?;
            // 合并结果的插入顺序是消费者访问顺序的偶然产物。没有消费者
            // 要求重排时，规整为原生顺序，避免产出端误判为重排请求。
            let fields = if required == ProjectSupport::WithoutFieldReordering {
                merged.sorted_by_field_order(&native)
            } else {
                merged
            };
            plans.push(OutputPlan {
                output_id: tag,
                fields,
            });
        }
        Ok(plans)
    }

    /// 执行所有计划中的下推并接入最终替换节点。
    ///
    /// 多输出的下推是链式的：每次下推返回完整的替换节点，下一个
    /// 输出在其上继续下推。此处的下推失败意味着产出端违反了它在
    /// 规划阶段声明的能力，整遍中止。
    fn apply(
        &self,
        graph: &mut PipelineGraph,
        id: NodeId,
        plans: Vec<OutputPlan>,
    ) -> PipelineResult<NodeId> {
        let mut current: Option<Box<dyn PipelineNode>> = None;
        for plan in &plans {
            let replacement = {
                let node: &dyn PipelineNode = match &current {
                    Some(node) => &**node,
                    None => graph.node(id).ok_or(GraphError::NodeNotFound(id))?,
                };
                let producer = node.as_projection_producer().ok_or_else(|| {
                    PushdownError::ReplacementNotProducer {
                        node: node.name().to_string(),
                    }
                })?;
                producer
                    .actuate_projection_pushdown(&plan.output_id, &plan.fields)
                    .map_err(|e| {
                        warn!(
                            "actuation failed on node '{}' output '{}' for [{}]: {}",
                            node.name(),
                            plan.output_id,
                            plan.fields,
                            e
                        );
                        e
                    })?
            };
            info!(
                "pushed projection [{}] into output '{}' of node {}",
                plan.fields, plan.output_id, id
            );
            current = Some(replacement);
        }

        let replacement = current.ok_or_else(|| {
            PipelineError::Internal(format!("no actuation produced for node {}", id))
        })?;
        // 接入的节点必须仍满足该位置的图约定
        if replacement.as_projection_producer().is_none() {
            return Err(PushdownError::ReplacementNotProducer {
                node: replacement.name().to_string(),
            }
            .into());
        }
        graph.replace_node(id, replacement)
    }
}

impl Default for ProjectionPushdownPass {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}
