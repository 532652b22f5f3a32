//! PipeGraph 统一错误处理
//!
//! 分层设计：模式、图结构、下推协议各有自己的错误枚举，由
//! `PipelineError` 通过 `#[from]` 汇总，调用方可直接用 `?` 传播。
//! 优化器抛出的每个变体都携带涉事节点及（如适用）请求的字段集，
//! 这些错误都发生在管道构建期并中止构建。

use thiserror::Error;

use crate::graph::NodeId;
use crate::optimizer::capability::ProjectSupport;

/// 统一的结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;

/// 顶层错误类型
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("模式错误: {0}")]
    Schema(#[from] SchemaError),

    #[error("图错误: {0}")]
    Graph(#[from] GraphError),

    #[error("投影下推错误: {0}")]
    Pushdown(#[from] PushdownError),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 按声明模式解析字段路径时的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("字段未找到: {path}")]
    NoSuchField { path: String },

    #[error("路径 '{path}' 进入了非嵌套字段 '{field}'")]
    NotNested { path: String, field: String },

    #[error("字段路径为空")]
    EmptyPath,
}

/// 管道图结构操作的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("节点未找到: {0}")]
    NodeNotFound(NodeId),

    #[error("节点 '{node}' 没有标签为 '{tag}' 的输出")]
    UnknownOutputTag { node: String, tag: String },

    #[error("节点 '{node}' 的替换节点未声明输出 '{tag}'")]
    ReplacementOutputMismatch { node: String, tag: String },

    #[error("边引用了不存在的节点 {0}")]
    DanglingEdge(NodeId),
}

/// 投影下推边界上的错误
///
/// 这些错误要么是优化器与产出端之间的契约被违反，要么是消费端发来
/// 畸形请求。协议是纯函数式且确定的，重试不会改变结果。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushdownError {
    #[error("节点 '{node}' 上不存在输出 '{output_id}'")]
    UnknownOutput { node: String, output_id: String },

    #[error("节点 '{node}' 无法在输出 '{output_id}' 上满足 {required}")]
    CapabilityMismatch {
        node: String,
        output_id: String,
        required: ProjectSupport,
    },

    #[error("节点 '{node}' 声明支持下推但拒绝了输出 '{output_id}' 的字段 [{fields}]: {reason}")]
    UnsatisfiableNarrowing {
        node: String,
        output_id: String,
        fields: String,
        reason: String,
    },

    #[error("节点 '{node}' 输出 '{output_id}' 的字段请求畸形: {source}")]
    MalformedDescriptor {
        node: String,
        output_id: String,
        #[source]
        source: SchemaError,
    },

    #[error("节点 '{node}' 的替换节点未实现投影下推")]
    ReplacementNotProducer { node: String },

    #[error("{0}")]
    Schema(#[from] SchemaError),
}
