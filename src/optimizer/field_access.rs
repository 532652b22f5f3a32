//! 字段访问描述符
//!
//! `FieldAccessDescriptor` 是不可变值，描述消费者从某个产出端读取的字段集，
//! 支持嵌套路径和"全部字段"。同一输出的多个消费者的描述符在执行下推前
//! 通过 `union` 合并。
//!
//! 规范化策略：只请求父路径意味着需要整棵子树，因此父路径会吸收集合中
//! 它的所有后代路径。union 保留较宽的需求，只有这样
//! `a.is_subset_of(a.union(b))` 才对任意组合成立。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::core::error::SchemaError;
use crate::core::schema::Schema;

/// 有序的字段名段序列，寻址可能嵌套的字段，如 `user.address.city`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new(segments: Vec<String>) -> Result<Self, SchemaError> {
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(SchemaError::EmptyPath);
        }
        Ok(Self { segments })
    }

    /// 解析点分路径，如 `user.name`
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        Self::new(text.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `self` 是否为 `other` 的前缀（含相等）。前缀路径覆盖其下所有路径。
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// 去掉首段后的路径；顶层路径返回 `None`
    pub fn tail(&self) -> Option<FieldPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(FieldPath {
            segments: self.segments[1..].to_vec(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> String {
        path.to_string()
    }
}

/// 对单个产出端所需字段的不可变描述
///
/// 要么是"全部字段"，要么是规范化的路径集合。路径保留插入顺序，
/// 在产出端支持重排时即为请求的字段顺序；相等性和哈希忽略顺序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAccessDescriptor {
    all_fields: bool,
    paths: IndexSet<FieldPath>,
}

impl FieldAccessDescriptor {
    /// 要求全部字段的描述符。消费者的需求无法静态确定时使用。
    pub fn all() -> Self {
        Self {
            all_fields: true,
            paths: IndexSet::new(),
        }
    }

    /// 不要求任何字段的描述符；`union` 的单位元。
    pub fn empty() -> Self {
        Self {
            all_fields: false,
            paths: IndexSet::new(),
        }
    }

    /// 由点分路径字符串构建，按请求顺序。
    pub fn with_field_names<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut descriptor = Self::empty();
        for name in names {
            descriptor.insert(FieldPath::parse(name.as_ref())?);
        }
        Ok(descriptor)
    }

    /// 由已解析的路径构建，按请求顺序。
    pub fn with_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = FieldPath>,
    {
        let mut descriptor = Self::empty();
        for path in paths {
            descriptor.insert(path);
        }
        descriptor
    }

    pub fn is_all_fields(&self) -> bool {
        self.all_fields
    }

    pub fn is_empty(&self) -> bool {
        !self.all_fields && self.paths.is_empty()
    }

    /// 按请求顺序返回所需路径。`is_all_fields` 时为空。
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.paths.iter()
    }

    /// 按请求顺序去重后的顶层字段名。
    pub fn top_level_fields(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for path in &self.paths {
            if let Some(first) = path.first() {
                if !names.contains(&first) {
                    names.push(first);
                }
            }
        }
        names
    }

    /// 合并两个描述符，得到同时满足两者的需求。"全部字段"吸收任何合并；
    /// 父路径吸收后代路径。
    pub fn union(&self, other: &FieldAccessDescriptor) -> FieldAccessDescriptor {
        if self.all_fields || other.all_fields {
            return Self::all();
        }
        let mut merged = self.clone();
        for path in &other.paths {
            merged.insert(path.clone());
        }
        merged
    }

    /// `self` 的每项需求是否都被 `other` 满足。当 `other` 为全部字段
    /// 或含有某路径的前缀时该路径被满足（要求 `a` 可满足对 `a.b` 的请求，
    /// 反之不成立）。
    pub fn is_subset_of(&self, other: &FieldAccessDescriptor) -> bool {
        if other.all_fields {
            return true;
        }
        if self.all_fields {
            return false;
        }
        self.paths
            .iter()
            .all(|p| other.paths.iter().any(|q| q.is_prefix_of(p)))
    }

    /// 顶层请求顺序是否为 `native` 字段顺序的子序列，
    /// 即请求可以在不重排的情况下被满足。
    pub fn preserves_order(&self, native: &[&str]) -> bool {
        if self.all_fields {
            return true;
        }
        let requested = self.top_level_fields();
        let mut pos = 0;
        for name in native {
            if pos < requested.len() && requested[pos] == *name {
                pos += 1;
            }
        }
        pos == requested.len()
    }

    /// 拒绝无法在 `schema` 上解析的路径。
    pub fn validate(&self, schema: &Schema) -> Result<(), SchemaError> {
        for path in &self.paths {
            schema.check_path(path)?;
        }
        Ok(())
    }

    /// 按给定顶层字段顺序重排路径，同一顶层字段内保持相对顺序。
    /// 用于把合并描述符规整为产出端的原生顺序，消除消费者访问顺序的
    /// 偶然性。未出现在 `native` 中的字段排在末尾。
    pub fn sorted_by_field_order(&self, native: &[&str]) -> FieldAccessDescriptor {
        if self.all_fields {
            return self.clone();
        }
        let mut paths: Vec<FieldPath> = self.paths.iter().cloned().collect();
        paths.sort_by_key(|p| {
            native
                .iter()
                .position(|n| p.first() == Some(*n))
                .unwrap_or(usize::MAX)
        });
        Self::with_paths(paths)
    }

    fn insert(&mut self, path: FieldPath) {
        if self.all_fields {
            return;
        }
        // 已有前缀意味着整棵子树已被要求
        if self.paths.iter().any(|p| p.is_prefix_of(&path)) {
            return;
        }
        self.paths.retain(|p| !path.is_prefix_of(p));
        self.paths.insert(path);
    }
}

impl Hash for FieldAccessDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.all_fields.hash(state);
        let mut sorted: Vec<&FieldPath> = self.paths.iter().collect();
        sorted.sort();
        sorted.hash(state);
    }
}

impl fmt::Display for FieldAccessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_fields {
            return write!(f, "*");
        }
        let mut first = true;
        for path in &self.paths {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", path)?;
            first = false;
        }
        Ok(())
    }
}
