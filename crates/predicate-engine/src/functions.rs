//! 函数注册表
//!
//! 表达式中的函数调用节点和规则中的规则函数都通过调用方提供的注册表按名称分发。
//! 处理函数都是异步的；引擎按遍历顺序逐个等待，不会并发执行兄弟节点。

use crate::error::{Result, RuleError};
use crate::models::{Consequence, EvaluationContext};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// 传给谓词函数的运行选项
#[derive(Debug, Clone, Copy)]
pub struct FunctionOptions<'a> {
    /// 校验模式下为 true，函数需自行跳过副作用
    pub validation: bool,
    /// 调用方透传的自定义选项
    pub custom: &'a Value,
}

/// 谓词函数
#[async_trait]
pub trait PredicateFunction: Send + Sync {
    async fn call(
        &self,
        param: &Value,
        context: &EvaluationContext,
        options: &FunctionOptions<'_>,
    ) -> anyhow::Result<bool>;
}

/// 规则函数：直接根据参数和上下文决定是否产出结果
#[async_trait]
pub trait RuleFunction: Send + Sync {
    async fn call(
        &self,
        param: &Value,
        context: &EvaluationContext,
    ) -> anyhow::Result<Option<Consequence>>;
}

/// 同步闭包适配为谓词函数
pub struct FnPredicate<F>(pub F);

#[async_trait]
impl<F> PredicateFunction for FnPredicate<F>
where
    F: Fn(&Value, &EvaluationContext, &FunctionOptions<'_>) -> anyhow::Result<bool> + Send + Sync,
{
    async fn call(
        &self,
        param: &Value,
        context: &EvaluationContext,
        options: &FunctionOptions<'_>,
    ) -> anyhow::Result<bool> {
        (self.0)(param, context, options)
    }
}

/// 同步闭包适配为规则函数
pub struct FnRule<F>(pub F);

#[async_trait]
impl<F> RuleFunction for FnRule<F>
where
    F: Fn(&Value, &EvaluationContext) -> anyhow::Result<Option<Consequence>> + Send + Sync,
{
    async fn call(
        &self,
        param: &Value,
        context: &EvaluationContext,
    ) -> anyhow::Result<Option<Consequence>> {
        (self.0)(param, context)
    }
}

/// 按名称索引的函数注册表
pub struct FunctionRegistry<F: ?Sized> {
    functions: HashMap<String, Arc<F>>,
}

/// 谓词函数表
pub type FunctionsTable = FunctionRegistry<dyn PredicateFunction>;

/// 规则函数表
pub type RuleFunctionsTable = FunctionRegistry<dyn RuleFunction>;

impl<F: ?Sized> FunctionRegistry<F> {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// 注册函数，同名函数会被覆盖并返回旧值
    pub fn insert(&mut self, name: impl Into<String>, function: Arc<F>) -> Option<Arc<F>> {
        let name = name.into();
        let previous = self.functions.insert(name.clone(), function);
        if previous.is_some() {
            warn!(function = %name, "覆盖已注册的同名函数");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Arc<F>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// 获取所有函数名（已排序）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 合并两个注册表，任何重名都视为错误
    pub fn merge(mut self, other: Self) -> Result<Self> {
        for (name, function) in other.functions {
            if self.functions.contains_key(&name) {
                return Err(RuleError::DuplicateFunction(name));
            }
            self.functions.insert(name, function);
        }
        Ok(self)
    }
}

impl FunctionsTable {
    pub fn register<P>(&mut self, name: impl Into<String>, function: P) -> &mut Self
    where
        P: PredicateFunction + 'static,
    {
        self.insert(name, Arc::new(function));
        self
    }

    pub fn register_fn<C>(&mut self, name: impl Into<String>, f: C) -> &mut Self
    where
        C: Fn(&Value, &EvaluationContext, &FunctionOptions<'_>) -> anyhow::Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, FnPredicate(f))
    }

    /// 构建器风格的 [`register_fn`](Self::register_fn)
    pub fn with_fn<C>(mut self, name: impl Into<String>, f: C) -> Self
    where
        C: Fn(&Value, &EvaluationContext, &FunctionOptions<'_>) -> anyhow::Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.register_fn(name, f);
        self
    }
}

impl RuleFunctionsTable {
    pub fn register<R>(&mut self, name: impl Into<String>, function: R) -> &mut Self
    where
        R: RuleFunction + 'static,
    {
        self.insert(name, Arc::new(function));
        self
    }

    pub fn register_fn<C>(&mut self, name: impl Into<String>, f: C) -> &mut Self
    where
        C: Fn(&Value, &EvaluationContext) -> anyhow::Result<Option<Consequence>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, FnRule(f))
    }

    pub fn with_fn<C>(mut self, name: impl Into<String>, f: C) -> Self
    where
        C: Fn(&Value, &EvaluationContext) -> anyhow::Result<Option<Consequence>>
            + Send
            + Sync
            + 'static,
    {
        self.register_fn(name, f);
        self
    }
}

impl<F: ?Sized> Default for FunctionRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Clone for FunctionRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            functions: self.functions.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for FunctionRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
