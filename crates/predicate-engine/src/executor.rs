//! 表达式执行器
//!
//! 递归遍历表达式树，支持两种模式：
//! - 评估模式：and/or 短路求值，返回布尔结果
//! - 校验模式：不短路，访问每个子节点以暴露所有潜在错误；引用不存在的字段直接报错
//!
//! 函数调用节点在两种模式下都会被调用，通过 `FunctionOptions::validation` 区分。

use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::functions::{FunctionOptions, FunctionsTable};
use crate::models::{Condition, EvaluationContext, Expression, ReasonedResult};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, instrument};

pub(crate) static NO_RUN_OPTIONS: Value = Value::Null;

/// 表达式执行器
///
/// 绑定一次评估所需的上下文、函数表和运行选项，本身不持有可变状态。
#[derive(Debug, Clone, Copy)]
pub struct ExpressionExecutor<'a> {
    context: &'a EvaluationContext,
    functions: &'a FunctionsTable,
    run_options: &'a Value,
}

impl<'a> ExpressionExecutor<'a> {
    pub fn new(context: &'a EvaluationContext, functions: &'a FunctionsTable) -> Self {
        Self {
            context,
            functions,
            run_options: &NO_RUN_OPTIONS,
        }
    }

    /// 设置透传给函数的自定义运行选项
    pub fn with_run_options(mut self, run_options: &'a Value) -> Self {
        self.run_options = run_options;
        self
    }

    /// 评估表达式
    #[instrument(skip_all, name = "evaluate")]
    pub async fn evaluate(&self, expr: &Expression) -> Result<bool> {
        self.evaluate_node(expr, false).await
    }

    /// 校验表达式
    ///
    /// 访问所有分支，上下文应为包含所有字段的代表性数据。
    #[instrument(skip_all, name = "validate")]
    pub async fn validate(&self, expr: &Expression) -> Result<()> {
        self.evaluate_node(expr, true).await.map(|_| ())
    }

    /// 评估表达式并返回最小原因子表达式
    ///
    /// 遍历顺序和函数调用次数与 [`evaluate`](Self::evaluate) 完全一致。
    #[instrument(skip_all, name = "evaluate_with_reason")]
    pub async fn evaluate_with_reason(&self, expr: &Expression) -> Result<ReasonedResult> {
        self.reason_node(expr).await
    }

    /// 递归评估表达式节点
    fn evaluate_node<'s>(
        &'s self,
        expr: &'s Expression,
        strict: bool,
    ) -> BoxFuture<'s, Result<bool>> {
        async move {
            match expr {
                Expression::And(children) => self.evaluate_and(children, strict).await,
                Expression::Or(children) => self.evaluate_or(children, strict).await,
                Expression::Not(inner) => Ok(!self.evaluate_node(inner, strict).await?),
                Expression::Call { name, param } => self.call_function(name, param, strict).await,
                Expression::Compare(cond) => self.evaluate_condition(cond, strict).await,
            }
        }
        .boxed()
    }

    /// AND：评估模式遇到 false 立即返回；校验模式访问全部子节点
    async fn evaluate_and(&self, children: &[Expression], strict: bool) -> Result<bool> {
        if children.is_empty() {
            return Err(RuleError::EmptyAnd);
        }

        if strict {
            let mut all = true;
            for child in children {
                all &= self.evaluate_node(child, true).await?;
            }
            return Ok(all);
        }

        for (i, child) in children.iter().enumerate() {
            if !self.evaluate_node(child, false).await? {
                debug!(index = i, total = children.len(), "and 短路");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// OR：评估模式遇到 true 立即返回；校验模式访问全部子节点
    async fn evaluate_or(&self, children: &[Expression], strict: bool) -> Result<bool> {
        if children.is_empty() {
            return Err(RuleError::EmptyOr);
        }

        if strict {
            let mut any = false;
            for child in children {
                any |= self.evaluate_node(child, true).await?;
            }
            return Ok(any);
        }

        for (i, child) in children.iter().enumerate() {
            if self.evaluate_node(child, false).await? {
                debug!(index = i, total = children.len(), "or 短路");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// 评估条件节点
    ///
    /// 字段名与已注册函数同名时按函数调用处理。
    async fn evaluate_condition(&self, cond: &Condition, strict: bool) -> Result<bool> {
        if self.functions.contains(&cond.field) {
            let param = cond.op.to_value();
            return self.call_function(&cond.field, &param, strict).await;
        }

        let (field_value, exists) = self.context.resolve(&cond.field);
        if strict && !exists {
            return Err(RuleError::UnknownContextKey(cond.field.clone()));
        }

        let matched =
            ConditionEvaluator::compare(&cond.op, &cond.field, field_value, self.context, strict)?;
        debug!(field = %cond.field, op = %cond.op.to_value(), matched, "条件评估");

        Ok(matched)
    }

    async fn call_function(&self, name: &str, param: &Value, strict: bool) -> Result<bool> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| RuleError::UnknownFunction(name.to_string()))?;

        let options = FunctionOptions {
            validation: strict,
            custom: self.run_options,
        };

        let result = function
            .call(param, self.context, &options)
            .await
            .map_err(|source| RuleError::FunctionFailed {
                name: name.to_string(),
                source,
            })?;
        debug!(function = name, validation = strict, result, "函数调用");

        Ok(result)
    }

    /// 评估节点并构造原因
    ///
    /// - 叶子节点：原因为节点本身
    /// - and/or 短路：原因只保留触发短路的子节点
    /// - and/or 未短路：原因保留所有子节点的原因
    /// - not：原因为内部原因取反
    fn reason_node<'s>(&'s self, expr: &'s Expression) -> BoxFuture<'s, Result<ReasonedResult>> {
        async move {
            match expr {
                Expression::And(children) => {
                    if children.is_empty() {
                        return Err(RuleError::EmptyAnd);
                    }
                    let (result, reasons) = self.reason_group(children, false).await?;
                    Ok(ReasonedResult {
                        result,
                        reason: Expression::And(reasons),
                    })
                }
                Expression::Or(children) => {
                    if children.is_empty() {
                        return Err(RuleError::EmptyOr);
                    }
                    let (result, reasons) = self.reason_group(children, true).await?;
                    Ok(ReasonedResult {
                        result,
                        reason: Expression::Or(reasons),
                    })
                }
                Expression::Not(inner) => {
                    let inner = self.reason_node(inner).await?;
                    Ok(ReasonedResult {
                        result: !inner.result,
                        reason: Expression::not(inner.reason),
                    })
                }
                leaf => {
                    let result = self.evaluate_node(leaf, false).await?;
                    Ok(ReasonedResult {
                        result,
                        reason: leaf.clone(),
                    })
                }
            }
        }
        .boxed()
    }

    /// 按顺序评估子节点，遇到 `short_circuit_on` 时只返回该子节点的原因
    async fn reason_group(
        &self,
        children: &[Expression],
        short_circuit_on: bool,
    ) -> Result<(bool, Vec<Expression>)> {
        let mut reasons = Vec::with_capacity(children.len());

        for (i, child) in children.iter().enumerate() {
            let ReasonedResult { result, reason } = self.reason_node(child).await?;
            if result == short_circuit_on {
                debug!(index = i, total = children.len(), "原因提取短路");
                return Ok((short_circuit_on, vec![reason]));
            }
            reasons.push(reason);
        }

        Ok((!short_circuit_on, reasons))
    }
}

/// 评估表达式
pub async fn evaluate(
    expr: &Expression,
    context: &EvaluationContext,
    functions: &FunctionsTable,
    run_options: &Value,
) -> Result<bool> {
    ExpressionExecutor::new(context, functions)
        .with_run_options(run_options)
        .evaluate(expr)
        .await
}

/// 用代表性上下文校验表达式
pub async fn validate(
    expr: &Expression,
    context: &EvaluationContext,
    functions: &FunctionsTable,
    run_options: &Value,
) -> Result<()> {
    ExpressionExecutor::new(context, functions)
        .with_run_options(run_options)
        .validate(expr)
        .await
}

/// 评估表达式并返回最小原因
pub async fn evaluate_with_reason(
    expr: &Expression,
    context: &EvaluationContext,
    functions: &FunctionsTable,
    run_options: &Value,
) -> Result<ReasonedResult> {
    ExpressionExecutor::new(context, functions)
        .with_run_options(run_options)
        .evaluate_with_reason(expr)
        .await
}
