//! 规则引擎
//!
//! 按顺序评估规则列表，条件满足时产出结果（Consequence），支持首个匹配即停止
//! 或收集全部匹配。

use crate::compiler::{ExpressionParser, RuleParser};
use crate::error::{Result, RuleError};
use crate::executor::{ExpressionExecutor, NO_RUN_OPTIONS};
use crate::functions::{FunctionsTable, RuleFunctionsTable};
use crate::models::{
    Consequence, ConsequenceTemplate, EvaluationContext, Expression, MessagePart, MessageTemplate,
    Rule,
};
use predicate_shared::config::{DEFAULT_MESSAGE_SEPARATOR, EngineConfig};
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, info, instrument};

/// 解析结果消息
///
/// 字面片段原样保留，引用片段从上下文中读取：字符串原样插入，其他值插入其 JSON 文本。
pub fn resolve_consequence(
    template: &ConsequenceTemplate,
    context: &EvaluationContext,
    separator: &str,
) -> Result<Consequence> {
    let message = match &template.message {
        MessageTemplate::Text(text) => text.clone(),
        MessageTemplate::Parts(parts) => parts
            .iter()
            .map(|part| resolve_part(part, context))
            .collect::<Result<Vec<_>>>()?
            .join(separator),
    };

    Ok(Consequence {
        message,
        custom: template.custom.clone(),
    })
}

fn resolve_part<'a>(part: &'a MessagePart, context: &'a EvaluationContext) -> Result<Cow<'a, str>> {
    match part {
        MessagePart::Text(text) => Ok(Cow::Borrowed(text)),
        MessagePart::Ref { path } => match context.get_field(path) {
            Some(Value::String(s)) => Ok(Cow::Borrowed(s)),
            Some(other) => Ok(Cow::Owned(other.to_string())),
            None => Err(RuleError::UnknownConsequenceRef(path.clone())),
        },
    }
}

/// 规则序列执行器
struct RuleSequencer<'a> {
    functions: &'a FunctionsTable,
    rule_functions: &'a RuleFunctionsTable,
    run_options: &'a Value,
    separator: &'a str,
}

impl RuleSequencer<'_> {
    async fn evaluate(
        &self,
        rules: &[Rule],
        context: &EvaluationContext,
        halt_on_first_match: bool,
    ) -> Result<Option<Vec<Consequence>>> {
        let executor =
            ExpressionExecutor::new(context, self.functions).with_run_options(self.run_options);
        let mut consequences = Vec::new();

        for (index, rule) in rules.iter().enumerate() {
            let consequence = match rule {
                Rule::Function { name, param } => {
                    self.call_rule_function(name, param, context).await?
                }
                Rule::Conditional {
                    condition,
                    consequence,
                } => {
                    if executor.evaluate(condition).await? {
                        Some(resolve_consequence(consequence, context, self.separator)?)
                    } else {
                        None
                    }
                }
            };

            let Some(consequence) = consequence else {
                continue;
            };

            debug!(rule_index = index, message = %consequence.message, "规则匹配");
            if halt_on_first_match {
                return Ok(Some(vec![consequence]));
            }
            consequences.push(consequence);
        }

        if consequences.is_empty() {
            Ok(None)
        } else {
            Ok(Some(consequences))
        }
    }

    /// 校验全部规则，不提前停止
    async fn validate(&self, rules: &[Rule], context: &EvaluationContext) -> Result<()> {
        let executor =
            ExpressionExecutor::new(context, self.functions).with_run_options(self.run_options);

        for rule in rules {
            match rule {
                Rule::Function { name, param } => {
                    self.call_rule_function(name, param, context).await?;
                }
                Rule::Conditional {
                    condition,
                    consequence,
                } => {
                    executor.validate(condition).await?;
                    resolve_consequence(consequence, context, self.separator)?;
                }
            }
        }

        Ok(())
    }

    async fn call_rule_function(
        &self,
        name: &str,
        param: &Value,
        context: &EvaluationContext,
    ) -> Result<Option<Consequence>> {
        let function = self
            .rule_functions
            .get(name)
            .ok_or_else(|| RuleError::UnknownRuleFunction(name.to_string()))?;

        function
            .call(param, context)
            .await
            .map_err(|source| RuleError::FunctionFailed {
                name: name.to_string(),
                source,
            })
    }
}

/// 按顺序评估规则
///
/// 没有任何规则匹配时返回 `None`。
#[instrument(skip_all, fields(rules = rules.len(), halt = halt_on_first_match))]
pub async fn evaluate_rules(
    rules: &[Rule],
    context: &EvaluationContext,
    functions: &FunctionsTable,
    rule_functions: &RuleFunctionsTable,
    halt_on_first_match: bool,
) -> Result<Option<Vec<Consequence>>> {
    RuleSequencer {
        functions,
        rule_functions,
        run_options: &NO_RUN_OPTIONS,
        separator: DEFAULT_MESSAGE_SEPARATOR,
    }
    .evaluate(rules, context, halt_on_first_match)
    .await
}

/// 用代表性上下文校验全部规则
#[instrument(skip_all, fields(rules = rules.len()))]
pub async fn validate_rules(
    rules: &[Rule],
    context: &EvaluationContext,
    functions: &FunctionsTable,
    rule_functions: &RuleFunctionsTable,
) -> Result<()> {
    RuleSequencer {
        functions,
        rule_functions,
        run_options: &NO_RUN_OPTIONS,
        separator: DEFAULT_MESSAGE_SEPARATOR,
    }
    .validate(rules, context)
    .await
}

/// 规则引擎
///
/// 绑定一组函数表和规则函数表，可在多个任务间共享。
#[derive(Debug, Clone)]
pub struct RulesEngine {
    functions: FunctionsTable,
    rule_functions: RuleFunctionsTable,
    config: EngineConfig,
    run_options: Value,
}

impl RulesEngine {
    pub fn new(functions: FunctionsTable, rule_functions: RuleFunctionsTable) -> Self {
        Self::with_config(functions, rule_functions, EngineConfig::default())
    }

    pub fn with_config(
        functions: FunctionsTable,
        rule_functions: RuleFunctionsTable,
        config: EngineConfig,
    ) -> Self {
        info!(
            functions = functions.len(),
            rule_functions = rule_functions.len(),
            max_expression_depth = config.max_expression_depth,
            "规则引擎已初始化"
        );
        Self {
            functions,
            rule_functions,
            config,
            run_options: Value::Null,
        }
    }

    /// 设置透传给谓词函数的自定义运行选项
    pub fn with_run_options(mut self, run_options: Value) -> Self {
        self.run_options = run_options;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 解析表达式
    pub fn parse_expression(&self, value: &Value) -> Result<Expression> {
        ExpressionParser::new(&self.functions)
            .with_max_depth(self.config.max_expression_depth)
            .parse(value)
    }

    /// 解析规则数组
    pub fn parse_rules(&self, value: &Value) -> Result<Vec<Rule>> {
        RuleParser::new(&self.functions, &self.rule_functions)
            .with_max_depth(self.config.max_expression_depth)
            .parse_all(value)
    }

    /// 返回第一个匹配规则的结果
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub async fn evaluate(
        &self,
        rules: &[Rule],
        context: &EvaluationContext,
    ) -> Result<Option<Consequence>> {
        let consequences = self.sequencer().evaluate(rules, context, true).await?;
        Ok(consequences.and_then(|c| c.into_iter().next()))
    }

    /// 返回所有匹配规则的结果
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub async fn evaluate_all(
        &self,
        rules: &[Rule],
        context: &EvaluationContext,
    ) -> Result<Option<Vec<Consequence>>> {
        self.sequencer().evaluate(rules, context, false).await
    }

    /// 校验全部规则
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub async fn validate(&self, rules: &[Rule], context: &EvaluationContext) -> Result<()> {
        self.sequencer().validate(rules, context).await
    }

    fn sequencer(&self) -> RuleSequencer<'_> {
        RuleSequencer {
            functions: &self.functions,
            rule_functions: &self.rule_functions,
            run_options: &self.run_options,
            separator: &self.config.message_separator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> EvaluationContext {
        EvaluationContext::new(json!({
            "userId": "a",
            "times": 3,
            "profile": {"age": 30, "nick": null}
        }))
    }

    fn template(message: Value) -> ConsequenceTemplate {
        let value = json!({"message": message, "custom": {"code": 1}});
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_consequence_parts() {
        let consequence = resolve_consequence(
            &template(json!(["user", {"ref": "userId"}, "is", {"ref": "profile.age"}])),
            &context(),
            " ",
        )
        .unwrap();

        assert_eq!(consequence.message, "user a is 30");
        assert_eq!(consequence.custom, json!({"code": 1}));
    }

    #[test]
    fn test_resolve_consequence_text_and_separator() {
        let ctx = context();
        assert_eq!(
            resolve_consequence(&template(json!("plain")), &ctx, " ")
                .unwrap()
                .message,
            "plain"
        );
        assert_eq!(
            resolve_consequence(&template(json!(["a", {"ref": "profile.nick"}])), &ctx, "|")
                .unwrap()
                .message,
            "a|null"
        );
    }

    #[test]
    fn test_resolve_consequence_unknown_ref() {
        let template = template(json!(["x", {"ref": "profile.email"}]));
        assert!(matches!(
            resolve_consequence(&template, &context(), " "),
            Err(RuleError::UnknownConsequenceRef(path)) if path == "profile.email"
        ));
    }

    #[tokio::test]
    async fn test_rule_function_missing_from_table() {
        let rules = vec![Rule::function("quota", 1)];
        let result = evaluate_rules(
            &rules,
            &context(),
            &FunctionsTable::new(),
            &RuleFunctionsTable::new(),
            false,
        )
        .await;

        assert!(matches!(
            result,
            Err(RuleError::UnknownRuleFunction(name)) if name == "quota"
        ));
    }

    #[tokio::test]
    async fn test_engine_uses_configured_separator() {
        let config = EngineConfig {
            message_separator: "-".to_string(),
            ..Default::default()
        };
        let engine =
            RulesEngine::with_config(FunctionsTable::new(), RuleFunctionsTable::new(), config);
        let rules = engine
            .parse_rules(&json!([{
                "condition": {"userId": "a"},
                "consequence": {"message": ["user", {"ref": "userId"}]}
            }]))
            .unwrap();

        let consequence = engine.evaluate(&rules, &context()).await.unwrap().unwrap();
        assert_eq!(consequence.message, "user-a");
        assert_eq!(consequence.custom, Value::Null);
    }

    #[test]
    fn test_engine_defaults_follow_engine_config() {
        let engine = RulesEngine::new(FunctionsTable::new(), RuleFunctionsTable::new());
        let defaults = EngineConfig::default();
        assert_eq!(
            engine.config().max_expression_depth,
            defaults.max_expression_depth
        );
        assert_eq!(engine.config().message_separator, DEFAULT_MESSAGE_SEPARATOR);

        // 独立使用的解析器与引擎共用同一个默认深度
        let mut value = json!({"a": 1});
        for _ in 0..=defaults.max_expression_depth {
            value = json!({ "not": value });
        }
        let functions = FunctionsTable::new();
        assert!(matches!(
            ExpressionParser::new(&functions).parse(&value),
            Err(RuleError::MaxDepthExceeded(depth)) if depth == defaults.max_expression_depth
        ));
        assert!(matches!(
            engine.parse_expression(&value),
            Err(RuleError::MaxDepthExceeded(depth)) if depth == defaults.max_expression_depth
        ));
    }

    #[test]
    fn test_engine_respects_configured_depth() {
        let config = EngineConfig {
            max_expression_depth: 1,
            ..Default::default()
        };
        let engine =
            RulesEngine::with_config(FunctionsTable::new(), RuleFunctionsTable::new(), config);

        assert!(engine.parse_expression(&json!({"not": {"a": 1}})).is_ok());
        assert!(matches!(
            engine.parse_expression(&json!({"not": {"not": {"a": 1}}})),
            Err(RuleError::MaxDepthExceeded(1))
        ));
    }
}
