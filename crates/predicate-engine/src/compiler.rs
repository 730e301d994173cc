//! 表达式解析器
//!
//! 将 JSON 表达式解析成内存中的表达式树。所有结构性错误（多键节点、空 and/or、
//! 未知操作符、between 元素个数、数学操作符）在这里对整棵树一次性检查，
//! 包括评估时会被短路跳过的分支。

use crate::error::{Result, RuleError};
use crate::functions::{FunctionsTable, RuleFunctionsTable};
use crate::models::{CompareOp, Condition, ConsequenceTemplate, Expression, Operand, Rule};
use crate::operators::{MathOperator, Operator};
use predicate_shared::config::DEFAULT_MAX_EXPRESSION_DEPTH;
use serde_json::{Map, Value};

/// 算术操作数允许的键
const MATH_KEYS: [&str; 3] = ["op", "lhs", "rhs"];

/// 表达式解析器
///
/// 叶子节点的键如果是已注册的函数名则解析为函数调用，否则解析为字段比较。
pub struct ExpressionParser<'a> {
    functions: &'a FunctionsTable,
    max_depth: usize,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(functions: &'a FunctionsTable) -> Self {
        Self {
            functions,
            max_depth: DEFAULT_MAX_EXPRESSION_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 解析表达式
    pub fn parse(&self, value: &Value) -> Result<Expression> {
        self.parse_node(value, 0)
    }

    fn parse_node(&self, value: &Value, depth: usize) -> Result<Expression> {
        self.check_depth(depth)?;

        let map = value.as_object().ok_or_else(|| {
            RuleError::InvalidExpression(format!("表达式必须是对象, 实际 {}", type_name(value)))
        })?;
        let (key, inner) = single_entry(map, "表达式")?;

        match key.as_str() {
            "and" => Ok(Expression::And(self.parse_children(inner, depth, "and")?)),
            "or" => Ok(Expression::Or(self.parse_children(inner, depth, "or")?)),
            "not" => {
                if !inner.is_object() {
                    return Err(RuleError::InvalidExpression(format!(
                        "not 需要一个表达式对象, 实际 {}",
                        type_name(inner)
                    )));
                }
                Ok(Expression::not(self.parse_node(inner, depth + 1)?))
            }
            name if self.functions.contains(name) => Ok(Expression::Call {
                name: name.to_string(),
                param: inner.clone(),
            }),
            path => {
                if path.is_empty() {
                    return Err(RuleError::InvalidExpression("字段路径不能为空".to_string()));
                }
                let op = self.parse_compare_op(inner, depth + 1)?;
                Ok(Expression::Compare(Condition::new(path, op)))
            }
        }
    }

    fn parse_children(
        &self,
        value: &Value,
        depth: usize,
        operator: &str,
    ) -> Result<Vec<Expression>> {
        let items = value.as_array().ok_or_else(|| {
            RuleError::InvalidExpression(format!("{operator} 需要表达式数组, 实际 {}", type_name(value)))
        })?;

        if items.is_empty() {
            return Err(if operator == "and" {
                RuleError::EmptyAnd
            } else {
                RuleError::EmptyOr
            });
        }

        items
            .iter()
            .map(|item| self.parse_node(item, depth + 1))
            .collect()
    }

    /// 解析比较操作：裸值为等值简写，对象必须只有一个操作符键
    fn parse_compare_op(&self, value: &Value, depth: usize) -> Result<CompareOp> {
        let map = match value {
            Value::Object(map) => map,
            Value::Array(_) => {
                return Err(RuleError::InvalidOperand(
                    "比较值不能是数组, 请使用 inq/nin".to_string(),
                ));
            }
            primitive => return Ok(CompareOp::Equals(Operand::Literal(primitive.clone()))),
        };

        let (key, arg) = single_entry(map, "比较操作")?;
        let operator: Operator = key.parse()?;

        let op = match operator {
            Operator::Eq => CompareOp::Eq(self.parse_operand(arg, depth)?),
            Operator::Neq => CompareOp::Neq(self.parse_operand(arg, depth)?),
            Operator::Gt => CompareOp::Gt(self.parse_operand(arg, depth)?),
            Operator::Gte => CompareOp::Gte(self.parse_operand(arg, depth)?),
            Operator::Lt => CompareOp::Lt(self.parse_operand(arg, depth)?),
            Operator::Lte => CompareOp::Lte(self.parse_operand(arg, depth)?),
            Operator::Regexp => CompareOp::Regexp(self.parse_operand(arg, depth)?),
            Operator::Regexpi => CompareOp::Regexpi(self.parse_operand(arg, depth)?),
            Operator::Between => {
                let bounds = self.parse_operand_list(arg, depth, operator)?;
                let [low, high]: [Operand; 2] = bounds
                    .try_into()
                    .map_err(|rest: Vec<Operand>| RuleError::InvalidBetweenArity(rest.len()))?;
                CompareOp::Between(low, high)
            }
            Operator::Inq => CompareOp::Inq(self.parse_operand_list(arg, depth, operator)?),
            Operator::Nin => CompareOp::Nin(self.parse_operand_list(arg, depth, operator)?),
            Operator::Exists => {
                let expected = arg.as_bool().ok_or_else(|| {
                    RuleError::InvalidOperand(format!("exists 需要布尔值, 实际 {}", type_name(arg)))
                })?;
                CompareOp::Exists(expected)
            }
        };

        Ok(op)
    }

    fn parse_operand_list(
        &self,
        value: &Value,
        depth: usize,
        operator: Operator,
    ) -> Result<Vec<Operand>> {
        let items = value.as_array().ok_or_else(|| {
            RuleError::InvalidOperand(format!("{operator} 操作符需要数组值, 实际 {}", type_name(value)))
        })?;

        items
            .iter()
            .map(|item| self.parse_operand(item, depth))
            .collect()
    }

    /// 解析操作数：基本类型为字面量，`{"ref"}` 为引用，`{"op","lhs","rhs"}` 为算术
    fn parse_operand(&self, value: &Value, depth: usize) -> Result<Operand> {
        self.check_depth(depth)?;

        let map = match value {
            Value::Object(map) => map,
            Value::Array(_) => {
                return Err(RuleError::InvalidOperand("操作数不能是数组".to_string()));
            }
            primitive => return Ok(Operand::Literal(primitive.clone())),
        };

        if let Some(path) = map.get("ref") {
            let path = match (path, map.len()) {
                (Value::String(path), 1) => path,
                _ => {
                    return Err(RuleError::InvalidOperand(format!(
                        "引用必须是 {{\"ref\": \"path\"}}, 实际 {}",
                        value
                    )));
                }
            };
            return Ok(Operand::Reference(path.clone()));
        }

        if let Some(op) = map.get("op") {
            let op: MathOperator = op
                .as_str()
                .ok_or_else(|| RuleError::InvalidMathOperator(op.to_string()))?
                .parse()?;

            if let Some(extra) = map.keys().find(|k| !MATH_KEYS.contains(&k.as_str())) {
                return Err(RuleError::InvalidOperand(format!("算术操作数包含未知键: {extra}")));
            }

            let side = |name: &str| {
                map.get(name)
                    .ok_or_else(|| RuleError::InvalidOperand(format!("算术操作数缺少 {name}")))
            };
            let lhs = self.parse_operand(side("lhs")?, depth + 1)?;
            let rhs = self.parse_operand(side("rhs")?, depth + 1)?;

            return Ok(Operand::math(op, lhs, rhs));
        }

        Err(RuleError::InvalidOperand(format!("无法识别的操作数: {value}")))
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(RuleError::MaxDepthExceeded(self.max_depth));
        }
        Ok(())
    }
}

/// 规则解析器
pub struct RuleParser<'a> {
    expressions: ExpressionParser<'a>,
    rule_functions: &'a RuleFunctionsTable,
}

impl<'a> RuleParser<'a> {
    pub fn new(functions: &'a FunctionsTable, rule_functions: &'a RuleFunctionsTable) -> Self {
        Self {
            expressions: ExpressionParser::new(functions),
            rule_functions,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.expressions = self.expressions.with_max_depth(max_depth);
        self
    }

    /// 解析单条规则
    ///
    /// 只有一个键且该键是已注册的规则函数时解析为规则函数简写，
    /// 否则必须同时包含 condition 和 consequence。
    pub fn parse(&self, value: &Value) -> Result<Rule> {
        let map = value.as_object().ok_or_else(|| {
            RuleError::InvalidExpression(format!("规则必须是对象, 实际 {}", type_name(value)))
        })?;

        if map.len() == 1 {
            if let Some((name, param)) = map.iter().next() {
                if self.rule_functions.contains(name) {
                    return Ok(Rule::function(name.clone(), param.clone()));
                }
            }
        }

        let condition = map
            .get("condition")
            .filter(|v| !v.is_null())
            .ok_or(RuleError::MissingCondition)?;
        let consequence = map
            .get("consequence")
            .filter(|v| !v.is_null())
            .ok_or(RuleError::MissingConsequence)?;

        let condition = self.expressions.parse(condition)?;
        let consequence: ConsequenceTemplate = serde_json::from_value(consequence.clone())?;

        Ok(Rule::conditional(condition, consequence))
    }

    /// 解析规则数组
    pub fn parse_all(&self, value: &Value) -> Result<Vec<Rule>> {
        let items = value.as_array().ok_or_else(|| {
            RuleError::InvalidExpression(format!("规则列表必须是数组, 实际 {}", type_name(value)))
        })?;

        items.iter().map(|item| self.parse(item)).collect()
    }
}

/// 取出唯一的键值对
fn single_entry<'v>(map: &'v Map<String, Value>, what: &str) -> Result<(&'v String, &'v Value)> {
    let mut entries = map.iter();
    match (entries.next(), map.len()) {
        (Some(entry), 1) => Ok(entry),
        (None, _) => Err(RuleError::InvalidExpression(format!("{}不能是空对象", what))),
        _ => Err(RuleError::TooManyKeys {
            count: map.len(),
            keys: map.keys().cloned().collect(),
        }),
    }
}

/// 获取值的类型名称
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
