//! 规则引擎领域模型

use crate::operators::{MathOperator, Operator};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

/// 表达式节点
///
/// 由 [`ExpressionParser`](crate::compiler::ExpressionParser) 从 JSON 构造，
/// 序列化时还原为同样的单键 JSON 形式。
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    /// 调用已注册的函数
    Call { name: String, param: Value },
    /// 字段比较
    Compare(Condition),
}

impl Expression {
    pub fn and(children: Vec<Expression>) -> Self {
        Self::And(children)
    }

    pub fn or(children: Vec<Expression>) -> Self {
        Self::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn call(name: impl Into<String>, param: impl Into<Value>) -> Self {
        Self::Call {
            name: name.into(),
            param: param.into(),
        }
    }

    pub fn compare(field: impl Into<String>, op: CompareOp) -> Self {
        Self::Compare(Condition::new(field, op))
    }

    /// 字段等值简写，如 `{"userId": "a"}`
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Equals(Operand::Literal(value.into())))
    }

    /// 还原为 JSON 形式
    pub fn to_value(&self) -> Value {
        match self {
            Self::And(children) => {
                json!({ "and": children.iter().map(Self::to_value).collect::<Vec<_>>() })
            }
            Self::Or(children) => {
                json!({ "or": children.iter().map(Self::to_value).collect::<Vec<_>>() })
            }
            Self::Not(inner) => json!({ "not": inner.to_value() }),
            Self::Call { name, param } => single_key(name, param.clone()),
            Self::Compare(cond) => single_key(&cond.field, cond.op.to_value()),
        }
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn single_key(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// 条件节点
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: CompareOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }
}

/// 比较操作
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOp {
    /// 裸值简写的严格相等
    Equals(Operand),
    Eq(Operand),
    Neq(Operand),
    Gt(Operand),
    Gte(Operand),
    Lt(Operand),
    Lte(Operand),
    Between(Operand, Operand),
    Inq(Vec<Operand>),
    Nin(Vec<Operand>),
    Regexp(Operand),
    Regexpi(Operand),
    Exists(bool),
}

impl CompareOp {
    /// 显式操作符，裸值简写返回 None
    pub fn operator(&self) -> Option<Operator> {
        let op = match self {
            Self::Equals(_) => return None,
            Self::Eq(_) => Operator::Eq,
            Self::Neq(_) => Operator::Neq,
            Self::Gt(_) => Operator::Gt,
            Self::Gte(_) => Operator::Gte,
            Self::Lt(_) => Operator::Lt,
            Self::Lte(_) => Operator::Lte,
            Self::Between(..) => Operator::Between,
            Self::Inq(_) => Operator::Inq,
            Self::Nin(_) => Operator::Nin,
            Self::Regexp(_) => Operator::Regexp,
            Self::Regexpi(_) => Operator::Regexpi,
            Self::Exists(_) => Operator::Exists,
        };
        Some(op)
    }

    pub fn to_value(&self) -> Value {
        let arg = match self {
            Self::Equals(o) => return o.to_value(),
            Self::Eq(o)
            | Self::Neq(o)
            | Self::Gt(o)
            | Self::Gte(o)
            | Self::Lt(o)
            | Self::Lte(o)
            | Self::Regexp(o)
            | Self::Regexpi(o) => o.to_value(),
            Self::Between(low, high) => json!([low.to_value(), high.to_value()]),
            Self::Inq(items) | Self::Nin(items) => {
                Value::Array(items.iter().map(Operand::to_value).collect())
            }
            Self::Exists(b) => Value::Bool(*b),
        };

        match self.operator() {
            Some(op) => single_key(op.as_str(), arg),
            None => arg,
        }
    }
}

/// 比较操作数：字面量、上下文引用或算术表达式
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// 基本类型字面量（null/bool/number/string）
    Literal(Value),
    /// `{"ref": "a.b"}`
    Reference(String),
    /// `{"op": "+", "lhs": .., "rhs": ..}`
    Math {
        op: MathOperator,
        lhs: Box<Operand>,
        rhs: Box<Operand>,
    },
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(path: impl Into<String>) -> Self {
        Self::Reference(path.into())
    }

    pub fn math(op: MathOperator, lhs: Operand, rhs: Operand) -> Self {
        Self::Math {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Reference(path) => json!({ "ref": path }),
            Self::Math { op, lhs, rhs } => json!({
                "op": op.as_str(),
                "lhs": lhs.to_value(),
                "rhs": rhs.to_value(),
            }),
        }
    }
}

/// 评估上下文 - 提供给规则引擎的数据
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    data: Value,
}

impl EvaluationContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 获取字段值（支持点号分隔的路径，如 "event.type" 或 "user.profile.age"）
    ///
    /// 返回 None 表示路径不存在；值为 null 的键仍然存在，返回 `Some(Value::Null)`。
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;

        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    // 支持数组索引访问，如 "items.0.name"
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    /// 解析路径，返回 (值, 是否存在)
    pub fn resolve(&self, path: &str) -> (Option<&Value>, bool) {
        let value = self.get_field(path);
        (value, value.is_some())
    }
}

/// 带原因的评估结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonedResult {
    pub result: bool,
    /// 独立评估后结果与 `result` 相同的最小子表达式
    pub reason: Expression,
}

/// 规则定义
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// `{ "condition": .., "consequence": .. }`
    Conditional {
        condition: Expression,
        consequence: ConsequenceTemplate,
    },
    /// `{ "<ruleFunctionName>": param }`
    Function { name: String, param: Value },
}

impl Rule {
    pub fn conditional(condition: Expression, consequence: ConsequenceTemplate) -> Self {
        Self::Conditional {
            condition,
            consequence,
        }
    }

    pub fn function(name: impl Into<String>, param: impl Into<Value>) -> Self {
        Self::Function {
            name: name.into(),
            param: param.into(),
        }
    }
}

/// 规则匹配后的结果模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsequenceTemplate {
    pub message: MessageTemplate,
    #[serde(default)]
    pub custom: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTemplate {
    Text(String),
    Parts(Vec<MessagePart>),
}

/// 消息片段：字面文本或在匹配时从上下文解析的引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePart {
    Text(String),
    Ref {
        #[serde(rename = "ref")]
        path: String,
    },
}

/// 规则产出的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consequence {
    pub message: String,
    pub custom: Value,
}

impl Consequence {
    pub fn new(message: impl Into<String>, custom: impl Into<Value>) -> Self {
        Self {
            message: message.into(),
            custom: custom.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_serialization() {
        let expr = Expression::and(vec![
            Expression::equals("event.type", "PURCHASE"),
            Expression::not(Expression::compare(
                "order.amount",
                CompareOp::Between(Operand::literal(1), Operand::reference("limits.max")),
            )),
            Expression::call("isVip", json!({"level": 2})),
        ]);

        assert_eq!(
            serde_json::to_value(&expr).unwrap(),
            json!({
                "and": [
                    {"event.type": "PURCHASE"},
                    {"not": {"order.amount": {"between": [1, {"ref": "limits.max"}]}}},
                    {"isVip": {"level": 2}}
                ]
            })
        );
    }

    #[test]
    fn test_math_operand_serialization() {
        let op = CompareOp::Lt(Operand::math(
            MathOperator::Mul,
            Operand::reference("limit"),
            Operand::literal(2),
        ));
        assert_eq!(
            op.to_value(),
            json!({"lt": {"op": "*", "lhs": {"ref": "limit"}, "rhs": 2}})
        );
    }

    #[test]
    fn test_evaluation_context() {
        let ctx = EvaluationContext::new(json!({
            "event": {
                "type": "PURCHASE",
                "timestamp": "2024-01-15T10:00:00Z"
            },
            "order": {
                "amount": 1000,
                "items": [
                    {"name": "ticket", "price": 500},
                    {"name": "food", "price": 500}
                ]
            },
            "user": {
                "id": "user-123",
                "is_vip": true,
                "nickname": null
            }
        }));

        assert_eq!(ctx.get_field("event.type"), Some(&json!("PURCHASE")));
        assert_eq!(ctx.get_field("order.amount"), Some(&json!(1000)));
        assert_eq!(ctx.get_field("user.is_vip"), Some(&json!(true)));
        assert_eq!(ctx.get_field("order.items.0.name"), Some(&json!("ticket")));
        assert_eq!(ctx.get_field("nonexistent"), None);
        assert_eq!(ctx.get_field("user.nickname"), Some(&Value::Null));
        assert_eq!(ctx.get_field("user.nickname.first"), None);
        assert_eq!(ctx.get_field("event.type.length"), None);
    }

    #[test]
    fn test_resolve_falsy_values_exist() {
        let ctx = EvaluationContext::new(json!({"zero": 0, "no": false, "empty": ""}));

        for path in ["zero", "no", "empty"] {
            let (value, exists) = ctx.resolve(path);
            assert!(exists, "{} should exist", path);
            assert!(value.is_some());
        }
        assert_eq!(ctx.resolve("missing"), (None, false));
    }

    #[test]
    fn test_consequence_template_deserialization() {
        let template: ConsequenceTemplate = serde_json::from_value(json!({
            "message": ["user", {"ref": "userId"}, "should not equal b"],
            "custom": 579
        }))
        .unwrap();

        assert_eq!(
            template.message,
            MessageTemplate::Parts(vec![
                MessagePart::Text("user".to_string()),
                MessagePart::Ref {
                    path: "userId".to_string()
                },
                MessagePart::Text("should not equal b".to_string()),
            ])
        );
        assert_eq!(template.custom, json!(579));

        let plain = json!({"message": "matched"});
        let plain: ConsequenceTemplate = serde_json::from_value(plain).unwrap();
        assert_eq!(plain.message, MessageTemplate::Text("matched".to_string()));
        assert_eq!(plain.custom, Value::Null);
    }
}
