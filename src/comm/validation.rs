use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$"
    )
    .expect("邮箱正则表达式无效");
}

/// 验证规则
#[derive(Debug, Clone)]
pub enum ValidationRule {
    /// 去除首尾空白后不能为空
    Required,
    /// 按字符数计算长度
    Length { min: Option<usize>, max: Option<usize> },
    Email,
    Regex(Regex),
}

impl ValidationRule {
    fn check(&self, value: &str) -> bool {
        match self {
            ValidationRule::Required => !value.trim().is_empty(),
            ValidationRule::Length { min, max } => {
                let len = value.chars().count();
                min.map_or(true, |min| len >= min) && max.map_or(true, |max| len <= max)
            }
            ValidationRule::Email => is_valid_email(value),
            ValidationRule::Regex(regex) => regex.is_match(value),
        }
    }
}

/// 邮箱格式检查
pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL_REGEX.is_match(value)
}

/// 请求中的正整数 ID；空值、非数字与非正数都视为缺失
pub fn parse_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

/// 字段级错误信息，按字段名排序
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 第一条错误信息
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// 字段验证配置：规则按顺序执行，遇到第一条失败即停止
#[derive(Debug, Clone)]
pub struct FieldValidation {
    pub field_name: String,
    pub rules: Vec<(ValidationRule, String)>,
}

impl FieldValidation {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: ValidationRule, message: impl Into<String>) -> Self {
        self.rules.push((rule, message.into()));
        self
    }

    pub fn required(self, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::Required, message)
    }

    pub fn min_chars(self, min: usize, message: impl Into<String>) -> Self {
        self.rule(
            ValidationRule::Length {
                min: Some(min),
                max: None,
            },
            message,
        )
    }

    pub fn email(self, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::Email, message)
    }

    /// 返回第一条未通过规则的信息
    pub fn check(&self, value: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(rule, _)| !rule.check(value))
            .map(|(_, message)| message.as_str())
    }
}

/// 表单验证器
#[derive(Debug, Clone, Default)]
pub struct Validator {
    fields: Vec<FieldValidation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, validation: FieldValidation) -> Self {
        self.fields.push(validation);
        self
    }

    /// 验证单个字段，未配置的字段视为通过
    pub fn validate_field(&self, field_name: &str, value: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field_name == field_name)
            .and_then(|f| f.check(value))
    }

    /// 验证全部字段；`value_of` 返回字段的原始值，缺失按空字符串处理
    pub fn validate<'a, F>(&self, value_of: F) -> Result<(), FieldErrors>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            let value = value_of(&field.field_name).unwrap_or("");
            if let Some(message) = field.check(value) {
                errors.insert(field.field_name.clone(), message);
            }
        }
        errors.into_result()
    }
}
