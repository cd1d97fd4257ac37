//! 人物信息提取结果

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// 未提取到字段时使用的标记
pub const NOT_FOUND: &str = "Not found";

/// 单个提取字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum FieldValue {
    Found(String),
    NotFound,
}

impl FieldValue {
    /// 从模型返回的 JSON 值构建字段
    ///
    /// `null`、`false`、空字符串、`0` 都视为未找到。
    /// 只含空白的字符串也算未找到，比单纯的真值判断更严格：
    /// 模型返回的 `"  "` 不会被当作人名原样透传。
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => FieldValue::NotFound,
            Some(Value::String(s)) if s.trim().is_empty() => FieldValue::NotFound,
            Some(Value::String(s)) => FieldValue::Found(s.clone()),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => FieldValue::NotFound,
            Some(other) => FieldValue::Found(other.to_string()),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Found(s) => f.write_str(s),
            FieldValue::NotFound => f.write_str(NOT_FOUND),
        }
    }
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Found(s) => s,
            FieldValue::NotFound => NOT_FOUND.to_string(),
        }
    }
}

/// 从一张截图中提取出的人物信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub name: FieldValue,
    pub company: FieldValue,
    pub role: FieldValue,
    pub timestamp: FieldValue,
    /// 原始输入图片
    pub image_url: String,
}

impl PersonRecord {
    /// 由模型返回的 JSON 对象构建记录
    pub fn from_json_object(object: &Map<String, Value>, image_url: &str) -> Self {
        Self {
            name: FieldValue::from_json(object.get("name")),
            company: FieldValue::from_json(object.get("company")),
            role: FieldValue::from_json(object.get("role")),
            timestamp: FieldValue::from_json(object.get("timestamp")),
            image_url: image_url.to_string(),
        }
    }

    /// 提取到的字段数量
    pub fn found_count(&self) -> usize {
        [&self.name, &self.company, &self.role, &self.timestamp]
            .iter()
            .filter(|field| field.is_found())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_partial_record() {
        let record = PersonRecord::from_json_object(
            &object(json!({"name": "Jane", "company": null, "role": "Engineer"})),
            "data:image/png;base64,AAAA",
        );
        assert_eq!(record.name, FieldValue::Found("Jane".to_string()));
        assert_eq!(record.company, FieldValue::NotFound);
        assert_eq!(record.role, FieldValue::Found("Engineer".to_string()));
        assert_eq!(record.timestamp, FieldValue::NotFound);
        assert_eq!(record.image_url, "data:image/png;base64,AAAA");
        assert_eq!(record.found_count(), 2);
    }

    #[test]
    fn test_falsy_values_are_not_found() {
        let record = PersonRecord::from_json_object(
            &object(json!({"name": "", "company": false, "role": 0, "timestamp": "  "})),
            "img",
        );
        assert_eq!(record.found_count(), 0);
    }

    #[test]
    fn test_non_string_scalar_kept() {
        let record =
            PersonRecord::from_json_object(&object(json!({"timestamp": 1700000000})), "img");
        assert_eq!(record.timestamp, FieldValue::Found("1700000000".to_string()));
    }

    #[test]
    fn test_serialized_shape() {
        let record = PersonRecord::from_json_object(&object(json!({"name": "Jane"})), "imgX");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Jane",
                "company": NOT_FOUND,
                "role": NOT_FOUND,
                "timestamp": NOT_FOUND,
                "imageUrl": "imgX"
            })
        );
    }
}
