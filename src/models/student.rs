use serde::{Deserialize, Serialize};

/// 学生基本信息（student_info.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInfo {
    #[serde(deserialize_with = "deserialize_id")]
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub gender: String,
}

impl StudentInfo {
    /// 缺少信息文件时的占位信息
    pub fn placeholder(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            name: student_id.to_string(),
            gender: String::new(),
        }
    }
}

// 学号既可能是字符串也可能是整数
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer representing a student id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_student_id() {
        let info: StudentInfo =
            serde_json::from_str(r#"{"student_id": 2024001, "name": "张三", "gender": "男"}"#)
                .unwrap();
        assert_eq!(info.student_id, "2024001");

        let info: StudentInfo =
            serde_json::from_str(r#"{"student_id": "2024002", "name": "李四"}"#).unwrap();
        assert_eq!(info.student_id, "2024002");
        assert!(info.gender.is_empty());
    }
}
