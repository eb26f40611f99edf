//! Descriptive metadata consumed by the OpenAPI generator.

use serde_json::{Map, Value};

use crate::token::Token;

/// Summary, description and operation id of one handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationDoc {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }
}

/// A documented path or query parameter. `required` left unset means "path
/// parameters are required, query parameters are not".
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDoc {
    pub name: String,
    pub description: Option<String>,
    pub ty: ParamType,
    pub required: Option<bool>,
}

impl ParamDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: ParamType::String,
            required: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn ty(mut self, ty: ParamType) -> Self {
        self.ty = ty;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }
}

/// Request body: a `$ref` to a DTO, or an open object when `schema` is None.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyDoc {
    pub description: Option<String>,
    pub schema: Option<Token>,
    pub required: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDoc {
    pub status: u16,
    pub description: String,
    pub schema: Option<Token>,
    pub is_array: bool,
}

impl ResponseDoc {
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            schema: None,
            is_array: false,
        }
    }

    pub fn of<D: 'static>(mut self) -> Self {
        self.schema = Some(Token::of::<D>());
        self
    }

    pub fn list_of<D: 'static>(mut self) -> Self {
        self.schema = Some(Token::of::<D>());
        self.is_array = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PropertyType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    /// Another declared DTO, rendered as `$ref`.
    Ref(Token),
}

/// Allowed values, given either as a list or as an enumeration-like object
/// whose values are the allowed set.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumValues {
    List(Vec<Value>),
    Object(Map<String, Value>),
}

impl EnumValues {
    pub fn values(&self) -> Vec<Value> {
        match self {
            EnumValues::List(v) => v.clone(),
            EnumValues::Object(m) => m.values().cloned().collect(),
        }
    }
}

/// Hand-declared shape of one DTO field.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDoc {
    pub name: String,
    pub ty: PropertyType,
    pub format: Option<String>,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub enum_values: Option<EnumValues>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub default: Option<Value>,
    pub required: bool,
    pub is_array: bool,
}

impl PropertyDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: PropertyType::String,
            format: None,
            description: None,
            example: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
            default: None,
            required: true,
            is_array: false,
        }
    }

    pub fn string(mut self) -> Self {
        self.ty = PropertyType::String;
        self
    }

    pub fn integer(mut self) -> Self {
        self.ty = PropertyType::Integer;
        self
    }

    pub fn number(mut self) -> Self {
        self.ty = PropertyType::Number;
        self
    }

    pub fn boolean(mut self) -> Self {
        self.ty = PropertyType::Boolean;
        self
    }

    pub fn object(mut self) -> Self {
        self.ty = PropertyType::Object;
        self
    }

    pub fn reference<D: 'static>(mut self) -> Self {
        self.ty = PropertyType::Ref(Token::of::<D>());
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(EnumValues::List(
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn enum_object(mut self, variants: Map<String, Value>) -> Self {
        self.enum_values = Some(EnumValues::Object(variants));
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_object_normalizes_to_values() {
        let mut variants = Map::new();
        variants.insert("Active".into(), json!("active"));
        variants.insert("Banned".into(), json!("banned"));

        let values = EnumValues::Object(variants).values();
        assert_eq!(values.len(), 2);
        assert!(values.contains(&json!("active")));
        assert!(values.contains(&json!("banned")));

        let list = EnumValues::List(vec![json!(1), json!(2)]).values();
        assert_eq!(list, vec![json!(1), json!(2)]);
    }

    #[test]
    fn property_defaults_to_required_string() {
        let p = PropertyDoc::new("email");
        assert_eq!(p.ty, PropertyType::String);
        assert!(p.required);
        assert!(!p.is_array);

        let p = p.optional().array().reference::<ParamDoc>();
        assert!(!p.required);
        assert!(p.is_array);
        assert_eq!(p.ty, PropertyType::Ref(Token::of::<ParamDoc>()));
    }
}
