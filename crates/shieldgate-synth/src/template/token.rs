//! Deploy-time value references
//!
//! A [`Token`] is either a literal known at synthesis time or a reference
//! that CloudFormation resolves during deployment. Tokens serialize
//! directly into the intrinsic-function JSON shapes, so they can be
//! embedded in `serde_json::json!` property blocks.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A value that may only be known at deploy time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A concrete value known at synthesis time
    Literal(String),
    /// `{"Ref": "<logical id or pseudo parameter>"}`
    Ref(String),
    /// `{"Fn::GetAtt": ["<logical id>", "<attribute>"]}`
    GetAtt(String, String),
    /// `{"Fn::Sub": "<template>"}` with `${Name}` / `${Name.Attr}` placeholders
    Sub(String),
    /// `{"Fn::Join": ["<delimiter>", [..parts]]}`
    Join(String, Vec<Token>),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt(logical_id.into(), attribute.into())
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Token::Sub(template.into())
    }

    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = Token>) -> Self {
        Token::Join(delimiter.into(), parts.into_iter().collect())
    }

    /// `AWS::Region` of the stack being deployed
    pub fn region() -> Self {
        Token::Ref("AWS::Region".to_string())
    }

    pub fn account_id() -> Self {
        Token::Ref("AWS::AccountId".to_string())
    }

    pub fn partition() -> Self {
        Token::Ref("AWS::Partition".to_string())
    }

    pub fn stack_name() -> Self {
        Token::Ref("AWS::StackName".to_string())
    }

    /// Whether the value is known at synthesis time.
    ///
    /// A join of literals counts as resolved; a `Sub` never does because its
    /// placeholders always name deploy-time values.
    pub fn is_resolved(&self) -> bool {
        match self {
            Token::Literal(_) => true,
            Token::Join(_, parts) => parts.iter().all(Token::is_resolved),
            Token::Ref(_) | Token::GetAtt(..) | Token::Sub(_) => false,
        }
    }

    /// The synthesis-time value, if there is one.
    pub fn as_literal(&self) -> Option<String> {
        match self {
            Token::Literal(v) => Some(v.clone()),
            Token::Join(delim, parts) => parts
                .iter()
                .map(Token::as_literal)
                .collect::<Option<Vec<_>>>()
                .map(|p| p.join(delim)),
            _ => None,
        }
    }

    /// Resolve the token against a deployment lookup.
    ///
    /// `lookup(name, attribute)` is asked for every `Ref` (attribute `None`)
    /// and `GetAtt` (attribute `Some`) in the token, including pseudo
    /// parameters such as `AWS::Region`. Returns `None` as soon as any
    /// reference cannot be resolved.
    pub fn resolve_with<F>(&self, lookup: &F) -> Option<String>
    where
        F: Fn(&str, Option<&str>) -> Option<String>,
    {
        match self {
            Token::Literal(v) => Some(v.clone()),
            Token::Ref(name) => lookup(name, None),
            Token::GetAtt(name, attr) => lookup(name, Some(attr)),
            Token::Join(delim, parts) => parts
                .iter()
                .map(|p| p.resolve_with(lookup))
                .collect::<Option<Vec<_>>>()
                .map(|p| p.join(delim)),
            Token::Sub(template) => resolve_sub(template, lookup),
        }
    }
}

fn resolve_sub<F>(template: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str, Option<&str>) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        let placeholder = &after[..end];
        // Pseudo parameters contain "::" and never carry an attribute
        let value = match placeholder.split_once('.') {
            Some((name, attr)) if !name.contains("::") => lookup(name, Some(attr))?,
            _ => lookup(placeholder, None)?,
        };
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Literal(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Literal(value)
    }
}

impl From<&String> for Token {
    fn from(value: &String) -> Self {
        Token::Literal(value.clone())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(v) => f.write_str(v),
            Token::Ref(name) => write!(f, "${{Ref:{name}}}"),
            Token::GetAtt(name, attr) => write!(f, "${{GetAtt:{name}.{attr}}}"),
            Token::Sub(t) => write!(f, "${{Sub:{t}}}"),
            Token::Join(delim, parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(delim)?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Token::Literal(v) => serializer.serialize_str(v),
            Token::Ref(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Token::GetAtt(name, attr) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[name, attr])?;
                map.end()
            }
            Token::Sub(template) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Sub", template)?;
                map.end()
            }
            Token::Join(delim, parts) => {
                // Fully literal joins collapse to a plain string
                if let Some(v) = self.as_literal() {
                    return serializer.serialize_str(&v);
                }
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Join", &(delim, parts))?;
                map.end()
            }
        }
    }
}
