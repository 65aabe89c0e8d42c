//! DynamoDB table

use super::function::LambdaFunction;
use crate::error::{Result, SynthError};
use crate::template::{
    PolicyStatement, PropertyOverrides, RemovalPolicy, Resource, Setting, Stack, Token,
};
use serde_json::json;
use shieldgate_common::ResourceKind;

pub const DEFAULT_PARTITION_KEY: &str = "pk";
pub const DEFAULT_SORT_KEY: &str = "sk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AttributeType {
    #[strum(serialize = "S")]
    String,
    #[strum(serialize = "N")]
    Number,
    #[strum(serialize = "B")]
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeType,
}

impl Attribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeType::String,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeType::Number,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned { read: u32, write: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct TableProps {
    pub table_name: Option<String>,
    /// Default: `pk` (string)
    pub partition_key: Option<Attribute>,
    /// Default: `sk` (string); `Setting::Absent` creates a hash-only table
    pub sort_key: Setting<Attribute>,
    /// Default: on-demand
    pub billing_mode: Option<BillingMode>,
    /// Default: enabled
    pub point_in_time_recovery: Option<bool>,
    pub time_to_live_attribute: Option<String>,
    /// Default: `Retain`
    pub removal_policy: Option<RemovalPolicy>,
    pub property_overrides: PropertyOverrides,
}

/// Handle to a synthesized table
#[derive(Debug, Clone)]
pub struct DataTable {
    pub logical_id: String,
    pub table_name: Token,
    pub table_arn: Token,
    pub partition_key: Attribute,
    pub sort_key: Option<Attribute>,
    pub billing_mode: BillingMode,
    pub removal_policy: RemovalPolicy,
}

impl DataTable {
    pub fn new(stack: &mut Stack, id: &str, props: TableProps) -> Result<Self> {
        let partition_key = props
            .partition_key
            .unwrap_or_else(|| Attribute::string(DEFAULT_PARTITION_KEY));
        let sort_key = props
            .sort_key
            .resolve_or_else(|| Some(Attribute::string(DEFAULT_SORT_KEY)));

        if partition_key.name.is_empty() {
            return Err(SynthError::invalid("partition_key", "name must not be empty"));
        }
        if let Some(sk) = &sort_key {
            if sk.name.is_empty() {
                return Err(SynthError::invalid("sort_key", "name must not be empty"));
            }
            if sk.name == partition_key.name {
                return Err(SynthError::invalid(
                    "sort_key",
                    format!("'{}' is already the partition key", sk.name),
                ));
            }
        }
        let billing_mode = props.billing_mode.unwrap_or_default();
        let removal_policy = props.removal_policy.unwrap_or(RemovalPolicy::Retain);

        let mut key_schema = vec![json!({"AttributeName": partition_key.name, "KeyType": "HASH"})];
        let mut attributes = vec![json!({
            "AttributeName": partition_key.name,
            "AttributeType": partition_key.kind.to_string(),
        })];
        if let Some(sk) = &sort_key {
            key_schema.push(json!({"AttributeName": sk.name, "KeyType": "RANGE"}));
            attributes.push(json!({
                "AttributeName": sk.name,
                "AttributeType": sk.kind.to_string(),
            }));
        }

        let (mode, throughput) = match billing_mode {
            BillingMode::PayPerRequest => ("PAY_PER_REQUEST", None),
            BillingMode::Provisioned { read, write } => (
                "PROVISIONED",
                Some(json!({"ReadCapacityUnits": read, "WriteCapacityUnits": write})),
            ),
        };

        let resource = Resource::new(ResourceKind::DynamoDbTable)
            .with_properties(json!({
                "TableName": props.table_name,
                "KeySchema": key_schema,
                "AttributeDefinitions": attributes,
                "BillingMode": mode,
                "ProvisionedThroughput": throughput,
                "PointInTimeRecoverySpecification": {
                    "PointInTimeRecoveryEnabled": props.point_in_time_recovery.unwrap_or(true),
                },
                "SSESpecification": { "SSEEnabled": true },
                "TimeToLiveSpecification": props.time_to_live_attribute.map(|attr| json!({
                    "AttributeName": attr,
                    "Enabled": true,
                })),
            }))
            .with_overrides(&props.property_overrides)
            .with_removal_policy(Some(removal_policy));
        let logical_id = stack.add(id, resource)?;

        Ok(Self {
            table_name: Token::reference(&logical_id),
            table_arn: Token::get_att(&logical_id, "Arn"),
            logical_id,
            partition_key,
            sort_key,
            billing_mode,
            removal_policy,
        })
    }

    pub fn read_write_statement(&self) -> PolicyStatement {
        PolicyStatement::allow()
            .actions([
                "dynamodb:BatchGetItem",
                "dynamodb:BatchWriteItem",
                "dynamodb:ConditionCheckItem",
                "dynamodb:DeleteItem",
                "dynamodb:GetItem",
                "dynamodb:PutItem",
                "dynamodb:Query",
                "dynamodb:Scan",
                "dynamodb:UpdateItem",
            ])
            .resource(self.table_arn.clone())
            .resource(Token::join("", [self.table_arn.clone(), Token::literal("/index/*")]))
    }

    pub fn grant_read_write(&self, stack: &mut Stack, function: &LambdaFunction) -> Result<()> {
        function.grant(stack, self.read_write_statement())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StackEnv;

    fn synth(props: TableProps) -> (Stack, DataTable) {
        let mut stack = Stack::new("t", StackEnv::agnostic());
        let table = DataTable::new(&mut stack, "Table", props).unwrap();
        (stack, table)
    }

    #[test]
    fn test_defaults() {
        let (stack, table) = synth(TableProps::default());
        let r = stack.resource(&table.logical_id).unwrap();
        assert_eq!(
            r.prop("KeySchema"),
            Some(&json!([
                {"AttributeName": "pk", "KeyType": "HASH"},
                {"AttributeName": "sk", "KeyType": "RANGE"},
            ]))
        );
        assert_eq!(r.prop("BillingMode"), Some(&json!("PAY_PER_REQUEST")));
        assert!(r.prop("ProvisionedThroughput").is_none());
        assert_eq!(
            r.prop("PointInTimeRecoverySpecification"),
            Some(&json!({"PointInTimeRecoveryEnabled": true}))
        );
        assert_eq!(r.removal_policy, Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_sort_key_absent_vs_unset() {
        let (_, unset) = synth(TableProps::default());
        assert_eq!(unset.sort_key, Some(Attribute::string("sk")));

        let (stack, absent) = synth(TableProps {
            sort_key: Setting::Absent,
            ..Default::default()
        });
        assert_eq!(absent.sort_key, None);
        let r = stack.resource(&absent.logical_id).unwrap();
        assert_eq!(r.prop("KeySchema").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(r.prop("AttributeDefinitions").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_partition_key_override_keeps_sort_key() {
        let (_, table) = synth(TableProps {
            partition_key: Some(Attribute::number("id")),
            ..Default::default()
        });
        assert_eq!(table.partition_key, Attribute::number("id"));
        assert_eq!(table.sort_key, Some(Attribute::string("sk")));
    }

    #[test]
    fn test_provisioned_billing() {
        let (stack, table) = synth(TableProps {
            billing_mode: Some(BillingMode::Provisioned { read: 5, write: 2 }),
            ..Default::default()
        });
        let r = stack.resource(&table.logical_id).unwrap();
        assert_eq!(r.prop("BillingMode"), Some(&json!("PROVISIONED")));
        assert_eq!(r.prop("ProvisionedThroughput").unwrap()["ReadCapacityUnits"], 5);
    }

    #[test]
    fn test_conflicting_keys() {
        let mut stack = Stack::new("t", StackEnv::agnostic());
        let err = DataTable::new(
            &mut stack,
            "Table",
            TableProps {
                sort_key: Setting::Set(Attribute::string("pk")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::InvalidValue { field: "sort_key", .. }));
    }
}
