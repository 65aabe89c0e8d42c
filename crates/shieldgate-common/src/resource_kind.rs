//! CloudFormation resource types emitted by shieldgate
//!
//! Provides the template type name for each kind and marks the stateful ones,
//! which are the resources a tree-level removal policy cascades to.

/// Types of CloudFormation resources declared by the constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum ResourceKind {
    #[strum(serialize = "AWS::DynamoDB::Table")]
    DynamoDbTable,
    #[strum(serialize = "AWS::Cognito::UserPool")]
    UserPool,
    #[strum(serialize = "AWS::Cognito::UserPoolClient")]
    UserPoolClient,
    #[strum(serialize = "AWS::IAM::Role")]
    IamRole,
    #[strum(serialize = "AWS::IAM::Policy")]
    IamPolicy,
    #[strum(serialize = "AWS::Lambda::Function")]
    LambdaFunction,
    #[strum(serialize = "AWS::Lambda::Version")]
    LambdaVersion,
    #[strum(serialize = "AWS::Lambda::Permission")]
    LambdaPermission,
    #[strum(serialize = "AWS::ApiGateway::RestApi")]
    RestApi,
    #[strum(serialize = "AWS::ApiGateway::Resource")]
    ApiResource,
    #[strum(serialize = "AWS::ApiGateway::Method")]
    ApiMethod,
    #[strum(serialize = "AWS::ApiGateway::Authorizer")]
    ApiAuthorizer,
    #[strum(serialize = "AWS::ApiGateway::Deployment")]
    ApiDeployment,
    #[strum(serialize = "AWS::ApiGateway::Stage")]
    ApiStage,
    #[strum(serialize = "AWS::S3::Bucket")]
    S3Bucket,
    #[strum(serialize = "AWS::S3::BucketPolicy")]
    S3BucketPolicy,
    #[strum(serialize = "Custom::S3AutoDeleteObjects")]
    S3AutoDeleteObjects,
    #[strum(serialize = "AWS::CloudFront::OriginAccessControl")]
    OriginAccessControl,
    #[strum(serialize = "AWS::CloudFront::Distribution")]
    Distribution,
    #[strum(serialize = "AWS::Route53::RecordSet")]
    RecordSet,
    #[strum(serialize = "AWS::CertificateManager::Certificate")]
    Certificate,
    #[strum(serialize = "AWS::WAFv2::WebACL")]
    WebAcl,
    #[strum(serialize = "AWS::SecretsManager::Secret")]
    Secret,
    #[strum(serialize = "AWS::SecretsManager::RotationSchedule")]
    RotationSchedule,
    #[strum(serialize = "AWS::SSM::Parameter")]
    SsmParameter,
}

impl ResourceKind {
    /// CloudFormation `Type` string
    pub fn type_name(self) -> &'static str {
        self.into()
    }

    /// Whether the resource holds data that a removal policy protects
    pub fn is_stateful(self) -> bool {
        matches!(
            self,
            ResourceKind::DynamoDbTable
                | ResourceKind::UserPool
                | ResourceKind::S3Bucket
                | ResourceKind::Secret
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ResourceKind::DynamoDbTable.to_string(), "AWS::DynamoDB::Table");
        assert_eq!(ResourceKind::WebAcl.type_name(), "AWS::WAFv2::WebACL");
        assert_eq!(
            ResourceKind::S3AutoDeleteObjects.to_string(),
            "Custom::S3AutoDeleteObjects"
        );
    }

    #[test]
    fn test_stateful_kinds() {
        assert!(ResourceKind::DynamoDbTable.is_stateful());
        assert!(ResourceKind::S3Bucket.is_stateful());
        assert!(!ResourceKind::LambdaFunction.is_stateful());
        assert!(!ResourceKind::Distribution.is_stateful());
    }
}
