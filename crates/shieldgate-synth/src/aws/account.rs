//! AWS account identity

use super::context::AwsContext;
use anyhow::{Context, Result};
use tracing::info;

/// 12-digit AWS account id
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Parse and check the 12-digit shape
    pub fn parse(s: &str) -> Option<Self> {
        (s.len() == 12 && s.chars().all(|c| c.is_ascii_digit())).then(|| AccountId(s.to_string()))
    }
}

/// Fetch the account the current credentials belong to.
///
/// `GetCallerIdentity` needs no permissions, so this doubles as a
/// credentials check.
pub async fn get_current_account_id(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    let account = AccountId::parse(account)
        .with_context(|| format!("STS returned a malformed account id: {account}"))?;
    info!(account_id = %account, region = %ctx.region(), "AWS account resolved");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            AccountId::parse("123456789012").map(|a| a.to_string()).as_deref(),
            Some("123456789012")
        );
        assert!(AccountId::parse("12345").is_none());
        assert!(AccountId::parse("12345678901x").is_none());
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_get_current_account_id() {
        let ctx = AwsContext::new(&shieldgate_test_utils::get_test_region(), None).await;
        let account = get_current_account_id(&ctx).await.unwrap();
        assert_eq!(account.len(), 12);
    }
}
