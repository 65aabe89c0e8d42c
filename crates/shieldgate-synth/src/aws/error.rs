//! AWS error classification
//!
//! Classifies SDK failures by their `.code()` so the CLI can print an
//! actionable message. Nothing here retries: a failed lookup fails the
//! synthesis run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error("Parameter not found: {message}")]
    NotFound { message: String },

    #[error("Rate limit exceeded")]
    Throttled,

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Missing, expired or otherwise unusable credentials
    #[error("Invalid credentials: {message}")]
    Credentials { message: String },

    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// A user-facing hint for resolving the error, if there is one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AwsError::NotFound { .. } => Some(
                "Deploy the edge stack first, or check --ssm-prefix matches the edge stack's prefix.",
            ),
            AwsError::Throttled => Some("AWS API rate limit hit. Wait a moment and run again."),
            AwsError::AccessDenied { .. } => {
                Some("The credentials need ssm:GetParameters on the parameter prefix.")
            }
            AwsError::Credentials { .. } => {
                Some("Refresh your AWS credentials or pass --aws-profile.")
            }
            AwsError::Sdk { .. } => None,
        }
    }
}

const NOT_FOUND_CODES: &[&str] = &["ParameterNotFound", "ParameterVersionNotFound"];

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
];

const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AccessDeniedException"];

const CREDENTIAL_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
];

/// Classify an AWS SDK error using its code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        Some(c) if CREDENTIAL_CODES.contains(&c) => AwsError::Credentials { message },
        _ => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Classify an `anyhow::Error` by finding the SDK error in its chain.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    use aws_sdk_ssm::error::ProvideErrorMetadata;

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<aws_sdk_ssm::error::SdkError<
            aws_sdk_ssm::operation::get_parameters::GetParametersError,
        >>() {
            return classify_aws_error(e.code(), e.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_sts::error::SdkError<
            aws_sdk_sts::operation::get_caller_identity::GetCallerIdentityError,
        >>() {
            return classify_aws_error(e.code(), e.message());
        }
    }

    let debug_str = format!("{error:?}");
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&error.to_string()));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Pull a `code: Some("...")` field out of an SDK error's debug output
fn extract_error_code(debug_str: &str) -> Option<String> {
    let start = debug_str.find("code: Some(\"")?;
    let rest = &debug_str[start + 12..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}
