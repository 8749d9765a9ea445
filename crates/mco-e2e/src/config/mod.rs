pub mod cli;
pub mod options;
pub mod waits;

use error_stack::Report;

use crate::error::E2eError;

/// S3 settings for the thanos object-storage secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStorage {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl TryFrom<&ObjectStorageArgs> for ObjectStorage {
    type Error = Report<E2eError>;

    fn try_from(args: &ObjectStorageArgs) -> Result<Self, Self::Error> {
        fn require(value: &Option<String>, env: &str) -> Result<String, Report<E2eError>> {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Report::new(E2eError::configuration(format!(
                        "failed to get s3 {env} env"
                    )))
                })
        }

        Ok(Self {
            bucket: require(&args.bucket, "BUCKET")?,
            region: require(&args.region, "REGION")?,
            access_key: require(&args.access_key, "ACCESSKEY")?,
            secret_key: require(&args.secret_key, "SECRETKEY")?,
        })
    }
}

pub use cli::*;
pub use options::*;
pub use waits::*;

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn object_storage_requires_every_variable() {
        let mut args = ObjectStorageArgs {
            bucket: Some("observability".to_string()),
            region: Some("us-east-1".to_string()),
            access_key: Some("AKIA".to_string()),
            secret_key: None,
        };
        let report = ObjectStorage::try_from(&args).expect_err("secret key missing");
        assert_eq!(
            report.current_context().to_string(),
            "Invalid test configuration: failed to get s3 SECRETKEY env"
        );

        args.secret_key = Some("secret".to_string());
        let storage = ObjectStorage::try_from(&args).expect("complete settings");
        assert_eq!(storage.region, "us-east-1");
    }
}
