//! S3 client construction.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::AmazonS3Builder;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{S3ConfigSnafu, StorageError};

/// Build an S3 store with explicit credentials and the bucket-owner ACL.
///
/// Environment configuration (region, profile, etc.) is picked up first and
/// then overridden by explicit settings, so deployments can rely on either.
pub(super) fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-amz-acl"),
        HeaderValue::from_static("bucket-owner-full-control"),
    );

    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&config.bucket)
        .with_access_key_id(&config.aws_key_id)
        .with_secret_access_key(&config.aws_sec_key)
        .with_client_options(ClientOptions::new().with_default_headers(headers))
        .with_retry(RetryConfig::default());

    if let Some(region) = &config.region {
        builder = builder.with_region(region);
    }

    if let Some(endpoint) = &config.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(true);
    }

    let store = builder.build().context(S3ConfigSnafu)?;
    Ok(Arc::new(store))
}
