//! [`ObjectStorageClient`] on the AWS S3 SDK.
//!
//! Requests use path-style addressing (`{endpoint}/{bucket}/{key}`) so the
//! same client works against AWS and S3-compatible servers such as MinIO.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{
    BehaviorVersion, Builder, Credentials, Region, RequestChecksumCalculation,
    ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream as ObjectBody, DateTime as SdkDateTime};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use picforge_common::{Error, Result};
use tracing::{debug, trace};

use super::client::{BucketCreation, ObjectAcl, ObjectInfo, ObjectStorageClient};
use crate::config::ObjectStorageOptions;

/// Region that must not be sent as a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Default AWS endpoint for a region.
pub fn default_endpoint(region: &str) -> String {
    format!("https://s3.{}.amazonaws.com", region)
}

/// [`ObjectStorageClient`] speaking the S3 API through `aws-sdk-s3`.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    region: String,
    endpoint: String,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

impl S3Client {
    pub fn new(options: &ObjectStorageOptions) -> Result<Self> {
        let region = if options.region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            options.region.clone()
        };

        let credentials = Credentials::new(
            &options.access_key_id,
            &options.secret_access_key,
            options.session_token.clone(),
            None,
            "picforge",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.clone()))
            // Required for MinIO and other S3-compatible servers
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired);

        let endpoint = match &options.endpoint {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let parsed = url::Url::parse(endpoint)
                    .map_err(|e| Error::config(format!("Invalid S3 endpoint {}: {}", endpoint, e)))?;
                if parsed.host_str().is_none() {
                    return Err(Error::config(format!("S3 endpoint has no host: {}", endpoint)));
                }
                builder = builder.endpoint_url(endpoint);
                endpoint.to_string()
            }
            None => default_endpoint(&region),
        };

        Ok(Self {
            client: Client::from_conf(builder.build()),
            region,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn canned_acl(acl: ObjectAcl) -> ObjectCannedAcl {
    match acl {
        ObjectAcl::Private => ObjectCannedAcl::Private,
        ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

/// `x-amz-copy-source` value: bucket and key, each segment percent-encoded.
fn copy_source(bucket: &str, key: &str) -> String {
    let key: Vec<_> = key.split('/').map(|segment| urlencoding::encode(segment)).collect();
    format!("{}/{}", bucket, key.join("/"))
}

fn to_chrono(time: Option<&SdkDateTime>) -> Option<DateTime<Utc>> {
    time.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn has_status<E>(err: &SdkError<E, HttpResponse>, status: u16) -> bool {
    err.raw_response()
        .is_some_and(|response| response.status().as_u16() == status)
}

fn sdk_error<E>(operation: &str, target: &str, err: SdkError<E, HttpResponse>) -> Error
where
    E: std::error::Error + 'static,
{
    Error::storage(format!(
        "S3 {} {} failed: {}",
        operation,
        target,
        DisplayErrorContext(&err)
    ))
}

#[async_trait]
impl ObjectStorageClient for S3Client {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) || has_status(&e, 404) => {
                Ok(false)
            }
            Err(e) => Err(sdk_error("HeadBucket", bucket, e)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                debug!("Created bucket {}", bucket);
                Ok(BucketCreation::Created)
            }
            Err(e) if e
                .as_service_error()
                .is_some_and(|s| s.is_bucket_already_owned_by_you()) =>
            {
                Ok(BucketCreation::AlreadyOwnedByYou)
            }
            Err(e) => Err(sdk_error("CreateBucket", bucket, e)),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<()> {
        trace!("S3 PutObject {}/{} ({} bytes)", bucket, key, body.len());
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ObjectBody::from(body))
            .set_content_type(content_type.map(str::to_string))
            .acl(canned_acl(acl))
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", key, e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) || has_status(&e, 404) => {
                return Ok(None)
            }
            Err(e) => return Err(sdk_error("GetObject", key, e)),
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Error::storage(format!("S3 GetObject {} body: {}", key, e)))?;
        Ok(Some(data.into_bytes()))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectInfo>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: to_chrono(output.last_modified()),
            })),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) || has_status(&e, 404) => {
                Ok(None)
            }
            Err(e) => Err(sdk_error("HeadObject", key, e)),
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_bucket()) => {
                    return Ok(Vec::new())
                }
                Err(e) => return Err(sdk_error("ListObjectsV2", prefix, e)),
            };
            objects.extend(page.contents().iter().filter_map(|object| {
                Some(ObjectInfo {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: to_chrono(object.last_modified()),
                })
            }));
        }
        Ok(objects)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match self.client.delete_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(()),
            Err(e) if has_status(&e, 404) => Ok(()),
            Err(e) => Err(sdk_error("DeleteObject", key, e)),
        }
    }

    async fn copy_object(&self, bucket: &str, from: &str, to: &str, acl: ObjectAcl) -> Result<()> {
        match self
            .client
            .copy_object()
            .bucket(bucket)
            .key(to)
            .copy_source(copy_source(bucket, from))
            .acl(canned_acl(acl))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if has_status(&e, 404) => Err(Error::not_found(from)),
            Err(e) => Err(sdk_error("CopyObject", to, e)),
        }
    }
}
