//! AWS SDK implementations of the CDN provider's API traits.

use super::api::{
    AcmApi, CachePolicySpec, CertificateDetail, CertificateStatus, CloudFrontApi,
    DistributionSpec, DistributionSummary, DomainValidation, S3WebsiteApi, ValidationRecord,
};
use crate::error::{CdnError, CdnResult};
use async_trait::async_trait;
use aws_sdk_acm::types::{CertificateStatus as AcmStatus, DomainStatus, ValidationMethod};
use aws_sdk_cloudfront::error::{DisplayErrorContext, SdkError};
use aws_sdk_cloudfront::types::{
    Aliases, AllowedMethods, CachePolicyConfig, CachePolicyCookieBehavior,
    CachePolicyCookiesConfig, CachePolicyHeaderBehavior, CachePolicyHeadersConfig,
    CachePolicyQueryStringBehavior, CachePolicyQueryStringsConfig, CachePolicyType,
    CachedMethods, CustomOriginConfig, DefaultCacheBehavior, DistributionConfig,
    InvalidationBatch, Method, MinimumProtocolVersion, Origin, OriginProtocolPolicy, Origins,
    ParametersInCacheKeyAndForwardedToOrigin, Paths, SslSupportMethod, ViewerCertificate,
    ViewerProtocolPolicy,
};
use aws_sdk_s3::types::{ErrorDocument, IndexDocument, WebsiteConfiguration};

/// Map an SDK error, keeping the HTTP status when a response was received.
///
/// Every AWS SDK crate re-exports the same `SdkError`.
fn sdk_error<E>(err: SdkError<E>) -> CdnError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match err.raw_response().map(|raw| raw.status().as_u16()) {
        Some(status) => CdnError::Status {
            status,
            message: DisplayErrorContext(&err).to_string(),
        },
        None => CdnError::aws(err),
    }
}

fn quantity(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// [`CloudFrontApi`] over the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkCloudFront {
    client: aws_sdk_cloudfront::Client,
}

impl SdkCloudFront {
    pub fn new(client: aws_sdk_cloudfront::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudFrontApi for SdkCloudFront {
    async fn list_distributions(&self) -> CdnResult<Vec<DistributionSummary>> {
        let mut distributions = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_error)?;
            let Some(list) = output.distribution_list() else {
                break;
            };
            distributions.extend(list.items().iter().map(|d| DistributionSummary {
                id: d.id().to_string(),
                domain_name: d.domain_name().to_string(),
                aliases: d
                    .aliases()
                    .map(|a| a.items().to_vec())
                    .unwrap_or_default(),
            }));
            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(distributions)
    }

    async fn find_cache_policy(&self, name: &str) -> CdnResult<Option<String>> {
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_cache_policies()
                .r#type(CachePolicyType::Custom)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_error)?;
            let Some(list) = output.cache_policy_list() else {
                return Ok(None);
            };
            let found = list
                .items()
                .iter()
                .filter_map(|summary| summary.cache_policy())
                .find(|policy| {
                    policy
                        .cache_policy_config()
                        .is_some_and(|config| config.name() == name)
                });
            if let Some(policy) = found {
                return Ok(Some(policy.id().to_string()));
            }
            match list.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn create_cache_policy(&self, spec: &CachePolicySpec) -> CdnResult<String> {
        let parameters = ParametersInCacheKeyAndForwardedToOrigin::builder()
            .enable_accept_encoding_gzip(spec.gzip)
            .enable_accept_encoding_brotli(spec.brotli)
            .headers_config(
                CachePolicyHeadersConfig::builder()
                    .header_behavior(CachePolicyHeaderBehavior::None)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .cookies_config(
                CachePolicyCookiesConfig::builder()
                    .cookie_behavior(CachePolicyCookieBehavior::None)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .query_strings_config(
                CachePolicyQueryStringsConfig::builder()
                    .query_string_behavior(CachePolicyQueryStringBehavior::None)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .build()
            .map_err(CdnError::aws)?;
        let config = CachePolicyConfig::builder()
            .name(&spec.name)
            .min_ttl(spec.min_ttl)
            .default_ttl(spec.default_ttl)
            .max_ttl(spec.max_ttl)
            .parameters_in_cache_key_and_forwarded_to_origin(parameters)
            .build()
            .map_err(CdnError::aws)?;
        let output = self
            .client
            .create_cache_policy()
            .cache_policy_config(config)
            .send()
            .await
            .map_err(sdk_error)?;
        output
            .cache_policy()
            .map(|policy| policy.id().to_string())
            .ok_or_else(|| CdnError::InvalidResponse("CreateCachePolicy returned no policy".into()))
    }

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> CdnResult<DistributionSummary> {
        let origin_id = format!("S3-Website-{}", spec.origin_domain);
        let origin = Origin::builder()
            .id(&origin_id)
            .domain_name(&spec.origin_domain)
            .custom_origin_config(
                CustomOriginConfig::builder()
                    .http_port(80)
                    .https_port(443)
                    .origin_protocol_policy(OriginProtocolPolicy::HttpOnly)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .build()
            .map_err(CdnError::aws)?;
        let allowed_methods = AllowedMethods::builder()
            .quantity(3)
            .items(Method::Get)
            .items(Method::Head)
            .items(Method::Options)
            .cached_methods(
                CachedMethods::builder()
                    .quantity(2)
                    .items(Method::Get)
                    .items(Method::Head)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .build()
            .map_err(CdnError::aws)?;
        let behavior = DefaultCacheBehavior::builder()
            .target_origin_id(&origin_id)
            .viewer_protocol_policy(ViewerProtocolPolicy::RedirectToHttps)
            .cache_policy_id(&spec.cache_policy_id)
            .compress(true)
            .allowed_methods(allowed_methods)
            .build()
            .map_err(CdnError::aws)?;
        let config = DistributionConfig::builder()
            .caller_reference(&spec.caller_reference)
            .aliases(
                Aliases::builder()
                    .quantity(quantity(spec.aliases.len()))
                    .set_items(Some(spec.aliases.clone()))
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .default_root_object("index.html")
            .origins(
                Origins::builder()
                    .quantity(1)
                    .items(origin)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .default_cache_behavior(behavior)
            .comment(&spec.comment)
            .enabled(true)
            .viewer_certificate(
                ViewerCertificate::builder()
                    .acm_certificate_arn(&spec.certificate_arn)
                    .ssl_support_method(SslSupportMethod::SniOnly)
                    .minimum_protocol_version(MinimumProtocolVersion::from("TLSv1.2_2021"))
                    .build(),
            )
            .build()
            .map_err(CdnError::aws)?;

        let output = self
            .client
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(sdk_error)?;
        let distribution = output.distribution().ok_or_else(|| {
            CdnError::InvalidResponse("CreateDistribution returned no distribution".into())
        })?;
        Ok(DistributionSummary {
            id: distribution.id().to_string(),
            domain_name: distribution.domain_name().to_string(),
            aliases: spec.aliases.clone(),
        })
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> CdnResult<String> {
        let batch = InvalidationBatch::builder()
            .paths(
                Paths::builder()
                    .quantity(quantity(paths.len()))
                    .set_items(Some(paths.to_vec()))
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .caller_reference(caller_reference)
            .build()
            .map_err(CdnError::aws)?;
        let output = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(sdk_error)?;
        output
            .invalidation()
            .map(|i| i.id().to_string())
            .ok_or_else(|| {
                CdnError::InvalidResponse("CreateInvalidation returned no invalidation".into())
            })
    }
}

/// [`AcmApi`] over the AWS SDK. The client must be pinned to `us-east-1`.
#[derive(Debug, Clone)]
pub struct SdkAcm {
    client: aws_sdk_acm::Client,
}

impl SdkAcm {
    pub fn new(client: aws_sdk_acm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AcmApi for SdkAcm {
    async fn list_certificates(&self) -> CdnResult<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_certificates()
                .certificate_statuses(AcmStatus::Issued)
                .certificate_statuses(AcmStatus::PendingValidation)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)?;
            arns.extend(
                output
                    .certificate_summary_list()
                    .iter()
                    .filter_map(|c| c.certificate_arn().map(str::to_string)),
            );
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(arns),
            }
        }
    }

    async fn describe_certificate(&self, arn: &str) -> CdnResult<CertificateDetail> {
        let output = self
            .client
            .describe_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        let certificate = output.certificate().ok_or_else(|| {
            CdnError::InvalidResponse(format!("DescribeCertificate returned nothing for {arn}"))
        })?;

        let mut domains: Vec<String> = certificate.domain_name().map(str::to_string).into_iter().collect();
        for san in certificate.subject_alternative_names() {
            if !domains.iter().any(|d| d == san) {
                domains.push(san.clone());
            }
        }
        let validations = certificate
            .domain_validation_options()
            .iter()
            .map(|v| DomainValidation {
                domain: v.domain_name().to_string(),
                method: v.validation_method().map(|m| m.as_str().to_string()),
                pending: v.validation_status() == Some(&DomainStatus::PendingValidation),
                record: v.resource_record().map(|r| ValidationRecord {
                    name: r.name().to_string(),
                    value: r.value().to_string(),
                }),
            })
            .collect();
        Ok(CertificateDetail {
            arn: arn.to_string(),
            domains,
            status: certificate
                .status()
                .map(|s| CertificateStatus::parse(s.as_str()))
                .unwrap_or(CertificateStatus::Other("UNKNOWN".to_string())),
            validations,
        })
    }

    async fn request_certificate(
        &self,
        domains: &[String],
        idempotency_token: &str,
    ) -> CdnResult<String> {
        let Some((primary, alternatives)) = domains.split_first() else {
            return Err(CdnError::NoDomains);
        };
        let output = self
            .client
            .request_certificate()
            .domain_name(primary)
            .set_subject_alternative_names((!alternatives.is_empty()).then(|| alternatives.to_vec()))
            .validation_method(ValidationMethod::Dns)
            .idempotency_token(idempotency_token)
            .send()
            .await
            .map_err(sdk_error)?;
        output
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| CdnError::InvalidResponse("RequestCertificate returned no ARN".into()))
    }
}

/// [`S3WebsiteApi`] over the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkS3Website {
    client: aws_sdk_s3::Client,
}

impl SdkS3Website {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl S3WebsiteApi for SdkS3Website {
    async fn has_website(&self, bucket: &str) -> CdnResult<bool> {
        match self.client.get_bucket_website().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            // NoSuchWebsiteConfiguration
            Err(err) if err.raw_response().is_some_and(|r| r.status().as_u16() == 404) => Ok(false),
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn put_website(&self, bucket: &str, index: &str, error: &str) -> CdnResult<()> {
        let website = WebsiteConfiguration::builder()
            .index_document(
                IndexDocument::builder()
                    .suffix(index)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .error_document(
                ErrorDocument::builder()
                    .key(error)
                    .build()
                    .map_err(CdnError::aws)?,
            )
            .build();
        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
