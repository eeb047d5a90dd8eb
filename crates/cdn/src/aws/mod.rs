//! CloudFront + ACM CDN provider.
//!
//! The flow for one shop:
//! 1. Find or request an ACM certificate covering every requested domain and
//!    publish its DNS validation records in Route53.
//! 2. Turn the shop bucket into an S3 website.
//! 3. Find or create the shared cache policy.
//! 4. Invalidate the existing distribution for the primary domain, or create
//!    one with the website endpoint as an HTTP-only custom origin.

pub mod api;
pub mod sdk;

use crate::error::{CdnError, CdnResult};
use crate::provider::{CdnProvider, CdnRequest};
use api::{
    AcmApi, CachePolicySpec, CertificateDetail, CertificateStatus, CloudFrontApi,
    DistributionSpec, DistributionSummary, S3WebsiteApi,
};
use async_trait::async_trait;
use dshop_cloud::{AwsCredentials, AwsRegistry, aws_clients};
use dshop_core::{CdnConfiguration, NetworkConfig, ResourceSelection, ResourceTag};
use dshop_dns::records::{DEFAULT_TTL, PlannedChange, RecordFormat, RecordSet, RecordType};
use dshop_dns::route53::{Route53Api, SdkRoute53, find_zone_for_name};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// How long to wait for ACM to attach validation records to a new certificate.
#[derive(Debug, Clone, Copy)]
pub struct CertificatePolling {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for CertificatePolling {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(3),
        }
    }
}

/// The AWS services one configuration run talks to.
#[derive(Clone, Copy)]
pub struct AwsCdnApis<'a> {
    pub cloudfront: &'a dyn CloudFrontApi,
    pub acm: &'a dyn AcmApi,
    pub route53: &'a dyn Route53Api,
    pub s3: &'a dyn S3WebsiteApi,
    /// Region of the shop bucket.
    pub region: &'a str,
}

/// Find the distribution serving `alias`.
pub async fn get_distribution(
    cloudfront: &dyn CloudFrontApi,
    alias: &str,
) -> CdnResult<Option<DistributionSummary>> {
    let distributions = cloudfront.list_distributions().await?;
    Ok(distributions
        .into_iter()
        .find(|d| d.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias))))
}

/// S3 static website endpoint for a bucket.
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    format!("{bucket}.s3-website-{region}.amazonaws.com")
}

/// Paths invalidated on every redeploy.
pub fn invalidation_paths(auth_token: &str) -> Vec<String> {
    vec![
        "/*".to_string(),
        format!("/{auth_token}/*"),
        "/dist/*".to_string(),
    ]
}

/// Reuse a certificate covering `domains`, or request a new one.
///
/// An issued certificate wins over a pending one.
pub async fn find_or_request_certificate(
    acm: &dyn AcmApi,
    domains: &[String],
    polling: CertificatePolling,
) -> CdnResult<CertificateDetail> {
    let mut pending = None;
    for arn in acm.list_certificates().await? {
        let detail = acm.describe_certificate(&arn).await?;
        if !detail.covers(domains) {
            continue;
        }
        match detail.status {
            CertificateStatus::Issued => {
                debug!(arn = %detail.arn, "Reusing issued certificate");
                return Ok(detail);
            }
            CertificateStatus::PendingValidation if pending.is_none() => pending = Some(detail),
            _ => {}
        }
    }
    if let Some(detail) = pending {
        debug!(arn = %detail.arn, "Reusing pending certificate");
        return Ok(detail);
    }

    let token = Uuid::new_v4().simple().to_string();
    let arn = acm.request_certificate(domains, &token).await?;
    info!(arn = %arn, domains = ?domains, "Requested certificate");

    // ACM fills in validation records shortly after the request.
    for attempt in 0..polling.attempts {
        let detail = acm.describe_certificate(&arn).await?;
        let ready = !detail.validations.is_empty()
            && detail
                .validations
                .iter()
                .all(|v| v.record.is_some() || v.method.as_deref().is_some_and(|m| m != "DNS"));
        if ready {
            return Ok(detail);
        }
        debug!(attempt, arn = %arn, "Waiting for validation records");
        tokio::time::sleep(polling.interval).await;
    }
    Err(CdnError::ValidationRecordsUnavailable { arn })
}

/// Publish the CNAMEs ACM needs to validate `certificate`.
///
/// Returns the number of records written.
pub async fn write_validation_records(
    route53: &dyn Route53Api,
    certificate: &CertificateDetail,
) -> CdnResult<usize> {
    if certificate.status == CertificateStatus::Failed {
        return Err(CdnError::CertificateFailed {
            name: certificate.arn.clone(),
        });
    }
    let format = RecordFormat::ZONE_FILE;
    let mut written = 0;
    for validation in &certificate.validations {
        if let Some(method) = validation.method.as_deref()
            && method != "DNS"
        {
            return Err(CdnError::UnsupportedValidation {
                arn: certificate.arn.clone(),
                method: method.to_string(),
            });
        }
        let Some(record) = validation.record.as_ref().filter(|_| validation.pending) else {
            continue;
        };
        let zone = find_zone_for_name(route53, &record.name)
            .await?
            .ok_or_else(|| CdnError::ZoneNotFound {
                name: validation.domain.clone(),
            })?;
        let change = PlannedChange::Upsert {
            existing: None,
            desired: RecordSet {
                name: format.name(&record.name),
                record_type: RecordType::Cname,
                ttl: DEFAULT_TTL,
                values: vec![record.value.clone()],
            },
        };
        route53.change_record_sets(&zone.id, &[change]).await?;
        debug!(domain = %validation.domain, zone = %zone.name, "Wrote validation record");
        written += 1;
    }
    Ok(written)
}

/// Run the full CloudFront configuration for one shop.
#[instrument(skip(apis, request, polling), fields(provider = "aws", shop_id = request.shop.shop_id))]
pub async fn configure_cloudfront(
    apis: AwsCdnApis<'_>,
    request: &CdnRequest<'_>,
    polling: CertificatePolling,
) -> CdnResult<CdnConfiguration> {
    let bucket = request
        .bucket("s3")
        .ok_or(CdnError::MissingBucket { scheme: "s3" })?;
    let primary = request.primary_domain().ok_or(CdnError::NoDomains)?;

    let certificate = find_or_request_certificate(apis.acm, request.domains, polling).await?;
    write_validation_records(apis.route53, &certificate).await?;

    if !apis.s3.has_website(bucket).await? {
        apis.s3
            .put_website(bucket, "index.html", "index.html")
            .await?;
        info!(bucket, "Enabled static website hosting");
    }

    let policy = CachePolicySpec::default();
    let cache_policy_id = match apis.cloudfront.find_cache_policy(&policy.name).await? {
        Some(id) => id,
        None => {
            let id = apis.cloudfront.create_cache_policy(&policy).await?;
            info!(cache_policy_id = %id, "Created cache policy");
            id
        }
    };

    if let Some(distribution) = get_distribution(apis.cloudfront, primary).await? {
        let invalidation = apis
            .cloudfront
            .create_invalidation(
                &distribution.id,
                &invalidation_paths(&request.shop.auth_token),
                &Uuid::new_v4().to_string(),
            )
            .await?;
        info!(
            distribution_id = %distribution.id,
            invalidation_id = %invalidation,
            "Invalidated existing distribution"
        );
        return Ok(CdnConfiguration::Cname {
            cname: distribution.domain_name,
        });
    }

    if certificate.status != CertificateStatus::Issued {
        return Err(CdnError::CertificatePending {
            arn: certificate.arn,
        });
    }
    let spec = DistributionSpec {
        caller_reference: Uuid::new_v4().to_string(),
        aliases: request.domains.to_vec(),
        origin_domain: website_endpoint(bucket, apis.region),
        cache_policy_id,
        certificate_arn: certificate.arn,
        comment: format!("dshop {}", request.shop.auth_token),
    };
    let distribution = apis.cloudfront.create_distribution(&spec).await?;
    info!(
        distribution_id = %distribution.id,
        domain_name = %distribution.domain_name,
        "Created distribution"
    );
    Ok(CdnConfiguration::Cname {
        cname: distribution.domain_name,
    })
}

/// The `aws-cdn` provider.
pub struct AwsCdnProvider {
    registry: Arc<AwsRegistry>,
    polling: CertificatePolling,
}

impl AwsCdnProvider {
    pub fn new(registry: Arc<AwsRegistry>) -> Self {
        Self {
            registry,
            polling: CertificatePolling::default(),
        }
    }
}

#[async_trait]
impl CdnProvider for AwsCdnProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn is_available(&self, config: &NetworkConfig, selection: &ResourceSelection) -> bool {
        selection.contains(ResourceTag::AwsCdn) && config.has_aws_credentials()
    }

    async fn configure_cdn(
        &self,
        config: &NetworkConfig,
        request: &CdnRequest<'_>,
    ) -> CdnResult<CdnConfiguration> {
        let credentials = AwsCredentials::from_network_config(config)?;
        let clients = aws_clients(&self.registry, &credentials).await;
        let cloudfront = sdk::SdkCloudFront::new(clients.cloudfront());
        let acm = sdk::SdkAcm::new(clients.acm());
        let route53 = SdkRoute53::new(clients.route53());
        let s3 = sdk::SdkS3Website::new(clients.s3());
        let apis = AwsCdnApis {
            cloudfront: &cloudfront,
            acm: &acm,
            route53: &route53,
            s3: &s3,
            region: credentials.region(),
        };
        configure_cloudfront(apis, request, self.polling).await
    }
}
