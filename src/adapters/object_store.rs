//! Anonymous reads from a public S3 bucket (NOAA GHCN-Daily station files).

use crate::domain::model::RecordSet;
use crate::domain::records::WeatherObservation;
use crate::utils::error::Result;
use flate2::read::GzDecoder;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Gunzip `bytes` when they carry the gzip magic number, otherwise return them as-is.
pub fn decode_object(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes);
    }
    let mut decoded = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes.as_slice()).read_to_end(&mut decoded)?;
    tracing::debug!(
        compressed = bytes.len(),
        decompressed = decoded.len(),
        "Decompressed gzip object"
    );
    Ok(decoded)
}

/// Decode an object body and parse it as a headerless GHCN-Daily CSV.
pub fn parse_weather_object(bytes: Vec<u8>) -> Result<RecordSet> {
    let decoded = decode_object(bytes)?;
    let observations = WeatherObservation::parse_csv(&decoded)?;
    Ok(WeatherObservation::to_record_set(observations))
}

#[cfg(feature = "s3")]
pub use self::s3::S3ObjectSource;

#[cfg(feature = "s3")]
mod s3 {
    use super::parse_weather_object;
    use crate::core::{RecordSet, Source};
    use crate::utils::error::{EtlError, Result};
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::config::Region;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::Client as S3Client;

    /// One object in a bucket that allows unsigned requests.
    #[derive(Debug, Clone)]
    pub struct S3ObjectSource {
        bucket: String,
        key: String,
        region: String,
        endpoint_url: Option<String>,
    }

    impl S3ObjectSource {
        pub fn new(
            bucket: impl Into<String>,
            key: impl Into<String>,
            region: impl Into<String>,
        ) -> Self {
            Self {
                bucket: bucket.into(),
                key: key.into(),
                region: region.into(),
                endpoint_url: None,
            }
        }

        /// Talk to an S3-compatible endpoint (MinIO, localstack) instead of AWS.
        pub fn with_endpoint(mut self, endpoint_url: Option<String>) -> Self {
            self.endpoint_url = endpoint_url;
            self
        }

        async fn client(&self) -> S3Client {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(self.region.clone()))
                .no_credentials()
                .load()
                .await;
            let mut builder = aws_sdk_s3::config::Builder::from(&shared);
            if let Some(endpoint) = &self.endpoint_url {
                builder = builder.endpoint_url(endpoint).force_path_style(true);
            }
            S3Client::from_conf(builder.build())
        }

        pub async fn fetch(&self) -> Result<Vec<u8>> {
            tracing::debug!(bucket = %self.bucket, key = %self.key, "Fetching S3 object");
            let response = self
                .client()
                .await
                .get_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .send()
                .await
                .map_err(|e| EtlError::ObjectStoreError {
                    message: format!(
                        "get s3://{}/{} failed: {}",
                        self.bucket,
                        self.key,
                        DisplayErrorContext(&e)
                    ),
                })?;

            let data = response
                .body
                .collect()
                .await
                .map_err(|e| EtlError::ObjectStoreError {
                    message: format!("Failed to collect S3 data: {}", e),
                })?;

            Ok(data.into_bytes().to_vec())
        }
    }

    impl Source for S3ObjectSource {
        fn describe(&self) -> String {
            format!("s3://{}/{}", self.bucket, self.key)
        }

        async fn extract(&self) -> Result<RecordSet> {
            let bytes = self.fetch().await?;
            parse_weather_object(bytes)
        }
    }
}
