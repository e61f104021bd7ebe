use crate::config::Config;
use crate::connector_fs::LocalSource;
use crate::connector_s3::S3Source;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::{SourceDescriptor, SourceKind};
use crate::traits::FileSource;

/// Build the backend a descriptor points at. The descriptor is validated
/// first, so a bucket source without a bucket name never reaches S3.
pub fn open_source(config: &Config, source: &SourceDescriptor) -> PipelineResult<Box<dyn FileSource>> {
    source.validate()?;

    match source.kind {
        SourceKind::Local => Ok(Box::new(LocalSource::new(
            &config.sources.local,
            source.prefix(),
        ))),
        SourceKind::Bucket => {
            let bucket = source.bucket().ok_or_else(|| {
                AnalysisError::invalid("bucket_name is required when source_type is s3")
            })?;
            Ok(Box::new(S3Source::new(
                &config.sources.s3,
                bucket,
                source.prefix(),
            )?))
        }
    }
}
