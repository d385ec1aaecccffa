use std::sync::Arc;

use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{MultipartUpload, ObjectStore, PutPayload};
use tracing::warn;

use crate::foundation::error::{ZarrError, ZarrResult};
use crate::settings::S3Settings;
use crate::sink::Sink;

/// S3 multipart uploads require every part except the last to be at least
/// this large.
const MIN_UPLOAD_PART_SIZE: usize = 5 << 20;

/// Shared S3 connection state: the object store handle plus a small runtime
/// that drives it from the synchronous writer threads.
pub(crate) struct S3ConnectionPool {
    store: Arc<dyn ObjectStore>,
    runtime: tokio::runtime::Runtime,
    bucket: String,
}

impl S3ConnectionPool {
    pub fn connect(settings: &S3Settings) -> ZarrResult<Self> {
        let endpoint = settings.endpoint.trim().to_string();
        let bucket = settings.bucket_name.trim().to_string();

        let mut builder = AmazonS3Builder::from_env()
            .with_endpoint(&endpoint)
            .with_bucket_name(&bucket)
            .with_allow_http(endpoint.starts_with("http://"));
        if let Some(region) = &settings.region {
            builder = builder.with_region(region.trim());
        }
        let store = builder.build().map_err(|e| {
            ZarrError::io(format!("failed to configure S3 store at '{endpoint}': {e}"))
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| ZarrError::internal(format!("failed to start S3 runtime: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            runtime,
            bucket,
        })
    }

    /// Probe the bucket with a one-entry listing.
    pub fn bucket_exists(&self) -> bool {
        self.runtime.block_on(async {
            let mut listing = self.store.list(None);
            match listing.next().await {
                None | Some(Ok(_)) => true,
                Some(Err(err)) => {
                    warn!(bucket = %self.bucket, %err, "bucket probe failed");
                    false
                }
            }
        })
    }

    fn put_object(&self, key: &str, bytes: Vec<u8>) -> ZarrResult<()> {
        let location = ObjectPath::from(key);
        self.runtime
            .block_on(self.store.put(&location, PutPayload::from(bytes)))
            .map(|_| ())
            .map_err(|e| ZarrError::io(format!("failed to put object '{key}': {e}")))
    }

    fn multipart_init(&self, key: &str) -> ZarrResult<Box<dyn MultipartUpload>> {
        let location = ObjectPath::from(key);
        self.runtime
            .block_on(self.store.put_multipart(&location))
            .map_err(|e| {
                ZarrError::io(format!("failed to start multipart upload for '{key}': {e}"))
            })
    }

    fn upload_part(
        &self,
        key: &str,
        upload: &mut Box<dyn MultipartUpload>,
        bytes: Vec<u8>,
    ) -> ZarrResult<()> {
        self.runtime
            .block_on(upload.put_part(PutPayload::from(bytes)))
            .map_err(|e| ZarrError::io(format!("failed to upload part of '{key}': {e}")))
    }

    fn multipart_complete(
        &self,
        key: &str,
        upload: &mut Box<dyn MultipartUpload>,
    ) -> ZarrResult<()> {
        self.runtime
            .block_on(upload.complete())
            .map(|_| ())
            .map_err(|e| {
                ZarrError::io(format!("failed to complete multipart upload of '{key}': {e}"))
            })
    }
}

/// Sink writing one S3 object.
///
/// Small writes coalesce in an internal buffer; once the object grows past
/// the minimum part size the sink switches to a multipart upload and streams
/// full parts as they fill. Anything still buffered at flush goes out as the
/// final part, or as a single PUT when multipart never started.
pub(crate) struct S3Sink {
    pool: Arc<S3ConnectionPool>,
    key: String,
    buf: Vec<u8>,
    nbytes_flushed: u64,
    upload: Option<Box<dyn MultipartUpload>>,
    finished: bool,
}

impl S3Sink {
    pub fn new(pool: Arc<S3ConnectionPool>, key: &str) -> Self {
        Self {
            pool,
            key: key.to_string(),
            buf: Vec::new(),
            nbytes_flushed: 0,
            upload: None,
            finished: false,
        }
    }

    fn flush_part(&mut self) -> ZarrResult<()> {
        if self.upload.is_none() {
            self.upload = Some(self.pool.multipart_init(&self.key)?);
        }
        let part = std::mem::take(&mut self.buf);
        self.nbytes_flushed += part.len() as u64;

        let upload = self.upload.as_mut().expect("multipart upload just created");
        self.pool.upload_part(&self.key, upload, part)
    }
}

impl Sink for S3Sink {
    fn write(&mut self, offset: u64, buf: &[u8]) -> ZarrResult<()> {
        if self.finished {
            return Err(ZarrError::precondition(format!(
                "object '{}' is already finalized",
                self.key
            )));
        }

        let position = self.nbytes_flushed + self.buf.len() as u64;
        if offset == 0 && self.nbytes_flushed == 0 {
            // metadata documents are rewritten in place before anything has
            // shipped; restart the buffered object
            self.buf.clear();
        } else if offset != position {
            return Err(ZarrError::internal(format!(
                "non-append write to object '{}': offset {offset}, position {position}",
                self.key
            )));
        }

        self.buf.extend_from_slice(buf);
        if self.buf.len() >= MIN_UPLOAD_PART_SIZE {
            self.flush_part()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> ZarrResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if self.upload.is_some() {
            if !self.buf.is_empty() {
                self.flush_part()?;
            }
            let mut upload = self.upload.take().expect("upload checked above");
            self.pool.multipart_complete(&self.key, &mut upload)
        } else {
            let body = std::mem::take(&mut self.buf);
            self.nbytes_flushed += body.len() as u64;
            self.pool.put_object(&self.key, body)
        }
    }
}
