//! src/services/storage_service.rs
//!
//! StorageService — bucket and object operations mapped directly onto the
//! local filesystem. A bucket is a directory under `base_path`, an object is a
//! file inside it. There is no metadata index: every existence check is a live
//! filesystem call, so results always reflect the current state on disk.
//!
//! All path joining happens in this module (`bucket_root` / `object_path`),
//! behind the traversal checks in `ensure_bucket_segment_safe` and
//! `ensure_key_safe`.

use bytes::Bytes;
use futures::Stream;
use mime_guess::mime::{self, Mime};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::StreamReader;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{0}` is not empty")]
    BucketNotEmpty(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid bucket name `{0}`")]
    InvalidBucketName(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// StorageService provides the filesystem-backed bucket/object operations:
/// - Save an object (streams the payload into `base_path/{bucket}/{key}`)
/// - Resolve an object path for download
/// - List objects in a bucket and list all buckets
/// - Create / delete buckets (delete refuses non-empty buckets)
///
/// Cloning is cheap; the only state is the base directory.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Base directory on disk under which every bucket lives.
    pub base_path: PathBuf,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Common MIME types and the extension stored objects get for them.
/// Consulted before the `mime_guess` fallback so the preferred extension wins
/// (`image/jpeg` is `jpg`, not `jfif`).
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/bmp", "bmp"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/javascript", "js"),
    ("application/json", "json"),
    ("application/xml", "xml"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("application/x-zip-compressed", "zip"),
    ("application/x-7z-compressed", "7z"),
    ("application/x-tar", "tar"),
    ("application/x-rar-compressed", "rar"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/vnd.ms-excel", "xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/vnd.ms-powerpoint", "ppt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("audio/ogg", "ogg"),
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpeg"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
];

impl StorageService {
    /// Create a StorageService rooted at `base_path`. Performs no I/O.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create a StorageService and make sure its base directory exists.
    pub async fn init(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let service = Self::new(base_path);
        fs::create_dir_all(&service.base_path).await?;
        debug!("storage base directory ready at {}", service.base_path.display());
        Ok(service)
    }

    /// Reject bucket segments that would escape or alias `base_path`.
    ///
    /// Only traversal safety is enforced here. The stricter character rule for
    /// newly created buckets belongs to the HTTP layer.
    fn ensure_bucket_segment_safe(&self, bucket: &str) -> StorageResult<()> {
        if bucket.is_empty()
            || bucket == "."
            || bucket == ".."
            || bucket.contains(['/', '\\', '\0'])
        {
            return Err(StorageError::InvalidBucketName(bucket.to_string()));
        }
        Ok(())
    }

    /// Reject keys that are absolute, contain `.`/`..`/empty components, or
    /// carry bytes that have no business in a file name.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        let invalid = || StorageError::InvalidObjectKey(key.to_string());
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN || key.starts_with('/') {
            return Err(invalid());
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(invalid());
        }
        if key
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(invalid());
        }
        Ok(())
    }

    /// Physical directory for a bucket. Does not check for existence.
    fn bucket_root(&self, bucket: &str) -> StorageResult<PathBuf> {
        self.ensure_bucket_segment_safe(bucket)?;
        Ok(self.base_path.join(bucket))
    }

    /// Physical file path for `bucket/key`. Parent directories may not exist yet.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        self.ensure_key_safe(key)?;
        let mut path = self.bucket_root(bucket)?;
        path.extend(key.split('/'));
        Ok(path)
    }

    /// Stream an object body to `base_path/{bucket}/{key}`.
    ///
    /// The bucket directory (and any directories implied by `/` in the key) is
    /// created on demand, so an upload can implicitly create its bucket. The
    /// target file is created or truncated and the stream is copied into it
    /// chunk by chunk. Returns the number of bytes written.
    ///
    /// A failed copy leaves whatever was already written in place.
    pub async fn save_object<S>(&self, bucket: &str, key: &str, stream: S) -> StorageResult<u64>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let file_path = self.object_path(bucket, key)?;
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;

        let mut file = File::create(&file_path).await?;
        let reader = StreamReader::new(stream);
        tokio::pin!(reader);
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        debug!("wrote {} bytes to {}", written, file_path.display());
        Ok(written)
    }

    /// Resolve the on-disk path of an existing object so the caller can stream it.
    ///
    /// Directories are not objects and resolve to ObjectNotFound.
    pub async fn resolve_object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        let file_path = self.object_path(bucket, key)?;
        match fs::metadata(&file_path).await {
            Ok(meta) if meta.is_file() => Ok(file_path),
            Ok(_) => Err(object_not_found(bucket, key)),
            Err(err) if is_missing(&err) => Err(object_not_found(bucket, key)),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Remove an object. Returns ObjectNotFound if it is not there.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let file_path = self.resolve_object_path(bucket, key).await?;
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                debug!("removed {}", file_path.display());
                Ok(())
            }
            // lost a race with another delete
            Err(err) if err.kind() == ErrorKind::NotFound => Err(object_not_found(bucket, key)),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Names of the files directly inside a bucket, sorted.
    ///
    /// Sub-directories are skipped. Returns BucketNotFound if the bucket
    /// directory does not exist.
    pub async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let bucket_path = self.bucket_root(bucket)?;
        let mut entries = match fs::read_dir(&bucket_path).await {
            Ok(entries) => entries,
            Err(err) if is_missing(&err) => {
                return Err(StorageError::BucketNotFound(bucket.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Names of every bucket (sub-directory of `base_path`), sorted.
    ///
    /// A missing base directory means there are no buckets yet.
    pub async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(err)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create a bucket directory.
    ///
    /// Returns `Ok(false)` when the bucket already exists. The final directory
    /// is created non-recursively, so of two racing creates exactly one
    /// reports `true`.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<bool> {
        let bucket_path = self.bucket_root(name)?;
        if fs::try_exists(&bucket_path).await? {
            return Ok(false);
        }

        fs::create_dir_all(&self.base_path).await?;
        match fs::create_dir(&bucket_path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Delete an empty bucket directory.
    ///
    /// Returns BucketNotFound if absent and BucketNotEmpty if it holds any
    /// entry, file or directory. The emptiness check and the removal are two
    /// separate calls; an object landing in between is still reported as
    /// BucketNotEmpty because `remove_dir` refuses non-empty directories.
    pub async fn delete_bucket(&self, name: &str) -> StorageResult<bool> {
        let bucket_path = self.bucket_root(name)?;
        let mut entries = match fs::read_dir(&bucket_path).await {
            Ok(entries) => entries,
            Err(err) if is_missing(&err) => {
                return Err(StorageError::BucketNotFound(name.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        if entries.next_entry().await?.is_some() {
            return Err(StorageError::BucketNotEmpty(name.to_string()));
        }

        match fs::remove_dir(&bucket_path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => {
                Err(StorageError::BucketNotEmpty(name.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::BucketNotFound(name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Pick the file extension for an upload, without the leading dot.
    ///
    /// If the last path segment of `filename` contains a dot, whatever follows
    /// the final dot is returned as given, even when empty (`.env` -> `env`,
    /// `photo.` -> ``). Otherwise the essence of `mime_type` (parameters
    /// stripped) is looked up in the built-in table, then in the `mime_guess`
    /// database. `application/octet-stream`, unparseable types and unknown
    /// types yield an empty string.
    pub fn infer_extension(mime_type: &str, filename: &str) -> String {
        let base = filename.rsplit('/').next().unwrap_or(filename);
        if let Some((_, ext)) = base.rsplit_once('.') {
            return ext.to_string();
        }

        let Ok(mime) = mime_type.trim().parse::<Mime>() else {
            return String::new();
        };
        let essence = mime.essence_str();
        if essence == mime::APPLICATION_OCTET_STREAM.essence_str() {
            return String::new();
        }

        if let Some((_, ext)) = MIME_EXTENSIONS
            .iter()
            .find(|(candidate, _)| *candidate == essence)
        {
            return (*ext).to_string();
        }

        // only accept an extension that maps back to the same type
        mime_guess::get_mime_extensions_str(essence)
            .into_iter()
            .flatten()
            .find(|ext| {
                mime_guess::from_ext(ext)
                    .first()
                    .is_some_and(|guess| guess.essence_str() == essence)
            })
            .map(|ext| (*ext).to_string())
            .unwrap_or_default()
    }
}

/// A path component is absent, or a file sits where a directory is expected.
fn is_missing(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn object_not_found(bucket: &str, key: &str) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;

    fn body(data: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    async fn service() -> (TempDir, StorageService) {
        let temp = TempDir::new().unwrap();
        let service = StorageService::init(temp.path().join("objects"))
            .await
            .unwrap();
        (temp, service)
    }

    #[tokio::test]
    async fn test_init_creates_base_directory() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("nested").join("objects");
        StorageService::init(&base).await.unwrap();
        assert!(base.is_dir());
    }

    #[tokio::test]
    async fn test_save_and_resolve() {
        let (_temp, service) = service().await;

        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ]);
        let written = service.save_object("docs", "a.txt", chunks).await.unwrap();
        assert_eq!(written, 5);

        let path = service.resolve_object_path("docs", "a.txt").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_key() {
        let (_temp, service) = service().await;
        service.save_object("docs", "a.txt", body(b"first version")).await.unwrap();
        let written = service.save_object("docs", "a.txt", body(b"v2")).await.unwrap();
        assert_eq!(written, 2);

        let path = service.resolve_object_path("docs", "a.txt").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_save_nested_key() {
        let (_temp, service) = service().await;
        service
            .save_object("docs", "2025/report.pdf", body(b"%PDF"))
            .await
            .unwrap();
        let path = service
            .resolve_object_path("docs", "2025/report.pdf")
            .await
            .unwrap();
        assert!(path.ends_with("docs/2025/report.pdf"));
    }

    #[tokio::test]
    async fn test_save_stream_error_is_io() {
        let (_temp, service) = service().await;
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ]);
        let result = service.save_object("docs", "broken.bin", chunks).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[tokio::test]
    async fn test_resolve_missing_and_directory() {
        let (_temp, service) = service().await;
        service.save_object("docs", "dir/a.txt", body(b"x")).await.unwrap();

        let missing = service.resolve_object_path("docs", "nope.txt").await;
        assert!(matches!(missing, Err(StorageError::ObjectNotFound { .. })));

        let dir = service.resolve_object_path("docs", "dir").await;
        assert!(matches!(dir, Err(StorageError::ObjectNotFound { .. })));

        let under_file = service.resolve_object_path("docs", "dir/a.txt/more").await;
        assert!(matches!(under_file, Err(StorageError::ObjectNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (_temp, service) = service().await;
        service.save_object("docs", "a.txt", body(b"x")).await.unwrap();

        service.delete_object("docs", "a.txt").await.unwrap();
        let second = service.delete_object("docs", "a.txt").await;
        assert!(matches!(second, Err(StorageError::ObjectNotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_objects_skips_directories() {
        let (_temp, service) = service().await;
        service.save_object("docs", "b.txt", body(b"b")).await.unwrap();
        service.save_object("docs", "a.txt", body(b"a")).await.unwrap();
        service.save_object("docs", "sub/c.txt", body(b"c")).await.unwrap();

        let files = service.list_objects("docs").await.unwrap();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_list_objects_missing_and_empty_bucket() {
        let (_temp, service) = service().await;
        let missing = service.list_objects("ghost").await;
        assert!(matches!(missing, Err(StorageError::BucketNotFound(_))));

        assert!(service.create_bucket("empty").await.unwrap());
        assert!(service.list_objects("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_buckets_missing_base_is_empty() {
        let temp = TempDir::new().unwrap();
        let service = StorageService::new(temp.path().join("never-created"));
        assert!(service.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_bucket_once() {
        let (_temp, service) = service().await;
        assert!(service.create_bucket("photos").await.unwrap());
        service.save_object("photos", "keep.txt", body(b"keep")).await.unwrap();

        assert!(!service.create_bucket("photos").await.unwrap());
        assert_eq!(service.list_objects("photos").await.unwrap(), vec!["keep.txt"]);

        let buckets = service.list_buckets().await.unwrap();
        assert_eq!(buckets.iter().filter(|b| *b == "photos").count(), 1);
    }

    #[tokio::test]
    async fn test_list_buckets_ignores_files() {
        let (_temp, service) = service().await;
        service.create_bucket("b").await.unwrap();
        service.create_bucket("a").await.unwrap();
        std::fs::write(service.base_path.join("stray.txt"), b"x").unwrap();

        assert_eq!(service.list_buckets().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_bucket_lifecycle() {
        let (_temp, service) = service().await;
        let missing = service.delete_bucket("ghost").await;
        assert!(matches!(missing, Err(StorageError::BucketNotFound(_))));

        service.save_object("full", "a.txt", body(b"a")).await.unwrap();
        let not_empty = service.delete_bucket("full").await;
        assert!(matches!(not_empty, Err(StorageError::BucketNotEmpty(_))));

        service.delete_object("full", "a.txt").await.unwrap();
        assert!(service.delete_bucket("full").await.unwrap());
        assert!(service.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_bucket_with_only_subdirectory() {
        let (_temp, service) = service().await;
        service.create_bucket("nested").await.unwrap();
        std::fs::create_dir(service.base_path.join("nested").join("inner")).unwrap();

        let result = service.delete_bucket("nested").await;
        assert!(matches!(result, Err(StorageError::BucketNotEmpty(_))));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (temp, service) = service().await;
        std::fs::write(temp.path().join("secret.txt"), b"secret").unwrap();

        for key in ["../secret.txt", "a/../../secret.txt", "/etc/passwd", "a//b", "./a"] {
            let result = service.resolve_object_path("docs", key).await;
            assert!(
                matches!(result, Err(StorageError::InvalidObjectKey(_))),
                "key {key:?} should be rejected"
            );
        }

        for bucket in ["..", ".", "a/b", ""] {
            let result = service.list_objects(bucket).await;
            assert!(
                matches!(result, Err(StorageError::InvalidBucketName(_))),
                "bucket {bucket:?} should be rejected"
            );
        }

        let upload = service.save_object("..", "secret.txt", body(b"pwned")).await;
        assert!(matches!(upload, Err(StorageError::InvalidBucketName(_))));
        assert_eq!(std::fs::read(temp.path().join("secret.txt")).unwrap(), b"secret");
    }

    #[test]
    fn test_infer_extension_prefers_filename() {
        assert_eq!(StorageService::infer_extension("image/png", "photo.JPG"), "JPG");
        assert_eq!(StorageService::infer_extension("", "archive.tar.gz"), "gz");
    }

    #[test]
    fn test_infer_extension_from_table() {
        assert_eq!(StorageService::infer_extension("image/png", "photo"), "png");
        assert_eq!(StorageService::infer_extension("image/jpeg", "photo"), "jpg");
        assert_eq!(
            StorageService::infer_extension(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "report"
            ),
            "docx"
        );
        assert_eq!(StorageService::infer_extension("video/quicktime", "clip"), "mov");
    }

    #[test]
    fn test_infer_extension_follows_last_dot() {
        assert_eq!(StorageService::infer_extension("text/plain", ".env"), "env");
        assert_eq!(StorageService::infer_extension("image/png", "photo."), "");
        assert_eq!(StorageService::infer_extension("image/png", "v1.2/photo"), "png");
        assert_eq!(StorageService::infer_extension("", "dir/.hidden"), "hidden");
    }

    #[test]
    fn test_infer_extension_strips_parameters() {
        assert_eq!(
            StorageService::infer_extension("text/plain; charset=utf-8", "notes"),
            "txt"
        );
    }

    #[test]
    fn test_infer_extension_octet_stream_is_empty() {
        assert_eq!(
            StorageService::infer_extension("application/octet-stream", "blob"),
            ""
        );
        assert_eq!(StorageService::infer_extension("not a mime", "blob"), "");
    }

    #[test]
    fn test_infer_extension_fallback_and_unknown() {
        let ext = StorageService::infer_extension("application/wasm", "module");
        assert_eq!(ext, "wasm");
        assert_eq!(StorageService::infer_extension("application/x-unknown-thing", "blob"), "");
        assert_eq!(StorageService::infer_extension("", "blob"), "");
    }
}
