use super::{ListPage, ObjectStorage, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::debug;

const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const FILE_URI: &str = r"^file://(?P<path>/.*)$";
const FILE_PATH: &str = r"^(?P<path>/.*)$";
const MEMORY_URI: &str = r"^memory://$";

/// Where a bucket lives, parsed from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketLocation {
    S3 { bucket: String, key: Option<String> },
    Local { path: std::path::PathBuf },
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
    Memory,
}

fn matchers() -> &'static [(Backend, Regex)] {
    static MATCHERS: OnceLock<Vec<(Backend, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        [
            (Backend::S3, S3_URL),
            (Backend::Local, FILE_URI),
            (Backend::Local, FILE_PATH),
            (Backend::Memory, MEMORY_URI),
        ]
        .into_iter()
        .filter_map(|(backend, pattern)| Regex::new(pattern).ok().map(|re| (backend, re)))
        .collect()
    })
}

impl BucketLocation {
    pub fn parse_url(url: &str) -> Result<Self, StoreError> {
        for (backend, re) in matchers() {
            let Some(caps) = re.captures(url) else {
                continue;
            };

            return Ok(match backend {
                Backend::S3 => BucketLocation::S3 {
                    bucket: caps["bucket"].to_string(),
                    key: caps
                        .name("key")
                        .map(|k| k.as_str().trim_matches('/').to_string())
                        .filter(|k| !k.is_empty()),
                },
                Backend::Local => BucketLocation::Local {
                    path: std::path::PathBuf::from(&caps["path"]),
                },
                Backend::Memory => BucketLocation::Memory,
            });
        }

        Err(StoreError::InvalidUrl(url.to_string()))
    }
}

/// [`ObjectStorage`] over any `object_store` backend.
///
/// Keys are relative to the bucket's base key (the path part of an
/// `s3://bucket/base` URL) when one is configured.
#[derive(Clone)]
pub struct Bucket {
    store: Arc<dyn ObjectStore>,
    base: Option<Path>,
    url: String,
    /// Backend lists keys in lexicographic order (S3, in-memory).
    ordered_listing: bool,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bucket<{}>", self.url)
    }
}

impl Bucket {
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let location = BucketLocation::parse_url(url)?;
        let ordered_listing = !matches!(location, BucketLocation::Local { .. });
        let (store, base): (Arc<dyn ObjectStore>, Option<Path>) = match location {
            BucketLocation::S3 { bucket, key } => {
                let store = AmazonS3Builder::from_env()
                    .with_bucket_name(&bucket)
                    .build()?;
                (Arc::new(store), key.map(Path::from))
            }
            BucketLocation::Local { path } => {
                std::fs::create_dir_all(&path).map_err(|e| {
                    StoreError::InvalidUrl(format!("{}: {}", path.display(), e))
                })?;
                (Arc::new(LocalFileSystem::new_with_prefix(&path)?), None)
            }
            BucketLocation::Memory => (Arc::new(InMemory::new()), None),
        };

        Ok(Self {
            store,
            base,
            url: url.to_string(),
            ordered_listing,
        })
    }

    fn qualify(&self, key: &str) -> Path {
        let key = Path::from(key);
        match &self.base {
            Some(base) => base.parts().chain(key.parts()).collect(),
            None => key,
        }
    }

    fn relative(&self, location: &Path) -> String {
        let skip = self
            .base
            .as_ref()
            .map(|base| base.parts().count())
            .unwrap_or_default();
        location.parts().skip(skip).collect::<Path>().to_string()
    }
}

/// Cut one page from a listing stream. Returns the page and whether more
/// keys follow it.
///
/// An ordered stream is read only up to `page_size + 1` entries. Any other
/// stream is drained and sorted first.
async fn take_page<S>(
    mut stream: S,
    page_size: usize,
    ordered: bool,
) -> Result<(Vec<ObjectMeta>, bool), object_store::Error>
where
    S: Stream<Item = object_store::Result<ObjectMeta>> + Unpin,
{
    let mut metas: Vec<ObjectMeta> = if ordered {
        let mut metas = Vec::new();
        while metas.len() <= page_size {
            match stream.try_next().await? {
                Some(meta) => metas.push(meta),
                None => break,
            }
        }
        metas
    } else {
        let mut metas: Vec<ObjectMeta> = stream.try_collect().await?;
        metas.sort_by(|a, b| a.location.as_ref().cmp(b.location.as_ref()));
        metas
    };

    let has_more = metas.len() > page_size;
    metas.truncate(page_size);
    Ok((metas, has_more))
}

#[async_trait]
impl ObjectStorage for Bucket {
    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StoreError> {
        let prefix = self.qualify(prefix);
        let prefix = (prefix.parts().count() > 0).then_some(prefix);

        let stream = match start_after {
            Some(after) => self
                .store
                .list_with_offset(prefix.as_ref(), &self.qualify(after)),
            None => self.store.list(prefix.as_ref()),
        };

        let (metas, has_more) = take_page(stream, page_size, self.ordered_listing).await?;

        let keys: Vec<String> = metas.iter().map(|m| self.relative(&m.location)).collect();
        let next_start_after = if has_more { keys.last().cloned() } else { None };

        debug!(keys = keys.len(), has_more, "Listed object page");
        Ok(ListPage {
            keys,
            next_start_after,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let result = self.store.get(&self.qualify(key)).await?;
        Ok(result.bytes().await?)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.store
            .put(&self.qualify(key), PutPayload::from(body))
            .await?;
        Ok(())
    }
}
